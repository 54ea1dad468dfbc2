//! Server execution logic.

use std::{net::SocketAddr, sync::Arc};

use agora_shared::time::Clock;
use axum::{
    Router,
    routing::{get, post},
};
use tokio::{net::TcpListener, sync::Mutex};
use tower_http::trace::TraceLayer;

use crate::{
    domain::MessagePusher,
    infrastructure::Stores,
    usecase::{
        AccessPolicy, ConnectParticipantUseCase, DeliveryLock, DisconnectParticipantUseCase,
        ModerationUseCase, PurgeCategoryUseCase, SendMessageUseCase,
    },
};

use super::{
    handler::{
        announce, ban_ip, ban_user, get_state, grant_admin, health_check, kick, lock_site, purge,
        revoke_admin, unban_ip, unban_user, unlock_site, websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Default capacity of each connection's outbound queue
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Server-wide settings that are not part of any store
#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,
    /// Take the client IP from `x-forwarded-for` instead of the socket address
    pub trust_forwarded_for: bool,
    pub access: AccessPolicy,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            trust_forwarded_for: false,
            access: AccessPolicy::default(),
        }
    }
}

/// WebSocket chat server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(
///     Stores::in_memory(),
///     Arc::new(WebSocketMessagePusher::new()),
///     Arc::new(SystemClock),
///     ServerOptions::default(),
/// );
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
    purge_category_usecase: Arc<PurgeCategoryUseCase>,
}

impl Server {
    /// Wire the use cases on top of the given stores
    ///
    /// Sends, registrations and purges share one delivery lock so that the
    /// history a connection receives never overlaps or misses its live messages.
    pub fn new(
        stores: Stores,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        options: ServerOptions,
    ) -> Self {
        let delivery_lock: DeliveryLock = Arc::new(Mutex::new(()));

        let connect_participant_usecase = Arc::new(
            ConnectParticipantUseCase::new(
                stores.directory.clone(),
                stores.message_log.clone(),
                stores.presence.clone(),
                message_pusher.clone(),
                clock.clone(),
            )
            .with_access_policy(options.access)
            .with_delivery_lock(delivery_lock.clone()),
        );
        let disconnect_participant_usecase = Arc::new(DisconnectParticipantUseCase::new(
            stores.presence.clone(),
            message_pusher.clone(),
        ));
        let send_message_usecase = Arc::new(
            SendMessageUseCase::new(
                stores.directory.clone(),
                stores.site_state.clone(),
                stores.message_log.clone(),
                stores.presence.clone(),
                message_pusher.clone(),
                clock.clone(),
            )
            .with_access_policy(options.access)
            .with_delivery_lock(delivery_lock.clone()),
        );
        let purge_category_usecase = Arc::new(
            PurgeCategoryUseCase::new(
                stores.message_log.clone(),
                stores.presence.clone(),
                message_pusher.clone(),
            )
            .with_delivery_lock(delivery_lock),
        );
        let moderation_usecase = Arc::new(ModerationUseCase::new(
            stores.directory.clone(),
            stores.site_state.clone(),
            stores.presence.clone(),
            message_pusher.clone(),
            clock,
            send_message_usecase.clone(),
            purge_category_usecase.clone(),
        ));

        let state = Arc::new(AppState {
            connect_participant_usecase,
            disconnect_participant_usecase,
            send_message_usecase,
            moderation_usecase,
            message_pusher,
            outbound_buffer: options.outbound_buffer.max(1),
            trust_forwarded_for: options.trust_forwarded_for,
        });

        Self {
            state,
            purge_category_usecase,
        }
    }

    /// The purge use case, for the background scheduler
    pub fn purge_category_usecase(&self) -> Arc<PurgeCategoryUseCase> {
        self.purge_category_usecase.clone()
    }

    /// Build the router with every endpoint
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/state", get(get_state))
            .route("/api/ban", post(ban_user))
            .route("/api/unban", post(unban_user))
            .route("/api/ipban", post(ban_ip))
            .route("/api/unipban", post(unban_ip))
            .route("/api/giveadmin", post(grant_admin))
            .route("/api/removeadmin", post(revoke_admin))
            .route("/api/lock", post(lock_site))
            .route("/api/unlock", post(unlock_site))
            .route("/api/announce", post(announce))
            .route("/api/kick", post(kick))
            .route("/api/purge", post(purge))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the WebSocket chat server
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), ServerError> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        self.serve(listener).await
    }

    /// Serve on an already bound listener until Ctrl+C / SIGTERM
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        tracing::info!(
            "WebSocket chat server listening on {}",
            listener.local_addr()?
        );
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        let app = self.router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
