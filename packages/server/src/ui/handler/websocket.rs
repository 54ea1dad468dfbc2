//! WebSocket connection handlers.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use tokio::sync::mpsc;

use crate::{
    domain::{
        ConnectionId, ConnectionIdFactory, ErrorCode, OutgoingMessage, PushFrame, ServerEvent,
        Username,
    },
    infrastructure::dto::websocket::ClientFrame,
    ui::state::AppState,
};

use super::client_ip;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let source_ip = client_ip(&headers, peer, state.trust_forwarded_for);
    ws.on_upgrade(move |socket| handle_socket(socket, state, source_ip))
}

/// Spawns a task that drains the connection's outbound queue into the WebSocket sink.
///
/// The task ends on `PushFrame::Close`, when the queue is closed, or when the
/// socket can no longer be written to.
fn pusher_loop(
    mut rx: mpsc::Receiver<PushFrame>,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                PushFrame::Text(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                PushFrame::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        let _ = sender.close().await;
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, source_ip: String) {
    let connection_id = ConnectionIdFactory::generate();
    let (tx, rx) = mpsc::channel(state.outbound_buffer);
    state
        .connect_participant_usecase
        .open(connection_id.clone(), tx)
        .await;
    tracing::info!("Connection '{}' opened from {}", connection_id, source_ip);

    let (sender, mut receiver) = socket.split();

    let state_clone = state.clone();
    let connection_id_clone = connection_id.clone();

    // Spawn a task to receive frames from this client
    let mut recv_task = tokio::spawn(async move {
        let mut session = Session::default();
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", connection_id_clone, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    handle_client_frame(
                        &state_clone,
                        &connection_id_clone,
                        &source_ip,
                        &mut session,
                        text.as_str(),
                    )
                    .await;
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", connection_id_clone);
                    break;
                }
                // Ping/pong is handled automatically by the WebSocket protocol
                _ => {}
            }
        }
    });

    // Spawn a task to deliver queued frames to this client
    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state
        .disconnect_participant_usecase
        .execute(&connection_id)
        .await;
}

/// Per-connection state owned by the receive task
#[derive(Default)]
struct Session {
    username: Option<Username>,
}

async fn handle_client_frame(
    state: &AppState,
    connection_id: &ConnectionId,
    source_ip: &str,
    session: &mut Session,
    text: &str,
) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!("Invalid frame from '{}': {}", connection_id, e);
            reject(state, connection_id, ErrorCode::InvalidMessage).await;
            return;
        }
    };

    match frame {
        ClientFrame::Register { username } => {
            let Ok(username) = Username::new(username) else {
                reject(state, connection_id, ErrorCode::InvalidMessage).await;
                return;
            };
            match state
                .connect_participant_usecase
                .execute(connection_id, username.clone(), source_ip.to_string())
                .await
            {
                Ok(_) => session.username = Some(username),
                Err(e) => {
                    tracing::info!("Registration on '{}' rejected: {}", connection_id, e);
                    reject(state, connection_id, e.code()).await;
                }
            }
        }
        ClientFrame::Send { message } => {
            let Some(sender) = session.username.as_ref() else {
                reject(state, connection_id, ErrorCode::AuthDenied).await;
                return;
            };
            let outgoing = match OutgoingMessage::try_from(message) {
                Ok(outgoing) => outgoing,
                Err(e) => {
                    tracing::debug!("Invalid message from '{}': {}", sender, e);
                    reject(state, connection_id, ErrorCode::InvalidMessage).await;
                    return;
                }
            };
            if let Err(e) = state
                .send_message_usecase
                .execute(sender, source_ip, outgoing)
                .await
            {
                tracing::info!("Message from '{}' rejected: {}", sender, e);
                reject(state, connection_id, e.code()).await;
            }
        }
    }
}

/// Report a rejection to the initiating connection only
async fn reject(state: &AppState, connection_id: &ConnectionId, code: ErrorCode) {
    if let Err(e) = state
        .message_pusher
        .push_to(connection_id, &ServerEvent::Error(code))
        .await
    {
        tracing::warn!("Failed to report '{}' to '{}': {}", code.as_str(), connection_id, e);
    }
}
