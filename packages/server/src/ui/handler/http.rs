//! HTTP API endpoint handlers.
//!
//! Moderation commands take the issuer from the `x-chat-user` header and
//! answer with `{"ok": bool, "error"?: code}`.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{HeaderMap, StatusCode, request::Parts},
};

use crate::{
    domain::{ErrorCode, Username},
    infrastructure::dto::http::{
        AnnounceRequest, BanRequest, CommandResponse, IpBanRequest, IpRequest, KickRequest,
        PurgeRequest, SiteDto, StateResponse, UsernameRequest,
    },
    ui::state::AppState,
    usecase::ModerationError,
};

use super::client_ip;

const ISSUER_HEADER: &str = "x-chat-user";

type CommandResult = (StatusCode, Json<CommandResponse>);

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn ban_user(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
    Json(req): Json<BanRequest>,
) -> CommandResult {
    respond(
        state
            .moderation_usecase
            .ban_user(&issuer, &req.username, req.duration_minutes)
            .await,
    )
}

pub async fn unban_user(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
    Json(req): Json<UsernameRequest>,
) -> CommandResult {
    respond(state.moderation_usecase.unban_user(&issuer, &req.username).await)
}

pub async fn ban_ip(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
    Json(req): Json<IpBanRequest>,
) -> CommandResult {
    respond(
        state
            .moderation_usecase
            .ban_ip(&issuer, &req.ip, req.duration_minutes)
            .await,
    )
}

pub async fn unban_ip(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
    Json(req): Json<IpRequest>,
) -> CommandResult {
    respond(state.moderation_usecase.unban_ip(&issuer, &req.ip).await)
}

pub async fn grant_admin(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
    Json(req): Json<UsernameRequest>,
) -> CommandResult {
    respond(state.moderation_usecase.grant_admin(&issuer, &req.username).await)
}

pub async fn revoke_admin(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
    Json(req): Json<UsernameRequest>,
) -> CommandResult {
    respond(state.moderation_usecase.revoke_admin(&issuer, &req.username).await)
}

pub async fn lock_site(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
) -> CommandResult {
    respond(state.moderation_usecase.lock_site(&issuer).await)
}

pub async fn unlock_site(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
) -> CommandResult {
    respond(state.moderation_usecase.unlock_site(&issuer).await)
}

pub async fn announce(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Issuer(issuer): Issuer,
    headers: HeaderMap,
    Json(req): Json<AnnounceRequest>,
) -> CommandResult {
    let source_ip = client_ip(&headers, peer, state.trust_forwarded_for);
    respond(
        state
            .moderation_usecase
            .announce(&issuer, &source_ip, &req.content)
            .await
            .map(|_| ()),
    )
}

pub async fn kick(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
    Json(req): Json<KickRequest>,
) -> CommandResult {
    respond(
        state
            .moderation_usecase
            .kick(&issuer, &req.username, req.reason.as_deref())
            .await
            .map(|_| ()),
    )
}

pub async fn purge(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
    Json(req): Json<PurgeRequest>,
) -> CommandResult {
    respond(
        state
            .moderation_usecase
            .purge(&issuer, req.kind)
            .await
            .map(|_| ()),
    )
}

pub async fn get_state(
    State(state): State<Arc<AppState>>,
    Issuer(issuer): Issuer,
) -> Result<Json<StateResponse>, CommandResult> {
    let snapshot = state
        .moderation_usecase
        .state(&issuer)
        .await
        .map_err(|e| rejection(e.code()))?;

    // Domain Model から DTO への変換
    Ok(Json(StateResponse {
        ok: true,
        users: snapshot.accounts.iter().map(Into::into).collect(),
        bans: (&snapshot.bans).into(),
        site: SiteDto {
            locked: snapshot.site.locked,
        },
        online: snapshot.online.iter().map(Into::into).collect(),
    }))
}

/// Issuer named by the `x-chat-user` header; a missing or malformed header is `forbidden`
pub struct Issuer(pub Username);

impl<S> FromRequestParts<S> for Issuer
where
    S: Send + Sync,
{
    type Rejection = CommandResult;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        issuer(&parts.headers).map(Issuer)
    }
}

fn issuer(headers: &HeaderMap) -> Result<Username, CommandResult> {
    headers
        .get(ISSUER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Username::new(value.trim().to_string()).ok())
        .ok_or_else(|| rejection(ErrorCode::Forbidden))
}

fn respond(result: Result<(), ModerationError>) -> CommandResult {
    match result {
        Ok(()) => (StatusCode::OK, Json(CommandResponse::ok())),
        Err(e) => {
            tracing::info!("Moderation command rejected: {}", e);
            rejection(e.code())
        }
    }
}

fn rejection(code: ErrorCode) -> CommandResult {
    (status_for(code), Json(CommandResponse::from(code)))
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::AuthDenied | ErrorCode::Banned | ErrorCode::Locked | ErrorCode::Forbidden => {
            StatusCode::FORBIDDEN
        }
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::InvalidMessage => StatusCode::BAD_REQUEST,
        ErrorCode::PersistError => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}
