//! HTTP API DTOs for moderation commands.

use serde::{Deserialize, Serialize};

use crate::domain::MessageKind;

/// `POST /api/ban`
#[derive(Debug, Clone, Deserialize)]
pub struct BanRequest {
    pub username: String,
    #[serde(default, alias = "durationMinutes")]
    pub duration_minutes: Option<u64>,
}

/// `POST /api/ipban`
#[derive(Debug, Clone, Deserialize)]
pub struct IpBanRequest {
    pub ip: String,
    #[serde(default, alias = "durationMinutes")]
    pub duration_minutes: Option<u64>,
}

/// `POST /api/unban`, `/api/giveadmin`, `/api/removeadmin`
#[derive(Debug, Clone, Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

/// `POST /api/unipban`
#[derive(Debug, Clone, Deserialize)]
pub struct IpRequest {
    pub ip: String,
}

/// `POST /api/announce`
#[derive(Debug, Clone, Deserialize)]
pub struct AnnounceRequest {
    pub content: String,
}

/// `POST /api/kick`
#[derive(Debug, Clone, Deserialize)]
pub struct KickRequest {
    pub username: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /api/purge`
#[derive(Debug, Clone, Deserialize)]
pub struct PurgeRequest {
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

/// モデレーションコマンドのレスポンス `{ok, error?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn error(code: &str) -> Self {
        Self {
            ok: false,
            error: Some(code.to_string()),
        }
    }
}

/// `GET /api/state`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateResponse {
    pub ok: bool,
    pub users: Vec<AccountDto>,
    pub bans: BansDto,
    pub site: SiteDto,
    pub online: Vec<PresenceDto>,
}

/// 認証情報を含まないアカウント情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDto {
    pub username: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BansDto {
    pub username: Vec<BanDto>,
    pub ip: Vec<BanDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanDto {
    pub subject: String,
    pub by: String,
    /// RFC 3339 (UTC)、無期限なら None
    pub expires: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDto {
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceDto {
    pub connection_id: String,
    pub username: String,
    pub ip: String,
}
