//! Entity 定義
//!
//! - `Account`: ユーザーアカウント（ロールを持つ）
//! - `BanEntry`: ユーザー名 / IP の BAN
//! - `SiteState`: サイト全体のロック状態
//! - `OutgoingMessage` / `MessageDraft` / `Message`: 送信から追記までのメッセージ
//! - `PresenceEntry`: 接続中のクライアント

use serde::{Deserialize, Serialize};

use super::{
    ConnectionId, MessageContent, MessageId, MessageKind, Recipient, Role, Timestamp, Username,
};

/// ユーザーアカウント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: Username,
    /// 認証情報（照合はこのサービスの外側で行う）
    pub credential: String,
    #[serde(default)]
    pub role: Role,
}

impl Account {
    pub fn new(username: Username, credential: String, role: Role) -> Self {
        Self {
            username,
            credential,
            role,
        }
    }
}

/// BAN エントリ
///
/// `subject` はユーザー名 BAN ならユーザー名、IP BAN なら IP アドレス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEntry {
    pub subject: String,
    pub issued_by: Username,
    /// 期限（None は無期限）
    pub expires_at: Option<Timestamp>,
}

impl BanEntry {
    pub fn new(subject: String, issued_by: Username, expires_at: Option<Timestamp>) -> Self {
        Self {
            subject,
            issued_by,
            expires_at,
        }
    }

    /// `now` 時点で有効な BAN かどうか
    pub fn is_active(&self, now: Timestamp) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at > now,
        }
    }
}

/// ユーザー名 BAN と IP BAN の一覧
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanList {
    #[serde(default)]
    pub username: Vec<BanEntry>,
    #[serde(default)]
    pub ip: Vec<BanEntry>,
}

/// サイト状態
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteState {
    pub locked: bool,
}

/// クライアントが送信したメッセージ（送信者・時刻はまだ付与されていない）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub kind: MessageKind,
    pub content: MessageContent,
    pub recipient: Option<Recipient>,
}

/// 送信前のメッセージ（ID は Message Log への追記時に払い出される）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub sender: Username,
    pub created_at: Timestamp,
    pub kind: MessageKind,
    pub content: MessageContent,
    pub recipient: Option<Recipient>,
}

/// Message Log に追記済みのメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Username,
    pub created_at: Timestamp,
    pub kind: MessageKind,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Recipient>,
}

impl Message {
    pub fn from_draft(id: MessageId, draft: MessageDraft) -> Self {
        Self {
            id,
            sender: draft.sender,
            created_at: draft.created_at,
            kind: draft.kind,
            content: draft.content,
            recipient: draft.recipient,
        }
    }
}

/// 接続中のクライアント
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceEntry {
    pub connection_id: ConnectionId,
    pub username: Username,
    pub source_ip: String,
}

impl PresenceEntry {
    pub fn new(connection_id: ConnectionId, username: Username, source_ip: String) -> Self {
        Self {
            connection_id,
            username,
            source_ip,
        }
    }
}
