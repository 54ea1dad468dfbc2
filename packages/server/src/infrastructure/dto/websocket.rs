//! WebSocket frame DTOs.
//!
//! 全てのフレームは `type` フィールドでタグ付けされた JSON テキストフレーム。

use serde::{Deserialize, Serialize};

use crate::domain::MessageKind;

/// Client → Server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// 接続のユーザー名を登録する
    Register { username: String },
    /// メッセージを送信する
    Send { message: OutgoingMessageDto },
}

/// 送信するメッセージ本体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessageDto {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "to")]
    pub recipient: Option<RecipientDto>,
}

/// 宛先（dm は文字列、group は配列）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipientDto {
    One(String),
    Many(Vec<String>),
}

/// Server → Client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    History { messages: Vec<MessageDto> },
    Message { message: MessageDto },
    Error { code: String },
    CategoryCleared { category: MessageKind },
    ForcedDisconnect { reason: String },
}

/// 配信されるメッセージ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: u64,
    /// 送信者
    pub username: String,
    /// RFC 3339 (UTC)
    pub time: String,
    /// Unix timestamp (milliseconds)
    pub created_at: i64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<RecipientDto>,
}
