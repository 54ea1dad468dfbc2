//! クライアントへ通知するイベント

use super::{Message, MessageKind};

/// エラーコード
///
/// 拒否理由としてクライアント / HTTP レスポンスに返される。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    AuthDenied,
    Banned,
    Locked,
    Forbidden,
    NotFound,
    PersistError,
    InvalidMessage,
    StoreUnavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthDenied => "auth_denied",
            ErrorCode::Banned => "banned",
            ErrorCode::Locked => "locked",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::PersistError => "persist_error",
            ErrorCode::InvalidMessage => "invalid_message",
            ErrorCode::StoreUnavailable => "store_unavailable",
        }
    }
}

/// サーバーからクライアントへのイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// 登録直後の履歴（閲覧権限でフィルタ済み）
    History(Vec<Message>),
    /// 配信されたメッセージ
    Message(Message),
    /// 送信者のみに返される拒否通知
    Error(ErrorCode),
    /// 種別単位のメッセージ削除
    CategoryCleared(MessageKind),
    /// キック直前の通知
    ForcedDisconnect { reason: String },
}
