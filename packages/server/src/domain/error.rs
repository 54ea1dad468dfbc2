//! ドメイン層のエラー定義

use thiserror::Error;

/// Value Object 生成時のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("username must not be empty")]
    UsernameEmpty,

    #[error("username must be at most {0} characters")]
    UsernameTooLong(usize),

    #[error("username must not contain whitespace")]
    UsernameContainsWhitespace,

    #[error("connection id must not be empty")]
    ConnectionIdEmpty,

    #[error("message content must not be empty")]
    MessageContentEmpty,

    #[error("message content must be at most {0} characters")]
    MessageContentTooLong(usize),

    #[error("unknown message kind: {0}")]
    UnknownMessageKind(String),

    #[error("recipient does not match message kind: {0}")]
    RecipientMismatch(&'static str),
}

/// Repository 操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("account already exists: {0}")]
    AccountAlreadyExists(String),

    /// 永続化（ファイル書き込み等）に失敗した
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// ストアの読み出しに失敗した
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// MessagePusher 操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("outbound buffer full for connection: {0}")]
    BufferFull(String),

    #[error("failed to push message: {0}")]
    PushFailed(String),
}
