//! UseCase 層のエラー定義
//!
//! 各エラーは `code()` でクライアントに返すエラーコードに対応付けられる。

use thiserror::Error;

use crate::domain::{ErrorCode, MessageKind, RepositoryError};

/// 接続（ユーザー登録）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("user is banned: {0}")]
    Banned(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ConnectError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConnectError::UnknownUser(_) => ErrorCode::AuthDenied,
            ConnectError::Banned(_) => ErrorCode::Banned,
            ConnectError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
        }
    }
}

/// メッセージ送信のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendMessageError {
    #[error("unknown sender: {0}")]
    UnknownSender(String),

    #[error("sender is banned: {0}")]
    Banned(String),

    #[error("site is locked")]
    Locked,

    #[error("sender is not allowed to send {0} messages")]
    Forbidden(MessageKind),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("failed to persist message: {0}")]
    PersistFailed(String),
}

impl SendMessageError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SendMessageError::UnknownSender(_) => ErrorCode::AuthDenied,
            SendMessageError::Banned(_) => ErrorCode::Banned,
            SendMessageError::Locked => ErrorCode::Locked,
            SendMessageError::Forbidden(_) => ErrorCode::Forbidden,
            SendMessageError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            SendMessageError::PersistFailed(_) => ErrorCode::PersistError,
        }
    }
}

/// モデレーションコマンドのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModerationError {
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Send(#[from] SendMessageError),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("failed to persist: {0}")]
    PersistFailed(String),
}

impl ModerationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ModerationError::Forbidden(_) => ErrorCode::Forbidden,
            ModerationError::NotFound(_) => ErrorCode::NotFound,
            ModerationError::InvalidInput(_) => ErrorCode::InvalidMessage,
            ModerationError::Send(e) => e.code(),
            ModerationError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            ModerationError::PersistFailed(_) => ErrorCode::PersistError,
        }
    }
}

impl From<RepositoryError> for ModerationError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::AccountNotFound(name) => ModerationError::NotFound(name),
            RepositoryError::AccountAlreadyExists(name) => {
                ModerationError::InvalidInput(format!("account already exists: {}", name))
            }
            RepositoryError::Persistence(msg) => ModerationError::PersistFailed(msg),
            RepositoryError::Unavailable(msg) => ModerationError::StoreUnavailable(msg),
        }
    }
}

/// 種別削除のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PurgeError {
    #[error("failed to purge {kind} messages: {source}")]
    Repository {
        kind: MessageKind,
        source: RepositoryError,
    },
}

impl From<PurgeError> for ModerationError {
    fn from(e: PurgeError) -> Self {
        match e {
            PurgeError::Repository { source, .. } => ModerationError::from(source),
        }
    }
}
