//! UseCase layer
//!
//! Domain 層の trait（Repository, MessagePusher）にのみ依存し、
//! 送信判定・配信・モデレーションのビジネスロジックを実装します。

use std::sync::Arc;

use tokio::sync::Mutex;

pub mod access;
pub mod connect_participant;
pub mod disconnect_participant;
pub mod error;
pub mod moderation;
pub mod purge_category;
pub mod seed_host;
pub mod send_message;

#[cfg(test)]
pub(crate) mod test_support;

pub use access::AccessPolicy;
pub use connect_participant::ConnectParticipantUseCase;
pub use disconnect_participant::DisconnectParticipantUseCase;
pub use error::{ConnectError, ModerationError, PurgeError, SendMessageError};
pub use moderation::{ModerationSnapshot, ModerationUseCase};
pub use purge_category::PurgeCategoryUseCase;
pub use seed_host::{SeedHostUseCase, SeedOutcome};
pub use send_message::{Delivery, SendMessageUseCase};

/// 追記から配信まで、履歴取得から Presence 登録まで、削除から通知までを直列化するロック
///
/// 同じロックを共有するユースケース間では、ある接続が受け取る履歴とライブ配信に
/// 欠落や重複が生じない。
pub type DeliveryLock = Arc<Mutex<()>>;
