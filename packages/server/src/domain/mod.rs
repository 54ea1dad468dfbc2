//! Domain layer
//!
//! - `value_object`, `entity`: ドメインモデル
//! - `policy`: 配信ポリシー（純粋関数）
//! - `repository`, `message_pusher`: Infrastructure 層が実装するインターフェース

pub mod entity;
pub mod error;
pub mod event;
pub mod factory;
pub mod message_pusher;
pub mod policy;
pub mod repository;
pub mod value_object;

pub use entity::{
    Account, BanEntry, BanList, Message, MessageDraft, OutgoingMessage, PresenceEntry, SiteState,
};
pub use error::{MessagePushError, RepositoryError, ValueObjectError};
pub use event::{ErrorCode, ServerEvent};
pub use factory::ConnectionIdFactory;
pub use message_pusher::{MessagePusher, PushFrame, PusherChannel};
pub use repository::{
    DirectoryRepository, MessageLogRepository, PresenceRegistry, SiteStateRepository,
};
pub use value_object::{
    ConnectionId, MessageContent, MessageId, MessageKind, Recipient, Role, Timestamp, Username,
};

#[cfg(test)]
pub use repository::{MockDirectoryRepository, MockMessageLogRepository, MockSiteStateRepository};
