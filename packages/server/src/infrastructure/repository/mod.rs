//! Repository 実装

pub mod document;
pub mod inmemory;

pub use document::JsonDocument;
pub use inmemory::{
    InMemoryDirectoryRepository, InMemoryMessageLogRepository, InMemoryPresenceRegistry,
    InMemorySiteStateRepository,
};

/// アカウント一覧のファイル名
pub const USERS_FILE: &str = "users.json";
/// BAN 一覧のファイル名
pub const BANS_FILE: &str = "bans.json";
/// サイト状態のファイル名
pub const SITE_FILE: &str = "site.json";
/// メッセージログのファイル名（JSON Lines）
pub const MESSAGES_FILE: &str = "messages.jsonl";
/// 払い出し済み ID の最大値を保持するファイル名
pub const MESSAGES_SEQUENCE_FILE: &str = "messages.seq.json";
