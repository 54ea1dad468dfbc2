//! InMemory Repository 実装
//!
//! Directory / Site State / Message Log はメモリ上の値を正とし、
//! `open` で作成した場合のみファイルへライトスルーします。

pub mod directory;
pub mod message_log;
pub mod presence;
pub mod site_state;

pub use directory::InMemoryDirectoryRepository;
pub use message_log::InMemoryMessageLogRepository;
pub use presence::InMemoryPresenceRegistry;
pub use site_state::InMemorySiteStateRepository;
