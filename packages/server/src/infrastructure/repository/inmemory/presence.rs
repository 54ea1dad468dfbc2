//! InMemory Presence Registry 実装
//!
//! 接続 ID → PresenceEntry の HashMap を RwLock で保護します。
//! 呼び出し側には常にコピーを返し、内部の HashMap を直接公開しません。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{ConnectionId, PresenceEntry, PresenceRegistry, Username};

/// インメモリ Presence Registry 実装
#[derive(Default)]
pub struct InMemoryPresenceRegistry {
    entries: RwLock<HashMap<ConnectionId, PresenceEntry>>,
}

impl InMemoryPresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceRegistry for InMemoryPresenceRegistry {
    async fn register(&self, entry: PresenceEntry) {
        let mut entries = self.entries.write().await;
        tracing::debug!(
            "Presence registered: '{}' as '{}'",
            entry.connection_id,
            entry.username
        );
        entries.insert(entry.connection_id.clone(), entry);
    }

    async fn deregister(&self, connection_id: &ConnectionId) -> Option<PresenceEntry> {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(connection_id);
        if removed.is_some() {
            tracing::debug!("Presence deregistered: '{}'", connection_id);
        }
        removed
    }

    async fn snapshot(&self) -> Vec<PresenceEntry> {
        let entries = self.entries.read().await;
        let mut snapshot: Vec<PresenceEntry> = entries.values().cloned().collect();
        // Sort by connection_id for consistent ordering
        snapshot.sort_by(|a, b| a.connection_id.cmp(&b.connection_id));
        snapshot
    }

    async fn connections_of(&self, username: &Username) -> Vec<ConnectionId> {
        let entries = self.entries.read().await;
        let mut ids: Vec<ConnectionId> = entries
            .values()
            .filter(|entry| &entry.username == username)
            .map(|entry| entry.connection_id.clone())
            .collect();
        ids.sort();
        ids
    }
}
