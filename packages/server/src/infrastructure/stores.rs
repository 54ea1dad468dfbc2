//! Repository 実装の組み立て

use std::{path::Path, sync::Arc};

use crate::domain::{
    DirectoryRepository, MessageLogRepository, PresenceRegistry, RepositoryError,
    SiteStateRepository,
};
use crate::infrastructure::repository::{
    InMemoryDirectoryRepository, InMemoryMessageLogRepository, InMemoryPresenceRegistry,
    InMemorySiteStateRepository,
};

/// サーバーが使う全ストア
#[derive(Clone)]
pub struct Stores {
    pub directory: Arc<dyn DirectoryRepository>,
    pub site_state: Arc<dyn SiteStateRepository>,
    pub message_log: Arc<dyn MessageLogRepository>,
    pub presence: Arc<dyn PresenceRegistry>,
}

impl Stores {
    /// 全てメモリのみのストア
    pub fn in_memory() -> Self {
        Self {
            directory: Arc::new(InMemoryDirectoryRepository::new()),
            site_state: Arc::new(InMemorySiteStateRepository::new()),
            message_log: Arc::new(InMemoryMessageLogRepository::new()),
            presence: Arc::new(InMemoryPresenceRegistry::new()),
        }
    }

    /// `data_dir` 配下の JSON ファイルに永続化するストア
    ///
    /// Presence Registry は常にメモリのみ。
    pub async fn open(data_dir: &Path) -> Result<Self, RepositoryError> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| RepositoryError::Unavailable(format!("{}: {}", data_dir.display(), e)))?;

        Ok(Self {
            directory: Arc::new(InMemoryDirectoryRepository::open(data_dir).await?),
            site_state: Arc::new(InMemorySiteStateRepository::open(data_dir).await?),
            message_log: Arc::new(InMemoryMessageLogRepository::open(data_dir).await?),
            presence: Arc::new(InMemoryPresenceRegistry::new()),
        })
    }
}
