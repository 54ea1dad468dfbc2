//! InMemory Site State Repository 実装

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{RepositoryError, SiteState, SiteStateRepository};
use crate::infrastructure::repository::{JsonDocument, SITE_FILE};

/// インメモリ Site State Repository 実装（`open` ならライトスルー）
pub struct InMemorySiteStateRepository {
    site: JsonDocument<SiteState>,
}

impl InMemorySiteStateRepository {
    pub fn new() -> Self {
        Self {
            site: JsonDocument::in_memory(SiteState::default()),
        }
    }

    pub async fn open(data_dir: &Path) -> Result<Self, RepositoryError> {
        Ok(Self {
            site: JsonDocument::open(data_dir.join(SITE_FILE), SiteState::default()).await?,
        })
    }
}

impl Default for InMemorySiteStateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteStateRepository for InMemorySiteStateRepository {
    async fn get_site_state(&self) -> Result<SiteState, RepositoryError> {
        Ok(self.site.read(|site| *site).await)
    }

    async fn set_locked(&self, locked: bool) -> Result<(), RepositoryError> {
        self.site
            .update(|site| {
                site.locked = locked;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_and_unlock() {
        // テスト項目: サイトのロック状態を切り替えられる（初期状態はアンロック）
        // given (前提条件):
        let repo = InMemorySiteStateRepository::new();
        assert!(!repo.get_site_state().await.unwrap().locked);

        // when (操作):
        repo.set_locked(true).await.unwrap();
        let locked = repo.get_site_state().await.unwrap();
        repo.set_locked(false).await.unwrap();
        let unlocked = repo.get_site_state().await.unwrap();

        // then (期待する結果):
        assert!(locked.locked);
        assert!(!unlocked.locked);
    }
}
