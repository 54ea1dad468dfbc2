//! UseCase: 起動時の host アカウント作成
//!
//! Directory に host が一人もいない場合のみ、指定したアカウントを host として作成します。
//! 同名の一般アカウントが既にある場合は host に昇格させます。

use std::sync::Arc;

use crate::domain::{Account, DirectoryRepository, RepositoryError, Role, Username};

/// 実行結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// 既に host が存在したため何もしなかった
    HostExists,
    /// host アカウントを新規作成した
    Created,
    /// 既存アカウントを host に昇格した
    Promoted,
}

pub struct SeedHostUseCase {
    directory: Arc<dyn DirectoryRepository>,
}

impl SeedHostUseCase {
    pub fn new(directory: Arc<dyn DirectoryRepository>) -> Self {
        Self { directory }
    }

    pub async fn execute(
        &self,
        username: Username,
        credential: String,
    ) -> Result<SeedOutcome, RepositoryError> {
        let accounts = self.directory.list_accounts().await?;
        if accounts.iter().any(|account| account.role == Role::Host) {
            return Ok(SeedOutcome::HostExists);
        }

        if accounts.iter().any(|account| account.username == username) {
            self.directory.set_role(&username, Role::Host).await?;
            tracing::info!("Promoted '{}' to host", username);
            return Ok(SeedOutcome::Promoted);
        }

        tracing::info!("Created host account '{}'", username);
        self.directory
            .create_account(Account::new(username, credential, Role::Host))
            .await?;
        Ok(SeedOutcome::Created)
    }
}
