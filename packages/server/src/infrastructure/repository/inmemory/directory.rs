//! InMemory Directory Repository 実装
//!
//! アカウント（`users.json`）と BAN 一覧（`bans.json`）をメモリ上に保持します。
//! `open` で作成した場合は変更のたびにファイルへ書き込みます（ライトスルー）。
//! 読み出しは常にメモリから行うため、送信ごとの BAN / ロール確認で I/O は発生しません。

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{
    Account, BanEntry, BanList, DirectoryRepository, RepositoryError, Role, Timestamp, Username,
};
use crate::infrastructure::repository::{BANS_FILE, JsonDocument, USERS_FILE};

/// インメモリ Directory Repository 実装
pub struct InMemoryDirectoryRepository {
    accounts: JsonDocument<Vec<Account>>,
    bans: JsonDocument<BanList>,
}

impl InMemoryDirectoryRepository {
    /// メモリのみの Directory Repository を作成
    pub fn new() -> Self {
        Self {
            accounts: JsonDocument::in_memory(Vec::new()),
            bans: JsonDocument::in_memory(BanList::default()),
        }
    }

    /// `data_dir` 配下のファイルを読み込み、ライトスルーの Directory Repository を作成
    pub async fn open(data_dir: &Path) -> Result<Self, RepositoryError> {
        Ok(Self {
            accounts: JsonDocument::open(data_dir.join(USERS_FILE), Vec::new()).await?,
            bans: JsonDocument::open(data_dir.join(BANS_FILE), BanList::default()).await?,
        })
    }
}

impl Default for InMemoryDirectoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryRepository for InMemoryDirectoryRepository {
    async fn find_account(&self, username: &Username) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .accounts
            .read(|accounts| {
                accounts
                    .iter()
                    .find(|account| &account.username == username)
                    .cloned()
            })
            .await)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, RepositoryError> {
        Ok(self.accounts.read(|accounts| accounts.clone()).await)
    }

    async fn create_account(&self, account: Account) -> Result<(), RepositoryError> {
        self.accounts
            .update(|accounts| {
                if accounts.iter().any(|a| a.username == account.username) {
                    return Err(RepositoryError::AccountAlreadyExists(
                        account.username.as_str().to_string(),
                    ));
                }
                accounts.push(account);
                Ok(())
            })
            .await
    }

    async fn set_role(&self, username: &Username, role: Role) -> Result<(), RepositoryError> {
        self.accounts
            .update(|accounts| {
                let account = accounts
                    .iter_mut()
                    .find(|a| &a.username == username)
                    .ok_or_else(|| RepositoryError::AccountNotFound(username.as_str().to_string()))?;
                account.role = role;
                Ok(())
            })
            .await
    }

    async fn add_username_ban(&self, ban: BanEntry) -> Result<(), RepositoryError> {
        self.bans
            .update(|bans| {
                bans.username.push(ban);
                Ok(())
            })
            .await
    }

    async fn remove_username_bans(&self, username: &str) -> Result<usize, RepositoryError> {
        self.bans
            .update(|bans| Ok(remove_subject(&mut bans.username, username)))
            .await
    }

    async fn add_ip_ban(&self, ban: BanEntry) -> Result<(), RepositoryError> {
        self.bans
            .update(|bans| {
                bans.ip.push(ban);
                Ok(())
            })
            .await
    }

    async fn remove_ip_bans(&self, ip: &str) -> Result<usize, RepositoryError> {
        self.bans
            .update(|bans| Ok(remove_subject(&mut bans.ip, ip)))
            .await
    }

    async fn find_active_username_ban(
        &self,
        username: &str,
        now: Timestamp,
    ) -> Result<Option<BanEntry>, RepositoryError> {
        Ok(self
            .bans
            .read(|bans| find_active(&bans.username, username, now))
            .await)
    }

    async fn find_active_ip_ban(
        &self,
        ip: &str,
        now: Timestamp,
    ) -> Result<Option<BanEntry>, RepositoryError> {
        Ok(self.bans.read(|bans| find_active(&bans.ip, ip, now)).await)
    }

    async fn get_bans(&self) -> Result<BanList, RepositoryError> {
        Ok(self.bans.read(|bans| bans.clone()).await)
    }
}

fn find_active(entries: &[BanEntry], subject: &str, now: Timestamp) -> Option<BanEntry> {
    entries
        .iter()
        .find(|ban| ban.subject == subject && ban.is_active(now))
        .cloned()
}

fn remove_subject(entries: &mut Vec<BanEntry>, subject: &str) -> usize {
    let before = entries.len();
    entries.retain(|ban| ban.subject != subject);
    before - entries.len()
}
