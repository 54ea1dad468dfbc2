//! 送信者・接続者のロール解決
//!
//! ロールの参照はここに集約し、1 回のルーティング判定の中では
//! ユーザーごとに一度だけ Directory を引く。

use std::collections::HashMap;

use crate::domain::{DirectoryRepository, PresenceEntry, Role, Username};

/// 未登録ユーザーの扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    /// true なら Directory に無いユーザーを `user` ロールとして受け入れる
    pub allow_unknown_users: bool,
}

/// ロール解決の失敗
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RoleLookupError {
    /// Directory にアカウントが無い（かつ未登録ユーザーを許可しない）
    Unknown,
    /// Directory の読み出しに失敗した
    Unavailable(String),
}

impl AccessPolicy {
    /// 送信者・接続者のロールを解決する（読み出し失敗は拒否側に倒す）
    pub(crate) async fn resolve_role(
        &self,
        directory: &dyn DirectoryRepository,
        username: &Username,
    ) -> Result<Role, RoleLookupError> {
        match directory.find_account(username).await {
            Ok(Some(account)) => Ok(account.role),
            Ok(None) if self.allow_unknown_users => Ok(Role::User),
            Ok(None) => Err(RoleLookupError::Unknown),
            Err(e) => Err(RoleLookupError::Unavailable(e.to_string())),
        }
    }
}

/// 配信先候補のロールをユーザーごとに一度だけ解決する
///
/// 読み出しに失敗したユーザーは `Role::User` として記録し、同じユーザーの
/// 他の接続で参照を繰り返さない。
pub(crate) async fn resolve_roles(
    directory: &dyn DirectoryRepository,
    presence: &[PresenceEntry],
) -> HashMap<Username, Role> {
    let mut roles = HashMap::new();

    for entry in presence {
        if roles.contains_key(&entry.username) {
            continue;
        }
        match directory.find_account(&entry.username).await {
            Ok(Some(account)) => {
                roles.insert(entry.username.clone(), account.role);
            }
            Ok(None) => {
                roles.insert(entry.username.clone(), Role::User);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to resolve role for '{}', treating as user: {}",
                    entry.username,
                    e
                );
                roles.insert(entry.username.clone(), Role::User);
            }
        }
    }

    roles
}
