//! Repository trait 定義
//!
//! ドメイン層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! - `DirectoryRepository`: アカウントと BAN
//! - `SiteStateRepository`: サイトのロック状態
//! - `MessageLogRepository`: 追記専用のメッセージログ
//! - `PresenceRegistry`: 接続中クライアントの登録簿（永続化しない）

use async_trait::async_trait;

use super::{
    Account, BanEntry, BanList, ConnectionId, Message, MessageDraft, MessageKind, PresenceEntry,
    RepositoryError, Role, SiteState, Timestamp, Username,
};

/// Directory Store（アカウントと BAN の永続ストア）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// ユーザー名でアカウントを検索
    async fn find_account(&self, username: &Username) -> Result<Option<Account>, RepositoryError>;

    /// 全アカウントを取得
    async fn list_accounts(&self) -> Result<Vec<Account>, RepositoryError>;

    /// アカウントを作成（既に存在する場合は `AccountAlreadyExists`）
    async fn create_account(&self, account: Account) -> Result<(), RepositoryError>;

    /// ロールを変更（存在しない場合は `AccountNotFound`）
    async fn set_role(&self, username: &Username, role: Role) -> Result<(), RepositoryError>;

    /// ユーザー名 BAN を追加
    async fn add_username_ban(&self, ban: BanEntry) -> Result<(), RepositoryError>;

    /// ユーザー名 BAN を解除し、削除した件数を返す
    async fn remove_username_bans(&self, username: &str) -> Result<usize, RepositoryError>;

    /// IP BAN を追加
    async fn add_ip_ban(&self, ban: BanEntry) -> Result<(), RepositoryError>;

    /// IP BAN を解除し、削除した件数を返す
    async fn remove_ip_bans(&self, ip: &str) -> Result<usize, RepositoryError>;

    /// `now` 時点で有効なユーザー名 BAN を検索
    async fn find_active_username_ban(
        &self,
        username: &str,
        now: Timestamp,
    ) -> Result<Option<BanEntry>, RepositoryError>;

    /// `now` 時点で有効な IP BAN を検索
    async fn find_active_ip_ban(
        &self,
        ip: &str,
        now: Timestamp,
    ) -> Result<Option<BanEntry>, RepositoryError>;

    /// BAN 一覧を取得
    async fn get_bans(&self) -> Result<BanList, RepositoryError>;
}

/// Site State Store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SiteStateRepository: Send + Sync {
    async fn get_site_state(&self) -> Result<SiteState, RepositoryError>;

    async fn set_locked(&self, locked: bool) -> Result<(), RepositoryError>;
}

/// Message Log
///
/// 追記は直列化され、払い出される `MessageId` は追記順に単調増加する。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageLogRepository: Send + Sync {
    /// メッセージを追記し、ID を払い出す。永続化に失敗した場合はログに残らない。
    async fn append(&self, draft: MessageDraft) -> Result<Message, RepositoryError>;

    /// 全メッセージを追記順に取得
    async fn list_messages(&self) -> Result<Vec<Message>, RepositoryError>;

    /// 指定種別のメッセージを全て削除し、削除した件数を返す
    async fn purge_kind(&self, kind: MessageKind) -> Result<usize, RepositoryError>;
}

/// Presence Registry
///
/// 接続 ID → {ユーザー名, 送信元 IP} の登録簿。`snapshot` は一貫したコピーを返す。
#[async_trait]
pub trait PresenceRegistry: Send + Sync {
    /// 登録（同じ接続 ID なら上書き）
    async fn register(&self, entry: PresenceEntry);

    /// 登録解除（登録されていなければ None）
    async fn deregister(&self, connection_id: &ConnectionId) -> Option<PresenceEntry>;

    /// 現時点の全エントリのコピー
    async fn snapshot(&self) -> Vec<PresenceEntry>;

    /// 指定ユーザーの全接続 ID
    async fn connections_of(&self, username: &Username) -> Vec<ConnectionId>;
}
