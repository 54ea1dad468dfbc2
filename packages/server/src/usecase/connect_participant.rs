//! UseCase: 参加者接続処理
//!
//! 接続の確立（送信キューの登録）と、`register` によるユーザー登録を扱います。
//! 登録が成功すると Presence Registry に追加され、閲覧権限でフィルタした履歴が
//! その接続にだけ送られます。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectParticipantUseCase::execute() メソッド
//! - 登録時の履歴再生（一般ユーザーはフィルタ済み、admin / host は全件）
//!
//! ### なぜこのテストが必要か
//! - 履歴再生はライブ配信と同じ閲覧規則に従わなければならない
//! - 未登録ユーザー・BAN 中のユーザーが Presence に載らないことを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：一般ユーザー / admin の登録
//! - 異常系：未登録ユーザー、BAN 中のユーザー、Directory の読み出し失敗

use std::sync::Arc;

use agora_shared::time::Clock;
use tokio::sync::Mutex;

use crate::domain::{
    ConnectionId, DirectoryRepository, Message, MessageLogRepository, MessagePusher,
    PresenceEntry, PresenceRegistry, PusherChannel, ServerEvent, Timestamp, Username, policy,
};

use super::{
    DeliveryLock,
    access::{AccessPolicy, RoleLookupError},
    error::ConnectError,
};

/// 参加者接続のユースケース
pub struct ConnectParticipantUseCase {
    directory: Arc<dyn DirectoryRepository>,
    message_log: Arc<dyn MessageLogRepository>,
    presence: Arc<dyn PresenceRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    access: AccessPolicy,
    delivery_lock: DeliveryLock,
}

impl ConnectParticipantUseCase {
    /// 新しい ConnectParticipantUseCase を作成
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        message_log: Arc<dyn MessageLogRepository>,
        presence: Arc<dyn PresenceRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            message_log,
            presence,
            message_pusher,
            clock,
            access: AccessPolicy::default(),
            delivery_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 未登録ユーザーの扱いを設定
    pub fn with_access_policy(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    /// 送信処理と共有する配信ロックを設定
    pub fn with_delivery_lock(mut self, delivery_lock: DeliveryLock) -> Self {
        self.delivery_lock = delivery_lock;
        self
    }

    /// 接続の送信キューを登録する（ユーザー登録前でもエラー通知を受け取れるようにする）
    pub async fn open(&self, connection_id: ConnectionId, sender: PusherChannel) {
        self.message_pusher
            .register_connection(connection_id, sender)
            .await;
    }

    /// ユーザー登録を実行
    ///
    /// # Arguments
    ///
    /// * `connection_id` - 登録する接続
    /// * `username` - 名乗ったユーザー名
    /// * `source_ip` - 接続元 IP
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Message>)` - その接続に送った履歴
    /// * `Err(ConnectError)` - 登録拒否（Presence は変更されない）
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        username: Username,
        source_ip: String,
    ) -> Result<Vec<Message>, ConnectError> {
        let role = self
            .access
            .resolve_role(self.directory.as_ref(), &username)
            .await
            .map_err(|e| match e {
                RoleLookupError::Unknown => ConnectError::UnknownUser(username.to_string()),
                RoleLookupError::Unavailable(msg) => ConnectError::StoreUnavailable(msg),
            })?;

        let now = Timestamp::new(self.clock.now_millis());
        let username_ban = self
            .directory
            .find_active_username_ban(username.as_str(), now)
            .await
            .map_err(|e| ConnectError::StoreUnavailable(e.to_string()))?;
        let ip_ban = self
            .directory
            .find_active_ip_ban(&source_ip, now)
            .await
            .map_err(|e| ConnectError::StoreUnavailable(e.to_string()))?;
        if username_ban.is_some() || ip_ban.is_some() {
            return Err(ConnectError::Banned(username.to_string()));
        }

        // 履歴の取得と Presence への追加の間に配信が割り込まないようにする
        let _ordered = self.delivery_lock.lock().await;
        let messages = self
            .message_log
            .list_messages()
            .await
            .map_err(|e| ConnectError::StoreUnavailable(e.to_string()))?;
        let history = policy::filter_history(&messages, &username, role);

        self.presence
            .register(PresenceEntry::new(
                connection_id.clone(),
                username.clone(),
                source_ip,
            ))
            .await;

        if let Err(e) = self
            .message_pusher
            .push_to(connection_id, &ServerEvent::History(history.clone()))
            .await
        {
            tracing::warn!("Failed to send history to '{}': {}", connection_id, e);
        }

        tracing::info!(
            "'{}' registered on connection '{}' as {} ({} messages replayed)",
            username,
            connection_id,
            role.as_str(),
            history.len()
        );

        Ok(history)
    }
}
