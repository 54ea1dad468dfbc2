//! UseCase: 種別単位のメッセージ削除

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{
    ConnectionId, MessageKind, MessageLogRepository, MessagePusher, PresenceRegistry, ServerEvent,
};

use super::{DeliveryLock, error::PurgeError};

/// 種別削除のユースケース
///
/// 削除後、接続中の全クライアントに `category_cleared` を通知する。
pub struct PurgeCategoryUseCase {
    message_log: Arc<dyn MessageLogRepository>,
    presence: Arc<dyn PresenceRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    delivery_lock: DeliveryLock,
}

impl PurgeCategoryUseCase {
    pub fn new(
        message_log: Arc<dyn MessageLogRepository>,
        presence: Arc<dyn PresenceRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            message_log,
            presence,
            message_pusher,
            delivery_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_delivery_lock(mut self, delivery_lock: DeliveryLock) -> Self {
        self.delivery_lock = delivery_lock;
        self
    }

    /// 指定種別を削除し、削除件数を返す
    pub async fn execute(&self, kind: MessageKind) -> Result<usize, PurgeError> {
        let _ordered = self.delivery_lock.lock().await;
        let removed = self
            .message_log
            .purge_kind(kind)
            .await
            .map_err(|source| PurgeError::Repository { kind, source })?;

        let targets: Vec<ConnectionId> = self
            .presence
            .snapshot()
            .await
            .into_iter()
            .map(|entry| entry.connection_id)
            .collect();
        if let Err(e) = self
            .message_pusher
            .broadcast(&targets, &ServerEvent::CategoryCleared(kind))
            .await
        {
            tracing::warn!("Failed to notify purge of {} messages: {}", kind, e);
        }

        tracing::info!("Purged {} {} messages", removed, kind);
        Ok(removed)
    }
}
