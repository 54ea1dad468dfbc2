//! UseCase: 参加者切断処理
//!
//! 自然な切断とキックの両方がこの経路で Presence から削除されます。
//! 何度呼ばれても安全です（2 回目以降は何もしない）。

use std::sync::Arc;

use crate::domain::{ConnectionId, MessagePusher, PresenceEntry, PresenceRegistry};

/// 参加者切断のユースケース
pub struct DisconnectParticipantUseCase {
    presence: Arc<dyn PresenceRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl DisconnectParticipantUseCase {
    /// 新しい DisconnectParticipantUseCase を作成
    pub fn new(presence: Arc<dyn PresenceRegistry>, message_pusher: Arc<dyn MessagePusher>) -> Self {
        Self {
            presence,
            message_pusher,
        }
    }

    /// 切断を実行
    ///
    /// # Returns
    ///
    /// * `Some(PresenceEntry)` - 登録済みだった接続のエントリ
    /// * `None` - 未登録（`register` 前の切断、または既に切断済み）
    pub async fn execute(&self, connection_id: &ConnectionId) -> Option<PresenceEntry> {
        let entry = self.presence.deregister(connection_id).await;
        self.message_pusher
            .unregister_connection(connection_id)
            .await;

        match &entry {
            Some(entry) => tracing::info!(
                "'{}' disconnected (connection '{}')",
                entry.username,
                connection_id
            ),
            None => tracing::debug!("Unregistered connection '{}' closed", connection_id),
        }

        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::test_support::{Fixture, connection};

    #[tokio::test]
    async fn test_disconnect_removes_presence_and_channel() {
        // テスト項目: 切断で Presence と送信キューの両方から削除される
        // given (前提条件):
        let fixture = Fixture::new();
        fixture.online("c1", "alice", "10.0.0.1").await;
        fixture.online("c2", "alice", "10.0.0.1").await;
        let (tx, _rx) = tokio::sync::mpsc::channel(4);
        fixture
            .pusher
            .register_connection(connection("c1"), tx)
            .await;
        let usecase = DisconnectParticipantUseCase::new(
            fixture.presence.clone(),
            fixture.pusher.clone(),
        );

        // when (操作):
        let entry = usecase.execute(&connection("c1")).await;

        // then (期待する結果):
        assert_eq!(entry.map(|e| e.username.into_string()), Some("alice".to_string()));
        assert!(fixture.pusher.registered.lock().await.is_empty());
        // 同じユーザーの他の接続は残る
        let remaining: Vec<ConnectionId> = fixture
            .presence
            .snapshot()
            .await
            .into_iter()
            .map(|e| e.connection_id)
            .collect();
        assert_eq!(remaining, vec![connection("c2")]);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        // テスト項目: 同じ接続を 2 回切断しても 2 回目は何もしない
        // given (前提条件):
        let fixture = Fixture::new();
        fixture.online("c1", "alice", "10.0.0.1").await;
        let usecase = DisconnectParticipantUseCase::new(
            fixture.presence.clone(),
            fixture.pusher.clone(),
        );

        // when (操作):
        let first = usecase.execute(&connection("c1")).await;
        let second = usecase.execute(&connection("c1")).await;

        // then (期待する結果):
        assert!(first.is_some());
        assert_eq!(second, None);
    }
}
