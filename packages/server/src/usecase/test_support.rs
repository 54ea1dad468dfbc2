//! UseCase テスト用の共通部品

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    Account, ConnectionId, DirectoryRepository, MessagePushError, MessagePusher, PresenceEntry,
    PresenceRegistry, PusherChannel, Role, ServerEvent, Username,
};
use crate::infrastructure::repository::{
    InMemoryDirectoryRepository, InMemoryMessageLogRepository, InMemoryPresenceRegistry,
    InMemorySiteStateRepository,
};

/// 送信されたイベントを記録する MessagePusher
#[derive(Default)]
pub(crate) struct RecordingPusher {
    pub pushed: Mutex<Vec<(ConnectionId, ServerEvent)>>,
    pub closed: Mutex<Vec<ConnectionId>>,
    pub registered: Mutex<Vec<ConnectionId>>,
}

impl RecordingPusher {
    /// 指定した接続に届いたイベント
    pub async fn events_for(&self, connection_id: &str) -> Vec<ServerEvent> {
        self.pushed
            .lock()
            .await
            .iter()
            .filter(|(id, _)| id.as_str() == connection_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub async fn total_pushed(&self) -> usize {
        self.pushed.lock().await.len()
    }
}

#[async_trait]
impl MessagePusher for RecordingPusher {
    async fn register_connection(&self, connection_id: ConnectionId, _sender: PusherChannel) {
        self.registered.lock().await.push(connection_id);
    }

    async fn unregister_connection(&self, connection_id: &ConnectionId) {
        self.registered.lock().await.retain(|id| id != connection_id);
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError> {
        self.pushed
            .lock()
            .await
            .push((connection_id.clone(), event.clone()));
        Ok(())
    }

    async fn broadcast(
        &self,
        targets: &[ConnectionId],
        event: &ServerEvent,
    ) -> Result<usize, MessagePushError> {
        let mut pushed = self.pushed.lock().await;
        for target in targets {
            pushed.push((target.clone(), event.clone()));
        }
        Ok(targets.len())
    }

    async fn close(&self, connection_id: &ConnectionId) -> Result<(), MessagePushError> {
        self.closed.lock().await.push(connection_id.clone());
        Ok(())
    }
}

/// インメモリのストア一式
pub(crate) struct Fixture {
    pub directory: Arc<InMemoryDirectoryRepository>,
    pub site_state: Arc<InMemorySiteStateRepository>,
    pub message_log: Arc<InMemoryMessageLogRepository>,
    pub presence: Arc<InMemoryPresenceRegistry>,
    pub pusher: Arc<RecordingPusher>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            directory: Arc::new(InMemoryDirectoryRepository::new()),
            site_state: Arc::new(InMemorySiteStateRepository::new()),
            message_log: Arc::new(InMemoryMessageLogRepository::new()),
            presence: Arc::new(InMemoryPresenceRegistry::default()),
            pusher: Arc::new(RecordingPusher::default()),
        }
    }

    /// アカウントを作成する
    pub async fn account(&self, name: &str, role: Role) {
        self.directory
            .create_account(Account::new(username(name), "secret".to_string(), role))
            .await
            .unwrap();
    }

    /// 接続を Presence に登録する
    pub async fn online(&self, connection_id: &str, name: &str, ip: &str) {
        self.presence
            .register(PresenceEntry::new(
                connection(connection_id),
                username(name),
                ip.to_string(),
            ))
            .await;
    }
}

pub(crate) fn username(name: &str) -> Username {
    Username::new(name.to_string()).unwrap()
}

pub(crate) fn connection(id: &str) -> ConnectionId {
    ConnectionId::new(id.to_string()).unwrap()
}

/// テスト中に進められる Clock
pub(crate) struct ManualClock(std::sync::atomic::AtomicI64);

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self(std::sync::atomic::AtomicI64::new(start))
    }

    pub fn advance(&self, millis: i64) {
        self.0
            .fetch_add(millis, std::sync::atomic::Ordering::SeqCst);
    }
}

impl agora_shared::time::Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
