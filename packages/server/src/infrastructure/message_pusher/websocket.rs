//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - 接続ごとの送信キュー（有界 `mpsc::Sender<PushFrame>`）を管理
//! - ドメインイベントを JSON フレームにシリアライズして送信（push_to, broadcast）
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された sender を受け取り、`try_send` でキューに積むだけです。
//! キューが満杯・切断済みの接続への送信はその接続分だけ破棄され、
//! 他の接続への配信は継続されます。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc::error::TrySendError};

use crate::domain::{
    ConnectionId, MessagePushError, MessagePusher, PushFrame, PusherChannel, ServerEvent,
};
use crate::infrastructure::dto::websocket::ServerFrame;

/// WebSocket を使った MessagePusher 実装
///
/// ## 使用例
///
/// ```ignore
/// let pusher = WebSocketMessagePusher::new();
/// let (tx, rx) = tokio::sync::mpsc::channel(256);
/// pusher.register_connection(connection_id.clone(), tx).await;
/// pusher.push_to(&connection_id, &ServerEvent::Error(ErrorCode::Locked)).await?;
/// ```
#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// Key: ConnectionId, Value: 送信キュー
    connections: RwLock<HashMap<ConnectionId, PusherChannel>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }

    fn encode(event: &ServerEvent) -> Result<String, MessagePushError> {
        serde_json::to_string(&ServerFrame::from(event))
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))
    }
}

fn try_push(
    connection_id: &ConnectionId,
    sender: &PusherChannel,
    frame: PushFrame,
) -> Result<(), MessagePushError> {
    sender.try_send(frame).map_err(|e| match e {
        TrySendError::Full(_) => MessagePushError::BufferFull(connection_id.to_string()),
        TrySendError::Closed(_) => MessagePushError::PushFailed(format!(
            "connection '{}' is closed",
            connection_id
        )),
    })
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_connection(&self, connection_id: ConnectionId, sender: PusherChannel) {
        let mut connections = self.connections.write().await;
        tracing::debug!("Connection '{}' registered to MessagePusher", connection_id);
        connections.insert(connection_id, sender);
    }

    async fn unregister_connection(&self, connection_id: &ConnectionId) {
        let mut connections = self.connections.write().await;
        if connections.remove(connection_id).is_some() {
            tracing::debug!(
                "Connection '{}' unregistered from MessagePusher",
                connection_id
            );
        }
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError> {
        let payload = Self::encode(event)?;
        let connections = self.connections.read().await;

        let sender = connections
            .get(connection_id)
            .ok_or_else(|| MessagePushError::ConnectionNotFound(connection_id.to_string()))?;
        try_push(connection_id, sender, PushFrame::Text(payload))?;
        tracing::debug!("Pushed event to connection '{}'", connection_id);
        Ok(())
    }

    async fn broadcast(
        &self,
        targets: &[ConnectionId],
        event: &ServerEvent,
    ) -> Result<usize, MessagePushError> {
        if targets.is_empty() {
            return Ok(0);
        }

        let payload = Self::encode(event)?;
        let connections = self.connections.read().await;
        let mut delivered = 0;

        for target in targets {
            let Some(sender) = connections.get(target) else {
                // 切断直後の接続は静かに破棄する
                tracing::debug!("Connection '{}' not found during broadcast, skipping", target);
                continue;
            };
            // ブロードキャストでは一部の送信失敗を許容
            match try_push(target, sender, PushFrame::Text(payload.clone())) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!("Dropped event for connection '{}': {}", target, e),
            }
        }

        tracing::debug!("Broadcasted event to {}/{} connections", delivered, targets.len());
        Ok(delivered)
    }

    async fn close(&self, connection_id: &ConnectionId) -> Result<(), MessagePushError> {
        let mut connections = self.connections.write().await;
        let sender = connections
            .remove(connection_id)
            .ok_or_else(|| MessagePushError::ConnectionNotFound(connection_id.to_string()))?;

        // キューが満杯でも sender を破棄すれば送信ループは残りを流した後に終了する
        if let Err(e) = try_push(connection_id, &sender, PushFrame::Close) {
            tracing::debug!("Close frame not queued for '{}': {}", connection_id, e);
        }
        tracing::info!("Connection '{}' closed by server", connection_id);
        Ok(())
    }
}
