//! MessagePusher trait 定義
//!
//! UseCase 層がクライアントへイベントを届けるためのインターフェース。
//! WebSocket などの具体的な送信手段は Infrastructure 層が提供します。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ConnectionId, MessagePushError, ServerEvent};

/// 接続ごとの送信キューに積まれるフレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFrame {
    /// シリアライズ済みのテキストフレーム
    Text(String),
    /// 接続を閉じる
    Close,
}

/// 接続ごとの送信キュー（有界）
pub type PusherChannel = mpsc::Sender<PushFrame>;

/// メッセージ通知の抽象化
///
/// 送信は fire-and-forget。遅い接続が他の接続への配信を止めてはならない。
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続の送信キューを登録
    async fn register_connection(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 接続の送信キューを登録解除
    async fn unregister_connection(&self, connection_id: &ConnectionId);

    /// 特定の接続へイベントを送信
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError>;

    /// 複数の接続へイベントを送信（一部の失敗は許容し、成功した件数を返す）
    async fn broadcast(
        &self,
        targets: &[ConnectionId],
        event: &ServerEvent,
    ) -> Result<usize, MessagePushError>;

    /// 接続を閉じるよう要求する
    async fn close(&self, connection_id: &ConnectionId) -> Result<(), MessagePushError>;
}
