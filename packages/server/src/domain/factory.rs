//! ID の生成

use uuid::Uuid;

use super::ConnectionId;

/// 接続 ID のファクトリ
pub struct ConnectionIdFactory;

impl ConnectionIdFactory {
    /// UUID v4 ベースの接続 ID を生成
    pub fn generate() -> ConnectionId {
        ConnectionId::from(Uuid::new_v4())
    }
}
