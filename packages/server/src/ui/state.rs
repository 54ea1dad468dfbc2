//! Shared application state.

use std::sync::Arc;

use crate::{
    domain::MessagePusher,
    usecase::{
        ConnectParticipantUseCase, DisconnectParticipantUseCase, ModerationUseCase,
        SendMessageUseCase,
    },
};

/// Shared application state
pub struct AppState {
    /// ConnectParticipantUseCase（接続・ユーザー登録のユースケース）
    pub connect_participant_usecase: Arc<ConnectParticipantUseCase>,
    /// DisconnectParticipantUseCase（切断のユースケース）
    pub disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
    /// SendMessageUseCase（メッセージ送信のユースケース）
    pub send_message_usecase: Arc<SendMessageUseCase>,
    /// ModerationUseCase（モデレーションコマンドのユースケース）
    pub moderation_usecase: Arc<ModerationUseCase>,
    /// MessagePusher（入力エラーを接続に返すために使う）
    pub message_pusher: Arc<dyn MessagePusher>,
    /// 接続ごとの送信キューの容量
    pub outbound_buffer: usize,
    /// `x-forwarded-for` をクライアント IP として信頼するか
    pub trust_forwarded_for: bool,
}
