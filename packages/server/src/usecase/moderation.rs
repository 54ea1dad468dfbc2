//! UseCase: モデレーションコマンド
//!
//! | コマンド | 実行できるロール |
//! |---|---|
//! | ban / unban / announce / purge / state | host, admin |
//! | ipban / unipban / giveadmin / removeadmin / lock / unlock / kick | host |
//!
//! 発行者のロールは毎回 Directory から解決します（未登録の発行者は `forbidden`）。
//! 変更はストアに書き込まれた時点で以後の送信判定に反映されます。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - 各コマンドのロール判定と、ストアへの反映
//! - キック（通知 → 切断 → Presence からの削除）
//!
//! ### なぜこのテストが必要か
//! - 権限のないユーザーがモデレーション操作を実行できないことを保証
//! - host のロールは変更できないことを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：host による IP BAN、admin の付与と剥奪、ロック、キック
//! - 異常系：admin による host 専用コマンド、存在しないユーザー、接続のないユーザーのキック

use std::sync::Arc;

use agora_shared::time::{Clock, minutes_to_millis};

use crate::domain::{
    Account, BanEntry, BanList, DirectoryRepository, Message, MessageContent, MessageKind,
    MessagePusher, OutgoingMessage, PresenceEntry, PresenceRegistry, Role, ServerEvent, SiteState,
    SiteStateRepository, Timestamp, Username,
};

use super::{
    disconnect_participant::DisconnectParticipantUseCase, error::ModerationError,
    purge_category::PurgeCategoryUseCase, send_message::SendMessageUseCase,
};

const HOST_ONLY: &[Role] = &[Role::Host];
const HOST_OR_ADMIN: &[Role] = &[Role::Host, Role::Admin];

const DEFAULT_KICK_REASON: &str = "You have been disconnected by the host.";

/// `state` コマンドの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationSnapshot {
    pub accounts: Vec<Account>,
    pub bans: BanList,
    pub site: SiteState,
    pub online: Vec<PresenceEntry>,
}

/// モデレーションのユースケース
pub struct ModerationUseCase {
    directory: Arc<dyn DirectoryRepository>,
    site_state: Arc<dyn SiteStateRepository>,
    presence: Arc<dyn PresenceRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    send_message: Arc<SendMessageUseCase>,
    purge_category: Arc<PurgeCategoryUseCase>,
    disconnect: DisconnectParticipantUseCase,
}

impl ModerationUseCase {
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        site_state: Arc<dyn SiteStateRepository>,
        presence: Arc<dyn PresenceRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        send_message: Arc<SendMessageUseCase>,
        purge_category: Arc<PurgeCategoryUseCase>,
    ) -> Self {
        let disconnect = DisconnectParticipantUseCase::new(presence.clone(), message_pusher.clone());
        Self {
            directory,
            site_state,
            presence,
            message_pusher,
            clock,
            send_message,
            purge_category,
            disconnect,
        }
    }

    /// ユーザー名 BAN（`duration_minutes` が None または 0 なら無期限）
    pub async fn ban_user(
        &self,
        issuer: &Username,
        username: &str,
        duration_minutes: Option<u64>,
    ) -> Result<(), ModerationError> {
        self.authorize(issuer, HOST_OR_ADMIN).await?;
        let target = parse_username(username)?;
        let ban = BanEntry::new(
            target.into_string(),
            issuer.clone(),
            self.expiry(duration_minutes),
        );
        tracing::info!(
            "'{}' banned user '{}' (expires: {:?})",
            issuer,
            ban.subject,
            ban.expires_at.map(|t| t.value())
        );
        self.directory.add_username_ban(ban).await?;
        Ok(())
    }

    /// ユーザー名 BAN の解除（BAN が無くても成功）
    pub async fn unban_user(&self, issuer: &Username, username: &str) -> Result<(), ModerationError> {
        self.authorize(issuer, HOST_OR_ADMIN).await?;
        let target = parse_username(username)?;
        let removed = self.directory.remove_username_bans(target.as_str()).await?;
        tracing::info!("'{}' unbanned user '{}' ({} entries)", issuer, target, removed);
        Ok(())
    }

    /// IP BAN（`duration_minutes` が None または 0 なら無期限）
    pub async fn ban_ip(
        &self,
        issuer: &Username,
        ip: &str,
        duration_minutes: Option<u64>,
    ) -> Result<(), ModerationError> {
        self.authorize(issuer, HOST_ONLY).await?;
        let ip = parse_ip(ip)?;
        let ban = BanEntry::new(ip, issuer.clone(), self.expiry(duration_minutes));
        tracing::info!(
            "'{}' banned ip '{}' (expires: {:?})",
            issuer,
            ban.subject,
            ban.expires_at.map(|t| t.value())
        );
        self.directory.add_ip_ban(ban).await?;
        Ok(())
    }

    /// IP BAN の解除（BAN が無くても成功）
    pub async fn unban_ip(&self, issuer: &Username, ip: &str) -> Result<(), ModerationError> {
        self.authorize(issuer, HOST_ONLY).await?;
        let ip = parse_ip(ip)?;
        let removed = self.directory.remove_ip_bans(&ip).await?;
        tracing::info!("'{}' unbanned ip '{}' ({} entries)", issuer, ip, removed);
        Ok(())
    }

    /// admin ロールの付与
    pub async fn grant_admin(&self, issuer: &Username, username: &str) -> Result<(), ModerationError> {
        self.change_role(issuer, username, Role::Admin).await
    }

    /// admin ロールの剥奪（user に戻す）
    pub async fn revoke_admin(
        &self,
        issuer: &Username,
        username: &str,
    ) -> Result<(), ModerationError> {
        self.change_role(issuer, username, Role::User).await
    }

    pub async fn lock_site(&self, issuer: &Username) -> Result<(), ModerationError> {
        self.set_locked(issuer, true).await
    }

    pub async fn unlock_site(&self, issuer: &Username) -> Result<(), ModerationError> {
        self.set_locked(issuer, false).await
    }

    /// 発行者名義のアナウンスを送信する（通常の送信と同じ判定・配信経路を通る）
    pub async fn announce(
        &self,
        issuer: &Username,
        source_ip: &str,
        content: &str,
    ) -> Result<Message, ModerationError> {
        self.authorize(issuer, HOST_OR_ADMIN).await?;
        let content = MessageContent::new(content.to_string())
            .map_err(|e| ModerationError::InvalidInput(e.to_string()))?;
        let delivery = self
            .send_message
            .execute(
                issuer,
                source_ip,
                OutgoingMessage {
                    kind: MessageKind::Announcement,
                    content,
                    recipient: None,
                },
            )
            .await?;
        Ok(delivery.message)
    }

    /// 対象ユーザーの全接続に通知を送って切断し、切断した接続数を返す
    pub async fn kick(
        &self,
        issuer: &Username,
        username: &str,
        reason: Option<&str>,
    ) -> Result<usize, ModerationError> {
        self.authorize(issuer, HOST_ONLY).await?;
        let target = parse_username(username)?;
        let connections = self.presence.connections_of(&target).await;
        if connections.is_empty() {
            return Err(ModerationError::NotFound(target.into_string()));
        }

        let notice = ServerEvent::ForcedDisconnect {
            reason: reason.unwrap_or(DEFAULT_KICK_REASON).to_string(),
        };
        for connection_id in &connections {
            if let Err(e) = self.message_pusher.push_to(connection_id, &notice).await {
                tracing::warn!("Failed to send kick notice to '{}': {}", connection_id, e);
            }
            if let Err(e) = self.message_pusher.close(connection_id).await {
                tracing::warn!("Failed to close connection '{}': {}", connection_id, e);
            }
            self.disconnect.execute(connection_id).await;
        }

        tracing::info!(
            "'{}' kicked '{}' ({} connections)",
            issuer,
            target,
            connections.len()
        );
        Ok(connections.len())
    }

    /// 種別単位でメッセージを削除する
    pub async fn purge(&self, issuer: &Username, kind: MessageKind) -> Result<usize, ModerationError> {
        self.authorize(issuer, HOST_OR_ADMIN).await?;
        let removed = self.purge_category.execute(kind).await?;
        Ok(removed)
    }

    /// アカウント・BAN・サイト状態・接続中クライアントのスナップショット
    pub async fn state(&self, issuer: &Username) -> Result<ModerationSnapshot, ModerationError> {
        self.authorize(issuer, HOST_OR_ADMIN).await?;
        Ok(ModerationSnapshot {
            accounts: self.directory.list_accounts().await?,
            bans: self.directory.get_bans().await?,
            site: self.site_state.get_site_state().await?,
            online: self.presence.snapshot().await,
        })
    }

    async fn authorize(&self, issuer: &Username, allowed: &[Role]) -> Result<Role, ModerationError> {
        let account = self
            .directory
            .find_account(issuer)
            .await
            .map_err(|e| ModerationError::StoreUnavailable(e.to_string()))?
            .ok_or_else(|| ModerationError::Forbidden(format!("unknown issuer '{}'", issuer)))?;

        if !allowed.contains(&account.role) {
            tracing::info!(
                "'{}' ({}) is not allowed to run this command",
                issuer,
                account.role.as_str()
            );
            return Err(ModerationError::Forbidden(format!(
                "'{}' has role {}",
                issuer,
                account.role.as_str()
            )));
        }
        Ok(account.role)
    }

    async fn change_role(
        &self,
        issuer: &Username,
        username: &str,
        role: Role,
    ) -> Result<(), ModerationError> {
        self.authorize(issuer, HOST_ONLY).await?;
        let target = parse_username(username)?;
        let account = self
            .directory
            .find_account(&target)
            .await
            .map_err(|e| ModerationError::StoreUnavailable(e.to_string()))?
            .ok_or_else(|| ModerationError::NotFound(target.to_string()))?;
        if account.role == Role::Host {
            return Err(ModerationError::Forbidden(format!(
                "role of host '{}' cannot be changed",
                target
            )));
        }

        self.directory.set_role(&target, role).await?;
        tracing::info!("'{}' set role of '{}' to {}", issuer, target, role.as_str());
        Ok(())
    }

    async fn set_locked(&self, issuer: &Username, locked: bool) -> Result<(), ModerationError> {
        self.authorize(issuer, HOST_ONLY).await?;
        self.site_state.set_locked(locked).await?;
        tracing::info!(
            "'{}' {} the site",
            issuer,
            if locked { "locked" } else { "unlocked" }
        );
        Ok(())
    }

    fn expiry(&self, duration_minutes: Option<u64>) -> Option<Timestamp> {
        match duration_minutes {
            None | Some(0) => None,
            Some(minutes) => Some(
                Timestamp::new(self.clock.now_millis()).plus_millis(minutes_to_millis(minutes)),
            ),
        }
    }
}

fn parse_username(raw: &str) -> Result<Username, ModerationError> {
    Username::new(raw.trim().to_string()).map_err(|e| ModerationError::InvalidInput(e.to_string()))
}

fn parse_ip(raw: &str) -> Result<String, ModerationError> {
    let ip = raw.trim();
    if ip.is_empty() || ip.chars().any(char::is_whitespace) {
        return Err(ModerationError::InvalidInput(format!("invalid ip '{}'", raw)));
    }
    Ok(ip.to_string())
}
