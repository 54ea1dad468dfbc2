//! UseCase: メッセージ送信処理
//!
//! 送信は「送信可否の判定 → Message Log への追記 → 閲覧権限による配信先計算 → 配信」
//! の順に処理されます。判定で拒否された場合は何も永続化・配信されません。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SendMessageUseCase::execute() の送信可否判定（BAN / ロック / ロール）
//! - dm / group / global の配信先計算（admin / host は全てを受信）
//!
//! ### なぜこのテストが必要か
//! - 配信先の誤りは私的なメッセージの漏洩に直結する
//! - 判定で拒否された送信が永続化・配信されないことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：alice → bob の dm は carol に届かず admin1 には届く
//! - 異常系：BAN 中の送信者、ロック中の一般ユーザー、追記の失敗
//! - エッジケース：期限切れの IP BAN、ストアの読み出し失敗（拒否側に倒す）

use std::sync::Arc;

use agora_shared::time::Clock;
use tokio::sync::Mutex;

use crate::domain::{
    ConnectionId, DirectoryRepository, Message, MessageDraft, MessageKind, MessageLogRepository,
    MessagePusher, OutgoingMessage, PresenceRegistry, ServerEvent, SiteStateRepository,
    Timestamp, Username, policy,
};

use super::{
    DeliveryLock,
    access::{AccessPolicy, RoleLookupError, resolve_roles},
    error::SendMessageError,
};

/// 送信結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// 追記されたメッセージ（ID 払い出し済み）
    pub message: Message,
    /// 配信対象の接続
    pub recipients: Vec<ConnectionId>,
}

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    directory: Arc<dyn DirectoryRepository>,
    site_state: Arc<dyn SiteStateRepository>,
    message_log: Arc<dyn MessageLogRepository>,
    presence: Arc<dyn PresenceRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    access: AccessPolicy,
    delivery_lock: DeliveryLock,
}

impl SendMessageUseCase {
    /// 新しい SendMessageUseCase を作成
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        site_state: Arc<dyn SiteStateRepository>,
        message_log: Arc<dyn MessageLogRepository>,
        presence: Arc<dyn PresenceRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            site_state,
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

    /// 接続時の履歴再生と共有する配信ロックを設定
    pub fn with_delivery_lock(mut self, delivery_lock: DeliveryLock) -> Self {
        self.delivery_lock = delivery_lock;
        self
    }

    /// メッセージ送信を実行
    ///
    /// # Arguments
    ///
    /// * `sender` - 送信者（登録済みの接続のユーザー名、またはコマンド発行者）
    /// * `source_ip` - 送信元 IP（IP BAN の判定に使う）
    /// * `outgoing` - クライアントが送信したメッセージ
    ///
    /// # Returns
    ///
    /// * `Ok(Delivery)` - 追記されたメッセージと配信対象
    /// * `Err(SendMessageError)` - 拒否（何も永続化・配信されていない）
    pub async fn execute(
        &self,
        sender: &Username,
        source_ip: &str,
        outgoing: OutgoingMessage,
    ) -> Result<Delivery, SendMessageError> {
        // 1. 送信者のロールを解決
        let role = self
            .access
            .resolve_role(self.directory.as_ref(), sender)
            .await
            .map_err(|e| match e {
                RoleLookupError::Unknown => SendMessageError::UnknownSender(sender.to_string()),
                RoleLookupError::Unavailable(msg) => SendMessageError::StoreUnavailable(msg),
            })?;
        let now = Timestamp::new(self.clock.now_millis());

        // 2. ユーザー名 BAN / IP BAN
        let username_ban = self
            .directory
            .find_active_username_ban(sender.as_str(), now)
            .await
            .map_err(|e| SendMessageError::StoreUnavailable(e.to_string()))?;
        let ip_ban = self
            .directory
            .find_active_ip_ban(source_ip, now)
            .await
            .map_err(|e| SendMessageError::StoreUnavailable(e.to_string()))?;
        if username_ban.is_some() || ip_ban.is_some() {
            tracing::info!("Rejected message from banned sender '{}' ({})", sender, source_ip);
            return Err(SendMessageError::Banned(sender.to_string()));
        }

        // 3. サイトロック（admin / host は除外）
        let site = self
            .site_state
            .get_site_state()
            .await
            .map_err(|e| SendMessageError::StoreUnavailable(e.to_string()))?;
        if site.locked && !role.is_privileged() {
            tracing::info!("Rejected message from '{}': site is locked", sender);
            return Err(SendMessageError::Locked);
        }

        // 4. アナウンスは admin / host のみ
        if outgoing.kind == MessageKind::Announcement && !role.is_privileged() {
            return Err(SendMessageError::Forbidden(outgoing.kind));
        }

        let draft = MessageDraft {
            sender: sender.clone(),
            created_at: now,
            kind: outgoing.kind,
            content: outgoing.content,
            recipient: outgoing.recipient,
        };

        // 5. 追記から配信までは他の配信・履歴再生と順序を揃える
        let _ordered = self.delivery_lock.lock().await;
        let message = self
            .message_log
            .append(draft)
            .await
            .map_err(|e| SendMessageError::PersistFailed(e.to_string()))?;

        // 6. 配信先を計算して配信
        let presence = self.presence.snapshot().await;
        let roles = resolve_roles(self.directory.as_ref(), &presence).await;
        let recipients = policy::compute_recipients(&message, &presence, &roles);

        let delivered = match self
            .message_pusher
            .broadcast(&recipients, &ServerEvent::Message(message.clone()))
            .await
        {
            Ok(delivered) => delivered,
            Err(e) => {
                tracing::warn!("Failed to deliver message {}: {}", message.id.value(), e);
                0
            }
        };

        tracing::info!(
            "Message {} ({}) from '{}' delivered to {}/{} connections",
            message.id.value(),
            message.kind,
            sender,
            delivered,
            recipients.len()
        );

        Ok(Delivery {
            message,
            recipients,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BanEntry, ErrorCode, MessageContent, MockDirectoryRepository, MockMessageLogRepository,
        MockSiteStateRepository, Recipient, RepositoryError, Role,
    };
    use crate::usecase::test_support::{Fixture, ManualClock, connection, username};
    use agora_shared::time::{FixedClock, minutes_to_millis};

    fn outgoing(kind: MessageKind, content: &str, recipient: Option<Recipient>) -> OutgoingMessage {
        OutgoingMessage {
            kind,
            content: MessageContent::new(content.to_string()).unwrap(),
            recipient,
        }
    }

    fn usecase(fixture: &Fixture, clock: Arc<dyn Clock>) -> SendMessageUseCase {
        SendMessageUseCase::new(
            fixture.directory.clone(),
            fixture.site_state.clone(),
            fixture.message_log.clone(),
            fixture.presence.clone(),
            fixture.pusher.clone(),
            clock,
        )
    }

    /// alice, bob, carol (user), admin1 (admin), host1 (host) が全員接続している状態
    async fn populated() -> Fixture {
        let fixture = Fixture::new();
        for (name, role) in [
            ("alice", Role::User),
            ("bob", Role::User),
            ("carol", Role::User),
            ("dave", Role::User),
            ("admin1", Role::Admin),
            ("host1", Role::Host),
        ] {
            fixture.account(name, role).await;
            fixture.online(&format!("{}-1", name), name, "10.0.0.1").await;
        }
        fixture
    }

    #[tokio::test]
    async fn test_dm_is_delivered_to_sender_recipient_and_privileged_only() {
        // テスト項目: alice → bob の dm は alice, bob, admin1, host1 に届き carol には届かない
        // given (前提条件):
        let fixture = populated().await;
        let usecase = usecase(&fixture, Arc::new(FixedClock::new(1000)));

        // when (操作):
        let delivery = usecase
            .execute(
                &username("alice"),
                "10.0.0.1",
                outgoing(MessageKind::Dm, "hi", Some(Recipient::User(username("bob")))),
            )
            .await
            .unwrap();

        // then (期待する結果):
        let mut recipients: Vec<String> = delivery
            .recipients
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        recipients.sort();
        assert_eq!(
            recipients,
            vec!["admin1-1", "alice-1", "bob-1", "host1-1"]
        );
        assert!(fixture.pusher.events_for("carol-1").await.is_empty());
        assert_eq!(
            fixture.pusher.events_for("bob-1").await,
            vec![ServerEvent::Message(delivery.message.clone())]
        );
        assert_eq!(delivery.message.created_at, Timestamp::new(1000));
    }

    #[tokio::test]
    async fn test_group_message_reaches_members_only() {
        // テスト項目: group メッセージは宛先集合と admin / host にのみ届く（送信者は宛先に含まれなければ届かない）
        // given (前提条件):
        let fixture = populated().await;
        let usecase = usecase(&fixture, Arc::new(FixedClock::new(1000)));

        // when (操作):
        let delivery = usecase
            .execute(
                &username("alice"),
                "10.0.0.1",
                outgoing(
                    MessageKind::Group,
                    "team",
                    Some(Recipient::Group(vec![username("bob"), username("carol")])),
                ),
            )
            .await
            .unwrap();

        // then (期待する結果):
        let mut recipients: Vec<String> = delivery
            .recipients
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        recipients.sort();
        assert_eq!(recipients, vec!["admin1-1", "bob-1", "carol-1", "host1-1"]);
    }

    #[tokio::test]
    async fn test_malformed_recipient_is_persisted_but_reaches_privileged_only() {
        // テスト項目: 宛先の形が不正な dm は誰にもマッチせず、admin / host と送信者にのみ届く
        // given (前提条件):
        let fixture = populated().await;
        let usecase = usecase(&fixture, Arc::new(FixedClock::new(1000)));

        // when (操作):
        let delivery = usecase
            .execute(
                &username("alice"),
                "10.0.0.1",
                outgoing(
                    MessageKind::Dm,
                    "oops",
                    Some(Recipient::Group(vec![username("bob")])),
                ),
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert!(!delivery.recipients.contains(&connection("bob-1")));
        assert!(delivery.recipients.contains(&connection("admin1-1")));
        assert_eq!(fixture.message_log.list_messages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_global_message_reaches_every_connection_of_each_user() {
        // テスト項目: global メッセージは全接続に届き、同じユーザーの複数接続にもそれぞれ届く
        // given (前提条件):
        let fixture = populated().await;
        fixture.online("bob-2", "bob", "10.0.0.2").await;
        let usecase = usecase(&fixture, Arc::new(FixedClock::new(1000)));

        // when (操作):
        let delivery = usecase
            .execute(&username("carol"), "10.0.0.1", outgoing(MessageKind::Global, "hello", None))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(delivery.recipients.len(), 7);
        assert!(delivery.recipients.contains(&connection("bob-2")));
    }

    #[tokio::test]
    async fn test_banned_sender_is_rejected_and_nothing_is_persisted() {
        // テスト項目: ユーザー名 BAN 中の送信者は banned で拒否され、何も永続化・配信されない
        // given (前提条件):
        let fixture = populated().await;
        fixture
            .directory
            .add_username_ban(BanEntry::new("alice".to_string(), username("host1"), None))
            .await
            .unwrap();
        let usecase = usecase(&fixture, Arc::new(FixedClock::new(1000)));

        // when (操作):
        let result = usecase
            .execute(&username("alice"), "10.0.0.1", outgoing(MessageKind::Global, "x", None))
            .await;

        // then (期待する結果):
        assert_eq!(result, Err(SendMessageError::Banned("alice".to_string())));
        assert!(fixture.message_log.list_messages().await.unwrap().is_empty());
        assert_eq!(fixture.pusher.total_pushed().await, 0);
    }

    #[tokio::test]
    async fn test_ip_ban_rejects_until_expiry() {
        // テスト項目: IP BAN の期限内（9 分 59 秒）は banned、期限後（10 分 1 秒）は受け入れ
        // given (前提条件):
        let fixture = populated().await;
        fixture.account("eve", Role::User).await;
        let clock = Arc::new(ManualClock::new(0));
        fixture
            .directory
            .add_ip_ban(BanEntry::new(
                "10.0.0.9".to_string(),
                username("host1"),
                Some(Timestamp::new(minutes_to_millis(10))),
            ))
            .await
            .unwrap();
        let usecase = usecase(&fixture, clock.clone());

        // when (操作):
        clock.advance(9 * 60_000 + 59_000);
        let within = usecase
            .execute(&username("eve"), "10.0.0.9", outgoing(MessageKind::Global, "x", None))
            .await;
        clock.advance(2_000);
        let after = usecase
            .execute(&username("eve"), "10.0.0.9", outgoing(MessageKind::Global, "y", None))
            .await;

        // then (期待する結果):
        assert_eq!(within, Err(SendMessageError::Banned("eve".to_string())));
        assert!(after.is_ok());
    }

    #[tokio::test]
    async fn test_locked_site_rejects_users_but_not_admins() {
        // テスト項目: ロック中は一般ユーザー（dave）の送信が locked で拒否され、admin1 は送信できる
        // given (前提条件):
        let fixture = populated().await;
        fixture.site_state.set_locked(true).await.unwrap();
        let usecase = usecase(&fixture, Arc::new(FixedClock::new(1000)));

        // when (操作):
        let dave = usecase
            .execute(&username("dave"), "10.0.0.1", outgoing(MessageKind::Global, "x", None))
            .await;
        let admin = usecase
            .execute(&username("admin1"), "10.0.0.1", outgoing(MessageKind::Global, "y", None))
            .await;

        // then (期待する結果):
        assert_eq!(dave, Err(SendMessageError::Locked));
        assert!(admin.is_ok());
        assert_eq!(fixture.message_log.list_messages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_announcement_requires_privileged_role() {
        // テスト項目: 一般ユーザーのアナウンスは forbidden で拒否される
        // given (前提条件):
        let fixture = populated().await;
        let usecase = usecase(&fixture, Arc::new(FixedClock::new(1000)));

        // when (操作):
        let result = usecase
            .execute(
                &username("alice"),
                "10.0.0.1",
                outgoing(MessageKind::Announcement, "hear ye", None),
            )
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(SendMessageError::Forbidden(MessageKind::Announcement))
        );
    }

    #[tokio::test]
    async fn test_unknown_sender_rejected_unless_allowed() {
        // テスト項目: 未登録ユーザーはデフォルトで auth_denied、許可設定なら user として送信できる
        // given (前提条件):
        let fixture = populated().await;
        let strict = usecase(&fixture, Arc::new(FixedClock::new(1000)));
        let lenient = usecase(&fixture, Arc::new(FixedClock::new(1000))).with_access_policy(
            AccessPolicy {
                allow_unknown_users: true,
            },
        );

        // when (操作):
        let rejected = strict
            .execute(&username("ghost"), "10.0.0.1", outgoing(MessageKind::Global, "x", None))
            .await;
        let accepted = lenient
            .execute(&username("ghost"), "10.0.0.1", outgoing(MessageKind::Global, "y", None))
            .await;

        // then (期待する結果):
        assert_eq!(
            rejected,
            Err(SendMessageError::UnknownSender("ghost".to_string()))
        );
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn test_append_failure_is_terminal() {
        // テスト項目: 追記に失敗した場合は persist_error となり配信されない
        // given (前提条件):
        let fixture = populated().await;
        let mut message_log = MockMessageLogRepository::new();
        message_log
            .expect_append()
            .returning(|_| Err(RepositoryError::Persistence("disk full".to_string())));
        let usecase = SendMessageUseCase::new(
            fixture.directory.clone(),
            fixture.site_state.clone(),
            Arc::new(message_log),
            fixture.presence.clone(),
            fixture.pusher.clone(),
            Arc::new(FixedClock::new(1000)),
        );

        // when (操作):
        let result = usecase
            .execute(&username("alice"), "10.0.0.1", outgoing(MessageKind::Global, "x", None))
            .await;

        // then (期待する結果):
        assert_eq!(result.map_err(|e| e.code()), Err(ErrorCode::PersistError));
        assert_eq!(fixture.pusher.total_pushed().await, 0);
    }

    #[tokio::test]
    async fn test_store_read_failure_fails_closed() {
        // テスト項目: BAN / サイト状態の読み出しに失敗した場合は store_unavailable で拒否される
        // given (前提条件):
        let fixture = populated().await;
        let mut directory = MockDirectoryRepository::new();
        directory.expect_find_account().returning(|name| {
            Ok(Some(crate::domain::Account::new(
                name.clone(),
                "secret".to_string(),
                Role::User,
            )))
        });
        directory
            .expect_find_active_username_ban()
            .returning(|_, _| Err(RepositoryError::Unavailable("io".to_string())));
        let mut site_state = MockSiteStateRepository::new();
        site_state.expect_get_site_state().never();
        let usecase = SendMessageUseCase::new(
            Arc::new(directory),
            Arc::new(site_state),
            fixture.message_log.clone(),
            fixture.presence.clone(),
            fixture.pusher.clone(),
            Arc::new(FixedClock::new(1000)),
        );

        // when (操作):
        let result = usecase
            .execute(&username("alice"), "10.0.0.1", outgoing(MessageKind::Global, "x", None))
            .await;

        // then (期待する結果):
        assert_eq!(result.map_err(|e| e.code()), Err(ErrorCode::StoreUnavailable));
        assert!(fixture.message_log.list_messages().await.unwrap().is_empty());
    }
}
