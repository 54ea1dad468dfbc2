//! 配信ポリシー
//!
//! メッセージを誰が閲覧できるかを決める純粋関数群。
//! ライブ配信（`compute_recipients`）と履歴再生（`filter_history`）は
//! 同じ述語 `can_view` を使うため、履歴と以後のライブ配信の内容は一致する。
//!
//! | 種別 | 閲覧できるユーザー |
//! |---|---|
//! | global / announcement | 全員 |
//! | dm | 送信者と宛先ユーザー |
//! | group | 宛先集合に含まれるユーザー |
//! | （全種別） | admin / host |

use std::collections::HashMap;

use super::{ConnectionId, Message, MessageKind, PresenceEntry, Recipient, Role, Username};

/// ロールを考慮せず、メッセージが `viewer` 宛てかどうか
///
/// 種別と宛先の形が一致しない場合（dm に配列、group に単一ユーザーや空配列）は
/// 誰にもマッチしない。ただし dm の送信者本人は常にマッチする。
pub fn is_addressed_to(message: &Message, viewer: &Username) -> bool {
    match message.kind {
        MessageKind::Global | MessageKind::Announcement => true,
        MessageKind::Dm => {
            &message.sender == viewer
                || matches!(&message.recipient, Some(Recipient::User(to)) if to == viewer)
        }
        MessageKind::Group => {
            matches!(&message.recipient, Some(Recipient::Group(members)) if members.contains(viewer))
        }
    }
}

/// `viewer`（ロール `role`）がメッセージを閲覧できるかどうか
pub fn can_view(message: &Message, viewer: &Username, role: Role) -> bool {
    role.is_privileged() || is_addressed_to(message, viewer)
}

/// ライブ配信の対象となる接続 ID を計算
///
/// 判定はユーザー名ごとに一度だけ行い、そのユーザーの全接続に適用する。
/// `roles` に無いユーザーは `Role::User` として扱う。
pub fn compute_recipients(
    message: &Message,
    presence: &[PresenceEntry],
    roles: &HashMap<Username, Role>,
) -> Vec<ConnectionId> {
    let mut decisions: HashMap<&Username, bool> = HashMap::new();
    let mut recipients = Vec::new();

    for entry in presence {
        let included = *decisions.entry(&entry.username).or_insert_with(|| {
            let role = roles.get(&entry.username).copied().unwrap_or_default();
            can_view(message, &entry.username, role)
        });
        if included {
            recipients.push(entry.connection_id.clone());
        }
    }

    recipients
}

/// 履歴のうち `viewer` が閲覧できるメッセージを元の順序のまま返す
pub fn filter_history(messages: &[Message], viewer: &Username, role: Role) -> Vec<Message> {
    messages
        .iter()
        .filter(|message| can_view(message, viewer, role))
        .cloned()
        .collect()
}
