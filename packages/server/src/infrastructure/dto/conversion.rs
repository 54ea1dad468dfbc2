//! Conversion logic between DTOs and domain entities.

use agora_shared::time::timestamp_to_rfc3339;

use crate::domain::{
    Account, BanEntry, BanList, ErrorCode, Message, MessageContent, MessageKind,
    OutgoingMessage, PresenceEntry, Recipient, ServerEvent, Username, ValueObjectError,
};
use crate::infrastructure::dto::{http, websocket as dto};

// ========================================
// DTO → Domain Entity
// ========================================

impl TryFrom<dto::RecipientDto> for Recipient {
    type Error = ValueObjectError;

    fn try_from(dto: dto::RecipientDto) -> Result<Self, Self::Error> {
        match dto {
            dto::RecipientDto::One(name) => Ok(Recipient::User(Username::new(name)?)),
            dto::RecipientDto::Many(names) => Ok(Recipient::Group(
                names
                    .into_iter()
                    .map(Username::new)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
        }
    }
}

impl TryFrom<dto::OutgoingMessageDto> for OutgoingMessage {
    type Error = ValueObjectError;

    fn try_from(dto: dto::OutgoingMessageDto) -> Result<Self, Self::Error> {
        let content = MessageContent::new(dto.content)?;
        let recipient = dto.recipient.map(Recipient::try_from).transpose()?;

        // 種別と宛先の形が一致しないものはここで弾く
        match (dto.kind, &recipient) {
            (MessageKind::Global | MessageKind::Announcement, None) => {}
            (MessageKind::Dm, Some(Recipient::User(_))) => {}
            (MessageKind::Group, Some(Recipient::Group(members))) if !members.is_empty() => {}
            (kind, _) => return Err(ValueObjectError::RecipientMismatch(kind.as_str())),
        }

        Ok(Self {
            kind: dto.kind,
            content,
            recipient,
        })
    }
}

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&Recipient> for dto::RecipientDto {
    fn from(model: &Recipient) -> Self {
        match model {
            Recipient::User(name) => dto::RecipientDto::One(name.as_str().to_string()),
            Recipient::Group(names) => dto::RecipientDto::Many(
                names.iter().map(|n| n.as_str().to_string()).collect(),
            ),
        }
    }
}

impl From<&Message> for dto::MessageDto {
    fn from(model: &Message) -> Self {
        Self {
            id: model.id.value(),
            username: model.sender.as_str().to_string(),
            time: timestamp_to_rfc3339(model.created_at.value()),
            created_at: model.created_at.value(),
            kind: model.kind,
            content: model.content.as_str().to_string(),
            to: model.recipient.as_ref().map(dto::RecipientDto::from),
        }
    }
}

impl From<&ServerEvent> for dto::ServerFrame {
    fn from(event: &ServerEvent) -> Self {
        match event {
            ServerEvent::History(messages) => dto::ServerFrame::History {
                messages: messages.iter().map(dto::MessageDto::from).collect(),
            },
            ServerEvent::Message(message) => dto::ServerFrame::Message {
                message: dto::MessageDto::from(message),
            },
            ServerEvent::Error(code) => dto::ServerFrame::Error {
                code: code.as_str().to_string(),
            },
            ServerEvent::CategoryCleared(kind) => dto::ServerFrame::CategoryCleared { category: *kind },
            ServerEvent::ForcedDisconnect { reason } => dto::ServerFrame::ForcedDisconnect {
                reason: reason.clone(),
            },
        }
    }
}

impl From<ErrorCode> for http::CommandResponse {
    fn from(code: ErrorCode) -> Self {
        http::CommandResponse::error(code.as_str())
    }
}

impl From<&Account> for http::AccountDto {
    fn from(model: &Account) -> Self {
        Self {
            username: model.username.as_str().to_string(),
            role: model.role.as_str().to_string(),
        }
    }
}

impl From<&BanEntry> for http::BanDto {
    fn from(model: &BanEntry) -> Self {
        Self {
            subject: model.subject.clone(),
            by: model.issued_by.as_str().to_string(),
            expires: model.expires_at.map(|ts| timestamp_to_rfc3339(ts.value())),
        }
    }
}

impl From<&BanList> for http::BansDto {
    fn from(model: &BanList) -> Self {
        Self {
            username: model.username.iter().map(http::BanDto::from).collect(),
            ip: model.ip.iter().map(http::BanDto::from).collect(),
        }
    }
}

impl From<&PresenceEntry> for http::PresenceDto {
    fn from(model: &PresenceEntry) -> Self {
        Self {
            connection_id: model.connection_id.as_str().to_string(),
            username: model.username.as_str().to_string(),
            ip: model.source_ip.clone(),
        }
    }
}
