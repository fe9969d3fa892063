//! Discord message objects as delivered by `MESSAGE_CREATE` and the REST API.

use serde::{Deserialize, Serialize};

pub mod channel_kind {
    pub const GUILD_TEXT: u8 = 0;
    pub const PUBLIC_THREAD: u8 = 11;
    pub const PRIVATE_THREAD: u8 = 12;
}

pub fn is_thread_channel(kind: u8) -> bool {
    matches!(
        kind,
        channel_kind::PUBLIC_THREAD | channel_kind::PRIVATE_THREAD
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: Option<bool>,
}

impl Author {
    pub fn is_bot(&self) -> bool {
        self.bot.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionedUser {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bot: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReference {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// A chat message. REST responses omit `channel_type` and `guild_id`, so both
/// default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: u8,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub author: Author,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub mentions: Vec<MentionedUser>,
    #[serde(default)]
    pub message_reference: Option<MessageReference>,
}

impl ChatEvent {
    pub fn is_thread(&self) -> bool {
        is_thread_channel(self.channel_type)
    }

    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|m| m.id == user_id)
    }

    /// `(channel_id, message_id)` of the message this one replies to.
    /// The reference's channel defaults to the event's own channel.
    pub fn reply_target(&self) -> Option<(&str, &str)> {
        let reference = self.message_reference.as_ref()?;
        let message_id = reference.message_id.as_deref()?;
        let channel_id = reference
            .channel_id
            .as_deref()
            .unwrap_or(self.channel_id.as_str());
        Some((channel_id, message_id))
    }
}

/// Response body of a successful message send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SentMessage {
    pub id: String,
    #[serde(default)]
    pub channel_id: String,
}
