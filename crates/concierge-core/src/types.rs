//! Wire types shared between the gateway, the internal HTTP surface and the
//! downstream decision handler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
}

/// One normalized chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedMessage {
    pub id: String,
    pub content: String,
    pub timestamp: String,
    pub is_bot: bool,
    pub author: MessageAuthor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// The unit of work handed to the decision handler.
///
/// `messages` is chronological, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageRequest {
    pub messages: Vec<ProcessedMessage>,
    pub channel_id: String,
    pub guild_id: String,
    pub is_thread: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("message {index} has an empty id")]
    EmptyMessageId { index: usize },
}

impl TriageRequest {
    /// Shape checks serde cannot express. An empty `messages` list is valid:
    /// it is what a failed history fetch assembles to.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.channel_id.trim().is_empty() {
            return Err(RequestValidationError::MissingField("channelId"));
        }
        if self.guild_id.trim().is_empty() {
            return Err(RequestValidationError::MissingField("guildId"));
        }
        if let Some(index) = self.messages.iter().position(|m| m.id.is_empty()) {
            return Err(RequestValidationError::EmptyMessageId { index });
        }
        Ok(())
    }

    /// The message that triggered processing.
    pub fn latest(&self) -> Option<&ProcessedMessage> {
        self.messages.last()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_close_thread: Option<bool>,
}

/// What the decision handler answers with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerReply {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ReplyMetadata>,
}

impl HandlerReply {
    pub fn reply_to(&self) -> Option<&str> {
        self.metadata.as_ref()?.message_id.as_deref()
    }

    pub fn should_close_thread(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.should_close_thread)
            .unwrap_or(false)
    }
}
