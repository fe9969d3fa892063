//! Builds the `TriageRequest` for a message that passed triage.

use std::path::Path;

use concierge_core::{MessageAuthor, ProcessedMessage, TriageRequest};
use tracing::{info, warn};

use crate::model::{Attachment, ChatEvent};
use crate::rest::PlatformApi;

pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

pub fn is_image_attachment(attachment: &Attachment) -> bool {
    if attachment
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("image/"))
    {
        return true;
    }
    Path::new(&attachment.filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

pub fn image_urls(attachments: &[Attachment]) -> Vec<String> {
    attachments
        .iter()
        .filter(|a| is_image_attachment(a))
        .map(|a| a.url.clone())
        .collect()
}

/// Normalize a platform message. `images` is left out when there are none.
pub fn to_processed(event: &ChatEvent) -> ProcessedMessage {
    let images = image_urls(&event.attachments);
    ProcessedMessage {
        id: event.id.clone(),
        content: event.content.clone(),
        timestamp: event.timestamp.clone(),
        is_bot: event.author.is_bot(),
        author: MessageAuthor {
            id: event.author.id.clone(),
            username: event.author.username.clone(),
            global_name: event
                .author
                .global_name
                .clone()
                .filter(|name| !name.is_empty()),
        },
        images: (!images.is_empty()).then_some(images),
    }
}

/// Assemble the request for `event`.
///
/// Threads carry their whole recent history, oldest first. Anything else
/// carries only the triggering message. A failed history fetch yields an
/// empty message list rather than an error.
pub async fn assemble(
    event: &ChatEvent,
    api: &dyn PlatformApi,
    history_limit: u32,
) -> TriageRequest {
    let guild_id = event.guild_id.clone().unwrap_or_default();

    if event.is_thread() {
        info!(
            author = %event.author.username,
            channel_id = %event.channel_id,
            "Processing thread help request"
        );
        let messages = match api.fetch_history(&event.channel_id, history_limit).await {
            Ok(history) => history.iter().rev().map(to_processed).collect(),
            Err(e) => {
                warn!(
                    channel_id = %event.channel_id,
                    error = %e,
                    "Failed to fetch thread history"
                );
                Vec::new()
            }
        };
        return TriageRequest {
            messages,
            channel_id: event.channel_id.clone(),
            guild_id,
            is_thread: true,
        };
    }

    info!(
        author = %event.author.username,
        channel_id = %event.channel_id,
        "Processing help request"
    );
    TriageRequest {
        messages: vec![to_processed(event)],
        channel_id: event.channel_id.clone(),
        guild_id,
        is_thread: false,
    }
}
