use concierge_core::{HandlerReply, TriageRequest};
use tracing::{info, warn};

use crate::chunk::{chunk_message, DISCORD_MESSAGE_LIMIT};
use crate::rest::PlatformApi;

/// Everything needed to post one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPlan {
    pub chunks: Vec<String>,
    pub channel_id: String,
    pub reply_to: Option<String>,
    pub close_thread: bool,
}

impl DeliveryPlan {
    /// A plain message to `channel_id`, no reply reference.
    pub fn message(channel_id: impl Into<String>, content: &str) -> Self {
        Self {
            chunks: chunk_message(content, DISCORD_MESSAGE_LIMIT),
            channel_id: channel_id.into(),
            reply_to: None,
            close_thread: false,
        }
    }

    /// The thread is only closed when the handler asks for it and the
    /// request came from a thread.
    pub fn from_reply(reply: &HandlerReply, request: &TriageRequest) -> Self {
        Self {
            chunks: chunk_message(&reply.message, DISCORD_MESSAGE_LIMIT),
            channel_id: request.channel_id.clone(),
            reply_to: reply.reply_to().map(str::to_string),
            close_thread: reply.should_close_thread() && request.is_thread,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
    pub archived: bool,
}

/// Send the plan's chunks one after another, then archive if asked.
///
/// A failed send is logged and the remaining chunks still go out.
pub async fn deliver(plan: &DeliveryPlan, api: &dyn PlatformApi) -> DeliveryReport {
    let chunks: Vec<&str> = plan
        .chunks
        .iter()
        .map(String::as_str)
        .filter(|c| !c.is_empty())
        .collect();

    if chunks.len() > 1 {
        info!(
            channel_id = %plan.channel_id,
            chunks = chunks.len(),
            "Sending reply in multiple parts"
        );
    }

    let mut report = DeliveryReport::default();
    for (index, chunk) in chunks.iter().enumerate() {
        let reply_to = if index == 0 {
            plan.reply_to.as_deref()
        } else {
            None
        };
        match api.send_message(&plan.channel_id, chunk, reply_to).await {
            Ok(_) => report.sent += 1,
            Err(e) => {
                warn!(
                    channel_id = %plan.channel_id,
                    chunk = index + 1,
                    error = %e,
                    "Failed to send message"
                );
                report.failed += 1;
            }
        }
    }

    if plan.close_thread {
        match api.archive_thread(&plan.channel_id).await {
            Ok(()) => {
                info!(thread_id = %plan.channel_id, "Archived thread");
                report.archived = true;
            }
            Err(e) => warn!(thread_id = %plan.channel_id, error = %e, "Failed to archive thread"),
        }
    }

    report
}
