use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use concierge_core::{HandlerReply, MessageAuthor, ProcessedMessage, TriageRequest};

use crate::error::GatewayError;
use crate::handler::TriageHandler;
use crate::model::{channel_kind, Author, ChatEvent, SentMessage};
use crate::rest::PlatformApi;

/// A guild message from a human in a plain text channel.
pub fn chat_event(id: &str, channel_id: &str, content: &str) -> ChatEvent {
    ChatEvent {
        id: id.to_string(),
        content: content.to_string(),
        timestamp: "2025-01-01T00:00:00.000000+00:00".to_string(),
        channel_id: channel_id.to_string(),
        channel_type: channel_kind::GUILD_TEXT,
        guild_id: Some("g1".to_string()),
        author: Author {
            id: "u1".to_string(),
            username: "alice".to_string(),
            global_name: None,
            bot: None,
        },
        attachments: Vec::new(),
        mentions: Vec::new(),
        message_reference: None,
    }
}

pub fn triage_request(channel_id: &str, is_thread: bool) -> TriageRequest {
    TriageRequest {
        messages: vec![ProcessedMessage {
            id: "m1".to_string(),
            content: "help".to_string(),
            timestamp: "2025-01-01T00:00:00.000000+00:00".to_string(),
            is_bot: false,
            author: MessageAuthor {
                id: "u1".to_string(),
                username: "alice".to_string(),
                global_name: None,
            },
            images: None,
        }],
        channel_id: channel_id.to_string(),
        guild_id: "g1".to_string(),
        is_thread,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSend {
    pub channel_id: String,
    pub content: String,
    pub reply_to: Option<String>,
}

/// In-memory `PlatformApi` that records every call.
#[derive(Default)]
pub struct MockPlatform {
    messages: Mutex<HashMap<String, ChatEvent>>,
    history: Mutex<HashMap<String, Vec<ChatEvent>>>,
    history_calls: Mutex<Vec<(String, u32)>>,
    sent: Mutex<Vec<RecordedSend>>,
    archived: Mutex<Vec<String>>,
    send_attempts: AtomicUsize,
    fail_history: bool,
    fail_send_at: Option<usize>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_history(mut self) -> Self {
        self.fail_history = true;
        self
    }

    /// Fail the `n`th send attempt, counting from zero.
    pub fn failing_send_at(mut self, n: usize) -> Self {
        self.fail_send_at = Some(n);
        self
    }

    pub fn insert_message(&self, message: ChatEvent) {
        self.messages
            .lock()
            .unwrap()
            .insert(message.id.clone(), message);
    }

    /// History is returned as given, so pass it newest first.
    pub fn set_history(&self, channel_id: &str, messages: Vec<ChatEvent>) {
        self.history
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), messages);
    }

    pub fn history_calls(&self) -> Vec<(String, u32)> {
        self.history_calls.lock().unwrap().clone()
    }

    pub fn sent_messages(&self) -> Vec<RecordedSend> {
        self.sent.lock().unwrap().clone()
    }

    pub fn archived_threads(&self) -> Vec<String> {
        self.archived.lock().unwrap().clone()
    }
}

fn not_found() -> GatewayError {
    GatewayError::UpstreamRest {
        status: 404,
        body: r#"{"message":"Unknown Message","code":10008}"#.to_string(),
    }
}

#[async_trait]
impl PlatformApi for MockPlatform {
    async fn fetch_history(
        &self,
        channel_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatEvent>, GatewayError> {
        self.history_calls
            .lock()
            .unwrap()
            .push((channel_id.to_string(), limit));
        if self.fail_history {
            return Err(GatewayError::UpstreamRest {
                status: 403,
                body: "Missing Access".to_string(),
            });
        }
        let history = self.history.lock().unwrap();
        let mut messages = history.get(channel_id).cloned().unwrap_or_default();
        messages.truncate(limit as usize);
        Ok(messages)
    }

    async fn fetch_message(
        &self,
        _channel_id: &str,
        message_id: &str,
    ) -> Result<ChatEvent, GatewayError> {
        self.messages
            .lock()
            .unwrap()
            .get(message_id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<SentMessage, GatewayError> {
        let attempt = self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_send_at == Some(attempt) {
            return Err(GatewayError::UpstreamRest {
                status: 500,
                body: "send failed".to_string(),
            });
        }
        self.sent.lock().unwrap().push(RecordedSend {
            channel_id: channel_id.to_string(),
            content: content.to_string(),
            reply_to: reply_to.map(str::to_string),
        });
        Ok(SentMessage {
            id: format!("sent-{attempt}"),
            channel_id: channel_id.to_string(),
        })
    }

    async fn archive_thread(&self, thread_id: &str) -> Result<(), GatewayError> {
        self.archived.lock().unwrap().push(thread_id.to_string());
        Ok(())
    }
}

/// `TriageHandler` with a canned reply or error.
pub struct MockHandler {
    reply: Result<HandlerReply, String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<TriageRequest>>,
}

impl MockHandler {
    pub fn replying(reply: HandlerReply) -> Self {
        Self {
            reply: Ok(reply),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<TriageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TriageHandler for MockHandler {
    async fn handle(&self, request: &TriageRequest) -> Result<HandlerReply, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(GatewayError::Handler)
    }
}
