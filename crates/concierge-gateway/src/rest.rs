use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::GatewayError;
use crate::model::{ChatEvent, SentMessage};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// The REST calls the triage pipeline makes against the chat platform.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Up to `limit` messages of a channel, newest first.
    async fn fetch_history(
        &self,
        channel_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatEvent>, GatewayError>;

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<ChatEvent, GatewayError>;

    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<SentMessage, GatewayError>;

    async fn archive_thread(&self, thread_id: &str) -> Result<(), GatewayError>;
}

#[derive(Serialize)]
struct MessageReferenceBody<'a> {
    message_id: &'a str,
}

#[derive(Serialize)]
struct CreateMessageBody<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_reference: Option<MessageReferenceBody<'a>>,
}

#[derive(Serialize)]
struct ModifyThreadBody {
    archived: bool,
    locked: bool,
}

/// Bot-token authenticated client for the Discord REST API.
#[derive(Clone)]
pub struct DiscordRest {
    http_client: reqwest::Client,
    api_base: String,
    auth_header: String,
}

impl DiscordRest {
    pub fn new(token: &str) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            auth_header: format!("Bot {token}"),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, GatewayError> {
        self.http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(GatewayError::UpstreamRest {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PlatformApi for DiscordRest {
    async fn fetch_history(
        &self,
        channel_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatEvent>, GatewayError> {
        let resp = self
            .http_client
            .get(self.url(&format!("/channels/{channel_id}/messages")))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .query(&[("limit", limit)])
            .send()
            .await?;
        let messages: Vec<ChatEvent> = Self::check(resp).await?.json().await?;
        debug!(channel_id, count = messages.len(), "Fetched channel history");
        Ok(messages)
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<ChatEvent, GatewayError> {
        let resp = self
            .http_client
            .get(self.url(&format!("/channels/{channel_id}/messages/{message_id}")))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<SentMessage, GatewayError> {
        let body = CreateMessageBody {
            content,
            message_reference: reply_to.map(|message_id| MessageReferenceBody { message_id }),
        };
        let resp = self
            .http_client
            .post(self.url(&format!("/channels/{channel_id}/messages")))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .json(&body)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn archive_thread(&self, thread_id: &str) -> Result<(), GatewayError> {
        let resp = self
            .http_client
            .patch(self.url(&format!("/channels/{thread_id}")))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .json(&ModifyThreadBody {
                archived: true,
                locked: false,
            })
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}
