use std::time::Duration;

use async_trait::async_trait;
use concierge_core::{HandlerReply, TriageRequest};
use tracing::debug;

use crate::error::GatewayError;

/// The downstream decision service: given a conversation, produce a reply.
#[async_trait]
pub trait TriageHandler: Send + Sync {
    async fn handle(&self, request: &TriageRequest) -> Result<HandlerReply, GatewayError>;
}

/// Forwards requests as JSON to an HTTP endpoint.
pub struct HttpTriageHandler {
    http_client: reqwest::Client,
    url: String,
    auth_token: Option<String>,
}

impl HttpTriageHandler {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            url: url.into(),
            auth_token: None,
        }
    }

    /// Sent as `Authorization: Bearer <token>` when set.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, GatewayError> {
        self.http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TriageHandler for HttpTriageHandler {
    async fn handle(&self, request: &TriageRequest) -> Result<HandlerReply, GatewayError> {
        let mut builder = self.http_client.post(&self.url).json(request);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::Handler(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Handler(format!("{status}: {body}")));
        }

        let reply: HandlerReply = resp
            .json()
            .await
            .map_err(|e| GatewayError::Handler(format!("invalid reply: {e}")))?;
        debug!(
            channel_id = %request.channel_id,
            reply_len = reply.message.len(),
            "Handler replied"
        );
        Ok(reply)
    }
}
