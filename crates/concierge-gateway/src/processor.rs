//! Runs one qualifying message from triage through delivery.

use std::sync::Arc;
use std::time::Duration;

use concierge_core::TriageRequest;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::context::{self, DEFAULT_HISTORY_LIMIT};
use crate::delivery::{self, DeliveryPlan, DeliveryReport};
use crate::error::GatewayError;
use crate::handler::TriageHandler;
use crate::rest::PlatformApi;
use crate::session::InboundMessage;
use crate::triage::{self, DropReason, HelpVocabulary, TriageDecision};

pub const APOLOGY_MESSAGE: &str =
    "I can't help, my thinking capabilities seem not to be functioning.";

/// How long in-flight messages may keep running once the gateway stops.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Dropped(DropReason),
    Delivered(DeliveryReport),
    Failed(String),
}

pub struct TriageProcessor {
    handler: Arc<dyn TriageHandler>,
    api: Arc<dyn PlatformApi>,
    vocabulary: HelpVocabulary,
    history_limit: u32,
    drain_timeout: Duration,
}

impl TriageProcessor {
    pub fn new(handler: Arc<dyn TriageHandler>, api: Arc<dyn PlatformApi>) -> Self {
        Self {
            handler,
            api,
            vocabulary: HelpVocabulary::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn with_vocabulary(mut self, vocabulary: HelpVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn with_history_limit(mut self, limit: u32) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Hand `request` to the handler and deliver its reply.
    ///
    /// When the handler fails, an apology goes to the channel instead and the
    /// handler error is returned.
    pub async fn process(
        &self,
        request: &TriageRequest,
    ) -> Result<DeliveryReport, GatewayError> {
        debug!(
            channel_id = %request.channel_id,
            messages = request.messages.len(),
            is_thread = request.is_thread,
            "Processing triage request"
        );

        match self.handler.handle(request).await {
            Ok(reply) => {
                let plan = DeliveryPlan::from_reply(&reply, request);
                Ok(delivery::deliver(&plan, self.api.as_ref()).await)
            }
            Err(e) => {
                error!(channel_id = %request.channel_id, error = %e, "Handler failed");
                let apology = DeliveryPlan::message(request.channel_id.clone(), APOLOGY_MESSAGE);
                delivery::deliver(&apology, self.api.as_ref()).await;
                Err(e)
            }
        }
    }

    /// Triage, assemble and process one gateway message.
    pub async fn handle_message(&self, message: &InboundMessage) -> MessageOutcome {
        let event = &message.event;
        let decision = triage::triage(
            event,
            &message.bot.user_id,
            self.api.as_ref(),
            &self.vocabulary,
        )
        .await;

        if let TriageDecision::Drop(reason) = decision {
            debug!(message_id = %event.id, %reason, "Ignoring message");
            return MessageOutcome::Dropped(reason);
        }

        let request = context::assemble(event, self.api.as_ref(), self.history_limit).await;
        match self.process(&request).await {
            Ok(report) => {
                info!(
                    message_id = %event.id,
                    sent = report.sent,
                    failed = report.failed,
                    archived = report.archived,
                    "Message processed"
                );
                MessageOutcome::Delivered(report)
            }
            Err(e) => MessageOutcome::Failed(e.to_string()),
        }
    }

    /// Drain gateway messages, handling each on its own task.
    ///
    /// Once the channel closes, the returned task waits up to the drain
    /// timeout for in-flight messages and aborts whatever is left.
    pub fn spawn_dispatch_loop(
        self: Arc<Self>,
        mut messages: mpsc::Receiver<InboundMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut in_flight = JoinSet::new();
            while let Some(message) = messages.recv().await {
                while in_flight.try_join_next().is_some() {}
                let processor = Arc::clone(&self);
                in_flight.spawn(async move {
                    processor.handle_message(&message).await;
                });
            }
            debug!(in_flight = in_flight.len(), "Dispatch channel closed");
            self.drain(in_flight).await;
        })
    }

    async fn drain(&self, mut in_flight: JoinSet<()>) {
        if in_flight.is_empty() {
            return;
        }
        info!(
            in_flight = in_flight.len(),
            "Waiting for in-flight messages to finish"
        );
        let finished = tokio::time::timeout(self.drain_timeout, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if finished.is_err() {
            warn!(
                abandoned = in_flight.len(),
                timeout_secs = self.drain_timeout.as_secs_f64(),
                "In-flight messages did not finish before shutdown"
            );
            in_flight.shutdown().await;
        }
    }
}
