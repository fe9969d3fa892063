//! Gateway session state machine.
//!
//! `Session` holds no socket. It consumes decoded frames and answers with the
//! actions the connection driver must perform, which keeps the protocol
//! transitions testable without a network.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::model::ChatEvent;
use crate::protocol::{
    self, event, opcode, GatewayFrame, HelloPayload, IdentifyPayload, OutboundFrame,
    ReadyPayload, ThreadCreatePayload,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    AwaitingHello,
    Identifying,
    Ready,
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Ready => "ready",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Last-seen sequence number, written by the reader and read by the
/// heartbeat task.
#[derive(Debug, Clone, Default)]
pub struct SequenceCell(Arc<Mutex<Option<u64>>>);

impl SequenceCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sequence number. Never moves backwards.
    pub fn observe(&self, seq: u64) {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match *guard {
            Some(current) if current > seq => {
                debug!(current, seq, "Ignoring out-of-order sequence number");
            }
            _ => *guard = Some(seq),
        }
    }

    pub fn current(&self) -> Option<u64> {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The bot's own account, learned at Ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
    pub username: String,
}

/// A `MESSAGE_CREATE` event paired with the identity needed to triage it.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub event: ChatEvent,
    pub bot: BotIdentity,
}

#[derive(Debug, Clone)]
pub enum SessionAction {
    StartHeartbeat(Duration),
    Send(OutboundFrame),
    Dispatch(Box<InboundMessage>),
}

pub struct Session {
    phase: SessionPhase,
    identify: IdentifyPayload,
    sequence: SequenceCell,
    session_id: Option<String>,
    bot: Option<BotIdentity>,
    acks: u64,
}

impl Session {
    pub fn new(identify: IdentifyPayload) -> Self {
        Self {
            phase: SessionPhase::Disconnected,
            identify,
            sequence: SequenceCell::new(),
            session_id: None,
            bot: None,
            acks: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn sequence(&self) -> &SequenceCell {
        &self.sequence
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn bot(&self) -> Option<&BotIdentity> {
        self.bot.as_ref()
    }

    pub fn acks_received(&self) -> u64 {
        self.acks
    }

    pub fn begin_connect(&mut self) {
        self.transition(SessionPhase::Connecting);
    }

    pub fn on_open(&mut self) {
        if self.phase == SessionPhase::Connecting {
            self.transition(SessionPhase::AwaitingHello);
        } else {
            warn!(phase = %self.phase, "Socket opened in unexpected phase");
        }
    }

    pub fn on_close(&mut self, reason: &str) {
        if self.phase != SessionPhase::Closed {
            info!(
                reason,
                session_id = ?self.session_id,
                last_sequence = ?self.sequence.current(),
                "Gateway session closed"
            );
            self.transition(SessionPhase::Closed);
        }
    }

    /// Apply one inbound frame.
    pub fn on_frame(&mut self, frame: GatewayFrame) -> Vec<SessionAction> {
        if self.phase == SessionPhase::Closed {
            debug!(op = frame.op, "Dropping frame received after close");
            return Vec::new();
        }

        if let Some(seq) = frame.s {
            self.sequence.observe(seq);
        }

        match frame.op {
            opcode::HELLO => self.handle_hello(&frame),
            opcode::DISPATCH => self.handle_dispatch(&frame),
            opcode::HEARTBEAT_ACK => {
                self.acks += 1;
                debug!(acks = self.acks, "Heartbeat acknowledged");
                Vec::new()
            }
            op => {
                warn!(op, "Dropping frame with unrecognized opcode");
                Vec::new()
            }
        }
    }

    fn transition(&mut self, next: SessionPhase) {
        debug!(from = %self.phase, to = %next, "Session transition");
        self.phase = next;
    }

    fn handle_hello(&mut self, frame: &GatewayFrame) -> Vec<SessionAction> {
        if self.phase != SessionPhase::AwaitingHello {
            warn!(phase = %self.phase, "Unexpected Hello");
            return Vec::new();
        }

        let hello: HelloPayload = match protocol::payload(frame) {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "Dropping Hello");
                return Vec::new();
            }
        };
        if hello.heartbeat_interval == 0 {
            warn!("Dropping Hello with zero heartbeat interval");
            return Vec::new();
        }

        info!(
            heartbeat_interval_ms = hello.heartbeat_interval,
            "Received Hello"
        );
        self.transition(SessionPhase::Identifying);

        vec![
            SessionAction::StartHeartbeat(Duration::from_millis(hello.heartbeat_interval)),
            SessionAction::Send(OutboundFrame::Identify(self.identify.clone())),
        ]
    }

    fn handle_dispatch(&mut self, frame: &GatewayFrame) -> Vec<SessionAction> {
        match frame.event_name() {
            Some(event::READY) => {
                self.handle_ready(frame);
                Vec::new()
            }
            Some(event::MESSAGE_CREATE) => self.handle_message_create(frame),
            Some(event::THREAD_CREATE) => {
                if let Ok(thread) = protocol::payload::<ThreadCreatePayload>(frame) {
                    info!(thread_id = %thread.id, name = %thread.name, "Thread created");
                }
                Vec::new()
            }
            other => {
                debug!(event = ?other, "Ignoring dispatch event");
                Vec::new()
            }
        }
    }

    fn handle_ready(&mut self, frame: &GatewayFrame) {
        if self.session_id.is_some() {
            warn!("Ignoring duplicate READY");
            return;
        }
        if self.phase != SessionPhase::Identifying {
            warn!(phase = %self.phase, "READY before identify");
            return;
        }

        let ready: ReadyPayload = match protocol::payload(frame) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Dropping READY");
                return;
            }
        };

        info!(
            session_id = %ready.session_id,
            bot_id = %ready.user.id,
            bot_name = %ready.user.username,
            "Gateway ready"
        );
        self.session_id = Some(ready.session_id);
        self.bot = Some(BotIdentity {
            user_id: ready.user.id,
            username: ready.user.username,
        });
        self.transition(SessionPhase::Ready);
    }

    fn handle_message_create(&mut self, frame: &GatewayFrame) -> Vec<SessionAction> {
        let Some(bot) = self.bot.clone().filter(|_| self.phase == SessionPhase::Ready) else {
            warn!(phase = %self.phase, "Dropping MESSAGE_CREATE received before READY");
            return Vec::new();
        };

        match protocol::payload::<ChatEvent>(frame) {
            Ok(event) => {
                debug!(
                    message_id = %event.id,
                    author = %event.author.username,
                    "Message received"
                );
                vec![SessionAction::Dispatch(Box::new(InboundMessage { event, bot }))]
            }
            Err(e) => {
                warn!(error = %e, "Dropping MESSAGE_CREATE");
                Vec::new()
            }
        }
    }
}
