//! Discord gateway client and help-triage pipeline for Concierge.
//!
//! A `GatewayConnection` keeps one gateway session alive and forwards chat
//! messages to a `TriageProcessor`, which decides whether to answer, builds
//! the conversation for the downstream handler, and posts the reply back in
//! Discord-sized chunks. `StatusServer` exposes the same processing over HTTP.

pub mod chunk;
pub mod connection;
pub mod context;
pub mod delivery;
pub mod error;
pub mod handler;
pub mod heartbeat;
pub mod model;
pub mod processor;
pub mod protocol;
pub mod rest;
pub mod server;
pub mod session;
pub mod testing;
pub mod triage;

pub use chunk::{chunk_message, DISCORD_MESSAGE_LIMIT};
pub use connection::{GatewayConfig, GatewayConnection, DEFAULT_GATEWAY_URL};
pub use delivery::{deliver, DeliveryPlan, DeliveryReport};
pub use error::GatewayError;
pub use handler::{HttpTriageHandler, TriageHandler};
pub use processor::{MessageOutcome, TriageProcessor, APOLOGY_MESSAGE};
pub use protocol::{ConnectionProperties, IdentifyPayload};
pub use rest::{DiscordRest, PlatformApi};
pub use server::StatusServer;
pub use session::{BotIdentity, InboundMessage, Session, SessionPhase};
pub use triage::HelpVocabulary;
