//! Shared configuration and wire types for Concierge.

pub mod loader;
pub mod schema;
pub mod types;

pub use loader::{
    load_config, load_config_from_file, normalize_bot_token, resolve_config, ConfigFormat,
    ResolvedConfig, TOKEN_ENV_VAR,
};
pub use schema::{
    ClientProperties, ConciergeConfig, DiscordSettings, HandlerSettings, ServerSettings,
    DEFAULT_HELP_KEYWORDS,
};
pub use types::{
    HandlerReply, MessageAuthor, ProcessedMessage, ReplyMetadata, RequestValidationError,
    TriageRequest,
};
