use serde::{Deserialize, Serialize};

/// Main Concierge configuration
///
/// Configuration is loaded from (in priority order):
/// 1. `concierge.jsonc` - JSON with comments
/// 2. `concierge.json` - Standard JSON
/// 3. `concierge.yml` / `concierge.yaml` - YAML format
///
/// Also checks hidden variants (`.concierge.*`) and `~/.config/concierge/` for global config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConciergeConfig {
    /// Discord gateway and REST settings
    #[serde(default)]
    pub discord: DiscordSettings,

    /// Internal status/process HTTP server
    #[serde(default)]
    pub server: ServerSettings,

    /// Downstream decision handler
    #[serde(default)]
    pub handler: HandlerSettings,
}

// ============================================================================
// Discord Configuration
// ============================================================================

/// Discord bot settings
///
/// # Example
///
/// ```yaml
/// discord:
///   bot_token: ${DISCORD_BOT_TOKEN}
///   history_limit: 100
///   help_keywords: ["help", "error", "stuck"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordSettings {
    /// Bot token. Falls back to `DISCORD_BOT_TOKEN` when empty.
    #[serde(default)]
    pub bot_token: String,

    /// Gateway WebSocket URL
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// REST API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Intents bitmask declared at identify time
    #[serde(default = "default_intents")]
    pub intents: u64,

    /// Page size for thread history fetches
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Case-insensitive substrings that mark a message as a help request
    #[serde(default = "default_help_keywords")]
    pub help_keywords: Vec<String>,

    /// REST request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Client metadata sent with identify
    #[serde(default)]
    pub properties: ClientProperties,
}

impl Default for DiscordSettings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            gateway_url: default_gateway_url(),
            api_base: default_api_base(),
            intents: default_intents(),
            history_limit: default_history_limit(),
            help_keywords: default_help_keywords(),
            request_timeout_secs: default_request_timeout(),
            properties: ClientProperties::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProperties {
    #[serde(default = "default_os")]
    pub os: String,

    #[serde(default = "default_client_name")]
    pub browser: String,

    #[serde(default = "default_client_name")]
    pub device: String,
}

impl Default for ClientProperties {
    fn default() -> Self {
        Self {
            os: default_os(),
            browser: default_client_name(),
            device: default_client_name(),
        }
    }
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

/// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT
fn default_intents() -> u64 {
    33281
}

fn default_history_limit() -> u32 {
    100
}

fn default_request_timeout() -> u64 {
    30
}

fn default_os() -> String {
    std::env::consts::OS.to_string()
}

fn default_client_name() -> String {
    "concierge".to_string()
}

pub const DEFAULT_HELP_KEYWORDS: &[&str] = &[
    "help",
    "issue",
    "problem",
    "error",
    "bug",
    "broken",
    "not working",
    "can't",
    "cannot",
    "doesn't work",
    "stuck",
    "question",
    "agentuity",
];

fn default_help_keywords() -> Vec<String> {
    DEFAULT_HELP_KEYWORDS.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Internal HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,

    /// When set, `POST /api/status/process` requires `Authorization: Bearer <token>`.
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            host: default_server_host(),
            port: default_server_port(),
            auth_token: None,
        }
    }
}

fn default_server_enabled() -> bool {
    true
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3500
}

// ============================================================================
// Handler Configuration
// ============================================================================

/// Downstream decision handler endpoint
///
/// The handler receives a triage request and answers with
/// `{message, metadata?: {messageId?, shouldCloseThread?}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerSettings {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}
