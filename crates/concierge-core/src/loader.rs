use crate::schema::{ConciergeConfig, DiscordSettings, HandlerSettings, ServerSettings};
use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const TOKEN_ENV_VAR: &str = "DISCORD_BOT_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Jsonc,
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;

        match ext {
            "jsonc" => Some(Self::Jsonc),
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: ConciergeConfig,
    pub path: Option<PathBuf>,
    pub format: Option<ConfigFormat>,
}

/// Load configuration from an explicit path, a discovered config file, or
/// built-in defaults when neither exists. The bot token is always resolved
/// afterwards so an environment-only setup works.
pub fn load_config(config_path: Option<&Path>) -> Result<ConciergeConfig> {
    resolve_config(config_path).map(|r| r.config)
}

pub fn resolve_config(config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let explicit = config_path.map(|p| p.to_path_buf());
    if let Some(path) = &explicit {
        if !path.exists() {
            return Err(anyhow!("Config file not found: {}", path.display()));
        }
    }

    let mut resolved = match explicit.or_else(find_config_file) {
        Some(path) => load_config_from_file(&path)?,
        None => ResolvedConfig {
            config: ConciergeConfig::default(),
            path: None,
            format: None,
        },
    };

    resolved.config.discord.bot_token = resolve_bot_token(&resolved.config.discord.bot_token);
    Ok(resolved)
}

pub fn load_config_from_file(path: &Path) -> Result<ResolvedConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| anyhow!("Unknown config format for: {}", path.display()))?;

    let config = parse_config_content(&content, format)?;

    Ok(ResolvedConfig {
        config: expand_env_vars(config),
        path: Some(path.to_path_buf()),
        format: Some(format),
    })
}

fn parse_config_content(content: &str, format: ConfigFormat) -> Result<ConciergeConfig> {
    match format {
        ConfigFormat::Jsonc => json5::from_str(content).context("Failed to parse JSONC"),
        ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON"),
        ConfigFormat::Yaml => serde_yaml_ng::from_str(content).context("Failed to parse YAML"),
    }
}

const CONFIG_CANDIDATES: &[&str] = &[
    "concierge.jsonc",
    "concierge.json",
    "concierge.yml",
    "concierge.yaml",
    ".concierge.jsonc",
    ".concierge.json",
    ".concierge.yml",
    ".concierge.yaml",
];

fn find_config_file() -> Option<PathBuf> {
    for candidate in CONFIG_CANDIDATES {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    let global_dir = dirs::config_dir()?.join("concierge");
    CONFIG_CANDIDATES
        .iter()
        .map(|candidate| global_dir.join(candidate))
        .find(|path| path.exists())
}

/// Strip an optional `Bot ` prefix and surrounding whitespace.
pub fn normalize_bot_token(token: &str) -> String {
    let trimmed = token.trim();
    trimmed.strip_prefix("Bot ").unwrap_or(trimmed).to_string()
}

fn resolve_bot_token(configured: &str) -> String {
    let normalized = normalize_bot_token(configured);
    if !normalized.is_empty() {
        return normalized;
    }
    env::var(TOKEN_ENV_VAR)
        .map(|t| normalize_bot_token(&t))
        .unwrap_or_default()
}

fn expand_env_vars(config: ConciergeConfig) -> ConciergeConfig {
    ConciergeConfig {
        discord: expand_discord_settings(config.discord),
        server: expand_server_settings(config.server),
        handler: expand_handler_settings(config.handler),
    }
}

fn expand_discord_settings(mut discord: DiscordSettings) -> DiscordSettings {
    discord.bot_token = expand_env_string(&discord.bot_token);
    discord.gateway_url = expand_env_string(&discord.gateway_url);
    discord.api_base = expand_env_string(&discord.api_base);
    discord
}

fn expand_server_settings(mut server: ServerSettings) -> ServerSettings {
    server.auth_token = server.auth_token.map(|t| expand_env_string(&t));
    server
}

fn expand_handler_settings(mut handler: HandlerSettings) -> HandlerSettings {
    handler.url = expand_env_string(&handler.url);
    handler.auth_token = handler.auth_token.map(|t| expand_env_string(&t));
    handler
}

fn expand_env_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' {
            if chars.peek() == Some(&'{') {
                // ${VAR} syntax
                chars.next();
                let var_name: String = chars.by_ref().take_while(|&c| c != '}').collect();
                if let Ok(value) = env::var(&var_name) {
                    result.push_str(&value);
                } else {
                    result.push_str("${");
                    result.push_str(&var_name);
                    result.push('}');
                }
            } else {
                // $VAR syntax; peek so the delimiter stays in the output
                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        var_name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if !var_name.is_empty() {
                    if let Ok(value) = env::var(&var_name) {
                        result.push_str(&value);
                    } else {
                        result.push('$');
                        result.push_str(&var_name);
                    }
                } else {
                    result.push('$');
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}
