//! Concierge - Discord help-triage bot

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use colored::Colorize;
use concierge_core::{resolve_config, ConciergeConfig, ResolvedConfig, TOKEN_ENV_VAR};
use concierge_gateway::{
    ConnectionProperties, DiscordRest, GatewayConfig, GatewayConnection, HelpVocabulary,
    HttpTriageHandler, IdentifyPayload, StatusServer, TriageProcessor,
};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, RunArgs};

const DISPATCH_QUEUE_SIZE: usize = 256;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Some(Commands::Config) => show_config(&cli),
        Some(Commands::Run(args)) => run(&cli, args.clone()).await,
        None => run(&cli, RunArgs::default()).await,
    };

    if let Err(e) = result {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load(cli: &Cli) -> anyhow::Result<ResolvedConfig> {
    let resolved = resolve_config(cli.config.as_deref())?;
    match &resolved.path {
        Some(path) => info!(path = %path.display(), "Loaded configuration"),
        None => info!("No config file found, using defaults"),
    }
    Ok(resolved)
}

fn check_required(config: &ConciergeConfig) -> anyhow::Result<()> {
    if config.discord.bot_token.is_empty() {
        bail!("Discord bot token is not set (discord.bot_token or {TOKEN_ENV_VAR})");
    }
    if config.handler.url.is_empty() {
        bail!("handler.url is not set");
    }
    Ok(())
}

fn build_processor(config: &ConciergeConfig) -> anyhow::Result<Arc<TriageProcessor>> {
    let discord = &config.discord;
    let api = DiscordRest::new(&discord.bot_token)
        .with_api_base(&discord.api_base)
        .with_timeout(Duration::from_secs(discord.request_timeout_secs))
        .context("Failed to build Discord REST client")?;

    let mut handler = HttpTriageHandler::new(&config.handler.url)
        .with_auth_token(config.handler.auth_token.clone());
    if let Some(secs) = config.handler.timeout_secs {
        handler = handler
            .with_timeout(Duration::from_secs(secs))
            .context("Failed to build handler client")?;
    }

    let processor = TriageProcessor::new(Arc::new(handler), Arc::new(api))
        .with_vocabulary(HelpVocabulary::new(&discord.help_keywords))
        .with_history_limit(discord.history_limit);
    Ok(Arc::new(processor))
}

fn gateway_config(config: &ConciergeConfig) -> GatewayConfig {
    let discord = &config.discord;
    GatewayConfig {
        url: discord.gateway_url.clone(),
        identify: IdentifyPayload {
            token: discord.bot_token.clone(),
            intents: discord.intents,
            properties: ConnectionProperties {
                os: discord.properties.os.clone(),
                browser: discord.properties.browser.clone(),
                device: discord.properties.device.clone(),
            },
        },
    }
}

async fn run(cli: &Cli, args: RunArgs) -> anyhow::Result<()> {
    let config = load(cli)?.config;
    check_required(&config)?;

    let processor = build_processor(&config)?;

    if config.server.enabled && !args.no_server {
        let host = args.host.unwrap_or_else(|| config.server.host.clone());
        let port = args.port.unwrap_or(config.server.port);
        let server =
            StatusServer::new(processor.clone()).with_auth_token(config.server.auth_token.clone());
        tokio::spawn(async move {
            if let Err(e) = server.start(&host, port).await {
                error!(error = %e, "Status server stopped");
            }
        });
    }

    let (dispatch_tx, dispatch_rx) = mpsc::channel(DISPATCH_QUEUE_SIZE);
    let dispatch = processor.spawn_dispatch_loop(dispatch_rx);

    let connection = GatewayConnection::new(gateway_config(&config), dispatch_tx);
    let result = connection
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    let _ = dispatch.await;
    result.context("Gateway session ended")?;
    info!("Shut down cleanly");
    Ok(())
}

/// Show the first and last few characters of a secret.
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.is_empty() {
        return "not set".to_string();
    }
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

fn show_config(cli: &Cli) -> anyhow::Result<()> {
    let resolved = load(cli)?;
    let config = &resolved.config;

    let source = resolved
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string());
    println!("{} {}", "Config:".cyan().bold(), source);

    println!("\n{}", "Discord".bold());
    println!("  gateway_url:    {}", config.discord.gateway_url);
    println!("  api_base:       {}", config.discord.api_base);
    println!("  bot_token:      {}", mask_secret(&config.discord.bot_token));
    println!("  intents:        {}", config.discord.intents);
    println!("  history_limit:  {}", config.discord.history_limit);
    println!("  help_keywords:  {}", config.discord.help_keywords.join(", "));

    println!("\n{}", "Server".bold());
    let server_state = if config.server.enabled {
        "enabled".green()
    } else {
        "disabled".yellow()
    };
    println!(
        "  {} on {}:{}",
        server_state, config.server.host, config.server.port
    );

    println!("\n{}", "Handler".bold());
    let url = if config.handler.url.is_empty() {
        "not set".red().to_string()
    } else {
        config.handler.url.clone()
    };
    println!("  url:            {}", url);

    Ok(())
}
