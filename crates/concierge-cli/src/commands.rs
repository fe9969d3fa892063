//! CLI commands

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Concierge - answers help requests in Discord
#[derive(Parser, Debug)]
#[command(name = "concierge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to concierge.{jsonc,json,yml,yaml} in the
    /// working directory or ~/.config/concierge/)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the gateway and answer help requests (default)
    Run(RunArgs),

    /// Print the resolved configuration
    Config,
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Status server bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Status server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Do not start the status server
    #[arg(long)]
    pub no_server: bool,
}
