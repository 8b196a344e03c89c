// ABOUTME: Command-line interface: `parley start` runs the server, `parley config` prints settings.
// ABOUTME: Flags override the file and environment configuration.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use parley_core::Config;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "parley")]
#[command(version, about = "Personal chat assistant server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (defaults to ./config.toml, then ~/.config/parley/config.toml)
    #[arg(long, global = true, env = "PARLEY_CONFIG_PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Start(StartArgs),

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Clone, Default, Args)]
pub struct StartArgs {
    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, short)]
    pub port: Option<u16>,
}

impl Cli {
    /// Load the configuration and apply command-line overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_from(self.config.as_deref())?;
        if let Some(Commands::Start(args)) = &self.command {
            if let Some(host) = &args.host {
                config.server.host = host.clone();
            }
            if let Some(port) = args.port {
                anyhow::ensure!(port != 0, "--port must be non-zero");
                config.server.port = port;
            }
        }
        Ok(config)
    }
}
