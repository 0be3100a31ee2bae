mod cli;
mod commands;
mod completions;
mod error;
mod logging;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chatrelay_core::{ConfigOverrides, FileConfig, RelayConfig};
use clap::Parser;
use cli::{Cli, Commands};
use tracing::debug;

const ENV_CONFIG: &str = "CHATRELAY_CONFIG";
const ENV_LOG_DIR: &str = "CHATRELAY_LOG_DIR";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error::handle_error(err);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::Run);

    if let Commands::Completions { shell } = command {
        completions::generate_completions(shell);
        return Ok(());
    }

    load_env_file(cli.env_file.as_deref())?;
    let log_dir = cli.log_dir.clone().or_else(|| env_path(ENV_LOG_DIR));
    let _guard = logging::init(cli.verbose, log_dir.as_deref())?;

    let config_path = cli.config.clone().or_else(|| env_path(ENV_CONFIG));
    let file = FileConfig::load_or_default(config_path.as_deref())?;
    let overrides = cli
        .settings
        .to_overrides()
        .or(ConfigOverrides::from_env(|key| std::env::var(key).ok())?);
    let config = RelayConfig::resolve(overrides, file)?;
    debug!(
        "Resolved configuration: model={}, history_limit={}, window_scope={}",
        config.model, config.history_limit, config.window_scope
    );

    match command {
        Commands::Run => commands::run::run(config).await,
        Commands::Check => commands::check::run(config).await,
        Commands::Completions { .. } => Ok(()),
    }
}

/// Path from the environment, read after the dotenv file was applied
fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Load variables from a dotenv file; a missing default `.env` is fine
fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}
