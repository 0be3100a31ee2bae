use std::path::PathBuf;

use chatrelay_ai::AssemblyOrder;
use chatrelay_core::{ConfigOverrides, WindowScope};
use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(version, about = "chatrelay - Telegram bot relaying chats to an OpenAI-compatible API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to $CHATRELAY_CONFIG, then <config dir>/chatrelay/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Dotenv file to load before reading the environment (defaults to ./.env)
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to a daily rolling file in this directory ($CHATRELAY_LOG_DIR)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start relaying messages (default)
    Run,

    /// Validate configuration and check the bot token with Telegram
    Check,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Settings that take precedence over the environment and the config file
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// Telegram bot token
    #[arg(long, global = true)]
    pub bot_token: Option<String>,

    /// API key for the completion service
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Model id sent with every completion request
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// System instruction placed before every request
    #[arg(long, global = true)]
    pub system_prompt: Option<String>,

    /// Number of past answers kept in the conversation window
    #[arg(long, global = true)]
    pub history_limit: Option<usize>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Completion request timeout in seconds
    #[arg(long, global = true)]
    pub request_timeout: Option<u64>,

    /// Telegram long-polling timeout in seconds
    #[arg(long, global = true)]
    pub polling_timeout: Option<u32>,

    /// Window scope: shared or per_conversation
    #[arg(long, global = true)]
    pub window_scope: Option<WindowScope>,

    /// Assembly order: pending_first or chronological
    #[arg(long, global = true)]
    pub assembly_order: Option<AssemblyOrder>,

    /// Send a warning to the chat when a reply fails
    #[arg(long, global = true, value_parser = BoolishValueParser::new())]
    pub notify_on_error: Option<bool>,

    /// Show a typing indicator while waiting for the answer
    #[arg(long, global = true, value_parser = BoolishValueParser::new())]
    pub typing_indicator: Option<bool>,
}

impl SettingsArgs {
    pub fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bot_token: self.bot_token.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            history_limit: self.history_limit,
            base_url: self.base_url.clone(),
            telegram_api_base: None,
            request_timeout_secs: self.request_timeout,
            polling_timeout_secs: self.polling_timeout,
            window_scope: self.window_scope,
            assembly_order: self.assembly_order,
            notify_on_error: self.notify_on_error,
            typing_indicator: self.typing_indicator,
        }
    }
}
