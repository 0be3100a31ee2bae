//! Relay configuration
//!
//! Settings are resolved from three layers, highest precedence first:
//! explicit overrides (CLI flags and environment variables), the TOML
//! config file, then built-in defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chatrelay_ai::{AssemblyOrder, DEFAULT_MAX_HISTORY};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::relay::WindowScope;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_SYSTEM_PROMPT: &str = "Always respond in Traditional Chinese (zh-tw).";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_POLLING_TIMEOUT_SECS: u32 = 60;
/// Largest accepted history limit
pub const MAX_HISTORY_LIMIT: usize = 1000;

pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
pub const ENV_BOT_TOKEN_ALIAS: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MODEL: &str = "CHATRELAY_MODEL";
pub const ENV_SYSTEM_PROMPT: &str = "CHATRELAY_SYSTEM_PROMPT";
pub const ENV_HISTORY_LIMIT: &str = "CHATRELAY_HISTORY_LIMIT";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_TELEGRAM_API_BASE: &str = "TELEGRAM_API_BASE";
pub const ENV_REQUEST_TIMEOUT: &str = "CHATRELAY_REQUEST_TIMEOUT_SECS";
pub const ENV_POLLING_TIMEOUT: &str = "CHATRELAY_POLLING_TIMEOUT_SECS";
pub const ENV_WINDOW_SCOPE: &str = "CHATRELAY_WINDOW_SCOPE";
pub const ENV_ASSEMBLY_ORDER: &str = "CHATRELAY_ASSEMBLY_ORDER";
pub const ENV_NOTIFY_ON_ERROR: &str = "CHATRELAY_NOTIFY_ON_ERROR";
pub const ENV_TYPING_INDICATOR: &str = "CHATRELAY_TYPING_INDICATOR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Telegram bot token is not set (use --bot-token, BOT_TOKEN or [telegram].bot_token)")]
    MissingBotToken,

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// `[telegram]` section of the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramSection {
    pub bot_token: Option<String>,
    pub api_base: Option<String>,
    pub polling_timeout_secs: Option<u32>,
}

/// `[openai]` section of the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiSection {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

/// `[relay]` section of the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaySection {
    pub system_prompt: Option<String>,
    pub history_limit: Option<usize>,
    pub window_scope: Option<WindowScope>,
    pub assembly_order: Option<AssemblyOrder>,
    pub notify_on_error: Option<bool>,
    pub typing_indicator: Option<bool>,
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub telegram: TelegramSection,
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub relay: RelaySection,
}

impl FileConfig {
    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("chatrelay").join("config.toml"))
    }

    /// Load a config file; unlike a missing default file, an unreadable one is an error
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicitly requested file, or the default one when it exists
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bot_token: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub history_limit: Option<usize>,
    pub base_url: Option<String>,
    pub telegram_api_base: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub polling_timeout_secs: Option<u32>,
    pub window_scope: Option<WindowScope>,
    pub assembly_order: Option<AssemblyOrder>,
    pub notify_on_error: Option<bool>,
    pub typing_indicator: Option<bool>,
}

impl ConfigOverrides {
    /// Read overrides through `lookup`, normally `std::env::var`
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            bot_token: get(ENV_BOT_TOKEN).or_else(|| get(ENV_BOT_TOKEN_ALIAS)),
            api_key: get(ENV_API_KEY),
            model: get(ENV_MODEL),
            system_prompt: get(ENV_SYSTEM_PROMPT),
            history_limit: parse_opt(ENV_HISTORY_LIMIT, get(ENV_HISTORY_LIMIT))?,
            base_url: get(ENV_BASE_URL),
            telegram_api_base: get(ENV_TELEGRAM_API_BASE),
            request_timeout_secs: parse_opt(ENV_REQUEST_TIMEOUT, get(ENV_REQUEST_TIMEOUT))?,
            polling_timeout_secs: parse_opt(ENV_POLLING_TIMEOUT, get(ENV_POLLING_TIMEOUT))?,
            window_scope: parse_opt(ENV_WINDOW_SCOPE, get(ENV_WINDOW_SCOPE))?,
            assembly_order: parse_opt(ENV_ASSEMBLY_ORDER, get(ENV_ASSEMBLY_ORDER))?,
            notify_on_error: parse_bool_opt(ENV_NOTIFY_ON_ERROR, get(ENV_NOTIFY_ON_ERROR))?,
            typing_indicator: parse_bool_opt(ENV_TYPING_INDICATOR, get(ENV_TYPING_INDICATOR))?,
        })
    }

    /// Fill every unset field from `fallback`
    pub fn or(self, fallback: Self) -> Self {
        Self {
            bot_token: self.bot_token.or(fallback.bot_token),
            api_key: self.api_key.or(fallback.api_key),
            model: self.model.or(fallback.model),
            system_prompt: self.system_prompt.or(fallback.system_prompt),
            history_limit: self.history_limit.or(fallback.history_limit),
            base_url: self.base_url.or(fallback.base_url),
            telegram_api_base: self.telegram_api_base.or(fallback.telegram_api_base),
            request_timeout_secs: self.request_timeout_secs.or(fallback.request_timeout_secs),
            polling_timeout_secs: self.polling_timeout_secs.or(fallback.polling_timeout_secs),
            window_scope: self.window_scope.or(fallback.window_scope),
            assembly_order: self.assembly_order.or(fallback.assembly_order),
            notify_on_error: self.notify_on_error.or(fallback.notify_on_error),
            typing_indicator: self.typing_indicator.or(fallback.typing_indicator),
        }
    }
}

fn parse_opt<T>(key: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                message: format!("'{}' ({})", raw, e),
            })
        })
        .transpose()
}

fn parse_bool_opt(key: &'static str, value: Option<String>) -> Result<Option<bool>, ConfigError> {
    value.map(|raw| parse_bool(key, &raw)).transpose()
}

/// Accepts the usual spellings of a boolean switch
pub fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            message: format!("'{}' is not a boolean", raw),
        }),
    }
}

/// Fully resolved relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bot_token: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub history_limit: usize,
    pub base_url: String,
    pub telegram_api_base: String,
    pub request_timeout: Duration,
    pub polling_timeout_secs: u32,
    pub window_scope: WindowScope,
    pub assembly_order: AssemblyOrder,
    pub notify_on_error: bool,
    pub typing_indicator: bool,
}

impl RelayConfig {
    /// Merge overrides over the file config and defaults
    pub fn resolve(overrides: ConfigOverrides, file: FileConfig) -> Result<Self, ConfigError> {
        let FileConfig {
            telegram,
            openai,
            relay,
        } = file;

        let bot_token = overrides
            .bot_token
            .or(telegram.bot_token)
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingBotToken)?;

        let api_key = overrides.api_key.or(openai.api_key).unwrap_or_default();
        if api_key.is_empty() {
            warn!(
                "{} is not set; completion requests will be rejected by the API",
                ENV_API_KEY
            );
        }

        let request_timeout_secs = overrides
            .request_timeout_secs
            .or(openai.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_REQUEST_TIMEOUT,
                message: "must be greater than zero".to_string(),
            });
        }

        let history_limit = overrides
            .history_limit
            .or(relay.history_limit)
            .unwrap_or(DEFAULT_MAX_HISTORY);
        if history_limit > MAX_HISTORY_LIMIT {
            return Err(ConfigError::Invalid {
                key: ENV_HISTORY_LIMIT,
                message: format!("must be at most {}", MAX_HISTORY_LIMIT),
            });
        }

        Ok(Self {
            bot_token,
            api_key,
            model: overrides
                .model
                .or(openai.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system_prompt: overrides
                .system_prompt
                .or(relay.system_prompt)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            history_limit,
            base_url: overrides
                .base_url
                .or(openai.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            telegram_api_base: overrides
                .telegram_api_base
                .or(telegram.api_base)
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string()),
            request_timeout: Duration::from_secs(request_timeout_secs),
            polling_timeout_secs: overrides
                .polling_timeout_secs
                .or(telegram.polling_timeout_secs)
                .unwrap_or(DEFAULT_POLLING_TIMEOUT_SECS),
            window_scope: overrides
                .window_scope
                .or(relay.window_scope)
                .unwrap_or_default(),
            assembly_order: overrides
                .assembly_order
                .or(relay.assembly_order)
                .unwrap_or_default(),
            notify_on_error: overrides
                .notify_on_error
                .or(relay.notify_on_error)
                .unwrap_or(true),
            typing_indicator: overrides
                .typing_indicator
                .or(relay.typing_indicator)
                .unwrap_or(true),
        })
    }

    /// Resolve from the process environment only
    pub fn from_env() -> Result<Self, ConfigError> {
        let overrides = ConfigOverrides::from_env(|key| std::env::var(key).ok())?;
        Self::resolve(overrides, FileConfig::default())
    }
}
