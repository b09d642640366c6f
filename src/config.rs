use anyhow::bail;
use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use tokio::time::Duration;

use crate::llm_client::DEFAULT_BASE_URL;
use crate::market_data::DEFAULT_YAHOO_URL;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const LOG_FILE_NAME: &str = "ticker-chat.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelChoice {
    #[value(name = "mistral-small-latest")]
    Small,
    #[value(name = "mistral-medium-latest")]
    Medium,
    #[value(name = "mistral-large-latest")]
    Large,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 3] = [ModelChoice::Small, ModelChoice::Medium, ModelChoice::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelChoice::Small => "mistral-small-latest",
            ModelChoice::Medium => "mistral-medium-latest",
            ModelChoice::Large => "mistral-large-latest",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "ticker-chat")]
#[command(about = "Chat with Captain Ticker, a Mistral-powered stock options assistant")]
pub struct Cli {
    /// Mistral API key
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model to chat with
    #[arg(long, env = "MISTRAL_MODEL", value_enum, default_value_t = ModelChoice::Small)]
    pub model: ModelChoice,

    /// Sampling temperature between 0.0 and 1.0
    #[arg(long, env = "MISTRAL_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Chat completion API base URL
    #[arg(long, env = "MISTRAL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Directory holding saved conversations
    #[arg(long, env = "TICKER_CHAT_DIR", default_value = "saved_conversations")]
    pub conversations_dir: PathBuf,

    /// Market data provider base URL
    #[arg(long, env = "TICKER_MARKET_DATA_URL", default_value = DEFAULT_YAHOO_URL)]
    pub market_data_url: String,

    /// Run without a market data provider
    #[arg(long)]
    pub no_market_data: bool,

    /// Timeout for each outbound request, in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Line-oriented mode instead of the full-screen UI
    #[arg(long)]
    pub plain: bool,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log file; defaults to stderr in plain mode and a file in the
    /// conversations directory otherwise
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: ModelChoice,
    pub temperature: f32,
    pub base_url: String,
    pub conversations_dir: PathBuf,
    pub market_data_url: Option<String>,
    pub request_timeout: Duration,
    pub plain: bool,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        validate_temperature(cli.temperature)?;
        if cli.timeout_secs == 0 {
            bail!("--timeout-secs must be greater than zero");
        }
        let log_file = match (cli.log_file, cli.plain) {
            (Some(path), _) => Some(path),
            (None, true) => None,
            (None, false) => Some(cli.conversations_dir.join(LOG_FILE_NAME)),
        };

        Ok(Self {
            api_key: cli.api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            model: cli.model,
            temperature: cli.temperature,
            base_url: cli.base_url,
            conversations_dir: cli.conversations_dir,
            market_data_url: (!cli.no_market_data).then_some(cli.market_data_url),
            request_timeout: Duration::from_secs(cli.timeout_secs),
            plain: cli.plain,
            log_level: cli.log_level,
            log_file,
        })
    }
}

pub fn validate_temperature(t: f32) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&t) {
        bail!("Temperature must be between 0.0 and 1.0, got {}", t);
    }
    Ok(())
}
