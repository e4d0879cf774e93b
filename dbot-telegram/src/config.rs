//! Minimal framework config: token, API URL, log path, polling and dispatch timeouts.
//! Loaded from environment variables BOT_TOKEN, TELEGRAM_API_URL, LOG_FILE, POLL_TIMEOUT_SECS,
//! HANDLER_TIMEOUT_SECS, DRAIN_TIMEOUT_SECS, POLL_ERROR_DELAY_MS.

use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use update_dispatcher::UpdateLoopConfig;

/// Telegram bot framework config (Telegram access, logging, dispatch tuning).
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub telegram_api_url: Option<String>,
    pub log_file: String,
    /// Long-poll timeout passed to getUpdates; keep below the HTTP client timeout.
    pub poll_timeout_secs: u32,
    /// Upper bound for one handler / step invocation; unbounded when None.
    pub handler_timeout: Option<Duration>,
    pub drain_timeout: Duration,
    pub poll_error_delay: Duration,
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl TelegramConfig {
    /// Loads from environment variables. `token` overrides BOT_TOKEN if provided; otherwise BOT_TOKEN is required.
    pub fn load(token: Option<String>) -> Result<Self> {
        let bot_token = match token {
            Some(token) => token,
            None => env::var("BOT_TOKEN").map_err(|_| anyhow::anyhow!("BOT_TOKEN not set"))?,
        };
        let telegram_api_url = env::var("TELEGRAM_API_URL")
            .or_else(|_| env::var("TELOXIDE_API_URL"))
            .ok();
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/dbot.log".to_string());

        Ok(Self {
            bot_token,
            telegram_api_url,
            log_file,
            poll_timeout_secs: env_parse("POLL_TIMEOUT_SECS").unwrap_or(10),
            handler_timeout: env_parse::<u64>("HANDLER_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            drain_timeout: Duration::from_secs(env_parse("DRAIN_TIMEOUT_SECS").unwrap_or(10)),
            poll_error_delay: Duration::from_millis(env_parse("POLL_ERROR_DELAY_MS").unwrap_or(1000)),
        })
    }

    /// Loads from environment variables only.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Builds with the given token and defaults for everything else.
    pub fn with_token(bot_token: String) -> Self {
        Self {
            bot_token,
            telegram_api_url: None,
            log_file: "logs/dbot.log".to_string(),
            poll_timeout_secs: 10,
            handler_timeout: None,
            drain_timeout: Duration::from_secs(10),
            poll_error_delay: Duration::from_secs(1),
        }
    }

    /// Validates config (token not blank, API URL parses if set). Call after load to fail fast.
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("BOT_TOKEN is empty");
        }
        if let Some(ref url_str) = self.telegram_api_url {
            if reqwest::Url::parse(url_str).is_err() {
                anyhow::bail!(
                    "TELEGRAM_API_URL (or TELOXIDE_API_URL) is set but not a valid URL: {}",
                    url_str
                );
            }
        }
        Ok(())
    }

    pub fn update_loop_config(&self) -> UpdateLoopConfig {
        UpdateLoopConfig {
            drain_timeout: self.drain_timeout,
            poll_error_delay: self.poll_error_delay,
            ..UpdateLoopConfig::default()
        }
    }
}
