use std::env;
use std::time::Duration;

use tracing::info;

use crate::error::ToronError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Store
    pub redis_url: String,

    // Forum
    pub reddit_user_agent: String,
    pub subreddit: String,

    // Cycle
    pub cycle_interval: Duration,
    pub request_delay: Duration,
    pub retry_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ToronError> {
        Ok(Self {
            redis_url: required_env("REDIS_URL")?,
            reddit_user_agent: env::var("REDDIT_USER_AGENT")
                .unwrap_or_else(|_| "rust:toron:0.1.0".to_string()),
            subreddit: env::var("SUBREDDIT").unwrap_or_else(|_| "anime".to_string()),
            cycle_interval: Duration::from_secs(parsed_env("CYCLE_INTERVAL_SECS", 600)?),
            request_delay: Duration::from_millis(parsed_env("REQUEST_DELAY_MS", 500)?),
            retry_attempts: parsed_env("RETRY_ATTEMPTS", 3)?,
        })
    }

    /// Log the effective configuration with credentials masked.
    pub fn log_redacted(&self) {
        info!(
            redis_url = %redact_url(&self.redis_url),
            user_agent = %self.reddit_user_agent,
            subreddit = %self.subreddit,
            cycle_interval_secs = self.cycle_interval.as_secs(),
            request_delay_ms = self.request_delay.as_millis() as u64,
            retry_attempts = self.retry_attempts,
            "Loaded configuration"
        );
    }
}

fn required_env(key: &str) -> Result<String, ToronError> {
    env::var(key).map_err(|_| ToronError::Config(format!("{key} environment variable is required")))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ToronError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ToronError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

/// Mask the password component of a connection URL.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparseable>".to_string(),
    }
}
