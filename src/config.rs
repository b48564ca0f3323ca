use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BASE_API_URL: &str = "http://127.0.0.1:8000/arz-watch-api";
const DEFAULT_USERS_DB_PATH: &str = "./database/telegram/users.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct Config {
    pub bot_token: String,
    pub base_api_url: String,
    pub api_key: String,
    pub http_timeout: Duration,
    pub users_db_path: PathBuf,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to
    /// touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = non_empty("TELEGRAM_BOT_TOKEN")
            .or_else(|| non_empty("TELOXIDE_TOKEN"))
            .context("TELEGRAM_BOT_TOKEN not set")?;
        let api_key = non_empty("API_ACCESS_KEY").context("API_ACCESS_KEY not set")?;

        let base_api_url = non_empty("BASE_API_URL")
            .unwrap_or_else(|| DEFAULT_BASE_API_URL.into())
            .trim_end_matches('/')
            .to_string();
        if !base_api_url.starts_with("http://") && !base_api_url.starts_with("https://") {
            bail!("BASE_API_URL must be an http(s) URL, got {base_api_url:?}");
        }

        let timeout_secs = match non_empty("TELEGRAM_BOT_TIMEOUT") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("TELEGRAM_BOT_TIMEOUT is not a number: {raw:?}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            bot_token,
            base_api_url,
            api_key,
            http_timeout: Duration::from_secs(timeout_secs),
            users_db_path: non_empty("USERS_DB_PATH")
                .unwrap_or_else(|| DEFAULT_USERS_DB_PATH.into())
                .into(),
            log_dir: non_empty("LOG_DIR").map(PathBuf::from),
        })
    }
}
