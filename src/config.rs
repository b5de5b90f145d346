//! Configuration management
//!
//! Settings are read once at startup from the environment (a `.env` file is
//! loaded into the environment by `main` first) and passed explicitly to the
//! components that need them.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::knowledge::KnowledgeBase;

pub const DEFAULT_KNOWLEDGE_BASE_PATH: &str = "knowledge_base.txt";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GEMINI_TIMEOUT_SECS: u64 = 30;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("ALLOWED_TELEGRAM_USER_IDS must contain at least one user id")]
    EmptyAllowList,
}

/// Bot configuration
#[derive(Clone)]
pub struct Config {
    /// Telegram bot token
    pub telegram_token: String,

    /// Gemini API key
    pub gemini_api_key: String,

    /// Telegram user ids allowed to talk to the bot (never empty)
    pub allowed_user_ids: BTreeSet<i64>,

    /// Plain-text knowledge base embedded in every prompt
    pub knowledge_base_path: PathBuf,

    /// Gemini model name
    pub gemini_model: String,

    /// Per-request timeout for Gemini calls
    pub gemini_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Blank values are treated the same as missing ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let telegram_token = get("TELEGRAM_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_TOKEN"))?;
        let gemini_api_key = get("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let allowed_raw = get("ALLOWED_TELEGRAM_USER_IDS")
            .ok_or(ConfigError::Missing("ALLOWED_TELEGRAM_USER_IDS"))?;
        let allowed_user_ids = parse_user_ids(&allowed_raw)?;

        let knowledge_base_path = get("KNOWLEDGE_BASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_KNOWLEDGE_BASE_PATH));

        let gemini_model = get("GEMINI_MODEL")
            .map(|m| m.trim().to_string())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let gemini_timeout = match get("GEMINI_TIMEOUT_SECS") {
            Some(v) => {
                let secs: u64 = v.trim().parse().map_err(|e| ConfigError::Invalid {
                    key: "GEMINI_TIMEOUT_SECS",
                    reason: format!("{e}"),
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_GEMINI_TIMEOUT_SECS),
        };

        Ok(Self {
            telegram_token,
            gemini_api_key,
            allowed_user_ids,
            knowledge_base_path,
            gemini_model,
            gemini_timeout,
        })
    }

    /// Read the configured knowledge base file.
    pub fn load_knowledge_base(&self) -> std::io::Result<KnowledgeBase> {
        KnowledgeBase::load(&self.knowledge_base_path)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_token", &"<redacted>")
            .field("gemini_api_key", &"<redacted>")
            .field("allowed_user_ids", &self.allowed_user_ids)
            .field("knowledge_base_path", &self.knowledge_base_path)
            .field("gemini_model", &self.gemini_model)
            .field("gemini_timeout", &self.gemini_timeout)
            .finish()
    }
}

/// Parse a comma-separated id list, optionally wrapped in `[...]`.
fn parse_user_ids(raw: &str) -> Result<BTreeSet<i64>, ConfigError> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);

    let mut ids = BTreeSet::new();
    for part in inner.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id = part.parse::<i64>().map_err(|_| ConfigError::Invalid {
            key: "ALLOWED_TELEGRAM_USER_IDS",
            reason: format!("'{part}' is not an integer user id"),
        })?;
        ids.insert(id);
    }

    if ids.is_empty() {
        return Err(ConfigError::EmptyAllowList);
    }
    Ok(ids)
}

/// Home Assistant connection settings, only needed by the `state` command.
#[derive(Clone)]
pub struct HomeAssistantConfig {
    pub base_url: String,
    pub token: String,
}

impl HomeAssistantConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = get("HOME_ASSISTANT_URL").ok_or(ConfigError::Missing("HOME_ASSISTANT_URL"))?;
        let token = get("HOME_ASSISTANT_TOKEN").ok_or(ConfigError::Missing("HOME_ASSISTANT_TOKEN"))?;

        Ok(Self {
            base_url: base_url.trim().to_string(),
            token,
        })
    }
}

impl fmt::Debug for HomeAssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HomeAssistantConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}
