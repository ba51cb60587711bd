//! Configuration system: TOML file + env var overrides + smart defaults.
//!
//! Precedence, lowest to highest: built-in defaults, the TOML config file,
//! environment variables, command-line flags (applied by the CLI layer).

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{AtwError, Result};

/// Full atw configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub watch: WatchConfig,
    pub upstream: UpstreamConfig,
    pub telegram: TelegramConfig,
    pub paths: PathsConfig,
}

/// The subject being watched: the two opaque parameters the report endpoint
/// keys on. Both are required before a watch can start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct WatchConfig {
    pub retrieval_code: String,
    pub date_of_birth: String,
}

/// Report endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

/// Telegram transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: i64,
    pub api_base: String,
    pub request_timeout_secs: u64,
}

/// Filesystem paths used by atw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://covid19.altius.org".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            chat_id: 0,
            api_base: "https://api.telegram.org".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[ATW-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("atw").join("config.toml"),
            jsonl_log: home_dir
                .join(".local")
                .join("share")
                .join("atw")
                .join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from the default
    /// path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| AtwError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(AtwError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply environment overrides through an injectable lookup so tests
    /// never have to mutate process-global state.
    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // watch (logical names shared with the upstream service)
        if let Some(raw) = lookup("ALTIUS_RETRIEVAL_CODE") {
            self.watch.retrieval_code = raw;
        }
        if let Some(raw) = lookup("ALTIUS_DATE_OF_BIRTH") {
            self.watch.date_of_birth = raw;
        }

        // telegram
        if let Some(raw) = lookup("TELEGRAM_TOKEN") {
            self.telegram.token = raw;
        }
        if let Some(raw) = lookup("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = parse_env_i64("TELEGRAM_CHAT_ID", &raw)?;
        }
        if let Some(raw) = lookup("ATW_TELEGRAM_API_BASE") {
            self.telegram.api_base = raw;
        }
        if let Some(raw) = lookup("ATW_TELEGRAM_REQUEST_TIMEOUT_SECS") {
            self.telegram.request_timeout_secs =
                parse_env_u64("ATW_TELEGRAM_REQUEST_TIMEOUT_SECS", &raw)?;
        }

        // upstream
        if let Some(raw) = lookup("ATW_UPSTREAM_BASE_URL") {
            self.upstream.base_url = raw;
        }
        if let Some(raw) = lookup("ATW_UPSTREAM_REQUEST_TIMEOUT_SECS") {
            self.upstream.request_timeout_secs =
                parse_env_u64("ATW_UPSTREAM_REQUEST_TIMEOUT_SECS", &raw)?;
        }

        // paths
        if let Some(raw) = lookup("ATW_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }

        Ok(())
    }

    /// Structural validation. The four watch parameters are checked
    /// separately by the subcommands that need them ([`Self::validate_for_watch`]),
    /// so `atw version` and friends work on an empty config.
    fn validate(&self) -> Result<()> {
        if self.upstream.base_url.trim().is_empty() {
            return Err(AtwError::InvalidConfig {
                details: "upstream.base_url must not be empty".to_string(),
            });
        }
        if self.upstream.request_timeout_secs == 0 {
            return Err(AtwError::InvalidConfig {
                details: "upstream.request_timeout_secs must be > 0".to_string(),
            });
        }
        if self.telegram.api_base.trim().is_empty() {
            return Err(AtwError::InvalidConfig {
                details: "telegram.api_base must not be empty".to_string(),
            });
        }
        if self.telegram.request_timeout_secs == 0 {
            return Err(AtwError::InvalidConfig {
                details: "telegram.request_timeout_secs must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Check that everything a watch run needs is present.
    pub fn validate_for_watch(&self) -> Result<()> {
        self.validate_for_check()?;
        if self.telegram.token.trim().is_empty() {
            return Err(AtwError::InvalidConfig {
                details: "telegram.token is required (TELEGRAM_TOKEN or --telegram-token)"
                    .to_string(),
            });
        }
        if self.telegram.chat_id == 0 {
            return Err(AtwError::InvalidConfig {
                details: "telegram.chat_id is required (TELEGRAM_CHAT_ID or --telegram-chat-id)"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Check that a one-shot status check has its two identifying parameters.
    pub fn validate_for_check(&self) -> Result<()> {
        if self.watch.retrieval_code.trim().is_empty() {
            return Err(AtwError::InvalidConfig {
                details:
                    "watch.retrieval_code is required (ALTIUS_RETRIEVAL_CODE or --retrieval-code)"
                        .to_string(),
            });
        }
        if self.watch.date_of_birth.trim().is_empty() {
            return Err(AtwError::InvalidConfig {
                details:
                    "watch.date_of_birth is required (ALTIUS_DATE_OF_BIRTH or --date-of-birth)"
                        .to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_i64(name: &str, raw: &str) -> Result<i64> {
    raw.parse::<i64>().map_err(|error| AtwError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|error| AtwError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
