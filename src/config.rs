//! Application configuration.
//!
//! [`AppConfig`] gathers everything a run needs that does not come from
//! command-line flags: credentials, where exports go, and a few defaults.
//! It is usually loaded from the environment (and a `.env` file), but every
//! field can also be set with a builder.
//!
//! # Environment
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `DISCORD_USER_TOKEN` | - | User credential (DMs, personal history) |
//! | `DISCORD_BOT_TOKEN` | - | Bot credential |
//! | `EXPORT_DIR` | `./exports` | Output directory |
//! | `DEFAULT_FORMAT` | `txt` | Format when `--format` is not given |
//! | `DISCORD_API_BASE` | `https://discord.com/api/v10` | API root |
//! | `SEARCH_LIMIT` | `200` | Per-channel cap for keyword searches |
//! | `SWEEP_CONCURRENCY` | `1` | Sources fetched at the same time |
//!
//! # Example
//!
//! ```rust
//! use chatsweep::config::AppConfig;
//!
//! let config = AppConfig::new()
//!     .with_bot_token("abc")
//!     .with_export_dir("out");
//!
//! assert!(config.validate().is_empty());
//! assert!(config.credential().unwrap().is_bot());
//! ```

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::Credential;
use crate::client::http::DEFAULT_API_BASE;
use crate::error::{ChatsweepError, Result};
use crate::format::OutputFormat;

const USER_TOKEN_PLACEHOLDER: &str = "YOUR_USER_TOKEN_HERE";
const BOT_TOKEN_PLACEHOLDER: &str = "YOUR_BOT_TOKEN_HERE";

/// Runtime configuration for the exporter.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// User token, sent as-is in the `Authorization` header
    #[serde(skip_serializing)]
    pub user_token: Option<String>,

    /// Bot token, sent with a `Bot ` prefix
    #[serde(skip_serializing)]
    pub bot_token: Option<String>,

    /// Directory exports are written to (default: `./exports`)
    pub export_dir: PathBuf,

    /// Format name used when none is requested (default: `txt`)
    ///
    /// Kept as text so a bad value is reported by [`validate`](Self::validate)
    /// instead of failing the load.
    pub default_format: String,

    /// API root (default: [`DEFAULT_API_BASE`])
    pub api_base: String,

    /// Per-channel message cap for keyword searches (default: 200)
    pub search_limit: usize,

    /// Sources fetched at the same time during a sweep (default: 1)
    pub sweep_concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_token: None,
            bot_token: None,
            export_dir: PathBuf::from("./exports"),
            default_format: "txt".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            search_limit: 200,
            sweep_concurrency: 1,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|_| "<redacted>");
        f.debug_struct("AppConfig")
            .field("user_token", &redact(&self.user_token))
            .field("bot_token", &redact(&self.bot_token))
            .field("export_dir", &self.export_dir)
            .field("default_format", &self.default_format)
            .field("api_base", &self.api_base)
            .field("search_limit", &self.search_limit)
            .field("sweep_concurrency", &self.sweep_concurrency)
            .finish()
    }
}

/// Token value, treating blanks and the `.env.example` placeholders as absent.
fn real_token(value: Option<String>, placeholder: &str) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != placeholder)
}

fn parse_number<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse()
            .map_err(|_| ChatsweepError::config(format!("{key} must be a number, got '{v}'"))),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(ChatsweepError::config(format!("Failed to read .env: {err}"))),
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from any key-value source.
    ///
    /// ```rust
    /// use chatsweep::config::AppConfig;
    ///
    /// let config = AppConfig::from_lookup(|key| match key {
    ///     "DISCORD_USER_TOKEN" => Some("YOUR_USER_TOKEN_HERE".to_string()),
    ///     "SEARCH_LIMIT" => Some("50".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    ///
    /// assert!(config.user_token.is_none());
    /// assert_eq!(config.search_limit, 50);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            user_token: real_token(lookup("DISCORD_USER_TOKEN"), USER_TOKEN_PLACEHOLDER),
            bot_token: real_token(lookup("DISCORD_BOT_TOKEN"), BOT_TOKEN_PLACEHOLDER),
            export_dir: text("EXPORT_DIR").map_or(defaults.export_dir, PathBuf::from),
            default_format: text("DEFAULT_FORMAT")
                .map_or(defaults.default_format, |f| f.to_lowercase()),
            api_base: text("DISCORD_API_BASE").unwrap_or(defaults.api_base),
            search_limit: parse_number("SEARCH_LIMIT", lookup("SEARCH_LIMIT"), defaults.search_limit)?,
            sweep_concurrency: parse_number(
                "SWEEP_CONCURRENCY",
                lookup("SWEEP_CONCURRENCY"),
                defaults.sweep_concurrency,
            )?,
        })
    }

    #[must_use]
    pub fn with_user_token(mut self, token: impl Into<String>) -> Self {
        self.user_token = real_token(Some(token.into()), USER_TOKEN_PLACEHOLDER);
        self
    }

    #[must_use]
    pub fn with_bot_token(mut self, token: impl Into<String>) -> Self {
        self.bot_token = real_token(Some(token.into()), BOT_TOKEN_PLACEHOLDER);
        self
    }

    #[must_use]
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_default_format(mut self, format: OutputFormat) -> Self {
        self.default_format = format.extension().to_string();
        self
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    #[must_use]
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    #[must_use]
    pub fn with_sweep_concurrency(mut self, concurrency: usize) -> Self {
        self.sweep_concurrency = concurrency;
        self
    }

    pub fn has_user_token(&self) -> bool {
        self.user_token.is_some()
    }

    pub fn has_bot_token(&self) -> bool {
        self.bot_token.is_some()
    }

    /// Lists configuration problems. Empty means ready to run.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.has_user_token() && !self.has_bot_token() {
            problems.push(
                "No Discord token found. Set at least one of:\n  \
                 • DISCORD_USER_TOKEN  (user mode: DMs, personal messages)\n  \
                 • DISCORD_BOT_TOKEN   (bot mode)\n\
                 Copy .env.example to .env and fill in your token(s)."
                    .to_string(),
            );
        }
        if let Err(err) = self.default_format() {
            problems.push(format!("DEFAULT_FORMAT: {err}"));
        }
        if self.sweep_concurrency == 0 {
            problems.push("SWEEP_CONCURRENCY must be at least 1".to_string());
        }
        problems
    }

    /// The configured default format.
    pub fn default_format(&self) -> Result<OutputFormat> {
        OutputFormat::from_str(&self.default_format)
            .map_err(|message| ChatsweepError::invalid_format("output", message))
    }

    /// The credential to authenticate with. The user token wins when both are set.
    pub fn credential(&self) -> Result<Credential> {
        if let Some(token) = &self.user_token {
            return Ok(Credential::User(token.clone()));
        }
        if let Some(token) = &self.bot_token {
            return Ok(Credential::Bot(token.clone()));
        }
        Err(ChatsweepError::config(
            "no Discord token configured (DISCORD_USER_TOKEN or DISCORD_BOT_TOKEN)",
        ))
    }

    /// Creates the export directory if needed and returns it.
    pub fn ensure_export_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.export_dir)?;
        Ok(self.export_dir.as_path())
    }
}
