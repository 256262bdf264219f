//! Configuration management for eggtrack.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "eggtrack";

/// Default database file name for the sqlite backend.
const DATABASE_FILE_NAME: &str = "labels.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "EGGTRACK_";

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Logical path of the entry document.
pub const DEFAULT_RESOURCE_PATH: &str = "labels/entries.json";

/// Upper bound for the QR image width in pixels.
pub const MAX_QR_SIZE: u32 = 2048;

/// Upper bound for the QR quiet zone, in modules.
pub const MAX_QR_MARGIN: u32 = 16;

/// Modules per side of the smallest QR version.
const MIN_QR_MODULES: u32 = 21;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `EGGTRACK_`, nested keys split on `__`)
/// 2. TOML config file at `~/.config/eggtrack/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Label content configuration.
    pub labels: LabelsConfig,
    /// QR rendering configuration.
    pub qr: QrConfig,
    /// Printable sheet configuration.
    pub sheet: SheetConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// Public base URL used for redirects. Bare hosts get `https://`.
    pub base_url: Option<String>,
    /// Shared secret required by mutating endpoints.
    /// When unset, every mutating request is rejected.
    pub secret: Option<String>,
}

/// Which blob backend holds the entry document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Files below `storage.data_dir`.
    #[default]
    File,
    /// Remote object store at `storage.http_url`.
    Http,
    /// `SQLite` database at `storage.database_path`.
    Sqlite,
    /// Process-local memory; lost on exit.
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Http => "http",
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection.
    pub backend: BackendKind,
    /// Logical path of the entry document inside the backend.
    pub resource_path: String,
    /// Root directory for the file backend.
    /// Defaults to `~/.local/share/eggtrack`
    pub data_dir: Option<PathBuf>,
    /// Base URL of the HTTP object store.
    pub http_url: Option<String>,
    /// Bearer token for the HTTP object store.
    pub http_token: Option<String>,
    /// Path to the database file for the sqlite backend.
    /// Defaults to `~/.local/share/eggtrack/labels.db`
    pub database_path: Option<PathBuf>,
}

/// Label content configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    /// Prefix for generated links; a page id or egg id is appended.
    pub link_base: String,
}

/// QR rendering configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Target image width in pixels.
    pub size: u32,
    /// Quiet zone width in modules.
    pub margin: u32,
}

/// Printable sheet configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Labels per row.
    pub columns: usize,
    /// Rows per page.
    pub rows: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            base_url: None,
            secret: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            resource_path: DEFAULT_RESOURCE_PATH.to_string(),
            data_dir: None, // Will be resolved to default at runtime
            http_url: None,
            http_token: None,
            database_path: None,
        }
    }
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            link_base: "https://www.notion.so/".to_string(),
        }
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            size: 200,
            margin: 2,
        }
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            columns: 3,
            rows: 4,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `EGGTRACK_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &std::path::Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(invalid(format!(
                "server.bind is not a socket address: {}",
                self.server.bind
            )));
        }

        if let Some(base) = self.server.base_url.as_deref().filter(|b| !b.trim().is_empty()) {
            let normalized = normalize_base_url(Some(base));
            if Url::parse(&normalized).is_err() {
                return Err(invalid(format!("server.base_url is not a URL: {base}")));
            }
        }

        if !is_http_url(&self.labels.link_base) {
            return Err(invalid(format!(
                "labels.link_base must be an http(s) URL: {}",
                self.labels.link_base
            )));
        }

        if self.storage.resource_path.trim().is_empty() {
            return Err(invalid("storage.resource_path must not be empty"));
        }

        if self.storage.backend == BackendKind::Http {
            match self.storage.http_url.as_deref() {
                None | Some("") => {
                    return Err(invalid("storage.http_url is required for the http backend"));
                }
                Some(url) if !is_http_url(url) => {
                    return Err(invalid(format!("storage.http_url is not a URL: {url}")));
                }
                Some(_) => {}
            }
        }

        if self.qr.size == 0 || self.qr.size > MAX_QR_SIZE {
            return Err(invalid(format!(
                "qr.size must be between 1 and {MAX_QR_SIZE}, got {}",
                self.qr.size
            )));
        }

        if self.qr.margin > MAX_QR_MARGIN {
            return Err(invalid(format!(
                "qr.margin must be at most {MAX_QR_MARGIN}, got {}",
                self.qr.margin
            )));
        }

        if MIN_QR_MODULES + 2 * self.qr.margin > self.qr.size {
            return Err(invalid(format!(
                "qr.size {} is too small for a margin of {} modules",
                self.qr.size, self.qr.margin
            )));
        }

        if self.sheet.columns == 0 || self.sheet.rows == 0 {
            return Err(invalid("sheet.columns and sheet.rows must be greater than 0"));
        }

        Ok(())
    }

    /// The configured shared secret, if any non-empty one is set.
    #[must_use]
    pub fn secret(&self) -> Option<&str> {
        self.server.secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Public base URL with a scheme and no trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        normalize_base_url(self.server.base_url.as_deref())
    }

    /// Build a label link by appending `suffix` to the link base.
    #[must_use]
    pub fn link_for(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.labels.link_base)
    }

    /// Get the file backend root, resolving defaults if not set.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Render the effective configuration as pretty JSON with the secret
    /// and token masked.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn redacted_json(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.server.secret.is_some() {
            shown.server.secret = Some("***".to_string());
        }
        if shown.storage.http_token.is_some() {
            shown.storage.http_token = Some("***".to_string());
        }
        Ok(serde_json::to_string_pretty(&shown)?)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Normalize a configured base URL.
///
/// A missing or blank value becomes [`DEFAULT_BASE_URL`]; a value without a
/// scheme gets `https://`. Trailing slashes are removed.
#[must_use]
pub fn normalize_base_url(raw: Option<&str>) -> String {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return DEFAULT_BASE_URL.to_string();
    }
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    with_scheme.trim_end_matches('/').to_string()
}
