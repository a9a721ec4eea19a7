//! Configuration management for deliverylog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default application directory name.
const APP_DIR_NAME: &str = "deliverylog";

/// Default outbox database file name.
const OUTBOX_FILE_NAME: &str = "outbox.db";

/// Placeholder printed instead of secrets.
const REDACTED: &str = "<redacted>";

/// Environment variable prefix.
const ENV_PREFIX: &str = "DELIVERYLOG_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `DELIVERYLOG_`, `__` between sections)
/// 2. TOML config file at `~/.config/deliverylog/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local storage configuration.
    pub storage: StorageConfig,
    /// Remote sink configuration.
    pub remote: RemoteConfig,
    /// Form validation configuration.
    pub validation: ValidationConfig,
    /// CSV export configuration.
    pub export: ExportConfig,
}

/// Local storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for per-delivery image folders.
    pub data_dir: PathBuf,
    /// Path to the outbox database.
    /// Defaults to `~/.local/share/deliverylog/outbox.db`
    pub outbox_path: Option<PathBuf>,
}

/// Which remote sink, if any, mirrors recorded deliveries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// No remote mirroring.
    #[default]
    None,
    /// A Google Sheets worksheet.
    GoogleSheets,
    /// A local CSV file standing in for a spreadsheet.
    CsvFile,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::GoogleSheets => write!(f, "google_sheets"),
            Self::CsvFile => write!(f, "csv_file"),
        }
    }
}

/// Remote sink configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Which sink to use.
    pub kind: SinkKind,
    /// Spreadsheet ID (Google Sheets).
    pub spreadsheet_id: Option<String>,
    /// Worksheet name (Google Sheets).
    pub sheet_name: String,
    /// Pre-issued OAuth bearer token (Google Sheets).
    pub access_token: Option<String>,
    /// Base URL of the Sheets API.
    pub endpoint: String,
    /// Target file (CSV file sink).
    pub csv_path: Option<PathBuf>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Queue rows that fail to sync instead of failing the submission.
    pub outbox_enabled: bool,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("kind", &self.kind)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("sheet_name", &self.sheet_name)
            .field("access_token", &self.access_token.as_ref().map(|_| REDACTED))
            .field("endpoint", &self.endpoint)
            .field("csv_path", &self.csv_path)
            .field("timeout_secs", &self.timeout_secs)
            .field("outbox_enabled", &self.outbox_enabled)
            .finish()
    }
}

/// Form validation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Apply validation rules at all.
    pub enabled: bool,
    /// Regex the plate number must match.
    pub plate_pattern: String,
    /// Maximum length of any text field, in characters.
    pub max_text_length: usize,
}

/// CSV export configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Where the session table is exported by default.
    pub default_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            outbox_path: None, // Will be resolved to default at runtime
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::None,
            spreadsheet_id: None,
            sheet_name: "Sheet1".to_string(),
            access_token: None,
            endpoint: "https://sheets.googleapis.com/v4".to_string(),
            csv_path: None,
            timeout_secs: 30,
            outbox_enabled: true,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            plate_pattern: r"^[A-Za-z0-9][A-Za-z0-9 -]{0,15}$".to_string(),
            max_text_length: 200,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_path: PathBuf::from("deliveries.csv"),
        }
    }
}

impl Config {
    /// Load configuration from all sources, reading `config_path` instead of
    /// the default file when given.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default application data directory path.
    #[must_use]
    pub fn default_app_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(APP_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if regex::Regex::new(&self.validation.plate_pattern).is_err() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "invalid regex pattern: {}",
                    self.validation.plate_pattern
                ),
            });
        }

        if self.validation.max_text_length == 0 {
            return Err(Error::ConfigValidation {
                message: "max_text_length must be greater than 0".to_string(),
            });
        }

        if self.remote.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "timeout_secs must be greater than 0".to_string(),
            });
        }

        match self.remote.kind {
            SinkKind::None => {}
            SinkKind::GoogleSheets => {
                if is_blank(self.remote.spreadsheet_id.as_deref()) {
                    return Err(Error::ConfigValidation {
                        message: "remote.spreadsheet_id is required for google_sheets".to_string(),
                    });
                }
                if is_blank(self.remote.access_token.as_deref()) {
                    return Err(Error::ConfigValidation {
                        message: "remote.access_token is required for google_sheets".to_string(),
                    });
                }
                if self.remote.sheet_name.trim().is_empty() {
                    return Err(Error::ConfigValidation {
                        message: "remote.sheet_name must not be empty".to_string(),
                    });
                }
            }
            SinkKind::CsvFile => {
                if self.remote.csv_path.is_none() {
                    return Err(Error::ConfigValidation {
                        message: "remote.csv_path is required for csv_file".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Get the outbox path, resolving defaults if not set.
    #[must_use]
    pub fn outbox_path(&self) -> PathBuf {
        self.storage
            .outbox_path
            .clone()
            .unwrap_or_else(|| Self::default_app_data_dir().join(OUTBOX_FILE_NAME))
    }

    /// Get the remote request timeout as a Duration.
    #[must_use]
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    /// Whether a remote sink is configured.
    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.remote.kind != SinkKind::None
    }

    /// A copy safe to print: the access token is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.remote.access_token.is_some() {
            config.remote.access_token = Some(REDACTED.to_string());
        }
        config
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
