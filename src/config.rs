use crate::calendar::MonthLabelLocale;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "CONTRACT_PROGRESS_CONFIG";
pub const HTTP_ADDR_VAR: &str = "CONTRACT_PROGRESS_HTTP_ADDR";
pub const DATABASE_VAR: &str = "CONTRACT_PROGRESS_DB";
pub const LOCALE_VAR: &str = "CONTRACT_PROGRESS_LOCALE";
pub const LOG_VAR: &str = "CONTRACT_PROGRESS_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub database_path: PathBuf,
    pub locale: MonthLabelLocale,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_path: PathBuf::from("contract-progress.db"),
            locale: MonthLabelLocale::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Defaults, then the file named by `CONTRACT_PROGRESS_CONFIG`, then
    /// individual environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(HTTP_ADDR_VAR) {
            self.http_addr = addr.parse().map_err(|err| ConfigError::InvalidValue {
                name: HTTP_ADDR_VAR,
                message: format!("'{addr}': {err}"),
            })?;
        }
        if let Some(path) = lookup(DATABASE_VAR) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(locale) = lookup(LOCALE_VAR) {
            self.locale = locale
                .parse()
                .map_err(|message| ConfigError::InvalidValue {
                    name: LOCALE_VAR,
                    message,
                })?;
        }
        Ok(())
    }
}

/// Initialise `pretty_env_logger` from `CONTRACT_PROGRESS_LOG`, defaulting
/// to `info`.
pub fn init_logging() {
    let filter = std::env::var(LOG_VAR).unwrap_or_else(|_| "info".to_string());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filter)
        .try_init()
        .ok();
}
