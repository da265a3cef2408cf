//! Configuration file support.
//!
//! ```toml
//! # ~/.config/sqlport/config.toml
//! dialect = "postgres"
//! database_url = "postgres://localhost/app"
//! max_connections = 5
//! row_number_column = "rnumignore"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::scan::DEFAULT_ROW_NUMBER_COLUMN;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend identifier; inferred from `database_url` when absent.
    pub dialect: Option<String>,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub row_number_column: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: None,
            database_url: None,
            max_connections: 5,
            row_number_column: DEFAULT_ROW_NUMBER_COLUMN.to_string(),
        }
    }
}

impl Config {
    /// Config pointing at `url`, everything else defaulted.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            database_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// `<config_dir>/sqlport/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sqlport").join("config.toml"))
    }

    /// Load the default file, or defaults when there is none.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        if config.max_connections == 0 {
            return Err(Error::Config("max_connections must be at least 1".into()));
        }
        Ok(config)
    }

    /// Resolve the dialect: an explicit identifier wins over the URL scheme.
    pub fn dialect(&self) -> Result<Dialect> {
        match (&self.dialect, &self.database_url) {
            (Some(name), _) => Dialect::from_name(name),
            (None, Some(url)) => Dialect::from_url(url),
            (None, None) => Err(Error::Config("no dialect or database_url configured".into())),
        }
    }
}
