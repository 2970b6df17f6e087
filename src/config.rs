use crate::errors::DbError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    pub level: Option<String>,
    pub retention: Option<usize>,
}

/// Service configuration, usually loaded from a TOML file.
///
/// ```toml
/// max_limit = 1000
/// id_fields = ["ownerId"]
///
/// [logging]
/// dir = "./logs"
/// level = "info"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Upper bound on the number of documents a find returns.
    pub max_limit: Option<usize>,
    /// Fields stripped from update payloads in addition to `id` and `_id`.
    pub id_fields: Vec<String>,
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_limit: None,
            id_fields: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// # Errors
    /// Returns `Config` if the text is not valid TOML for this structure.
    pub fn from_toml_str(s: &str) -> Result<Self, DbError> {
        Ok(toml::from_str(s)?)
    }

    /// # Errors
    /// Returns `Io` if the file cannot be read, `Config` if it does not parse.
    pub fn load(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Overlays `NEXUS_ODM_*` environment variables on top of `self`.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if let Some(n) = std::env::var("NEXUS_ODM_MAX_LIMIT").ok().and_then(|s| s.parse().ok()) {
            self.max_limit = Some(n);
        }
        if let Ok(dir) = std::env::var("NEXUS_ODM_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(dir));
        }
        if let Ok(level) = std::env::var("NEXUS_ODM_LOG_LEVEL") {
            self.logging.level = Some(level);
        }
        if let Some(n) = std::env::var("NEXUS_ODM_LOG_RETENTION").ok().and_then(|s| s.parse().ok()) {
            self.logging.retention = Some(n);
        }
        self
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Installs the logging configuration described by `self.logging`.
    ///
    /// # Errors
    /// See [`crate::logger::configure_logging`].
    pub fn apply_logging(&self) -> Result<(), DbError> {
        crate::logger::configure_logging(
            self.logging.dir.as_deref(),
            self.logging.level.as_deref(),
            self.logging.retention,
        )
    }
}
