//! Configuration management.
//!
//! Configuration is layered: built-in defaults rooted at the platform data
//! directory, then an optional TOML file, then environment overrides.
//!
//! ```toml
//! [storage]
//! mode = "dual"            # sqlite | json | both (aliases: relational, document, dual)
//! database_path = "/var/lib/metacat/catalog.db"
//! document_path = "/var/lib/metacat/catalog.json"
//!
//! [logging]
//! format = "json"
//! filter = "metacat=debug"
//! ```

use crate::observability::{LogFormat, LoggingConfig};
use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable selecting the storage mode.
pub const ENV_STORAGE_MODE: &str = "METACAT_STORAGE_MODE";
/// Environment variable overriding the relational database path.
pub const ENV_DATABASE_PATH: &str = "METACAT_DATABASE_PATH";
/// Environment variable overriding the JSON document path.
pub const ENV_DOCUMENT_PATH: &str = "METACAT_DOCUMENT_PATH";
/// Environment variable selecting the log format.
pub const ENV_LOG_FORMAT: &str = "METACAT_LOG_FORMAT";

/// Which backends are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageMode {
    /// `SQLite` only.
    #[default]
    Relational,
    /// JSON document only.
    Document,
    /// Both backends; every write fans out to each.
    Dual,
}

impl StorageMode {
    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Relational => "sqlite",
            Self::Document => "json",
            Self::Dual => "both",
        }
    }

    /// Returns true if the relational backend is active.
    #[must_use]
    pub const fn uses_relational(self) -> bool {
        matches!(self, Self::Relational | Self::Dual)
    }

    /// Returns true if the document backend is active.
    #[must_use]
    pub const fn uses_document(self) -> bool {
        matches!(self, Self::Document | Self::Dual)
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "relational" => Ok(Self::Relational),
            "json" | "document" => Ok(Self::Document),
            "both" | "dual" => Ok(Self::Dual),
            other => Err(Error::InvalidInput(format!(
                "unknown storage mode '{other}' (expected sqlite, json, or both)"
            ))),
        }
    }
}

/// Storage mode plus backend locations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageConfig {
    /// Active backends.
    pub mode: StorageMode,
    /// `SQLite` database file.
    pub database_path: Option<PathBuf>,
    /// JSON document file.
    pub document_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Creates a configuration for `mode` with no locations set.
    #[must_use]
    pub const fn new(mode: StorageMode) -> Self {
        Self {
            mode,
            database_path: None,
            document_path: None,
        }
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the document path.
    #[must_use]
    pub fn with_document_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.document_path = Some(path.into());
        self
    }

    /// Checks that every active backend has a location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the missing path.
    pub fn validate(&self) -> Result<()> {
        if self.mode.uses_relational() && self.database_path.is_none() {
            return Err(Error::InvalidInput(format!(
                "storage mode '{}' requires a database path",
                self.mode
            )));
        }
        if self.mode.uses_document() && self.document_path.is_none() {
            return Err(Error::InvalidInput(format!(
                "storage mode '{}' requires a document path",
                self.mode
            )));
        }
        Ok(())
    }
}

/// Main configuration for metacat.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogConfig {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Storage section.
    pub storage: Option<ConfigFileStorage>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Storage section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStorage {
    /// Storage mode name.
    pub mode: Option<String>,
    /// Database path.
    pub database_path: Option<String>,
    /// Document path.
    pub document_path: Option<String>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Format name.
    pub format: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl CatalogConfig {
    /// Creates a configuration with defaults rooted at `data_dir`.
    ///
    /// Both backend paths are filled so any mode validates.
    #[must_use]
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            storage: StorageConfig::new(StorageMode::default())
                .with_database_path(data_dir.join("catalog.db"))
                .with_document_path(data_dir.join("catalog.json")),
            logging: LoggingConfig::default(),
        }
    }

    /// Returns the defaults, rooted at the platform data directory
    /// (`~/.local/share/metacat` on Linux), or `.metacat` if unknown.
    #[must_use]
    pub fn default_paths() -> Self {
        let data_dir = directories::ProjectDirs::from("", "", "metacat").map_or_else(
            || PathBuf::from(".metacat"),
            |dirs| dirs.data_dir().to_path_buf(),
        );
        Self::with_data_dir(&data_dir)
    }

    /// Loads configuration from a file path, layered over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or names an
    /// unknown storage mode.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses TOML configuration, layered over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML does not parse or names an unknown
    /// storage mode.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Self::default_paths().apply_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Reads `config.toml` from the platform config directory if present
    /// (`~/.config/metacat/` on Linux), then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file or an override is invalid.
    pub fn load_default() -> Result<Self> {
        let config_file = directories::ProjectDirs::from("", "", "metacat")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|path| path.exists());
        let config = match config_file {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default_paths(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    fn apply_file(mut self, file: ConfigFile) -> Result<Self> {
        if let Some(storage) = file.storage {
            if let Some(mode) = storage.mode {
                self.storage.mode = mode.parse()?;
            }
            if let Some(path) = storage.database_path {
                self.storage.database_path = Some(PathBuf::from(path));
            }
            if let Some(path) = storage.document_path {
                self.storage.document_path = Some(PathBuf::from(path));
            }
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                self.logging.format = LogFormat::parse(&format);
            }
            if let Some(filter) = logging.filter {
                self.logging.filter = filter;
            }
            if let Some(file) = logging.file {
                self.logging.file = Some(PathBuf::from(file));
            }
        }
        Ok(self)
    }

    /// Applies `METACAT_*` overrides read through `lookup`.
    ///
    /// Pass `|key| std::env::var(key).ok()` for the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown storage mode.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(mode) = lookup(ENV_STORAGE_MODE) {
            self.storage.mode = mode.parse()?;
        }
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            self.storage.database_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup(ENV_DOCUMENT_PATH) {
            self.storage.document_path = Some(PathBuf::from(path));
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = LogFormat::parse(&format);
        }
        Ok(self)
    }
}
