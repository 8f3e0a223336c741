//! Kernel configuration, loaded from RON.
//!
//! ```ron
//! (
//!     db_path: Some("/var/lib/pagewright/pages.db"),
//!     event_capacity: 256,
//!     duplicate: (title_suffix: " (Copy)", slug_suffix: "copy"),
//! )
//! ```
//!
//! Every field is optional. With no `db_path` the database lives at
//! `<data_local_dir>/pagewright/pages.db`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::events::DEFAULT_EVENT_CAPACITY;

/// Error type for configuration loading and kernel startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("no local data directory; set db_path explicitly")]
    NoDataDir,
    #[error("failed to open database: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Naming applied to duplicated pages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateNaming {
    /// Appended to the source title.
    pub title_suffix: String,
    /// Slug marker: `<slug>-<suffix>`, then `<slug>-<suffix>-2`, ...
    pub slug_suffix: String,
}

impl DuplicateNaming {
    /// The slug suffix must itself be a valid slug, or every duplicate fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::pages::validate_slug(&self.slug_suffix).map_err(|e| ConfigError::Invalid {
            field: "duplicate.slug_suffix",
            reason: e.to_string(),
        })
    }
}

impl Default for DuplicateNaming {
    fn default() -> Self {
        Self {
            title_suffix: " (Copy)".into(),
            slug_suffix: "copy".into(),
        }
    }
}

/// Kernel configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// SQLite file. `None` uses the platform data directory.
    pub db_path: Option<PathBuf>,
    /// Keep everything in memory; `db_path` is ignored.
    pub in_memory: bool,
    /// Page event broadcast capacity.
    pub event_capacity: usize,
    pub duplicate: DuplicateNaming,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            in_memory: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            duplicate: DuplicateNaming::default(),
        }
    }
}

impl KernelConfig {
    /// In-memory configuration (tests, scratch sessions).
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            ..Self::default()
        }
    }

    /// Configuration backed by a specific database file.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parse from RON text and validate.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later, per operation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.duplicate.validate()
    }

    /// Load from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron(&text)?;
        tracing::debug!(path = %path.display(), "loaded kernel config");
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Default config file location: `<config_dir>/pagewright/config.ron`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pagewright").join("config.ron"))
    }

    /// The database file to open. `None` when running in memory.
    pub fn resolved_db_path(&self) -> Result<Option<PathBuf>, ConfigError> {
        if self.in_memory {
            return Ok(None);
        }
        if let Some(path) = &self.db_path {
            return Ok(Some(path.clone()));
        }
        dirs::data_local_dir()
            .map(|d| Some(d.join("pagewright").join("pages.db")))
            .ok_or(ConfigError::NoDataDir)
    }
}
