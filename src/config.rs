//! Configuration file loading and parsing.
//!
//! Hosting binaries load a `trellis.toml` describing the database, the git
//! working trees and the known repositories. Every section is optional and
//! falls back to defaults.
//!
//! ```toml
//! [database]
//! url = "postgres://localhost/trellis"
//! max_connections = 8
//!
//! [git]
//! program = "git"
//! repositories_root = "/srv/trellis/repos"
//! operation_timeout_secs = 120
//!
//! [[repositories]]
//! id = 1
//! name = "team/app"
//! ```

use crate::workflow::domain::{RepoId, Repository, RepositoryName, WorkflowDomainError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Relational store settings.
    pub database: DatabaseConfig,
    /// Version-control settings.
    pub git: GitConfig,
    /// Repositories the engine serves.
    pub repositories: Vec<RepositoryConfig>,
}

/// Relational store settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum pooled connections (default: 8).
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/trellis".to_owned(),
            max_connections: 8,
        }
    }
}

/// Version-control settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
    /// Git executable (default: `git`).
    pub program: String,
    /// Directory holding one working tree per repository name
    /// (default: `repos`).
    pub repositories_root: PathBuf,
    /// Upper bound on a single checkout-and-merge, in seconds (default: no
    /// bound).
    pub operation_timeout_secs: Option<u64>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: "git".to_owned(),
            repositories_root: PathBuf::from("repos"),
            operation_timeout_secs: None,
        }
    }
}

impl GitConfig {
    /// Returns the configured operation timeout.
    #[must_use]
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }
}

/// A repository entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Store identifier.
    pub id: i64,
    /// Repository name, sanitised on load.
    pub name: String,
}

/// Errors returned while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The configuration is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A configured value is out of range.
    #[error("invalid configuration value for {key}: {reason}")]
    Invalid {
        /// Dotted key of the offending value.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A repository entry has an invalid name.
    #[error("invalid repository entry: {0}")]
    Repository(#[from] WorkflowDomainError),
}

impl WorkflowConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// the errors of [`Self::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Returns the configured repositories with sanitised names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Repository`] when a name is invalid.
    pub fn repositories(&self) -> Result<Vec<Repository>, ConfigError> {
        self.repositories
            .iter()
            .map(|entry| {
                let name = RepositoryName::new(entry.name.as_str())?;
                Ok(Repository::new(RepoId::new(entry.id), name))
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "database.max_connections",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.git.program.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "git.program",
                reason: "must not be empty".to_owned(),
            });
        }
        if self.git.operation_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                key: "git.operation_timeout_secs",
                reason: "must be at least 1 when set".to_owned(),
            });
        }
        Ok(())
    }
}
