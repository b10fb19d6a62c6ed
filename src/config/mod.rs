//! File-based configuration.
//!
//! `plansync.toml` is read once at startup; every section is optional and
//! missing sections take their defaults:
//!
//! ```toml
//! [tracker]
//! kind = "github"
//! repository = "acme/roadmap"
//! token_env = "GITHUB_TOKEN"
//! hierarchy = "native"
//!
//! [labels]
//! blocked = "blocked"
//!
//! [retry]
//! max_attempts = 5
//! base_delay = 500
//!
//! [producer]
//! program = "task-master"
//! complexity_threshold = 5
//! max_depth = 2
//!
//! [snapshots]
//! directory = ".plansync/snapshots"
//! ```

use crate::sync::domain::{HierarchyMode, SyncConfig};
use crate::tracker::domain::{LabelConfig, RepositoryFullName, RetryPolicy};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::sync::Arc;
use thiserror::Error;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "plansync.toml";

/// Errors raised while loading configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Configuration file path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: Arc<std::io::Error>,
    },

    /// The file is not valid TOML for this schema.
    #[error("invalid configuration in {path}: {reason}")]
    Parse {
        /// Configuration file path.
        path: Utf8PathBuf,
        /// Decoder message.
        reason: String,
    },
}

/// Which tracker adapter to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    /// GitHub Issues over REST.
    #[default]
    Github,
    /// Process-local tracker, for dry runs.
    Memory,
}

/// `[tracker]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSection {
    /// Adapter selection.
    pub kind: TrackerKind,
    /// Target repository in `owner/repo` form.
    pub repository: Option<RepositoryFullName>,
    /// REST API base URL.
    pub api_base: String,
    /// Environment variable holding the API token.
    pub token_env: String,
    /// Hierarchy strategy.
    pub hierarchy: HierarchyMode,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            kind: TrackerKind::default(),
            repository: None,
            api_base: "https://api.github.com".to_owned(),
            token_env: "GITHUB_TOKEN".to_owned(),
            hierarchy: HierarchyMode::default(),
        }
    }
}

/// `[producer]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerSection {
    /// Planner executable.
    pub program: String,
    /// Arguments placed before the subcommand.
    pub args: Vec<String>,
    /// Nodes above this complexity are split further.
    pub complexity_threshold: u32,
    /// Maximum nesting depth of produced graphs.
    pub max_depth: u32,
}

impl Default for ProducerSection {
    fn default() -> Self {
        Self {
            program: "task-master".to_owned(),
            args: Vec::new(),
            complexity_threshold: 5,
            max_depth: 2,
        }
    }
}

/// `[snapshots]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSection {
    /// Snapshot root directory.
    pub directory: Utf8PathBuf,
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            directory: Utf8PathBuf::from(".plansync/snapshots"),
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Tracker connection.
    pub tracker: TrackerSection,
    /// Label vocabulary.
    pub labels: LabelConfig,
    /// Tracker retry policy.
    pub retry: RetryPolicy,
    /// Graph producer invocation.
    pub producer: ProducerSection,
    /// Snapshot storage.
    pub snapshots: SnapshotSection,
}

impl FileConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text does not match the schema.
    pub fn from_toml(path: &Utf8Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|err| ConfigError::Parse {
            path: path.to_owned(),
            reason: err.to_string(),
        })
    }

    /// Loads configuration from `path`.
    ///
    /// A missing file yields the defaults when `required` is `false`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, or
    /// [`ConfigError::Parse`] when it is invalid.
    pub fn load(path: &Utf8Path, required: bool) -> Result<Self, ConfigError> {
        let read_error = |source: std::io::Error| ConfigError::Read {
            path: path.to_owned(),
            source: Arc::new(source),
        };
        let file_name = path
            .file_name()
            .ok_or_else(|| read_error(std::io::Error::other("path must include a file name")))?;
        let parent = path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
        match dir.read_to_string(file_name) {
            Ok(text) => Self::from_toml(path, &text),
            Err(err) if err.kind() == ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(err) => Err(read_error(err)),
        }
    }

    /// Returns the sync engine configuration.
    #[must_use]
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            labels: self.labels.clone(),
            retry: self.retry,
            hierarchy: self.tracker.hierarchy,
        }
    }
}
