use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the tracker.
pub(crate) type Result<T> = std::result::Result<T, TrackerError>;

/// Canonical error surface for the tracker.
///
/// Lenient user input (bad range tokens, rejected renames, unknown completion values) never
/// ends up here; those are reported as values by the operation that consumed them.
#[derive(Debug, Error)]
pub(crate) enum TrackerError {
    #[error("database error during {context}: {source}")]
    Store {
        context: &'static str,
        source: rusqlite::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("terminal I/O error: {0}")]
    Terminal(#[from] std::io::Error),

    #[error("config file error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("stored volumes for '{name}' are corrupt: {reason}")]
    CorruptVolumes { name: String, reason: String },

    #[error("series name must not be empty")]
    EmptyName,

    #[error("'{0}' is a reserved word and cannot be used as a series name")]
    ReservedName(String),

    #[error("a series named '{0}' already exists")]
    DuplicateName(String),

    #[error("no series named '{0}'")]
    NotFound(String),

    #[error("database not found: {}", .0.display())]
    MissingDatabase(PathBuf),
}

impl TrackerError {
    pub(crate) fn store(context: &'static str, source: rusqlite::Error) -> Self {
        Self::Store { context, source }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    pub(crate) fn invalid_config(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True for rejections the user can fix by changing their input.
    pub(crate) fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::EmptyName
                | Self::ReservedName(_)
                | Self::DuplicateName(_)
                | Self::NotFound(_)
                | Self::MissingDatabase(_)
        )
    }
}
