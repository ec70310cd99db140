//! Error taxonomy shared by every checkpoint crate

use std::path::PathBuf;
use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the engine, the pipeline stages and the storage layer
#[derive(Debug, Error)]
pub enum Error {
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("unsupported file extension: '{0}'")]
    UnsupportedExtension(String),

    #[error("extension '{extension}' is not valid for {reader}")]
    ExtensionMismatch {
        reader: &'static str,
        extension: String,
    },

    #[error("order {order} is already taken by stage '{existing}' in sequence '{sequence}'")]
    DuplicateOrder {
        sequence: String,
        order: u32,
        existing: String,
    },

    #[error("invalid stage order {0}: orders must be non-negative")]
    InvalidOrder(i64),

    #[error("invalid stage name '{0}': stage names must start with \"seq\"")]
    InvalidStageName(String),

    #[error("stage '{stage}' is already registered in sequence '{sequence}'")]
    DuplicateStage { sequence: String, stage: String },

    #[error("stage '{stage}' is not registered in sequence '{sequence}'")]
    StageNotFound { sequence: String, stage: String },

    #[error("'{0}' is an invalid execution policy")]
    InvalidExecutionPolicy(String),

    #[error("stage '{stage}' (order {order}) of sequence '{sequence}' failed")]
    StageFailed {
        sequence: String,
        stage: String,
        order: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid IO mode: {0}")]
    InvalidMode(String),

    #[error("project is not initialized: {}", .0.display())]
    NotInitialized(PathBuf),

    #[error("project is already initialized: {}", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("checkpoint name '{name}' is not usable: {reason}")]
    NameConflict { name: String, reason: String },

    #[error("key does not match the one used for encryption")]
    InvalidKey,

    #[error("key already exists: {}", .0.display())]
    KeyExists(PathBuf),

    #[error("corrupt data: {0}")]
    CorruptData(String),

    #[error("path escapes the project root: {}", .0.display())]
    PathOutsideRoot(PathBuf),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    /// Innermost error beneath any `StageFailed` wrappers
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::StageFailed { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    /// Map an IO error on `path` into the taxonomy
    pub fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::PathNotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.into()),
            _ => Error::Io(err),
        }
    }
}
