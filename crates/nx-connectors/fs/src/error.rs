// error.rs - Execution failures for the filesystem executor.
//
// All of these are reported to the caller as a FAILED mission. None are
// retried here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionFailure {
    /// The target exists and overwrite was not requested.
    #[error("dispatch target {path} already exists")]
    AlreadyExists { path: PathBuf },

    /// The validated path has no parent directory to stage into.
    #[error("dispatch target {path} has no parent directory")]
    NoParent { path: PathBuf },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to stage dispatch in {dir}: {source}")]
    Stage {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to publish dispatch to {path}: {source}")]
    Publish {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize dispatch record: {0}")]
    Serialize(#[from] serde_json::Error),
}
