//! CLI error type.

use reconf_import::ImportError;
use reconf_model::ModelError;
use reconf_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Anything that makes a command fail.
#[derive(Debug, Error)]
pub enum CliError {
    /// A file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The snapshot file is not a valid snapshot.
    #[error("invalid snapshot {}: {source}", path.display())]
    Snapshot {
        /// Snapshot file.
        path: PathBuf,
        /// Decoding or validation error.
        source: ModelError,
    },

    /// The options file is not valid JSON options.
    #[error("invalid options {}: {source}", path.display())]
    Options {
        /// Options file.
        path: PathBuf,
        /// Decoding error.
        source: serde_json::Error,
    },

    /// Store file error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Import error.
    #[error("import failed: {0}")]
    Import(#[from] ImportError),

    /// Report could not be encoded.
    #[error("cannot encode output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Result alias for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
