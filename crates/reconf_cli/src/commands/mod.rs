//! CLI command implementations.

pub mod import;
pub mod inspect;
pub mod validate;

use crate::error::{CliError, CliResult};
use reconf_model::Snapshot;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Output format of commands that print a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty JSON.
    Json,
}

/// Reads and decodes a snapshot file. Does not validate it.
pub fn read_snapshot(path: &Path) -> CliResult<Snapshot> {
    let file = File::open(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Snapshot::from_reader(BufReader::new(file)).map_err(|source| CliError::Snapshot {
        path: path.to_path_buf(),
        source,
    })
}
