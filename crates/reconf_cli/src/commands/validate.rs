//! Validate command implementation.

use super::read_snapshot;
use crate::error::{CliError, CliResult};
use reconf_import::FormattedSnapshot;
use std::path::Path;

/// What a valid snapshot contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateResult {
    /// Declared hosts and templates.
    pub hosts: usize,
    /// Parsed trigger and trigger prototype expressions.
    pub expressions: usize,
}

/// Runs the validate command. The store is never opened.
pub fn run(snapshot_path: &Path) -> CliResult<ValidateResult> {
    let snapshot = read_snapshot(snapshot_path)?;
    snapshot.validate().map_err(|source| CliError::Snapshot {
        path: snapshot_path.to_path_buf(),
        source,
    })?;
    let formatted = FormattedSnapshot::new(&snapshot)?;
    Ok(ValidateResult {
        hosts: snapshot.hosts.len() + snapshot.templates.len(),
        expressions: formatted.expression_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconf_import::ImportError;
    use reconf_model::ModelError;
    use reconf_testkit::{scenarios, SnapshotBuilder};
    use std::fs;
    use tempfile::tempdir;

    fn validate(snapshot: &reconf_model::Snapshot) -> CliResult<ValidateResult> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, snapshot.to_json_string().unwrap()).unwrap();
        run(&path)
    }

    #[test]
    fn valid_snapshot_is_summarized() {
        let result = validate(&scenarios::monitored_fleet(2, 3)).unwrap();
        assert_eq!(result.hosts, 2);
        assert_eq!(result.expressions, 6);
    }

    #[test]
    fn malformed_expression_is_rejected() {
        let snapshot = SnapshotBuilder::new()
            .host("web1", "Linux servers")
            .item("web1", "agent.ping")
            .trigger("Broken", "{web1:agent.ping.last()>0")
            .build();
        assert!(matches!(
            validate(&snapshot),
            Err(CliError::Import(ImportError::Expression { .. }))
        ));
    }

    #[test]
    fn duplicate_hosts_are_rejected() {
        let snapshot = SnapshotBuilder::new()
            .host("web1", "Linux servers")
            .host("web1", "Linux servers")
            .build();
        assert!(matches!(
            validate(&snapshot),
            Err(CliError::Snapshot {
                source: ModelError::DuplicateKey { .. },
                ..
            })
        ));
    }

    #[test]
    fn garbage_is_not_a_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(run(&path), Err(CliError::Snapshot { .. })));
    }
}
