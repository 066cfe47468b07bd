//! Import command implementation.

use super::{read_snapshot, Format};
use crate::error::{CliError, CliResult};
use reconf_import::{import_snapshot, ImportConfig, ImportOptions, ImportReport, UserRole};
use reconf_store::StoreFile;
use std::fs;
use std::path::Path;
use tracing::info;

/// Role given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    /// Super administrator.
    #[default]
    SuperAdmin,
    /// Administrator; images are rejected.
    Admin,
}

impl From<Role> for UserRole {
    fn from(role: Role) -> Self {
        match role {
            Role::SuperAdmin => UserRole::SuperAdmin,
            Role::Admin => UserRole::Admin,
        }
    }
}

/// Picks the import options: an options file wins over the presets, and
/// without either every kind is created but nothing is updated or deleted.
pub fn resolve_options(
    options_path: Option<&Path>,
    full_sync: bool,
) -> CliResult<ImportOptions> {
    if let Some(path) = options_path {
        let text = fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        return ImportOptions::from_json_str(&text).map_err(|source| CliError::Options {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(if full_sync {
        ImportOptions::full_sync()
    } else {
        ImportOptions::create_all()
    })
}

/// Runs the import command.
///
/// The store file is only rewritten when the run succeeds and is not a
/// dry run.
pub fn run(
    store_path: &Path,
    snapshot_path: &Path,
    options: ImportOptions,
    config: ImportConfig,
) -> CliResult<ImportReport> {
    let snapshot = read_snapshot(snapshot_path)?;
    let file = StoreFile::open(store_path)?;
    let store = file.load()?;

    let report = import_snapshot(&store, &snapshot, options, config)?;
    if !report.dry_run {
        file.save(&store)?;
    }
    info!(
        run_id = %report.run_id,
        store = %store_path.display(),
        written = report.totals().total(),
        "import finished"
    );
    Ok(report)
}

/// Prints `report` in `format`.
pub fn print_report(report: &ImportReport, format: Format) -> CliResult<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(report)?),
        Format::Text => {
            println!("Import {}", report.run_id);
            println!("==========================================");
            for (kind, counts) in &report.counts {
                if counts.total() == 0 {
                    continue;
                }
                println!(
                    "  {:<20} created {:>5}  updated {:>5}  deleted {:>5}",
                    kind.label(),
                    counts.created,
                    counts.updated,
                    counts.deleted
                );
            }
            let totals = report.totals();
            println!();
            println!(
                "Total: {} created, {} updated, {} deleted in {} ms",
                totals.created,
                totals.updated,
                totals.deleted,
                report.elapsed.as_millis()
            );
            if report.dry_run {
                println!("Dry run: nothing was written.");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconf_import::ImportError;
    use reconf_model::EntityKind;
    use reconf_testkit::{scenarios, SnapshotBuilder, TestStoreFile};
    use tempfile::tempdir;

    fn write_snapshot(dir: &Path, snapshot: &reconf_model::Snapshot) -> std::path::PathBuf {
        let path = dir.join("snapshot.json");
        fs::write(&path, snapshot.to_json_string().unwrap()).unwrap();
        path
    }

    #[test]
    fn import_writes_the_store_file() {
        let store = TestStoreFile::new();
        let snapshot = write_snapshot(store.dir(), &scenarios::templated_fleet(2));

        let report = run(
            &store.path(),
            &snapshot,
            ImportOptions::create_all(),
            ImportConfig::new(),
        )
        .unwrap();
        assert_eq!(report.count(EntityKind::Host).created, 2);

        let loaded = store.load();
        assert_eq!(loaded.row_counts()[&EntityKind::Host], 2);
    }

    #[test]
    fn dry_run_does_not_touch_the_store_file() {
        let store = TestStoreFile::new();
        let snapshot = write_snapshot(store.dir(), &scenarios::templated_fleet(1));

        let report = run(
            &store.path(),
            &snapshot,
            ImportOptions::create_all(),
            ImportConfig::new().dry_run(true),
        )
        .unwrap();
        assert!(report.dry_run);
        assert!(!store.path().exists());
    }

    #[test]
    fn failed_import_does_not_touch_the_store_file() {
        let store = TestStoreFile::new();
        let snapshot = SnapshotBuilder::new()
            .host("web1", "Linux servers")
            .trigger("Agent outdated", "{web1:agent.version.last()}=0")
            .build();
        let snapshot = write_snapshot(store.dir(), &snapshot);

        let err = run(
            &store.path(),
            &snapshot,
            ImportOptions::create_all(),
            ImportConfig::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CliError::Import(ImportError::MissingReference { .. })
        ));
        assert!(!store.path().exists());
    }

    #[test]
    fn missing_snapshot_names_the_file() {
        let store = TestStoreFile::new();
        let missing = store.dir().join("nope.json");
        let err = run(
            &store.path(),
            &missing,
            ImportOptions::create_all(),
            ImportConfig::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn options_file_wins_over_presets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, r#"{"hosts": {"createMissing": true}}"#).unwrap();

        let options = resolve_options(Some(&path), true).unwrap();
        assert!(options.hosts.create_missing);
        assert!(!options.items.is_active());

        assert_eq!(resolve_options(None, true).unwrap(), ImportOptions::full_sync());
        assert_eq!(resolve_options(None, false).unwrap(), ImportOptions::create_all());
    }

    #[test]
    fn malformed_options_are_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            resolve_options(Some(&path), false),
            Err(CliError::Options { .. })
        ));
    }
}
