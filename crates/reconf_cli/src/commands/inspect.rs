//! Inspect command implementation.

use super::Format;
use crate::error::CliResult;
use reconf_store::StoreFile;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store file path.
    pub path: String,
    /// Rows per entity kind, keyed by label. Kinds without rows are left out.
    pub rows: BTreeMap<&'static str, usize>,
    /// Total number of rows.
    pub total: usize,
}

/// Runs the inspect command.
pub fn run(store_path: &Path) -> CliResult<InspectResult> {
    let file = StoreFile::open(store_path)?;
    let store = file.load()?;
    let rows: BTreeMap<&'static str, usize> = store
        .row_counts()
        .into_iter()
        .map(|(kind, n)| (kind.label(), n))
        .collect();
    Ok(InspectResult {
        path: store_path.display().to_string(),
        total: rows.values().sum(),
        rows,
    })
}

/// Prints `result` in `format`.
pub fn print_result(result: &InspectResult, format: Format) -> CliResult<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(result)?),
        Format::Text => {
            println!("Store: {}", result.path);
            println!();
            for (kind, n) in &result.rows {
                println!("  {kind:<20} {n:>7}");
            }
            println!();
            println!("  {:<20} {:>7}", "total", result.total);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconf_store::{HostKind, MemoryStore};
    use reconf_testkit::{create_group, create_host, create_item, TestStoreFile};

    #[test]
    fn missing_store_is_empty() {
        let store = TestStoreFile::new();
        let result = run(&store.path()).unwrap();
        assert!(result.rows.is_empty());
        assert_eq!(result.total, 0);
    }

    #[test]
    fn rows_are_counted_per_kind() {
        let file = TestStoreFile::new();
        let store = MemoryStore::new();
        let group = create_group(&store, "Linux servers");
        let host = create_host(&store, "web1", HostKind::Host, group);
        create_item(&store, host, "agent.ping");
        create_item(&store, host, "system.uptime");
        file.save(&store);

        let result = run(&file.path()).unwrap();
        assert_eq!(result.rows["host group"], 1);
        assert_eq!(result.rows["host"], 1);
        assert_eq!(result.rows["item"], 2);
        assert_eq!(result.total, 4);
    }
}
