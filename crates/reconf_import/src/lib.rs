//! # Reconf Import
//!
//! Reconciles a monitoring configuration store with a declarative snapshot.
//!
//! This crate provides:
//! - [`ImportOptions`], one create/update/delete policy per entity kind
//! - [`NaturalKeyResolver`], a batched natural key to surrogate id cache
//! - [`ProcessedScopeTracker`], which bounds what deletion may touch
//! - [`ImportPipeline`], the fixed sequence of import stages
//! - [`SubImporter`] and the default template, host, map and screen importers
//! - [`import_snapshot`], which wraps a run in a store transaction
//!
//! ## Example
//!
//! ```rust
//! use reconf_import::{import_snapshot, ImportConfig, ImportOptions};
//! use reconf_model::{EntityKind, Snapshot};
//! use reconf_store::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let snapshot = Snapshot::from_json_str(r#"{
//!     "groups": [{"name": "Linux servers"}],
//!     "hosts": [{"host": "web1", "groups": [{"name": "Linux servers"}]}],
//!     "items": {"web1": [{"key": "agent.ping", "name": "Ping"}]}
//! }"#).unwrap();
//!
//! let report = import_snapshot(
//!     &store,
//!     &snapshot,
//!     ImportOptions::create_all(),
//!     ImportConfig::new(),
//! )
//! .unwrap();
//! assert_eq!(report.count(EntityKind::Item).created, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dependency;
mod error;
mod formatted;
mod gather;
mod importers;
mod order;
mod pipeline;
mod report;
mod resolver;
mod scope;

pub use config::{EntityPolicy, ImportConfig, ImportOptions, UserRole};
pub use dependency::DependencyBatch;
pub use error::{ImportError, ImportResult};
pub use formatted::{Declared, FormattedSnapshot, ParsedTrigger, RuleView};
pub use gather::ReferenceGatherer;
pub use importers::{
    HostImporter, MapImporter, ScreenImporter, SubImporter, TemplateImporter,
    TemplateScreenImporter, TemplateScreens,
};
pub use pipeline::{ImportContext, ImportPipeline, Stage};
pub use report::{Counts, ImportReport};
pub use resolver::{NaturalKeyResolver, RefKind, Refs};
pub use scope::ProcessedScopeTracker;

use reconf_model::Snapshot;
use reconf_store::ConfigStore;
use tracing::{info, warn};

/// Runs one import as configured by `config`.
///
/// With `use_transaction` the run is wrapped in
/// [`ConfigStore::begin`]/[`ConfigStore::commit`] and any error rolls the
/// store back before it is returned. A dry run always rolls back.
pub fn import_snapshot<S: ConfigStore + ?Sized>(
    store: &S,
    snapshot: &Snapshot,
    options: ImportOptions,
    config: ImportConfig,
) -> ImportResult<ImportReport> {
    let transactional = config.use_transaction || config.dry_run;
    if transactional {
        store.begin()?;
    }

    let result = ImportPipeline::new(store, options)
        .with_role(config.role)
        .run(snapshot);

    match result {
        Ok(mut report) => {
            if config.dry_run {
                store.rollback()?;
                report.dry_run = true;
                info!(run_id = %report.run_id, "dry run rolled back");
            } else if transactional {
                store.commit()?;
            }
            Ok(report)
        }
        Err(err) => {
            if transactional {
                if let Err(rollback) = store.rollback() {
                    warn!(error = %rollback, "rollback after a failed import failed");
                }
            }
            Err(err)
        }
    }
}
