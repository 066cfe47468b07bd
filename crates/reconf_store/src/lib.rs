//! # Reconf Store
//!
//! Persistence contract for the import engine and an in-memory store that
//! behaves like a real monitoring configuration backend.
//!
//! This crate provides:
//! - [`ConfigStore`], one `get`/`create`/`update`/`delete` family per kind
//! - [`MemoryStore`], with batch atomicity, uniqueness and reference checks,
//!   template inheritance, delete cascades, read-only hosts and transactions
//! - [`Journal`] and [`StoreStats`] to observe what a run did
//! - [`StoreFile`] to keep a store in a locked JSON file
//!
//! ## Example
//!
//! ```rust
//! use reconf_model::EntityId;
//! use reconf_store::{ConfigStore, GroupRecord, MemoryStore, Operation};
//! use reconf_model::EntityKind;
//!
//! let store = MemoryStore::new();
//! store
//!     .create_groups(vec![GroupRecord { id: EntityId::default(), name: "Linux servers".into() }])
//!     .unwrap();
//! assert_eq!(store.journal().count(EntityKind::Group, Operation::Create), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod journal;
mod memory;
mod query;
mod record;
mod store;
mod table;

pub use error::{StoreError, StoreResult};
pub use file::StoreFile;
pub use journal::{Journal, JournalEntry, Operation, StatsSnapshot, StoreStats};
pub use memory::{MemoryStore, MAX_DEPENDENCY_LEVELS};
pub use query::{
    ApplicationQuery, GraphQuery, HostPrototypeQuery, HostQuery, ItemQuery, ScreenQuery,
    TriggerQuery,
};
pub use record::{
    ApplicationRecord, DependencyEdge, ElementTarget, GraphFlags, GraphItemRecord, GraphRecord,
    GroupRecord, HostKind, HostPrototypeRecord, HostRecord, IconMapRecord, ImageRecord,
    InterfaceRecord, ItemFlags, ItemRecord, LinkTriggerRecord, MacroRecord, MapElementRecord,
    MapLinkRecord, MapRecord, ProxyRecord, ResourceRecord, ScreenItemRecord, ScreenRecord,
    TriggerFlags, TriggerRecord, ValueMapRecord,
};
pub use store::ConfigStore;
pub use table::{Record, Table};
