//! # Reconf Testkit
//!
//! Test utilities for reconf.
//!
//! This crate provides:
//! - Store fixtures that write rows directly, bypassing the import engine
//! - [`SnapshotBuilder`] and ready-made snapshot scenarios
//! - Property-based generators using proptest
//! - Temporary store files
//!
//! ## Usage
//!
//! ```rust
//! use reconf_testkit::prelude::*;
//! use reconf_store::{ConfigStore, HostKind, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let group = create_group(&store, "Linux servers");
//! let host = create_host(&store, "web1", HostKind::Host, group);
//! create_item(&store, host, "agent.ping");
//!
//! let snapshot = SnapshotBuilder::new()
//!     .host("web2", "Linux servers")
//!     .item("web2", "agent.ping")
//!     .build();
//! assert_eq!(snapshot.hosts.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builder::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use builder::{scenarios, SnapshotBuilder};
pub use fixtures::*;
pub use generators::*;
