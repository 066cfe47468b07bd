//! # Reconf Model
//!
//! Typed description of a monitoring configuration snapshot.
//!
//! This crate provides:
//! - Surrogate identifiers ([`EntityId`]) and entity kinds ([`EntityKind`])
//! - One explicit record type per snapshot entity (groups, templates, hosts,
//!   applications, items, discovery rules, triggers, graphs, images, maps,
//!   screens)
//! - The [`Snapshot`] container and its up-front validation
//!
//! Every cross-reference inside a snapshot is a natural key (a name or a
//! host/key pair), never a surrogate id. Surrogate ids only exist on the
//! store side.
//!
//! ## Example
//!
//! ```rust
//! use reconf_model::Snapshot;
//!
//! let snapshot = Snapshot::from_json_str(r#"{
//!     "version": "2.0",
//!     "groups": [{"name": "Linux servers"}]
//! }"#).unwrap();
//! assert_eq!(snapshot.groups[0].name, "Linux servers");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod graph;
mod host;
mod id;
mod item;
mod kind;
mod map;
mod screen;
mod snapshot;
mod trigger;

pub use error::{ModelError, ModelResult};
pub use graph::{
    AxisType, CalcFunction, DrawType, Graph, GraphItem, GraphItemStyle, GraphSettings, GraphType,
    ItemRef, YAxisSide,
};
pub use host::{
    Group, GroupRef, Host, HostInterface, HostStatus, InterfaceType, ProxyRef, Template,
    TemplateRef, UserMacro,
};
pub use id::EntityId;
pub use item::{
    Application, ApplicationRef, DiscoveryRule, GroupLink, GroupPrototype, HostPrototype, Item,
    ItemSettings, ItemStatus, ItemType, MasterItemRef, ValueMapRef, ValueType,
};
pub use kind::EntityKind;
pub use map::{
    IconMapRef, Image, ImageRef, ImageType, LinkTrigger, Map, MapElement, MapElementTarget, MapLink,
};
pub use screen::{Screen, ScreenItem, ScreenResource};
pub use snapshot::{Snapshot, SUPPORTED_VERSIONS};
pub use trigger::{Severity, Trigger, TriggerRef, TriggerSettings, TriggerStatus};
