//! Applications, items, discovery rules and their prototypes.

use crate::graph::Graph;
use crate::host::{GroupRef, HostStatus, TemplateRef};
use crate::trigger::Trigger;
use serde::{Deserialize, Serialize};

/// Application declared on a host or template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Application name, unique per host.
    pub name: String,
}

/// Reference to an application of the same host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationRef {
    /// Referenced application name.
    pub name: String,
}

/// Reference to a value map by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueMapRef {
    /// Referenced value map name.
    pub name: String,
}

/// Reference to the master item of a dependent item, on the same host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MasterItemRef {
    /// Key of the master item.
    pub key: String,
}

/// How an item collects its value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Passive agent check.
    #[default]
    ZabbixAgent,
    /// Active agent check.
    ZabbixAgentActive,
    /// SNMP poll.
    Snmp,
    /// Pushed by an external sender.
    Trapper,
    /// Simple network check.
    Simple,
    /// Server internal metric.
    Internal,
    /// Aggregate over a host group.
    Aggregate,
    /// External script.
    External,
    /// Calculated from other items.
    Calculated,
    /// HTTP request.
    HttpAgent,
    /// Value taken from a master item.
    Dependent,
}

/// Type of the collected value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Floating point number.
    Float,
    /// Single-line text.
    Character,
    /// Log lines.
    Log,
    /// Unsigned integer.
    #[default]
    Unsigned,
    /// Multi-line text.
    Text,
}

/// Whether an item is enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Collected.
    #[default]
    Enabled,
    /// Not collected.
    Disabled,
}

/// Plain attributes shared by items, discovery rules and item prototypes.
///
/// These carry no references and are copied to the store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemSettings {
    /// Visible name.
    pub name: String,
    /// Collection method.
    #[serde(rename = "type", default)]
    pub item_type: ItemType,
    /// Value type.
    #[serde(default)]
    pub value_type: ValueType,
    /// Update interval.
    #[serde(default)]
    pub delay: Option<String>,
    /// History storage period.
    #[serde(default)]
    pub history: Option<String>,
    /// Trend storage period.
    #[serde(default)]
    pub trends: Option<String>,
    /// Value units.
    #[serde(default)]
    pub units: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Enabled or disabled.
    #[serde(default)]
    pub status: ItemStatus,
}

/// Item declared on a host or template, or an item prototype of a
/// discovery rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Item key, unique per host.
    pub key: String,
    /// Plain attributes.
    #[serde(flatten)]
    pub settings: ItemSettings,
    /// Applications of the same host.
    #[serde(default)]
    pub applications: Vec<ApplicationRef>,
    /// Value map used to render values.
    #[serde(default)]
    pub valuemap: Option<ValueMapRef>,
    /// Host interface, by snapshot-local reference.
    #[serde(default)]
    pub interface_ref: Option<String>,
    /// Master item for dependent items.
    #[serde(default)]
    pub master_item: Option<MasterItemRef>,
}

impl Item {
    /// Visible name of the item.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.settings.name
    }
}

/// Group link of a host prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLink {
    /// Existing group discovered hosts are added to.
    pub group: GroupRef,
}

/// Group prototype of a host prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPrototype {
    /// Group name, usually containing discovery macros.
    pub name: String,
}

/// Host prototype owned by a discovery rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPrototype {
    /// Technical name, unique per discovery rule.
    pub host: String,
    /// Visible name.
    #[serde(default)]
    pub name: Option<String>,
    /// Status given to discovered hosts.
    #[serde(default)]
    pub status: HostStatus,
    /// Existing groups discovered hosts join.
    #[serde(default)]
    pub group_links: Vec<GroupLink>,
    /// Groups created per discovered host.
    #[serde(default)]
    pub group_prototypes: Vec<GroupPrototype>,
    /// Templates linked to discovered hosts.
    #[serde(default)]
    pub templates: Vec<TemplateRef>,
}

/// Low-level discovery rule with the prototypes it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRule {
    /// Rule key, unique per host together with item keys.
    pub key: String,
    /// Plain attributes.
    #[serde(flatten)]
    pub settings: ItemSettings,
    /// Discovery filter expression.
    #[serde(default)]
    pub filter: Option<String>,
    /// How long lost resources are kept.
    #[serde(default)]
    pub lifetime: Option<String>,
    /// Host interface, by snapshot-local reference.
    #[serde(default)]
    pub interface_ref: Option<String>,
    /// Item prototypes.
    #[serde(default)]
    pub item_prototypes: Vec<Item>,
    /// Trigger prototypes.
    #[serde(default)]
    pub trigger_prototypes: Vec<Trigger>,
    /// Graph prototypes.
    #[serde(default)]
    pub graph_prototypes: Vec<Graph>,
    /// Host prototypes.
    #[serde(default)]
    pub host_prototypes: Vec<HostPrototype>,
}

impl DiscoveryRule {
    /// Visible name of the rule.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.settings.name
    }
}
