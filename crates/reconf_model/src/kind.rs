//! Entity kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a configuration object.
///
/// Used to label errors, report counters and store journal entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Host group.
    Group,
    /// Template.
    Template,
    /// Monitored host.
    Host,
    /// User macro on a host or template.
    UserMacro,
    /// Proxy.
    Proxy,
    /// Value map.
    ValueMap,
    /// Application.
    Application,
    /// Item.
    Item,
    /// Low-level discovery rule.
    DiscoveryRule,
    /// Item prototype.
    ItemPrototype,
    /// Trigger.
    Trigger,
    /// Trigger prototype.
    TriggerPrototype,
    /// Graph.
    Graph,
    /// Graph prototype.
    GraphPrototype,
    /// Host prototype.
    HostPrototype,
    /// Image.
    Image,
    /// Icon map.
    IconMap,
    /// Network map.
    Map,
    /// Screen.
    Screen,
    /// Template screen.
    TemplateScreen,
}

impl EntityKind {
    /// Human readable label, as used in error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Group => "host group",
            Self::Template => "template",
            Self::Host => "host",
            Self::UserMacro => "user macro",
            Self::Proxy => "proxy",
            Self::ValueMap => "value map",
            Self::Application => "application",
            Self::Item => "item",
            Self::DiscoveryRule => "discovery rule",
            Self::ItemPrototype => "item prototype",
            Self::Trigger => "trigger",
            Self::TriggerPrototype => "trigger prototype",
            Self::Graph => "graph",
            Self::GraphPrototype => "graph prototype",
            Self::HostPrototype => "host prototype",
            Self::Image => "image",
            Self::IconMap => "icon map",
            Self::Map => "map",
            Self::Screen => "screen",
            Self::TemplateScreen => "template screen",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
