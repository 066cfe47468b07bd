//! Store-side records.
//!
//! Records reference each other by [`EntityId`]. They are what the import
//! engine sends to the store after every natural key has been resolved.
//! On `create_*` calls the `id` of each record is ignored and a fresh id is
//! assigned.

use reconf_model::{
    EntityId, EntityKind, GraphItemStyle, GraphSettings, HostStatus, ImageType, InterfaceType,
    ItemSettings, TriggerSettings,
};
use serde::{Deserialize, Serialize};

/// Host group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Id.
    pub id: EntityId,
    /// Unique name.
    pub name: String,
}

/// Whether a host row is a monitored host or a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKind {
    /// Monitored host.
    Host,
    /// Template.
    Template,
}

impl HostKind {
    /// Entity kind of rows of this host kind.
    #[must_use]
    pub const fn entity_kind(self) -> EntityKind {
        match self {
            Self::Host => EntityKind::Host,
            Self::Template => EntityKind::Template,
        }
    }
}

/// User macro of a host or template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroRecord {
    /// Id, `None` for macros to be created.
    pub id: Option<EntityId>,
    /// Macro name, e.g. `{$PORT}`.
    pub name: String,
    /// Value.
    pub value: String,
}

/// Network interface of a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    /// Id, `None` for interfaces to be created.
    pub id: Option<EntityId>,
    /// Interface type.
    pub interface_type: InterfaceType,
    /// Default interface of its type.
    pub main: bool,
    /// Connect by IP.
    pub use_ip: bool,
    /// IP address.
    pub ip: String,
    /// DNS name.
    pub dns: String,
    /// Port.
    pub port: String,
}

impl InterfaceRecord {
    /// Returns true if both records describe the same endpoint.
    #[must_use]
    pub fn same_endpoint(&self, other: &Self) -> bool {
        self.interface_type == other.interface_type
            && self.ip == other.ip
            && self.dns == other.dns
            && self.port == other.port
    }
}

/// Host or template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Id.
    pub id: EntityId,
    /// Technical name, unique across hosts and templates.
    pub host: String,
    /// Visible name.
    pub name: String,
    /// Host or template.
    pub kind: HostKind,
    /// Monitoring status.
    pub status: HostStatus,
    /// Description.
    pub description: Option<String>,
    /// Groups.
    pub group_ids: Vec<EntityId>,
    /// Linked templates.
    pub template_ids: Vec<EntityId>,
    /// Proxy.
    pub proxy_id: Option<EntityId>,
    /// User macros.
    pub macros: Vec<MacroRecord>,
    /// Interfaces.
    pub interfaces: Vec<InterfaceRecord>,
}

/// Monitoring proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRecord {
    /// Id.
    pub id: EntityId,
    /// Unique name.
    pub name: String,
}

/// Value map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMapRecord {
    /// Id.
    pub id: EntityId,
    /// Unique name.
    pub name: String,
}

/// Icon map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconMapRecord {
    /// Id.
    pub id: EntityId,
    /// Unique name.
    pub name: String,
}

/// Application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// Id.
    pub id: EntityId,
    /// Owning host or template.
    pub host_id: EntityId,
    /// Name, unique per host.
    pub name: String,
    /// Template application this one was inherited from.
    pub template_id: Option<EntityId>,
}

/// Which item table role a row plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemFlags {
    /// Plain item.
    Normal,
    /// Discovery rule.
    DiscoveryRule,
    /// Item prototype of a discovery rule.
    Prototype,
}

impl ItemFlags {
    /// Entity kind of rows with these flags.
    #[must_use]
    pub const fn entity_kind(self) -> EntityKind {
        match self {
            Self::Normal => EntityKind::Item,
            Self::DiscoveryRule => EntityKind::DiscoveryRule,
            Self::Prototype => EntityKind::ItemPrototype,
        }
    }
}

/// Item, discovery rule or item prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Id.
    pub id: EntityId,
    /// Owning host or template.
    pub host_id: EntityId,
    /// Key, unique per host across all flags.
    pub key: String,
    /// Role of the row. Immutable after creation.
    pub flags: ItemFlags,
    /// Plain attributes.
    pub settings: ItemSettings,
    /// Template row this one was inherited from.
    pub template_id: Option<EntityId>,
    /// Owning discovery rule, prototypes only.
    pub rule_id: Option<EntityId>,
    /// Applications of the same host.
    pub application_ids: Vec<EntityId>,
    /// Value map.
    pub valuemap_id: Option<EntityId>,
    /// Host interface.
    pub interface_id: Option<EntityId>,
    /// Master item, dependent items only.
    pub master_item_id: Option<EntityId>,
    /// Discovery filter, rules only.
    pub filter: Option<String>,
    /// Lost resource lifetime, rules only.
    pub lifetime: Option<String>,
}

/// Whether a trigger row is a trigger or a trigger prototype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerFlags {
    /// Plain trigger.
    Normal,
    /// Trigger prototype.
    Prototype,
}

impl TriggerFlags {
    /// Entity kind of rows with these flags.
    #[must_use]
    pub const fn entity_kind(self) -> EntityKind {
        match self {
            Self::Normal => EntityKind::Trigger,
            Self::Prototype => EntityKind::TriggerPrototype,
        }
    }
}

/// Trigger or trigger prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    /// Id.
    pub id: EntityId,
    /// Description.
    pub description: String,
    /// Expression in host:key form.
    pub expression: String,
    /// Role of the row. Immutable after creation.
    pub flags: TriggerFlags,
    /// Plain attributes.
    pub settings: TriggerSettings,
    /// Template trigger this one was inherited from.
    pub template_id: Option<EntityId>,
    /// Triggers this one depends on. Read only; written through
    /// `set_trigger_dependencies`.
    #[serde(default)]
    pub dependency_ids: Vec<EntityId>,
    /// Hosts referenced by the expression. Read only.
    #[serde(skip)]
    pub host_ids: Vec<EntityId>,
}

/// Whether a graph row is a graph or a graph prototype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphFlags {
    /// Plain graph.
    Normal,
    /// Graph prototype.
    Prototype,
}

impl GraphFlags {
    /// Entity kind of rows with these flags.
    #[must_use]
    pub const fn entity_kind(self) -> EntityKind {
        match self {
            Self::Normal => EntityKind::Graph,
            Self::Prototype => EntityKind::GraphPrototype,
        }
    }
}

/// Item plotted by a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphItemRecord {
    /// Plotted item.
    pub item_id: EntityId,
    /// Drawing attributes.
    pub style: GraphItemStyle,
}

/// Graph or graph prototype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    /// Id.
    pub id: EntityId,
    /// Name, unique per host.
    pub name: String,
    /// Role of the row. Immutable after creation.
    pub flags: GraphFlags,
    /// Plain attributes.
    pub settings: GraphSettings,
    /// Template graph this one was inherited from.
    pub template_id: Option<EntityId>,
    /// Y axis minimum item.
    pub ymin_item_id: Option<EntityId>,
    /// Y axis maximum item.
    pub ymax_item_id: Option<EntityId>,
    /// Plotted items.
    pub items: Vec<GraphItemRecord>,
    /// Hosts of the plotted items. Read only.
    #[serde(skip)]
    pub host_ids: Vec<EntityId>,
}

/// Host prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPrototypeRecord {
    /// Id.
    pub id: EntityId,
    /// Owning discovery rule.
    pub rule_id: EntityId,
    /// Technical name, unique per rule.
    pub host: String,
    /// Visible name.
    pub name: Option<String>,
    /// Status of discovered hosts.
    pub status: HostStatus,
    /// Group links.
    pub group_ids: Vec<EntityId>,
    /// Group prototype names.
    pub group_prototypes: Vec<String>,
    /// Linked templates.
    pub template_ids: Vec<EntityId>,
    /// Template host prototype this one was inherited from.
    pub template_id: Option<EntityId>,
}

/// Image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Id.
    pub id: EntityId,
    /// Unique name.
    pub name: String,
    /// Category.
    pub image_type: ImageType,
    /// Base64 encoded body.
    pub encoded_image: String,
}

/// What a map element points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ElementTarget {
    /// Host.
    Host(EntityId),
    /// Host group.
    HostGroup(EntityId),
    /// Trigger.
    Trigger(EntityId),
    /// Map.
    Map(EntityId),
    /// Plain image.
    Image,
}

/// Map element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapElementRecord {
    /// Map-local id.
    pub selementid: String,
    /// Monitored object.
    pub target: ElementTarget,
    /// Label.
    pub label: String,
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
    /// Normal state icon.
    pub icon_off_id: Option<EntityId>,
    /// Problem state icon.
    pub icon_on_id: Option<EntityId>,
}

/// Trigger colouring a map link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTriggerRecord {
    /// Trigger.
    pub trigger_id: EntityId,
    /// Problem colour.
    pub color: String,
}

/// Link between two map elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLinkRecord {
    /// First element.
    pub selementid1: String,
    /// Second element.
    pub selementid2: String,
    /// Label.
    pub label: String,
    /// Default colour.
    pub color: String,
    /// Link triggers.
    pub triggers: Vec<LinkTriggerRecord>,
}

/// Network map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRecord {
    /// Id.
    pub id: EntityId,
    /// Unique name.
    pub name: String,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
    /// Background image.
    pub background_id: Option<EntityId>,
    /// Icon map.
    pub iconmap_id: Option<EntityId>,
    /// Elements.
    pub elements: Vec<MapElementRecord>,
    /// Links.
    pub links: Vec<MapLinkRecord>,
}

/// Resource shown by a screen cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ResourceRecord {
    /// Graph.
    Graph(EntityId),
    /// Simple graph of an item.
    SimpleGraph(EntityId),
    /// Plain text of an item.
    PlainText(EntityId),
    /// Map.
    Map(EntityId),
    /// Nested screen.
    Screen(EntityId),
    /// Problems of a group.
    HostGroupTriggers(EntityId),
    /// Problems of a host.
    HostTriggers(EntityId),
    /// Host summary of a group.
    HostsInfo(EntityId),
    /// Trigger summary of a group.
    TriggersInfo(EntityId),
    /// Trigger overview of a group.
    TriggersOverview(EntityId),
    /// Data overview of a group.
    DataOverview(EntityId),
    /// Graph prototype.
    LldGraph(EntityId),
    /// Item prototype graph.
    LldSimpleGraph(EntityId),
    /// Clock.
    Clock,
    /// Web page.
    Url(String),
    /// Server information.
    ServerInfo,
    /// System status.
    SystemStatus,
    /// Action log.
    ActionLog,
    /// Event history.
    Events,
}

/// Screen cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenItemRecord {
    /// Resource.
    pub resource: ResourceRecord,
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Columns spanned.
    pub colspan: u32,
    /// Rows spanned.
    pub rowspan: u32,
    /// Resource width.
    pub width: u32,
    /// Resource height.
    pub height: u32,
}

/// Screen, or template screen when `template_id` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRecord {
    /// Id.
    pub id: EntityId,
    /// Name; unique globally, or per template for template screens.
    pub name: String,
    /// Owning template.
    pub template_id: Option<EntityId>,
    /// Columns.
    pub hsize: u32,
    /// Rows.
    pub vsize: u32,
    /// Cells.
    pub items: Vec<ScreenItemRecord>,
}

/// A dependency edge between two triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyEdge {
    /// The dependent trigger.
    pub down: EntityId,
    /// The trigger it depends on.
    pub up: EntityId,
}
