//! Filters for `get_*` store calls.
//!
//! Every filter field is optional; `None` means "do not filter on this
//! field". Filters combine with AND.

use crate::record::{GraphFlags, HostKind, ItemFlags, TriggerFlags};
use reconf_model::EntityId;

pub(crate) fn admits<T: PartialEq>(filter: &Option<Vec<T>>, value: &T) -> bool {
    filter.as_ref().map_or(true, |allowed| allowed.contains(value))
}

pub(crate) fn admits_any<T: PartialEq>(filter: &Option<Vec<T>>, values: &[T]) -> bool {
    filter
        .as_ref()
        .map_or(true, |allowed| values.iter().any(|v| allowed.contains(v)))
}

pub(crate) fn admits_inherited(filter: Option<bool>, template_id: Option<EntityId>) -> bool {
    filter.map_or(true, |inherited| inherited == template_id.is_some())
}

/// Filter for hosts and templates.
#[derive(Debug, Clone, Default)]
pub struct HostQuery {
    /// Restrict to these ids.
    pub ids: Option<Vec<EntityId>>,
    /// Restrict to these technical names.
    pub names: Option<Vec<String>>,
    /// Restrict to hosts or templates.
    pub kind: Option<HostKind>,
}

impl HostQuery {
    /// Matches every host and template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given ids.
    #[must_use]
    pub fn ids(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    /// Restricts to the given names.
    #[must_use]
    pub fn names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to hosts or templates.
    #[must_use]
    pub fn kind(mut self, kind: HostKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Filter for applications.
#[derive(Debug, Clone, Default)]
pub struct ApplicationQuery {
    /// Restrict to these owners.
    pub host_ids: Option<Vec<EntityId>>,
    /// Restrict to these names.
    pub names: Option<Vec<String>>,
    /// Only inherited (`true`) or only own (`false`) rows.
    pub inherited: Option<bool>,
}

impl ApplicationQuery {
    /// Matches every application.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given owners.
    #[must_use]
    pub fn hosts(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.host_ids = Some(ids.into_iter().collect());
        self
    }

    /// Restricts to the given names.
    #[must_use]
    pub fn names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to inherited or own rows.
    #[must_use]
    pub fn inherited(mut self, inherited: bool) -> Self {
        self.inherited = Some(inherited);
        self
    }
}

/// Filter for items, discovery rules and item prototypes.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    /// Restrict to these ids.
    pub ids: Option<Vec<EntityId>>,
    /// Restrict to these owners.
    pub host_ids: Option<Vec<EntityId>>,
    /// Restrict to these keys.
    pub keys: Option<Vec<String>>,
    /// Restrict to these roles.
    pub flags: Option<Vec<ItemFlags>>,
    /// Restrict to prototypes of these rules.
    pub rule_ids: Option<Vec<EntityId>>,
    /// Only inherited (`true`) or only own (`false`) rows.
    pub inherited: Option<bool>,
}

impl ItemQuery {
    /// Matches every row of the item table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given ids.
    #[must_use]
    pub fn ids(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    /// Restricts to the given owners.
    #[must_use]
    pub fn hosts(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.host_ids = Some(ids.into_iter().collect());
        self
    }

    /// Restricts to the given keys.
    #[must_use]
    pub fn keys<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to the given roles.
    #[must_use]
    pub fn flags(mut self, flags: impl IntoIterator<Item = ItemFlags>) -> Self {
        self.flags = Some(flags.into_iter().collect());
        self
    }

    /// Restricts to prototypes of the given rules.
    #[must_use]
    pub fn rules(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.rule_ids = Some(ids.into_iter().collect());
        self
    }

    /// Restricts to inherited or own rows.
    #[must_use]
    pub fn inherited(mut self, inherited: bool) -> Self {
        self.inherited = Some(inherited);
        self
    }
}

/// Filter for triggers and trigger prototypes.
#[derive(Debug, Clone, Default)]
pub struct TriggerQuery {
    /// Restrict to these ids.
    pub ids: Option<Vec<EntityId>>,
    /// Restrict to these descriptions.
    pub descriptions: Option<Vec<String>>,
    /// Restrict to triggers referencing any of these hosts.
    pub host_ids: Option<Vec<EntityId>>,
    /// Restrict to these roles.
    pub flags: Option<Vec<TriggerFlags>>,
    /// Only inherited (`true`) or only own (`false`) rows.
    pub inherited: Option<bool>,
}

impl TriggerQuery {
    /// Matches every trigger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given ids.
    #[must_use]
    pub fn ids(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    /// Restricts to the given descriptions.
    #[must_use]
    pub fn descriptions<S: Into<String>>(
        mut self,
        descriptions: impl IntoIterator<Item = S>,
    ) -> Self {
        self.descriptions = Some(descriptions.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to triggers referencing any of the given hosts.
    #[must_use]
    pub fn hosts(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.host_ids = Some(ids.into_iter().collect());
        self
    }

    /// Restricts to the given roles.
    #[must_use]
    pub fn flags(mut self, flags: impl IntoIterator<Item = TriggerFlags>) -> Self {
        self.flags = Some(flags.into_iter().collect());
        self
    }

    /// Restricts to inherited or own rows.
    #[must_use]
    pub fn inherited(mut self, inherited: bool) -> Self {
        self.inherited = Some(inherited);
        self
    }
}

/// Filter for graphs and graph prototypes.
#[derive(Debug, Clone, Default)]
pub struct GraphQuery {
    /// Restrict to these ids.
    pub ids: Option<Vec<EntityId>>,
    /// Restrict to graphs plotting items of any of these hosts.
    pub host_ids: Option<Vec<EntityId>>,
    /// Restrict to these names.
    pub names: Option<Vec<String>>,
    /// Restrict to these roles.
    pub flags: Option<Vec<GraphFlags>>,
    /// Only inherited (`true`) or only own (`false`) rows.
    pub inherited: Option<bool>,
}

impl GraphQuery {
    /// Matches every graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given ids.
    #[must_use]
    pub fn ids(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    /// Restricts to graphs plotting items of any of the given hosts.
    #[must_use]
    pub fn hosts(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.host_ids = Some(ids.into_iter().collect());
        self
    }

    /// Restricts to the given names.
    #[must_use]
    pub fn names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to the given roles.
    #[must_use]
    pub fn flags(mut self, flags: impl IntoIterator<Item = GraphFlags>) -> Self {
        self.flags = Some(flags.into_iter().collect());
        self
    }

    /// Restricts to inherited or own rows.
    #[must_use]
    pub fn inherited(mut self, inherited: bool) -> Self {
        self.inherited = Some(inherited);
        self
    }
}

/// Filter for host prototypes.
#[derive(Debug, Clone, Default)]
pub struct HostPrototypeQuery {
    /// Restrict to prototypes of these rules.
    pub rule_ids: Option<Vec<EntityId>>,
    /// Restrict to these technical names.
    pub hosts: Option<Vec<String>>,
    /// Only inherited (`true`) or only own (`false`) rows.
    pub inherited: Option<bool>,
}

impl HostPrototypeQuery {
    /// Matches every host prototype.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to prototypes of the given rules.
    #[must_use]
    pub fn rules(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.rule_ids = Some(ids.into_iter().collect());
        self
    }

    /// Restricts to the given names.
    #[must_use]
    pub fn hosts<S: Into<String>>(mut self, hosts: impl IntoIterator<Item = S>) -> Self {
        self.hosts = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to inherited or own rows.
    #[must_use]
    pub fn inherited(mut self, inherited: bool) -> Self {
        self.inherited = Some(inherited);
        self
    }
}

/// Filter for screens and template screens.
#[derive(Debug, Clone, Default)]
pub struct ScreenQuery {
    /// Restrict to these names.
    pub names: Option<Vec<String>>,
    /// `None` selects global screens, `Some` the screens of these templates.
    pub template_ids: Option<Vec<EntityId>>,
}

impl ScreenQuery {
    /// Matches every global screen.
    #[must_use]
    pub fn global() -> Self {
        Self::default()
    }

    /// Matches the screens of the given templates.
    #[must_use]
    pub fn of_templates(ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            names: None,
            template_ids: Some(ids.into_iter().collect()),
        }
    }

    /// Restricts to the given names.
    #[must_use]
    pub fn names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }
}
