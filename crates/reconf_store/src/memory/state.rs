//! Tables of the in-memory store and read-side lookups.

use crate::query::{
    admits, admits_any, admits_inherited, ApplicationQuery, GraphQuery, HostPrototypeQuery,
    HostQuery, ItemQuery, ScreenQuery, TriggerQuery,
};
use crate::record::{
    ApplicationRecord, GraphRecord, GroupRecord, HostPrototypeRecord, HostRecord, IconMapRecord,
    ImageRecord, ItemRecord, MapRecord, ProxyRecord, ScreenRecord, TriggerFlags,
    TriggerRecord, ValueMapRecord,
};
use crate::table::{Record, Table};
use reconf_expression::{ParseOptions, TriggerExpression};
use reconf_model::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub(crate) fn parse_options(flags: TriggerFlags) -> ParseOptions {
    match flags {
        TriggerFlags::Normal => ParseOptions::default(),
        TriggerFlags::Prototype => ParseOptions::prototype(),
    }
}

/// Everything the store holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct StoreState {
    pub(crate) next_id: u64,
    pub(crate) groups: Table<GroupRecord>,
    pub(crate) hosts: Table<HostRecord>,
    pub(crate) proxies: Table<ProxyRecord>,
    pub(crate) value_maps: Table<ValueMapRecord>,
    pub(crate) icon_maps: Table<IconMapRecord>,
    pub(crate) applications: Table<ApplicationRecord>,
    pub(crate) items: Table<ItemRecord>,
    pub(crate) triggers: Table<TriggerRecord>,
    pub(crate) graphs: Table<GraphRecord>,
    pub(crate) host_prototypes: Table<HostPrototypeRecord>,
    pub(crate) images: Table<ImageRecord>,
    pub(crate) maps: Table<MapRecord>,
    pub(crate) screens: Table<ScreenRecord>,
    pub(crate) read_only: BTreeSet<EntityId>,
}

impl StoreState {
    /// Recomputes derived columns after loading from disk.
    pub(crate) fn reindex(&mut self) {
        let trigger_hosts: Vec<(EntityId, Vec<EntityId>)> = self
            .triggers
            .values()
            .map(|t| (t.id, self.expression_hosts(&t.expression, t.flags)))
            .collect();
        for (id, host_ids) in trigger_hosts {
            if let Some(trigger) = self.triggers.get_mut(id) {
                trigger.host_ids = host_ids;
            }
        }
        let graph_hosts: Vec<(EntityId, Vec<EntityId>)> = self
            .graphs
            .values()
            .map(|g| (g.id, self.graph_hosts(g)))
            .collect();
        for (id, host_ids) in graph_hosts {
            if let Some(graph) = self.graphs.get_mut(id) {
                graph.host_ids = host_ids;
            }
        }
        let highest = [
            self.groups.max_id(),
            self.hosts.max_id(),
            self.proxies.max_id(),
            self.value_maps.max_id(),
            self.icon_maps.max_id(),
            self.applications.max_id(),
            self.items.max_id(),
            self.triggers.max_id(),
            self.graphs.max_id(),
            self.host_prototypes.max_id(),
            self.images.max_id(),
            self.maps.max_id(),
            self.screens.max_id(),
        ]
        .into_iter()
        .flatten()
        .map(EntityId::as_u64)
        .max()
        .unwrap_or(0);
        self.next_id = self.next_id.max(highest);
    }

    pub(crate) fn host_by_name(&self, name: &str) -> Option<&HostRecord> {
        self.hosts.values().find(|h| h.host == name)
    }

    pub(crate) fn host_name(&self, id: EntityId) -> String {
        self.hosts
            .get(id)
            .map_or_else(|| id.to_string(), |h| h.host.clone())
    }

    pub(crate) fn item_by_key(&self, host_id: EntityId, key: &str) -> Option<&ItemRecord> {
        self.items
            .values()
            .find(|i| i.host_id == host_id && i.key == key)
    }

    /// Hosts a trigger expression refers to, in order of first appearance.
    /// Unknown hosts are skipped.
    pub(crate) fn expression_hosts(&self, expression: &str, flags: TriggerFlags) -> Vec<EntityId> {
        TriggerExpression::parse_with(expression, parse_options(flags))
            .map(|parsed| {
                parsed
                    .hosts()
                    .into_iter()
                    .filter_map(|name| self.host_by_name(name).map(|h| h.id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Items a trigger expression refers to, repeats removed.
    pub(crate) fn trigger_item_ids(&self, trigger: &TriggerRecord) -> BTreeSet<EntityId> {
        let Ok(parsed) = TriggerExpression::parse_with(&trigger.expression, parse_options(trigger.flags))
        else {
            return BTreeSet::new();
        };
        parsed
            .function_macros()
            .iter()
            .filter_map(|m| {
                let host = self.host_by_name(&m.host)?;
                self.item_by_key(host.id, &m.key).map(|i| i.id)
            })
            .collect()
    }

    pub(crate) fn graph_hosts(&self, graph: &GraphRecord) -> Vec<EntityId> {
        let mut hosts = Vec::new();
        for gitem in &graph.items {
            if let Some(item) = self.items.get(gitem.item_id) {
                if !hosts.contains(&item.host_id) {
                    hosts.push(item.host_id);
                }
            }
        }
        hosts
    }

    /// Hosts and templates that link `template_id` directly.
    pub(crate) fn children_of(&self, template_id: EntityId) -> Vec<EntityId> {
        self.hosts
            .ids_where(|h| h.template_ids.contains(&template_id))
    }

    /// Templates linked to `host_id`, directly or through other templates.
    pub(crate) fn ancestors_of(&self, host_id: EntityId) -> BTreeSet<EntityId> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<EntityId> = self
            .hosts
            .get(host_id)
            .map(|h| h.template_ids.clone())
            .unwrap_or_default();
        while let Some(id) = pending.pop() {
            if seen.insert(id) {
                if let Some(template) = self.hosts.get(id) {
                    pending.extend(template.template_ids.iter().copied());
                }
            }
        }
        seen
    }

    /// Host owning a host prototype, through its discovery rule.
    pub(crate) fn host_prototype_owner(&self, prototype: &HostPrototypeRecord) -> Option<EntityId> {
        self.items.get(prototype.rule_id).map(|rule| rule.host_id)
    }

    pub(crate) fn row_counts(&self) -> BTreeMap<EntityKind, usize> {
        let mut counts = BTreeMap::new();
        let mut add = |kind: EntityKind, n: usize| {
            if n > 0 {
                *counts.entry(kind).or_insert(0) += n;
            }
        };
        add(EntityKind::Group, self.groups.len());
        for host in self.hosts.values() {
            add(host.kind.entity_kind(), 1);
        }
        add(EntityKind::Proxy, self.proxies.len());
        add(EntityKind::ValueMap, self.value_maps.len());
        add(EntityKind::IconMap, self.icon_maps.len());
        add(EntityKind::Application, self.applications.len());
        for item in self.items.values() {
            add(item.flags.entity_kind(), 1);
        }
        for trigger in self.triggers.values() {
            add(trigger.flags.entity_kind(), 1);
        }
        for graph in self.graphs.values() {
            add(graph.flags.entity_kind(), 1);
        }
        add(EntityKind::HostPrototype, self.host_prototypes.len());
        add(EntityKind::Image, self.images.len());
        add(EntityKind::Map, self.maps.len());
        for screen in self.screens.values() {
            let kind = if screen.template_id.is_some() {
                EntityKind::TemplateScreen
            } else {
                EntityKind::Screen
            };
            add(kind, 1);
        }
        counts
    }

    pub(crate) fn select_named<T: Record>(
        table: &Table<T>,
        names: Option<&[String]>,
        name: impl Fn(&T) -> &str,
    ) -> Vec<T> {
        table
            .values()
            .filter(|row| names.map_or(true, |names| names.iter().any(|n| n == name(row))))
            .cloned()
            .collect()
    }

    pub(crate) fn select_hosts(&self, query: &HostQuery) -> Vec<HostRecord> {
        self.hosts
            .values()
            .filter(|h| {
                admits(&query.ids, &h.id)
                    && admits(&query.names, &h.host)
                    && query.kind.map_or(true, |kind| kind == h.kind)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn select_applications(&self, query: &ApplicationQuery) -> Vec<ApplicationRecord> {
        self.applications
            .values()
            .filter(|a| {
                admits(&query.host_ids, &a.host_id)
                    && admits(&query.names, &a.name)
                    && admits_inherited(query.inherited, a.template_id)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn select_items(&self, query: &ItemQuery) -> Vec<ItemRecord> {
        self.items
            .values()
            .filter(|i| {
                admits(&query.ids, &i.id)
                    && admits(&query.host_ids, &i.host_id)
                    && admits(&query.keys, &i.key)
                    && admits(&query.flags, &i.flags)
                    && query
                        .rule_ids
                        .as_ref()
                        .map_or(true, |rules| i.rule_id.is_some_and(|r| rules.contains(&r)))
                    && admits_inherited(query.inherited, i.template_id)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn select_triggers(&self, query: &TriggerQuery) -> Vec<TriggerRecord> {
        self.triggers
            .values()
            .filter(|t| {
                admits(&query.ids, &t.id)
                    && admits(&query.descriptions, &t.description)
                    && admits_any(&query.host_ids, &t.host_ids)
                    && admits(&query.flags, &t.flags)
                    && admits_inherited(query.inherited, t.template_id)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn select_graphs(&self, query: &GraphQuery) -> Vec<GraphRecord> {
        self.graphs
            .values()
            .filter(|g| {
                admits(&query.ids, &g.id)
                    && admits_any(&query.host_ids, &g.host_ids)
                    && admits(&query.names, &g.name)
                    && admits(&query.flags, &g.flags)
                    && admits_inherited(query.inherited, g.template_id)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn select_host_prototypes(
        &self,
        query: &HostPrototypeQuery,
    ) -> Vec<HostPrototypeRecord> {
        self.host_prototypes
            .values()
            .filter(|p| {
                admits(&query.rule_ids, &p.rule_id)
                    && admits(&query.hosts, &p.host)
                    && admits_inherited(query.inherited, p.template_id)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn select_screens(&self, query: &ScreenQuery) -> Vec<ScreenRecord> {
        self.screens
            .values()
            .filter(|s| {
                admits(&query.names, &s.name)
                    && match (&query.template_ids, s.template_id) {
                        (None, owner) => owner.is_none(),
                        (Some(templates), Some(owner)) => templates.contains(&owner),
                        (Some(_), None) => false,
                    }
            })
            .cloned()
            .collect()
    }
}
