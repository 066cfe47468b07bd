//! Template inheritance.
//!
//! Linking a template to a host copies the template's applications, items,
//! discovery rules, prototypes, triggers, graphs and host prototypes onto the
//! host. Each copy records the template row it came from in `template_id`.
//! Copies are upserts: a row already inherited from the same template row is
//! refreshed, and an own row with the same natural key is adopted. Anything
//! copied onto a template flows on to that template's own children.

use super::draft::Draft;
use super::state::{parse_options, StoreState};
use crate::error::{StoreError, StoreResult};
use crate::record::{
    ApplicationRecord, GraphItemRecord, GraphRecord, HostKind, HostPrototypeRecord, HostRecord,
    ItemFlags, ItemRecord, TriggerRecord,
};
use reconf_expression::TriggerExpression;
use reconf_model::{EntityId, EntityKind, InterfaceType, ItemType};
use std::collections::{BTreeMap, BTreeSet};

/// Rows of one host to copy onto its children.
#[derive(Debug, Clone, Default)]
pub(crate) struct Selection {
    pub(crate) applications: Vec<EntityId>,
    pub(crate) items: Vec<EntityId>,
    pub(crate) triggers: Vec<EntityId>,
    pub(crate) graphs: Vec<EntityId>,
    pub(crate) host_prototypes: Vec<EntityId>,
}

impl Selection {
    fn everything_on(state: &StoreState, host_id: EntityId) -> Self {
        Self {
            applications: state.applications.ids_where(|a| a.host_id == host_id),
            items: state.items.ids_where(|i| i.host_id == host_id),
            triggers: state.triggers.ids_where(|t| t.host_ids.contains(&host_id)),
            graphs: state.graphs.ids_where(|g| g.host_ids.contains(&host_id)),
            host_prototypes: state
                .host_prototypes
                .ids_where(|p| state.host_prototype_owner(p) == Some(host_id)),
        }
    }

    fn is_empty(&self) -> bool {
        self.applications.is_empty()
            && self.items.is_empty()
            && self.triggers.is_empty()
            && self.graphs.is_empty()
            && self.host_prototypes.is_empty()
    }
}

fn interface_type_for(item_type: ItemType) -> Option<InterfaceType> {
    match item_type {
        ItemType::ZabbixAgent | ItemType::Simple | ItemType::External => Some(InterfaceType::Agent),
        ItemType::Snmp => Some(InterfaceType::Snmp),
        _ => None,
    }
}

fn pick_interface(host: &HostRecord, item_type: ItemType) -> Option<EntityId> {
    if host.kind == HostKind::Template {
        return None;
    }
    let wanted = interface_type_for(item_type)?;
    let mut candidates = host
        .interfaces
        .iter()
        .filter(|i| i.interface_type == wanted);
    let first = candidates.next()?;
    std::iter::once(first)
        .chain(candidates)
        .find(|i| i.main)
        .unwrap_or(first)
        .id
}

impl Draft {
    /// Copies everything on `template_id` onto `host_id` and beyond.
    pub(crate) fn inherit_template(
        &mut self,
        template_id: EntityId,
        host_id: EntityId,
    ) -> StoreResult<()> {
        let selection = Selection::everything_on(&self.state, template_id);
        let copied = self.copy_to(template_id, host_id, &selection)?;
        self.propagate(host_id, &copied)
    }

    /// Copies `selection` from `source` onto every host linking it,
    /// recursively.
    pub(crate) fn propagate(&mut self, source: EntityId, selection: &Selection) -> StoreResult<()> {
        if selection.is_empty() {
            return Ok(());
        }
        for child in self.state.children_of(source) {
            let copied = self.copy_to(source, child, selection)?;
            self.propagate(child, &copied)?;
        }
        Ok(())
    }

    /// Propagates freshly written rows of one kind, grouped by owning template.
    pub(crate) fn propagate_rows(
        &mut self,
        ids: &[EntityId],
        owner: impl Fn(&StoreState, EntityId) -> Option<EntityId>,
        add: impl Fn(&mut Selection, EntityId),
    ) -> StoreResult<()> {
        let mut by_owner: BTreeMap<EntityId, Selection> = BTreeMap::new();
        for id in ids {
            let Some(host_id) = owner(&self.state, *id) else {
                continue;
            };
            let is_template = self
                .state
                .hosts
                .get(host_id)
                .is_some_and(|h| h.kind == HostKind::Template);
            if is_template {
                add(by_owner.entry(host_id).or_default(), *id);
            }
        }
        for (template_id, selection) in by_owner {
            self.propagate(template_id, &selection)?;
        }
        Ok(())
    }

    fn copy_to(
        &mut self,
        source: EntityId,
        target: EntityId,
        selection: &Selection,
    ) -> StoreResult<Selection> {
        let target_host = self
            .state
            .hosts
            .get(target)
            .cloned()
            .ok_or(StoreError::not_found(EntityKind::Host, target))?;
        let source_name = self.state.host_name(source);
        let mut copied = Selection::default();

        let items = self.items_with_prerequisites(source, &selection.items);
        let mut applications: Vec<EntityId> = selection.applications.clone();
        for id in &items {
            if let Some(item) = self.state.items.get(*id) {
                for app_id in &item.application_ids {
                    if !applications.contains(app_id) {
                        applications.push(*app_id);
                    }
                }
            }
        }
        for id in applications {
            copied
                .applications
                .push(self.copy_application(id, &target_host)?);
        }
        for id in items {
            copied.items.push(self.copy_item(id, &target_host)?);
        }

        let mut trigger_pairs = Vec::with_capacity(selection.triggers.len());
        for id in &selection.triggers {
            let new_id = self.copy_trigger(*id, &source_name, &target_host)?;
            trigger_pairs.push((*id, new_id));
            copied.triggers.push(new_id);
        }
        for (source_id, copy_id) in trigger_pairs {
            self.copy_dependencies(source_id, copy_id, target)?;
        }

        for id in &selection.graphs {
            copied
                .graphs
                .push(self.copy_graph(*id, source, &target_host)?);
        }
        for id in &selection.host_prototypes {
            copied
                .host_prototypes
                .push(self.copy_host_prototype(*id, &target_host)?);
        }
        Ok(copied)
    }

    /// Selected items plus the rules and master items they need, ordered so
    /// every row comes after the rows it points at.
    fn items_with_prerequisites(&self, source: EntityId, selected: &[EntityId]) -> Vec<EntityId> {
        let mut all: BTreeSet<EntityId> = BTreeSet::new();
        let mut pending: Vec<EntityId> = selected.to_vec();
        while let Some(id) = pending.pop() {
            let Some(item) = self.state.items.get(id) else {
                continue;
            };
            if item.host_id != source || !all.insert(id) {
                continue;
            }
            pending.extend(item.rule_id);
            pending.extend(item.master_item_id);
        }
        let depth = |mut id: EntityId| {
            let mut depth = 0;
            while let Some(master) = self.state.items.get(id).and_then(|i| i.master_item_id) {
                depth += 1;
                id = master;
                if depth > super::draft::MAX_DEPENDENCY_LEVELS {
                    break;
                }
            }
            depth
        };
        let rank = |flags: ItemFlags| match flags {
            ItemFlags::DiscoveryRule => 0,
            ItemFlags::Normal => 1,
            ItemFlags::Prototype => 2,
        };
        let mut ordered: Vec<EntityId> = all.into_iter().collect();
        ordered.sort_by_key(|id| {
            let flags = self
                .state
                .items
                .get(*id)
                .map_or(ItemFlags::Normal, |i| i.flags);
            (rank(flags), depth(*id), *id)
        });
        ordered
    }

    fn inherited_item(&self, target: &HostRecord, source_id: EntityId) -> StoreResult<EntityId> {
        self.state
            .items
            .values()
            .find(|i| i.host_id == target.id && i.template_id == Some(source_id))
            .map(|i| i.id)
            .ok_or_else(|| {
                StoreError::constraint(format!(
                    "Inherited copy of item {} is missing on \"{}\".",
                    source_id, target.host
                ))
            })
    }

    fn inherited_application(
        &self,
        target: &HostRecord,
        source_id: EntityId,
    ) -> StoreResult<EntityId> {
        self.state
            .applications
            .values()
            .find(|a| a.host_id == target.id && a.template_id == Some(source_id))
            .map(|a| a.id)
            .ok_or_else(|| {
                StoreError::constraint(format!(
                    "Inherited copy of application {} is missing on \"{}\".",
                    source_id, target.host
                ))
            })
    }

    fn copy_application(&mut self, source_id: EntityId, target: &HostRecord) -> StoreResult<EntityId> {
        let source = self
            .state
            .applications
            .get(source_id)
            .cloned()
            .ok_or(StoreError::not_found(EntityKind::Application, source_id))?;
        let existing = self
            .state
            .applications
            .values()
            .find(|a| a.host_id == target.id && a.template_id == Some(source_id))
            .or_else(|| {
                self.state.applications.values().find(|a| {
                    a.host_id == target.id && a.template_id.is_none() && a.name == source.name
                })
            })
            .cloned();
        let row = ApplicationRecord {
            id: existing.as_ref().map_or(EntityId::default(), |a| a.id),
            host_id: target.id,
            name: source.name,
            template_id: Some(source_id),
        };
        match existing {
            Some(existing) if existing == row => Ok(row.id),
            Some(_) => {
                self.check_application(&row)?;
                let id = row.id;
                self.state.applications.insert(row);
                self.updated(EntityKind::Application, id);
                Ok(id)
            }
            None => {
                let mut row = row;
                row.id = self.allocate();
                self.check_application(&row)?;
                let id = row.id;
                self.state.applications.insert(row);
                self.created(EntityKind::Application, id);
                Ok(id)
            }
        }
    }

    fn copy_item(&mut self, source_id: EntityId, target: &HostRecord) -> StoreResult<EntityId> {
        let source = self
            .state
            .items
            .get(source_id)
            .cloned()
            .ok_or(StoreError::not_found(EntityKind::Item, source_id))?;
        let existing = self
            .state
            .items
            .values()
            .find(|i| i.host_id == target.id && i.template_id == Some(source_id))
            .or_else(|| self.state.item_by_key(target.id, &source.key))
            .cloned();
        if let Some(existing) = &existing {
            if existing.template_id.is_some_and(|t| t != source_id) {
                return Err(StoreError::constraint(format!(
                    "{} \"{}\" on \"{}\" is already inherited from another template.",
                    existing.flags.entity_kind(),
                    existing.key,
                    target.host
                )));
            }
            if existing.flags != source.flags {
                return Err(StoreError::duplicate_on(
                    existing.flags.entity_kind(),
                    existing.key.clone(),
                    &target.host,
                ));
            }
        }

        let application_ids = source
            .application_ids
            .iter()
            .map(|id| self.inherited_application(target, *id))
            .collect::<StoreResult<Vec<_>>>()?;
        let rule_id = source
            .rule_id
            .map(|id| self.inherited_item(target, id))
            .transpose()?;
        let master_item_id = source
            .master_item_id
            .map(|id| self.inherited_item(target, id))
            .transpose()?;
        let interface_id = pick_interface(target, source.settings.item_type)
            .or_else(|| existing.as_ref().and_then(|e| e.interface_id));

        let mut row = ItemRecord {
            id: existing.as_ref().map_or(EntityId::default(), |e| e.id),
            host_id: target.id,
            key: source.key,
            flags: source.flags,
            settings: source.settings,
            template_id: Some(source_id),
            rule_id,
            application_ids,
            valuemap_id: source.valuemap_id,
            interface_id,
            master_item_id,
            filter: source.filter,
            lifetime: source.lifetime,
        };
        let kind = row.flags.entity_kind();
        match existing {
            Some(existing) if existing == row => Ok(row.id),
            Some(_) => {
                self.check_item(&row)?;
                let id = row.id;
                self.state.items.insert(row);
                self.updated(kind, id);
                Ok(id)
            }
            None => {
                row.id = self.allocate();
                self.check_item(&row)?;
                let id = row.id;
                self.state.items.insert(row);
                self.created(kind, id);
                Ok(id)
            }
        }
    }

    fn copy_trigger(
        &mut self,
        source_id: EntityId,
        source_name: &str,
        target: &HostRecord,
    ) -> StoreResult<EntityId> {
        let source = self
            .state
            .triggers
            .get(source_id)
            .cloned()
            .ok_or(StoreError::not_found(EntityKind::Trigger, source_id))?;
        let expression =
            TriggerExpression::parse_with(&source.expression, parse_options(source.flags))
                .map_err(|e| StoreError::constraint(e.to_string()))?
                .replace_host(source_name, &target.host);
        let existing = self
            .state
            .triggers
            .values()
            .find(|t| t.template_id == Some(source_id) && t.host_ids.contains(&target.id))
            .or_else(|| {
                self.state.triggers.values().find(|t| {
                    t.template_id.is_none()
                        && t.description == source.description
                        && t.expression == expression
                })
            })
            .cloned();
        let mut row = TriggerRecord {
            id: existing.as_ref().map_or(EntityId::default(), |t| t.id),
            description: source.description,
            expression,
            flags: source.flags,
            settings: source.settings,
            template_id: Some(source_id),
            dependency_ids: existing
                .as_ref()
                .map(|t| t.dependency_ids.clone())
                .unwrap_or_default(),
            host_ids: Vec::new(),
        };
        let kind = row.flags.entity_kind();
        if existing.is_none() {
            row.id = self.allocate();
        }
        self.check_trigger(&mut row)?;
        let id = row.id;
        match existing {
            Some(existing) if existing == row => {}
            Some(_) => {
                self.state.triggers.insert(row);
                self.updated(kind, id);
            }
            None => {
                self.state.triggers.insert(row);
                self.created(kind, id);
            }
        }
        Ok(id)
    }

    /// Counterpart of `trigger_id` on `host_id`, or the trigger itself when
    /// it was not inherited there.
    fn counterpart(&self, trigger_id: EntityId, host_id: EntityId) -> EntityId {
        self.state
            .triggers
            .values()
            .find(|t| t.template_id == Some(trigger_id) && t.host_ids.contains(&host_id))
            .map_or(trigger_id, |t| t.id)
    }

    fn copy_dependencies(
        &mut self,
        source_id: EntityId,
        copy_id: EntityId,
        target: EntityId,
    ) -> StoreResult<()> {
        let ups = self
            .state
            .triggers
            .get(source_id)
            .map(|t| t.dependency_ids.clone())
            .unwrap_or_default();
        let mapped: Vec<EntityId> = ups.iter().map(|up| self.counterpart(*up, target)).collect();
        let Some(copy) = self.state.triggers.get_mut(copy_id) else {
            return Ok(());
        };
        if copy.dependency_ids != mapped {
            copy.dependency_ids = mapped;
            let kind = copy.flags.entity_kind();
            self.updated(kind, copy_id);
            self.check_dependency_cycle(copy_id)?;
        }
        Ok(())
    }

    /// Pushes the dependency list of `trigger_id` down to its inherited
    /// copies, recursively.
    pub(crate) fn propagate_dependencies(&mut self, trigger_id: EntityId) -> StoreResult<()> {
        let Some(trigger) = self.state.triggers.get(trigger_id) else {
            return Ok(());
        };
        let parent_hosts = trigger.host_ids.clone();
        let children: Vec<(EntityId, Vec<EntityId>)> = self
            .state
            .triggers
            .values()
            .filter(|t| t.template_id == Some(trigger_id))
            .map(|t| (t.id, t.host_ids.clone()))
            .collect();
        for (child_id, child_hosts) in children {
            let Some(target) = child_hosts
                .iter()
                .copied()
                .find(|h| !parent_hosts.contains(h))
            else {
                continue;
            };
            self.copy_dependencies(trigger_id, child_id, target)?;
            self.propagate_dependencies(child_id)?;
        }
        Ok(())
    }

    fn copy_graph(
        &mut self,
        source_id: EntityId,
        source_host: EntityId,
        target: &HostRecord,
    ) -> StoreResult<EntityId> {
        let source = self
            .state
            .graphs
            .get(source_id)
            .cloned()
            .ok_or(StoreError::not_found(EntityKind::Graph, source_id))?;
        let map_item = |draft: &Self, id: EntityId| -> StoreResult<EntityId> {
            match draft.state.items.get(id) {
                Some(item) if item.host_id == source_host => draft.inherited_item(target, id),
                _ => Ok(id),
            }
        };
        let items = source
            .items
            .iter()
            .map(|gitem| {
                Ok(GraphItemRecord {
                    item_id: map_item(self, gitem.item_id)?,
                    style: gitem.style.clone(),
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        let ymin_item_id = source
            .ymin_item_id
            .map(|id| map_item(self, id))
            .transpose()?;
        let ymax_item_id = source
            .ymax_item_id
            .map(|id| map_item(self, id))
            .transpose()?;
        let existing = self
            .state
            .graphs
            .values()
            .find(|g| g.template_id == Some(source_id) && g.host_ids.contains(&target.id))
            .or_else(|| {
                self.state.graphs.values().find(|g| {
                    g.template_id.is_none()
                        && g.name == source.name
                        && g.host_ids.contains(&target.id)
                })
            })
            .cloned();
        let mut row = GraphRecord {
            id: existing.as_ref().map_or(EntityId::default(), |g| g.id),
            name: source.name,
            flags: source.flags,
            settings: source.settings,
            template_id: Some(source_id),
            ymin_item_id,
            ymax_item_id,
            items,
            host_ids: Vec::new(),
        };
        let kind = row.flags.entity_kind();
        if existing.is_none() {
            row.id = self.allocate();
        }
        self.check_graph(&mut row)?;
        let id = row.id;
        match existing {
            Some(existing) if existing == row => {}
            Some(_) => {
                self.state.graphs.insert(row);
                self.updated(kind, id);
            }
            None => {
                self.state.graphs.insert(row);
                self.created(kind, id);
            }
        }
        Ok(id)
    }

    fn copy_host_prototype(
        &mut self,
        source_id: EntityId,
        target: &HostRecord,
    ) -> StoreResult<EntityId> {
        let source = self
            .state
            .host_prototypes
            .get(source_id)
            .cloned()
            .ok_or(StoreError::not_found(EntityKind::HostPrototype, source_id))?;
        let rule_id = self.inherited_item(target, source.rule_id)?;
        let existing = self
            .state
            .host_prototypes
            .values()
            .find(|p| p.template_id == Some(source_id) && p.rule_id == rule_id)
            .or_else(|| {
                self.state.host_prototypes.values().find(|p| {
                    p.template_id.is_none() && p.rule_id == rule_id && p.host == source.host
                })
            })
            .cloned();
        let mut row = HostPrototypeRecord {
            id: existing.as_ref().map_or(EntityId::default(), |p| p.id),
            rule_id,
            template_id: Some(source_id),
            ..source
        };
        match existing {
            Some(existing) if existing == row => Ok(row.id),
            Some(_) => {
                self.check_host_prototype(&row)?;
                let id = row.id;
                self.state.host_prototypes.insert(row);
                self.updated(EntityKind::HostPrototype, id);
                Ok(id)
            }
            None => {
                row.id = self.allocate();
                self.check_host_prototype(&row)?;
                let id = row.id;
                self.state.host_prototypes.insert(row);
                self.created(EntityKind::HostPrototype, id);
                Ok(id)
            }
        }
    }

    /// Detaches rows of `host_id` inherited from `template_id`. The rows
    /// stay on the host as its own.
    pub(crate) fn unlink_template(&mut self, template_id: EntityId, host_id: EntityId) {
        let state = &self.state;
        let applications = state.applications.ids_where(|a| {
            a.host_id == host_id
                && a.template_id
                    .and_then(|p| state.applications.get(p))
                    .is_some_and(|parent| parent.host_id == template_id)
        });
        let items = state.items.ids_where(|i| {
            i.host_id == host_id
                && i.template_id
                    .and_then(|p| state.items.get(p))
                    .is_some_and(|parent| parent.host_id == template_id)
        });
        let triggers = state.triggers.ids_where(|t| {
            t.host_ids.contains(&host_id)
                && t.template_id
                    .and_then(|p| state.triggers.get(p))
                    .is_some_and(|parent| parent.host_ids.contains(&template_id))
        });
        let graphs = state.graphs.ids_where(|g| {
            g.host_ids.contains(&host_id)
                && g.template_id
                    .and_then(|p| state.graphs.get(p))
                    .is_some_and(|parent| parent.host_ids.contains(&template_id))
        });
        let host_prototypes = state.host_prototypes.ids_where(|p| {
            state.host_prototype_owner(p) == Some(host_id)
                && p.template_id
                    .and_then(|parent| state.host_prototypes.get(parent))
                    .and_then(|parent| state.host_prototype_owner(parent))
                    == Some(template_id)
        });

        for id in applications {
            if let Some(row) = self.state.applications.get_mut(id) {
                row.template_id = None;
            }
            self.updated(EntityKind::Application, id);
        }
        for id in items {
            if let Some(row) = self.state.items.get_mut(id) {
                row.template_id = None;
                let kind = row.flags.entity_kind();
                self.updated(kind, id);
            }
        }
        for id in triggers {
            if let Some(row) = self.state.triggers.get_mut(id) {
                row.template_id = None;
                let kind = row.flags.entity_kind();
                self.updated(kind, id);
            }
        }
        for id in graphs {
            if let Some(row) = self.state.graphs.get_mut(id) {
                row.template_id = None;
                let kind = row.flags.entity_kind();
                self.updated(kind, id);
            }
        }
        for id in host_prototypes {
            if let Some(row) = self.state.host_prototypes.get_mut(id) {
                row.template_id = None;
            }
            self.updated(EntityKind::HostPrototype, id);
        }
    }
}
