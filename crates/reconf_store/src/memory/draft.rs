//! Validated writes against a private copy of the store state.
//!
//! A [`Draft`] is built from a clone of the live state for every write
//! call. Rows are checked and applied one by one against the draft; the
//! caller swaps the draft in only when the whole call succeeded.

use super::state::{parse_options, StoreState};
use crate::error::{StoreError, StoreResult};
use crate::journal::{Journal, Operation};
use crate::record::{
    ApplicationRecord, ElementTarget, GraphFlags, GraphRecord, GroupRecord, HostKind,
    HostPrototypeRecord, HostRecord, ImageRecord, ItemFlags, ItemRecord, MapRecord,
    ResourceRecord, ScreenRecord, TriggerFlags, TriggerRecord,
};
use reconf_expression::TriggerExpression;
use reconf_model::{EntityId, EntityKind, ItemType};
use std::collections::{BTreeMap, BTreeSet};

/// Longest chain of dependent items below a master item.
pub const MAX_DEPENDENCY_LEVELS: usize = 3;

pub(crate) struct Draft {
    pub(crate) state: StoreState,
    pub(crate) journal: Journal,
}

fn screen_kind(screen: &ScreenRecord) -> EntityKind {
    if screen.template_id.is_some() {
        EntityKind::TemplateScreen
    } else {
        EntityKind::Screen
    }
}

impl Draft {
    pub(crate) fn new(state: StoreState) -> Self {
        Self {
            state,
            journal: Journal::new(),
        }
    }

    pub(crate) fn allocate(&mut self) -> EntityId {
        self.state.next_id += 1;
        EntityId::new(self.state.next_id)
    }

    pub(crate) fn created(&mut self, kind: EntityKind, id: EntityId) {
        self.journal.record(kind, Operation::Create, id);
    }

    pub(crate) fn updated(&mut self, kind: EntityKind, id: EntityId) {
        self.journal.record(kind, Operation::Update, id);
    }

    pub(crate) fn deleted(&mut self, kind: EntityKind, id: EntityId) {
        self.journal.record(kind, Operation::Delete, id);
    }

    /// Fails unless the host exists and may be modified.
    pub(crate) fn writable_host(&self, id: EntityId) -> StoreResult<&HostRecord> {
        let host = self
            .state
            .hosts
            .get(id)
            .ok_or(StoreError::not_found(EntityKind::Host, id))?;
        if self.state.read_only.contains(&id) {
            return Err(StoreError::PermissionDenied {
                kind: host.kind.entity_kind(),
                id,
            });
        }
        Ok(host)
    }

    // Groups.

    pub(crate) fn create_groups(&mut self, groups: Vec<GroupRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(groups.len());
        for mut group in groups {
            if group.name.trim().is_empty() {
                return Err(StoreError::constraint("Host group name cannot be empty."));
            }
            if self.state.groups.values().any(|g| g.name == group.name) {
                return Err(StoreError::duplicate(EntityKind::Group, group.name));
            }
            group.id = self.allocate();
            let id = group.id;
            self.state.groups.insert(group);
            self.created(EntityKind::Group, id);
            ids.push(id);
        }
        Ok(ids)
    }

    // Hosts and templates.

    fn check_host(&self, host: &HostRecord) -> StoreResult<()> {
        let kind = host.kind.entity_kind();
        if host.host.trim().is_empty() {
            return Err(StoreError::constraint(format!(
                "Incorrect characters used for {} name \"{}\".",
                kind, host.host
            )));
        }
        if self
            .state
            .hosts
            .values()
            .any(|h| h.id != host.id && h.host == host.host)
        {
            return Err(StoreError::duplicate(kind, host.host.clone()));
        }
        if host.group_ids.is_empty() {
            return Err(StoreError::constraint(format!(
                "No groups for {} \"{}\".",
                kind, host.host
            )));
        }
        for group_id in &host.group_ids {
            if !self.state.groups.contains(*group_id) {
                return Err(StoreError::not_found(EntityKind::Group, *group_id));
            }
        }
        if let Some(proxy_id) = host.proxy_id {
            if !self.state.proxies.contains(proxy_id) {
                return Err(StoreError::not_found(EntityKind::Proxy, proxy_id));
            }
        }
        let mut macro_names = BTreeSet::new();
        for user_macro in &host.macros {
            if !macro_names.insert(user_macro.name.as_str()) {
                return Err(StoreError::duplicate_on(
                    EntityKind::UserMacro,
                    user_macro.name.clone(),
                    &host.host,
                ));
            }
        }
        if host.kind == HostKind::Template && !host.interfaces.is_empty() {
            return Err(StoreError::constraint(format!(
                "Template \"{}\" cannot have interfaces.",
                host.host
            )));
        }
        Ok(())
    }

    fn assign_host_child_ids(&mut self, host: &mut HostRecord) {
        for user_macro in &mut host.macros {
            if user_macro.id.is_none() {
                user_macro.id = Some(self.allocate());
            }
        }
        for interface in &mut host.interfaces {
            if interface.id.is_none() {
                interface.id = Some(self.allocate());
            }
        }
    }

    pub(crate) fn create_hosts(&mut self, hosts: Vec<HostRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(hosts.len());
        for mut host in hosts {
            host.id = self.allocate();
            self.check_host(&host)?;
            self.assign_host_child_ids(&mut host);
            let templates = std::mem::take(&mut host.template_ids);
            let (id, kind) = (host.id, host.kind.entity_kind());
            self.state.hosts.insert(host);
            self.created(kind, id);
            for template_id in templates {
                self.link_template(template_id, id)?;
            }
            ids.push(id);
        }
        Ok(ids)
    }

    pub(crate) fn update_hosts(&mut self, hosts: Vec<HostRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(hosts.len());
        for mut host in hosts {
            let existing = self.writable_host(host.id)?.clone();
            host.kind = existing.kind;
            self.check_host(&host)?;
            self.assign_host_child_ids(&mut host);
            self.check_removed_interfaces(&existing, &host)?;

            let wanted = std::mem::take(&mut host.template_ids);
            host.template_ids = existing
                .template_ids
                .iter()
                .copied()
                .filter(|t| wanted.contains(t))
                .collect();
            let unlinked: Vec<EntityId> = existing
                .template_ids
                .iter()
                .copied()
                .filter(|t| !wanted.contains(t))
                .collect();
            let linked: Vec<EntityId> = wanted
                .iter()
                .copied()
                .filter(|t| !existing.template_ids.contains(t))
                .collect();

            let id = host.id;
            if existing.host != host.host {
                self.rename_in_expressions(id, &existing.host, &host.host)?;
            }
            if host != existing {
                self.state.hosts.insert(host);
                self.updated(existing.kind.entity_kind(), id);
            }
            for template_id in unlinked {
                self.unlink_template(template_id, id);
            }
            for template_id in linked {
                self.link_template(template_id, id)?;
            }
            ids.push(id);
        }
        Ok(ids)
    }

    fn check_removed_interfaces(&self, existing: &HostRecord, host: &HostRecord) -> StoreResult<()> {
        let kept: BTreeSet<EntityId> = host.interfaces.iter().filter_map(|i| i.id).collect();
        for removed in existing
            .interfaces
            .iter()
            .filter_map(|i| i.id)
            .filter(|id| !kept.contains(id))
        {
            if let Some(item) = self
                .state
                .items
                .values()
                .find(|i| i.interface_id == Some(removed))
            {
                return Err(StoreError::constraint(format!(
                    "Interface is linked to item \"{}\" on \"{}\".",
                    item.key, existing.host
                )));
            }
        }
        Ok(())
    }

    /// Rewrites the host part of every expression that mentions a renamed host.
    fn rename_in_expressions(&mut self, host_id: EntityId, from: &str, to: &str) -> StoreResult<()> {
        let affected = self
            .state
            .triggers
            .ids_where(|t| t.host_ids.contains(&host_id));
        for id in affected {
            let Some(trigger) = self.state.triggers.get_mut(id) else {
                continue;
            };
            let parsed = TriggerExpression::parse_with(&trigger.expression, parse_options(trigger.flags))
                .map_err(|e| StoreError::constraint(e.to_string()))?;
            trigger.expression = parsed.replace_host(from, to);
            let kind = trigger.flags.entity_kind();
            self.updated(kind, id);
        }
        Ok(())
    }

    fn link_template(&mut self, template_id: EntityId, host_id: EntityId) -> StoreResult<()> {
        let template = self
            .state
            .hosts
            .get(template_id)
            .ok_or(StoreError::not_found(EntityKind::Template, template_id))?;
        if template.kind != HostKind::Template {
            return Err(StoreError::constraint(format!(
                "\"{}\" is not a template.",
                template.host
            )));
        }
        if template_id == host_id || self.state.ancestors_of(template_id).contains(&host_id) {
            return Err(StoreError::constraint(format!(
                "Circular template linkage between \"{}\" and \"{}\".",
                self.state.host_name(host_id),
                template.host
            )));
        }
        if let Some(host) = self.state.hosts.get_mut(host_id) {
            if !host.template_ids.contains(&template_id) {
                host.template_ids.push(template_id);
            }
        }
        self.inherit_template(template_id, host_id)
    }

    // Applications.

    pub(crate) fn check_application(&self, app: &ApplicationRecord) -> StoreResult<()> {
        let host = self.writable_host(app.host_id)?;
        if app.name.trim().is_empty() {
            return Err(StoreError::constraint("Empty application name."));
        }
        if self
            .state
            .applications
            .values()
            .any(|a| a.id != app.id && a.host_id == app.host_id && a.name == app.name)
        {
            return Err(StoreError::duplicate_on(
                EntityKind::Application,
                app.name.clone(),
                &host.host,
            ));
        }
        Ok(())
    }

    pub(crate) fn create_applications(
        &mut self,
        apps: Vec<ApplicationRecord>,
    ) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(apps.len());
        for mut app in apps {
            app.id = self.allocate();
            app.template_id = None;
            self.check_application(&app)?;
            let id = app.id;
            self.state.applications.insert(app);
            self.created(EntityKind::Application, id);
            ids.push(id);
        }
        self.propagate_rows(&ids, |s, id| s.applications.get(id).map(|a| a.host_id), |sel, id| {
            sel.applications.push(id);
        })?;
        Ok(ids)
    }

    // Items, discovery rules and item prototypes.

    pub(crate) fn check_item(&self, item: &ItemRecord) -> StoreResult<()> {
        let kind = item.flags.entity_kind();
        let host = self.writable_host(item.host_id)?;
        if item.key.trim().is_empty() {
            return Err(StoreError::constraint(format!(
                "Incorrect key for {} \"{}\" on \"{}\".",
                kind, item.settings.name, host.host
            )));
        }
        if let Some(other) = self
            .state
            .items
            .values()
            .find(|i| i.id != item.id && i.host_id == item.host_id && i.key == item.key)
        {
            return Err(StoreError::duplicate_on(
                other.flags.entity_kind(),
                item.key.clone(),
                &host.host,
            ));
        }
        match (item.flags, item.rule_id) {
            (ItemFlags::Prototype, Some(rule_id)) => {
                let rule = self
                    .state
                    .items
                    .get(rule_id)
                    .filter(|r| r.flags == ItemFlags::DiscoveryRule)
                    .ok_or(StoreError::not_found(EntityKind::DiscoveryRule, rule_id))?;
                if rule.host_id != item.host_id {
                    return Err(StoreError::constraint(format!(
                        "Discovery rule \"{}\" does not belong to \"{}\".",
                        rule.key, host.host
                    )));
                }
            }
            (ItemFlags::Prototype, None) => {
                return Err(StoreError::constraint(format!(
                    "Item prototype \"{}\" on \"{}\" has no discovery rule.",
                    item.key, host.host
                )));
            }
            (_, Some(_)) => {
                return Err(StoreError::constraint(format!(
                    "{} \"{}\" cannot belong to a discovery rule.",
                    kind, item.key
                )));
            }
            (_, None) => {}
        }
        for app_id in &item.application_ids {
            let app = self
                .state
                .applications
                .get(*app_id)
                .ok_or(StoreError::not_found(EntityKind::Application, *app_id))?;
            if app.host_id != item.host_id {
                return Err(StoreError::constraint(format!(
                    "Application \"{}\" does not belong to \"{}\".",
                    app.name, host.host
                )));
            }
        }
        if let Some(valuemap_id) = item.valuemap_id {
            if !self.state.value_maps.contains(valuemap_id) {
                return Err(StoreError::not_found(EntityKind::ValueMap, valuemap_id));
            }
        }
        if let Some(interface_id) = item.interface_id {
            if !host.interfaces.iter().any(|i| i.id == Some(interface_id)) {
                return Err(StoreError::constraint(format!(
                    "Cannot find host interface on \"{}\" for {} key \"{}\".",
                    host.host, kind, item.key
                )));
            }
        }
        self.check_master_item(item, &host.host)
    }

    fn check_master_item(&self, item: &ItemRecord, host: &str) -> StoreResult<()> {
        let Some(master_id) = item.master_item_id else {
            if item.settings.item_type == ItemType::Dependent {
                return Err(StoreError::constraint(format!(
                    "Dependent item \"{}\" on \"{}\" has no master item.",
                    item.key, host
                )));
            }
            return Ok(());
        };
        let master = self
            .state
            .items
            .get(master_id)
            .ok_or(StoreError::not_found(EntityKind::Item, master_id))?;
        let allowed = match item.flags {
            ItemFlags::Normal => master.flags == ItemFlags::Normal,
            ItemFlags::Prototype => {
                master.flags == ItemFlags::Normal
                    || (master.flags == ItemFlags::Prototype && master.rule_id == item.rule_id)
            }
            ItemFlags::DiscoveryRule => master.flags == ItemFlags::Normal,
        };
        if master.host_id != item.host_id || !allowed {
            return Err(StoreError::constraint(format!(
                "Incorrect master item \"{}\" for \"{}\" on \"{}\".",
                master.key, item.key, host
            )));
        }
        // Levels above this item, plus whatever hangs below it already.
        let mut levels = 1;
        let mut current = master;
        while let Some(next_id) = current.master_item_id {
            if next_id == item.id {
                return Err(StoreError::constraint(format!(
                    "Circular master item dependency for \"{}\" on \"{}\".",
                    item.key, host
                )));
            }
            levels += 1;
            match self.state.items.get(next_id) {
                Some(next) => current = next,
                None => break,
            }
        }
        if levels + self.dependent_depth(item.id) > MAX_DEPENDENCY_LEVELS {
            return Err(StoreError::constraint(format!(
                "Cannot set dependency for \"{}\" on \"{}\": maximum number of dependency levels reached.",
                item.key, host
            )));
        }
        Ok(())
    }

    fn dependent_depth(&self, id: EntityId) -> usize {
        let mut depth = 0;
        let mut level = vec![id];
        while !level.is_empty() && depth <= MAX_DEPENDENCY_LEVELS {
            level = self
                .state
                .items
                .ids_where(|i| i.master_item_id.is_some_and(|m| level.contains(&m)));
            if !level.is_empty() {
                depth += 1;
            }
        }
        depth
    }

    fn normalize_item(item: &mut ItemRecord) {
        if item.settings.item_type != ItemType::Dependent {
            item.master_item_id = None;
        }
        if item.flags != ItemFlags::DiscoveryRule {
            item.filter = None;
            item.lifetime = None;
        }
    }

    pub(crate) fn create_items(&mut self, items: Vec<ItemRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(items.len());
        for mut item in items {
            item.id = self.allocate();
            item.template_id = None;
            Self::normalize_item(&mut item);
            self.check_item(&item)?;
            let (id, kind) = (item.id, item.flags.entity_kind());
            self.state.items.insert(item);
            self.created(kind, id);
            ids.push(id);
        }
        self.propagate_rows(&ids, |s, id| s.items.get(id).map(|i| i.host_id), |sel, id| {
            sel.items.push(id);
        })?;
        Ok(ids)
    }

    pub(crate) fn update_items(&mut self, items: Vec<ItemRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(items.len());
        for mut item in items {
            let existing = self
                .state
                .items
                .get(item.id)
                .cloned()
                .ok_or(StoreError::not_found(EntityKind::Item, item.id))?;
            item.host_id = existing.host_id;
            item.flags = existing.flags;
            item.template_id = existing.template_id;
            item.rule_id = existing.rule_id;
            Self::normalize_item(&mut item);
            self.check_item(&item)?;
            if item.key != existing.key && self.key_in_expressions(&existing) {
                return Err(StoreError::constraint(format!(
                    "Key of {} \"{}\" on \"{}\" is used in trigger expressions and cannot be changed.",
                    existing.flags.entity_kind(),
                    existing.key,
                    self.state.host_name(existing.host_id)
                )));
            }
            ids.push(item.id);
            if item != existing {
                let kind = item.flags.entity_kind();
                self.state.items.insert(item);
                self.updated(kind, existing.id);
            }
        }
        self.propagate_rows(&ids, |s, id| s.items.get(id).map(|i| i.host_id), |sel, id| {
            sel.items.push(id);
        })?;
        Ok(ids)
    }

    fn key_in_expressions(&self, item: &ItemRecord) -> bool {
        self.state
            .triggers
            .values()
            .filter(|t| t.host_ids.contains(&item.host_id))
            .any(|t| self.state.trigger_item_ids(t).contains(&item.id))
    }

    // Triggers and trigger prototypes.

    /// Validates a trigger and fills in its host ids.
    pub(crate) fn check_trigger(&self, trigger: &mut TriggerRecord) -> StoreResult<()> {
        let kind = trigger.flags.entity_kind();
        if trigger.description.trim().is_empty() {
            return Err(StoreError::constraint(format!("Empty {kind} description.")));
        }
        let parsed =
            TriggerExpression::parse_with(&trigger.expression, parse_options(trigger.flags))
                .map_err(|e| {
                    StoreError::constraint(format!(
                        "Invalid expression for {} \"{}\": {}",
                        kind, trigger.description, e
                    ))
                })?;
        let mut host_ids = Vec::new();
        let mut rules = BTreeSet::new();
        for function_macro in parsed.function_macros() {
            let host = self.state.host_by_name(&function_macro.host).ok_or_else(|| {
                StoreError::constraint(format!(
                    "Incorrect trigger expression. Host \"{}\" does not exist or you have no access to this host.",
                    function_macro.host
                ))
            })?;
            self.writable_host(host.id)?;
            let item = self
                .state
                .item_by_key(host.id, &function_macro.key)
                .filter(|i| match i.flags {
                    ItemFlags::Normal => true,
                    ItemFlags::Prototype => trigger.flags == TriggerFlags::Prototype,
                    ItemFlags::DiscoveryRule => false,
                })
                .ok_or_else(|| {
                    StoreError::constraint(format!(
                        "Incorrect item key \"{}\" provided for trigger expression on \"{}\".",
                        function_macro.key, function_macro.host
                    ))
                })?;
            if let Some(rule_id) = item.rule_id {
                rules.insert(rule_id);
            }
            if !host_ids.contains(&host.id) {
                host_ids.push(host.id);
            }
        }
        if trigger.flags == TriggerFlags::Prototype {
            if rules.is_empty() {
                return Err(StoreError::constraint(format!(
                    "Trigger prototype \"{}\" must contain at least one item prototype.",
                    trigger.description
                )));
            }
            if rules.len() > 1 {
                return Err(StoreError::constraint(format!(
                    "Trigger prototype \"{}\" contains item prototypes from multiple discovery rules.",
                    trigger.description
                )));
            }
        }
        if self.state.triggers.values().any(|t| {
            t.id != trigger.id
                && t.description == trigger.description
                && t.expression == trigger.expression
        }) {
            let host = host_ids
                .first()
                .map(|id| self.state.host_name(*id))
                .unwrap_or_default();
            return Err(StoreError::duplicate_on(
                kind,
                trigger.description.clone(),
                &host,
            ));
        }
        trigger.host_ids = host_ids;
        Ok(())
    }

    pub(crate) fn create_triggers(
        &mut self,
        triggers: Vec<TriggerRecord>,
    ) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(triggers.len());
        for mut trigger in triggers {
            trigger.id = self.allocate();
            trigger.template_id = None;
            trigger.dependency_ids.clear();
            self.check_trigger(&mut trigger)?;
            let (id, kind) = (trigger.id, trigger.flags.entity_kind());
            self.state.triggers.insert(trigger);
            self.created(kind, id);
            ids.push(id);
        }
        self.propagate_triggers(&ids)?;
        Ok(ids)
    }

    pub(crate) fn update_triggers(
        &mut self,
        triggers: Vec<TriggerRecord>,
    ) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(triggers.len());
        for mut trigger in triggers {
            let existing = self
                .state
                .triggers
                .get(trigger.id)
                .cloned()
                .ok_or(StoreError::not_found(EntityKind::Trigger, trigger.id))?;
            trigger.flags = existing.flags;
            trigger.template_id = existing.template_id;
            trigger.dependency_ids = existing.dependency_ids.clone();
            self.check_trigger(&mut trigger)?;
            ids.push(trigger.id);
            if trigger != existing {
                let kind = trigger.flags.entity_kind();
                self.state.triggers.insert(trigger);
                self.updated(kind, existing.id);
            }
        }
        self.propagate_triggers(&ids)?;
        Ok(ids)
    }

    fn propagate_triggers(&mut self, ids: &[EntityId]) -> StoreResult<()> {
        let mut by_template: BTreeMap<EntityId, Vec<EntityId>> = BTreeMap::new();
        for id in ids {
            let Some(trigger) = self.state.triggers.get(*id) else {
                continue;
            };
            for host_id in &trigger.host_ids {
                if self
                    .state
                    .hosts
                    .get(*host_id)
                    .is_some_and(|h| h.kind == HostKind::Template)
                {
                    by_template.entry(*host_id).or_default().push(*id);
                }
            }
        }
        for (template_id, triggers) in by_template {
            let selection = super::inherit::Selection {
                triggers,
                ..Default::default()
            };
            self.propagate(template_id, &selection)?;
        }
        Ok(())
    }

    pub(crate) fn set_trigger_dependencies(
        &mut self,
        dependencies: &[(EntityId, Vec<EntityId>)],
    ) -> StoreResult<()> {
        for (down, ups) in dependencies {
            let trigger = self
                .state
                .triggers
                .get(*down)
                .cloned()
                .ok_or(StoreError::not_found(EntityKind::Trigger, *down))?;
            for host_id in &trigger.host_ids {
                self.writable_host(*host_id)?;
            }
            let mut deduped = Vec::with_capacity(ups.len());
            for up in ups {
                if *up == *down {
                    return Err(StoreError::constraint(format!(
                        "Cannot create dependency on trigger \"{}\" itself.",
                        trigger.description
                    )));
                }
                let target = self
                    .state
                    .triggers
                    .get(*up)
                    .ok_or(StoreError::not_found(EntityKind::Trigger, *up))?;
                if trigger.flags == TriggerFlags::Normal && target.flags == TriggerFlags::Prototype
                {
                    return Err(StoreError::constraint(format!(
                        "Trigger \"{}\" cannot depend on trigger prototype \"{}\".",
                        trigger.description, target.description
                    )));
                }
                if !deduped.contains(up) {
                    deduped.push(*up);
                }
            }
            if trigger.dependency_ids != deduped {
                if let Some(row) = self.state.triggers.get_mut(*down) {
                    row.dependency_ids = deduped;
                }
                self.updated(trigger.flags.entity_kind(), *down);
            }
        }
        for (down, _) in dependencies {
            self.check_dependency_cycle(*down)?;
        }
        for (down, _) in dependencies {
            self.propagate_dependencies(*down)?;
        }
        Ok(())
    }

    pub(crate) fn check_dependency_cycle(&self, start: EntityId) -> StoreResult<()> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<EntityId> = self
            .state
            .triggers
            .get(start)
            .map(|t| t.dependency_ids.clone())
            .unwrap_or_default();
        while let Some(id) = pending.pop() {
            if id == start {
                let description = self
                    .state
                    .triggers
                    .get(start)
                    .map(|t| t.description.clone())
                    .unwrap_or_default();
                return Err(StoreError::constraint(format!(
                    "Cannot create circular dependencies on trigger \"{description}\"."
                )));
            }
            if seen.insert(id) {
                if let Some(trigger) = self.state.triggers.get(id) {
                    pending.extend(trigger.dependency_ids.iter().copied());
                }
            }
        }
        Ok(())
    }

    // Graphs and graph prototypes.

    /// Validates a graph and fills in its host ids.
    pub(crate) fn check_graph(&self, graph: &mut GraphRecord) -> StoreResult<()> {
        let kind = graph.flags.entity_kind();
        if graph.name.trim().is_empty() {
            return Err(StoreError::constraint(format!("Empty {kind} name.")));
        }
        if graph.items.is_empty() {
            return Err(StoreError::constraint(format!(
                "Missing items for {} \"{}\".",
                kind, graph.name
            )));
        }
        let mut has_prototype = false;
        for gitem in &graph.items {
            let item = self
                .state
                .items
                .get(gitem.item_id)
                .ok_or(StoreError::not_found(EntityKind::Item, gitem.item_id))?;
            match (graph.flags, item.flags) {
                (_, ItemFlags::DiscoveryRule) | (GraphFlags::Normal, ItemFlags::Prototype) => {
                    return Err(StoreError::constraint(format!(
                        "{} \"{}\" cannot chart \"{}\".",
                        kind, graph.name, item.key
                    )));
                }
                (GraphFlags::Prototype, ItemFlags::Prototype) => has_prototype = true,
                _ => {}
            }
        }
        if graph.flags == GraphFlags::Prototype && !has_prototype {
            return Err(StoreError::constraint(format!(
                "Graph prototype \"{}\" must have at least one item prototype.",
                graph.name
            )));
        }
        for axis_item in [graph.ymin_item_id, graph.ymax_item_id].into_iter().flatten() {
            if !self.state.items.contains(axis_item) {
                return Err(StoreError::not_found(EntityKind::Item, axis_item));
            }
        }
        let host_ids = self.state.graph_hosts(graph);
        for host_id in &host_ids {
            let host = self.writable_host(*host_id)?;
            if self.state.graphs.values().any(|g| {
                g.id != graph.id && g.name == graph.name && g.host_ids.contains(host_id)
            }) {
                return Err(StoreError::duplicate_on(kind, graph.name.clone(), &host.host));
            }
        }
        graph.host_ids = host_ids;
        Ok(())
    }

    pub(crate) fn create_graphs(&mut self, graphs: Vec<GraphRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(graphs.len());
        for mut graph in graphs {
            graph.id = self.allocate();
            graph.template_id = None;
            self.check_graph(&mut graph)?;
            let (id, kind) = (graph.id, graph.flags.entity_kind());
            self.state.graphs.insert(graph);
            self.created(kind, id);
            ids.push(id);
        }
        self.propagate_graphs(&ids)?;
        Ok(ids)
    }

    pub(crate) fn update_graphs(&mut self, graphs: Vec<GraphRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(graphs.len());
        for mut graph in graphs {
            let existing = self
                .state
                .graphs
                .get(graph.id)
                .cloned()
                .ok_or(StoreError::not_found(EntityKind::Graph, graph.id))?;
            graph.flags = existing.flags;
            graph.template_id = existing.template_id;
            self.check_graph(&mut graph)?;
            ids.push(graph.id);
            if graph != existing {
                let kind = graph.flags.entity_kind();
                self.state.graphs.insert(graph);
                self.updated(kind, existing.id);
            }
        }
        self.propagate_graphs(&ids)?;
        Ok(ids)
    }

    fn propagate_graphs(&mut self, ids: &[EntityId]) -> StoreResult<()> {
        let mut by_template: BTreeMap<EntityId, Vec<EntityId>> = BTreeMap::new();
        for id in ids {
            let Some(graph) = self.state.graphs.get(*id) else {
                continue;
            };
            for host_id in &graph.host_ids {
                if self
                    .state
                    .hosts
                    .get(*host_id)
                    .is_some_and(|h| h.kind == HostKind::Template)
                {
                    by_template.entry(*host_id).or_default().push(*id);
                }
            }
        }
        for (template_id, graphs) in by_template {
            let selection = super::inherit::Selection {
                graphs,
                ..Default::default()
            };
            self.propagate(template_id, &selection)?;
        }
        Ok(())
    }

    // Host prototypes.

    pub(crate) fn check_host_prototype(&self, prototype: &HostPrototypeRecord) -> StoreResult<()> {
        let rule = self
            .state
            .items
            .get(prototype.rule_id)
            .filter(|r| r.flags == ItemFlags::DiscoveryRule)
            .ok_or(StoreError::not_found(
                EntityKind::DiscoveryRule,
                prototype.rule_id,
            ))?;
        self.writable_host(rule.host_id)?;
        if prototype.host.trim().is_empty() {
            return Err(StoreError::constraint(format!(
                "Empty host prototype name for discovery rule \"{}\".",
                rule.key
            )));
        }
        if self.state.host_prototypes.values().any(|p| {
            p.id != prototype.id && p.rule_id == prototype.rule_id && p.host == prototype.host
        }) {
            return Err(StoreError::Duplicate {
                kind: EntityKind::HostPrototype,
                key: prototype.host.clone(),
                scope: format!(" in discovery rule \"{}\"", rule.key),
            });
        }
        for group_id in &prototype.group_ids {
            if !self.state.groups.contains(*group_id) {
                return Err(StoreError::not_found(EntityKind::Group, *group_id));
            }
        }
        for template_id in &prototype.template_ids {
            if !self
                .state
                .hosts
                .get(*template_id)
                .is_some_and(|t| t.kind == HostKind::Template)
            {
                return Err(StoreError::not_found(EntityKind::Template, *template_id));
            }
        }
        Ok(())
    }

    pub(crate) fn create_host_prototypes(
        &mut self,
        prototypes: Vec<HostPrototypeRecord>,
    ) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(prototypes.len());
        for mut prototype in prototypes {
            prototype.id = self.allocate();
            prototype.template_id = None;
            self.check_host_prototype(&prototype)?;
            let id = prototype.id;
            self.state.host_prototypes.insert(prototype);
            self.created(EntityKind::HostPrototype, id);
            ids.push(id);
        }
        self.propagate_rows(
            &ids,
            |s, id| {
                s.host_prototypes
                    .get(id)
                    .and_then(|p| s.host_prototype_owner(p))
            },
            |sel, id| sel.host_prototypes.push(id),
        )?;
        Ok(ids)
    }

    pub(crate) fn update_host_prototypes(
        &mut self,
        prototypes: Vec<HostPrototypeRecord>,
    ) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(prototypes.len());
        for mut prototype in prototypes {
            let existing = self
                .state
                .host_prototypes
                .get(prototype.id)
                .cloned()
                .ok_or(StoreError::not_found(EntityKind::HostPrototype, prototype.id))?;
            prototype.rule_id = existing.rule_id;
            prototype.template_id = existing.template_id;
            self.check_host_prototype(&prototype)?;
            ids.push(prototype.id);
            if prototype != existing {
                self.state.host_prototypes.insert(prototype);
                self.updated(EntityKind::HostPrototype, existing.id);
            }
        }
        self.propagate_rows(
            &ids,
            |s, id| {
                s.host_prototypes
                    .get(id)
                    .and_then(|p| s.host_prototype_owner(p))
            },
            |sel, id| sel.host_prototypes.push(id),
        )?;
        Ok(ids)
    }

    // Images.

    fn check_image(&self, image: &ImageRecord) -> StoreResult<()> {
        if image.name.trim().is_empty() {
            return Err(StoreError::constraint("Image name cannot be empty."));
        }
        if image.encoded_image.is_empty() {
            return Err(StoreError::constraint(format!(
                "Image \"{}\" has no data.",
                image.name
            )));
        }
        if self
            .state
            .images
            .values()
            .any(|i| i.id != image.id && i.name == image.name)
        {
            return Err(StoreError::duplicate(EntityKind::Image, image.name.clone()));
        }
        Ok(())
    }

    pub(crate) fn create_images(&mut self, images: Vec<ImageRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(images.len());
        for mut image in images {
            image.id = self.allocate();
            self.check_image(&image)?;
            let id = image.id;
            self.state.images.insert(image);
            self.created(EntityKind::Image, id);
            ids.push(id);
        }
        Ok(ids)
    }

    pub(crate) fn update_images(&mut self, images: Vec<ImageRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(images.len());
        for mut image in images {
            let existing = self
                .state
                .images
                .get(image.id)
                .cloned()
                .ok_or(StoreError::not_found(EntityKind::Image, image.id))?;
            image.image_type = existing.image_type;
            self.check_image(&image)?;
            ids.push(image.id);
            if image != existing {
                self.state.images.insert(image);
                self.updated(EntityKind::Image, existing.id);
            }
        }
        Ok(ids)
    }

    // Maps.

    fn check_map(&self, map: &MapRecord) -> StoreResult<()> {
        if map.name.trim().is_empty() {
            return Err(StoreError::constraint("Map name cannot be empty."));
        }
        if self
            .state
            .maps
            .values()
            .any(|m| m.id != map.id && m.name == map.name)
        {
            return Err(StoreError::duplicate(EntityKind::Map, map.name.clone()));
        }
        for image_id in map.background_id.iter().chain(
            map.elements
                .iter()
                .flat_map(|e| e.icon_off_id.iter().chain(e.icon_on_id.iter())),
        ) {
            if !self.state.images.contains(*image_id) {
                return Err(StoreError::not_found(EntityKind::Image, *image_id));
            }
        }
        if let Some(iconmap_id) = map.iconmap_id {
            if !self.state.icon_maps.contains(iconmap_id) {
                return Err(StoreError::not_found(EntityKind::IconMap, iconmap_id));
            }
        }
        let mut element_ids = BTreeSet::new();
        for element in &map.elements {
            if !element_ids.insert(element.selementid.as_str()) {
                return Err(StoreError::constraint(format!(
                    "Map \"{}\" has duplicate element id \"{}\".",
                    map.name, element.selementid
                )));
            }
            let exists = match element.target {
                ElementTarget::Host(id) => self.state.hosts.contains(id),
                ElementTarget::HostGroup(id) => self.state.groups.contains(id),
                ElementTarget::Trigger(id) => self.state.triggers.contains(id),
                ElementTarget::Map(id) => self.state.maps.contains(id),
                ElementTarget::Image => true,
            };
            if !exists {
                return Err(StoreError::constraint(format!(
                    "Element \"{}\" of map \"{}\" points at a missing object.",
                    element.selementid, map.name
                )));
            }
        }
        for link in &map.links {
            for end in [&link.selementid1, &link.selementid2] {
                if !element_ids.contains(end.as_str()) {
                    return Err(StoreError::constraint(format!(
                        "Link of map \"{}\" points at unknown element \"{}\".",
                        map.name, end
                    )));
                }
            }
            for link_trigger in &link.triggers {
                if !self.state.triggers.contains(link_trigger.trigger_id) {
                    return Err(StoreError::not_found(
                        EntityKind::Trigger,
                        link_trigger.trigger_id,
                    ));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn create_maps(&mut self, maps: Vec<MapRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(maps.len());
        for mut map in maps {
            map.id = self.allocate();
            self.check_map(&map)?;
            let id = map.id;
            self.state.maps.insert(map);
            self.created(EntityKind::Map, id);
            ids.push(id);
        }
        Ok(ids)
    }

    pub(crate) fn update_maps(&mut self, maps: Vec<MapRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(maps.len());
        for map in maps {
            let existing = self
                .state
                .maps
                .get(map.id)
                .cloned()
                .ok_or(StoreError::not_found(EntityKind::Map, map.id))?;
            self.check_map(&map)?;
            ids.push(map.id);
            if map != existing {
                self.state.maps.insert(map);
                self.updated(EntityKind::Map, existing.id);
            }
        }
        Ok(ids)
    }

    // Screens and template screens.

    fn check_screen(&self, screen: &ScreenRecord) -> StoreResult<()> {
        let kind = screen_kind(screen);
        if screen.name.trim().is_empty() {
            return Err(StoreError::constraint(format!("Empty {kind} name.")));
        }
        if let Some(template_id) = screen.template_id {
            let template = self.writable_host(template_id)?;
            if template.kind != HostKind::Template {
                return Err(StoreError::not_found(EntityKind::Template, template_id));
            }
        }
        if self.state.screens.values().any(|s| {
            s.id != screen.id && s.name == screen.name && s.template_id == screen.template_id
        }) {
            return Err(match screen.template_id {
                Some(template_id) => StoreError::duplicate_on(
                    kind,
                    screen.name.clone(),
                    &self.state.host_name(template_id),
                ),
                None => StoreError::duplicate(kind, screen.name.clone()),
            });
        }
        for cell in &screen.items {
            if cell.x >= screen.hsize || cell.y >= screen.vsize {
                return Err(StoreError::constraint(format!(
                    "Cell ({}, {}) of {} \"{}\" is outside of the screen.",
                    cell.x, cell.y, kind, screen.name
                )));
            }
            self.check_resource(screen, &cell.resource)?;
        }
        Ok(())
    }

    fn check_resource(&self, screen: &ScreenRecord, resource: &ResourceRecord) -> StoreResult<()> {
        let item_on_owner = |id: EntityId| -> StoreResult<()> {
            let item = self
                .state
                .items
                .get(id)
                .ok_or(StoreError::not_found(EntityKind::Item, id))?;
            match screen.template_id {
                Some(owner) if item.host_id != owner => Err(StoreError::constraint(format!(
                    "Template screen \"{}\" cannot show \"{}\" of another host.",
                    screen.name, item.key
                ))),
                _ => Ok(()),
            }
        };
        let graph_on_owner = |id: EntityId| -> StoreResult<()> {
            let graph = self
                .state
                .graphs
                .get(id)
                .ok_or(StoreError::not_found(EntityKind::Graph, id))?;
            match screen.template_id {
                Some(owner) if !graph.host_ids.contains(&owner) => {
                    Err(StoreError::constraint(format!(
                        "Template screen \"{}\" cannot show graph \"{}\" of another host.",
                        screen.name, graph.name
                    )))
                }
                _ => Ok(()),
            }
        };
        let exists = |found: bool, kind: EntityKind, id: EntityId| -> StoreResult<()> {
            if found {
                Ok(())
            } else {
                Err(StoreError::not_found(kind, id))
            }
        };
        let global_only = |allowed: bool| -> StoreResult<()> {
            if screen.template_id.is_some() && !allowed {
                Err(StoreError::constraint(format!(
                    "Resource type is not allowed for template screen \"{}\".",
                    screen.name
                )))
            } else {
                Ok(())
            }
        };
        match resource {
            ResourceRecord::Graph(id) | ResourceRecord::LldGraph(id) => graph_on_owner(*id),
            ResourceRecord::SimpleGraph(id)
            | ResourceRecord::PlainText(id)
            | ResourceRecord::LldSimpleGraph(id) => item_on_owner(*id),
            ResourceRecord::Map(id) => {
                global_only(false)?;
                exists(self.state.maps.contains(*id), EntityKind::Map, *id)
            }
            ResourceRecord::Screen(id) => {
                global_only(false)?;
                if *id == screen.id {
                    return Err(StoreError::constraint(format!(
                        "Cannot add screen \"{}\" into itself.",
                        screen.name
                    )));
                }
                exists(self.state.screens.contains(*id), EntityKind::Screen, *id)
            }
            ResourceRecord::HostTriggers(id) => {
                global_only(false)?;
                exists(self.state.hosts.contains(*id), EntityKind::Host, *id)
            }
            ResourceRecord::HostGroupTriggers(id)
            | ResourceRecord::HostsInfo(id)
            | ResourceRecord::TriggersInfo(id)
            | ResourceRecord::TriggersOverview(id)
            | ResourceRecord::DataOverview(id) => {
                global_only(false)?;
                exists(self.state.groups.contains(*id), EntityKind::Group, *id)
            }
            ResourceRecord::Clock | ResourceRecord::Url(_) => Ok(()),
            ResourceRecord::ServerInfo
            | ResourceRecord::SystemStatus
            | ResourceRecord::ActionLog
            | ResourceRecord::Events => global_only(false),
        }
    }

    pub(crate) fn create_screens(&mut self, screens: Vec<ScreenRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(screens.len());
        for mut screen in screens {
            screen.id = self.allocate();
            self.check_screen(&screen)?;
            let (id, kind) = (screen.id, screen_kind(&screen));
            self.state.screens.insert(screen);
            self.created(kind, id);
            ids.push(id);
        }
        Ok(ids)
    }

    pub(crate) fn update_screens(&mut self, screens: Vec<ScreenRecord>) -> StoreResult<Vec<EntityId>> {
        let mut ids = Vec::with_capacity(screens.len());
        for mut screen in screens {
            let existing = self
                .state
                .screens
                .get(screen.id)
                .cloned()
                .ok_or(StoreError::not_found(EntityKind::Screen, screen.id))?;
            screen.template_id = existing.template_id;
            self.check_screen(&screen)?;
            ids.push(screen.id);
            if screen != existing {
                let kind = screen_kind(&screen);
                self.state.screens.insert(screen);
                self.updated(kind, existing.id);
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::record::{GraphItemRecord, InterfaceRecord, MacroRecord};
    use reconf_model::{GraphItemStyle, GraphSettings, HostStatus, InterfaceType, ItemSettings};

    pub(crate) fn host_record(name: &str, kind: HostKind, group: EntityId) -> HostRecord {
        HostRecord {
            id: EntityId::default(),
            host: name.to_string(),
            name: name.to_string(),
            kind,
            status: HostStatus::Monitored,
            description: None,
            group_ids: vec![group],
            template_ids: Vec::new(),
            proxy_id: None,
            macros: Vec::new(),
            interfaces: Vec::new(),
        }
    }

    pub(crate) fn item_record(host_id: EntityId, key: &str, flags: ItemFlags) -> ItemRecord {
        ItemRecord {
            id: EntityId::default(),
            host_id,
            key: key.to_string(),
            flags,
            settings: ItemSettings {
                name: key.to_string(),
                ..ItemSettings::default()
            },
            template_id: None,
            rule_id: None,
            application_ids: Vec::new(),
            valuemap_id: None,
            interface_id: None,
            master_item_id: None,
            filter: None,
            lifetime: None,
        }
    }

    pub(crate) fn trigger_record(description: &str, expression: &str) -> TriggerRecord {
        TriggerRecord {
            id: EntityId::default(),
            description: description.to_string(),
            expression: expression.to_string(),
            flags: TriggerFlags::Normal,
            settings: Default::default(),
            template_id: None,
            dependency_ids: Vec::new(),
            host_ids: Vec::new(),
        }
    }

    pub(crate) fn graph_record(name: &str, items: &[EntityId]) -> GraphRecord {
        GraphRecord {
            id: EntityId::default(),
            name: name.to_string(),
            flags: GraphFlags::Normal,
            settings: GraphSettings::default(),
            template_id: None,
            ymin_item_id: None,
            ymax_item_id: None,
            items: items
                .iter()
                .map(|id| GraphItemRecord {
                    item_id: *id,
                    style: GraphItemStyle::default(),
                })
                .collect(),
            host_ids: Vec::new(),
        }
    }

    /// A draft with one group and one host `web1` that has an agent interface.
    pub(crate) fn draft_with_host() -> (Draft, EntityId, EntityId) {
        let mut draft = Draft::new(StoreState::default());
        let group = draft
            .create_groups(vec![GroupRecord {
                id: EntityId::default(),
                name: "Linux servers".to_string(),
            }])
            .unwrap()[0];
        let mut host = host_record("web1", HostKind::Host, group);
        host.interfaces.push(InterfaceRecord {
            id: None,
            interface_type: InterfaceType::Agent,
            main: true,
            use_ip: true,
            ip: "10.0.0.1".to_string(),
            dns: String::new(),
            port: "10050".to_string(),
        });
        let host_id = draft.create_hosts(vec![host]).unwrap()[0];
        (draft, group, host_id)
    }

    #[test]
    fn host_names_are_unique_across_kinds() {
        let (mut draft, group, _) = draft_with_host();
        let err = draft
            .create_hosts(vec![host_record("web1", HostKind::Template, group)])
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { kind: EntityKind::Template, .. }));
    }

    #[test]
    fn hosts_need_a_group() {
        let (mut draft, _, _) = draft_with_host();
        let mut host = host_record("web2", HostKind::Host, EntityId::new(1));
        host.group_ids.clear();
        assert!(matches!(
            draft.create_hosts(vec![host]),
            Err(StoreError::Constraint { .. })
        ));
    }

    #[test]
    fn new_macros_and_interfaces_get_ids() {
        let (mut draft, _, host_id) = draft_with_host();
        let mut host = draft.state.hosts.get(host_id).unwrap().clone();
        host.macros.push(MacroRecord {
            id: None,
            name: "{$PORT}".to_string(),
            value: "80".to_string(),
        });
        draft.update_hosts(vec![host]).unwrap();
        let stored = draft.state.hosts.get(host_id).unwrap();
        assert!(stored.macros[0].id.is_some());
        assert!(stored.interfaces[0].id.is_some());
    }

    #[test]
    fn item_keys_are_unique_per_host_across_flags() {
        let (mut draft, _, host_id) = draft_with_host();
        draft
            .create_items(vec![item_record(host_id, "vfs.fs.discovery", ItemFlags::DiscoveryRule)])
            .unwrap();
        let err = draft
            .create_items(vec![item_record(host_id, "vfs.fs.discovery", ItemFlags::Normal)])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "discovery rule \"vfs.fs.discovery\" already exists on \"web1\""
        );
    }

    #[test]
    fn prototypes_need_a_rule_on_the_same_host() {
        let (mut draft, _, host_id) = draft_with_host();
        let prototype = item_record(host_id, "vfs.fs.size[{#FSNAME}]", ItemFlags::Prototype);
        assert!(draft.create_items(vec![prototype.clone()]).is_err());
        let rule = draft
            .create_items(vec![item_record(host_id, "vfs.fs.discovery", ItemFlags::DiscoveryRule)])
            .unwrap()[0];
        let mut prototype = prototype;
        prototype.rule_id = Some(rule);
        assert!(draft.create_items(vec![prototype]).is_ok());
    }

    #[test]
    fn dependent_item_chain_is_limited() {
        let (mut draft, _, host_id) = draft_with_host();
        let mut master = draft
            .create_items(vec![item_record(host_id, "master", ItemFlags::Normal)])
            .unwrap()[0];
        for level in 1..=MAX_DEPENDENCY_LEVELS {
            let mut dependent = item_record(host_id, &format!("dep{level}"), ItemFlags::Normal);
            dependent.settings.item_type = ItemType::Dependent;
            dependent.master_item_id = Some(master);
            master = draft.create_items(vec![dependent]).unwrap()[0];
        }
        let mut too_deep = item_record(host_id, "too.deep", ItemFlags::Normal);
        too_deep.settings.item_type = ItemType::Dependent;
        too_deep.master_item_id = Some(master);
        let err = draft.create_items(vec![too_deep]).unwrap_err();
        assert!(err.to_string().contains("maximum number of dependency levels"));
    }

    #[test]
    fn trigger_expression_must_name_existing_items() {
        let (mut draft, _, host_id) = draft_with_host();
        let err = draft
            .create_triggers(vec![trigger_record("down", "{web1:agent.ping.nodata(5m)}=1")])
            .unwrap_err();
        assert!(err.to_string().contains("Incorrect item key \"agent.ping\""));
        draft
            .create_items(vec![item_record(host_id, "agent.ping", ItemFlags::Normal)])
            .unwrap();
        let id = draft
            .create_triggers(vec![trigger_record("down", "{web1:agent.ping.nodata(5m)}=1")])
            .unwrap()[0];
        assert_eq!(draft.state.triggers.get(id).unwrap().host_ids, vec![host_id]);
    }

    #[test]
    fn trigger_prototype_needs_an_item_prototype() {
        let (mut draft, _, host_id) = draft_with_host();
        draft
            .create_items(vec![item_record(host_id, "agent.ping", ItemFlags::Normal)])
            .unwrap();
        let mut prototype = trigger_record("down", "{web1:agent.ping.nodata(5m)}=1");
        prototype.flags = TriggerFlags::Prototype;
        let err = draft.create_triggers(vec![prototype]).unwrap_err();
        assert!(err.to_string().contains("at least one item prototype"));
    }

    #[test]
    fn dependency_cycles_are_rejected_and_nothing_is_written() {
        let (mut draft, _, host_id) = draft_with_host();
        draft
            .create_items(vec![item_record(host_id, "agent.ping", ItemFlags::Normal)])
            .unwrap();
        let ids = draft
            .create_triggers(vec![
                trigger_record("t1", "{web1:agent.ping.nodata(5m)}=1"),
                trigger_record("t2", "{web1:agent.ping.nodata(10m)}=1"),
            ])
            .unwrap();
        draft.set_trigger_dependencies(&[(ids[0], vec![ids[1]])]).unwrap();
        let err = draft
            .set_trigger_dependencies(&[(ids[1], vec![ids[0]])])
            .unwrap_err();
        assert!(err.to_string().contains("circular"));
        let err = draft
            .set_trigger_dependencies(&[(ids[0], vec![ids[0]])])
            .unwrap_err();
        assert!(err.to_string().contains("itself"));
    }

    #[test]
    fn graph_names_are_unique_per_host() {
        let (mut draft, _, host_id) = draft_with_host();
        let item = draft
            .create_items(vec![item_record(host_id, "system.cpu.load", ItemFlags::Normal)])
            .unwrap()[0];
        let id = draft.create_graphs(vec![graph_record("CPU", &[item])]).unwrap()[0];
        assert_eq!(draft.state.graphs.get(id).unwrap().host_ids, vec![host_id]);
        assert!(draft.create_graphs(vec![graph_record("CPU", &[item])]).is_err());
        assert!(draft.create_graphs(vec![graph_record("Empty", &[])]).is_err());
    }

    #[test]
    fn read_only_hosts_reject_writes() {
        let (mut draft, _, host_id) = draft_with_host();
        draft.state.read_only.insert(host_id);
        let err = draft
            .create_items(vec![item_record(host_id, "agent.ping", ItemFlags::Normal)])
            .unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { id, .. } if id == host_id));
    }

    #[test]
    fn renaming_a_host_rewrites_expressions() {
        let (mut draft, _, host_id) = draft_with_host();
        draft
            .create_items(vec![item_record(host_id, "agent.ping", ItemFlags::Normal)])
            .unwrap();
        let trigger = draft
            .create_triggers(vec![trigger_record("down", "{web1:agent.ping.nodata(5m)}=1")])
            .unwrap()[0];
        let mut host = draft.state.hosts.get(host_id).unwrap().clone();
        host.host = "web-01".to_string();
        draft.update_hosts(vec![host]).unwrap();
        assert_eq!(
            draft.state.triggers.get(trigger).unwrap().expression,
            "{web-01:agent.ping.nodata(5m)}=1"
        );
    }
}
