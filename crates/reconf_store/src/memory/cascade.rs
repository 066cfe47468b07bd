//! Deletes and the rows they drag along.

use super::draft::Draft;
use crate::error::{StoreError, StoreResult};
use crate::record::{ElementTarget, ResourceRecord};
use crate::table::{Record, Table};
use reconf_model::{EntityId, EntityKind};
use std::collections::BTreeSet;

/// `ids` plus every row inherited from them, directly or transitively.
fn with_inherited<T: Record>(
    table: &Table<T>,
    ids: &[EntityId],
    parent: impl Fn(&T) -> Option<EntityId>,
) -> BTreeSet<EntityId> {
    let mut all: BTreeSet<EntityId> = ids.iter().copied().collect();
    loop {
        let before = all.len();
        let found = table.ids_where(|row| parent(row).is_some_and(|p| all.contains(&p)));
        all.extend(found);
        if all.len() == before {
            return all;
        }
    }
}

fn templated(kind: EntityKind, name: &str) -> StoreError {
    StoreError::invalid_operation(format!("Cannot delete templated {kind} \"{name}\"."))
}

impl Draft {
    pub(crate) fn delete_applications(&mut self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>> {
        for id in ids {
            let app = self
                .state
                .applications
                .get(*id)
                .ok_or(StoreError::not_found(EntityKind::Application, *id))?;
            self.writable_host(app.host_id)?;
            if app.template_id.is_some() {
                return Err(templated(EntityKind::Application, &app.name));
            }
        }
        let doomed = with_inherited(&self.state.applications, ids, |a| a.template_id);
        for item in self.state.items.values_mut() {
            item.application_ids.retain(|id| !doomed.contains(id));
        }
        for id in doomed {
            self.state.applications.remove(id);
            self.deleted(EntityKind::Application, id);
        }
        Ok(ids.to_vec())
    }

    /// Deletes items, discovery rules and prototypes. Dependent items,
    /// prototypes of deleted rules, host prototypes, and triggers and graphs
    /// using any of them go too.
    pub(crate) fn delete_items(&mut self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>> {
        for id in ids {
            let item = self
                .state
                .items
                .get(*id)
                .ok_or(StoreError::not_found(EntityKind::Item, *id))?;
            self.writable_host(item.host_id)?;
            if item.template_id.is_some() {
                return Err(templated(item.flags.entity_kind(), &item.key));
            }
        }
        let mut doomed: BTreeSet<EntityId> = ids.iter().copied().collect();
        loop {
            let found = self.state.items.ids_where(|i| {
                !doomed.contains(&i.id)
                    && [i.template_id, i.master_item_id, i.rule_id]
                        .into_iter()
                        .flatten()
                        .any(|p| doomed.contains(&p))
            });
            if found.is_empty() {
                break;
            }
            doomed.extend(found);
        }

        let host_prototypes = self
            .state
            .host_prototypes
            .ids_where(|p| doomed.contains(&p.rule_id));
        self.remove_host_prototypes(host_prototypes);

        let triggers = self.state.triggers.ids_where(|t| {
            self.state
                .trigger_item_ids(t)
                .iter()
                .any(|id| doomed.contains(id))
        });
        self.remove_triggers(&triggers);

        let graphs = self
            .state
            .graphs
            .ids_where(|g| g.items.iter().any(|gi| doomed.contains(&gi.item_id)));
        self.remove_graphs(&graphs);
        for graph in self.state.graphs.values_mut() {
            if graph.ymin_item_id.is_some_and(|id| doomed.contains(&id)) {
                graph.ymin_item_id = None;
            }
            if graph.ymax_item_id.is_some_and(|id| doomed.contains(&id)) {
                graph.ymax_item_id = None;
            }
        }

        self.strip_screen_cells(|resource| match resource {
            ResourceRecord::SimpleGraph(id)
            | ResourceRecord::PlainText(id)
            | ResourceRecord::LldSimpleGraph(id) => doomed.contains(id),
            _ => false,
        });

        for id in doomed {
            if let Some(item) = self.state.items.remove(id) {
                self.deleted(item.flags.entity_kind(), id);
            }
        }
        Ok(ids.to_vec())
    }

    pub(crate) fn delete_triggers(&mut self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>> {
        for id in ids {
            let trigger = self
                .state
                .triggers
                .get(*id)
                .ok_or(StoreError::not_found(EntityKind::Trigger, *id))?;
            for host_id in &trigger.host_ids {
                self.writable_host(*host_id)?;
            }
            if trigger.template_id.is_some() {
                return Err(templated(trigger.flags.entity_kind(), &trigger.description));
            }
        }
        self.remove_triggers(ids);
        Ok(ids.to_vec())
    }

    fn remove_triggers(&mut self, ids: &[EntityId]) {
        if ids.is_empty() {
            return;
        }
        let doomed = with_inherited(&self.state.triggers, ids, |t| t.template_id);
        for trigger in self.state.triggers.values_mut() {
            trigger.dependency_ids.retain(|id| !doomed.contains(id));
        }
        for map in self.state.maps.values_mut() {
            for link in &mut map.links {
                link.triggers.retain(|lt| !doomed.contains(&lt.trigger_id));
            }
            let gone: BTreeSet<String> = map
                .elements
                .iter()
                .filter(|e| matches!(e.target, ElementTarget::Trigger(id) if doomed.contains(&id)))
                .map(|e| e.selementid.clone())
                .collect();
            if !gone.is_empty() {
                map.elements.retain(|e| !gone.contains(&e.selementid));
                map.links.retain(|l| {
                    !gone.contains(&l.selementid1) && !gone.contains(&l.selementid2)
                });
            }
        }
        for id in doomed {
            if let Some(trigger) = self.state.triggers.remove(id) {
                self.deleted(trigger.flags.entity_kind(), id);
            }
        }
    }

    pub(crate) fn delete_graphs(&mut self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>> {
        for id in ids {
            let graph = self
                .state
                .graphs
                .get(*id)
                .ok_or(StoreError::not_found(EntityKind::Graph, *id))?;
            for host_id in &graph.host_ids {
                self.writable_host(*host_id)?;
            }
            if graph.template_id.is_some() {
                return Err(templated(graph.flags.entity_kind(), &graph.name));
            }
        }
        self.remove_graphs(ids);
        Ok(ids.to_vec())
    }

    fn remove_graphs(&mut self, ids: &[EntityId]) {
        if ids.is_empty() {
            return;
        }
        let doomed = with_inherited(&self.state.graphs, ids, |g| g.template_id);
        self.strip_screen_cells(|resource| match resource {
            ResourceRecord::Graph(id) | ResourceRecord::LldGraph(id) => doomed.contains(id),
            _ => false,
        });
        for id in doomed {
            if let Some(graph) = self.state.graphs.remove(id) {
                self.deleted(graph.flags.entity_kind(), id);
            }
        }
    }

    pub(crate) fn delete_host_prototypes(
        &mut self,
        ids: &[EntityId],
    ) -> StoreResult<Vec<EntityId>> {
        for id in ids {
            let prototype = self
                .state
                .host_prototypes
                .get(*id)
                .ok_or(StoreError::not_found(EntityKind::HostPrototype, *id))?;
            if let Some(owner) = self.state.host_prototype_owner(prototype) {
                self.writable_host(owner)?;
            }
            if prototype.template_id.is_some() {
                return Err(templated(EntityKind::HostPrototype, &prototype.host));
            }
        }
        let doomed = with_inherited(&self.state.host_prototypes, ids, |p| p.template_id);
        self.remove_host_prototypes(doomed.into_iter().collect());
        Ok(ids.to_vec())
    }

    fn remove_host_prototypes(&mut self, ids: Vec<EntityId>) {
        for id in ids {
            if self.state.host_prototypes.remove(id).is_some() {
                self.deleted(EntityKind::HostPrototype, id);
            }
        }
    }

    pub(crate) fn delete_screens(&mut self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>> {
        for id in ids {
            let screen = self
                .state
                .screens
                .get(*id)
                .ok_or(StoreError::not_found(EntityKind::Screen, *id))?;
            if let Some(template_id) = screen.template_id {
                self.writable_host(template_id)?;
            }
        }
        let doomed: BTreeSet<EntityId> = ids.iter().copied().collect();
        self.strip_screen_cells(|resource| {
            matches!(resource, ResourceRecord::Screen(id) if doomed.contains(id))
        });
        for id in doomed {
            if let Some(screen) = self.state.screens.remove(id) {
                let kind = if screen.template_id.is_some() {
                    EntityKind::TemplateScreen
                } else {
                    EntityKind::Screen
                };
                self.deleted(kind, id);
            }
        }
        Ok(ids.to_vec())
    }

    /// Drops screen cells whose resource matches `gone`.
    fn strip_screen_cells(&mut self, gone: impl Fn(&ResourceRecord) -> bool) {
        let affected = self
            .state
            .screens
            .ids_where(|s| s.items.iter().any(|cell| gone(&cell.resource)));
        for id in affected {
            let Some(screen) = self.state.screens.get_mut(id) else {
                continue;
            };
            screen.items.retain(|cell| !gone(&cell.resource));
            let kind = if screen.template_id.is_some() {
                EntityKind::TemplateScreen
            } else {
                EntityKind::Screen
            };
            self.updated(kind, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::StoreError;
    use crate::journal::Operation;
    use crate::memory::draft::tests::{
        draft_with_host, graph_record, host_record, item_record, trigger_record,
    };
    use crate::record::{HostKind, ItemFlags};
    use reconf_model::{EntityId, EntityKind, ItemType};

    #[test]
    fn deleting_an_item_takes_triggers_graphs_and_dependents() {
        let (mut draft, _, host) = draft_with_host();
        let ping = draft
            .create_items(vec![item_record(host, "agent.ping", ItemFlags::Normal)])
            .unwrap()[0];
        let mut dependent = item_record(host, "agent.ping.copy", ItemFlags::Normal);
        dependent.settings.item_type = ItemType::Dependent;
        dependent.master_item_id = Some(ping);
        let dependent = draft.create_items(vec![dependent]).unwrap()[0];
        let trigger = draft
            .create_triggers(vec![trigger_record("down", "{web1:agent.ping.nodata(5m)}=1")])
            .unwrap()[0];
        let graph = draft.create_graphs(vec![graph_record("Ping", &[ping])]).unwrap()[0];

        assert_eq!(draft.delete_items(&[ping]).unwrap(), vec![ping]);
        assert!(!draft.state.items.contains(dependent));
        assert!(!draft.state.triggers.contains(trigger));
        assert!(!draft.state.graphs.contains(graph));
    }

    #[test]
    fn deleting_a_rule_takes_its_prototypes() {
        let (mut draft, _, host) = draft_with_host();
        let rule = draft
            .create_items(vec![item_record(host, "net.if.discovery", ItemFlags::DiscoveryRule)])
            .unwrap()[0];
        let mut prototype = item_record(host, "net.if.in[{#IFNAME}]", ItemFlags::Prototype);
        prototype.rule_id = Some(rule);
        let prototype = draft.create_items(vec![prototype]).unwrap()[0];
        draft.delete_items(&[rule]).unwrap();
        assert!(!draft.state.items.contains(prototype));
        assert_eq!(
            draft.journal.count(EntityKind::ItemPrototype, Operation::Delete),
            1
        );
    }

    #[test]
    fn deleting_a_trigger_removes_edges_pointing_at_it() {
        let (mut draft, _, host) = draft_with_host();
        draft
            .create_items(vec![item_record(host, "agent.ping", ItemFlags::Normal)])
            .unwrap();
        let ids = draft
            .create_triggers(vec![
                trigger_record("t1", "{web1:agent.ping.nodata(5m)}=1"),
                trigger_record("t2", "{web1:agent.ping.nodata(10m)}=1"),
            ])
            .unwrap();
        draft.set_trigger_dependencies(&[(ids[0], vec![ids[1]])]).unwrap();
        draft.delete_triggers(&[ids[1]]).unwrap();
        assert!(draft.state.triggers.get(ids[0]).unwrap().dependency_ids.is_empty());
    }

    #[test]
    fn inherited_rows_cannot_be_deleted_directly() {
        let (mut draft, group, host) = draft_with_host();
        let template = draft
            .create_hosts(vec![host_record("Base", HostKind::Template, group)])
            .unwrap()[0];
        let mut record = draft.state.hosts.get(host).unwrap().clone();
        record.template_ids = vec![template];
        draft.update_hosts(vec![record]).unwrap();
        let source = draft
            .create_items(vec![item_record(template, "agent.ping", ItemFlags::Normal)])
            .unwrap()[0];
        let copy = draft.state.item_by_key(host, "agent.ping").unwrap().id;

        let err = draft.delete_items(&[copy]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperation { .. }));
        draft.delete_items(&[source]).unwrap();
        assert!(!draft.state.items.contains(copy));
    }

    #[test]
    fn missing_ids_are_reported() {
        let (mut draft, _, _) = draft_with_host();
        let missing = EntityId::new(999);
        assert!(matches!(
            draft.delete_graphs(&[missing]),
            Err(StoreError::NotFound { .. })
        ));
    }
}
