//! Delete-missing passes.
//!
//! Every pass only looks at rows owned by hosts and templates in the
//! processed scope, and never at inherited rows: those go away with the
//! template row they were copied from. Plain triggers and graphs spanning a
//! host outside the scope are kept. Trigger, graph and item prototypes of
//! processed hosts are deleted without that check, and host prototypes only
//! under discovery rules the snapshot declares.

use super::ImportContext;
use crate::error::ImportResult;
use crate::formatted::{Declared, FormattedSnapshot};
use reconf_model::{EntityId, EntityKind};
use reconf_store::{
    ApplicationQuery, ConfigStore, GraphFlags, GraphQuery, HostPrototypeQuery, HostQuery,
    ItemFlags, ItemQuery, ItemRecord, StoreResult, TriggerFlags, TriggerQuery,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Runs the passes whose policy asks for deletion. Returns false if none
/// does.
pub(super) fn delete_missing<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    formatted: &FormattedSnapshot<'_>,
) -> ImportResult<bool> {
    let options = ctx.options;
    let any = [
        options.discovery_rules,
        options.triggers,
        options.graphs,
        options.items,
        options.applications,
    ]
    .iter()
    .any(|p| p.delete_missing);
    if !any {
        return Ok(false);
    }

    let processed: Vec<EntityId> = ctx.scope.processed_ids().into_iter().collect();
    let names: BTreeMap<EntityId, String> = ctx
        .store
        .get_hosts(&HostQuery::new().ids(processed.iter().copied()))?
        .into_iter()
        .map(|h| (h.id, h.host))
        .collect();
    let scope = Scope {
        ids: processed,
        names,
        declared: formatted.declared(),
    };

    if options.discovery_rules.delete_missing {
        delete_rules(ctx, &scope)?;
        delete_prototypes(ctx, &scope)?;
    }
    if options.triggers.delete_missing {
        delete_triggers(ctx, &scope)?;
    }
    if options.graphs.delete_missing {
        delete_graphs(ctx, &scope)?;
    }
    if options.items.delete_missing {
        delete_items(ctx, &scope)?;
    }
    if options.applications.delete_missing {
        delete_applications(ctx, &scope)?;
    }
    Ok(true)
}

struct Scope<'d, 'a> {
    ids: Vec<EntityId>,
    names: BTreeMap<EntityId, String>,
    declared: &'d Declared<'a>,
}

impl Scope<'_, '_> {
    fn host(&self, id: EntityId) -> &str {
        self.names.get(&id).map_or("", String::as_str)
    }

    /// Own rows of processed hosts with the given role.
    fn items(&self, flags: ItemFlags) -> ItemQuery {
        ItemQuery::new()
            .hosts(self.ids.iter().copied())
            .flags([flags])
            .inherited(false)
    }

    /// Returns true if `name` is declared on any of `host_ids`.
    fn declares_graph(
        &self,
        set: &BTreeSet<(&str, &str)>,
        host_ids: &[EntityId],
        name: &str,
    ) -> bool {
        host_ids.iter().any(|h| set.contains(&(self.host(*h), name)))
    }
}

fn remove<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    kind: EntityKind,
    ids: Vec<EntityId>,
    delete: impl FnOnce(&S, &[EntityId]) -> StoreResult<Vec<EntityId>>,
) -> ImportResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let deleted = delete(ctx.store, &ids)?;
    debug!(%kind, count = deleted.len(), "deleted rows missing from the snapshot");
    ctx.report.deleted(kind, deleted.len());
    Ok(())
}

fn undeclared_items(
    scope: &Scope<'_, '_>,
    rows: Vec<ItemRecord>,
    set: &BTreeSet<(&str, &str)>,
) -> Vec<EntityId> {
    rows.into_iter()
        .filter(|row| !set.contains(&(scope.host(row.host_id), row.key.as_str())))
        .map(|row| row.id)
        .collect()
}

fn delete_rules<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    scope: &Scope<'_, '_>,
) -> ImportResult<()> {
    let rows = ctx.store.get_items(&scope.items(ItemFlags::DiscoveryRule))?;
    let stale = undeclared_items(scope, rows, &scope.declared.rules);
    remove(ctx, EntityKind::DiscoveryRule, stale, S::delete_items)
}

fn delete_prototypes<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    scope: &Scope<'_, '_>,
) -> ImportResult<()> {
    let declared = scope.declared;
    let rules = ctx.store.get_items(&scope.items(ItemFlags::DiscoveryRule))?;

    let declared_rules: BTreeMap<EntityId, (&str, &str)> = rules
        .iter()
        .filter(|r| declared.rules.contains(&(scope.host(r.host_id), r.key.as_str())))
        .map(|r| (r.id, (scope.host(r.host_id), r.key.as_str())))
        .collect();
    if !declared_rules.is_empty() {
        let query = HostPrototypeQuery::new()
            .rules(declared_rules.keys().copied())
            .inherited(false);
        let stale = ctx
            .store
            .get_host_prototypes(&query)?
            .into_iter()
            .filter(|p| {
                declared_rules.get(&p.rule_id).map_or(false, |(host, rule)| {
                    !declared
                        .host_prototypes
                        .contains(&(*host, *rule, p.host.as_str()))
                })
            })
            .map(|p| p.id)
            .collect();
        remove(ctx, EntityKind::HostPrototype, stale, S::delete_host_prototypes)?;
    }

    let query = TriggerQuery::new()
        .hosts(scope.ids.iter().copied())
        .flags([TriggerFlags::Prototype])
        .inherited(false);
    let stale = ctx
        .store
        .get_triggers(&query)?
        .into_iter()
        .filter(|t| {
            !declared
                .trigger_prototypes
                .contains(&(t.description.as_str(), t.expression.as_str()))
        })
        .map(|t| t.id)
        .collect();
    remove(ctx, EntityKind::TriggerPrototype, stale, S::delete_triggers)?;

    let query = GraphQuery::new()
        .hosts(scope.ids.iter().copied())
        .flags([GraphFlags::Prototype])
        .inherited(false);
    let stale = ctx
        .store
        .get_graphs(&query)?
        .into_iter()
        .filter(|g| !scope.declares_graph(&declared.graph_prototypes, &g.host_ids, &g.name))
        .map(|g| g.id)
        .collect();
    remove(ctx, EntityKind::GraphPrototype, stale, S::delete_graphs)?;

    let rule_ids: Vec<EntityId> = rules.iter().map(|r| r.id).collect();
    if rule_ids.is_empty() {
        return Ok(());
    }
    let query = ItemQuery::new()
        .rules(rule_ids)
        .flags([ItemFlags::Prototype])
        .inherited(false);
    let rows = ctx.store.get_items(&query)?;
    let stale = undeclared_items(scope, rows, &declared.item_prototypes);
    remove(ctx, EntityKind::ItemPrototype, stale, S::delete_items)
}

fn delete_triggers<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    scope: &Scope<'_, '_>,
) -> ImportResult<()> {
    let query = TriggerQuery::new()
        .hosts(scope.ids.iter().copied())
        .flags([TriggerFlags::Normal])
        .inherited(false);
    let stale = ctx
        .store
        .get_triggers(&query)?
        .into_iter()
        .filter(|t| {
            !scope
                .declared
                .triggers
                .contains(&(t.description.as_str(), t.expression.as_str()))
                && ctx.scope.all_processed(&t.host_ids)
        })
        .map(|t| t.id)
        .collect();
    remove(ctx, EntityKind::Trigger, stale, S::delete_triggers)
}

fn delete_graphs<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    scope: &Scope<'_, '_>,
) -> ImportResult<()> {
    let query = GraphQuery::new()
        .hosts(scope.ids.iter().copied())
        .flags([GraphFlags::Normal])
        .inherited(false);
    let stale = ctx
        .store
        .get_graphs(&query)?
        .into_iter()
        .filter(|g| {
            !scope.declares_graph(&scope.declared.graphs, &g.host_ids, &g.name)
                && ctx.scope.all_processed(&g.host_ids)
        })
        .map(|g| g.id)
        .collect();
    remove(ctx, EntityKind::Graph, stale, S::delete_graphs)
}

fn delete_items<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    scope: &Scope<'_, '_>,
) -> ImportResult<()> {
    let rows = ctx.store.get_items(&scope.items(ItemFlags::Normal))?;
    let stale = undeclared_items(scope, rows, &scope.declared.items);
    remove(ctx, EntityKind::Item, stale, S::delete_items)
}

fn delete_applications<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    scope: &Scope<'_, '_>,
) -> ImportResult<()> {
    let query = ApplicationQuery::new()
        .hosts(scope.ids.iter().copied())
        .inherited(false);
    let stale = ctx
        .store
        .get_applications(&query)?
        .into_iter()
        .filter(|a| {
            !scope
                .declared
                .applications
                .contains(&(scope.host(a.host_id), a.name.as_str()))
        })
        .map(|a| a.id)
        .collect();
    remove(ctx, EntityKind::Application, stale, S::delete_applications)
}

#[cfg(test)]
mod tests {
    use crate::{EntityPolicy, ImportOptions, ImportPipeline};
    use reconf_model::{EntityKind, Snapshot};
    use reconf_store::{ConfigStore, ItemQuery, MemoryStore, TriggerQuery};

    const TWO_HOSTS: &str = r#"{
        "groups": [{"name": "Linux servers"}],
        "hosts": [
            {"host": "web1", "groups": [{"name": "Linux servers"}]},
            {"host": "web2", "groups": [{"name": "Linux servers"}]}
        ],
        "applications": {"web1": [{"name": "CPU"}, {"name": "Memory"}]},
        "items": {
            "web1": [{"key": "agent.ping", "name": "Ping"}, {"key": "system.cpu.load", "name": "Load"}],
            "web2": [{"key": "agent.ping", "name": "Ping"}]
        },
        "triggers": [
            {"description": "Both down", "expression": "{web1:agent.ping.nodata(5m)}=1 and {web2:agent.ping.nodata(5m)}=1"},
            {"description": "Load high", "expression": "{web1:system.cpu.load.avg(5m)}>5"}
        ]
    }"#;

    fn sync() -> ImportOptions {
        ImportOptions::new()
            .with_groups(EntityPolicy::create())
            .with_hosts(EntityPolicy::all())
            .with_applications(EntityPolicy::all())
            .with_items(EntityPolicy::all())
            .with_triggers(EntityPolicy::all())
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(TWO_HOSTS).unwrap();
        ImportPipeline::new(&store, sync()).run(&snapshot).unwrap();
        store
    }

    #[test]
    fn only_touched_hosts_lose_content() {
        let store = seeded();
        // web2 is not in the snapshot, so its ping item stays.
        let snapshot = Snapshot::from_json_str(
            r#"{"hosts": [{"host": "web1", "groups": [{"name": "Linux servers"}]}]}"#,
        )
        .unwrap();
        let report = ImportPipeline::new(&store, sync()).run(&snapshot).unwrap();
        assert_eq!(report.count(EntityKind::Item).deleted, 2);
        assert_eq!(report.count(EntityKind::Application).deleted, 2);

        let keys: Vec<String> = store
            .get_items(&ItemQuery::new())
            .unwrap()
            .into_iter()
            .map(|i| i.key)
            .collect();
        assert_eq!(keys, vec!["agent.ping".to_string()]);
    }

    #[test]
    fn triggers_spanning_an_untouched_host_survive() {
        let store = seeded();
        let mut snapshot = Snapshot::from_json_str(TWO_HOSTS).unwrap();
        snapshot.hosts.retain(|h| h.host == "web1");
        snapshot.items.remove("web2");
        snapshot.triggers.clear();

        let report = ImportPipeline::new(&store, sync()).run(&snapshot).unwrap();
        assert_eq!(report.count(EntityKind::Trigger).deleted, 1);
        let left: Vec<String> = store
            .get_triggers(&TriggerQuery::new())
            .unwrap()
            .into_iter()
            .map(|t| t.description)
            .collect();
        assert_eq!(left, vec!["Both down".to_string()]);
    }

    #[test]
    fn nothing_is_deleted_without_the_policy() {
        let store = seeded();
        let snapshot = Snapshot::from_json_str(
            r#"{"hosts": [{"host": "web1", "groups": [{"name": "Linux servers"}]}]}"#,
        )
        .unwrap();
        let options = ImportOptions::new().with_hosts(EntityPolicy::upsert());
        let report = ImportPipeline::new(&store, options).run(&snapshot).unwrap();
        assert_eq!(report.totals().deleted, 0);
        assert_eq!(store.get_items(&ItemQuery::new()).unwrap().len(), 3);
    }
}
