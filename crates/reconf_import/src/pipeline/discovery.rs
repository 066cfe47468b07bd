//! Discovery rules and everything they own.
//!
//! Rules are written first. Only rules that were created or updated in
//! this run have their prototypes reconciled, in three waves: item
//! prototypes (masters first), then host and trigger prototypes, then
//! graph prototypes. The item cache is refreshed after the rules and after
//! every item prototype wave, so copies inherited by linked hosts resolve.

use super::graphs::GraphBatch;
use super::items::{dependency_waves, item_record, ItemBatch, Owned};
use super::triggers::{check_tokens, TriggerBatch};
use super::ImportContext;
use crate::error::{ImportError, ImportResult};
use crate::formatted::{FormattedSnapshot, RuleView};
use crate::importers::linked_templates;
use crate::resolver::RefKind;
use reconf_model::{DiscoveryRule, EntityId, EntityKind, GroupRef};
use reconf_store::{
    ConfigStore, GraphFlags, HostPrototypeRecord, ItemFlags, ItemQuery, ItemRecord, TriggerFlags,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// A rule written in this run.
struct WrittenRule<'v, 'a> {
    view: &'v RuleView<'a>,
    host_id: EntityId,
    rule_id: EntityId,
}

pub(super) fn import_discovery_rules<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    formatted: &FormattedSnapshot<'_>,
) -> ImportResult<()> {
    let rules = import_rules(ctx, formatted.rules())?;
    if rules.is_empty() {
        return Ok(());
    }
    // Rules written on templates were copied onto linked hosts.
    ctx.resolver.refresh(RefKind::Item);
    debug!(rules = rules.len(), "reconciling prototypes");
    import_item_prototypes(ctx, &rules)?;
    import_host_prototypes(ctx, &rules)?;
    import_trigger_prototypes(ctx, &rules)?;
    import_graph_prototypes(ctx, &rules)
}

fn rule_record<S: ConfigStore + ?Sized>(
    ctx: &ImportContext<'_, S>,
    host: &str,
    host_id: EntityId,
    rule: &DiscoveryRule,
    context: &str,
) -> ImportResult<ItemRecord> {
    let interface_id = match &rule.interface_ref {
        Some(reference) => Some(
            ctx.resolver
                .interface(host, reference)
                .ok_or_else(|| ImportError::missing_interface(reference, context))?,
        ),
        None => None,
    };
    Ok(ItemRecord {
        id: EntityId::default(),
        host_id,
        key: rule.key.clone(),
        flags: ItemFlags::DiscoveryRule,
        settings: rule.settings.clone(),
        template_id: None,
        rule_id: None,
        application_ids: Vec::new(),
        valuemap_id: None,
        interface_id,
        master_item_id: None,
        filter: rule.filter.clone(),
        lifetime: rule.lifetime.clone(),
    })
}

fn import_rules<'v, 'a, S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    views: &'v [RuleView<'a>],
) -> ImportResult<Vec<WrittenRule<'v, 'a>>> {
    let policy = ctx.options.discovery_rules;
    let mut creates: Vec<(&'v RuleView<'a>, EntityId, ItemRecord)> = Vec::new();
    let mut updates: Vec<(&'v RuleView<'a>, EntityId, ItemRecord)> = Vec::new();

    for view in views {
        let Some(host_id) = ctx.processed_owner(view.host, "discovery rules")? else {
            continue;
        };
        let context = format!("discovery rule \"{}\" on \"{}\"", view.rule.key, view.host);
        match ctx.resolver.item(view.host, &view.rule.key)? {
            Some((_, flags)) if flags != ItemFlags::DiscoveryRule => {
                return Err(ImportError::duplicate_on(
                    flags.entity_kind(),
                    &view.rule.key,
                    view.host,
                ));
            }
            Some((id, _)) if policy.update_existing => {
                let record = rule_record(ctx, view.host, host_id, view.rule, &context)?;
                updates.push((view, host_id, ItemRecord { id, ..record }));
            }
            None if policy.create_missing => {
                let record = rule_record(ctx, view.host, host_id, view.rule, &context)?;
                creates.push((view, host_id, record));
            }
            _ => {}
        }
    }

    let mut written = Vec::with_capacity(creates.len() + updates.len());
    if !creates.is_empty() {
        let records = creates.iter().map(|(_, _, r)| r.clone()).collect();
        let ids = ctx.store.create_items(records)?;
        for ((view, host_id, _), id) in creates.into_iter().zip(&ids) {
            ctx.resolver
                .bind_item(view.host, &view.rule.key, *id, ItemFlags::DiscoveryRule);
            written.push(WrittenRule {
                view,
                host_id,
                rule_id: *id,
            });
        }
        ctx.report.created(EntityKind::DiscoveryRule, ids.len());
    }
    if !updates.is_empty() {
        let records = updates.iter().map(|(_, _, r)| r.clone()).collect();
        let ids = ctx.store.update_items(records)?;
        ctx.report.updated(EntityKind::DiscoveryRule, ids.len());
        written.extend(updates.into_iter().map(|(view, host_id, record)| WrittenRule {
            view,
            host_id,
            rule_id: record.id,
        }));
    }
    Ok(written)
}

fn import_item_prototypes<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    rules: &[WrittenRule<'_, '_>],
) -> ImportResult<()> {
    // (prototype, rule id, rule key) per depth
    let mut waves: Vec<Vec<(Owned<'_>, EntityId, &str)>> = Vec::new();
    for written in rules {
        let view = written.view;
        let per_rule = dependency_waves(view.host, &view.rule.item_prototypes)?;
        for (depth, wave) in per_rule.into_iter().enumerate() {
            if waves.len() <= depth {
                waves.push(Vec::new());
            }
            waves[depth].extend(wave.into_iter().map(|item| {
                let owned = Owned {
                    host: view.host,
                    host_id: written.host_id,
                    item,
                };
                (owned, written.rule_id, view.rule.key.as_str())
            }));
        }
    }

    for (depth, wave) in waves.iter().enumerate() {
        let mut batch = ItemBatch::default();
        for (owned, rule_id, rule_key) in wave {
            let context = format!(
                "item prototype \"{}\" of discovery rule \"{}\" on \"{}\"",
                owned.item.key, rule_key, owned.host
            );
            let record = item_record(ctx, owned, ItemFlags::Prototype, Some(*rule_id), &context)?;
            match ctx.resolver.item(owned.host, &owned.item.key)? {
                Some((_, flags)) if flags != ItemFlags::Prototype => {
                    return Err(ImportError::duplicate_on(
                        flags.entity_kind(),
                        &owned.item.key,
                        owned.host,
                    ));
                }
                Some((id, _)) => batch.update(id, record),
                None => batch.create(owned.host, record),
            }
        }
        let written = batch.commit(ctx, ItemFlags::Prototype)?;
        ctx.resolver.refresh(RefKind::Item);
        debug!(depth, written, "item prototype wave");
    }
    Ok(())
}

fn import_host_prototypes<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    rules: &[WrittenRule<'_, '_>],
) -> ImportResult<()> {
    let mut creates: Vec<(&str, &str, HostPrototypeRecord)> = Vec::new();
    let mut updates = Vec::new();

    for written in rules {
        let view = written.view;
        for prototype in &view.rule.host_prototypes {
            let context = format!(
                "host prototype \"{}\" of discovery rule \"{}\" on \"{}\"",
                prototype.host, view.rule.key, view.host
            );
            let groups: Vec<GroupRef> = prototype
                .group_links
                .iter()
                .map(|link| link.group.clone())
                .collect();
            let group_ids = ctx.group_ids(&groups, &context)?;
            let template_ids = linked_templates(ctx, &prototype.templates, &context)?;
            let record = HostPrototypeRecord {
                id: EntityId::default(),
                rule_id: written.rule_id,
                host: prototype.host.clone(),
                name: prototype.name.clone(),
                status: prototype.status,
                group_ids,
                group_prototypes: prototype
                    .group_prototypes
                    .iter()
                    .map(|g| g.name.clone())
                    .collect(),
                template_ids,
                template_id: None,
            };
            match ctx
                .resolver
                .host_prototype(view.host, &view.rule.key, &prototype.host)?
            {
                Some(id) => updates.push(HostPrototypeRecord { id, ..record }),
                None => creates.push((view.host, view.rule.key.as_str(), record)),
            }
        }
    }

    if !creates.is_empty() {
        let records = creates.iter().map(|(_, _, r)| r.clone()).collect();
        let ids = ctx.store.create_host_prototypes(records)?;
        for ((host, rule, record), id) in creates.iter().zip(&ids) {
            ctx.resolver.bind_host_prototype(host, rule, &record.host, *id);
        }
        ctx.report.created(EntityKind::HostPrototype, ids.len());
    }
    if !updates.is_empty() {
        let ids = ctx.store.update_host_prototypes(updates)?;
        ctx.report.updated(EntityKind::HostPrototype, ids.len());
    }
    Ok(())
}

fn import_trigger_prototypes<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    rules: &[WrittenRule<'_, '_>],
) -> ImportResult<()> {
    let mut planned = Vec::new();
    let mut prototype_ids = BTreeSet::new();
    for written in rules {
        let view = written.view;
        for parsed in &view.trigger_prototypes {
            let context = format!(
                "trigger prototype \"{}\" of discovery rule \"{}\" on \"{}\"",
                parsed.trigger.description, view.rule.key, view.host
            );
            check_tokens(ctx, parsed, &context)?;
            for function_macro in parsed.expression.function_macros() {
                if let Some((id, ItemFlags::Prototype)) = ctx
                    .resolver
                    .item(&function_macro.host, &function_macro.key)?
                {
                    prototype_ids.insert(id);
                }
            }
            planned.push((written.rule_id, parsed, context));
        }
    }
    if planned.is_empty() {
        return Ok(());
    }

    // Owning rule of every item prototype read by the expressions.
    let owners: BTreeMap<EntityId, Option<EntityId>> = if prototype_ids.is_empty() {
        BTreeMap::new()
    } else {
        ctx.store
            .get_items(&ItemQuery::new().ids(prototype_ids))?
            .into_iter()
            .map(|i| (i.id, i.rule_id))
            .collect()
    };

    let mut batch = TriggerBatch::new(TriggerFlags::Prototype);
    for (rule_id, parsed, context) in planned {
        for function_macro in parsed.expression.function_macros() {
            let Some((id, ItemFlags::Prototype)) = ctx
                .resolver
                .item(&function_macro.host, &function_macro.key)?
            else {
                continue;
            };
            if owners.get(&id).copied().flatten() != Some(rule_id) {
                return Err(ImportError::missing(
                    EntityKind::ItemPrototype,
                    function_macro.item().to_string(),
                    context,
                ));
            }
        }
        batch.plan(ctx, parsed, true, true, context)?;
    }
    batch.commit(ctx)
}

fn import_graph_prototypes<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    rules: &[WrittenRule<'_, '_>],
) -> ImportResult<()> {
    let mut batch = GraphBatch::new(GraphFlags::Prototype);
    for written in rules {
        let view = written.view;
        for graph in &view.rule.graph_prototypes {
            if graph.gitems.is_empty() {
                warn!(
                    graph = %graph.name,
                    rule = %view.rule.key,
                    host = view.host,
                    "graph prototype plots no items, skipped"
                );
                continue;
            }
            let context = format!(
                "graph prototype \"{}\" of discovery rule \"{}\" on \"{}\"",
                graph.name, view.rule.key, view.host
            );
            batch.plan(ctx, view.host, graph, true, true, &context)?;
        }
    }
    batch.commit(ctx)
}

#[cfg(test)]
mod tests {
    use crate::{EntityPolicy, ImportError, ImportOptions, ImportPipeline};
    use reconf_model::{EntityKind, Snapshot};
    use reconf_store::{
        ConfigStore, GraphFlags, GraphQuery, HostPrototypeQuery, ItemFlags, ItemQuery,
        MemoryStore, TriggerFlags, TriggerQuery,
    };

    const FS_DISCOVERY: &str = r#"{
        "groups": [{"name": "Linux servers"}],
        "hosts": [{"host": "web1", "groups": [{"name": "Linux servers"}]}],
        "discoveryRules": {"web1": [{
            "key": "vfs.fs.discovery",
            "name": "Mounted filesystems",
            "lifetime": "7d",
            "item_prototypes": [
                {"key": "vfs.fs.size[{#FSNAME},free]", "name": "Free on {#FSNAME}"},
                {"key": "vfs.fs.size[{#FSNAME},pfree]", "name": "Free % on {#FSNAME}", "type": "dependent",
                 "master_item": {"key": "vfs.fs.size[{#FSNAME},free]"}}
            ],
            "trigger_prototypes": [
                {"description": "Low space on {#FSNAME}", "expression": "{web1:vfs.fs.size[{#FSNAME},pfree].last()}<10"}
            ],
            "graph_prototypes": [
                {"name": "Space on {#FSNAME}", "gitems": [
                    {"item": {"host": "web1", "key": "vfs.fs.size[{#FSNAME},free]"}}
                ]}
            ],
            "host_prototypes": [
                {"host": "{#FSNAME}-mount", "group_links": [{"group": {"name": "Linux servers"}}],
                 "group_prototypes": [{"name": "Mounts {#FSNAME}"}]}
            ]
        }]}
    }"#;

    fn options() -> ImportOptions {
        ImportOptions::new()
            .with_groups(EntityPolicy::create())
            .with_hosts(EntityPolicy::upsert())
            .with_discovery_rules(EntityPolicy::upsert())
    }

    #[test]
    fn rule_and_all_prototypes_are_created() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(FS_DISCOVERY).unwrap();
        let report = ImportPipeline::new(&store, options()).run(&snapshot).unwrap();

        assert_eq!(report.count(EntityKind::DiscoveryRule).created, 1);
        assert_eq!(report.count(EntityKind::ItemPrototype).created, 2);
        assert_eq!(report.count(EntityKind::TriggerPrototype).created, 1);
        assert_eq!(report.count(EntityKind::GraphPrototype).created, 1);
        assert_eq!(report.count(EntityKind::HostPrototype).created, 1);

        let rule = store
            .get_items(&ItemQuery::new().flags([ItemFlags::DiscoveryRule]))
            .unwrap()
            .remove(0);
        assert_eq!(rule.lifetime.as_deref(), Some("7d"));
        let prototypes = store
            .get_items(&ItemQuery::new().flags([ItemFlags::Prototype]))
            .unwrap();
        assert!(prototypes.iter().all(|p| p.rule_id == Some(rule.id)));
        let dependent = prototypes
            .iter()
            .find(|p| p.key.ends_with("pfree]"))
            .unwrap();
        assert!(dependent.master_item_id.is_some());

        let host_prototypes = store
            .get_host_prototypes(&HostPrototypeQuery::new().rules([rule.id]))
            .unwrap();
        assert_eq!(host_prototypes[0].group_prototypes, vec!["Mounts {#FSNAME}"]);
        assert_eq!(
            store
                .get_graphs(&GraphQuery::new().flags([GraphFlags::Prototype]))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn rerun_updates_without_duplicates() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(FS_DISCOVERY).unwrap();
        ImportPipeline::new(&store, options()).run(&snapshot).unwrap();
        let report = ImportPipeline::new(&store, options()).run(&snapshot).unwrap();

        assert_eq!(report.count(EntityKind::ItemPrototype).created, 0);
        assert_eq!(report.count(EntityKind::ItemPrototype).updated, 2);
        assert_eq!(report.count(EntityKind::TriggerPrototype).updated, 1);
        assert_eq!(
            store
                .get_triggers(&TriggerQuery::new().flags([TriggerFlags::Prototype]))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn prototypes_wait_for_their_rule() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(FS_DISCOVERY).unwrap();
        let hosts_only = ImportOptions::new()
            .with_groups(EntityPolicy::create())
            .with_hosts(EntityPolicy::upsert())
            .with_discovery_rules(EntityPolicy {
                update_existing: true,
                ..EntityPolicy::none()
            });
        let report = ImportPipeline::new(&store, hosts_only).run(&snapshot).unwrap();
        assert_eq!(report.count(EntityKind::ItemPrototype).created, 0);
        assert!(store.get_items(&ItemQuery::new()).unwrap().is_empty());
    }

    #[test]
    fn trigger_prototype_with_unknown_item() {
        let store = MemoryStore::new();
        let mut snapshot = Snapshot::from_json_str(FS_DISCOVERY).unwrap();
        let rule = &mut snapshot.discovery_rules.get_mut("web1").unwrap()[0];
        rule.trigger_prototypes[0].expression =
            "{web1:vfs.fs.inode[{#FSNAME},pfree].last()}<10".into();

        let err = ImportPipeline::new(&store, options()).run(&snapshot).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot find item \"web1:vfs.fs.inode[{#FSNAME},pfree]\" used by trigger prototype \
             \"Low space on {#FSNAME}\" of discovery rule \"vfs.fs.discovery\" on \"web1\"."
        );
    }

    #[test]
    fn plain_item_with_the_rule_key() {
        let store = MemoryStore::new();
        let first = Snapshot::from_json_str(
            r#"{
                "groups": [{"name": "Linux servers"}],
                "hosts": [{"host": "web1", "groups": [{"name": "Linux servers"}]}],
                "items": {"web1": [{"key": "vfs.fs.discovery", "name": "Not a rule"}]}
            }"#,
        )
        .unwrap();
        ImportPipeline::new(&store, ImportOptions::create_all())
            .run(&first)
            .unwrap();

        let snapshot = Snapshot::from_json_str(FS_DISCOVERY).unwrap();
        let err = ImportPipeline::new(&store, options()).run(&snapshot).unwrap_err();
        assert!(matches!(err, ImportError::DuplicateKey { kind: EntityKind::Item, .. }));
    }

    #[test]
    fn trigger_prototype_on_another_rules_prototype() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(
            r#"{
                "groups": [{"name": "Linux servers"}],
                "hosts": [{"host": "web1", "groups": [{"name": "Linux servers"}]}],
                "discoveryRules": {"web1": [
                    {"key": "net.if.discovery", "name": "Interfaces",
                     "item_prototypes": [{"key": "net.if.in[{#IFNAME}]", "name": "In {#IFNAME}"}]},
                    {"key": "vfs.fs.discovery", "name": "Filesystems",
                     "item_prototypes": [{"key": "vfs.fs.size[{#FSNAME},free]", "name": "Free {#FSNAME}"}],
                     "trigger_prototypes": [
                        {"description": "Busy {#IFNAME}", "expression": "{web1:net.if.in[{#IFNAME}].last()}>100"}
                     ]}
                ]}
            }"#,
        )
        .unwrap();

        let err = ImportPipeline::new(&store, options()).run(&snapshot).unwrap_err();
        assert!(matches!(
            &err,
            ImportError::MissingReference { kind, .. } if *kind == "item prototype"
        ));
        assert_eq!(
            err.to_string(),
            "Cannot find item prototype \"web1:net.if.in[{#IFNAME}]\" used by trigger prototype \
             \"Busy {#IFNAME}\" of discovery rule \"vfs.fs.discovery\" on \"web1\"."
        );
    }
}
