//! End-to-end import runs against the in-memory store.

use reconf_import::{
    import_snapshot, EntityPolicy, ImportConfig, ImportError, ImportOptions, ImportPipeline,
};
use reconf_model::{EntityKind, Snapshot};
use reconf_store::{
    ConfigStore, HostKind, HostQuery, ItemFlags, ItemQuery, MemoryStore, Operation,
    TriggerFlags, TriggerQuery,
};
use reconf_testkit::{create_group, create_host, create_item, scenarios, SnapshotBuilder};

fn run(store: &MemoryStore, snapshot: &Snapshot, options: ImportOptions) {
    import_snapshot(store, snapshot, options, ImportConfig::new()).unwrap();
}

#[test]
fn template_items_resolve_on_linked_hosts() {
    let store = MemoryStore::new();
    let snapshot = SnapshotBuilder::new()
        .template("Base Linux", "Templates")
        .linked_host("web1", "Linux servers", &["Base Linux"])
        .item("Base Linux", "agent.ping")
        .trigger("web1 unreachable", "{web1:agent.ping.nodata(5m)}=1")
        .build();
    let report = import_snapshot(
        &store,
        &snapshot,
        ImportOptions::create_all(),
        ImportConfig::new(),
    )
    .unwrap();

    // Only the template item was asked for; the host copy comes from linkage.
    assert_eq!(report.count(EntityKind::Item).created, 1);
    let web1 = store.get_hosts(&HostQuery::new().names(["web1"])).unwrap().remove(0);
    let items = store
        .get_items(&ItemQuery::new().hosts([web1.id]).keys(["agent.ping"]))
        .unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].template_id.is_some());

    let triggers = store
        .get_triggers(&TriggerQuery::new().descriptions(["web1 unreachable"]))
        .unwrap();
    assert_eq!(triggers[0].host_ids, vec![web1.id]);
}

#[test]
fn rows_are_written_after_what_they_reference() {
    let store = MemoryStore::new();
    let snapshot = SnapshotBuilder::new()
        .host("web1", "Linux servers")
        .application("web1", "Availability")
        .item_in("web1", "agent.ping", &["Availability"])
        .item("web1", "system.uptime")
        .dependent_trigger(
            "web1 rebooted",
            "{web1:system.uptime.last()}<600",
            &[("web1 unreachable", "{web1:agent.ping.nodata(5m)}=1")],
        )
        .trigger("web1 unreachable", "{web1:agent.ping.nodata(5m)}=1")
        .graph("Uptime", &[("web1", "system.uptime")])
        .build();
    run(&store, &snapshot, ImportOptions::create_all());

    let journal = store.journal();
    let created = |kind: EntityKind| -> Vec<u64> {
        journal
            .entries()
            .iter()
            .filter(|e| e.kind == kind && e.operation == Operation::Create)
            .map(|e| e.sequence)
            .collect()
    };
    let last = |kind: EntityKind| created(kind).into_iter().max().unwrap();
    let first = |kind: EntityKind| created(kind).into_iter().min().unwrap();

    assert!(last(EntityKind::Group) < first(EntityKind::Host));
    assert!(last(EntityKind::Host) < first(EntityKind::Application));
    assert!(last(EntityKind::Application) < first(EntityKind::Item));
    assert!(last(EntityKind::Item) < first(EntityKind::Trigger));
    assert!(last(EntityKind::Item) < first(EntityKind::Graph));

    // The dependency on a trigger created in the same batch is written last.
    let edge = journal
        .entries()
        .iter()
        .filter(|e| e.kind == EntityKind::Trigger && e.operation == Operation::Update)
        .map(|e| e.sequence)
        .max()
        .unwrap();
    assert!(last(EntityKind::Trigger) < edge);

    let rebooted = store
        .get_triggers(&TriggerQuery::new().descriptions(["web1 rebooted"]))
        .unwrap()
        .remove(0);
    let unreachable = store
        .get_triggers(&TriggerQuery::new().descriptions(["web1 unreachable"]))
        .unwrap()
        .remove(0);
    assert_eq!(rebooted.dependency_ids, vec![unreachable.id]);
}

#[test]
fn creates_are_batched_per_stage() {
    let store = MemoryStore::new();
    let snapshot = scenarios::monitored_fleet(5, 4);
    run(&store, &snapshot, ImportOptions::create_all());

    assert_eq!(store.journal().count(EntityKind::Item, Operation::Create), 20);
    assert_eq!(store.stats().calls(EntityKind::Item, Operation::Create), 1);
    assert_eq!(store.stats().calls(EntityKind::Trigger, Operation::Create), 1);
    assert_eq!(store.stats().calls(EntityKind::Host, Operation::Create), 1);
}

#[test]
fn closing_a_dependency_cycle_is_rejected() {
    let store = MemoryStore::new();
    let t1 = ("T1", "{web1:agent.ping.nodata(5m)}=1");
    let t2 = ("T2", "{web1:system.cpu.load.avg(5m)}>5");
    let first = SnapshotBuilder::new()
        .host("web1", "Linux servers")
        .item("web1", "agent.ping")
        .item("web1", "system.cpu.load")
        .dependent_trigger(t1.0, t1.1, &[t2])
        .trigger(t2.0, t2.1)
        .build();
    let options = ImportOptions::create_all().with_triggers(EntityPolicy::upsert());
    run(&store, &first, options);
    let before = store.get_triggers(&TriggerQuery::new()).unwrap();

    let second = SnapshotBuilder::new()
        .dependent_trigger(t2.0, t2.1, &[t1])
        .build();
    let err = import_snapshot(&store, &second, options, ImportConfig::new()).unwrap_err();
    assert!(matches!(
        err,
        ImportError::CircularDependency { ref trigger } if trigger == "T2"
    ));
    assert_eq!(store.get_triggers(&TriggerQuery::new()).unwrap(), before);
}

#[test]
fn a_trigger_cannot_depend_on_itself() {
    let store = MemoryStore::new();
    let t1 = ("T1", "{web1:agent.ping.nodata(5m)}=1");
    let snapshot = SnapshotBuilder::new()
        .host("web1", "Linux servers")
        .item("web1", "agent.ping")
        .dependent_trigger(t1.0, t1.1, &[t1])
        .build();
    let err = import_snapshot(&store, &snapshot, ImportOptions::create_all(), ImportConfig::new())
        .unwrap_err();
    assert!(matches!(err, ImportError::SelfDependency { .. }));
    assert!(store.get_hosts(&HostQuery::new()).unwrap().is_empty());
}

#[test]
fn content_of_hosts_outside_the_run_is_skipped() {
    let store = MemoryStore::new();
    let group = create_group(&store, "Linux servers");
    let db1 = create_host(&store, "db1", HostKind::Host, group);
    create_item(&store, db1, "agent.ping");

    let snapshot = SnapshotBuilder::new()
        .host("web1", "Linux servers")
        .item("web1", "agent.ping")
        .item("db1", "agent.version")
        .build();
    let report = import_snapshot(
        &store,
        &snapshot,
        ImportOptions::create_all(),
        ImportConfig::new(),
    )
    .unwrap();

    assert_eq!(report.count(EntityKind::Item).created, 1);
    let db1_items = store.get_items(&ItemQuery::new().hosts([db1])).unwrap();
    assert_eq!(db1_items.len(), 1);
    assert_eq!(db1_items[0].key, "agent.ping");
}

#[test]
fn content_of_unknown_hosts_is_skipped() {
    let store = MemoryStore::new();
    let snapshot = SnapshotBuilder::new().item("db9", "agent.ping").build();
    let report = import_snapshot(
        &store,
        &snapshot,
        ImportOptions::create_all(),
        ImportConfig::new(),
    )
    .unwrap();

    assert_eq!(report.count(EntityKind::Item).created, 0);
    assert!(store.get_items(&ItemQuery::new()).unwrap().is_empty());
}

#[test]
fn content_of_hosts_kept_out_by_policy_is_skipped() {
    let store = MemoryStore::new();
    let group = create_group(&store, "Linux servers");
    let web1 = create_host(&store, "web1", HostKind::Host, group);
    create_item(&store, web1, "agent.ping");

    let snapshot = SnapshotBuilder::new()
        .host("web1", "Linux servers")
        .host("web9", "Linux servers")
        .item("web1", "agent.version")
        .item("web9", "agent.ping")
        .build();
    let options = ImportOptions::new()
        .with_groups(EntityPolicy::create())
        .with_hosts(EntityPolicy {
            update_existing: true,
            ..EntityPolicy::none()
        })
        .with_items(EntityPolicy::upsert());
    let report = import_snapshot(&store, &snapshot, options, ImportConfig::new()).unwrap();

    assert_eq!(report.count(EntityKind::Host).created, 0);
    assert_eq!(report.count(EntityKind::Item).created, 1);
    assert!(store
        .get_hosts(&HostQuery::new().names(["web9"]))
        .unwrap()
        .is_empty());
    let web1_items = store.get_items(&ItemQuery::new().hosts([web1])).unwrap();
    let mut keys: Vec<_> = web1_items.iter().map(|i| i.key.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["agent.ping", "agent.version"]);
}

const BROKEN_PROTOTYPES: &str = r#"{
    "groups": [{"name": "Linux servers"}],
    "hosts": [{"host": "web1", "groups": [{"name": "Linux servers"}]}],
    "discoveryRules": {"web1": [{
        "key": "vfs.fs.discovery",
        "name": "Mounted filesystems",
        "item_prototypes": [
            {"key": "vfs.fs.size[{#FSNAME},pfree]", "name": "Free space on {#FSNAME}"}
        ],
        "trigger_prototypes": [
            {"description": "Free space low on {#FSNAME}",
             "expression": "{web1:vfs.fs.size[{#FSNAME},pfree].last()}<10"},
            {"description": "Inodes low on {#FSNAME}",
             "expression": "{web1:vfs.fs.inode[{#FSNAME},pfree].last()}<10"}
        ]
    }]}
}"#;

#[test]
fn trigger_prototype_with_an_unknown_item_writes_nothing() {
    let store = MemoryStore::new();
    let snapshot = Snapshot::from_json_str(BROKEN_PROTOTYPES).unwrap();
    let err = ImportPipeline::new(&store, ImportOptions::create_all())
        .run(&snapshot)
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("vfs.fs.inode[{#FSNAME},pfree]"));
    assert!(message.contains("Inodes low on {#FSNAME}"));
    assert!(message.contains("vfs.fs.discovery"));

    // The valid prototype of the same batch was not written either.
    let prototypes = store
        .get_triggers(&TriggerQuery::new().flags([TriggerFlags::Prototype]))
        .unwrap();
    assert!(prototypes.is_empty());
}

#[test]
fn failed_run_in_a_transaction_leaves_no_trace() {
    let store = MemoryStore::new();
    let snapshot = Snapshot::from_json_str(BROKEN_PROTOTYPES).unwrap();
    import_snapshot(&store, &snapshot, ImportOptions::create_all(), ImportConfig::new())
        .unwrap_err();
    assert!(store
        .get_items(&ItemQuery::new().flags([ItemFlags::DiscoveryRule]))
        .unwrap()
        .is_empty());
    assert!(store.journal().is_empty());
    assert_eq!(store.stats().transactions_rolled_back(), 1);
}
