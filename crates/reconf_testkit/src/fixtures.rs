//! Store fixtures.
//!
//! Each helper writes one row straight into a store and returns its id,
//! so tests can set up "already existing" configuration without running
//! an import first. They panic on store errors.

use reconf_model::{EntityId, HostStatus, ItemSettings, TriggerSettings};
use reconf_store::{
    ConfigStore, GroupRecord, HostKind, HostRecord, ItemFlags, ItemRecord, MemoryStore,
    StoreFile, TriggerFlags, TriggerRecord,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Creates a host group.
pub fn create_group<S: ConfigStore + ?Sized>(store: &S, name: &str) -> EntityId {
    store
        .create_groups(vec![GroupRecord {
            id: EntityId::default(),
            name: name.to_string(),
        }])
        .expect("Failed to create group")[0]
}

/// Creates a host or template in one group.
pub fn create_host<S: ConfigStore + ?Sized>(
    store: &S,
    name: &str,
    kind: HostKind,
    group: EntityId,
) -> EntityId {
    create_linked_host(store, name, kind, group, &[])
}

/// Creates a host or template linked to `templates`.
pub fn create_linked_host<S: ConfigStore + ?Sized>(
    store: &S,
    name: &str,
    kind: HostKind,
    group: EntityId,
    templates: &[EntityId],
) -> EntityId {
    store
        .create_hosts(vec![HostRecord {
            id: EntityId::default(),
            host: name.to_string(),
            name: name.to_string(),
            kind,
            status: HostStatus::Monitored,
            description: None,
            group_ids: vec![group],
            template_ids: templates.to_vec(),
            proxy_id: None,
            macros: Vec::new(),
            interfaces: Vec::new(),
        }])
        .expect("Failed to create host")[0]
}

/// Creates a plain item named after its key.
pub fn create_item<S: ConfigStore + ?Sized>(store: &S, host: EntityId, key: &str) -> EntityId {
    store
        .create_items(vec![item_record(host, key, ItemFlags::Normal, None)])
        .expect("Failed to create item")[0]
}

/// Creates a discovery rule named after its key.
pub fn create_rule<S: ConfigStore + ?Sized>(store: &S, host: EntityId, key: &str) -> EntityId {
    store
        .create_items(vec![item_record(host, key, ItemFlags::DiscoveryRule, None)])
        .expect("Failed to create discovery rule")[0]
}

/// Creates an item prototype of `rule`.
pub fn create_item_prototype<S: ConfigStore + ?Sized>(
    store: &S,
    host: EntityId,
    rule: EntityId,
    key: &str,
) -> EntityId {
    store
        .create_items(vec![item_record(host, key, ItemFlags::Prototype, Some(rule))])
        .expect("Failed to create item prototype")[0]
}

/// Creates a trigger. Every item of the expression must exist.
pub fn create_trigger<S: ConfigStore + ?Sized>(
    store: &S,
    description: &str,
    expression: &str,
) -> EntityId {
    store
        .create_triggers(vec![TriggerRecord {
            id: EntityId::default(),
            description: description.to_string(),
            expression: expression.to_string(),
            flags: TriggerFlags::Normal,
            settings: TriggerSettings::default(),
            template_id: None,
            dependency_ids: Vec::new(),
            host_ids: Vec::new(),
        }])
        .expect("Failed to create trigger")[0]
}

fn item_record(host: EntityId, key: &str, flags: ItemFlags, rule: Option<EntityId>) -> ItemRecord {
    ItemRecord {
        id: EntityId::default(),
        host_id: host,
        key: key.to_string(),
        flags,
        settings: ItemSettings {
            name: key.to_string(),
            ..ItemSettings::default()
        },
        template_id: None,
        rule_id: rule,
        application_ids: Vec::new(),
        valuemap_id: None,
        interface_id: None,
        master_item_id: None,
        filter: None,
        lifetime: None,
    }
}

/// A store file in a temporary directory.
pub struct TestStoreFile {
    dir: TempDir,
}

impl TestStoreFile {
    /// Creates an empty directory for the store.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Directory holding the store file, for placing other test files.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the store file.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("store.json")
    }

    /// Writes `store` to the file.
    pub fn save(&self, store: &MemoryStore) {
        StoreFile::open(self.path())
            .and_then(|file| file.save(store))
            .expect("Failed to save store");
    }

    /// Reads the file back.
    pub fn load(&self) -> MemoryStore {
        StoreFile::open(self.path())
            .and_then(|file| file.load())
            .expect("Failed to load store")
    }
}

impl Default for TestStoreFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconf_store::{HostQuery, ItemQuery};

    #[test]
    fn fixtures_write_rows() {
        let store = MemoryStore::new();
        let group = create_group(&store, "Linux servers");
        let host = create_host(&store, "web1", HostKind::Host, group);
        let rule = create_rule(&store, host, "vfs.fs.discovery");
        create_item(&store, host, "agent.ping");
        create_item_prototype(&store, host, rule, "vfs.fs.size[{#FSNAME},free]");
        create_trigger(&store, "web1 down", "{web1:agent.ping.nodata(5m)}=1");

        assert_eq!(store.get_items(&ItemQuery::new().hosts([host])).unwrap().len(), 3);
        let prototypes = store
            .get_items(&ItemQuery::new().flags([ItemFlags::Prototype]))
            .unwrap();
        assert_eq!(prototypes[0].rule_id, Some(rule));
    }

    #[test]
    fn store_file_round_trip() {
        let file = TestStoreFile::new();
        let store = MemoryStore::new();
        let group = create_group(&store, "Templates");
        create_host(&store, "Base Linux", HostKind::Template, group);
        file.save(&store);

        let loaded = file.load();
        let templates = loaded
            .get_hosts(&HostQuery::new().kind(HostKind::Template))
            .unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].host, "Base Linux");
    }
}
