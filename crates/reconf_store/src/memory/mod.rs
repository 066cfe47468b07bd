//! In-process configuration store.

mod cascade;
mod draft;
mod inherit;
pub(crate) mod state;

use crate::error::{StoreError, StoreResult};
use crate::journal::{Journal, Operation, StoreStats};
use crate::query::{
    ApplicationQuery, GraphQuery, HostPrototypeQuery, HostQuery, ItemQuery, ScreenQuery,
    TriggerQuery,
};
use crate::record::{
    ApplicationRecord, DependencyEdge, GraphRecord, GroupRecord, HostPrototypeRecord, HostRecord,
    IconMapRecord, ImageRecord, ItemRecord, MapRecord, ProxyRecord, ScreenRecord, TriggerRecord,
    ValueMapRecord,
};
use crate::store::ConfigStore;
pub use draft::MAX_DEPENDENCY_LEVELS;
use draft::Draft;
use parking_lot::{Mutex, RwLock};
use reconf_model::{EntityId, EntityKind};
use state::StoreState;
use std::collections::BTreeMap;
use tracing::debug;

/// A [`ConfigStore`] kept entirely in memory.
///
/// Writes are serialized by an internal lock. Each write call works on a
/// copy of the state that replaces the live state only when every row in
/// the call was accepted.
///
/// # Example
///
/// ```rust
/// use reconf_store::{ConfigStore, GroupRecord, MemoryStore};
/// use reconf_model::EntityId;
///
/// let store = MemoryStore::new();
/// let ids = store
///     .create_groups(vec![GroupRecord { id: EntityId::default(), name: "Linux servers".into() }])
///     .unwrap();
/// assert_eq!(store.get_groups(None).unwrap()[0].id, ids[0]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    journal: RwLock<Journal>,
    stats: StoreStats,
    /// State and journal length saved by `begin`.
    saved: Mutex<Option<(StoreState, usize)>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(mut state: StoreState) -> Self {
        state.reindex();
        Self {
            state: RwLock::new(state),
            ..Self::default()
        }
    }

    pub(crate) fn snapshot_state(&self) -> StoreState {
        self.state.read().clone()
    }

    fn write<T>(
        &self,
        kind: EntityKind,
        operation: Operation,
        apply: impl FnOnce(&mut Draft) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.stats.record_call(kind, operation);
        let mut state = self.state.write();
        let mut draft = Draft::new(state.clone());
        match apply(&mut draft) {
            Ok(value) => {
                *state = draft.state;
                self.journal.write().extend(draft.journal);
                Ok(value)
            }
            Err(err) => {
                self.stats.record_rejected();
                debug!(%kind, ?operation, error = %err, "store call rejected");
                Err(err)
            }
        }
    }

    fn read<T>(&self, kind: EntityKind, select: impl FnOnce(&StoreState) -> T) -> StoreResult<T> {
        self.stats.record_call(kind, Operation::Read);
        Ok(select(&self.state.read()))
    }

    fn add_lookup(&self, kind: EntityKind, insert: impl FnOnce(&mut StoreState, EntityId)) -> EntityId {
        let mut state = self.state.write();
        state.next_id += 1;
        let id = EntityId::new(state.next_id);
        insert(&mut state, id);
        self.journal.write().record(kind, Operation::Create, id);
        id
    }

    /// Adds a proxy. Proxies are never created by imports.
    pub fn add_proxy(&self, name: impl Into<String>) -> EntityId {
        let name = name.into();
        self.add_lookup(EntityKind::Proxy, |state, id| {
            state.proxies.insert(ProxyRecord { id, name });
        })
    }

    /// Adds a value map.
    pub fn add_value_map(&self, name: impl Into<String>) -> EntityId {
        let name = name.into();
        self.add_lookup(EntityKind::ValueMap, |state, id| {
            state.value_maps.insert(ValueMapRecord { id, name });
        })
    }

    /// Adds an icon map.
    pub fn add_icon_map(&self, name: impl Into<String>) -> EntityId {
        let name = name.into();
        self.add_lookup(EntityKind::IconMap, |state, id| {
            state.icon_maps.insert(IconMapRecord { id, name });
        })
    }

    /// Marks a host or template as read-only, or writable again.
    pub fn set_read_only(&self, host_id: EntityId, read_only: bool) {
        let mut state = self.state.write();
        if read_only {
            state.read_only.insert(host_id);
        } else {
            state.read_only.remove(&host_id);
        }
    }

    /// Copy of the commit journal.
    #[must_use]
    pub fn journal(&self) -> Journal {
        self.journal.read().clone()
    }

    /// Call statistics.
    #[must_use]
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Number of rows per kind. Kinds without rows are left out.
    #[must_use]
    pub fn row_counts(&self) -> BTreeMap<EntityKind, usize> {
        self.state.read().row_counts()
    }

    /// Returns true if a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.saved.lock().is_some()
    }
}

impl ConfigStore for MemoryStore {
    fn get_groups(&self, names: Option<&[String]>) -> StoreResult<Vec<GroupRecord>> {
        self.read(EntityKind::Group, |s| {
            StoreState::select_named(&s.groups, names, |g| g.name.as_str())
        })
    }

    fn create_groups(&self, groups: Vec<GroupRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Group, Operation::Create, |d| d.create_groups(groups))
    }

    fn get_hosts(&self, query: &HostQuery) -> StoreResult<Vec<HostRecord>> {
        self.read(EntityKind::Host, |s| s.select_hosts(query))
    }

    fn create_hosts(&self, hosts: Vec<HostRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Host, Operation::Create, |d| d.create_hosts(hosts))
    }

    fn update_hosts(&self, hosts: Vec<HostRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Host, Operation::Update, |d| d.update_hosts(hosts))
    }

    fn get_proxies(&self, names: Option<&[String]>) -> StoreResult<Vec<ProxyRecord>> {
        self.read(EntityKind::Proxy, |s| {
            StoreState::select_named(&s.proxies, names, |p| p.name.as_str())
        })
    }

    fn get_value_maps(&self, names: Option<&[String]>) -> StoreResult<Vec<ValueMapRecord>> {
        self.read(EntityKind::ValueMap, |s| {
            StoreState::select_named(&s.value_maps, names, |v| v.name.as_str())
        })
    }

    fn get_icon_maps(&self, names: Option<&[String]>) -> StoreResult<Vec<IconMapRecord>> {
        self.read(EntityKind::IconMap, |s| {
            StoreState::select_named(&s.icon_maps, names, |i| i.name.as_str())
        })
    }

    fn get_applications(&self, query: &ApplicationQuery) -> StoreResult<Vec<ApplicationRecord>> {
        self.read(EntityKind::Application, |s| s.select_applications(query))
    }

    fn create_applications(&self, apps: Vec<ApplicationRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Application, Operation::Create, |d| {
            d.create_applications(apps)
        })
    }

    fn delete_applications(&self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Application, Operation::Delete, |d| {
            d.delete_applications(ids)
        })
    }

    fn get_items(&self, query: &ItemQuery) -> StoreResult<Vec<ItemRecord>> {
        self.read(EntityKind::Item, |s| s.select_items(query))
    }

    fn create_items(&self, items: Vec<ItemRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Item, Operation::Create, |d| d.create_items(items))
    }

    fn update_items(&self, items: Vec<ItemRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Item, Operation::Update, |d| d.update_items(items))
    }

    fn delete_items(&self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Item, Operation::Delete, |d| d.delete_items(ids))
    }

    fn get_triggers(&self, query: &TriggerQuery) -> StoreResult<Vec<TriggerRecord>> {
        self.read(EntityKind::Trigger, |s| s.select_triggers(query))
    }

    fn create_triggers(&self, triggers: Vec<TriggerRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Trigger, Operation::Create, |d| {
            d.create_triggers(triggers)
        })
    }

    fn update_triggers(&self, triggers: Vec<TriggerRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Trigger, Operation::Update, |d| {
            d.update_triggers(triggers)
        })
    }

    fn delete_triggers(&self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Trigger, Operation::Delete, |d| d.delete_triggers(ids))
    }

    fn get_trigger_dependencies(&self, ids: &[EntityId]) -> StoreResult<Vec<DependencyEdge>> {
        self.read(EntityKind::Trigger, |s| {
            ids.iter()
                .filter_map(|id| s.triggers.get(*id))
                .flat_map(|t| {
                    t.dependency_ids
                        .iter()
                        .map(move |up| DependencyEdge { down: t.id, up: *up })
                })
                .collect()
        })
    }

    fn set_trigger_dependencies(
        &self,
        dependencies: &[(EntityId, Vec<EntityId>)],
    ) -> StoreResult<()> {
        self.write(EntityKind::Trigger, Operation::Update, |d| {
            d.set_trigger_dependencies(dependencies)
        })
    }

    fn get_graphs(&self, query: &GraphQuery) -> StoreResult<Vec<GraphRecord>> {
        self.read(EntityKind::Graph, |s| s.select_graphs(query))
    }

    fn create_graphs(&self, graphs: Vec<GraphRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Graph, Operation::Create, |d| d.create_graphs(graphs))
    }

    fn update_graphs(&self, graphs: Vec<GraphRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Graph, Operation::Update, |d| d.update_graphs(graphs))
    }

    fn delete_graphs(&self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Graph, Operation::Delete, |d| d.delete_graphs(ids))
    }

    fn get_host_prototypes(
        &self,
        query: &HostPrototypeQuery,
    ) -> StoreResult<Vec<HostPrototypeRecord>> {
        self.read(EntityKind::HostPrototype, |s| s.select_host_prototypes(query))
    }

    fn create_host_prototypes(
        &self,
        prototypes: Vec<HostPrototypeRecord>,
    ) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::HostPrototype, Operation::Create, |d| {
            d.create_host_prototypes(prototypes)
        })
    }

    fn update_host_prototypes(
        &self,
        prototypes: Vec<HostPrototypeRecord>,
    ) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::HostPrototype, Operation::Update, |d| {
            d.update_host_prototypes(prototypes)
        })
    }

    fn delete_host_prototypes(&self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::HostPrototype, Operation::Delete, |d| {
            d.delete_host_prototypes(ids)
        })
    }

    fn get_images(&self, names: Option<&[String]>) -> StoreResult<Vec<ImageRecord>> {
        self.read(EntityKind::Image, |s| {
            StoreState::select_named(&s.images, names, |i| i.name.as_str())
        })
    }

    fn create_images(&self, images: Vec<ImageRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Image, Operation::Create, |d| d.create_images(images))
    }

    fn update_images(&self, images: Vec<ImageRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Image, Operation::Update, |d| d.update_images(images))
    }

    fn get_maps(&self, names: Option<&[String]>) -> StoreResult<Vec<MapRecord>> {
        self.read(EntityKind::Map, |s| {
            StoreState::select_named(&s.maps, names, |m| m.name.as_str())
        })
    }

    fn create_maps(&self, maps: Vec<MapRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Map, Operation::Create, |d| d.create_maps(maps))
    }

    fn update_maps(&self, maps: Vec<MapRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Map, Operation::Update, |d| d.update_maps(maps))
    }

    fn get_screens(&self, query: &ScreenQuery) -> StoreResult<Vec<ScreenRecord>> {
        self.read(EntityKind::Screen, |s| s.select_screens(query))
    }

    fn create_screens(&self, screens: Vec<ScreenRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Screen, Operation::Create, |d| d.create_screens(screens))
    }

    fn update_screens(&self, screens: Vec<ScreenRecord>) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Screen, Operation::Update, |d| d.update_screens(screens))
    }

    fn delete_screens(&self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>> {
        self.write(EntityKind::Screen, Operation::Delete, |d| d.delete_screens(ids))
    }

    fn begin(&self) -> StoreResult<()> {
        let mut saved = self.saved.lock();
        if saved.is_some() {
            return Err(StoreError::invalid_operation("A transaction is already open."));
        }
        *saved = Some((self.state.read().clone(), self.journal.read().len()));
        self.stats.record_transaction_start();
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        if self.saved.lock().take().is_none() {
            return Err(StoreError::invalid_operation("No transaction is open."));
        }
        self.stats.record_transaction_commit();
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        let (state, journal_len) = self
            .saved
            .lock()
            .take()
            .ok_or_else(|| StoreError::invalid_operation("No transaction is open."))?;
        *self.state.write() = state;
        self.journal.write().truncate(journal_len);
        self.stats.record_transaction_rollback();
        debug!(journal_len, "store rolled back");
        Ok(())
    }
}
