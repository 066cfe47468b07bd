//! The persistence contract used by the import engine.

use crate::error::StoreResult;
use crate::query::{
    ApplicationQuery, GraphQuery, HostPrototypeQuery, HostQuery, ItemQuery, ScreenQuery,
    TriggerQuery,
};
use crate::record::{
    ApplicationRecord, DependencyEdge, GraphRecord, GroupRecord, HostPrototypeRecord, HostRecord,
    IconMapRecord, ImageRecord, ItemRecord, MapRecord, ProxyRecord, ScreenRecord, TriggerRecord,
    ValueMapRecord,
};
use reconf_model::EntityId;

/// A configuration store.
///
/// Every method is one round trip. Batched calls are atomic: either every
/// record in the batch is written or the call fails and nothing is.
///
/// `create_*` ignores the ids of the given records and returns the new ids
/// in input order. `update_*` and `delete_*` return the ids they touched.
/// Name filters are exact and case sensitive.
pub trait ConfigStore {
    /// Groups, optionally filtered by name.
    fn get_groups(&self, names: Option<&[String]>) -> StoreResult<Vec<GroupRecord>>;
    /// Creates groups.
    fn create_groups(&self, groups: Vec<GroupRecord>) -> StoreResult<Vec<EntityId>>;

    /// Hosts and templates.
    fn get_hosts(&self, query: &HostQuery) -> StoreResult<Vec<HostRecord>>;
    /// Creates hosts or templates and links their templates.
    fn create_hosts(&self, hosts: Vec<HostRecord>) -> StoreResult<Vec<EntityId>>;
    /// Updates hosts or templates. Newly listed templates are linked.
    fn update_hosts(&self, hosts: Vec<HostRecord>) -> StoreResult<Vec<EntityId>>;

    /// Proxies, optionally filtered by name.
    fn get_proxies(&self, names: Option<&[String]>) -> StoreResult<Vec<ProxyRecord>>;
    /// Value maps, optionally filtered by name.
    fn get_value_maps(&self, names: Option<&[String]>) -> StoreResult<Vec<ValueMapRecord>>;
    /// Icon maps, optionally filtered by name.
    fn get_icon_maps(&self, names: Option<&[String]>) -> StoreResult<Vec<IconMapRecord>>;

    /// Applications.
    fn get_applications(&self, query: &ApplicationQuery) -> StoreResult<Vec<ApplicationRecord>>;
    /// Creates applications.
    fn create_applications(&self, apps: Vec<ApplicationRecord>) -> StoreResult<Vec<EntityId>>;
    /// Deletes applications and their inherited copies.
    fn delete_applications(&self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>>;

    /// Items, discovery rules and item prototypes.
    fn get_items(&self, query: &ItemQuery) -> StoreResult<Vec<ItemRecord>>;
    /// Creates items, discovery rules or item prototypes.
    fn create_items(&self, items: Vec<ItemRecord>) -> StoreResult<Vec<EntityId>>;
    /// Updates items, discovery rules or item prototypes.
    fn update_items(&self, items: Vec<ItemRecord>) -> StoreResult<Vec<EntityId>>;
    /// Deletes items and everything that depends on them.
    fn delete_items(&self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>>;

    /// Triggers and trigger prototypes.
    fn get_triggers(&self, query: &TriggerQuery) -> StoreResult<Vec<TriggerRecord>>;
    /// Creates triggers or trigger prototypes.
    fn create_triggers(&self, triggers: Vec<TriggerRecord>) -> StoreResult<Vec<EntityId>>;
    /// Updates triggers or trigger prototypes. Dependencies are left alone.
    fn update_triggers(&self, triggers: Vec<TriggerRecord>) -> StoreResult<Vec<EntityId>>;
    /// Deletes triggers and their inherited copies.
    fn delete_triggers(&self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>>;
    /// Persisted dependency edges whose dependent side is in `ids`.
    fn get_trigger_dependencies(&self, ids: &[EntityId]) -> StoreResult<Vec<DependencyEdge>>;
    /// Replaces the dependency lists of the given triggers.
    fn set_trigger_dependencies(&self, dependencies: &[(EntityId, Vec<EntityId>)])
        -> StoreResult<()>;

    /// Graphs and graph prototypes.
    fn get_graphs(&self, query: &GraphQuery) -> StoreResult<Vec<GraphRecord>>;
    /// Creates graphs or graph prototypes.
    fn create_graphs(&self, graphs: Vec<GraphRecord>) -> StoreResult<Vec<EntityId>>;
    /// Updates graphs or graph prototypes.
    fn update_graphs(&self, graphs: Vec<GraphRecord>) -> StoreResult<Vec<EntityId>>;
    /// Deletes graphs and their inherited copies.
    fn delete_graphs(&self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>>;

    /// Host prototypes.
    fn get_host_prototypes(
        &self,
        query: &HostPrototypeQuery,
    ) -> StoreResult<Vec<HostPrototypeRecord>>;
    /// Creates host prototypes.
    fn create_host_prototypes(
        &self,
        prototypes: Vec<HostPrototypeRecord>,
    ) -> StoreResult<Vec<EntityId>>;
    /// Updates host prototypes.
    fn update_host_prototypes(
        &self,
        prototypes: Vec<HostPrototypeRecord>,
    ) -> StoreResult<Vec<EntityId>>;
    /// Deletes host prototypes.
    fn delete_host_prototypes(&self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>>;

    /// Images, optionally filtered by name.
    fn get_images(&self, names: Option<&[String]>) -> StoreResult<Vec<ImageRecord>>;
    /// Creates images.
    fn create_images(&self, images: Vec<ImageRecord>) -> StoreResult<Vec<EntityId>>;
    /// Updates images. The image type never changes.
    fn update_images(&self, images: Vec<ImageRecord>) -> StoreResult<Vec<EntityId>>;

    /// Maps, optionally filtered by name.
    fn get_maps(&self, names: Option<&[String]>) -> StoreResult<Vec<MapRecord>>;
    /// Creates maps.
    fn create_maps(&self, maps: Vec<MapRecord>) -> StoreResult<Vec<EntityId>>;
    /// Updates maps.
    fn update_maps(&self, maps: Vec<MapRecord>) -> StoreResult<Vec<EntityId>>;

    /// Global screens or template screens.
    fn get_screens(&self, query: &ScreenQuery) -> StoreResult<Vec<ScreenRecord>>;
    /// Creates screens.
    fn create_screens(&self, screens: Vec<ScreenRecord>) -> StoreResult<Vec<EntityId>>;
    /// Updates screens.
    fn update_screens(&self, screens: Vec<ScreenRecord>) -> StoreResult<Vec<EntityId>>;
    /// Deletes screens.
    fn delete_screens(&self, ids: &[EntityId]) -> StoreResult<Vec<EntityId>>;

    /// Starts a transaction. Stores without transactions ignore it.
    fn begin(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Commits the current transaction.
    fn commit(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Discards everything written since [`ConfigStore::begin`].
    fn rollback(&self) -> StoreResult<()> {
        Ok(())
    }
}
