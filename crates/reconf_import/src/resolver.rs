//! Natural key to id resolution.
//!
//! The resolver keeps one cache per kind. Keys are registered up front with
//! [`NaturalKeyResolver::add_refs`]; the first lookup of a kind then loads
//! every registered key of that kind with a single store query. Looking up a
//! key that was never registered registers it and reloads the kind. A key
//! that was looked up before is answered from the cache until the kind is
//! refreshed, so rows the store derives on its own, such as copies on hosts
//! linked to a template, stay invisible until [`NaturalKeyResolver::refresh`].
//!
//! Host-scoped kinds are keyed by host name, not host id, so that rows of
//! hosts created later in the same run resolve the same way.

use crate::error::ImportResult;
use reconf_model::{EntityId, TriggerRef};
use reconf_store::{
    ApplicationQuery, ConfigStore, GraphFlags, GraphQuery, HostKind, HostPrototypeQuery,
    HostQuery, HostRecord, ItemFlags, ItemQuery, ScreenQuery, StoreResult, TriggerFlags,
    TriggerQuery,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// A cache that can be invalidated with [`NaturalKeyResolver::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefKind {
    /// Host groups.
    Group,
    /// Hosts and templates.
    Host,
    /// Proxies.
    Proxy,
    /// Value maps.
    ValueMap,
    /// Icon maps.
    IconMap,
    /// Applications.
    Application,
    /// Items, discovery rules and item prototypes.
    Item,
    /// Triggers and trigger prototypes.
    Trigger,
    /// Graphs and graph prototypes.
    Graph,
    /// Host prototypes.
    HostPrototype,
    /// Images.
    Image,
    /// Maps.
    Map,
    /// Global screens.
    Screen,
    /// Template screens.
    TemplateScreen,
}

/// Natural keys to register with the resolver.
///
/// Compound keys are `(host, key)` pairs; host prototypes are
/// `(host, rule key, prototype host)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Refs {
    /// Group names.
    pub groups: BTreeSet<String>,
    /// Host and template names.
    pub hosts: BTreeSet<String>,
    /// Proxy names.
    pub proxies: BTreeSet<String>,
    /// Value map names.
    pub value_maps: BTreeSet<String>,
    /// Icon map names.
    pub icon_maps: BTreeSet<String>,
    /// Image names.
    pub images: BTreeSet<String>,
    /// Map names.
    pub maps: BTreeSet<String>,
    /// Global screen names.
    pub screens: BTreeSet<String>,
    /// `(host, application)` pairs.
    pub applications: BTreeSet<(String, String)>,
    /// `(host, key)` pairs of items, rules and item prototypes.
    pub items: BTreeSet<(String, String)>,
    /// Triggers and trigger prototypes.
    pub triggers: BTreeSet<TriggerRef>,
    /// `(host, graph)` pairs.
    pub graphs: BTreeSet<(String, String)>,
    /// `(host, rule key, prototype host)` triples.
    pub host_prototypes: BTreeSet<(String, String, String)>,
    /// `(template, screen)` pairs.
    pub template_screens: BTreeSet<(String, String)>,
}

impl Refs {
    /// Number of registered keys over all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
            + self.hosts.len()
            + self.proxies.len()
            + self.value_maps.len()
            + self.icon_maps.len()
            + self.images.len()
            + self.maps.len()
            + self.screens.len()
            + self.applications.len()
            + self.items.len()
            + self.triggers.len()
            + self.graphs.len()
            + self.host_prototypes.len()
            + self.template_screens.len()
    }

    /// Returns true if no key is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct Cache<K, V> {
    wanted: BTreeSet<K>,
    found: BTreeMap<K, V>,
    stale: bool,
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self {
            wanted: BTreeSet::new(),
            found: BTreeMap::new(),
            stale: true,
        }
    }
}

impl<K: Ord + Clone, V> Cache<K, V> {
    fn want(&mut self, key: K) {
        if self.wanted.insert(key) {
            self.stale = true;
        }
    }

    fn want_all(&mut self, keys: impl IntoIterator<Item = K>) {
        for key in keys {
            self.want(key);
        }
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.found.get(key)
    }

    fn bind(&mut self, key: K, value: V) {
        self.wanted.insert(key.clone());
        self.found.insert(key, value);
    }

    /// Reloads every wanted key if the cache is stale.
    fn load(
        &mut self,
        queries: &mut usize,
        fetch: impl FnOnce(&BTreeSet<K>) -> StoreResult<Vec<(K, V)>>,
    ) -> StoreResult<()> {
        if !self.stale {
            return Ok(());
        }
        let rows = if self.wanted.is_empty() {
            Vec::new()
        } else {
            *queries += 1;
            fetch(&self.wanted)?
        };
        self.found = rows.into_iter().collect();
        self.stale = false;
        Ok(())
    }
}

fn names(keys: &BTreeSet<String>) -> Vec<String> {
    keys.iter().cloned().collect()
}

fn owner_names<T>(keys: &BTreeSet<(String, T)>) -> BTreeSet<String> {
    keys.iter().map(|(owner, _)| owner.clone()).collect()
}

fn seconds<T: Clone>(keys: &BTreeSet<(String, T)>) -> Vec<T> {
    keys.iter().map(|(_, second)| second.clone()).collect()
}

/// Per-run cache mapping natural keys to store ids.
///
/// `resolve`-style methods never fail for a missing key; absence is
/// reported as `None`. Errors come only from the store.
pub struct NaturalKeyResolver<'s, S: ConfigStore + ?Sized> {
    store: &'s S,
    queries: usize,
    groups: Cache<String, EntityId>,
    hosts: Cache<String, HostRecord>,
    proxies: Cache<String, EntityId>,
    value_maps: Cache<String, EntityId>,
    icon_maps: Cache<String, EntityId>,
    images: Cache<String, EntityId>,
    maps: Cache<String, EntityId>,
    screens: Cache<String, EntityId>,
    applications: Cache<(String, String), EntityId>,
    items: Cache<(String, String), (EntityId, ItemFlags)>,
    triggers: Cache<TriggerRef, (EntityId, TriggerFlags)>,
    graphs: Cache<(String, String), (EntityId, GraphFlags)>,
    host_prototypes: Cache<(String, String, String), EntityId>,
    template_screens: Cache<(String, String), EntityId>,
    interfaces: BTreeMap<(String, String), EntityId>,
}

impl<'s, S: ConfigStore + ?Sized> NaturalKeyResolver<'s, S> {
    /// Creates an empty resolver over `store`.
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            queries: 0,
            groups: Cache::default(),
            hosts: Cache::default(),
            proxies: Cache::default(),
            value_maps: Cache::default(),
            icon_maps: Cache::default(),
            images: Cache::default(),
            maps: Cache::default(),
            screens: Cache::default(),
            applications: Cache::default(),
            items: Cache::default(),
            triggers: Cache::default(),
            graphs: Cache::default(),
            host_prototypes: Cache::default(),
            template_screens: Cache::default(),
            interfaces: BTreeMap::new(),
        }
    }

    /// Number of store queries issued so far.
    #[must_use]
    pub fn queries(&self) -> usize {
        self.queries
    }

    /// Registers keys without resolving them.
    pub fn add_refs(&mut self, refs: Refs) {
        self.groups.want_all(refs.groups);
        self.hosts.want_all(refs.hosts);
        self.proxies.want_all(refs.proxies);
        self.value_maps.want_all(refs.value_maps);
        self.icon_maps.want_all(refs.icon_maps);
        self.images.want_all(refs.images);
        self.maps.want_all(refs.maps);
        self.screens.want_all(refs.screens);
        self.applications.want_all(refs.applications);
        self.items.want_all(refs.items);
        self.triggers.want_all(refs.triggers);
        self.graphs.want_all(refs.graphs);
        self.host_prototypes.want_all(refs.host_prototypes);
        self.template_screens.want_all(refs.template_screens);
    }

    /// Marks a kind stale so that the next lookup reloads it.
    pub fn refresh(&mut self, kind: RefKind) {
        trace!(?kind, "resolver refresh");
        match kind {
            RefKind::Group => self.groups.stale = true,
            RefKind::Host => self.hosts.stale = true,
            RefKind::Proxy => self.proxies.stale = true,
            RefKind::ValueMap => self.value_maps.stale = true,
            RefKind::IconMap => self.icon_maps.stale = true,
            RefKind::Application => self.applications.stale = true,
            RefKind::Item => self.items.stale = true,
            RefKind::Trigger => self.triggers.stale = true,
            RefKind::Graph => self.graphs.stale = true,
            RefKind::HostPrototype => self.host_prototypes.stale = true,
            RefKind::Image => self.images.stale = true,
            RefKind::Map => self.maps.stale = true,
            RefKind::Screen => self.screens.stale = true,
            RefKind::TemplateScreen => self.template_screens.stale = true,
        }
    }

    // Global kinds.

    /// Id of a host group.
    pub fn group(&mut self, name: &str) -> ImportResult<Option<EntityId>> {
        self.groups.want(name.to_string());
        let store = self.store;
        self.groups.load(&mut self.queries, |wanted| {
            Ok(store
                .get_groups(Some(names(wanted).as_slice()))?
                .into_iter()
                .map(|g| (g.name, g.id))
                .collect())
        })?;
        Ok(self.groups.get(&name.to_string()).copied())
    }

    /// Stored record of a host or template.
    pub fn host(&mut self, name: &str) -> ImportResult<Option<HostRecord>> {
        self.hosts.want(name.to_string());
        self.load_hosts()?;
        Ok(self.hosts.get(&name.to_string()).cloned())
    }

    /// Id of a host or template.
    pub fn host_id(&mut self, name: &str) -> ImportResult<Option<EntityId>> {
        Ok(self.host(name)?.map(|h| h.id))
    }

    /// Id of a template. Hosts with that name do not match.
    pub fn template(&mut self, name: &str) -> ImportResult<Option<EntityId>> {
        Ok(self
            .host(name)?
            .filter(|h| h.kind == HostKind::Template)
            .map(|h| h.id))
    }

    fn load_hosts(&mut self) -> ImportResult<()> {
        let store = self.store;
        self.hosts.load(&mut self.queries, |wanted| {
            Ok(store
                .get_hosts(&HostQuery::new().names(wanted.iter().cloned()))?
                .into_iter()
                .map(|h| (h.host.clone(), h))
                .collect())
        })?;
        Ok(())
    }

    /// Ids of the named hosts that exist, keyed back to their names.
    fn host_ids(&mut self, names: BTreeSet<String>) -> ImportResult<BTreeMap<EntityId, String>> {
        self.hosts.want_all(names.iter().cloned());
        self.load_hosts()?;
        Ok(names
            .into_iter()
            .filter_map(|name| self.hosts.get(&name).map(|h| (h.id, name)))
            .collect())
    }

    /// Id of a proxy.
    pub fn proxy(&mut self, name: &str) -> ImportResult<Option<EntityId>> {
        self.proxies.want(name.to_string());
        let store = self.store;
        self.proxies.load(&mut self.queries, |wanted| {
            Ok(store
                .get_proxies(Some(names(wanted).as_slice()))?
                .into_iter()
                .map(|p| (p.name, p.id))
                .collect())
        })?;
        Ok(self.proxies.get(&name.to_string()).copied())
    }

    /// Id of a value map.
    pub fn value_map(&mut self, name: &str) -> ImportResult<Option<EntityId>> {
        self.value_maps.want(name.to_string());
        let store = self.store;
        self.value_maps.load(&mut self.queries, |wanted| {
            Ok(store
                .get_value_maps(Some(names(wanted).as_slice()))?
                .into_iter()
                .map(|v| (v.name, v.id))
                .collect())
        })?;
        Ok(self.value_maps.get(&name.to_string()).copied())
    }

    /// Id of an icon map.
    pub fn icon_map(&mut self, name: &str) -> ImportResult<Option<EntityId>> {
        self.icon_maps.want(name.to_string());
        let store = self.store;
        self.icon_maps.load(&mut self.queries, |wanted| {
            Ok(store
                .get_icon_maps(Some(names(wanted).as_slice()))?
                .into_iter()
                .map(|m| (m.name, m.id))
                .collect())
        })?;
        Ok(self.icon_maps.get(&name.to_string()).copied())
    }

    /// Id of an image.
    pub fn image(&mut self, name: &str) -> ImportResult<Option<EntityId>> {
        self.images.want(name.to_string());
        let store = self.store;
        self.images.load(&mut self.queries, |wanted| {
            Ok(store
                .get_images(Some(names(wanted).as_slice()))?
                .into_iter()
                .map(|i| (i.name, i.id))
                .collect())
        })?;
        Ok(self.images.get(&name.to_string()).copied())
    }

    /// Id of a map.
    pub fn map(&mut self, name: &str) -> ImportResult<Option<EntityId>> {
        self.maps.want(name.to_string());
        let store = self.store;
        self.maps.load(&mut self.queries, |wanted| {
            Ok(store
                .get_maps(Some(names(wanted).as_slice()))?
                .into_iter()
                .map(|m| (m.name, m.id))
                .collect())
        })?;
        Ok(self.maps.get(&name.to_string()).copied())
    }

    /// Id of a global screen.
    pub fn screen(&mut self, name: &str) -> ImportResult<Option<EntityId>> {
        self.screens.want(name.to_string());
        let store = self.store;
        self.screens.load(&mut self.queries, |wanted| {
            Ok(store
                .get_screens(&ScreenQuery::global().names(wanted.iter().cloned()))?
                .into_iter()
                .map(|s| (s.name, s.id))
                .collect())
        })?;
        Ok(self.screens.get(&name.to_string()).copied())
    }

    /// Id of a trigger or trigger prototype, with its role.
    pub fn trigger(&mut self, key: &TriggerRef) -> ImportResult<Option<(EntityId, TriggerFlags)>> {
        self.triggers.want(key.clone());
        let store = self.store;
        self.triggers.load(&mut self.queries, |wanted| {
            let descriptions: BTreeSet<&str> =
                wanted.iter().map(|t| t.description.as_str()).collect();
            Ok(store
                .get_triggers(&TriggerQuery::new().descriptions(descriptions))?
                .into_iter()
                .map(|t| {
                    let key = TriggerRef {
                        description: t.description,
                        expression: t.expression,
                    };
                    (key, (t.id, t.flags))
                })
                .filter(|(key, _)| wanted.contains(key))
                .collect())
        })?;
        Ok(self.triggers.get(key).copied())
    }

    // Host-scoped kinds.

    /// Id of an application.
    pub fn application(&mut self, host: &str, name: &str) -> ImportResult<Option<EntityId>> {
        let key = (host.to_string(), name.to_string());
        self.applications.want(key.clone());
        if self.applications.stale {
            let owners = self.host_ids(owner_names(&self.applications.wanted))?;
            let store = self.store;
            self.applications.load(&mut self.queries, |wanted| {
                if owners.is_empty() {
                    return Ok(Vec::new());
                }
                let query = ApplicationQuery::new()
                    .hosts(owners.keys().copied())
                    .names(seconds(wanted));
                Ok(store
                    .get_applications(&query)?
                    .into_iter()
                    .filter_map(|a| owners.get(&a.host_id).map(|h| ((h.clone(), a.name), a.id)))
                    .collect())
            })?;
        }
        Ok(self.applications.get(&key).copied())
    }

    /// Id and role of the row with `key` on `host`.
    pub fn item(&mut self, host: &str, key: &str) -> ImportResult<Option<(EntityId, ItemFlags)>> {
        let key = (host.to_string(), key.to_string());
        self.items.want(key.clone());
        self.load_items()?;
        Ok(self.items.get(&key).copied())
    }

    fn load_items(&mut self) -> ImportResult<()> {
        if !self.items.stale {
            return Ok(());
        }
        let owners = self.host_ids(owner_names(&self.items.wanted))?;
        let store = self.store;
        self.items.load(&mut self.queries, |wanted| {
            if owners.is_empty() {
                return Ok(Vec::new());
            }
            let query = ItemQuery::new()
                .hosts(owners.keys().copied())
                .keys(seconds(wanted));
            Ok(store
                .get_items(&query)?
                .into_iter()
                .filter_map(|i| {
                    owners
                        .get(&i.host_id)
                        .map(|h| ((h.clone(), i.key), (i.id, i.flags)))
                })
                .collect())
        })?;
        Ok(())
    }

    /// Id and role of the graph named `name` on `host`.
    pub fn graph(&mut self, host: &str, name: &str) -> ImportResult<Option<(EntityId, GraphFlags)>> {
        let key = (host.to_string(), name.to_string());
        self.graphs.want(key.clone());
        if self.graphs.stale {
            let owners = self.host_ids(owner_names(&self.graphs.wanted))?;
            let store = self.store;
            self.graphs.load(&mut self.queries, |wanted| {
                if owners.is_empty() {
                    return Ok(Vec::new());
                }
                let query = GraphQuery::new()
                    .hosts(owners.keys().copied())
                    .names(seconds(wanted));
                let mut rows = Vec::new();
                for graph in store.get_graphs(&query)? {
                    for host_id in &graph.host_ids {
                        if let Some(host) = owners.get(host_id) {
                            rows.push(((host.clone(), graph.name.clone()), (graph.id, graph.flags)));
                        }
                    }
                }
                Ok(rows)
            })?;
        }
        Ok(self.graphs.get(&key).copied())
    }

    /// Id of a host prototype of the discovery rule `rule` on `host`.
    pub fn host_prototype(
        &mut self,
        host: &str,
        rule: &str,
        name: &str,
    ) -> ImportResult<Option<EntityId>> {
        let key = (host.to_string(), rule.to_string(), name.to_string());
        self.host_prototypes.want(key.clone());
        if self.host_prototypes.stale {
            self.items.want_all(
                self.host_prototypes
                    .wanted
                    .iter()
                    .map(|(h, r, _)| (h.clone(), r.clone())),
            );
            self.load_items()?;
            let rules: BTreeMap<EntityId, (String, String)> = self
                .items
                .found
                .iter()
                .filter(|(_, (_, flags))| *flags == ItemFlags::DiscoveryRule)
                .map(|(key, (id, _))| (*id, key.clone()))
                .collect();
            let store = self.store;
            self.host_prototypes.load(&mut self.queries, |wanted| {
                if rules.is_empty() {
                    return Ok(Vec::new());
                }
                let query = HostPrototypeQuery::new()
                    .rules(rules.keys().copied())
                    .hosts(wanted.iter().map(|(_, _, p)| p.clone()));
                Ok(store
                    .get_host_prototypes(&query)?
                    .into_iter()
                    .filter_map(|p| {
                        rules
                            .get(&p.rule_id)
                            .map(|(h, r)| ((h.clone(), r.clone(), p.host), p.id))
                    })
                    .collect())
            })?;
        }
        Ok(self.host_prototypes.get(&key).copied())
    }

    /// Id of a screen of `template`.
    pub fn template_screen(&mut self, template: &str, name: &str) -> ImportResult<Option<EntityId>> {
        let key = (template.to_string(), name.to_string());
        self.template_screens.want(key.clone());
        if self.template_screens.stale {
            let owners = self.host_ids(owner_names(&self.template_screens.wanted))?;
            let store = self.store;
            self.template_screens.load(&mut self.queries, |wanted| {
                if owners.is_empty() {
                    return Ok(Vec::new());
                }
                let query = ScreenQuery::of_templates(owners.keys().copied()).names(seconds(wanted));
                Ok(store
                    .get_screens(&query)?
                    .into_iter()
                    .filter_map(|s| {
                        s.template_id
                            .and_then(|t| owners.get(&t))
                            .map(|t| ((t.clone(), s.name), s.id))
                    })
                    .collect())
            })?;
        }
        Ok(self.template_screens.get(&key).copied())
    }

    /// Store id of the interface a snapshot host calls `interface_ref`.
    ///
    /// Interface references are local to the snapshot, so only interfaces
    /// bound during this run resolve.
    #[must_use]
    pub fn interface(&self, host: &str, interface_ref: &str) -> Option<EntityId> {
        self.interfaces
            .get(&(host.to_string(), interface_ref.to_string()))
            .copied()
    }

    // Binding freshly written rows.

    /// Records a created group.
    pub fn bind_group(&mut self, name: &str, id: EntityId) {
        self.groups.bind(name.to_string(), id);
    }

    /// Records a created or updated host or template.
    pub fn bind_host(&mut self, record: HostRecord) {
        self.hosts.bind(record.host.clone(), record);
    }

    /// Records an interface reference of a host.
    pub fn bind_interface(&mut self, host: &str, interface_ref: &str, id: EntityId) {
        self.interfaces
            .insert((host.to_string(), interface_ref.to_string()), id);
    }

    /// Records a created application.
    pub fn bind_application(&mut self, host: &str, name: &str, id: EntityId) {
        self.applications
            .bind((host.to_string(), name.to_string()), id);
    }

    /// Records a created item, discovery rule or item prototype.
    pub fn bind_item(&mut self, host: &str, key: &str, id: EntityId, flags: ItemFlags) {
        self.items
            .bind((host.to_string(), key.to_string()), (id, flags));
    }

    /// Records a created trigger or trigger prototype.
    pub fn bind_trigger(&mut self, key: TriggerRef, id: EntityId, flags: TriggerFlags) {
        self.triggers.bind(key, (id, flags));
    }

    /// Records a created graph or graph prototype on each of its hosts.
    pub fn bind_graph<'a>(
        &mut self,
        hosts: impl IntoIterator<Item = &'a str>,
        name: &str,
        id: EntityId,
        flags: GraphFlags,
    ) {
        for host in hosts {
            self.graphs
                .bind((host.to_string(), name.to_string()), (id, flags));
        }
    }

    /// Records a created host prototype.
    pub fn bind_host_prototype(&mut self, host: &str, rule: &str, name: &str, id: EntityId) {
        self.host_prototypes
            .bind((host.to_string(), rule.to_string(), name.to_string()), id);
    }

    /// Records a created image.
    pub fn bind_image(&mut self, name: &str, id: EntityId) {
        self.images.bind(name.to_string(), id);
    }

    /// Records a created map.
    pub fn bind_map(&mut self, name: &str, id: EntityId) {
        self.maps.bind(name.to_string(), id);
    }

    /// Records a created global screen.
    pub fn bind_screen(&mut self, name: &str, id: EntityId) {
        self.screens.bind(name.to_string(), id);
    }

    /// Records a created template screen.
    pub fn bind_template_screen(&mut self, template: &str, name: &str, id: EntityId) {
        self.template_screens
            .bind((template.to_string(), name.to_string()), id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconf_store::MemoryStore;
    use reconf_testkit::fixtures::{create_group, create_host, create_item, create_trigger};

    fn refs_for_web1() -> Refs {
        let mut refs = Refs::default();
        refs.groups.insert("Linux servers".into());
        refs.hosts.insert("web1".into());
        refs.items.insert(("web1".into(), "agent.ping".into()));
        refs.items.insert(("web1".into(), "system.uptime".into()));
        refs
    }

    #[test]
    fn one_query_per_kind() {
        let store = MemoryStore::new();
        let group = create_group(&store, "Linux servers");
        let host = create_host(&store, "web1", HostKind::Host, group);
        let ping = create_item(&store, host, "agent.ping");
        let uptime = create_item(&store, host, "system.uptime");

        let mut resolver = NaturalKeyResolver::new(&store);
        resolver.add_refs(refs_for_web1());
        assert_eq!(resolver.queries(), 0);

        assert_eq!(resolver.group("Linux servers").unwrap(), Some(group));
        assert_eq!(
            resolver.item("web1", "agent.ping").unwrap(),
            Some((ping, ItemFlags::Normal))
        );
        assert_eq!(
            resolver.item("web1", "system.uptime").unwrap(),
            Some((uptime, ItemFlags::Normal))
        );
        // groups, hosts, items
        assert_eq!(resolver.queries(), 3);
    }

    #[test]
    fn absence_is_not_an_error() {
        let store = MemoryStore::new();
        let mut resolver = NaturalKeyResolver::new(&store);
        assert_eq!(resolver.group("Nope").unwrap(), None);
        assert_eq!(resolver.item("ghost", "agent.ping").unwrap(), None);
        assert!(resolver.interface("ghost", "if1").is_none());
    }

    #[test]
    fn unregistered_keys_reload_the_kind() {
        let store = MemoryStore::new();
        let mut resolver = NaturalKeyResolver::new(&store);
        assert_eq!(resolver.group("Linux servers").unwrap(), None);

        let group = create_group(&store, "Databases");
        assert_eq!(resolver.group("Databases").unwrap(), Some(group));
    }

    #[test]
    fn bound_ids_resolve_without_a_query() {
        let store = MemoryStore::new();
        let mut resolver = NaturalKeyResolver::new(&store);
        resolver.add_refs(refs_for_web1());
        assert_eq!(resolver.group("Linux servers").unwrap(), None);
        let queries = resolver.queries();

        resolver.bind_group("Linux servers", EntityId::new(42));
        assert_eq!(resolver.group("Linux servers").unwrap(), Some(EntityId::new(42)));
        assert_eq!(resolver.queries(), queries);
    }

    #[test]
    fn refresh_sees_rows_written_behind_the_cache() {
        let store = MemoryStore::new();
        let group = create_group(&store, "Linux servers");
        let host = create_host(&store, "web1", HostKind::Host, group);

        let mut resolver = NaturalKeyResolver::new(&store);
        resolver.add_refs(refs_for_web1());
        assert_eq!(resolver.item("web1", "agent.ping").unwrap(), None);

        let ping = create_item(&store, host, "agent.ping");
        assert_eq!(resolver.item("web1", "agent.ping").unwrap(), None);

        resolver.refresh(RefKind::Item);
        assert_eq!(
            resolver.item("web1", "agent.ping").unwrap(),
            Some((ping, ItemFlags::Normal))
        );
    }

    #[test]
    fn templates_do_not_resolve_as_hosts_and_back() {
        let store = MemoryStore::new();
        let group = create_group(&store, "Templates");
        let template = create_host(&store, "Base Linux", HostKind::Template, group);
        create_host(&store, "web1", HostKind::Host, group);

        let mut resolver = NaturalKeyResolver::new(&store);
        assert_eq!(resolver.template("Base Linux").unwrap(), Some(template));
        assert_eq!(resolver.template("web1").unwrap(), None);
        assert!(resolver.host_id("web1").unwrap().is_some());
    }

    #[test]
    fn triggers_match_on_description_and_expression() {
        let store = MemoryStore::new();
        let group = create_group(&store, "Linux servers");
        let host = create_host(&store, "web1", HostKind::Host, group);
        create_item(&store, host, "agent.ping");
        let id = create_trigger(&store, "web1 down", "{web1:agent.ping.nodata(5m)}=1");

        let mut resolver = NaturalKeyResolver::new(&store);
        let key = TriggerRef {
            description: "web1 down".into(),
            expression: "{web1:agent.ping.nodata(5m)}=1".into(),
        };
        assert_eq!(
            resolver.trigger(&key).unwrap(),
            Some((id, TriggerFlags::Normal))
        );
        let other = TriggerRef {
            description: "web1 down".into(),
            expression: "{web1:agent.ping.nodata(10m)}=1".into(),
        };
        assert_eq!(resolver.trigger(&other).unwrap(), None);
    }

    #[test]
    fn interfaces_are_bound_per_host() {
        let store = MemoryStore::new();
        let mut resolver = NaturalKeyResolver::new(&store);
        resolver.bind_interface("web1", "if1", EntityId::new(7));
        assert_eq!(resolver.interface("web1", "if1"), Some(EntityId::new(7)));
        assert_eq!(resolver.interface("web2", "if1"), None);
    }
}
