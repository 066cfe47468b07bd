//! The snapshot container and its up-front validation.

use crate::error::{ModelError, ModelResult};
use crate::graph::Graph;
use crate::host::{Group, Host, Template};
use crate::item::{Application, DiscoveryRule, Item};
use crate::map::{Image, Map};
use crate::screen::Screen;
use crate::trigger::Trigger;
use crate::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Read;

/// Snapshot format versions accepted by [`Snapshot::validate`].
pub const SUPPORTED_VERSIONS: &[&str] = &["2.0", "3.0"];

fn default_version() -> String {
    "2.0".to_string()
}

/// A normalized configuration snapshot.
///
/// Host-scoped collections are keyed by the technical name of the owning
/// host or template. The owner does not have to be declared in the same
/// snapshot; it may already exist in the target store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Format version of the exporter.
    #[serde(default = "default_version")]
    pub version: String,
    /// Host groups.
    #[serde(default)]
    pub groups: Vec<Group>,
    /// Templates.
    #[serde(default)]
    pub templates: Vec<Template>,
    /// Hosts.
    #[serde(default)]
    pub hosts: Vec<Host>,
    /// Applications per host or template.
    #[serde(default)]
    pub applications: BTreeMap<String, Vec<Application>>,
    /// Items per host or template.
    #[serde(default)]
    pub items: BTreeMap<String, Vec<Item>>,
    /// Discovery rules per host or template.
    #[serde(default)]
    pub discovery_rules: BTreeMap<String, Vec<DiscoveryRule>>,
    /// Triggers.
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// Graphs.
    #[serde(default)]
    pub graphs: Vec<Graph>,
    /// Images.
    #[serde(default)]
    pub images: Vec<Image>,
    /// Network maps.
    #[serde(default)]
    pub maps: Vec<Map>,
    /// Screens.
    #[serde(default)]
    pub screens: Vec<Screen>,
    /// Template screens per template.
    #[serde(default)]
    pub template_screens: BTreeMap<String, Vec<Screen>>,
}

impl Snapshot {
    /// Decodes a snapshot from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if the text is not a valid snapshot,
    /// including when a required field is missing.
    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decodes a snapshot from a JSON reader.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] on malformed input.
    pub fn from_reader<R: Read>(reader: R) -> ModelResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Encodes the snapshot as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if encoding fails.
    pub fn to_json_string(&self) -> ModelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns true if the snapshot declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
            && self.templates.is_empty()
            && self.hosts.is_empty()
            && self.applications.values().all(Vec::is_empty)
            && self.items.values().all(Vec::is_empty)
            && self.discovery_rules.values().all(Vec::is_empty)
            && self.triggers.is_empty()
            && self.graphs.is_empty()
            && self.images.is_empty()
            && self.maps.is_empty()
            && self.screens.is_empty()
            && self.template_screens.values().all(Vec::is_empty)
    }

    /// Checks the version and the uniqueness of every natural key within
    /// its scope.
    ///
    /// # Errors
    ///
    /// - [`ModelError::UnsupportedVersion`] for unknown versions
    /// - [`ModelError::DuplicateKey`] when two entities collide
    /// - [`ModelError::Invalid`] for empty keys or dangling map links
    pub fn validate(&self) -> ModelResult<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(ModelError::UnsupportedVersion {
                version: self.version.clone(),
            });
        }

        unique(
            self.groups.iter().map(|g| g.name.as_str()),
            EntityKind::Group,
        )?;
        unique(
            self.templates
                .iter()
                .map(|t| t.host.as_str())
                .chain(self.hosts.iter().map(|h| h.host.as_str())),
            EntityKind::Host,
        )?;
        unique(self.images.iter().map(|i| i.name.as_str()), EntityKind::Image)?;
        unique(self.maps.iter().map(|m| m.name.as_str()), EntityKind::Map)?;
        unique(self.screens.iter().map(|s| s.name.as_str()), EntityKind::Screen)?;

        for (host, applications) in &self.applications {
            unique_on(
                applications.iter().map(|a| a.name.as_str()),
                EntityKind::Application,
                host,
            )?;
        }
        for (template, screens) in &self.template_screens {
            unique_on(
                screens.iter().map(|s| s.name.as_str()),
                EntityKind::TemplateScreen,
                template,
            )?;
        }

        self.validate_item_keys()?;
        self.validate_triggers()?;
        self.validate_graphs()?;
        self.validate_maps()
    }

    fn validate_item_keys(&self) -> ModelResult<()> {
        let owners: BTreeSet<&String> = self.items.keys().chain(self.discovery_rules.keys()).collect();
        for host in owners {
            let items = self
                .items
                .get(host)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let rules = self
                .discovery_rules
                .get(host)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let mut seen = HashSet::new();
            let keys = items
                .iter()
                .map(|i| (EntityKind::Item, i.key.as_str()))
                .chain(rules.iter().map(|r| (EntityKind::DiscoveryRule, r.key.as_str())))
                .chain(rules.iter().flat_map(|r| {
                    r.item_prototypes
                        .iter()
                        .map(|p| (EntityKind::ItemPrototype, p.key.as_str()))
                }));
            for (kind, key) in keys {
                if key.is_empty() {
                    return Err(ModelError::invalid(format!(
                        "{kind} with an empty key on \"{host}\""
                    )));
                }
                if !seen.insert(key) {
                    return Err(ModelError::duplicate_on(kind, key, host));
                }
            }

            for rule in rules {
                unique_on(
                    rule.host_prototypes.iter().map(|p| p.host.as_str()),
                    EntityKind::HostPrototype,
                    &rule.key,
                )?;
            }
        }
        Ok(())
    }

    fn validate_triggers(&self) -> ModelResult<()> {
        let mut seen = HashSet::new();
        let prototypes = self
            .discovery_rules
            .values()
            .flatten()
            .flat_map(|r| r.trigger_prototypes.iter())
            .map(|t| (EntityKind::TriggerPrototype, t));
        let triggers = self.triggers.iter().map(|t| (EntityKind::Trigger, t));
        for (kind, trigger) in triggers.chain(prototypes) {
            if trigger.description.is_empty() {
                return Err(ModelError::invalid(format!(
                    "{kind} with expression \"{}\" has an empty description",
                    trigger.expression
                )));
            }
            if !seen.insert((trigger.description.as_str(), trigger.expression.as_str())) {
                return Err(ModelError::duplicate(kind, trigger.description.clone()));
            }
        }
        Ok(())
    }

    fn validate_graphs(&self) -> ModelResult<()> {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        for graph in &self.graphs {
            for host in graph.hosts() {
                if !seen.insert((host, graph.name.as_str())) {
                    return Err(ModelError::duplicate_on(EntityKind::Graph, &graph.name, host));
                }
            }
        }
        for (host, rules) in &self.discovery_rules {
            for graph in rules.iter().flat_map(|r| r.graph_prototypes.iter()) {
                if !seen.insert((host.as_str(), graph.name.as_str())) {
                    return Err(ModelError::duplicate_on(
                        EntityKind::GraphPrototype,
                        &graph.name,
                        host,
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_maps(&self) -> ModelResult<()> {
        for map in &self.maps {
            let ids: HashSet<&str> = map.selements.iter().map(|e| e.selementid.as_str()).collect();
            if ids.len() != map.selements.len() {
                return Err(ModelError::invalid(format!(
                    "map \"{}\" has duplicate element ids",
                    map.name
                )));
            }
            for link in &map.links {
                for end in [&link.selementid1, &link.selementid2] {
                    if !ids.contains(end.as_str()) {
                        return Err(ModelError::invalid(format!(
                            "link of map \"{}\" points at unknown element \"{end}\"",
                            map.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn unique<'a>(keys: impl Iterator<Item = &'a str>, kind: EntityKind) -> ModelResult<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(ModelError::duplicate(kind, key));
        }
    }
    Ok(())
}

fn unique_on<'a>(
    keys: impl Iterator<Item = &'a str>,
    kind: EntityKind,
    owner: &str,
) -> ModelResult<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(ModelError::duplicate_on(kind, key, owner));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Snapshot {
        Snapshot::from_json_str(json).unwrap()
    }

    #[test]
    fn collections_use_camel_case() {
        let snapshot = parse(
            r#"{
                "discoveryRules": {"web1": [{"key": "net.if.discovery", "name": "Interfaces"}]},
                "templateScreens": {"Base Linux": [{"name": "Overview"}]}
            }"#,
        );
        assert_eq!(snapshot.version, "2.0");
        assert_eq!(snapshot.discovery_rules["web1"].len(), 1);
        assert_eq!(snapshot.template_screens["Base Linux"][0].name, "Overview");
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = Snapshot::default();
        assert!(snapshot.is_empty());
        assert!(!parse(r#"{"groups": [{"name": "A"}]}"#).is_empty());
    }

    #[test]
    fn rejects_unknown_version() {
        let snapshot = parse(r#"{"version": "1.8"}"#);
        assert!(matches!(
            snapshot.validate(),
            Err(ModelError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn host_and_template_share_namespace() {
        let snapshot = parse(r#"{"templates": [{"host": "web1"}], "hosts": [{"host": "web1"}]}"#);
        let err = snapshot.validate().unwrap_err();
        assert!(err.to_string().contains("\"web1\""));
    }

    #[test]
    fn item_key_collides_with_discovery_rule() {
        let snapshot = parse(
            r#"{
                "items": {"web1": [{"key": "vfs.fs.discovery", "name": "A"}]},
                "discoveryRules": {"web1": [{"key": "vfs.fs.discovery", "name": "B"}]}
            }"#,
        );
        let err = snapshot.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "discovery rule \"vfs.fs.discovery\" is declared more than once on \"web1\""
        );
    }

    #[test]
    fn same_key_on_different_hosts_is_fine() {
        let snapshot = parse(
            r#"{"items": {
                "web1": [{"key": "agent.ping", "name": "Ping"}],
                "web2": [{"key": "agent.ping", "name": "Ping"}]
            }}"#,
        );
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn duplicate_trigger_pair() {
        let snapshot = parse(
            r#"{"triggers": [
                {"description": "Down", "expression": "{web1:agent.ping.nodata(5m)}=1"},
                {"description": "Down", "expression": "{web1:agent.ping.nodata(5m)}=1"}
            ]}"#,
        );
        assert!(matches!(
            snapshot.validate(),
            Err(ModelError::DuplicateKey {
                kind: EntityKind::Trigger,
                ..
            })
        ));
    }

    #[test]
    fn same_description_different_expression_is_fine() {
        let snapshot = parse(
            r#"{"triggers": [
                {"description": "Down", "expression": "{web1:agent.ping.nodata(5m)}=1"},
                {"description": "Down", "expression": "{web2:agent.ping.nodata(5m)}=1"}
            ]}"#,
        );
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn dangling_map_link() {
        let snapshot = parse(
            r#"{"maps": [{
                "name": "Net",
                "selements": [{"selementid": "1", "element": {"type": "image"}}],
                "links": [{"selementid1": "1", "selementid2": "9"}]
            }]}"#,
        );
        let err = snapshot.validate().unwrap_err();
        assert!(err.to_string().contains("unknown element \"9\""));
    }
}
