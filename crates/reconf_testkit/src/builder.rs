//! Snapshot builder and scenarios.

use reconf_model::{
    Application, ApplicationRef, DiscoveryRule, Graph, GraphItem, GraphItemStyle, GraphSettings,
    Group, GroupRef, Host, HostStatus, Item, ItemRef, ItemSettings, MasterItemRef, Snapshot,
    Template, TemplateRef, Trigger, TriggerRef, TriggerSettings,
};

/// Builds snapshots without spelling out every default.
///
/// Groups named by hosts and templates are declared on the fly.
///
/// # Example
///
/// ```rust
/// use reconf_testkit::SnapshotBuilder;
///
/// let snapshot = SnapshotBuilder::new()
///     .template("Base Linux", "Templates")
///     .linked_host("web1", "Linux servers", &["Base Linux"])
///     .item("Base Linux", "agent.ping")
///     .trigger("Agent down", "{Base Linux:agent.ping.nodata(5m)}=1")
///     .build();
/// assert_eq!(snapshot.groups.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    /// Starts an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a group unless it is declared already.
    #[must_use]
    pub fn group(mut self, name: &str) -> Self {
        if !self.snapshot.groups.iter().any(|g| g.name == name) {
            self.snapshot.groups.push(Group {
                name: name.to_string(),
            });
        }
        self
    }

    /// Declares a template.
    #[must_use]
    pub fn template(self, name: &str, group: &str) -> Self {
        self.linked_template(name, group, &[])
    }

    /// Declares a template linked to other templates.
    #[must_use]
    pub fn linked_template(mut self, name: &str, group: &str, templates: &[&str]) -> Self {
        self = self.group(group);
        self.snapshot.templates.push(Template {
            host: name.to_string(),
            name: None,
            description: None,
            groups: vec![group_ref(group)],
            templates: template_refs(templates),
            macros: Vec::new(),
        });
        self
    }

    /// Declares a host.
    #[must_use]
    pub fn host(self, name: &str, group: &str) -> Self {
        self.linked_host(name, group, &[])
    }

    /// Declares a host linked to templates.
    #[must_use]
    pub fn linked_host(mut self, name: &str, group: &str, templates: &[&str]) -> Self {
        self = self.group(group);
        self.snapshot.hosts.push(Host {
            host: name.to_string(),
            name: None,
            description: None,
            status: HostStatus::Monitored,
            groups: vec![group_ref(group)],
            templates: template_refs(templates),
            macros: Vec::new(),
            proxy: None,
            interfaces: Vec::new(),
        });
        self
    }

    /// Declares an application on a host or template.
    #[must_use]
    pub fn application(mut self, host: &str, name: &str) -> Self {
        self.snapshot
            .applications
            .entry(host.to_string())
            .or_default()
            .push(Application {
                name: name.to_string(),
            });
        self
    }

    /// Declares an item named after its key.
    #[must_use]
    pub fn item(mut self, host: &str, key: &str) -> Self {
        self.snapshot
            .items
            .entry(host.to_string())
            .or_default()
            .push(item(key));
        self
    }

    /// Declares an item listed under applications of the same host.
    #[must_use]
    pub fn item_in(mut self, host: &str, key: &str, applications: &[&str]) -> Self {
        let mut item = item(key);
        item.applications = applications
            .iter()
            .map(|name| ApplicationRef {
                name: (*name).to_string(),
            })
            .collect();
        self.snapshot
            .items
            .entry(host.to_string())
            .or_default()
            .push(item);
        self
    }

    /// Declares a dependent item fed by `master` on the same host.
    #[must_use]
    pub fn dependent_item(mut self, host: &str, key: &str, master: &str) -> Self {
        let mut item = item(key);
        item.settings.item_type = reconf_model::ItemType::Dependent;
        item.master_item = Some(MasterItemRef {
            key: master.to_string(),
        });
        self.snapshot
            .items
            .entry(host.to_string())
            .or_default()
            .push(item);
        self
    }

    /// Declares a discovery rule with whatever prototypes it carries.
    #[must_use]
    pub fn discovery_rule(mut self, host: &str, rule: DiscoveryRule) -> Self {
        self.snapshot
            .discovery_rules
            .entry(host.to_string())
            .or_default()
            .push(rule);
        self
    }

    /// Declares a trigger.
    #[must_use]
    pub fn trigger(self, description: &str, expression: &str) -> Self {
        self.dependent_trigger(description, expression, &[])
    }

    /// Declares a trigger depending on other triggers, given as
    /// (description, expression) pairs.
    #[must_use]
    pub fn dependent_trigger(
        mut self,
        description: &str,
        expression: &str,
        dependencies: &[(&str, &str)],
    ) -> Self {
        self.snapshot.triggers.push(Trigger {
            description: description.to_string(),
            expression: expression.to_string(),
            settings: TriggerSettings::default(),
            dependencies: dependencies
                .iter()
                .map(|(description, expression)| TriggerRef {
                    description: (*description).to_string(),
                    expression: (*expression).to_string(),
                })
                .collect(),
        });
        self
    }

    /// Declares a graph plotting (host, key) items.
    #[must_use]
    pub fn graph(mut self, name: &str, items: &[(&str, &str)]) -> Self {
        self.snapshot.graphs.push(Graph {
            name: name.to_string(),
            settings: GraphSettings::default(),
            ymin_item: None,
            ymax_item: None,
            gitems: items
                .iter()
                .map(|(host, key)| GraphItem {
                    item: ItemRef::new(*host, *key),
                    style: GraphItemStyle::default(),
                })
                .collect(),
        });
        self
    }

    /// Returns the snapshot.
    #[must_use]
    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

/// An item declaration named after its key.
#[must_use]
pub fn item(key: &str) -> Item {
    Item {
        key: key.to_string(),
        settings: ItemSettings {
            name: key.to_string(),
            ..ItemSettings::default()
        },
        applications: Vec::new(),
        valuemap: None,
        interface_ref: None,
        master_item: None,
    }
}

/// An empty discovery rule declaration.
#[must_use]
pub fn discovery_rule(key: &str) -> DiscoveryRule {
    DiscoveryRule {
        key: key.to_string(),
        settings: ItemSettings {
            name: key.to_string(),
            ..ItemSettings::default()
        },
        filter: None,
        lifetime: None,
        interface_ref: None,
        item_prototypes: Vec::new(),
        trigger_prototypes: Vec::new(),
        graph_prototypes: Vec::new(),
        host_prototypes: Vec::new(),
    }
}

fn group_ref(name: &str) -> GroupRef {
    GroupRef {
        name: name.to_string(),
    }
}

fn template_refs(names: &[&str]) -> Vec<TemplateRef> {
    names
        .iter()
        .map(|name| TemplateRef {
            name: (*name).to_string(),
        })
        .collect()
}

/// Ready-made snapshots.
pub mod scenarios {
    use super::*;

    /// `hosts` hosts in one group, each with `items` items and one trigger
    /// per item. Every trigger after the first on a host depends on the one
    /// before it.
    pub fn monitored_fleet(hosts: usize, items: usize) -> Snapshot {
        let mut builder = SnapshotBuilder::new();
        for h in 0..hosts {
            let host = format!("node{h:03}");
            builder = builder.host(&host, "Fleet");
            let mut previous: Option<(String, String)> = None;
            for i in 0..items {
                let key = format!("custom.metric[{i}]");
                let description = format!("Metric {i} high on {host}");
                let expression = format!("{{{host}:{key}.last()}}>{i}");
                builder = builder.item(&host, &key);
                builder = match &previous {
                    Some((d, e)) => builder.dependent_trigger(
                        &description,
                        &expression,
                        &[(d.as_str(), e.as_str())],
                    ),
                    None => builder.trigger(&description, &expression),
                };
                previous = Some((description, expression));
            }
        }
        builder.build()
    }

    /// One template with an item, a trigger and a graph, linked to
    /// `hosts` hosts.
    pub fn templated_fleet(hosts: usize) -> Snapshot {
        let mut builder = SnapshotBuilder::new()
            .template("Base Linux", "Templates")
            .item("Base Linux", "agent.ping")
            .item("Base Linux", "system.cpu.load")
            .trigger("Agent down", "{Base Linux:agent.ping.nodata(5m)}=1")
            .graph("CPU load", &[("Base Linux", "system.cpu.load")]);
        for h in 0..hosts {
            builder = builder.linked_host(&format!("web{h}"), "Linux servers", &["Base Linux"]);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_are_declared_once() {
        let snapshot = SnapshotBuilder::new()
            .host("web1", "Linux servers")
            .host("web2", "Linux servers")
            .build();
        assert_eq!(snapshot.groups.len(), 1);
        assert_eq!(snapshot.hosts.len(), 2);
    }

    #[test]
    fn fleet_is_valid() {
        let snapshot = scenarios::monitored_fleet(3, 4);
        snapshot.validate().unwrap();
        assert_eq!(snapshot.triggers.len(), 12);
        assert_eq!(snapshot.triggers[1].dependencies.len(), 1);
        assert!(snapshot.triggers[4].dependencies.is_empty());
    }

    #[test]
    fn templated_fleet_links_every_host() {
        let snapshot = scenarios::templated_fleet(2);
        snapshot.validate().unwrap();
        assert!(snapshot
            .hosts
            .iter()
            .all(|h| h.templates[0].name == "Base Linux"));
    }
}
