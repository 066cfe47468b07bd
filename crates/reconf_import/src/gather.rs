//! Reference gathering.
//!
//! One pass over the formatted snapshot that collects every natural key it
//! declares or references, so the resolver can load each kind with a single
//! query. Nothing is written and nothing is resolved here.

use crate::formatted::{FormattedSnapshot, ParsedTrigger};
use crate::resolver::Refs;
use reconf_model::{
    Graph, Host, HostPrototype, Item, MapElementTarget, ScreenResource, Template, TriggerRef,
};

/// Collects natural keys from a snapshot.
#[derive(Debug, Default)]
pub struct ReferenceGatherer {
    refs: Refs,
}

impl ReferenceGatherer {
    /// Creates an empty gatherer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks every collection of `formatted` and returns the keys found.
    #[must_use]
    pub fn gather(mut self, formatted: &FormattedSnapshot<'_>) -> Refs {
        let snapshot = formatted.snapshot();

        for group in &snapshot.groups {
            self.group(&group.name);
        }
        for template in &snapshot.templates {
            self.template(template);
        }
        for host in &snapshot.hosts {
            self.host(host);
        }

        for (host, applications) in &snapshot.applications {
            self.host_name(host);
            for application in applications {
                self.application(host, &application.name);
            }
        }
        for (host, items) in &snapshot.items {
            self.host_name(host);
            for item in items {
                self.item(host, item);
            }
        }
        for view in formatted.rules() {
            let (host, rule) = (view.host, view.rule);
            self.host_name(host);
            self.item_key(host, &rule.key);
            for prototype in &rule.item_prototypes {
                self.item(host, prototype);
            }
            for prototype in &view.trigger_prototypes {
                self.trigger(prototype);
            }
            for prototype in &rule.graph_prototypes {
                self.graph_on(host, prototype);
            }
            for prototype in &rule.host_prototypes {
                self.host_prototype(host, &rule.key, prototype);
            }
        }

        for trigger in formatted.triggers() {
            self.trigger(trigger);
        }
        for graph in &snapshot.graphs {
            for host in graph.hosts() {
                self.graph_on(host, graph);
            }
        }

        for image in &snapshot.images {
            self.refs.images.insert(image.name.clone());
        }
        for map in &snapshot.maps {
            self.refs.maps.insert(map.name.clone());
            if let Some(background) = &map.background {
                self.refs.images.insert(background.name.clone());
            }
            if let Some(iconmap) = &map.iconmap {
                self.refs.icon_maps.insert(iconmap.name.clone());
            }
            for element in &map.selements {
                match &element.element {
                    MapElementTarget::Host { host } => self.host_name(host),
                    MapElementTarget::HostGroup { name } => self.group(name),
                    MapElementTarget::Trigger {
                        description,
                        expression,
                    } => self.trigger_ref(TriggerRef {
                        description: description.clone(),
                        expression: expression.clone(),
                    }),
                    MapElementTarget::Map { name } => {
                        self.refs.maps.insert(name.clone());
                    }
                    MapElementTarget::Image => {}
                }
                for icon in [&element.icon_off, &element.icon_on].into_iter().flatten() {
                    self.refs.images.insert(icon.name.clone());
                }
            }
            for link in &map.links {
                for link_trigger in &link.linktriggers {
                    self.trigger_ref(link_trigger.trigger.clone());
                }
            }
        }

        for screen in &snapshot.screens {
            self.refs.screens.insert(screen.name.clone());
            for cell in &screen.screenitems {
                self.resource(&cell.resource);
            }
        }
        for (template, screens) in &snapshot.template_screens {
            self.host_name(template);
            for screen in screens {
                self.refs
                    .template_screens
                    .insert((template.clone(), screen.name.clone()));
                for cell in &screen.screenitems {
                    self.resource(&cell.resource);
                }
            }
        }

        self.refs
    }

    fn group(&mut self, name: &str) {
        self.refs.groups.insert(name.to_string());
    }

    fn host_name(&mut self, name: &str) {
        self.refs.hosts.insert(name.to_string());
    }

    fn template(&mut self, template: &Template) {
        self.host_name(&template.host);
        for group in &template.groups {
            self.group(&group.name);
        }
        for linked in &template.templates {
            self.host_name(&linked.name);
        }
    }

    fn host(&mut self, host: &Host) {
        self.host_name(&host.host);
        for group in &host.groups {
            self.group(&group.name);
        }
        for linked in &host.templates {
            self.host_name(&linked.name);
        }
        if let Some(proxy) = &host.proxy {
            self.refs.proxies.insert(proxy.name.clone());
        }
    }

    fn application(&mut self, host: &str, name: &str) {
        self.refs
            .applications
            .insert((host.to_string(), name.to_string()));
    }

    fn item_key(&mut self, host: &str, key: &str) {
        self.refs.items.insert((host.to_string(), key.to_string()));
    }

    fn item(&mut self, host: &str, item: &Item) {
        self.item_key(host, &item.key);
        for application in &item.applications {
            self.application(host, &application.name);
        }
        if let Some(valuemap) = &item.valuemap {
            self.refs.value_maps.insert(valuemap.name.clone());
        }
        if let Some(master) = &item.master_item {
            self.item_key(host, &master.key);
        }
    }

    fn trigger_ref(&mut self, key: TriggerRef) {
        self.refs.triggers.insert(key);
    }

    fn trigger(&mut self, parsed: &ParsedTrigger<'_>) {
        self.trigger_ref(parsed.trigger.key());
        for dependency in &parsed.trigger.dependencies {
            self.trigger_ref(dependency.clone());
        }
        for function_macro in parsed.expression.function_macros() {
            self.host_name(&function_macro.host);
            self.item_key(&function_macro.host, &function_macro.key);
        }
    }

    fn graph_on(&mut self, host: &str, graph: &Graph) {
        self.refs
            .graphs
            .insert((host.to_string(), graph.name.clone()));
        let axes = [&graph.ymin_item, &graph.ymax_item];
        let plotted = graph.gitems.iter().map(|g| &g.item);
        for item in axes.into_iter().flatten().chain(plotted) {
            self.host_name(&item.host);
            self.item_key(&item.host, &item.key);
        }
    }

    fn host_prototype(&mut self, host: &str, rule: &str, prototype: &HostPrototype) {
        self.refs.host_prototypes.insert((
            host.to_string(),
            rule.to_string(),
            prototype.host.clone(),
        ));
        for link in &prototype.group_links {
            self.group(&link.group.name);
        }
        for template in &prototype.templates {
            self.host_name(&template.name);
        }
    }

    fn resource(&mut self, resource: &ScreenResource) {
        match resource {
            ScreenResource::Graph { host, name } | ScreenResource::LldGraph { host, name } => {
                self.host_name(host);
                self.refs.graphs.insert((host.clone(), name.clone()));
            }
            ScreenResource::SimpleGraph { host, key }
            | ScreenResource::PlainText { host, key }
            | ScreenResource::LldSimpleGraph { host, key } => {
                self.host_name(host);
                self.item_key(host, key);
            }
            ScreenResource::Map { name } => {
                self.refs.maps.insert(name.clone());
            }
            ScreenResource::Screen { name } => {
                self.refs.screens.insert(name.clone());
            }
            ScreenResource::HostTriggers { host } => self.host_name(host),
            ScreenResource::HostGroupTriggers { group }
            | ScreenResource::HostsInfo { group }
            | ScreenResource::TriggersInfo { group }
            | ScreenResource::TriggersOverview { group }
            | ScreenResource::DataOverview { group } => self.group(group),
            ScreenResource::Clock
            | ScreenResource::Url { .. }
            | ScreenResource::ServerInfo
            | ScreenResource::SystemStatus
            | ScreenResource::ActionLog
            | ScreenResource::Events => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconf_model::Snapshot;

    fn gather(json: &str) -> Refs {
        let snapshot = Snapshot::from_json_str(json).unwrap();
        let formatted = FormattedSnapshot::new(&snapshot).unwrap();
        ReferenceGatherer::new().gather(&formatted)
    }

    #[test]
    fn hosts_templates_and_their_links() {
        let refs = gather(
            r#"{
                "groups": [{"name": "Linux servers"}],
                "templates": [{"host": "Base Linux", "groups": [{"name": "Templates"}]}],
                "hosts": [{
                    "host": "web1",
                    "groups": [{"name": "Linux servers"}],
                    "templates": [{"name": "Base Linux"}],
                    "proxy": {"name": "dc1"}
                }]
            }"#,
        );
        assert!(refs.groups.contains("Linux servers"));
        assert!(refs.groups.contains("Templates"));
        assert!(refs.hosts.contains("Base Linux"));
        assert!(refs.hosts.contains("web1"));
        assert!(refs.proxies.contains("dc1"));
    }

    #[test]
    fn expression_tokens_seed_items_on_other_hosts() {
        let refs = gather(
            r#"{"triggers": [{
                "description": "Both down",
                "expression": "{web1:agent.ping.nodata(5m)}=1 and {db1:agent.ping.nodata(5m)}=1",
                "dependencies": [{"description": "Switch down", "expression": "{sw1:icmpping.max(3m)}=0"}]
            }]}"#,
        );
        assert!(refs.hosts.contains("db1"));
        assert!(refs.items.contains(&("db1".to_string(), "agent.ping".to_string())));
        assert!(refs.items.contains(&("web1".to_string(), "agent.ping".to_string())));
        assert_eq!(refs.triggers.len(), 2);
    }

    #[test]
    fn nested_prototypes_maps_and_screens() {
        let refs = gather(
            r#"{
                "discoveryRules": {"Base Linux": [{
                    "key": "net.if.discovery",
                    "name": "Interfaces",
                    "item_prototypes": [{
                        "key": "net.if.in[{#IFNAME}]",
                        "name": "In",
                        "applications": [{"name": "Network"}],
                        "valuemap": {"name": "Link state"}
                    }],
                    "graph_prototypes": [{
                        "name": "Traffic {#IFNAME}",
                        "gitems": [{"item": {"host": "Base Linux", "key": "net.if.in[{#IFNAME}]"}}]
                    }],
                    "host_prototypes": [{
                        "host": "{#VM}",
                        "group_links": [{"group": {"name": "Virtual"}}],
                        "templates": [{"name": "Guest"}]
                    }]
                }]},
                "maps": [{
                    "name": "Overview",
                    "background": {"name": "World"},
                    "selements": [
                        {"selementid": "1", "element": {"type": "host", "host": "web1"}, "icon_off": {"name": "Server"}},
                        {"selementid": "2", "element": {"type": "map", "name": "Detail"}}
                    ]
                }],
                "screens": [{
                    "name": "Ops",
                    "screenitems": [
                        {"resource": {"type": "graph", "host": "web1", "name": "CPU"}},
                        {"resource": {"type": "data_overview", "group": "Linux servers"}},
                        {"resource": {"type": "clock"}}
                    ]
                }]
            }"#,
        );
        assert!(refs
            .applications
            .contains(&("Base Linux".to_string(), "Network".to_string())));
        assert!(refs.value_maps.contains("Link state"));
        assert!(refs
            .graphs
            .contains(&("Base Linux".to_string(), "Traffic {#IFNAME}".to_string())));
        assert!(refs.host_prototypes.contains(&(
            "Base Linux".to_string(),
            "net.if.discovery".to_string(),
            "{#VM}".to_string()
        )));
        assert!(refs.groups.contains("Virtual"));
        assert!(refs.hosts.contains("Guest"));
        assert!(refs.images.contains("World"));
        assert!(refs.images.contains("Server"));
        assert!(refs.maps.contains("Detail"));
        assert!(refs.graphs.contains(&("web1".to_string(), "CPU".to_string())));
        assert!(refs.groups.contains("Linux servers"));
        assert!(refs.screens.contains("Ops"));
    }

    #[test]
    fn empty_snapshot_gathers_nothing() {
        assert!(gather("{}").is_empty());
    }
}
