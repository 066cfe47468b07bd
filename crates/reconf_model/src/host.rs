//! Groups, templates and hosts.

use serde::{Deserialize, Serialize};

/// Host group declared by a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group name, the natural key.
    pub name: String,
}

/// Reference to a host group by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupRef {
    /// Referenced group name.
    pub name: String,
}

/// Reference to a template by its technical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateRef {
    /// Referenced template name.
    pub name: String,
}

/// Reference to a proxy by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyRef {
    /// Referenced proxy name.
    pub name: String,
}

/// User macro defined on a host or template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMacro {
    /// Macro name including braces, e.g. `{$PORT}`.
    #[serde(rename = "macro")]
    pub name: String,
    /// Macro value.
    #[serde(default)]
    pub value: String,
}

/// Template declared by a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Technical name, the natural key. Shares the namespace of host names.
    #[serde(alias = "template")]
    pub host: String,
    /// Visible name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Groups the template belongs to.
    #[serde(default)]
    pub groups: Vec<GroupRef>,
    /// Templates linked to this template.
    #[serde(default)]
    pub templates: Vec<TemplateRef>,
    /// User macros.
    #[serde(default)]
    pub macros: Vec<UserMacro>,
}

/// Monitoring status of a host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    /// Host is monitored.
    #[default]
    Monitored,
    /// Host is disabled.
    NotMonitored,
}

/// Host interface type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    /// Agent interface.
    #[default]
    Agent,
    /// SNMP interface.
    Snmp,
    /// IPMI interface.
    Ipmi,
    /// JMX interface.
    Jmx,
}

/// Network interface of a host.
///
/// `interface_ref` is local to the snapshot: items and discovery rules of
/// the same host point at the interface through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInterface {
    /// Snapshot-local reference, e.g. `if1`.
    pub interface_ref: String,
    /// Interface type.
    #[serde(rename = "type", default)]
    pub interface_type: InterfaceType,
    /// Whether this is the default interface of its type.
    #[serde(default)]
    pub main: bool,
    /// Connect by IP instead of DNS name.
    #[serde(default = "default_true")]
    pub use_ip: bool,
    /// IP address.
    #[serde(default)]
    pub ip: String,
    /// DNS name.
    #[serde(default)]
    pub dns: String,
    /// Port, possibly a macro.
    #[serde(default)]
    pub port: String,
}

fn default_true() -> bool {
    true
}

/// Host declared by a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    /// Technical name, the natural key.
    pub host: String,
    /// Visible name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Monitoring status.
    #[serde(default)]
    pub status: HostStatus,
    /// Groups the host belongs to.
    #[serde(default)]
    pub groups: Vec<GroupRef>,
    /// Linked templates.
    #[serde(default)]
    pub templates: Vec<TemplateRef>,
    /// User macros.
    #[serde(default)]
    pub macros: Vec<UserMacro>,
    /// Monitoring proxy.
    #[serde(default)]
    pub proxy: Option<ProxyRef>,
    /// Network interfaces.
    #[serde(default)]
    pub interfaces: Vec<HostInterface>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_accepts_template_field_name() {
        let template: Template =
            serde_json::from_str(r#"{"template": "Base Linux", "groups": [{"name": "Templates"}]}"#)
                .unwrap();
        assert_eq!(template.host, "Base Linux");
        assert_eq!(template.groups.len(), 1);
        assert!(template.templates.is_empty());
    }

    #[test]
    fn host_defaults() {
        let host: Host = serde_json::from_str(
            r#"{"host": "web1", "interfaces": [{"interface_ref": "if1", "ip": "10.0.0.1", "port": "10050"}]}"#,
        )
        .unwrap();
        assert_eq!(host.status, HostStatus::Monitored);
        assert!(host.proxy.is_none());
        let interface = &host.interfaces[0];
        assert!(interface.use_ip);
        assert_eq!(interface.interface_type, InterfaceType::Agent);
    }

    #[test]
    fn host_requires_name() {
        let result: Result<Host, _> = serde_json::from_str(r#"{"name": "Web"}"#);
        assert!(result.is_err());
    }
}
