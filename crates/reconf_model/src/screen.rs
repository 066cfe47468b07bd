//! Screens and template screens.

use serde::{Deserialize, Serialize};

/// Resource shown in a screen cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScreenResource {
    /// Custom graph of a host.
    Graph {
        /// Host owning the graph.
        host: String,
        /// Graph name.
        name: String,
    },
    /// Ad-hoc graph of a single item.
    SimpleGraph {
        /// Host owning the item.
        host: String,
        /// Item key.
        key: String,
    },
    /// Latest values of an item as text.
    PlainText {
        /// Host owning the item.
        host: String,
        /// Item key.
        key: String,
    },
    /// A network map.
    Map {
        /// Map name.
        name: String,
    },
    /// Another screen, nested.
    Screen {
        /// Screen name.
        name: String,
    },
    /// Problems of a host group.
    HostGroupTriggers {
        /// Group name.
        group: String,
    },
    /// Problems of a host.
    HostTriggers {
        /// Host name.
        host: String,
    },
    /// Host availability summary of a group.
    HostsInfo {
        /// Group name.
        group: String,
    },
    /// Trigger summary of a group.
    TriggersInfo {
        /// Group name.
        group: String,
    },
    /// Trigger overview of a group.
    TriggersOverview {
        /// Group name.
        group: String,
    },
    /// Data overview of a group.
    DataOverview {
        /// Group name.
        group: String,
    },
    /// Graph prototype rendered for every discovered entity.
    LldGraph {
        /// Host owning the graph prototype.
        host: String,
        /// Graph prototype name.
        name: String,
    },
    /// Item prototype graphed for every discovered entity.
    LldSimpleGraph {
        /// Host owning the item prototype.
        host: String,
        /// Item prototype key.
        key: String,
    },
    /// Clock.
    Clock,
    /// Embedded web page.
    Url {
        /// Page address.
        url: String,
    },
    /// Server information.
    ServerInfo,
    /// System status.
    SystemStatus,
    /// Action log.
    ActionLog,
    /// Event history.
    Events,
}

/// Cell of a screen grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenItem {
    /// What the cell shows.
    pub resource: ScreenResource,
    /// Column.
    #[serde(default)]
    pub x: u32,
    /// Row.
    #[serde(default)]
    pub y: u32,
    /// Columns spanned.
    #[serde(default = "default_span")]
    pub colspan: u32,
    /// Rows spanned.
    #[serde(default = "default_span")]
    pub rowspan: u32,
    /// Width of the rendered resource.
    #[serde(default)]
    pub width: u32,
    /// Height of the rendered resource.
    #[serde(default)]
    pub height: u32,
}

fn default_span() -> u32 {
    1
}

/// Screen or template screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    /// Screen name; global for screens, per template for template screens.
    pub name: String,
    /// Number of columns.
    #[serde(default = "default_span")]
    pub hsize: u32,
    /// Number of rows.
    #[serde(default = "default_span")]
    pub vsize: u32,
    /// Cells.
    #[serde(default)]
    pub screenitems: Vec<ScreenItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_cells_are_tagged() {
        let screen: Screen = serde_json::from_str(
            r#"{
                "name": "Web overview",
                "hsize": 2,
                "screenitems": [
                    {"resource": {"type": "graph", "host": "web1", "name": "CPU load"}},
                    {"resource": {"type": "clock"}, "x": 1},
                    {"resource": {"type": "url", "url": "https://status.example.com"}, "y": 1}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(screen.vsize, 1);
        assert_eq!(screen.screenitems[1].resource, ScreenResource::Clock);
        assert_eq!(screen.screenitems[0].colspan, 1);
    }
}
