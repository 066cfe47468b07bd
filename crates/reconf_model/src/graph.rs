//! Graphs and graph prototypes.

use serde::{Deserialize, Serialize};

/// Reference to an item by host name and key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemRef {
    /// Host or template name.
    pub host: String,
    /// Item key.
    pub key: String,
}

impl ItemRef {
    /// Creates an item reference.
    pub fn new(host: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.key)
    }
}

/// Graph rendering style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphType {
    /// Lines.
    #[default]
    Normal,
    /// Stacked areas.
    Stacked,
    /// Pie chart.
    Pie,
    /// Exploded pie chart.
    Exploded,
}

/// How a Y axis bound is determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisType {
    /// Derived from the plotted data.
    #[default]
    Calculated,
    /// Fixed number.
    Fixed,
    /// Last value of an item.
    ItemValue,
}

/// Plain graph attributes, copied to the store unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,
    /// Rendering style.
    #[serde(default)]
    pub graph_type: GraphType,
    /// Show legend.
    #[serde(default)]
    pub show_legend: bool,
    /// Show trigger lines.
    #[serde(default)]
    pub show_triggers: bool,
    /// Y axis minimum type.
    #[serde(default)]
    pub ymin_type: AxisType,
    /// Y axis maximum type.
    #[serde(default)]
    pub ymax_type: AxisType,
    /// Fixed Y axis minimum.
    #[serde(default)]
    pub yaxismin: f64,
    /// Fixed Y axis maximum.
    #[serde(default = "default_yaxismax")]
    pub yaxismax: f64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            graph_type: GraphType::default(),
            show_legend: false,
            show_triggers: false,
            ymin_type: AxisType::default(),
            ymax_type: AxisType::default(),
            yaxismin: 0.0,
            yaxismax: default_yaxismax(),
        }
    }
}

fn default_width() -> u32 {
    900
}

fn default_height() -> u32 {
    200
}

fn default_yaxismax() -> f64 {
    100.0
}

/// Line drawing style of a graph item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawType {
    /// Line.
    #[default]
    Line,
    /// Filled region.
    Filled,
    /// Bold line.
    Bold,
    /// Dots.
    Dot,
    /// Dashed line.
    Dashed,
    /// Gradient line.
    Gradient,
}

/// Axis a graph item is plotted against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YAxisSide {
    /// Left axis.
    #[default]
    Left,
    /// Right axis.
    Right,
}

/// Aggregation applied to a graph item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalcFunction {
    /// Minimum.
    Min,
    /// Average.
    #[default]
    Avg,
    /// Maximum.
    Max,
    /// All three.
    All,
    /// Last value.
    Last,
}

/// Plain graph item attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphItemStyle {
    /// Hex colour without leading `#`.
    #[serde(default)]
    pub color: String,
    /// Drawing style.
    #[serde(default)]
    pub drawtype: DrawType,
    /// Position in the legend.
    #[serde(default)]
    pub sortorder: u32,
    /// Y axis side.
    #[serde(default)]
    pub yaxisside: YAxisSide,
    /// Aggregation.
    #[serde(default)]
    pub calc_fnc: CalcFunction,
}

/// Item plotted by a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphItem {
    /// Plotted item.
    pub item: ItemRef,
    /// Drawing attributes.
    #[serde(flatten)]
    pub style: GraphItemStyle,
}

/// Graph or graph prototype.
///
/// A graph has no owner of its own: it belongs to every host whose items
/// it plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Graph name, unique per host.
    pub name: String,
    /// Plain attributes.
    #[serde(flatten)]
    pub settings: GraphSettings,
    /// Item providing the Y axis minimum.
    #[serde(default)]
    pub ymin_item: Option<ItemRef>,
    /// Item providing the Y axis maximum.
    #[serde(default)]
    pub ymax_item: Option<ItemRef>,
    /// Plotted items.
    #[serde(default)]
    pub gitems: Vec<GraphItem>,
}

impl Graph {
    /// Hosts of the plotted items, in first-seen order.
    #[must_use]
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = Vec::new();
        for gitem in &self.gitems {
            if !hosts.contains(&gitem.item.host.as_str()) {
                hosts.push(&gitem.item.host);
            }
        }
        hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_defaults_and_hosts() {
        let graph: Graph = serde_json::from_str(
            r#"{
                "name": "CPU load",
                "gitems": [
                    {"item": {"host": "web1", "key": "system.cpu.load"}, "color": "00AA00"},
                    {"item": {"host": "web2", "key": "system.cpu.load"}, "color": "AA0000"},
                    {"item": {"host": "web1", "key": "system.cpu.util"}, "color": "0000AA"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(graph.settings.width, 900);
        assert_eq!(graph.settings.ymin_type, AxisType::Calculated);
        assert_eq!(graph.hosts(), vec!["web1", "web2"]);
    }

    #[test]
    fn item_ref_display() {
        assert_eq!(ItemRef::new("web1", "agent.ping").to_string(), "web1:agent.ping");
    }
}
