//! Images and network maps.

use crate::trigger::TriggerRef;
use serde::{Deserialize, Serialize};

/// Image category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    /// Map element icon.
    #[default]
    Icon,
    /// Map background.
    Background,
}

/// Image declared by a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Image name, globally unique.
    pub name: String,
    /// Category. Only honoured when the image is created.
    #[serde(default)]
    pub imagetype: ImageType,
    /// Base64 encoded image body.
    #[serde(rename = "encodedImage")]
    pub encoded_image: String,
}

/// Reference to an image by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    /// Referenced image name.
    pub name: String,
}

/// Reference to an icon map by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IconMapRef {
    /// Referenced icon map name.
    pub name: String,
}

/// What a map element shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapElementTarget {
    /// A host, by name.
    Host {
        /// Host name.
        host: String,
    },
    /// A host group, by name.
    HostGroup {
        /// Group name.
        name: String,
    },
    /// A trigger, by natural key.
    Trigger {
        /// Trigger description.
        description: String,
        /// Trigger expression.
        expression: String,
    },
    /// Another map, by name.
    Map {
        /// Map name.
        name: String,
    },
    /// A plain image with no monitored object behind it.
    Image,
}

/// Element placed on a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapElement {
    /// Map-local element id used by links.
    pub selementid: String,
    /// Monitored object shown by the element.
    pub element: MapElementTarget,
    /// Label text.
    #[serde(default)]
    pub label: String,
    /// Horizontal position.
    #[serde(default)]
    pub x: i32,
    /// Vertical position.
    #[serde(default)]
    pub y: i32,
    /// Icon shown in the normal state.
    #[serde(default)]
    pub icon_off: Option<ImageRef>,
    /// Icon shown in the problem state.
    #[serde(default)]
    pub icon_on: Option<ImageRef>,
}

/// Trigger colouring a map link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTrigger {
    /// The trigger.
    pub trigger: TriggerRef,
    /// Colour used while the trigger is in problem state.
    #[serde(default)]
    pub color: String,
}

/// Connection between two map elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLink {
    /// First element, by map-local id.
    pub selementid1: String,
    /// Second element, by map-local id.
    pub selementid2: String,
    /// Label text.
    #[serde(default)]
    pub label: String,
    /// Default colour.
    #[serde(default)]
    pub color: String,
    /// Triggers colouring this link.
    #[serde(default)]
    pub linktriggers: Vec<LinkTrigger>,
}

/// Network map declared by a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    /// Map name, globally unique.
    pub name: String,
    /// Width in pixels.
    #[serde(default = "default_map_width")]
    pub width: u32,
    /// Height in pixels.
    #[serde(default = "default_map_height")]
    pub height: u32,
    /// Background image.
    #[serde(default)]
    pub background: Option<ImageRef>,
    /// Icon map.
    #[serde(default)]
    pub iconmap: Option<IconMapRef>,
    /// Elements.
    #[serde(default)]
    pub selements: Vec<MapElement>,
    /// Links between elements.
    #[serde(default)]
    pub links: Vec<MapLink>,
}

fn default_map_width() -> u32 {
    800
}

fn default_map_height() -> u32 {
    600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_elements_are_tagged() {
        let map: Map = serde_json::from_str(
            r#"{
                "name": "Datacenter",
                "background": {"name": "Floor plan"},
                "selements": [
                    {"selementid": "1", "element": {"type": "host", "host": "web1"}, "icon_off": {"name": "Server"}},
                    {"selementid": "2", "element": {"type": "map", "name": "Rack 4"}},
                    {"selementid": "3", "element": {"type": "image"}}
                ],
                "links": [{"selementid1": "1", "selementid2": "2", "linktriggers": [
                    {"trigger": {"description": "web1 down", "expression": "{web1:agent.ping.nodata(5m)}=1"}}
                ]}]
            }"#,
        )
        .unwrap();
        assert_eq!(map.width, 800);
        assert_eq!(
            map.selements[0].element,
            MapElementTarget::Host {
                host: "web1".to_string()
            }
        );
        assert_eq!(map.selements[2].element, MapElementTarget::Image);
        assert_eq!(map.links[0].linktriggers.len(), 1);
    }

    #[test]
    fn image_body_field_name() {
        let image: Image =
            serde_json::from_str(r#"{"name": "Server", "encodedImage": "iVBORw0KGgo="}"#).unwrap();
        assert_eq!(image.imagetype, ImageType::Icon);
        assert_eq!(image.encoded_image, "iVBORw0KGgo=");
    }
}
