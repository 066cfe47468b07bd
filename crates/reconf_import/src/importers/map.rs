//! Network map import.

use super::SubImporter;
use crate::error::{ImportError, ImportResult};
use crate::pipeline::ImportContext;
use reconf_model::{EntityId, EntityKind, ImageRef, Map, MapElementTarget, TriggerRef};
use reconf_store::{
    ConfigStore, ElementTarget, LinkTriggerRecord, MapElementRecord, MapLinkRecord, MapRecord,
};
use tracing::debug;

/// Imports maps in two passes.
///
/// Missing maps are first created empty, so that maps of the same snapshot
/// can show each other as elements; then every map that was created or may
/// be updated is written with its elements and links resolved.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapImporter;

impl<S: ConfigStore + ?Sized> SubImporter<Map, S> for MapImporter {
    fn import(&mut self, ctx: &mut ImportContext<'_, S>, maps: &[Map]) -> ImportResult<()> {
        let policy = ctx.options.maps;

        let mut fill: Vec<(&Map, EntityId)> = Vec::new();
        let mut shells: Vec<&Map> = Vec::new();
        for map in maps {
            match ctx.resolver.map(&map.name)? {
                Some(id) if policy.update_existing => fill.push((map, id)),
                None if policy.create_missing => shells.push(map),
                _ => {}
            }
        }
        let updated = fill.len();

        if !shells.is_empty() {
            let records = shells
                .iter()
                .map(|map| MapRecord {
                    id: EntityId::default(),
                    name: map.name.clone(),
                    width: map.width,
                    height: map.height,
                    background_id: None,
                    iconmap_id: None,
                    elements: Vec::new(),
                    links: Vec::new(),
                })
                .collect();
            let ids = ctx.store.create_maps(records)?;
            for (map, id) in shells.iter().zip(&ids) {
                ctx.resolver.bind_map(&map.name, *id);
                fill.push((map, *id));
            }
            ctx.report.created(EntityKind::Map, ids.len());
        }
        if fill.is_empty() {
            return Ok(());
        }

        let mut records = Vec::with_capacity(fill.len());
        for (map, id) in fill {
            records.push(map_record(ctx, map, id)?);
        }
        debug!(maps = records.len(), "filling maps");
        ctx.store.update_maps(records)?;
        ctx.report.updated(EntityKind::Map, updated);
        Ok(())
    }
}

fn map_record<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    map: &Map,
    id: EntityId,
) -> ImportResult<MapRecord> {
    let context = format!("map \"{}\"", map.name);

    let background_id = image(ctx, map.background.as_ref(), &context)?;
    let iconmap_id = match &map.iconmap {
        Some(iconmap) => Some(
            ctx.resolver
                .icon_map(&iconmap.name)?
                .ok_or_else(|| ImportError::missing(EntityKind::IconMap, &iconmap.name, &context))?,
        ),
        None => None,
    };

    let mut elements = Vec::with_capacity(map.selements.len());
    for element in &map.selements {
        elements.push(MapElementRecord {
            selementid: element.selementid.clone(),
            target: target(ctx, &element.element, &context)?,
            label: element.label.clone(),
            x: element.x,
            y: element.y,
            icon_off_id: image(ctx, element.icon_off.as_ref(), &context)?,
            icon_on_id: image(ctx, element.icon_on.as_ref(), &context)?,
        });
    }

    let mut links = Vec::with_capacity(map.links.len());
    for link in &map.links {
        let mut triggers = Vec::with_capacity(link.linktriggers.len());
        for link_trigger in &link.linktriggers {
            triggers.push(LinkTriggerRecord {
                trigger_id: trigger(ctx, &link_trigger.trigger, &context)?,
                color: link_trigger.color.clone(),
            });
        }
        links.push(MapLinkRecord {
            selementid1: link.selementid1.clone(),
            selementid2: link.selementid2.clone(),
            label: link.label.clone(),
            color: link.color.clone(),
            triggers,
        });
    }

    Ok(MapRecord {
        id,
        name: map.name.clone(),
        width: map.width,
        height: map.height,
        background_id,
        iconmap_id,
        elements,
        links,
    })
}

fn image<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    image: Option<&ImageRef>,
    context: &str,
) -> ImportResult<Option<EntityId>> {
    let Some(image) = image else {
        return Ok(None);
    };
    ctx.resolver
        .image(&image.name)?
        .map(Some)
        .ok_or_else(|| ImportError::missing(EntityKind::Image, &image.name, context))
}

fn trigger<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    key: &TriggerRef,
    context: &str,
) -> ImportResult<EntityId> {
    ctx.resolver
        .trigger(key)?
        .map(|(id, _)| id)
        .ok_or_else(|| ImportError::missing(EntityKind::Trigger, &key.description, context))
}

fn target<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    element: &MapElementTarget,
    context: &str,
) -> ImportResult<ElementTarget> {
    Ok(match element {
        MapElementTarget::Host { host } => ElementTarget::Host(
            ctx.resolver
                .host_id(host)?
                .ok_or_else(|| ImportError::missing(EntityKind::Host, host, context))?,
        ),
        MapElementTarget::HostGroup { name } => ElementTarget::HostGroup(
            ctx.resolver
                .group(name)?
                .ok_or_else(|| ImportError::missing(EntityKind::Group, name, context))?,
        ),
        MapElementTarget::Trigger {
            description,
            expression,
        } => {
            let key = TriggerRef {
                description: description.clone(),
                expression: expression.clone(),
            };
            ElementTarget::Trigger(trigger(ctx, &key, context)?)
        }
        MapElementTarget::Map { name } => ElementTarget::Map(
            ctx.resolver
                .map(name)?
                .ok_or_else(|| ImportError::missing(EntityKind::Map, name, context))?,
        ),
        MapElementTarget::Image => ElementTarget::Image,
    })
}

#[cfg(test)]
mod tests {
    use crate::{EntityPolicy, ImportError, ImportOptions, ImportPipeline};
    use reconf_model::{EntityKind, Snapshot};
    use reconf_store::{ConfigStore, ElementTarget, MemoryStore};

    fn options() -> ImportOptions {
        ImportOptions::new()
            .with_groups(EntityPolicy::create())
            .with_hosts(EntityPolicy::upsert())
            .with_images(EntityPolicy::upsert())
            .with_maps(EntityPolicy::upsert())
    }

    const MAPS: &str = r#"{
        "groups": [{"name": "Linux servers"}],
        "hosts": [{"host": "web1", "groups": [{"name": "Linux servers"}]}],
        "images": [{"name": "Server", "encodedImage": "iVBORw0KGgo="}],
        "maps": [
            {"name": "Overview", "selements": [
                {"selementid": "1", "element": {"type": "map", "name": "Rack 4"}},
                {"selementid": "2", "element": {"type": "host", "host": "web1"}, "icon_off": {"name": "Server"}}
            ], "links": [{"selementid1": "1", "selementid2": "2"}]},
            {"name": "Rack 4", "selements": [
                {"selementid": "1", "element": {"type": "map", "name": "Overview"}}
            ]}
        ]
    }"#;

    #[test]
    fn maps_can_show_each_other() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(MAPS).unwrap();
        let report = ImportPipeline::new(&store, options()).run(&snapshot).unwrap();
        assert_eq!(report.count(EntityKind::Map).created, 2);
        assert_eq!(report.count(EntityKind::Map).updated, 0);

        let maps = store.get_maps(None).unwrap();
        let overview = maps.iter().find(|m| m.name == "Overview").unwrap();
        let rack = maps.iter().find(|m| m.name == "Rack 4").unwrap();
        assert_eq!(overview.elements[0].target, ElementTarget::Map(rack.id));
        assert_eq!(rack.elements[0].target, ElementTarget::Map(overview.id));
        assert!(overview.elements[1].icon_off_id.is_some());
        assert_eq!(overview.links.len(), 1);
    }

    #[test]
    fn existing_maps_are_refilled() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(MAPS).unwrap();
        ImportPipeline::new(&store, options()).run(&snapshot).unwrap();
        let report = ImportPipeline::new(&store, options()).run(&snapshot).unwrap();
        assert_eq!(report.count(EntityKind::Map).created, 0);
        assert_eq!(report.count(EntityKind::Map).updated, 2);
        assert_eq!(store.get_maps(None).unwrap().len(), 2);
    }

    #[test]
    fn unknown_element_host() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(
            r#"{"maps": [{"name": "Overview", "selements": [
                {"selementid": "1", "element": {"type": "host", "host": "db9"}}
            ]}]}"#,
        )
        .unwrap();
        let err = ImportPipeline::new(&store, options()).run(&snapshot).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot find host \"db9\" used by map \"Overview\"."
        );
        assert!(matches!(err, ImportError::MissingReference { .. }));
    }
}
