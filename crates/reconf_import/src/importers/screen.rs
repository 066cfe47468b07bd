//! Screen and template screen import.

use super::SubImporter;
use crate::error::{ImportError, ImportResult};
use crate::pipeline::ImportContext;
use reconf_model::{EntityId, EntityKind, ItemRef, Screen, ScreenResource};
use reconf_store::{
    ConfigStore, GraphFlags, HostQuery, ResourceRecord, ScreenItemRecord, ScreenQuery,
    ScreenRecord,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Screens declared for one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateScreens {
    /// Owning template.
    pub template: String,
    /// Its screens.
    pub screens: Vec<Screen>,
}

/// Imports global screens in two passes, like maps: empty shells first so
/// that screens may nest each other, then the cells.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenImporter;

impl<S: ConfigStore + ?Sized> SubImporter<Screen, S> for ScreenImporter {
    fn import(&mut self, ctx: &mut ImportContext<'_, S>, screens: &[Screen]) -> ImportResult<()> {
        let policy = ctx.options.screens;

        let mut fill: Vec<(&Screen, EntityId)> = Vec::new();
        let mut shells: Vec<&Screen> = Vec::new();
        for screen in screens {
            match ctx.resolver.screen(&screen.name)? {
                Some(id) if policy.update_existing => fill.push((screen, id)),
                None if policy.create_missing => shells.push(screen),
                _ => {}
            }
        }
        let updated = fill.len();

        if !shells.is_empty() {
            let records = shells
                .iter()
                .map(|screen| shell(screen, None))
                .collect();
            let ids = ctx.store.create_screens(records)?;
            for (screen, id) in shells.iter().zip(&ids) {
                ctx.resolver.bind_screen(&screen.name, *id);
                fill.push((screen, *id));
            }
            ctx.report.created(EntityKind::Screen, ids.len());
        }
        if fill.is_empty() {
            return Ok(());
        }

        let mut records = Vec::with_capacity(fill.len());
        for (screen, id) in fill {
            let context = format!("screen \"{}\"", screen.name);
            records.push(ScreenRecord {
                id,
                items: cells(ctx, screen, &context)?,
                ..shell(screen, None)
            });
        }
        debug!(screens = records.len(), "filling screens");
        ctx.store.update_screens(records)?;
        ctx.report.updated(EntityKind::Screen, updated);
        Ok(())
    }
}

/// Imports the screens of each template, then deletes screens of processed
/// templates that the snapshot no longer declares.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateScreenImporter;

impl<S: ConfigStore + ?Sized> SubImporter<TemplateScreens, S> for TemplateScreenImporter {
    fn import(
        &mut self,
        ctx: &mut ImportContext<'_, S>,
        sets: &[TemplateScreens],
    ) -> ImportResult<()> {
        let policy = ctx.options.template_screens;
        let mut creates: Vec<(&str, ScreenRecord)> = Vec::new();
        let mut updates: Vec<ScreenRecord> = Vec::new();

        if policy.writes() {
            for set in sets {
                if set.screens.is_empty() {
                    continue;
                }
                let template_id = ctx.resolver.template(&set.template)?.ok_or_else(|| {
                    ImportError::missing(EntityKind::Template, &set.template, "template screens")
                })?;
                for screen in &set.screens {
                    let context = format!(
                        "template screen \"{}\" on \"{}\"",
                        screen.name, set.template
                    );
                    match ctx.resolver.template_screen(&set.template, &screen.name)? {
                        Some(id) if policy.update_existing => updates.push(ScreenRecord {
                            id,
                            items: cells(ctx, screen, &context)?,
                            ..shell(screen, Some(template_id))
                        }),
                        None if policy.create_missing => creates.push((
                            set.template.as_str(),
                            ScreenRecord {
                                items: cells(ctx, screen, &context)?,
                                ..shell(screen, Some(template_id))
                            },
                        )),
                        _ => {}
                    }
                }
            }
        }

        if !creates.is_empty() {
            let records = creates.iter().map(|(_, r)| r.clone()).collect();
            let ids = ctx.store.create_screens(records)?;
            for ((template, record), id) in creates.iter().zip(&ids) {
                ctx.resolver.bind_template_screen(template, &record.name, *id);
            }
            ctx.report.created(EntityKind::TemplateScreen, ids.len());
        }
        if !updates.is_empty() {
            let ids = ctx.store.update_screens(updates)?;
            ctx.report.updated(EntityKind::TemplateScreen, ids.len());
        }

        if policy.delete_missing {
            delete_missing(ctx, sets)?;
        }
        Ok(())
    }
}

fn delete_missing<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    sets: &[TemplateScreens],
) -> ImportResult<()> {
    let templates = ctx.scope.processed_templates().clone();
    if templates.is_empty() {
        return Ok(());
    }
    let names: BTreeMap<EntityId, String> = ctx
        .store
        .get_hosts(&HostQuery::new().ids(templates.iter().copied()))?
        .into_iter()
        .map(|t| (t.id, t.host))
        .collect();
    let declared = |template: &str, screen: &str| {
        sets.iter()
            .any(|s| s.template == template && s.screens.iter().any(|d| d.name == screen))
    };

    let stale: Vec<EntityId> = ctx
        .store
        .get_screens(&ScreenQuery::of_templates(templates))?
        .into_iter()
        .filter(|screen| {
            let owner = screen
                .template_id
                .and_then(|t| names.get(&t))
                .map_or("", String::as_str);
            !declared(owner, &screen.name)
        })
        .map(|screen| screen.id)
        .collect();
    if stale.is_empty() {
        return Ok(());
    }
    let deleted = ctx.store.delete_screens(&stale)?;
    debug!(count = deleted.len(), "deleted template screens missing from the snapshot");
    ctx.report.deleted(EntityKind::TemplateScreen, deleted.len());
    Ok(())
}

fn shell(screen: &Screen, template_id: Option<EntityId>) -> ScreenRecord {
    ScreenRecord {
        id: EntityId::default(),
        name: screen.name.clone(),
        template_id,
        hsize: screen.hsize,
        vsize: screen.vsize,
        items: Vec::new(),
    }
}

fn cells<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    screen: &Screen,
    context: &str,
) -> ImportResult<Vec<ScreenItemRecord>> {
    let mut cells = Vec::with_capacity(screen.screenitems.len());
    for cell in &screen.screenitems {
        cells.push(ScreenItemRecord {
            resource: resource(ctx, &cell.resource, context)?,
            x: cell.x,
            y: cell.y,
            colspan: cell.colspan,
            rowspan: cell.rowspan,
            width: cell.width,
            height: cell.height,
        });
    }
    Ok(cells)
}

fn group_id<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    name: &str,
    context: &str,
) -> ImportResult<EntityId> {
    ctx.resolver
        .group(name)?
        .ok_or_else(|| ImportError::missing(EntityKind::Group, name, context))
}

fn graph_id<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    host: &str,
    name: &str,
    flags: GraphFlags,
    context: &str,
) -> ImportResult<EntityId> {
    match ctx.resolver.graph(host, name)? {
        Some((id, found)) if found == flags => Ok(id),
        _ => Err(ImportError::missing(
            flags.entity_kind(),
            format!("{host}:{name}"),
            context,
        )),
    }
}

/// Resolves the object a cell shows.
fn resource<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    resource: &ScreenResource,
    context: &str,
) -> ImportResult<ResourceRecord> {
    Ok(match resource {
        ScreenResource::Graph { host, name } => {
            ResourceRecord::Graph(graph_id(ctx, host, name, GraphFlags::Normal, context)?)
        }
        ScreenResource::LldGraph { host, name } => {
            ResourceRecord::LldGraph(graph_id(ctx, host, name, GraphFlags::Prototype, context)?)
        }
        ScreenResource::SimpleGraph { host, key } => {
            ResourceRecord::SimpleGraph(ctx.item_id(&ItemRef::new(host, key), context)?)
        }
        ScreenResource::PlainText { host, key } => {
            ResourceRecord::PlainText(ctx.item_id(&ItemRef::new(host, key), context)?)
        }
        ScreenResource::LldSimpleGraph { host, key } => {
            ResourceRecord::LldSimpleGraph(ctx.item_id(&ItemRef::new(host, key), context)?)
        }
        ScreenResource::Map { name } => ResourceRecord::Map(
            ctx.resolver
                .map(name)?
                .ok_or_else(|| ImportError::missing(EntityKind::Map, name, context))?,
        ),
        ScreenResource::Screen { name } => ResourceRecord::Screen(
            ctx.resolver
                .screen(name)?
                .ok_or_else(|| ImportError::missing(EntityKind::Screen, name, context))?,
        ),
        ScreenResource::HostTriggers { host } => ResourceRecord::HostTriggers(
            ctx.resolver
                .host_id(host)?
                .ok_or_else(|| ImportError::missing(EntityKind::Host, host, context))?,
        ),
        ScreenResource::HostGroupTriggers { group: name } => {
            ResourceRecord::HostGroupTriggers(group_id(ctx, name, context)?)
        }
        ScreenResource::HostsInfo { group: name } => {
            ResourceRecord::HostsInfo(group_id(ctx, name, context)?)
        }
        ScreenResource::TriggersInfo { group: name } => {
            ResourceRecord::TriggersInfo(group_id(ctx, name, context)?)
        }
        ScreenResource::TriggersOverview { group: name } => {
            ResourceRecord::TriggersOverview(group_id(ctx, name, context)?)
        }
        ScreenResource::DataOverview { group: name } => {
            ResourceRecord::DataOverview(group_id(ctx, name, context)?)
        }
        ScreenResource::Clock => ResourceRecord::Clock,
        ScreenResource::Url { url } => ResourceRecord::Url(url.clone()),
        ScreenResource::ServerInfo => ResourceRecord::ServerInfo,
        ScreenResource::SystemStatus => ResourceRecord::SystemStatus,
        ScreenResource::ActionLog => ResourceRecord::ActionLog,
        ScreenResource::Events => ResourceRecord::Events,
    })
}
