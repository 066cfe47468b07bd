//! Template import.

use super::{kind_clash, linked_templates, merge_macros, union_ids, HostBatch, SubImporter};
use crate::error::{ImportError, ImportResult};
use crate::order::levels;
use crate::pipeline::ImportContext;
use reconf_model::{EntityId, HostStatus, Template};
use reconf_store::{ConfigStore, HostKind, HostRecord};
use std::collections::BTreeMap;
use tracing::debug;

/// Creates and updates templates, linked templates first.
///
/// Templates of the snapshot that link each other are written level by
/// level so that every link target exists when the link is made.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateImporter;

impl<S: ConfigStore + ?Sized> SubImporter<Template, S> for TemplateImporter {
    fn import(&mut self, ctx: &mut ImportContext<'_, S>, templates: &[Template]) -> ImportResult<()> {
        let nodes: Vec<(&str, Vec<&str>)> = templates
            .iter()
            .map(|t| {
                let links = t.templates.iter().map(|l| l.name.as_str()).collect();
                (t.host.as_str(), links)
            })
            .collect();
        let ordered = levels(&nodes)
            .map_err(|templates| ImportError::CircularTemplateLinkage { templates })?;
        let by_name: BTreeMap<&str, &Template> =
            templates.iter().map(|t| (t.host.as_str(), t)).collect();

        for (depth, level) in ordered.iter().enumerate() {
            let mut batch = HostBatch::default();
            for name in level {
                if let Some(template) = by_name.get(name) {
                    plan(ctx, template, &mut batch)?;
                }
            }
            debug!(
                depth,
                create = batch.creates.len(),
                update = batch.updates.len(),
                relink = batch.relinks.len(),
                "template level"
            );
            batch.commit(ctx, HostKind::Template)?;
        }
        Ok(())
    }
}

fn plan<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    template: &Template,
    batch: &mut HostBatch,
) -> ImportResult<()> {
    let context = format!("template \"{}\"", template.host);
    let policy = ctx.options.templates;
    let link = ctx.options.template_linkage.create_missing;

    match ctx.resolver.host(&template.host)? {
        Some(row) if row.kind != HostKind::Template => Err(kind_clash(&row)),
        Some(row) => {
            let links = if link {
                linked_templates(ctx, &template.templates, &context)?
            } else {
                Vec::new()
            };
            if policy.update_existing {
                let group_ids = ctx.group_ids(&template.groups, &context)?;
                batch.updates.push(HostRecord {
                    name: template.name.clone().unwrap_or_else(|| template.host.clone()),
                    description: template.description.clone(),
                    group_ids,
                    template_ids: union_ids(&row.template_ids, &links),
                    macros: merge_macros(&row.macros, &template.macros),
                    ..row
                });
            } else if links.iter().any(|id| !row.template_ids.contains(id)) {
                let template_ids = union_ids(&row.template_ids, &links);
                batch.relinks.push(HostRecord {
                    template_ids,
                    ..row
                });
            }
            Ok(())
        }
        None if policy.create_missing => {
            let group_ids = ctx.group_ids(&template.groups, &context)?;
            let template_ids = if link {
                linked_templates(ctx, &template.templates, &context)?
            } else {
                Vec::new()
            };
            batch.creates.push(HostRecord {
                id: EntityId::default(),
                host: template.host.clone(),
                name: template.name.clone().unwrap_or_else(|| template.host.clone()),
                kind: HostKind::Template,
                status: HostStatus::Monitored,
                description: template.description.clone(),
                group_ids,
                template_ids,
                proxy_id: None,
                macros: merge_macros(&[], &template.macros),
                interfaces: Vec::new(),
            });
            Ok(())
        }
        None => Ok(()),
    }
}
