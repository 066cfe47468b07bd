//! Host import.

use super::{kind_clash, linked_templates, merge_macros, union_ids, HostBatch, SubImporter};
use crate::error::{ImportError, ImportResult};
use crate::pipeline::ImportContext;
use reconf_model::{EntityId, EntityKind, Host, HostInterface};
use reconf_store::{ConfigStore, HostKind, HostRecord, InterfaceRecord};
use tracing::debug;

/// Creates and updates hosts, then binds the interface references the
/// snapshot uses so that items can point at them.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostImporter;

impl<S: ConfigStore + ?Sized> SubImporter<Host, S> for HostImporter {
    fn import(&mut self, ctx: &mut ImportContext<'_, S>, hosts: &[Host]) -> ImportResult<()> {
        let mut batch = HostBatch::default();
        for host in hosts {
            plan(ctx, host, &mut batch)?;
        }
        debug!(
            create = batch.creates.len(),
            update = batch.updates.len(),
            relink = batch.relinks.len(),
            "host batch"
        );
        batch.commit(ctx, HostKind::Host)?;

        for host in hosts {
            let Some(row) = ctx.resolver.host(&host.host)? else {
                continue;
            };
            for interface in &host.interfaces {
                let wanted = interface_record(interface);
                if let Some(id) = row
                    .interfaces
                    .iter()
                    .find(|stored| stored.same_endpoint(&wanted))
                    .and_then(|stored| stored.id)
                {
                    ctx.resolver.bind_interface(&host.host, &interface.interface_ref, id);
                }
            }
        }
        Ok(())
    }
}

fn interface_record(interface: &HostInterface) -> InterfaceRecord {
    InterfaceRecord {
        id: None,
        interface_type: interface.interface_type,
        main: interface.main,
        use_ip: interface.use_ip,
        ip: interface.ip.clone(),
        dns: interface.dns.clone(),
        port: interface.port.clone(),
    }
}

/// Stored interfaces, with every snapshot interface either matched onto
/// the stored one with the same endpoint or appended.
fn merge_interfaces(existing: &[InterfaceRecord], wanted: &[HostInterface]) -> Vec<InterfaceRecord> {
    let mut merged = existing.to_vec();
    for interface in wanted {
        let record = interface_record(interface);
        match merged.iter_mut().find(|stored| stored.same_endpoint(&record)) {
            Some(stored) => {
                stored.main = record.main;
                stored.use_ip = record.use_ip;
            }
            None => merged.push(record),
        }
    }
    merged
}

fn plan<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    host: &Host,
    batch: &mut HostBatch,
) -> ImportResult<()> {
    let context = format!("host \"{}\"", host.host);
    let policy = ctx.options.hosts;
    let link = ctx.options.template_linkage.create_missing;

    let existing = ctx.resolver.host(&host.host)?;
    if let Some(row) = &existing {
        if row.kind != HostKind::Host {
            return Err(kind_clash(row));
        }
    }
    let links = if link && (existing.is_some() || policy.create_missing) {
        linked_templates(ctx, &host.templates, &context)?
    } else {
        Vec::new()
    };

    match existing {
        Some(row) if policy.update_existing => {
            let group_ids = ctx.group_ids(&host.groups, &context)?;
            let proxy_id = proxy(ctx, host, &context)?;
            batch.updates.push(HostRecord {
                name: host.name.clone().unwrap_or_else(|| host.host.clone()),
                status: host.status,
                description: host.description.clone(),
                group_ids,
                template_ids: union_ids(&row.template_ids, &links),
                proxy_id,
                macros: merge_macros(&row.macros, &host.macros),
                interfaces: merge_interfaces(&row.interfaces, &host.interfaces),
                ..row
            });
        }
        Some(row) => {
            if links.iter().any(|id| !row.template_ids.contains(id)) {
                let template_ids = union_ids(&row.template_ids, &links);
                batch.relinks.push(HostRecord {
                    template_ids,
                    ..row
                });
            }
        }
        None if policy.create_missing => {
            let group_ids = ctx.group_ids(&host.groups, &context)?;
            let proxy_id = proxy(ctx, host, &context)?;
            batch.creates.push(HostRecord {
                id: EntityId::default(),
                host: host.host.clone(),
                name: host.name.clone().unwrap_or_else(|| host.host.clone()),
                kind: HostKind::Host,
                status: host.status,
                description: host.description.clone(),
                group_ids,
                template_ids: links,
                proxy_id,
                macros: merge_macros(&[], &host.macros),
                interfaces: merge_interfaces(&[], &host.interfaces),
            });
        }
        None => {}
    }
    Ok(())
}

fn proxy<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    host: &Host,
    context: &str,
) -> ImportResult<Option<EntityId>> {
    let Some(proxy) = &host.proxy else {
        return Ok(None);
    };
    ctx.resolver
        .proxy(&proxy.name)?
        .map(Some)
        .ok_or_else(|| ImportError::missing(EntityKind::Proxy, &proxy.name, context))
}
