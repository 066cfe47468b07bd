//! Applications and items.

use super::ImportContext;
use crate::error::{ImportError, ImportResult};
use crate::order::levels;
use reconf_model::{EntityId, EntityKind, Item, ItemRef, Snapshot};
use reconf_store::{
    ApplicationRecord, ConfigStore, ItemFlags, ItemRecord, MAX_DEPENDENCY_LEVELS,
};
use tracing::debug;

/// An item of the snapshot paired with its owner.
pub(super) struct Owned<'a> {
    pub(super) host: &'a str,
    pub(super) host_id: EntityId,
    pub(super) item: &'a Item,
}

/// Creates the applications of processed hosts that do not exist yet.
pub(super) fn import_applications<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    snapshot: &Snapshot,
) -> ImportResult<()> {
    let mut missing: Vec<(&str, ApplicationRecord)> = Vec::new();
    for (host, applications) in &snapshot.applications {
        let Some(host_id) = ctx.processed_owner(host, "applications")? else {
            continue;
        };
        for application in applications {
            if ctx.resolver.application(host, &application.name)?.is_none() {
                missing.push((
                    host,
                    ApplicationRecord {
                        id: EntityId::default(),
                        host_id,
                        name: application.name.clone(),
                        template_id: None,
                    },
                ));
            }
        }
    }
    if missing.is_empty() {
        return Ok(());
    }
    let records = missing.iter().map(|(_, record)| record.clone()).collect();
    let ids = ctx.store.create_applications(records)?;
    for ((host, record), id) in missing.iter().zip(&ids) {
        ctx.resolver.bind_application(host, &record.name, *id);
    }
    ctx.report.created(EntityKind::Application, ids.len());
    Ok(())
}

/// Splits the items of one host into waves so that every master item is
/// written before the items that depend on it.
pub(super) fn dependency_waves<'a>(host: &str, items: &'a [Item]) -> ImportResult<Vec<Vec<&'a Item>>> {
    let nodes: Vec<(&str, Vec<&str>)> = items
        .iter()
        .map(|item| {
            let masters = item.master_item.iter().map(|m| m.key.as_str()).collect();
            (item.key.as_str(), masters)
        })
        .collect();
    let ordered = levels(&nodes).map_err(|keys| {
        let key = keys.first().cloned().unwrap_or_default();
        ImportError::policy(format!(
            "Circular master item dependency for \"{key}\" on \"{host}\"."
        ))
    })?;
    if ordered.len() > MAX_DEPENDENCY_LEVELS + 1 {
        let key = ordered
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or_default();
        return Err(ImportError::policy(format!(
            "Cannot set dependency for \"{key}\" on \"{host}\": maximum number of dependency levels reached."
        )));
    }
    Ok(ordered
        .into_iter()
        .map(|level| {
            level
                .into_iter()
                .filter_map(|key| items.iter().find(|i| i.key == key))
                .collect()
        })
        .collect())
}

/// Appends the waves of one host onto the waves of all hosts.
pub(super) fn merge_waves<'a>(
    all: &mut Vec<Vec<Owned<'a>>>,
    host: &'a str,
    host_id: EntityId,
    waves: Vec<Vec<&'a Item>>,
) {
    for (depth, wave) in waves.into_iter().enumerate() {
        if all.len() <= depth {
            all.push(Vec::new());
        }
        all[depth].extend(wave.into_iter().map(|item| Owned {
            host,
            host_id,
            item,
        }));
    }
}

/// Resolves every reference of `item` and builds the row to write.
pub(super) fn item_record<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    owned: &Owned<'_>,
    flags: ItemFlags,
    rule_id: Option<EntityId>,
    context: &str,
) -> ImportResult<ItemRecord> {
    let Owned {
        host,
        host_id,
        item,
    } = *owned;

    let mut application_ids = Vec::with_capacity(item.applications.len());
    for application in &item.applications {
        let id = ctx
            .resolver
            .application(host, &application.name)?
            .ok_or_else(|| ImportError::missing(EntityKind::Application, &application.name, context))?;
        application_ids.push(id);
    }
    let valuemap_id = match &item.valuemap {
        Some(valuemap) => Some(
            ctx.resolver
                .value_map(&valuemap.name)?
                .ok_or_else(|| ImportError::missing(EntityKind::ValueMap, &valuemap.name, context))?,
        ),
        None => None,
    };
    let interface_id = match &item.interface_ref {
        Some(reference) => Some(
            ctx.resolver
                .interface(host, reference)
                .ok_or_else(|| ImportError::missing_interface(reference, context))?,
        ),
        None => None,
    };
    let master_item_id = match &item.master_item {
        Some(master) => Some(ctx.item_id(&ItemRef::new(host, &master.key), context)?),
        None => None,
    };

    Ok(ItemRecord {
        id: EntityId::default(),
        host_id,
        key: item.key.clone(),
        flags,
        settings: item.settings.clone(),
        template_id: None,
        rule_id,
        application_ids,
        valuemap_id,
        interface_id,
        master_item_id,
        filter: None,
        lifetime: None,
    })
}

/// Rows of one wave to create and update.
#[derive(Default)]
pub(super) struct ItemBatch<'a> {
    creates: Vec<(&'a str, ItemRecord)>,
    updates: Vec<ItemRecord>,
}

impl<'a> ItemBatch<'a> {
    pub(super) fn create(&mut self, host: &'a str, record: ItemRecord) {
        self.creates.push((host, record));
    }

    pub(super) fn update(&mut self, id: EntityId, record: ItemRecord) {
        self.updates.push(ItemRecord { id, ..record });
    }

    /// Writes the batch and binds the created rows. Returns the number of
    /// rows written.
    pub(super) fn commit<S: ConfigStore + ?Sized>(
        self,
        ctx: &mut ImportContext<'_, S>,
        flags: ItemFlags,
    ) -> ImportResult<usize> {
        let kind = flags.entity_kind();
        let mut written = 0;
        if !self.creates.is_empty() {
            let records = self.creates.iter().map(|(_, r)| r.clone()).collect();
            let ids = ctx.store.create_items(records)?;
            for ((host, record), id) in self.creates.iter().zip(&ids) {
                ctx.resolver.bind_item(host, &record.key, *id, flags);
            }
            ctx.report.created(kind, ids.len());
            written += ids.len();
        }
        if !self.updates.is_empty() {
            let ids = ctx.store.update_items(self.updates)?;
            ctx.report.updated(kind, ids.len());
            written += ids.len();
        }
        Ok(written)
    }
}

/// Creates and updates the plain items of processed hosts.
pub(super) fn import_items<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    snapshot: &Snapshot,
) -> ImportResult<()> {
    let policy = ctx.options.items;
    let mut waves: Vec<Vec<Owned<'_>>> = Vec::new();
    for (host, items) in &snapshot.items {
        let Some(host_id) = ctx.processed_owner(host, "items")? else {
            continue;
        };
        merge_waves(&mut waves, host, host_id, dependency_waves(host, items)?);
    }

    for (depth, wave) in waves.iter().enumerate() {
        let mut batch = ItemBatch::default();
        for owned in wave {
            let context = format!("item \"{}\" on \"{}\"", owned.item.key, owned.host);
            match ctx.resolver.item(owned.host, &owned.item.key)? {
                Some((_, flags)) if flags != ItemFlags::Normal => {
                    return Err(ImportError::duplicate_on(
                        flags.entity_kind(),
                        &owned.item.key,
                        owned.host,
                    ));
                }
                Some((id, _)) if policy.update_existing => {
                    let record = item_record(ctx, owned, ItemFlags::Normal, None, &context)?;
                    batch.update(id, record);
                }
                None if policy.create_missing => {
                    let record = item_record(ctx, owned, ItemFlags::Normal, None, &context)?;
                    batch.create(owned.host, record);
                }
                _ => {}
            }
        }
        let written = batch.commit(ctx, ItemFlags::Normal)?;
        debug!(depth, written, "item wave");
    }
    Ok(())
}
