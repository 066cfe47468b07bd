//! Pluggable importers for the entity kinds that own nested structure.
//!
//! Templates, hosts, maps and screens each get a [`SubImporter`] so that a
//! caller can swap one out without touching the rest of the pipeline.

mod host;
mod map;
mod screen;
mod template;

pub use host::HostImporter;
pub use map::MapImporter;
pub use screen::{ScreenImporter, TemplateScreenImporter, TemplateScreens};
pub use template::TemplateImporter;

use crate::error::{ImportError, ImportResult};
use crate::pipeline::ImportContext;
use reconf_model::{EntityId, EntityKind, TemplateRef, UserMacro};
use reconf_store::{ConfigStore, HostKind, HostQuery, HostRecord, MacroRecord};
use tracing::debug;

/// Imports one slice of the snapshot.
///
/// Implementations resolve natural keys through `ctx.resolver`, write
/// through `ctx.store`, bind the ids they create and count what they wrote
/// in `ctx.report`.
pub trait SubImporter<E, S: ConfigStore + ?Sized> {
    /// Imports `entities`.
    fn import(&mut self, ctx: &mut ImportContext<'_, S>, entities: &[E]) -> ImportResult<()>;
}

/// Host or template rows to write for one dependency level.
#[derive(Debug, Default)]
pub(crate) struct HostBatch {
    pub(crate) creates: Vec<HostRecord>,
    /// Full updates; these hosts join the processed scope.
    pub(crate) updates: Vec<HostRecord>,
    /// Updates that only add template links.
    pub(crate) relinks: Vec<HostRecord>,
}

impl HostBatch {
    pub(crate) fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.relinks.is_empty()
    }

    /// Writes the batch, rebinds every written row and extends the
    /// processed scope. Returns the stored rows.
    pub(crate) fn commit<S: ConfigStore + ?Sized>(
        self,
        ctx: &mut ImportContext<'_, S>,
        kind: HostKind,
    ) -> ImportResult<Vec<HostRecord>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let entity = kind.entity_kind();
        let mut processed = Vec::new();
        let mut written = Vec::new();

        if !self.creates.is_empty() {
            let ids = ctx.store.create_hosts(self.creates)?;
            ctx.report.created(entity, ids.len());
            processed.extend(ids.iter().copied());
            written.extend(ids);
        }
        if !self.updates.is_empty() {
            let ids = ctx.store.update_hosts(self.updates)?;
            ctx.report.updated(entity, ids.len());
            processed.extend(ids.iter().copied());
            written.extend(ids);
        }
        if !self.relinks.is_empty() {
            let ids = ctx.store.update_hosts(self.relinks)?;
            debug!(count = ids.len(), "linked templates without updating");
            ctx.report.updated(entity, ids.len());
            written.extend(ids);
        }

        for id in processed {
            match kind {
                HostKind::Host => ctx.scope.mark_host_processed(id),
                HostKind::Template => ctx.scope.mark_template_processed(id),
            }
        }
        let rows = ctx.store.get_hosts(&HostQuery::new().ids(written))?;
        for row in &rows {
            ctx.resolver.bind_host(row.clone());
        }
        Ok(rows)
    }
}

/// Ids of the templates in `links`.
pub(crate) fn linked_templates<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    links: &[TemplateRef],
    context: &str,
) -> ImportResult<Vec<EntityId>> {
    links
        .iter()
        .map(|link| {
            ctx.resolver
                .template(&link.name)?
                .ok_or_else(|| ImportError::missing(EntityKind::Template, &link.name, context))
        })
        .collect()
}

/// `existing` followed by the ids of `added` it does not contain yet.
pub(crate) fn union_ids(existing: &[EntityId], added: &[EntityId]) -> Vec<EntityId> {
    let mut ids = existing.to_vec();
    for id in added {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    ids
}

/// Merges snapshot macros into the stored ones by name.
///
/// Stored macros keep their ids; macros the snapshot does not mention are
/// kept as they are.
pub(crate) fn merge_macros(existing: &[MacroRecord], wanted: &[UserMacro]) -> Vec<MacroRecord> {
    let mut merged = existing.to_vec();
    for user_macro in wanted {
        match merged.iter_mut().find(|m| m.name == user_macro.name) {
            Some(stored) => stored.value.clone_from(&user_macro.value),
            None => merged.push(MacroRecord {
                id: None,
                name: user_macro.name.clone(),
                value: user_macro.value.clone(),
            }),
        }
    }
    merged
}

/// A host or template that exists under the name of an entity of the
/// other kind.
pub(crate) fn kind_clash(row: &HostRecord) -> ImportError {
    ImportError::DuplicateKey {
        kind: row.kind.entity_kind(),
        key: row.host.clone(),
        scope: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_merge_by_name() {
        let existing = vec![
            MacroRecord {
                id: Some(EntityId::new(1)),
                name: "{$PORT}".into(),
                value: "80".into(),
            },
            MacroRecord {
                id: Some(EntityId::new(2)),
                name: "{$USER}".into(),
                value: "zabbix".into(),
            },
        ];
        let wanted = vec![
            UserMacro {
                name: "{$PORT}".into(),
                value: "8080".into(),
            },
            UserMacro {
                name: "{$PATH}".into(),
                value: "/".into(),
            },
        ];
        let merged = merge_macros(&existing, &wanted);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].id, Some(EntityId::new(1)));
        assert_eq!(merged[0].value, "8080");
        assert_eq!(merged[1].value, "zabbix");
        assert_eq!(merged[2].id, None);
    }

    #[test]
    fn union_keeps_order_and_skips_known_ids() {
        let a = [EntityId::new(3), EntityId::new(1)];
        let b = [EntityId::new(1), EntityId::new(2)];
        assert_eq!(
            union_ids(&a, &b),
            vec![EntityId::new(3), EntityId::new(1), EntityId::new(2)]
        );
    }
}
