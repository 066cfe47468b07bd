//! Triggers and their dependencies.

use super::ImportContext;
use crate::dependency::DependencyBatch;
use crate::error::{ImportError, ImportResult};
use crate::formatted::{FormattedSnapshot, ParsedTrigger};
use reconf_model::{EntityId, EntityKind, Trigger};
use reconf_store::{ConfigStore, TriggerFlags, TriggerRecord};
use tracing::debug;

/// Fails unless every item the expression reads exists.
pub(super) fn check_tokens<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    parsed: &ParsedTrigger<'_>,
    context: &str,
) -> ImportResult<()> {
    for function_macro in parsed.expression.function_macros() {
        if ctx
            .resolver
            .item(&function_macro.host, &function_macro.key)?
            .is_none()
        {
            return Err(ImportError::missing(
                EntityKind::Item,
                function_macro.item().to_string(),
                context,
            ));
        }
    }
    Ok(())
}

fn trigger_record(trigger: &Trigger, flags: TriggerFlags) -> TriggerRecord {
    TriggerRecord {
        id: EntityId::default(),
        description: trigger.description.clone(),
        expression: trigger.expression.clone(),
        flags,
        settings: trigger.settings.clone(),
        template_id: None,
        dependency_ids: Vec::new(),
        host_ids: Vec::new(),
    }
}

/// Triggers or trigger prototypes to write in one call each.
pub(super) struct TriggerBatch<'a> {
    flags: TriggerFlags,
    creates: Vec<(&'a Trigger, String)>,
    updates: Vec<(EntityId, &'a Trigger, String)>,
}

impl<'a> TriggerBatch<'a> {
    pub(super) fn new(flags: TriggerFlags) -> Self {
        Self {
            flags,
            creates: Vec::new(),
            updates: Vec::new(),
        }
    }

    /// Sorts `parsed` into the create or update list, or rejects it when
    /// its key is taken by a row of the other role.
    pub(super) fn plan<S: ConfigStore + ?Sized>(
        &mut self,
        ctx: &mut ImportContext<'_, S>,
        parsed: &ParsedTrigger<'a>,
        create: bool,
        update: bool,
        context: String,
    ) -> ImportResult<()> {
        let trigger = parsed.trigger;
        match ctx.resolver.trigger(&trigger.key())? {
            Some((_, flags)) if flags != self.flags => {
                let host = parsed.expression.hosts().first().copied().unwrap_or_default();
                Err(ImportError::duplicate_on(
                    flags.entity_kind(),
                    &trigger.description,
                    host,
                ))
            }
            Some((id, _)) if update => {
                self.updates.push((id, trigger, context));
                Ok(())
            }
            None if create => {
                self.creates.push((trigger, context));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Writes the rows, then the dependency lists of created triggers that
    /// declare any and of every updated trigger.
    pub(super) fn commit<S: ConfigStore + ?Sized>(
        self,
        ctx: &mut ImportContext<'_, S>,
    ) -> ImportResult<()> {
        let kind = self.flags.entity_kind();
        let mut dependent: Vec<(EntityId, &Trigger, String)> = Vec::new();

        if !self.creates.is_empty() {
            let records = self
                .creates
                .iter()
                .map(|(t, _)| trigger_record(t, self.flags))
                .collect();
            let ids = ctx.store.create_triggers(records)?;
            for ((trigger, context), id) in self.creates.into_iter().zip(&ids) {
                ctx.resolver.bind_trigger(trigger.key(), *id, self.flags);
                if !trigger.dependencies.is_empty() {
                    dependent.push((*id, trigger, context));
                }
            }
            ctx.report.created(kind, ids.len());
        }
        if !self.updates.is_empty() {
            let records = self
                .updates
                .iter()
                .map(|(id, t, _)| TriggerRecord {
                    id: *id,
                    ..trigger_record(t, self.flags)
                })
                .collect();
            let ids = ctx.store.update_triggers(records)?;
            ctx.report.updated(kind, ids.len());
            dependent.extend(self.updates);
        }

        set_dependencies(ctx, &dependent)
    }
}

fn set_dependencies<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    triggers: &[(EntityId, &Trigger, String)],
) -> ImportResult<()> {
    if triggers.is_empty() {
        return Ok(());
    }
    let mut batch = DependencyBatch::new();
    for (id, trigger, context) in triggers {
        let mut ups = Vec::with_capacity(trigger.dependencies.len());
        for dependency in &trigger.dependencies {
            let (up, _) = ctx.resolver.trigger(dependency)?.ok_or_else(|| {
                ImportError::missing(EntityKind::Trigger, &dependency.description, context.as_str())
            })?;
            ups.push(up);
        }
        batch.set(*id, &trigger.description, ups);
    }
    batch.check(ctx.store)?;
    debug!(triggers = batch.len(), "setting trigger dependencies");
    ctx.store.set_trigger_dependencies(&batch.into_edges())?;
    Ok(())
}

/// Creates and updates plain triggers, then their dependencies.
pub(super) fn import_triggers<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    formatted: &FormattedSnapshot<'_>,
) -> ImportResult<()> {
    let policy = ctx.options.triggers;
    let mut batch = TriggerBatch::new(TriggerFlags::Normal);
    for parsed in formatted.triggers() {
        let context = format!("trigger \"{}\"", parsed.trigger.description);
        check_tokens(ctx, parsed, &context)?;
        batch.plan(
            ctx,
            parsed,
            policy.create_missing,
            policy.update_existing,
            context,
        )?;
    }
    batch.commit(ctx)
}

#[cfg(test)]
mod tests {
    use crate::{EntityPolicy, ImportError, ImportOptions, ImportPipeline};
    use reconf_model::{EntityKind, Snapshot};
    use reconf_store::{ConfigStore, MemoryStore, TriggerQuery};

    const BASE: &str = r#"{
        "groups": [{"name": "Linux servers"}],
        "hosts": [{"host": "web1", "groups": [{"name": "Linux servers"}]}],
        "items": {"web1": [
            {"key": "agent.ping", "name": "Ping"},
            {"key": "system.cpu.load", "name": "Load"}
        ]}
    }"#;

    fn options() -> ImportOptions {
        ImportOptions::new()
            .with_groups(EntityPolicy::create())
            .with_hosts(EntityPolicy::upsert())
            .with_items(EntityPolicy::upsert())
            .with_triggers(EntityPolicy::upsert())
    }

    fn with_triggers(triggers: &str) -> Snapshot {
        let mut snapshot = Snapshot::from_json_str(BASE).unwrap();
        snapshot.triggers = serde_json::from_str(triggers).unwrap();
        snapshot
    }

    #[test]
    fn dependencies_inside_one_snapshot() {
        let store = MemoryStore::new();
        let snapshot = with_triggers(
            r#"[
                {"description": "Load high", "expression": "{web1:system.cpu.load.avg(5m)}>5",
                 "dependencies": [{"description": "Down", "expression": "{web1:agent.ping.nodata(5m)}=1"}]},
                {"description": "Down", "expression": "{web1:agent.ping.nodata(5m)}=1"}
            ]"#,
        );
        let report = ImportPipeline::new(&store, options()).run(&snapshot).unwrap();
        assert_eq!(report.count(EntityKind::Trigger).created, 2);

        let rows = store.get_triggers(&TriggerQuery::new()).unwrap();
        let down = rows.iter().find(|t| t.description == "Down").unwrap();
        let load = rows.iter().find(|t| t.description == "Load high").unwrap();
        assert_eq!(load.dependency_ids, vec![down.id]);
    }

    #[test]
    fn unknown_item_in_expression() {
        let store = MemoryStore::new();
        let snapshot = with_triggers(
            r#"[{"description": "Disk full", "expression": "{web1:vfs.fs.size[/,free].last()}<1"}]"#,
        );
        let err = ImportPipeline::new(&store, options()).run(&snapshot).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot find item \"web1:vfs.fs.size[/,free]\" used by trigger \"Disk full\"."
        );
    }

    #[test]
    fn unknown_dependency() {
        let store = MemoryStore::new();
        let snapshot = with_triggers(
            r#"[{"description": "Load high", "expression": "{web1:system.cpu.load.avg(5m)}>5",
                 "dependencies": [{"description": "Ghost", "expression": "{web1:agent.ping.nodata(5m)}=1"}]}]"#,
        );
        let err = ImportPipeline::new(&store, options()).run(&snapshot).unwrap_err();
        assert!(matches!(
            err,
            ImportError::MissingReference { kind: "trigger", ref reference, .. } if reference == "Ghost"
        ));
    }

    #[test]
    fn dependency_loops_are_rejected() {
        let store = MemoryStore::new();
        let snapshot = with_triggers(
            r#"[
                {"description": "A", "expression": "{web1:agent.ping.nodata(5m)}=1",
                 "dependencies": [{"description": "B", "expression": "{web1:system.cpu.load.avg(5m)}>5"}]},
                {"description": "B", "expression": "{web1:system.cpu.load.avg(5m)}>5",
                 "dependencies": [{"description": "A", "expression": "{web1:agent.ping.nodata(5m)}=1"}]}
            ]"#,
        );
        let err = ImportPipeline::new(&store, options()).run(&snapshot).unwrap_err();
        assert!(matches!(err, ImportError::CircularDependency { .. }));
        assert!(store
            .get_triggers(&TriggerQuery::new())
            .unwrap()
            .iter()
            .all(|t| t.dependency_ids.is_empty()));
    }

    #[test]
    fn updates_replace_dependency_lists() {
        let store = MemoryStore::new();
        let first = with_triggers(
            r#"[
                {"description": "Load high", "expression": "{web1:system.cpu.load.avg(5m)}>5",
                 "dependencies": [{"description": "Down", "expression": "{web1:agent.ping.nodata(5m)}=1"}]},
                {"description": "Down", "expression": "{web1:agent.ping.nodata(5m)}=1"}
            ]"#,
        );
        ImportPipeline::new(&store, options()).run(&first).unwrap();

        let second = with_triggers(
            r#"[{"description": "Load high", "expression": "{web1:system.cpu.load.avg(5m)}>5", "priority": "high"}]"#,
        );
        let report = ImportPipeline::new(&store, options()).run(&second).unwrap();
        assert_eq!(report.count(EntityKind::Trigger).updated, 1);
        let load = store
            .get_triggers(&TriggerQuery::new().descriptions(["Load high"]))
            .unwrap()
            .remove(0);
        assert!(load.dependency_ids.is_empty());
    }
}
