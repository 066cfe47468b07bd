//! The reconciliation pipeline.
//!
//! A run walks a fixed table of stages. Each stage reads its slice of the
//! formatted snapshot, resolves natural keys, writes one create batch and
//! one update batch, binds fresh ids, and then the resolver kinds listed
//! next to the stage are refreshed so that rows the store derived on its
//! own (inherited copies, cascades) are visible to later stages.

mod cleanup;
mod discovery;
mod graphs;
mod images;
mod items;
mod triggers;

use crate::config::{ImportOptions, UserRole};
use crate::error::{ImportError, ImportResult};
use crate::formatted::FormattedSnapshot;
use crate::gather::ReferenceGatherer;
use crate::importers::{
    HostImporter, MapImporter, ScreenImporter, SubImporter, TemplateImporter,
    TemplateScreenImporter, TemplateScreens,
};
use crate::report::ImportReport;
use crate::resolver::{NaturalKeyResolver, RefKind};
use crate::scope::ProcessedScopeTracker;
use reconf_model::{EntityId, EntityKind, GroupRef, Host, ItemRef, Map, Screen, Snapshot, Template};
use reconf_store::{ConfigStore, GroupRecord};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, info_span};
use uuid::Uuid;

/// One phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Host groups.
    Groups,
    /// Templates, linked templates first.
    Templates,
    /// Hosts.
    Hosts,
    /// Delete-missing passes for rules, triggers, graphs, items and
    /// applications of processed hosts.
    DeleteMissing,
    /// Applications.
    Applications,
    /// Items, masters before dependents.
    Items,
    /// Discovery rules and their prototypes.
    DiscoveryRules,
    /// Triggers and their dependencies.
    Triggers,
    /// Graphs.
    Graphs,
    /// Images.
    Images,
    /// Network maps.
    Maps,
    /// Template screens.
    TemplateScreens,
    /// Global screens.
    Screens,
}

const HOST_CONTENT: &[RefKind] = &[
    RefKind::Host,
    RefKind::Application,
    RefKind::Item,
    RefKind::Trigger,
    RefKind::Graph,
    RefKind::HostPrototype,
];

/// Stages in execution order, each with the resolver kinds to refresh
/// after it.
pub(crate) const STAGES: &[(Stage, &[RefKind])] = &[
    (Stage::Groups, &[]),
    (Stage::Templates, HOST_CONTENT),
    (Stage::Hosts, HOST_CONTENT),
    (
        Stage::DeleteMissing,
        &[
            RefKind::Application,
            RefKind::Item,
            RefKind::Trigger,
            RefKind::Graph,
            RefKind::HostPrototype,
        ],
    ),
    (Stage::Applications, &[RefKind::Application]),
    (Stage::Items, &[RefKind::Item]),
    (
        Stage::DiscoveryRules,
        &[
            RefKind::Item,
            RefKind::Trigger,
            RefKind::Graph,
            RefKind::HostPrototype,
        ],
    ),
    (Stage::Triggers, &[RefKind::Trigger]),
    (Stage::Graphs, &[RefKind::Graph]),
    (Stage::Images, &[RefKind::Image]),
    (Stage::Maps, &[RefKind::Map]),
    (Stage::TemplateScreens, &[RefKind::TemplateScreen]),
    (Stage::Screens, &[RefKind::Screen]),
];

/// State shared by every stage of one run.
///
/// Owned by a single [`ImportPipeline`] and dropped with it.
pub struct ImportContext<'s, S: ConfigStore + ?Sized> {
    /// The store being reconciled.
    pub store: &'s S,
    /// Natural key cache.
    pub resolver: NaturalKeyResolver<'s, S>,
    /// Hosts and templates created or updated so far.
    pub scope: ProcessedScopeTracker,
    /// Per-kind policies.
    pub options: ImportOptions,
    /// Role of the caller.
    pub role: UserRole,
    /// Counters of the run.
    pub report: ImportReport,
}

impl<'s, S: ConfigStore + ?Sized> ImportContext<'s, S> {
    fn new(store: &'s S, options: ImportOptions) -> Self {
        Self {
            store,
            resolver: NaturalKeyResolver::new(store),
            scope: ProcessedScopeTracker::new(),
            options,
            role: UserRole::default(),
            report: ImportReport::new(Uuid::new_v4()),
        }
    }

    /// Id of a host or template that owns snapshot content.
    ///
    /// Returns `None` when the owner is not in the store, or was not
    /// created or updated by this run; its content is then left alone.
    pub fn processed_owner(&mut self, host: &str, context: &str) -> ImportResult<Option<EntityId>> {
        let Some(id) = self.resolver.host_id(host)? else {
            debug!(host, "skipping {context} of a host that is not in the store");
            return Ok(None);
        };
        if self.scope.is_processed(id) {
            Ok(Some(id))
        } else {
            debug!(host, "skipping {context} of a host outside the processed scope");
            Ok(None)
        }
    }

    /// Id of a referenced item, item prototype or discovery rule.
    pub fn item_id(&mut self, item: &ItemRef, context: &str) -> ImportResult<EntityId> {
        self.resolver
            .item(&item.host, &item.key)?
            .map(|(id, _)| id)
            .ok_or_else(|| ImportError::missing(EntityKind::Item, item.to_string(), context))
    }

    /// Ids of referenced host groups.
    pub fn group_ids(&mut self, groups: &[GroupRef], context: &str) -> ImportResult<Vec<EntityId>> {
        groups
            .iter()
            .map(|g| {
                self.resolver
                    .group(&g.name)?
                    .ok_or_else(|| ImportError::missing(EntityKind::Group, &g.name, context))
            })
            .collect()
    }
}

/// Drives one import run.
///
/// The sub-importers for templates, hosts, maps and screens can be
/// replaced; every other stage is fixed.
///
/// # Example
///
/// ```rust
/// use reconf_import::{ImportOptions, ImportPipeline};
/// use reconf_model::Snapshot;
/// use reconf_store::MemoryStore;
///
/// let store = MemoryStore::new();
/// let snapshot = Snapshot::from_json_str(r#"{"groups": [{"name": "Linux servers"}]}"#).unwrap();
/// let report = ImportPipeline::new(&store, ImportOptions::create_all())
///     .run(&snapshot)
///     .unwrap();
/// assert_eq!(report.totals().created, 1);
/// ```
pub struct ImportPipeline<'s, S: ConfigStore + ?Sized> {
    ctx: ImportContext<'s, S>,
    template_importer: Box<dyn SubImporter<Template, S> + 's>,
    host_importer: Box<dyn SubImporter<Host, S> + 's>,
    map_importer: Box<dyn SubImporter<Map, S> + 's>,
    screen_importer: Box<dyn SubImporter<Screen, S> + 's>,
    template_screen_importer: Box<dyn SubImporter<TemplateScreens, S> + 's>,
}

impl<'s, S: ConfigStore + ?Sized> ImportPipeline<'s, S> {
    /// Creates a pipeline with the default sub-importers.
    pub fn new(store: &'s S, options: ImportOptions) -> Self {
        Self {
            ctx: ImportContext::new(store, options),
            template_importer: Box::new(TemplateImporter),
            host_importer: Box::new(HostImporter),
            map_importer: Box::new(MapImporter),
            screen_importer: Box::new(ScreenImporter),
            template_screen_importer: Box::new(TemplateScreenImporter),
        }
    }

    /// Sets the role of the caller.
    #[must_use]
    pub fn with_role(mut self, role: UserRole) -> Self {
        self.ctx.role = role;
        self
    }

    /// Replaces the template importer.
    #[must_use]
    pub fn with_template_importer(mut self, importer: Box<dyn SubImporter<Template, S> + 's>) -> Self {
        self.template_importer = importer;
        self
    }

    /// Replaces the host importer.
    #[must_use]
    pub fn with_host_importer(mut self, importer: Box<dyn SubImporter<Host, S> + 's>) -> Self {
        self.host_importer = importer;
        self
    }

    /// Replaces the map importer.
    #[must_use]
    pub fn with_map_importer(mut self, importer: Box<dyn SubImporter<Map, S> + 's>) -> Self {
        self.map_importer = importer;
        self
    }

    /// Replaces the screen importer.
    #[must_use]
    pub fn with_screen_importer(mut self, importer: Box<dyn SubImporter<Screen, S> + 's>) -> Self {
        self.screen_importer = importer;
        self
    }

    /// Replaces the template screen importer.
    #[must_use]
    pub fn with_template_screen_importer(
        mut self,
        importer: Box<dyn SubImporter<TemplateScreens, S> + 's>,
    ) -> Self {
        self.template_screen_importer = importer;
        self
    }

    /// Id of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.ctx.report.run_id
    }

    /// Reconciles the store with `snapshot`.
    ///
    /// The first error aborts the run. Rows written by earlier stages stay
    /// written unless the caller wraps the run in a transaction, as
    /// [`crate::import_snapshot`] does.
    pub fn run(mut self, snapshot: &Snapshot) -> ImportResult<ImportReport> {
        let started = Instant::now();
        let span = info_span!("import", run_id = %self.ctx.report.run_id);
        let _enter = span.enter();

        snapshot.validate()?;
        let formatted = FormattedSnapshot::new(snapshot)?;
        let refs = ReferenceGatherer::new().gather(&formatted);
        debug!(
            keys = refs.len(),
            expressions = formatted.expression_count(),
            "references gathered"
        );
        self.ctx.resolver.add_refs(refs);

        for (stage, refreshes) in STAGES {
            let before = self.ctx.report.totals();
            if !self.run_stage(*stage, &formatted)? {
                continue;
            }
            let after = self.ctx.report.totals();
            debug!(
                ?stage,
                created = after.created - before.created,
                updated = after.updated - before.updated,
                deleted = after.deleted - before.deleted,
                "stage done"
            );
            self.ctx.report.stages.push(*stage);
            for kind in *refreshes {
                self.ctx.resolver.refresh(*kind);
            }
        }

        let mut report = self.ctx.report;
        report.elapsed = started.elapsed();
        let totals = report.totals();
        info!(
            created = totals.created,
            updated = totals.updated,
            deleted = totals.deleted,
            queries = self.ctx.resolver.queries(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "import finished"
        );
        Ok(report)
    }

    /// Runs one stage. Returns false if its policies made it a no-op.
    fn run_stage(&mut self, stage: Stage, formatted: &FormattedSnapshot<'_>) -> ImportResult<bool> {
        let snapshot = formatted.snapshot();
        let options = self.ctx.options;
        let ctx = &mut self.ctx;
        match stage {
            Stage::Groups => {
                if !options.groups.create_missing || snapshot.groups.is_empty() {
                    return Ok(false);
                }
                import_groups(ctx, snapshot)?;
            }
            Stage::Templates => {
                if !options.templates.writes() || snapshot.templates.is_empty() {
                    return Ok(false);
                }
                self.template_importer.import(ctx, &snapshot.templates)?;
            }
            Stage::Hosts => {
                if !options.hosts.writes() || snapshot.hosts.is_empty() {
                    return Ok(false);
                }
                self.host_importer.import(ctx, &snapshot.hosts)?;
            }
            Stage::DeleteMissing => {
                if ctx.scope.is_empty() {
                    return Ok(false);
                }
                return cleanup::delete_missing(ctx, formatted);
            }
            Stage::Applications => {
                if !options.applications.create_missing || snapshot.applications.is_empty() {
                    return Ok(false);
                }
                items::import_applications(ctx, snapshot)?;
            }
            Stage::Items => {
                if !options.items.writes() || snapshot.items.is_empty() {
                    return Ok(false);
                }
                items::import_items(ctx, snapshot)?;
            }
            Stage::DiscoveryRules => {
                if !options.discovery_rules.writes() || formatted.rules().is_empty() {
                    return Ok(false);
                }
                discovery::import_discovery_rules(ctx, formatted)?;
            }
            Stage::Triggers => {
                if !options.triggers.writes() || formatted.triggers().is_empty() {
                    return Ok(false);
                }
                triggers::import_triggers(ctx, formatted)?;
            }
            Stage::Graphs => {
                if !options.graphs.writes() || snapshot.graphs.is_empty() {
                    return Ok(false);
                }
                graphs::import_graphs(ctx, &snapshot.graphs)?;
            }
            Stage::Images => {
                if !options.images.writes() || snapshot.images.is_empty() {
                    return Ok(false);
                }
                return images::import_images(ctx, &snapshot.images);
            }
            Stage::Maps => {
                if !options.maps.writes() || snapshot.maps.is_empty() {
                    return Ok(false);
                }
                self.map_importer.import(ctx, &snapshot.maps)?;
            }
            Stage::TemplateScreens => {
                if !options.template_screens.is_active() {
                    return Ok(false);
                }
                let sets: Vec<TemplateScreens> = snapshot
                    .template_screens
                    .iter()
                    .map(|(template, screens)| TemplateScreens {
                        template: template.clone(),
                        screens: screens.clone(),
                    })
                    .collect();
                self.template_screen_importer.import(ctx, &sets)?;
            }
            Stage::Screens => {
                if !options.screens.writes() || snapshot.screens.is_empty() {
                    return Ok(false);
                }
                self.screen_importer.import(ctx, &snapshot.screens)?;
            }
        }
        Ok(true)
    }
}

/// Creates the groups that do not exist yet. Groups are never updated.
fn import_groups<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    snapshot: &Snapshot,
) -> ImportResult<()> {
    let mut missing = Vec::new();
    for group in &snapshot.groups {
        if ctx.resolver.group(&group.name)?.is_none() {
            missing.push(GroupRecord {
                id: EntityId::default(),
                name: group.name.clone(),
            });
        }
    }
    if missing.is_empty() {
        return Ok(());
    }
    let ids = ctx.store.create_groups(missing.clone())?;
    for (group, id) in missing.iter().zip(&ids) {
        ctx.resolver.bind_group(&group.name, *id);
    }
    ctx.report.created(EntityKind::Group, ids.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconf_store::MemoryStore;

    #[test]
    fn every_stage_appears_once_in_order() {
        let stages: Vec<Stage> = STAGES.iter().map(|(s, _)| *s).collect();
        assert_eq!(stages.len(), 13);
        let position = |s: Stage| stages.iter().position(|x| *x == s).unwrap();
        assert!(position(Stage::Groups) < position(Stage::Templates));
        assert!(position(Stage::Templates) < position(Stage::Hosts));
        assert!(position(Stage::Hosts) < position(Stage::DeleteMissing));
        assert!(position(Stage::DeleteMissing) < position(Stage::Applications));
        assert!(position(Stage::Applications) < position(Stage::Items));
        assert!(position(Stage::Items) < position(Stage::DiscoveryRules));
        assert!(position(Stage::DiscoveryRules) < position(Stage::Triggers));
        assert!(position(Stage::Images) < position(Stage::Maps));
    }

    #[test]
    fn existing_groups_are_not_created_again() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(
            r#"{"groups": [{"name": "Linux servers"}, {"name": "Databases"}]}"#,
        )
        .unwrap();
        let options = ImportOptions::new().with_groups(crate::EntityPolicy::create());

        let first = ImportPipeline::new(&store, options).run(&snapshot).unwrap();
        assert_eq!(first.count(EntityKind::Group).created, 2);
        assert_eq!(first.stages, vec![Stage::Groups]);

        let second = ImportPipeline::new(&store, options).run(&snapshot).unwrap();
        assert!(second.is_noop());
        assert!(second.stages.is_empty() || second.stages == vec![Stage::Groups]);
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn disabled_policies_skip_every_stage() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(r#"{"groups": [{"name": "Linux servers"}]}"#).unwrap();
        let report = ImportPipeline::new(&store, ImportOptions::new())
            .run(&snapshot)
            .unwrap();
        assert!(report.stages.is_empty());
        assert!(store.get_groups(None).unwrap().is_empty());
    }
}
