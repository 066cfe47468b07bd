//! Graphs.

use super::ImportContext;
use crate::error::{ImportError, ImportResult};
use reconf_model::{EntityId, Graph};
use reconf_store::{ConfigStore, GraphFlags, GraphItemRecord, GraphRecord};
use tracing::warn;

/// Resolves the plotted and axis items of `graph` and builds its row.
pub(super) fn graph_record<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    graph: &Graph,
    flags: GraphFlags,
    context: &str,
) -> ImportResult<GraphRecord> {
    let mut items = Vec::with_capacity(graph.gitems.len());
    for gitem in &graph.gitems {
        items.push(GraphItemRecord {
            item_id: ctx.item_id(&gitem.item, context)?,
            style: gitem.style.clone(),
        });
    }
    let ymin_item_id = match &graph.ymin_item {
        Some(item) => Some(ctx.item_id(item, context)?),
        None => None,
    };
    let ymax_item_id = match &graph.ymax_item {
        Some(item) => Some(ctx.item_id(item, context)?),
        None => None,
    };
    Ok(GraphRecord {
        id: EntityId::default(),
        name: graph.name.clone(),
        flags,
        settings: graph.settings.clone(),
        template_id: None,
        ymin_item_id,
        ymax_item_id,
        items,
        host_ids: Vec::new(),
    })
}

/// Graphs or graph prototypes to write in one call each.
pub(super) struct GraphBatch<'a> {
    flags: GraphFlags,
    creates: Vec<(&'a Graph, GraphRecord)>,
    updates: Vec<GraphRecord>,
}

impl<'a> GraphBatch<'a> {
    pub(super) fn new(flags: GraphFlags) -> Self {
        Self {
            flags,
            creates: Vec::new(),
            updates: Vec::new(),
        }
    }

    /// Looks `graph` up on `host` and queues it for creation or update.
    pub(super) fn plan<S: ConfigStore + ?Sized>(
        &mut self,
        ctx: &mut ImportContext<'_, S>,
        host: &str,
        graph: &'a Graph,
        create: bool,
        update: bool,
        context: &str,
    ) -> ImportResult<()> {
        match ctx.resolver.graph(host, &graph.name)? {
            Some((_, flags)) if flags != self.flags => Err(ImportError::duplicate_on(
                flags.entity_kind(),
                &graph.name,
                host,
            )),
            Some((id, _)) if update => {
                let record = graph_record(ctx, graph, self.flags, context)?;
                self.updates.push(GraphRecord { id, ..record });
                Ok(())
            }
            None if create => {
                let record = graph_record(ctx, graph, self.flags, context)?;
                self.creates.push((graph, record));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub(super) fn commit<S: ConfigStore + ?Sized>(
        self,
        ctx: &mut ImportContext<'_, S>,
    ) -> ImportResult<()> {
        let kind = self.flags.entity_kind();
        if !self.creates.is_empty() {
            let records = self.creates.iter().map(|(_, r)| r.clone()).collect();
            let ids = ctx.store.create_graphs(records)?;
            for ((graph, _), id) in self.creates.iter().zip(&ids) {
                ctx.resolver
                    .bind_graph(graph.hosts(), &graph.name, *id, self.flags);
            }
            ctx.report.created(kind, ids.len());
        }
        if !self.updates.is_empty() {
            let ids = ctx.store.update_graphs(self.updates)?;
            ctx.report.updated(kind, ids.len());
        }
        Ok(())
    }
}

/// Creates and updates plain graphs. A graph is looked up on the host of
/// its last plotted item.
pub(super) fn import_graphs<S: ConfigStore + ?Sized>(
    ctx: &mut ImportContext<'_, S>,
    graphs: &[Graph],
) -> ImportResult<()> {
    let policy = ctx.options.graphs;
    let mut batch = GraphBatch::new(GraphFlags::Normal);
    for graph in graphs {
        let Some(host) = graph.gitems.last().map(|gitem| gitem.item.host.as_str()) else {
            warn!(graph = %graph.name, "graph plots no items, skipped");
            continue;
        };
        let context = format!("graph \"{}\"", graph.name);
        batch.plan(
            ctx,
            host,
            graph,
            policy.create_missing,
            policy.update_existing,
            &context,
        )?;
    }
    batch.commit(ctx)
}

#[cfg(test)]
mod tests {
    use crate::{EntityPolicy, ImportError, ImportOptions, ImportPipeline};
    use reconf_model::{EntityKind, Snapshot};
    use reconf_store::{ConfigStore, GraphQuery, MemoryStore};

    const SNAPSHOT: &str = r#"{
        "groups": [{"name": "Linux servers"}],
        "hosts": [
            {"host": "web1", "groups": [{"name": "Linux servers"}]},
            {"host": "web2", "groups": [{"name": "Linux servers"}]}
        ],
        "items": {
            "web1": [{"key": "system.cpu.load", "name": "Load"}],
            "web2": [{"key": "system.cpu.load", "name": "Load"}]
        },
        "graphs": [
            {"name": "Load", "gitems": [
                {"item": {"host": "web1", "key": "system.cpu.load"}, "color": "00AA00"},
                {"item": {"host": "web2", "key": "system.cpu.load"}, "color": "AA0000"}
            ]},
            {"name": "Empty"}
        ]
    }"#;

    fn options() -> ImportOptions {
        ImportOptions::new()
            .with_groups(EntityPolicy::create())
            .with_hosts(EntityPolicy::upsert())
            .with_items(EntityPolicy::upsert())
            .with_graphs(EntityPolicy::upsert())
    }

    #[test]
    fn graph_spans_every_plotted_host() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(SNAPSHOT).unwrap();
        let report = ImportPipeline::new(&store, options()).run(&snapshot).unwrap();
        assert_eq!(report.count(EntityKind::Graph).created, 1);

        let graphs = store.get_graphs(&GraphQuery::new()).unwrap();
        assert_eq!(graphs.len(), 1);
        assert_eq!(graphs[0].host_ids.len(), 2);
        assert_eq!(graphs[0].items.len(), 2);
    }

    #[test]
    fn second_run_updates_in_place() {
        let store = MemoryStore::new();
        let snapshot = Snapshot::from_json_str(SNAPSHOT).unwrap();
        ImportPipeline::new(&store, options()).run(&snapshot).unwrap();
        let before = store.get_graphs(&GraphQuery::new()).unwrap();

        let report = ImportPipeline::new(&store, options()).run(&snapshot).unwrap();
        assert_eq!(report.count(EntityKind::Graph).created, 0);
        assert_eq!(report.count(EntityKind::Graph).updated, 1);
        assert_eq!(store.get_graphs(&GraphQuery::new()).unwrap(), before);
    }

    #[test]
    fn graph_is_found_on_its_last_plotted_host() {
        let store = MemoryStore::new();
        let mut snapshot = Snapshot::from_json_str(SNAPSHOT).unwrap();
        snapshot.graphs[0].gitems.remove(0);
        ImportPipeline::new(&store, options()).run(&snapshot).unwrap();

        let snapshot = Snapshot::from_json_str(SNAPSHOT).unwrap();
        let report = ImportPipeline::new(&store, options()).run(&snapshot).unwrap();
        assert_eq!(report.count(EntityKind::Graph).created, 0);
        assert_eq!(report.count(EntityKind::Graph).updated, 1);

        let graphs = store.get_graphs(&GraphQuery::new()).unwrap();
        assert_eq!(graphs.len(), 1);
        assert_eq!(graphs[0].host_ids.len(), 2);
    }

    #[test]
    fn unknown_plotted_item() {
        let store = MemoryStore::new();
        let mut snapshot = Snapshot::from_json_str(SNAPSHOT).unwrap();
        snapshot.graphs[0].gitems[1].item.key = "vm.memory.size".into();
        let err = ImportPipeline::new(&store, options()).run(&snapshot).unwrap_err();
        assert!(matches!(
            err,
            ImportError::MissingReference { kind: "item", ref reference, .. }
                if reference == "web2:vm.memory.size"
        ));
    }
}
