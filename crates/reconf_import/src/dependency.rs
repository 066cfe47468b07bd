//! Trigger dependency batches and the cycle check.
//!
//! Dependencies are written after every trigger of a stage exists, so a
//! trigger may depend on another one created in the same batch. Before the
//! batch is written, each dependent trigger is walked upward, breadth
//! first, over the batch's edges and the edges already in the store. The
//! batch replaces the stored lists of the triggers it names, so for those
//! triggers only the batch edges count.

use crate::error::{ImportError, ImportResult};
use reconf_model::EntityId;
use reconf_store::ConfigStore;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Dependency lists to set in one store call.
#[derive(Debug, Clone, Default)]
pub struct DependencyBatch {
    edges: BTreeMap<EntityId, Vec<EntityId>>,
    names: BTreeMap<EntityId, String>,
}

impl DependencyBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the full dependency list of `down`.
    pub fn set(&mut self, down: EntityId, description: &str, ups: Vec<EntityId>) {
        self.names.insert(down, description.to_string());
        self.edges.insert(down, ups);
    }

    /// Returns true if no trigger is in the batch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Number of triggers in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// The lists in the shape `set_trigger_dependencies` takes.
    #[must_use]
    pub fn into_edges(self) -> Vec<(EntityId, Vec<EntityId>)> {
        self.edges.into_iter().collect()
    }

    /// Rejects the batch if it would make a trigger depend on itself,
    /// directly or through other triggers.
    ///
    /// Stored edges are fetched one level at a time and memoized, so the
    /// number of store queries is bounded by the depth of the graph.
    pub fn check<S: ConfigStore + ?Sized>(&self, store: &S) -> ImportResult<()> {
        for (down, ups) in &self.edges {
            if ups.contains(down) {
                return Err(ImportError::SelfDependency {
                    trigger: self.name(*down),
                });
            }
        }

        let mut stored: BTreeMap<EntityId, Vec<EntityId>> = BTreeMap::new();
        for (start, ups) in &self.edges {
            let mut seen: BTreeSet<EntityId> = BTreeSet::new();
            let mut level: Vec<EntityId> = ups.clone();
            while !level.is_empty() {
                if level.contains(start) {
                    return Err(ImportError::CircularDependency {
                        trigger: self.name(*start),
                    });
                }
                level.retain(|id| seen.insert(*id));
                self.fetch_missing(store, &level, &mut stored)?;
                level = level
                    .iter()
                    .flat_map(|id| self.ups_of(*id, &stored))
                    .copied()
                    .filter(|id| !seen.contains(id))
                    .collect();
            }
            trace!(trigger = %start, visited = seen.len(), "dependency walk");
        }
        Ok(())
    }

    fn ups_of<'a>(
        &'a self,
        id: EntityId,
        stored: &'a BTreeMap<EntityId, Vec<EntityId>>,
    ) -> &'a [EntityId] {
        self.edges
            .get(&id)
            .or_else(|| stored.get(&id))
            .map_or(&[], Vec::as_slice)
    }

    fn fetch_missing<S: ConfigStore + ?Sized>(
        &self,
        store: &S,
        level: &[EntityId],
        stored: &mut BTreeMap<EntityId, Vec<EntityId>>,
    ) -> ImportResult<()> {
        let missing: Vec<EntityId> = level
            .iter()
            .copied()
            .filter(|id| !self.edges.contains_key(id) && !stored.contains_key(id))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        for id in &missing {
            stored.insert(*id, Vec::new());
        }
        for edge in store.get_trigger_dependencies(&missing)? {
            stored.entry(edge.down).or_default().push(edge.up);
        }
        Ok(())
    }

    fn name(&self, id: EntityId) -> String {
        self.names.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }
}
