//! Hosts and templates touched by the current run.

use reconf_model::EntityId;
use std::collections::BTreeSet;

/// Records the hosts and templates created or updated by this run.
///
/// Every delete-missing pass is limited to rows owned by these ids.
#[derive(Debug, Clone, Default)]
pub struct ProcessedScopeTracker {
    hosts: BTreeSet<EntityId>,
    templates: BTreeSet<EntityId>,
}

impl ProcessedScopeTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a host as processed.
    pub fn mark_host_processed(&mut self, id: EntityId) {
        self.hosts.insert(id);
    }

    /// Marks a template as processed.
    pub fn mark_template_processed(&mut self, id: EntityId) {
        self.templates.insert(id);
    }

    /// Returns true if the host or template was processed.
    #[must_use]
    pub fn is_processed(&self, id: EntityId) -> bool {
        self.hosts.contains(&id) || self.templates.contains(&id)
    }

    /// Returns true if every id is processed. An empty list is not.
    #[must_use]
    pub fn all_processed(&self, ids: &[EntityId]) -> bool {
        !ids.is_empty() && ids.iter().all(|id| self.is_processed(*id))
    }

    /// Processed hosts and templates.
    #[must_use]
    pub fn processed_ids(&self) -> BTreeSet<EntityId> {
        self.hosts.union(&self.templates).copied().collect()
    }

    /// Processed templates only.
    #[must_use]
    pub fn processed_templates(&self) -> &BTreeSet<EntityId> {
        &self.templates
    }

    /// Returns true if nothing was processed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_and_templates_share_one_scope() {
        let mut scope = ProcessedScopeTracker::new();
        assert!(scope.is_empty());
        scope.mark_host_processed(EntityId::new(1));
        scope.mark_template_processed(EntityId::new(2));

        assert!(scope.is_processed(EntityId::new(1)));
        assert!(scope.is_processed(EntityId::new(2)));
        assert!(!scope.is_processed(EntityId::new(3)));
        assert_eq!(scope.processed_ids().len(), 2);
        assert_eq!(scope.processed_templates().len(), 1);
    }

    #[test]
    fn multi_host_rows_need_every_owner() {
        let mut scope = ProcessedScopeTracker::new();
        scope.mark_host_processed(EntityId::new(1));
        scope.mark_host_processed(EntityId::new(2));

        assert!(scope.all_processed(&[EntityId::new(1), EntityId::new(2)]));
        assert!(!scope.all_processed(&[EntityId::new(1), EntityId::new(9)]));
        assert!(!scope.all_processed(&[]));
    }
}
