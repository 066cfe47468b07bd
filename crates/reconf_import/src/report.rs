//! What an import run did.

use crate::pipeline::Stage;
use reconf_model::EntityKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Rows written for one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    /// Rows created.
    pub created: usize,
    /// Rows updated.
    pub updated: usize,
    /// Rows deleted.
    pub deleted: usize,
}

impl Counts {
    /// Sum of all three counters.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Summary of one run.
///
/// Counts cover the rows the import asked for; rows the store derived on
/// its own (inherited copies, cascades) are not included.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// Unique id of the run, also recorded on the `import` tracing span.
    pub run_id: Uuid,
    /// Per-kind counters.
    pub counts: BTreeMap<EntityKind, Counts>,
    /// Stages that did any work, in execution order.
    pub stages: Vec<Stage>,
    /// Wall time of the run.
    pub elapsed: Duration,
    /// Whether the run was rolled back on purpose.
    pub dry_run: bool,
}

impl ImportReport {
    /// Creates an empty report for `run_id`.
    #[must_use]
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            counts: BTreeMap::new(),
            stages: Vec::new(),
            elapsed: Duration::ZERO,
            dry_run: false,
        }
    }

    /// Adds `n` created rows of `kind`.
    pub fn created(&mut self, kind: EntityKind, n: usize) {
        if n > 0 {
            self.counts.entry(kind).or_default().created += n;
        }
    }

    /// Adds `n` updated rows of `kind`.
    pub fn updated(&mut self, kind: EntityKind, n: usize) {
        if n > 0 {
            self.counts.entry(kind).or_default().updated += n;
        }
    }

    /// Adds `n` deleted rows of `kind`.
    pub fn deleted(&mut self, kind: EntityKind, n: usize) {
        if n > 0 {
            self.counts.entry(kind).or_default().deleted += n;
        }
    }

    /// Counters of one kind.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> Counts {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    /// Counters summed over every kind.
    #[must_use]
    pub fn totals(&self) -> Counts {
        self.counts.values().fold(Counts::default(), |acc, c| Counts {
            created: acc.created + c.created,
            updated: acc.updated + c.updated,
            deleted: acc.deleted + c.deleted,
        })
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.totals().total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_add_up() {
        let mut report = ImportReport::new(Uuid::new_v4());
        assert!(report.is_noop());
        report.created(EntityKind::Item, 3);
        report.updated(EntityKind::Item, 1);
        report.deleted(EntityKind::Trigger, 2);
        report.created(EntityKind::Graph, 0);

        assert_eq!(report.count(EntityKind::Item).total(), 4);
        assert_eq!(report.count(EntityKind::Graph), Counts::default());
        assert!(!report.counts.contains_key(&EntityKind::Graph));
        assert_eq!(
            report.totals(),
            Counts {
                created: 3,
                updated: 1,
                deleted: 2
            }
        );
    }

    #[test]
    fn serializes_to_json() {
        let mut report = ImportReport::new(Uuid::nil());
        report.created(EntityKind::DiscoveryRule, 1);
        report.stages.push(Stage::DiscoveryRules);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["counts"]["discovery_rule"]["created"], 1);
        assert_eq!(json["stages"][0], "discovery_rules");
        assert_eq!(json["run_id"], "00000000-0000-0000-0000-000000000000");
    }
}
