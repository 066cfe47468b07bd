//! A snapshot prepared for one import run.
//!
//! Every trigger and trigger prototype expression is parsed once, up front,
//! so that a malformed expression aborts the run before anything is
//! written. Stages then read the parsed tokens from here instead of
//! re-parsing.

use crate::error::{ImportError, ImportResult};
use reconf_expression::{ParseOptions, TriggerExpression};
use reconf_model::{DiscoveryRule, Snapshot, Trigger};
use std::collections::BTreeSet;

/// A trigger together with its parsed expression.
#[derive(Debug, Clone)]
pub struct ParsedTrigger<'a> {
    /// The declared trigger.
    pub trigger: &'a Trigger,
    /// Its parsed expression.
    pub expression: TriggerExpression,
}

impl<'a> ParsedTrigger<'a> {
    fn parse(trigger: &'a Trigger, options: ParseOptions) -> ImportResult<Self> {
        let expression = TriggerExpression::parse_with(&trigger.expression, options).map_err(
            |source| ImportError::Expression {
                trigger: trigger.description.clone(),
                expression: trigger.expression.clone(),
                source,
            },
        )?;
        Ok(Self {
            trigger,
            expression,
        })
    }
}

/// A discovery rule with the host that owns it.
#[derive(Debug, Clone)]
pub struct RuleView<'a> {
    /// Owning host or template.
    pub host: &'a str,
    /// The rule.
    pub rule: &'a DiscoveryRule,
    /// Parsed trigger prototypes of the rule.
    pub trigger_prototypes: Vec<ParsedTrigger<'a>>,
}

/// Natural keys declared by the snapshot, per kind.
#[derive(Debug, Clone, Default)]
pub struct Declared<'a> {
    /// `(host, application)`.
    pub applications: BTreeSet<(&'a str, &'a str)>,
    /// `(host, key)` of plain items.
    pub items: BTreeSet<(&'a str, &'a str)>,
    /// `(host, key)` of discovery rules.
    pub rules: BTreeSet<(&'a str, &'a str)>,
    /// `(host, key)` of item prototypes.
    pub item_prototypes: BTreeSet<(&'a str, &'a str)>,
    /// `(description, expression)` of triggers.
    pub triggers: BTreeSet<(&'a str, &'a str)>,
    /// `(description, expression)` of trigger prototypes.
    pub trigger_prototypes: BTreeSet<(&'a str, &'a str)>,
    /// `(host, name)` of graphs, once per plotted host.
    pub graphs: BTreeSet<(&'a str, &'a str)>,
    /// `(host, name)` of graph prototypes.
    pub graph_prototypes: BTreeSet<(&'a str, &'a str)>,
    /// `(host, rule key, prototype host)` of host prototypes.
    pub host_prototypes: BTreeSet<(&'a str, &'a str, &'a str)>,
    /// `(template, name)` of template screens.
    pub template_screens: BTreeSet<(&'a str, &'a str)>,
}

impl Declared<'_> {
    /// Number of declared keys over all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.applications.len()
            + self.items.len()
            + self.rules.len()
            + self.item_prototypes.len()
            + self.triggers.len()
            + self.trigger_prototypes.len()
            + self.graphs.len()
            + self.graph_prototypes.len()
            + self.host_prototypes.len()
            + self.template_screens.len()
    }

    /// Returns true if nothing host-scoped is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A snapshot with parsed expressions and precomputed key sets.
///
/// Built once per run and borrowed by every stage.
#[derive(Debug, Clone)]
pub struct FormattedSnapshot<'a> {
    snapshot: &'a Snapshot,
    triggers: Vec<ParsedTrigger<'a>>,
    rules: Vec<RuleView<'a>>,
    declared: Declared<'a>,
}

impl<'a> FormattedSnapshot<'a> {
    /// Parses every expression of `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Expression`] for the first expression that
    /// does not parse. Trigger prototypes may use low-level discovery
    /// macros; plain triggers may not.
    pub fn new(snapshot: &'a Snapshot) -> ImportResult<Self> {
        let triggers = snapshot
            .triggers
            .iter()
            .map(|t| ParsedTrigger::parse(t, ParseOptions::default()))
            .collect::<ImportResult<Vec<_>>>()?;

        let mut rules = Vec::new();
        for (host, host_rules) in &snapshot.discovery_rules {
            for rule in host_rules {
                let trigger_prototypes = rule
                    .trigger_prototypes
                    .iter()
                    .map(|t| ParsedTrigger::parse(t, ParseOptions::prototype()))
                    .collect::<ImportResult<Vec<_>>>()?;
                rules.push(RuleView {
                    host,
                    rule,
                    trigger_prototypes,
                });
            }
        }

        let declared = declare(snapshot, &rules);
        Ok(Self {
            snapshot,
            triggers,
            rules,
            declared,
        })
    }

    /// The underlying snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    /// Plain triggers, in snapshot order.
    #[must_use]
    pub fn triggers(&self) -> &[ParsedTrigger<'a>] {
        &self.triggers
    }

    /// Discovery rules of every host, ordered by host name.
    #[must_use]
    pub fn rules(&self) -> &[RuleView<'a>] {
        &self.rules
    }

    /// Declared natural keys.
    #[must_use]
    pub fn declared(&self) -> &Declared<'a> {
        &self.declared
    }

    /// Number of parsed expressions.
    #[must_use]
    pub fn expression_count(&self) -> usize {
        self.triggers.len()
            + self
                .rules
                .iter()
                .map(|r| r.trigger_prototypes.len())
                .sum::<usize>()
    }
}

fn declare<'a>(snapshot: &'a Snapshot, rules: &[RuleView<'a>]) -> Declared<'a> {
    let mut declared = Declared::default();
    for (host, applications) in &snapshot.applications {
        for application in applications {
            declared
                .applications
                .insert((host.as_str(), application.name.as_str()));
        }
    }
    for (host, items) in &snapshot.items {
        for item in items {
            declared.items.insert((host.as_str(), item.key.as_str()));
        }
    }
    for trigger in &snapshot.triggers {
        declared
            .triggers
            .insert((trigger.description.as_str(), trigger.expression.as_str()));
    }
    for graph in &snapshot.graphs {
        for host in graph.hosts() {
            declared.graphs.insert((host, graph.name.as_str()));
        }
    }
    for view in rules {
        let (host, rule) = (view.host, view.rule);
        declared.rules.insert((host, rule.key.as_str()));
        for prototype in &rule.item_prototypes {
            declared.item_prototypes.insert((host, prototype.key.as_str()));
        }
        for prototype in &rule.trigger_prototypes {
            declared.trigger_prototypes.insert((
                prototype.description.as_str(),
                prototype.expression.as_str(),
            ));
        }
        for prototype in &rule.graph_prototypes {
            declared.graph_prototypes.insert((host, prototype.name.as_str()));
        }
        for prototype in &rule.host_prototypes {
            declared
                .host_prototypes
                .insert((host, rule.key.as_str(), prototype.host.as_str()));
        }
    }
    for (template, screens) in &snapshot.template_screens {
        for screen in screens {
            declared
                .template_screens
                .insert((template.as_str(), screen.name.as_str()));
        }
    }
    declared
}
