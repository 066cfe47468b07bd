//! Ordering nodes so that every node comes after what it points at.

use std::collections::{BTreeMap, BTreeSet};

/// Splits `nodes` into levels: level 0 has no edges inside the set, level
/// `n` only points into levels below `n`.
///
/// Each node is `(name, targets)`. Targets that are not themselves nodes
/// are ignored, so edges to rows that already exist in the store do not
/// constrain the order. Within a level, nodes keep their input order.
///
/// Returns the names that could not be placed when the edges form a cycle.
pub(crate) fn levels<'a>(
    nodes: &[(&'a str, Vec<&'a str>)],
) -> Result<Vec<Vec<&'a str>>, Vec<String>> {
    for (name, targets) in nodes {
        if targets.contains(name) {
            return Err(vec![(*name).to_string()]);
        }
    }
    let names: BTreeSet<&str> = nodes.iter().map(|(name, _)| *name).collect();
    let mut pending: BTreeMap<&str, BTreeSet<&str>> = nodes
        .iter()
        .map(|(name, targets)| {
            let inner = targets
                .iter()
                .copied()
                .filter(|t| names.contains(t))
                .collect();
            (*name, inner)
        })
        .collect();

    let mut placed: BTreeSet<&str> = BTreeSet::new();
    let mut result = Vec::new();
    while !pending.is_empty() {
        let level: Vec<&str> = nodes
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| {
                pending
                    .get(name)
                    .is_some_and(|targets| targets.iter().all(|t| placed.contains(t)))
            })
            .collect();
        if level.is_empty() {
            return Err(pending.keys().map(|name| (*name).to_string()).collect());
        }
        for name in &level {
            pending.remove(name);
        }
        placed.extend(level.iter().copied());
        result.push(level);
    }
    Ok(result)
}
