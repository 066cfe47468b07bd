//! Property-based test generators using proptest.
//!
//! Generated snapshots always pass [`Snapshot::validate`]: host names and
//! item keys are unique in their scope, every trigger references declared
//! items, and trigger dependencies only point backwards, so they never
//! form a cycle.

use crate::builder::SnapshotBuilder;
use proptest::prelude::*;
use proptest::sample::Index;
use reconf_model::Snapshot;

/// Strategy for host names.
pub fn host_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,11}").expect("Invalid regex")
}

/// Strategy for item keys, with or without bracketed parameters.
pub fn item_key_strategy() -> impl Strategy<Value = String> {
    let name = prop::string::string_regex("[a-z]{2,8}(\\.[a-z]{2,8}){0,2}").expect("Invalid regex");
    let param = prop::string::string_regex("[a-z0-9/]{1,6}").expect("Invalid regex");
    (name, prop::option::of(prop::collection::vec(param, 1..3))).prop_map(|(name, params)| {
        match params {
            Some(params) => format!("{name}[{}]", params.join(",")),
            None => name,
        }
    })
}

/// Strategy for well-formed trigger expressions over the given
/// `(host, key)` pairs. `items` must not be empty.
pub fn expression_strategy(items: Vec<(String, String)>) -> impl Strategy<Value = String> {
    let function = prop::sample::select(vec!["last()", "avg(5m)", "max(#3)", "nodata(10m)"]);
    let operator = prop::sample::select(vec!["=", "#", ">", "<", " and ", " or ", "+", "*"]);
    let operand = (prop::sample::select(items), function)
        .prop_map(|((host, key), function)| format!("{{{host}:{key}.{function}}}"));
    (
        prop::collection::vec((operand, operator), 1..4),
        0u32..1000,
    )
        .prop_map(|(parts, constant)| {
            let mut expression = String::new();
            for (operand, operator) in parts {
                expression.push_str(&operand);
                expression.push_str(operator);
            }
            expression.push_str(&constant.to_string());
            expression
        })
}

/// Strategy for valid snapshots with one to three hosts, their items, and
/// triggers with backward dependencies.
pub fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    prop::collection::btree_set(host_name_strategy(), 1..4)
        .prop_flat_map(|hosts| {
            let hosts: Vec<String> = hosts.into_iter().collect();
            let count = hosts.len();
            (
                Just(hosts),
                prop::collection::vec(prop::collection::btree_set(item_key_strategy(), 1..5), count),
                prop::collection::vec((any::<Index>(), any::<Index>(), any::<Option<Index>>()), 0..6),
            )
        })
        .prop_map(|(hosts, keys, triggers)| {
            let keys: Vec<Vec<String>> = keys.into_iter().map(|k| k.into_iter().collect()).collect();
            let mut builder = SnapshotBuilder::new();
            for (host, keys) in hosts.iter().zip(&keys) {
                builder = builder.host(host, "Generated");
                for key in keys {
                    builder = builder.item(host, key);
                }
            }

            let mut declared: Vec<(String, String)> = Vec::new();
            for (n, (host, key, dependency)) in triggers.into_iter().enumerate() {
                let h = host.index(hosts.len());
                let key = key.get(&keys[h]);
                let description = format!("Trigger {n} on {}", hosts[h]);
                let expression = format!("{{{}:{key}.last()}}>{n}", hosts[h]);
                let up = dependency
                    .filter(|_| !declared.is_empty())
                    .map(|d| d.get(&declared).clone());
                builder = match &up {
                    Some((d, e)) => builder.dependent_trigger(
                        &description,
                        &expression,
                        &[(d.as_str(), e.as_str())],
                    ),
                    None => builder.trigger(&description, &expression),
                };
                declared.push((description, expression));
            }
            builder.build()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_snapshots_are_valid(snapshot in snapshot_strategy()) {
            prop_assert!(snapshot.validate().is_ok());
            prop_assert!(!snapshot.hosts.is_empty());
        }

        #[test]
        fn keys_are_bracket_balanced(key in item_key_strategy()) {
            prop_assert_eq!(key.matches('[').count(), key.matches(']').count());
        }
    }
}
