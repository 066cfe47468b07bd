//! Id-keyed record tables.

use crate::record::{
    ApplicationRecord, GraphRecord, GroupRecord, HostPrototypeRecord, HostRecord, IconMapRecord,
    ImageRecord, ItemRecord, MapRecord, ProxyRecord, ScreenRecord, TriggerRecord, ValueMapRecord,
};
use reconf_model::EntityId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// A store row with a surrogate id.
pub trait Record: Clone {
    /// The row id.
    fn id(&self) -> EntityId;

    /// Replaces the row id.
    fn set_id(&mut self, id: EntityId);
}

macro_rules! impl_record {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Record for $ty {
                fn id(&self) -> EntityId {
                    self.id
                }

                fn set_id(&mut self, id: EntityId) {
                    self.id = id;
                }
            }
        )*
    };
}

impl_record!(
    GroupRecord,
    HostRecord,
    ProxyRecord,
    ValueMapRecord,
    IconMapRecord,
    ApplicationRecord,
    ItemRecord,
    TriggerRecord,
    GraphRecord,
    HostPrototypeRecord,
    ImageRecord,
    MapRecord,
    ScreenRecord,
);

/// Rows of one kind ordered by id.
///
/// Serialized as a plain list of rows.
#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: BTreeMap<EntityId, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the row with the given id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.rows.get(&id)
    }

    /// Returns the row with the given id for modification.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.rows.get_mut(&id)
    }

    /// Returns true if a row with the given id exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.rows.contains_key(&id)
    }

    /// Inserts or replaces a row under its own id.
    pub fn insert(&mut self, row: T) {
        self.rows.insert(row.id(), row);
    }

    /// Removes a row.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.rows.remove(&id)
    }

    /// Rows in id order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    /// Mutable rows in id order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.rows.values_mut()
    }

    /// Ids of rows matching `predicate`.
    pub fn ids_where(&self, predicate: impl Fn(&T) -> bool) -> Vec<EntityId> {
        self.rows
            .values()
            .filter(|row| predicate(row))
            .map(Record::id)
            .collect()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Highest id in the table.
    #[must_use]
    pub fn max_id(&self) -> Option<EntityId> {
        self.rows.keys().next_back().copied()
    }
}

impl<T: Serialize> Serialize for Table<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows.values())
    }
}

impl<'de, T: Record + DeserializeOwned> Deserialize<'de> for Table<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = Vec::<T>::deserialize(deserializer)?;
        Ok(Self {
            rows: rows.into_iter().map(|row| (row.id(), row)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: u64, name: &str) -> GroupRecord {
        GroupRecord {
            id: EntityId::new(id),
            name: name.to_string(),
        }
    }

    #[test]
    fn rows_are_ordered_by_id() {
        let mut table = Table::new();
        table.insert(group(3, "c"));
        table.insert(group(1, "a"));
        table.insert(group(2, "b"));
        let names: Vec<&str> = table.values().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(table.max_id(), Some(EntityId::new(3)));
    }

    #[test]
    fn insert_replaces_same_id() {
        let mut table = Table::new();
        table.insert(group(1, "a"));
        table.insert(group(1, "renamed"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(EntityId::new(1)).unwrap().name, "renamed");
    }

    #[test]
    fn serializes_as_list() {
        let mut table = Table::new();
        table.insert(group(2, "b"));
        table.insert(group(1, "a"));
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"[{"id":1,"name":"a"},{"id":2,"name":"b"}]"#);
        let back: Table<GroupRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ids_where(|g| g.name == "b"), vec![EntityId::new(2)]);
    }
}
