//! Insertion-ordered multimap used for relation buckets.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use resmap_core::{EntitySchema, RelationshipInfo};

use crate::instance::InstanceId;

/// A map from key to a list of values that remembers key insertion order.
#[derive(Debug, Clone)]
pub struct MultiMap<K, V> {
    entries: Vec<(K, Vec<V>)>,
    index: HashMap<K, usize>,
}

impl<K, V> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> MultiMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` to the list under `key`.
    pub fn push(&mut self, key: K, value: V) {
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot].1.push(value),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, vec![value]));
            }
        }
    }

    pub fn get(&self, key: &K) -> &[V] {
        self.index
            .get(key)
            .map_or(&[], |&slot| self.entries[slot].1.as_slice())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Keys in first-insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &[V])> {
        self.entries
            .iter()
            .map(|(key, values)| (key, values.as_slice()))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A relation of a particular owning entity type.
#[derive(Debug, Clone, Copy)]
pub struct RelationKey {
    pub owner: &'static EntitySchema,
    pub relation: &'static RelationshipInfo,
}

impl RelationKey {
    pub const fn new(owner: &'static EntitySchema, relation: &'static RelationshipInfo) -> Self {
        Self { owner, relation }
    }

    /// The entity type on the other side of the relation.
    pub const fn related(&self) -> &'static EntitySchema {
        self.relation.related
    }
}

impl PartialEq for RelationKey {
    fn eq(&self, other: &Self) -> bool {
        self.owner.name == other.owner.name && self.relation.name == other.relation.name
    }
}

impl Eq for RelationKey {}

impl Hash for RelationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.name.hash(state);
        self.relation.name.hash(state);
    }
}

/// The submitted items of one owner for a to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedItems {
    pub owner: InstanceId,
    pub items: Vec<InstanceId>,
}

/// A foreign key from `owner` to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub owner: InstanceId,
    pub target: InstanceId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_keep_insertion_order() {
        let mut map = MultiMap::new();
        map.push("images", 1);
        map.push("categories", 2);
        map.push("images", 3);
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec!["images", "categories"]);
        assert_eq!(map.get(&"images"), &[1, 3]);
        assert!(map.get(&"stockrecords").is_empty());
        assert_eq!(map.len(), 2);
    }
}
