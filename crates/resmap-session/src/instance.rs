//! Mapped entity instances.
//!
//! Reverse mapping produces unsaved entity instances that reference each
//! other before any of them has a primary key. They live in an arena owned by
//! the mapper context and refer to each other by [`InstanceId`]; foreign key
//! columns are filled in from the linked instance once it has been saved.

use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use resmap_core::{EntitySchema, Record, RelationshipInfo, Value};

/// Handle of an instance in an [`Instances`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

impl InstanceId {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Persistence state of an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstanceState {
    /// Not known to storage yet.
    #[default]
    Adding,
    /// Matched to, or written as, a stored row.
    Persisted,
}

/// One entity instance produced by reverse mapping.
#[derive(Debug, Clone)]
pub struct Instance {
    pub schema: &'static EntitySchema,
    pub pk: Option<i64>,
    pub state: InstanceState,
    /// Assigned column values, without the primary key.
    pub record: Record,
    /// Foreign key relations pointing at other instances, by key column.
    pub links: BTreeMap<&'static str, (&'static RelationshipInfo, InstanceId)>,
}

impl Instance {
    pub fn new(schema: &'static EntitySchema, record: Record) -> Self {
        Self {
            schema,
            pk: None,
            state: InstanceState::Adding,
            record,
            links: BTreeMap::new(),
        }
    }

    /// Mark as stored under `pk`.
    pub fn persist(&mut self, pk: i64) {
        self.pk = Some(pk);
        self.state = InstanceState::Persisted;
    }

    pub fn is_persisted(&self) -> bool {
        self.state == InstanceState::Persisted && self.pk.is_some()
    }

    /// Point the relation at `target`. The key column is written when the
    /// links are synced.
    pub fn link(&mut self, relation: &'static RelationshipInfo, target: InstanceId) {
        if let Some(column) = relation.local_key {
            self.links.insert(column, (relation, target));
        }
    }
}

/// Arena of the instances mapped for one chunk.
#[derive(Debug, Default)]
pub struct Instances {
    items: Vec<Instance>,
}

impl Instances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, instance: Instance) -> InstanceId {
        self.items.push(instance);
        InstanceId(self.items.len() - 1)
    }

    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        self.items.get(id.0)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.items.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, instance)| (InstanceId(index), instance))
    }

    /// Copy the primary keys of linked instances into the key columns of `id`.
    ///
    /// Returns the relations whose target has not been saved; their columns
    /// are left untouched.
    pub fn sync_links(&mut self, id: InstanceId) -> Vec<&'static RelationshipInfo> {
        let Some(instance) = self.items.get(id.0) else {
            return Vec::new();
        };
        let mut resolved = Vec::new();
        let mut unsaved = Vec::new();
        for (column, (relation, target)) in &instance.links {
            match self.items.get(target.0).and_then(|t| t.pk) {
                Some(pk) => resolved.push((*column, pk)),
                None => unsaved.push(*relation),
            }
        }
        let instance = &mut self.items[id.0];
        for (column, pk) in resolved {
            instance.record.set(column, Value::BigInt(pk));
        }
        unsaved
    }
}

impl Index<InstanceId> for Instances {
    type Output = Instance;

    fn index(&self, id: InstanceId) -> &Instance {
        &self.items[id.0]
    }
}

impl IndexMut<InstanceId> for Instances {
    fn index_mut(&mut self, id: InstanceId) -> &mut Instance {
        &mut self.items[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resmap_core::{FieldInfo, FieldKind};

    static CLASS_FIELDS: [FieldInfo; 2] = [
        FieldInfo::pk("id"),
        FieldInfo::new("slug", FieldKind::Text),
    ];
    static PRODUCT_FIELDS: [FieldInfo; 3] = [
        FieldInfo::pk("id"),
        FieldInfo::new("upc", FieldKind::Text),
        FieldInfo::fk("product_class_id", "ProductClass").nullable(true),
    ];
    static NO_RELATIONS: [RelationshipInfo; 0] = [];
    static PRODUCT_RELATIONS: [RelationshipInfo; 1] = [RelationshipInfo::many_to_one(
        "product_class",
        &CLASS,
        "product_class_id",
    )];
    static CLASS: EntitySchema =
        EntitySchema::new("ProductClass", "productclass", &CLASS_FIELDS, &NO_RELATIONS, None);
    static PRODUCT: EntitySchema =
        EntitySchema::new("Product", "product", &PRODUCT_FIELDS, &PRODUCT_RELATIONS, None);

    #[test]
    fn test_sync_links_copies_saved_keys() {
        let mut instances = Instances::new();
        let class = instances.add(Instance::new(&CLASS, Record::new()));
        let product = instances.add(Instance::new(&PRODUCT, Record::new()));
        instances[product].link(&PRODUCT_RELATIONS[0], class);

        let unsaved = instances.sync_links(product);
        assert_eq!(unsaved.len(), 1);
        assert!(!instances[product].record.contains("product_class_id"));

        instances[class].persist(7);
        assert!(instances.sync_links(product).is_empty());
        assert_eq!(
            instances[product].record.value("product_class_id"),
            &Value::BigInt(7)
        );
    }

    #[test]
    fn test_persist_marks_state() {
        let mut instances = Instances::new();
        let id = instances.add(Instance::new(&CLASS, Record::new()));
        assert!(!instances[id].is_persisted());
        instances[id].persist(3);
        assert_eq!(instances[id].state, InstanceState::Persisted);
        assert_eq!(instances.iter().count(), 1);
    }
}
