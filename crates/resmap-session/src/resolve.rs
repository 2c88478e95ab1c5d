//! Identity resolution: partition instances into creates and updates.

use std::collections::{HashMap, HashSet};

use resmap_core::{EntitySchema, Result, Storage};
use resmap_query::{IdentityKey, in_bulk, record_tuple};

use crate::instance::{InstanceId, Instances};

/// Outcome of matching instances against stored rows.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Instances with no stored row, one per identifying tuple.
    pub to_create: Vec<InstanceId>,
    /// Instances sharing an identifying tuple with an earlier create
    /// candidate; they receive its key once it is created.
    pub duplicates: Vec<InstanceId>,
    /// Instances matched to a stored row; their primary key is set.
    pub to_update: Vec<InstanceId>,
    /// Identifying tuples found in storage.
    pub matched_keys: Vec<IdentityKey>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.duplicates.is_empty() && self.to_update.is_empty()
    }

    /// Give each duplicate the primary key of the created instance with the
    /// same identifying tuple.
    ///
    /// Create candidates that were dropped before the insert have no key, so
    /// their duplicates stay unsaved. Returns how many duplicates were filled.
    pub fn backfill(&self, instances: &mut Instances, identifiers: &[&'static str]) -> usize {
        if self.duplicates.is_empty() {
            return 0;
        }
        let created: HashMap<IdentityKey, i64> = self
            .to_create
            .iter()
            .filter_map(|id| {
                let instance = &instances[*id];
                instance
                    .pk
                    .map(|pk| (IdentityKey::from_record(&instance.record, identifiers), pk))
            })
            .collect();

        let mut filled = 0;
        for id in &self.duplicates {
            let key = IdentityKey::from_record(&instances[*id].record, identifiers);
            if let Some(pk) = created.get(&key) {
                instances[*id].persist(*pk);
                filled += 1;
            }
        }
        filled
    }
}

/// Match `ids` against stored rows of `entity` by `identifiers`.
///
/// Instances that are already persisted go straight to `to_update`. With no
/// identifying fields every other instance is a create candidate. Tuples
/// containing NULL never match a stored row and are never merged.
#[tracing::instrument(level = "debug", skip(storage, instances, entity, ids, identifiers), fields(table = entity.table, candidates = ids.len()))]
pub fn resolve(
    storage: &mut dyn Storage,
    instances: &mut Instances,
    entity: &'static EntitySchema,
    ids: &[InstanceId],
    identifiers: &[&'static str],
    fallback_batch: usize,
) -> Result<Resolution> {
    let mut resolution = Resolution::default();
    let mut seen = HashSet::new();
    let mut pending = Vec::new();
    for id in ids {
        if !seen.insert(*id) {
            continue;
        }
        if instances[*id].is_persisted() {
            resolution.to_update.push(*id);
        } else {
            pending.push(*id);
        }
    }

    if identifiers.is_empty() {
        resolution.to_create = pending;
        return Ok(resolution);
    }

    let tuples: Vec<_> = pending
        .iter()
        .map(|id| record_tuple(&instances[*id].record, identifiers))
        .collect();
    let found = in_bulk(storage, entity, identifiers, &tuples, fallback_batch)?;

    let pk_column = entity.pk_column();
    let mut creating = HashSet::new();
    for id in pending {
        let key = IdentityKey::from_record(&instances[id].record, identifiers);
        if let Some(row) = found.get(&key) {
            instances[id].persist(row.pk(pk_column)?);
            resolution.to_update.push(id);
            resolution.matched_keys.push(key);
        } else if key.has_null() || creating.insert(key) {
            resolution.to_create.push(id);
        } else {
            resolution.duplicates.push(id);
        }
    }

    tracing::debug!(
        entity = entity.name,
        create = resolution.to_create.len(),
        duplicates = resolution.duplicates.len(),
        update = resolution.to_update.len(),
        "Resolved instances"
    );
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;
    use resmap_core::{FieldInfo, FieldKind, Record, RelationshipInfo, Value};
    use resmap_memory::MemoryStore;

    static CATEGORY_FIELDS: [FieldInfo; 3] = [
        FieldInfo::pk("id"),
        FieldInfo::new("code", FieldKind::Text).nullable(true),
        FieldInfo::new("name", FieldKind::Text),
    ];
    static NO_RELATIONS: [RelationshipInfo; 0] = [];
    static CATEGORY: EntitySchema =
        EntitySchema::new("Category", "category", &CATEGORY_FIELDS, &NO_RELATIONS, None);

    fn category(code: Option<&str>, name: &str) -> Instance {
        let mut record = Record::new();
        record.set("code", code.map_or(Value::Null, Value::from));
        record.set("name", name);
        Instance::new(&CATEGORY, record)
    }

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        let mut record = Record::new();
        record.set("code", "shoes");
        record.set("name", "Shoes");
        store.create_many(&CATEGORY, &[record]).unwrap();
        store
    }

    #[test]
    fn test_partition_by_identifying_tuple() {
        let mut store = seeded();
        let mut instances = Instances::new();
        let shoes = instances.add(category(Some("shoes"), "Footwear"));
        let hats = instances.add(category(Some("hats"), "Hats"));
        let hats_again = instances.add(category(Some("hats"), "Caps"));
        let unnamed = instances.add(category(None, "Misc"));
        let unnamed_again = instances.add(category(None, "Other"));

        let resolution = resolve(
            &mut store,
            &mut instances,
            &CATEGORY,
            &[shoes, hats, hats_again, unnamed, unnamed_again, shoes],
            &["code"],
            500,
        )
        .unwrap();

        assert_eq!(resolution.to_update, vec![shoes]);
        assert_eq!(instances[shoes].pk, Some(1));
        assert_eq!(resolution.to_create, vec![hats, unnamed, unnamed_again]);
        assert_eq!(resolution.duplicates, vec![hats_again]);
        assert_eq!(resolution.matched_keys.len(), 1);
    }

    #[test]
    fn test_no_identifiers_means_create_only() {
        let mut store = seeded();
        let mut instances = Instances::new();
        let shoes = instances.add(category(Some("shoes"), "Shoes"));
        let resolution =
            resolve(&mut store, &mut instances, &CATEGORY, &[shoes], &[], 500).unwrap();
        assert_eq!(resolution.to_create, vec![shoes]);
        assert_eq!(store.statements().len(), 1);
    }

    #[test]
    fn test_backfill_matches_by_tuple() {
        let mut store = seeded();
        let mut instances = Instances::new();
        let hats = instances.add(category(Some("hats"), "Hats"));
        let bags = instances.add(category(Some("bags"), "Bags"));
        let hats_again = instances.add(category(Some("hats"), "Caps"));
        let bags_again = instances.add(category(Some("bags"), "Totes"));

        let resolution = resolve(
            &mut store,
            &mut instances,
            &CATEGORY,
            &[hats, bags, hats_again, bags_again],
            &["code"],
            500,
        )
        .unwrap();
        assert_eq!(resolution.duplicates, vec![hats_again, bags_again]);

        // only "bags" made it into storage
        instances[bags].persist(10);
        let filled = resolution.backfill(&mut instances, &["code"]);
        assert_eq!(filled, 1);
        assert_eq!(instances[bags_again].pk, Some(10));
        assert_eq!(instances[hats_again].pk, None);
    }
}
