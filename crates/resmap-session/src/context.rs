//! Mapper context: what one chunk has collected.
//!
//! The context owns the mapped instances and the relation buckets filled in
//! by reverse mappers. It holds no configuration and performs no I/O; the
//! executor reads it and writes the outcome back into it.

use resmap_core::{EntitySchema, Result, ValidationError, Value};

use crate::config::UpsertConfig;
use crate::errors::{ErrorLog, RecordError};
use crate::instance::{Instance, InstanceId, Instances};
use crate::multimap::{Link, MultiMap, OwnedItems, RelationKey};
use crate::relations::{Mapped, extract};

/// Collected state of one chunk being saved.
#[derive(Debug)]
pub struct MapperContext {
    target: &'static EntitySchema,
    instances: Instances,
    primaries: Vec<InstanceId>,
    foreign_keys: MultiMap<RelationKey, Link>,
    one_to_many: MultiMap<RelationKey, OwnedItems>,
    many_to_many: MultiMap<RelationKey, OwnedItems>,
    side_values: MultiMap<&'static str, (InstanceId, serde_json::Value)>,
    errors: ErrorLog,
}

impl MapperContext {
    /// A context saving entities of type `target`.
    pub fn new(target: &'static EntitySchema) -> Self {
        Self {
            target,
            instances: Instances::new(),
            primaries: Vec::new(),
            foreign_keys: MultiMap::new(),
            one_to_many: MultiMap::new(),
            many_to_many: MultiMap::new(),
            side_values: MultiMap::new(),
            errors: ErrorLog::new(),
        }
    }

    pub fn target(&self) -> &'static EntitySchema {
        self.target
    }

    /// Build an instance of `schema` from mapped values and register its
    /// relations.
    pub fn register(
        &mut self,
        schema: &'static EntitySchema,
        values: Vec<(&'static str, Mapped)>,
    ) -> Result<InstanceId> {
        let extracted = extract(schema, values)?;
        let id = self.instances.add(Instance::new(schema, extracted.record));

        for (relation, target) in extracted.links {
            self.instances[id].link(relation, target);
            self.foreign_keys
                .push(RelationKey::new(schema, relation), Link { owner: id, target });
        }
        for (relation, items) in extracted.children {
            self.one_to_many
                .push(RelationKey::new(schema, relation), OwnedItems { owner: id, items });
        }
        for (relation, items) in extracted.many_to_many {
            self.many_to_many
                .push(RelationKey::new(schema, relation), OwnedItems { owner: id, items });
        }
        for (name, data) in extracted.side_values {
            self.side_values.push(name, (id, data));
        }
        Ok(id)
    }

    /// Mark `id` as one of the entities this chunk saves.
    pub fn add_primary(&mut self, id: InstanceId) {
        self.primaries.push(id);
    }

    pub fn primaries(&self) -> &[InstanceId] {
        &self.primaries
    }

    pub fn instance(&self, id: InstanceId) -> &Instance {
        &self.instances[id]
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> &mut Instance {
        &mut self.instances[id]
    }

    pub fn instances(&self) -> &Instances {
        &self.instances
    }

    pub fn instances_mut(&mut self) -> &mut Instances {
        &mut self.instances
    }

    /// Primary key of `id`, once saved.
    pub fn pk(&self, id: InstanceId) -> Option<i64> {
        self.instances[id].pk
    }

    pub fn foreign_keys(&self) -> &MultiMap<RelationKey, Link> {
        &self.foreign_keys
    }

    pub fn one_to_many(&self) -> &MultiMap<RelationKey, OwnedItems> {
        &self.one_to_many
    }

    pub fn many_to_many(&self) -> &MultiMap<RelationKey, OwnedItems> {
        &self.many_to_many
    }

    /// Side values registered under `name`, with their owning instance.
    pub fn side_values(&self, name: &'static str) -> &[(InstanceId, serde_json::Value)] {
        self.side_values.get(&name)
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn push_error(&mut self, error: RecordError) {
        self.errors.push(error);
    }

    /// Log `error` against the instance `id`, tagged with its identifiers.
    pub fn record_error(&mut self, id: InstanceId, error: ValidationError, config: &UpsertConfig) {
        let instance = &self.instances[id];
        let names = config.error_fields_for(instance.schema, self.target);
        let identifier_values = (!names.is_empty()).then(|| {
            names
                .iter()
                .map(|name| identifier_value(instance, name).to_string())
                .collect()
        });
        let entity = instance.schema.name;
        self.errors
            .push(RecordError::new(entity, identifier_values, error));
    }

    pub fn into_errors(self) -> Vec<RecordError> {
        self.errors.into_vec()
    }
}

fn identifier_value<'a>(instance: &'a Instance, name: &str) -> &'a Value {
    if instance.record.contains(name) {
        return instance.record.value(name);
    }
    match instance
        .schema
        .relation_set()
        .get(name)
        .and_then(|rel| rel.local_key)
    {
        Some(column) => instance.record.value(column),
        None => instance.record.value(name),
    }
}
