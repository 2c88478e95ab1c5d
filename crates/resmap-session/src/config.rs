//! Per-call upsert configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use resmap_core::{ConfigError, EntitySchema, Error, Result};
use resmap_query::DEFAULT_BATCH_SIZE;

/// Default number of resources saved per transaction.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Fields an upsert may write on rows that already exist.
///
/// Entries are `"Entity.field"` strings. An entity without any entry is never
/// updated. A field may name a foreign key relation (`"Product.parent"`),
/// which stands for the relation's key column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldsToUpdate(Vec<String>);

impl FieldsToUpdate {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }

    /// Add more entries.
    pub fn extend<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.extend(fields.into_iter().map(Into::into));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names listed for `entity`, or `None` when it has no entry.
    pub fn fields_for(&self, entity: &str) -> Option<Vec<&str>> {
        let fields: Vec<&str> = self
            .0
            .iter()
            .filter_map(|entry| entry.split_once('.'))
            .filter(|(name, _)| *name == entity)
            .map(|(_, field)| field)
            .collect();
        (!fields.is_empty()).then_some(fields)
    }

    /// Whether `entity` has at least one entry.
    pub fn has_entity(&self, entity: &str) -> bool {
        self.fields_for(entity).is_some()
    }

    /// The writable columns of `entity`, with relation names translated to
    /// their key columns.
    pub fn columns_for(&self, entity: &'static EntitySchema) -> Result<Option<Vec<&'static str>>> {
        match self.fields_for(entity.name) {
            None => Ok(None),
            Some(fields) => {
                let mut columns = Vec::with_capacity(fields.len());
                for field in fields {
                    let column = resolve_column(entity, field)?;
                    if !columns.contains(&column) {
                        columns.push(column);
                    }
                }
                Ok(Some(columns))
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Identifying fields per entity name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierMapping(BTreeMap<String, Vec<String>>);

impl IdentifierMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identifying fields of `entity`.
    pub fn with<I, S>(mut self, entity: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(entity, fields);
        self
    }

    pub fn insert<I, S>(&mut self, entity: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(entity.into(), fields.into_iter().map(Into::into).collect());
    }

    /// Identifying field names of `entity`, empty when none are configured.
    pub fn get(&self, entity: &str) -> &[String] {
        self.0.get(entity).map_or(&[], Vec::as_slice)
    }

    /// Identifying columns of `entity`, relation names translated to key
    /// columns.
    pub fn columns_for(&self, entity: &'static EntitySchema) -> Result<Vec<&'static str>> {
        self.get(entity.name)
            .iter()
            .map(|field| resolve_column(entity, field))
            .collect()
    }
}

/// Map a field or foreign key relation name to a column of `entity`.
fn resolve_column(entity: &'static EntitySchema, name: &str) -> Result<&'static str> {
    if let Some(field) = entity.field(name) {
        return Ok(field.name);
    }
    if let Some(column) = entity
        .relation_set()
        .get(name)
        .filter(|rel| rel.is_foreign_key())
        .and_then(|rel| rel.local_key)
    {
        return Ok(column);
    }
    Err(Error::Config(ConfigError {
        message: format!("{} has no field or foreign key named '{}'", entity.name, name),
    }))
}

/// Settings of one upsert call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpsertConfig {
    /// Fields that may be written on existing rows.
    pub fields_to_update: FieldsToUpdate,
    /// Identifying fields per entity.
    pub identifier_mapping: IdentifierMapping,
    /// Resources saved per transaction.
    pub chunk_size: usize,
    /// Tuples per existence lookup when the storage has no parameter limit.
    pub batch_size: usize,
    /// Delete related rows that are no longer submitted.
    pub delete_related: bool,
    /// Validate entities before writing them.
    pub clean: bool,
    /// Save the valid resources when some fail validation, instead of
    /// saving nothing.
    pub skip_invalid: bool,
    /// Fields used to tag errors of the target entity. Defaults to its
    /// identifying fields.
    pub error_identifiers: Option<Vec<String>>,
    /// Treat a through row whose target was never saved as fatal.
    pub block_on_unlinked_through_rows: bool,
}

impl Default for UpsertConfig {
    fn default() -> Self {
        Self {
            fields_to_update: FieldsToUpdate::default(),
            identifier_mapping: IdentifierMapping::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            delete_related: false,
            clean: true,
            skip_invalid: false,
            error_identifiers: None,
            block_on_unlinked_through_rows: false,
        }
    }
}

impl UpsertConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON; absent keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config(ConfigError {
                message: "chunk_size must be at least 1".to_string(),
            }));
        }
        if self.batch_size == 0 {
            return Err(Error::Config(ConfigError {
                message: "batch_size must be at least 1".to_string(),
            }));
        }
        Ok(())
    }

    pub fn fields_to_update(mut self, fields: FieldsToUpdate) -> Self {
        self.fields_to_update = fields;
        self
    }

    pub fn identifier_mapping(mut self, mapping: IdentifierMapping) -> Self {
        self.identifier_mapping = mapping;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn delete_related(mut self, value: bool) -> Self {
        self.delete_related = value;
        self
    }

    pub fn clean(mut self, value: bool) -> Self {
        self.clean = value;
        self
    }

    pub fn skip_invalid(mut self, value: bool) -> Self {
        self.skip_invalid = value;
        self
    }

    pub fn error_identifiers<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.error_identifiers = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn block_on_unlinked_through_rows(mut self, value: bool) -> Self {
        self.block_on_unlinked_through_rows = value;
        self
    }

    /// Field names used to tag errors raised for `entity` while saving
    /// `target`.
    pub fn error_fields_for(&self, entity: &EntitySchema, target: &EntitySchema) -> Vec<String> {
        match &self.error_identifiers {
            Some(fields) if entity.is(target) => fields.clone(),
            _ => self.identifier_mapping.get(entity.name).to_vec(),
        }
    }
}
