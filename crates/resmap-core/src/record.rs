//! Field values assigned to an in-memory entity instance.

use std::collections::BTreeMap;

use crate::value::Value;

/// The assigned fields of one entity instance.
///
/// Only fields that were explicitly assigned are present. Storage applies
/// column defaults for absent fields on insert, and updates only ever write
/// fields that are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<&'static str, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an assigned value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Get an assigned value, treating absent fields as NULL.
    pub fn value(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&Value::Null)
    }

    /// Assign a field, returning the previous value.
    pub fn set(&mut self, field: &'static str, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(field, value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Names of the assigned fields, in name order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy every assigned field of `other` over this record.
    pub fn merge(&mut self, other: &Record) {
        for (field, value) in other.iter() {
            self.values.insert(field, value.clone());
        }
    }
}

impl FromIterator<(&'static str, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (&'static str, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
