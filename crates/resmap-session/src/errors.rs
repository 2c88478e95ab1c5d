//! Per-record error collection.

use std::fmt;

use resmap_core::ValidationError;

/// A validation failure of one record, tagged with its business identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordError {
    /// Entity (or resource) name of the failing record.
    pub entity: &'static str,
    /// Values of the record's identifying fields, when any are configured.
    pub identifier_values: Option<Vec<String>>,
    pub error: ValidationError,
}

impl RecordError {
    pub fn new(
        entity: &'static str,
        identifier_values: Option<Vec<String>>,
        error: ValidationError,
    ) -> Self {
        Self {
            entity,
            identifier_values,
            error,
        }
    }

    /// Whether the error is tagged with exactly `values`.
    pub fn is_for(&self, values: &[&str]) -> bool {
        self.identifier_values
            .as_ref()
            .is_some_and(|ids| ids.iter().map(String::as_str).eq(values.iter().copied()))
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier_values {
            Some(ids) => write!(f, "{} ({}): {}", self.entity, ids.join(", "), self.error),
            None => write!(f, "{}: {}", self.entity, self.error),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Errors collected while saving one call.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    errors: Vec<RecordError>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: RecordError) {
        tracing::debug!(entity = error.entity, error = %error, "Record rejected");
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<RecordError> {
        self.errors
    }
}
