//! Runtime validation of entity records.
//!
//! Field checks are driven by [`FieldInfo`] metadata: required, blank,
//! max length, choices, regex pattern and column type. A full clean adds the
//! schema's cross-field hook on top.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;

use crate::entity::EntitySchema;
use crate::error::ValidationError;
use crate::field::{FieldInfo, FieldKind};
use crate::record::Record;
use crate::value::Value;

/// Thread-safe cache of compiled patterns.
///
/// Patterns are compiled lazily on first use and kept for the lifetime of
/// the program.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)?;
        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.insert(pattern.to_string(), regex.clone());
        }
        Ok(regex)
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// The compiled form of `pattern`, or `None` (with a warning) when it is
/// not a valid regex.
pub fn compiled_pattern(pattern: &str) -> Option<Regex> {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "Invalid regex pattern in validation, treating as non-match"
            );
            None
        }
    }
}

/// Check if a string matches a regex pattern.
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    compiled_pattern(pattern).is_some_and(|regex| regex.is_match(value))
}

/// Check one field value, appending failures to `errors`.
///
/// `value` is `None` when the field was never assigned.
pub fn validate_field(field: &FieldInfo, value: Option<&Value>, errors: &mut ValidationError) {
    let value = match value {
        None | Some(Value::Null) => {
            if field.is_required() {
                errors.add_required(field.name);
            }
            return;
        }
        Some(value) => value,
    };

    if !field.kind.accepts(value) {
        errors.add_type(field.name, field.kind.name(), value.type_name());
        return;
    }

    if field.kind != FieldKind::Text {
        return;
    }
    let Some(text) = value.as_str() else {
        return;
    };
    if text.is_empty() {
        if !field.blank {
            errors.add_blank(field.name);
        }
        return;
    }
    if let Some(max) = field.max_length {
        let len = text.chars().count();
        if len > max {
            errors.add_max_length(field.name, max, len);
        }
    }
    if !field.choices.is_empty() && !field.choices.contains(&text) {
        errors.add_choice(field.name, text, field.choices);
    }
    if let Some(pattern) = field.pattern {
        if !matches_pattern(text, pattern) {
            errors.add_pattern(field.name, pattern);
        }
    }
}

/// Validate the fields of `record`.
///
/// With `only`, just the named fields are checked; otherwise every
/// non-key field of the schema is.
pub fn validate_fields(
    schema: &EntitySchema,
    record: &Record,
    only: Option<&[&str]>,
) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    for field in schema.fields.iter().filter(|f| !f.primary_key) {
        if only.is_some_and(|names| !names.contains(&field.name)) {
            continue;
        }
        validate_field(field, record.get(field.name), &mut errors);
    }
    errors.into_result()
}

/// Validate every field, then run the schema's cross-field hook.
pub fn full_clean(schema: &EntitySchema, record: &Record) -> Result<(), ValidationError> {
    let mut errors = match validate_fields(schema, record, None) {
        Ok(()) => ValidationError::new(),
        Err(errors) => errors,
    };
    if let Some(clean) = schema.clean {
        if let Err(model_errors) = clean(record) {
            errors.merge(model_errors);
        }
    }
    errors.into_result()
}
