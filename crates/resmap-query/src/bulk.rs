//! Batched existence lookups by identifying tuple.

use std::collections::{HashMap, HashSet};

use resmap_core::{EntitySchema, Result, Row, Storage, StorageFeatures, Value};

use crate::key::IdentityKey;

/// Number of tuples of `nfields` values that fit in one statement.
///
/// With a parameter limit this stays strictly below it; without one,
/// `fallback` is used.
pub fn batch_size(features: &StorageFeatures, nfields: usize, fallback: usize) -> usize {
    match features.max_query_params {
        Some(max) => (max / nfields.max(1)).saturating_sub(1).max(1),
        None => fallback.max(1),
    }
}

/// Look up the stored rows whose `fields` equal any of `tuples`.
///
/// Tuples containing NULL are skipped (they can never match) and duplicate
/// tuples are looked up once. The lookup is split into as many statements as
/// needed to stay under the storage's parameter limit; results are unioned
/// and keyed by identifying tuple.
#[tracing::instrument(level = "debug", skip(storage, entity, tuples), fields(table = entity.table, candidates = tuples.len()))]
pub fn in_bulk(
    storage: &mut dyn Storage,
    entity: &'static EntitySchema,
    fields: &[&'static str],
    tuples: &[Vec<Value>],
    fallback_batch: usize,
) -> Result<HashMap<IdentityKey, Row>> {
    let mut found = HashMap::new();
    if fields.is_empty() {
        return Ok(found);
    }

    let mut seen = HashSet::new();
    let candidates: Vec<Vec<Value>> = tuples
        .iter()
        .filter(|tuple| {
            let key = IdentityKey::from_values(tuple);
            !key.has_null() && seen.insert(key)
        })
        .cloned()
        .collect();
    if candidates.is_empty() {
        return Ok(found);
    }

    let size = batch_size(&storage.features(), fields.len(), fallback_batch);
    let mut statements = 0;
    for batch in candidates.chunks(size) {
        for row in storage.filter_by_or_of_tuples(entity, fields, batch)? {
            let key = IdentityKey::from_row(&row, fields);
            found.entry(key).or_insert(row);
        }
        statements += 1;
    }

    tracing::debug!(
        entity = entity.name,
        candidates = candidates.len(),
        found = found.len(),
        statements = statements,
        "Resolved identifying tuples"
    );
    Ok(found)
}
