//! Chunked, transactional upsert of resource batches.

use resmap_core::{Filter, Resource, Result, Row, Storage, Value, atomic};
use resmap_query::select_in_batches;

use crate::config::UpsertConfig;
use crate::context::MapperContext;
use crate::errors::RecordError;
use crate::executor::{DomainPhase, SaveSummary, save_context};
use crate::mapper::ReverseMapper;

/// Result of an upsert call.
#[derive(Debug, Default)]
pub struct UpsertOutcome {
    /// The saved entities as stored after the call, in primary key order.
    pub saved: Vec<Row>,
    /// Every rejected record, pre-flight and per chunk.
    pub errors: Vec<RecordError>,
    pub summary: SaveSummary,
}

impl UpsertOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate `resources`, returning the indexes of the valid ones and the
/// errors of the others.
pub fn validate_resources<R: Resource>(
    resources: &[R],
    config: &UpsertConfig,
    entity: &str,
) -> (Vec<usize>, Vec<RecordError>) {
    let names = match &config.error_identifiers {
        Some(names) => names.clone(),
        None => config.identifier_mapping.get(entity).to_vec(),
    };
    let mut valid = Vec::with_capacity(resources.len());
    let mut errors = Vec::new();
    for (index, resource) in resources.iter().enumerate() {
        match resource.full_clean() {
            Ok(()) => valid.push(index),
            Err(error) => {
                let identifier_values = (!names.is_empty()).then(|| {
                    names
                        .iter()
                        .map(|name| resource.field_value(name).unwrap_or(Value::Null).to_string())
                        .collect()
                });
                errors.push(RecordError::new(R::NAME, identifier_values, error));
            }
        }
    }
    (valid, errors)
}

/// Create or update the entities described by `resources`.
///
/// Resources are validated first; unless `skip_invalid` is set a single
/// invalid resource means nothing is saved. The valid ones are then saved in
/// chunks of `chunk_size`, each inside its own transaction. A structural
/// error aborts the call; chunks committed before it stay committed.
#[tracing::instrument(level = "info", skip_all, fields(entity = mapper.entity().name, resources = resources.len()))]
pub fn upsert<M: ReverseMapper>(
    storage: &mut dyn Storage,
    mapper: &M,
    resources: &[M::Resource],
    config: &UpsertConfig,
    phase: Option<&dyn DomainPhase>,
) -> Result<UpsertOutcome> {
    config.validate()?;
    let entity = mapper.entity();
    let mut outcome = UpsertOutcome::default();

    let valid: Vec<usize> = if config.clean {
        let (valid, errors) = validate_resources(resources, config, entity.name);
        outcome.errors = errors;
        if !outcome.errors.is_empty() && !config.skip_invalid {
            tracing::info!(
                errors = outcome.errors.len(),
                "Invalid resources, nothing saved"
            );
            return Ok(outcome);
        }
        valid
    } else {
        (0..resources.len()).collect()
    };

    let mut saved_keys = Vec::new();
    for (chunk_index, chunk) in valid.chunks(config.chunk_size).enumerate() {
        let mut ctx = MapperContext::new(entity);
        for index in chunk {
            let id = mapper.map(&resources[*index], &mut ctx)?;
            ctx.add_primary(id);
        }
        let summary = atomic(&mut *storage, |s| save_context(s, &mut ctx, config, phase))?;
        outcome.summary.absorb(summary);

        saved_keys.extend(ctx.primaries().iter().filter_map(|id| ctx.pk(*id)));
        let errors = ctx.into_errors();
        tracing::debug!(
            chunk = chunk_index,
            resources = chunk.len(),
            errors = errors.len(),
            "Chunk committed"
        );
        outcome.errors.extend(errors);
    }

    saved_keys.sort_unstable();
    saved_keys.dedup();
    let keys: Vec<Value> = saved_keys.into_iter().map(Value::BigInt).collect();
    outcome.saved = select_in_batches(
        storage,
        entity,
        entity.pk_column(),
        &keys,
        &Filter::All,
        config.batch_size,
    )?;

    tracing::info!(
        saved = outcome.saved.len(),
        created = outcome.summary.created,
        updated = outcome.summary.updated,
        deleted = outcome.summary.deleted,
        errors = outcome.errors.len(),
        "Upsert complete"
    );
    Ok(outcome)
}
