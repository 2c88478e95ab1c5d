//! Bulk save of one mapper context.
//!
//! The executor reads what a [`MapperContext`] collected and writes it in
//! dependency order:
//!
//! 1. entities referenced through foreign keys
//! 2. the primary entities
//! 3. one-to-many children, stamped with their owner's key
//! 4. many-to-many targets and their through rows
//! 5. an optional domain phase
//!
//! Validation failures drop the failing instance and are logged on the
//! context; structural problems abort with [`Error::Structural`].

use std::collections::{HashMap, HashSet};

use resmap_core::{
    EntitySchema, Error, Filter, Record, RelationshipInfo, Result, Storage, StructuralErrorKind,
    ValidationError, Value, full_clean, validate_fields,
};
use resmap_query::{
    IdentityKey, create_in_batches, delete_in_batches, in_bulk, select_in_batches,
    update_in_batches,
};

use crate::config::UpsertConfig;
use crate::context::MapperContext;
use crate::instance::InstanceId;
use crate::multimap::RelationKey;
use crate::resolve::{Resolution, resolve};

/// Entity-specific work run after the generic phases.
pub trait DomainPhase {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    fn run(
        &self,
        storage: &mut dyn Storage,
        ctx: &mut MapperContext,
        config: &UpsertConfig,
    ) -> Result<SaveSummary>;
}

/// Row counts written by a save.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Through rows inserted.
    pub linked: usize,
    /// Through rows deleted.
    pub unlinked: usize,
}

impl SaveSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the counts of `other`.
    pub fn absorb(&mut self, other: SaveSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.linked += other.linked;
        self.unlinked += other.unlinked;
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted + self.linked + self.unlinked
    }
}

/// Save everything `ctx` collected.
///
/// The caller owns the transaction: run this inside
/// [`atomic`](resmap_core::atomic) so a structural error leaves nothing
/// behind.
#[tracing::instrument(level = "debug", skip_all, fields(entity = ctx.target().name, primaries = ctx.primaries().len()))]
pub fn save_context(
    storage: &mut dyn Storage,
    ctx: &mut MapperContext,
    config: &UpsertConfig,
    phase: Option<&dyn DomainPhase>,
) -> Result<SaveSummary> {
    let mut executor = Executor {
        storage,
        config,
        summary: SaveSummary::new(),
    };
    executor.save_foreign_keys(ctx)?;
    executor.save_primaries(ctx)?;
    executor.save_one_to_many(ctx)?;
    executor.save_many_to_many(ctx)?;

    if let Some(phase) = phase {
        let summary = phase.run(&mut *executor.storage, ctx, config)?;
        tracing::info!(
            phase = phase.name(),
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            "Domain phase complete"
        );
        executor.summary.absorb(summary);
    }

    let summary = executor.summary;
    tracing::info!(
        entity = ctx.target().name,
        created = summary.created,
        updated = summary.updated,
        deleted = summary.deleted,
        linked = summary.linked,
        unlinked = summary.unlinked,
        errors = ctx.errors().len(),
        "Saved chunk"
    );
    Ok(summary)
}

struct Executor<'a> {
    storage: &'a mut dyn Storage,
    config: &'a UpsertConfig,
    summary: SaveSummary,
}

impl Executor<'_> {
    /// Phase 1: entities the collected instances point at.
    #[tracing::instrument(level = "debug", skip_all)]
    fn save_foreign_keys(&mut self, ctx: &mut MapperContext) -> Result<()> {
        let keys: Vec<RelationKey> = ctx.foreign_keys().keys().copied().collect();
        let before = self.summary;
        for key in keys {
            let related = key.related();
            let targets: Vec<InstanceId> = ctx
                .foreign_keys()
                .get(&key)
                .iter()
                .map(|link| link.target)
                .filter(|target| !ctx.instance(*target).is_persisted())
                .collect();
            if targets.is_empty() {
                continue;
            }
            for target in &targets {
                ctx.instances_mut().sync_links(*target);
            }

            let identifiers = self.config.identifier_mapping.columns_for(related)?;
            let resolution = self.resolve(ctx, related, &targets, &identifiers)?;
            let missing: Vec<InstanceId> = resolution
                .to_create
                .iter()
                .chain(&resolution.duplicates)
                .copied()
                .collect();
            if !missing.is_empty() {
                if key.relation.must_exist {
                    return Err(Error::structural(
                        StructuralErrorKind::MissingParent,
                        related.name,
                        format!(
                            "{}.{} points at {} {} which does not exist; save it first",
                            key.owner.name,
                            key.relation.name,
                            related.name,
                            describe(ctx, &missing, &identifiers)
                        ),
                    ));
                }
                if related.is(ctx.target()) {
                    return Err(Error::structural(
                        StructuralErrorKind::SelfReferentialCreate,
                        related.name,
                        format!(
                            "cannot create {} {} through {}.{}; create it in a separate call first",
                            related.name,
                            describe(ctx, &missing, &identifiers),
                            key.owner.name,
                            key.relation.name
                        ),
                    ));
                }
            }

            self.create(ctx, related, &resolution.to_create)?;
            resolution.backfill(ctx.instances_mut(), &identifiers);
            self.update(ctx, related, &resolution.to_update)?;
            if related.is(ctx.target()) {
                self.refresh_links(ctx, related, &resolution.to_update)?;
            }
        }
        self.log_phase("foreign keys", before);
        Ok(())
    }

    /// Phase 2: the entities being saved.
    #[tracing::instrument(level = "debug", skip_all)]
    fn save_primaries(&mut self, ctx: &mut MapperContext) -> Result<()> {
        let before = self.summary;
        let target = ctx.target();
        let primaries = ctx.primaries().to_vec();
        let ready = self.link_or_reject(ctx, &primaries);

        let identifiers = self.config.identifier_mapping.columns_for(target)?;
        let resolution = self.resolve(ctx, target, &ready, &identifiers)?;
        self.create(ctx, target, &resolution.to_create)?;
        resolution.backfill(ctx.instances_mut(), &identifiers);
        self.update(ctx, target, &resolution.to_update)?;
        self.log_phase("primaries", before);
        Ok(())
    }

    /// Phase 3: children holding a foreign key to their owner.
    #[tracing::instrument(level = "debug", skip_all)]
    fn save_one_to_many(&mut self, ctx: &mut MapperContext) -> Result<()> {
        let before = self.summary;
        let keys: Vec<RelationKey> = ctx.one_to_many().keys().copied().collect();
        for key in keys {
            let relation = key.relation;
            let child = relation.related;
            let Some(remote_key) = relation.remote_key else {
                continue;
            };

            let mut owners = Vec::new();
            let mut children = Vec::new();
            let mut incomplete = HashSet::new();
            for entry in ctx.one_to_many().get(&key).to_vec() {
                let Some(owner_pk) = ctx.pk(entry.owner) else {
                    tracing::debug!(
                        relation = relation.name,
                        children = entry.items.len(),
                        "Skipping children of an unsaved owner"
                    );
                    continue;
                };
                owners.push(owner_pk);
                for item in entry.items {
                    ctx.instance_mut(item)
                        .record
                        .set(remote_key, Value::BigInt(owner_pk));
                    if !self.sync_or_reject(ctx, item) {
                        incomplete.insert(owner_pk);
                        continue;
                    }
                    children.push(item);
                }
            }

            let identifiers = self.config.identifier_mapping.columns_for(child)?;
            let resolution = self.resolve(ctx, child, &children, &identifiers)?;
            self.create(ctx, child, &resolution.to_create)?;
            resolution.backfill(ctx.instances_mut(), &identifiers);
            self.update(ctx, child, &resolution.to_update)?;

            if self.config.delete_related && self.config.fields_to_update.has_entity(child.name) {
                owners.retain(|pk| !incomplete.contains(pk));
                let kept: HashSet<i64> = children.iter().filter_map(|id| ctx.pk(*id)).collect();
                self.delete_stale_children(child, remote_key, &owners, &kept)?;
            }
        }
        self.log_phase("one-to-many", before);
        Ok(())
    }

    /// Phase 4: many-to-many targets, then the through rows linking them.
    #[tracing::instrument(level = "debug", skip_all)]
    fn save_many_to_many(&mut self, ctx: &mut MapperContext) -> Result<()> {
        let before = self.summary;
        let keys: Vec<RelationKey> = ctx.many_to_many().keys().copied().collect();
        for key in keys {
            let relation = key.relation;
            let related = relation.related;
            let entries = ctx.many_to_many().get(&key).to_vec();

            let targets: Vec<InstanceId> = entries
                .iter()
                .flat_map(|entry| entry.items.iter().copied())
                .collect();
            let targets = self.link_or_reject(ctx, &targets);
            let identifiers = self.config.identifier_mapping.columns_for(related)?;
            let resolution = self.resolve(ctx, related, &targets, &identifiers)?;

            let mut missing = HashSet::new();
            if relation.must_exist {
                for id in resolution.to_create.iter().chain(&resolution.duplicates) {
                    let mut error = ValidationError::new();
                    error.add_custom(
                        relation.name,
                        format!("{} does not exist", related.name),
                    );
                    ctx.record_error(*id, error, self.config);
                    missing.insert(*id);
                }
            } else {
                self.create(ctx, related, &resolution.to_create)?;
                resolution.backfill(ctx.instances_mut(), &identifiers);
            }
            self.update(ctx, related, &resolution.to_update)?;

            if !self.config.fields_to_update.has_entity(related.name) {
                tracing::debug!(
                    relation = relation.name,
                    "No updatable fields for the related entity, leaving through rows alone"
                );
                continue;
            }
            self.reconcile_through_rows(ctx, key, &entries, &missing)?;
        }
        self.log_phase("many-to-many", before);
        Ok(())
    }

    fn reconcile_through_rows(
        &mut self,
        ctx: &mut MapperContext,
        key: RelationKey,
        entries: &[crate::multimap::OwnedItems],
        missing: &HashSet<InstanceId>,
    ) -> Result<()> {
        let relation = key.relation;
        let Some(link) = relation.link_table else {
            return Ok(());
        };

        let mut owners = Vec::new();
        let mut pairs: Vec<(i64, i64)> = Vec::new();
        let mut wanted = HashSet::new();
        for entry in entries {
            let Some(owner_pk) = ctx.pk(entry.owner) else {
                continue;
            };
            owners.push(owner_pk);
            for item in &entry.items {
                match ctx.pk(*item) {
                    Some(target_pk) => {
                        if wanted.insert((owner_pk, target_pk)) {
                            pairs.push((owner_pk, target_pk));
                        }
                    }
                    None if missing.contains(item) => {
                        tracing::warn!(
                            relation = relation.name,
                            owner = owner_pk,
                            "Dropping through row to a missing target"
                        );
                    }
                    None => {
                        if self.config.block_on_unlinked_through_rows {
                            return Err(Error::structural(
                                StructuralErrorKind::UnlinkedThroughRow,
                                link.entity.name,
                                format!(
                                    "{}.{} of {} {} links a {} that was not saved",
                                    key.owner.name,
                                    relation.name,
                                    key.owner.name,
                                    owner_pk,
                                    relation.related.name
                                ),
                            ));
                        }
                        tracing::warn!(
                            relation = relation.name,
                            owner = owner_pk,
                            "Dropping through row to an unsaved target"
                        );
                        let mut error = ValidationError::new();
                        error.add_unsaved_related(relation.name, relation.related.name);
                        ctx.record_error(entry.owner, error, self.config);
                    }
                }
            }
        }

        let columns = [link.local_column, link.remote_column];
        let tuples: Vec<Vec<Value>> = pairs
            .iter()
            .map(|(owner, target)| vec![Value::BigInt(*owner), Value::BigInt(*target)])
            .collect();
        let existing = in_bulk(
            &mut *self.storage,
            link.entity,
            &columns,
            &tuples,
            self.config.batch_size,
        )?;
        let records: Vec<Record> = pairs
            .iter()
            .zip(&tuples)
            .filter(|(_, tuple)| !existing.contains_key(&IdentityKey::from_values(tuple)))
            .map(|((owner, target), _)| {
                let mut record = Record::new();
                record.set(link.local_column, Value::BigInt(*owner));
                record.set(link.remote_column, Value::BigInt(*target));
                record
            })
            .collect();
        create_in_batches(&mut *self.storage, link.entity, &records, self.config.batch_size)?;
        self.summary.linked += records.len();

        if self.config.delete_related && !owners.is_empty() {
            let owner_keys: Vec<Value> = owners.iter().map(|pk| Value::BigInt(*pk)).collect();
            let rows = select_in_batches(
                &mut *self.storage,
                link.entity,
                link.local_column,
                &owner_keys,
                &Filter::All,
                self.config.batch_size,
            )?;
            let pk_column = link.entity.pk_column();
            let mut stale = Vec::new();
            for row in rows {
                let pair = (row.pk(link.local_column)?, row.pk(link.remote_column)?);
                if !wanted.contains(&pair) {
                    stale.push(Value::BigInt(row.pk(pk_column)?));
                }
            }
            let deleted = delete_in_batches(
                &mut *self.storage,
                link.entity,
                pk_column,
                &stale,
                &Filter::All,
                self.config.batch_size,
            )?;
            self.summary.unlinked += usize::try_from(deleted).unwrap_or(usize::MAX);
        }
        Ok(())
    }

    fn delete_stale_children(
        &mut self,
        child: &'static EntitySchema,
        remote_key: &'static str,
        owners: &[i64],
        kept: &HashSet<i64>,
    ) -> Result<()> {
        if owners.is_empty() {
            return Ok(());
        }
        let owner_keys: Vec<Value> = owners.iter().map(|pk| Value::BigInt(*pk)).collect();
        let rows = select_in_batches(
            &mut *self.storage,
            child,
            remote_key,
            &owner_keys,
            &Filter::All,
            self.config.batch_size,
        )?;
        let pk_column = child.pk_column();
        let mut stale = Vec::new();
        for row in rows {
            let pk = row.pk(pk_column)?;
            if !kept.contains(&pk) {
                stale.push(Value::BigInt(pk));
            }
        }
        let deleted = delete_in_batches(
            &mut *self.storage,
            child,
            pk_column,
            &stale,
            &Filter::All,
            self.config.batch_size,
        )?;
        self.summary.deleted += usize::try_from(deleted).unwrap_or(usize::MAX);
        Ok(())
    }

    fn resolve(
        &mut self,
        ctx: &mut MapperContext,
        entity: &'static EntitySchema,
        ids: &[InstanceId],
        identifiers: &[&'static str],
    ) -> Result<Resolution> {
        resolve(
            &mut *self.storage,
            ctx.instances_mut(),
            entity,
            ids,
            identifiers,
            self.config.batch_size,
        )
    }

    /// Validate and insert `ids`, giving each its generated key.
    fn create(
        &mut self,
        ctx: &mut MapperContext,
        entity: &'static EntitySchema,
        ids: &[InstanceId],
    ) -> Result<()> {
        let mut valid = Vec::with_capacity(ids.len());
        for id in ids {
            if self.config.clean {
                if let Err(error) = full_clean(entity, &ctx.instance(*id).record) {
                    ctx.record_error(*id, error, self.config);
                    continue;
                }
            }
            valid.push(*id);
        }
        if self.config.clean {
            let clashes = self.unique_clashes(ctx, entity, &valid, None)?;
            valid.retain(|id| !clashes.contains(id));
        }
        if valid.is_empty() {
            return Ok(());
        }

        let records: Vec<Record> = valid
            .iter()
            .map(|id| ctx.instance(*id).record.clone())
            .collect();
        let keys = create_in_batches(&mut *self.storage, entity, &records, self.config.batch_size)?;
        if keys.len() != valid.len() {
            return Err(Error::structural(
                StructuralErrorKind::MissingGeneratedKeys,
                entity.name,
                format!(
                    "the storage returned {} keys for {} inserted rows",
                    keys.len(),
                    valid.len()
                ),
            ));
        }
        for (id, key) in valid.iter().zip(keys) {
            let Some(pk) = key else {
                return Err(Error::structural(
                    StructuralErrorKind::MissingGeneratedKeys,
                    entity.name,
                    "the storage did not return generated primary keys for a bulk insert; \
                     it cannot be used to create entities",
                ));
            };
            ctx.instance_mut(*id).persist(pk);
        }
        self.summary.created += valid.len();
        Ok(())
    }

    /// Validate and write the updatable fields of `ids`.
    ///
    /// Nothing is written for an entity without updatable fields.
    fn update(
        &mut self,
        ctx: &mut MapperContext,
        entity: &'static EntitySchema,
        ids: &[InstanceId],
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let Some(columns) = self.config.fields_to_update.columns_for(entity)? else {
            tracing::debug!(entity = entity.name, skipped = ids.len(), "No updatable fields");
            return Ok(());
        };

        let mut valid = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(pk) = ctx.pk(*id) else {
                continue;
            };
            if self.config.clean {
                let record = &ctx.instance(*id).record;
                let assigned: Vec<&str> = columns
                    .iter()
                    .copied()
                    .filter(|column| record.contains(column))
                    .collect();
                if let Err(error) = validate_fields(entity, record, Some(assigned.as_slice())) {
                    ctx.record_error(*id, error, self.config);
                    continue;
                }
            }
            valid.push((*id, pk));
        }
        if self.config.clean {
            let ids: Vec<InstanceId> = valid.iter().map(|(id, _)| *id).collect();
            let clashes = self.unique_clashes(ctx, entity, &ids, Some(columns.as_slice()))?;
            valid.retain(|(id, _)| !clashes.contains(id));
        }

        let rows: Vec<(i64, &Record)> = valid
            .iter()
            .map(|(id, pk)| (*pk, &ctx.instance(*id).record))
            .collect();
        update_in_batches(
            &mut *self.storage,
            entity,
            &rows,
            &columns,
            self.config.batch_size,
        )?;
        self.summary.updated += rows.len();
        Ok(())
    }

    /// Reject the instances of `ids` whose unique columns hold a value that
    /// another stored row or an earlier instance of `ids` already holds.
    ///
    /// Only `columns` are checked when given. Returns the rejected ids; their
    /// errors are logged on the context.
    fn unique_clashes(
        &mut self,
        ctx: &mut MapperContext,
        entity: &'static EntitySchema,
        ids: &[InstanceId],
        columns: Option<&[&'static str]>,
    ) -> Result<HashSet<InstanceId>> {
        let pk_column = entity.pk_column();
        let mut errors: HashMap<InstanceId, ValidationError> = HashMap::new();
        for field in entity.fields.iter().filter(|f| f.unique && !f.primary_key) {
            if columns.is_some_and(|columns| !columns.contains(&field.name)) {
                continue;
            }
            let values: Vec<(InstanceId, Value)> = ids
                .iter()
                .filter_map(|id| {
                    let record = &ctx.instance(*id).record;
                    let value = record.value(field.name);
                    (record.contains(field.name) && !value.is_null()).then(|| (*id, value.clone()))
                })
                .collect();
            if values.is_empty() {
                continue;
            }
            let tuples: Vec<Vec<Value>> = values.iter().map(|(_, v)| vec![v.clone()]).collect();
            let stored = in_bulk(
                &mut *self.storage,
                entity,
                &[field.name],
                &tuples,
                self.config.batch_size,
            )?;

            let mut seen = HashSet::new();
            for (id, value) in values {
                let key = IdentityKey::from_values(std::slice::from_ref(&value));
                let owner = ctx.pk(id);
                let taken = stored
                    .get(&key)
                    .is_some_and(|row| row.pk(pk_column).ok() != owner);
                if !seen.insert(key) || taken {
                    errors.entry(id).or_default().add_custom(
                        field.name,
                        format!("{} with this {} already exists.", entity.name, field.name),
                    );
                }
            }
        }

        let rejected: HashSet<InstanceId> = errors.keys().copied().collect();
        if !rejected.is_empty() {
            tracing::debug!(entity = entity.name, rejected = rejected.len(), "Unique values taken");
        }
        for id in ids {
            if let Some(error) = errors.remove(id) {
                ctx.record_error(*id, error, self.config);
            }
        }
        Ok(rejected)
    }

    /// Overwrite the foreign key columns of `ids` with the stored ones.
    ///
    /// Runs after the phase 1 update of matched parents of the entity type
    /// being saved. A parent is mapped from a bare reference, so its record
    /// holds only the identifiers and whatever keys the reference carried.
    fn refresh_links(
        &mut self,
        ctx: &mut MapperContext,
        entity: &'static EntitySchema,
        ids: &[InstanceId],
    ) -> Result<()> {
        let columns: Vec<&'static str> = entity
            .relation_set()
            .foreign_keys
            .iter()
            .filter_map(|rel| rel.local_key)
            .collect();
        if ids.is_empty() || columns.is_empty() {
            return Ok(());
        }
        let keys: Vec<Value> = ids
            .iter()
            .filter_map(|id| ctx.pk(*id))
            .map(Value::BigInt)
            .collect();
        let pk_column = entity.pk_column();
        let rows = select_in_batches(
            &mut *self.storage,
            entity,
            pk_column,
            &keys,
            &Filter::All,
            self.config.batch_size,
        )?;
        for id in ids {
            let Some(pk) = ctx.pk(*id) else {
                continue;
            };
            let Some(row) = rows.iter().find(|row| row.pk(pk_column).ok() == Some(pk)) else {
                continue;
            };
            let instance = ctx.instance_mut(*id);
            for &column in &columns {
                if let Some(value) = row.get_by_name(column) {
                    instance.record.set(column, value.clone());
                }
            }
        }
        Ok(())
    }

    /// Sync the links of `ids`, rejecting the ones pointing at unsaved
    /// instances.
    fn link_or_reject(&self, ctx: &mut MapperContext, ids: &[InstanceId]) -> Vec<InstanceId> {
        ids.iter()
            .copied()
            .filter(|id| self.sync_or_reject(ctx, *id))
            .collect()
    }

    fn sync_or_reject(&self, ctx: &mut MapperContext, id: InstanceId) -> bool {
        let unsaved: Vec<&'static RelationshipInfo> = ctx.instances_mut().sync_links(id);
        if unsaved.is_empty() {
            return true;
        }
        let mut error = ValidationError::new();
        for relation in unsaved {
            error.add_unsaved_related(relation.name, relation.related.name);
        }
        ctx.record_error(id, error, self.config);
        false
    }

    fn log_phase(&self, phase: &'static str, before: SaveSummary) {
        let s = self.summary;
        tracing::info!(
            phase = phase,
            created = s.created - before.created,
            updated = s.updated - before.updated,
            deleted = s.deleted - before.deleted,
            linked = s.linked - before.linked,
            unlinked = s.unlinked - before.unlinked,
            "Phase complete"
        );
    }
}

/// Identifier values of `ids`, for messages.
fn describe(ctx: &MapperContext, ids: &[InstanceId], identifiers: &[&'static str]) -> String {
    let labels: Vec<String> = ids
        .iter()
        .map(|id| {
            let record = &ctx.instance(*id).record;
            let values: Vec<String> = identifiers
                .iter()
                .map(|f| record.value(f).to_string())
                .collect();
            format!("({})", values.join(", "))
        })
        .collect();
    labels.join(", ")
}
