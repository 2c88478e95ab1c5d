//! Parameter-bounded bulk statements.
//!
//! Every helper here splits its work into as many statements as needed to
//! keep each one under the storage's parameter limit.

use resmap_core::{EntitySchema, Filter, Record, Result, Row, Storage, Value};

use crate::bulk::batch_size;

/// Rows where `column IN keys`, further restricted by `base`.
#[tracing::instrument(level = "debug", skip(storage, entity, keys, base), fields(table = entity.table, keys = keys.len()))]
pub fn select_in_batches(
    storage: &mut dyn Storage,
    entity: &'static EntitySchema,
    column: &'static str,
    keys: &[Value],
    base: &Filter,
    fallback_batch: usize,
) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    if keys.is_empty() {
        return Ok(rows);
    }
    let size = in_list_size(storage, base, fallback_batch);
    for chunk in keys.chunks(size) {
        let filter = base.clone().and(Filter::in_list(column, chunk.to_vec()));
        rows.extend(storage.select(entity, &filter)?);
    }
    Ok(rows)
}

/// Delete rows where `column IN keys`, further restricted by `base`.
#[tracing::instrument(level = "debug", skip(storage, entity, keys, base), fields(table = entity.table, keys = keys.len()))]
pub fn delete_in_batches(
    storage: &mut dyn Storage,
    entity: &'static EntitySchema,
    column: &'static str,
    keys: &[Value],
    base: &Filter,
    fallback_batch: usize,
) -> Result<u64> {
    let mut deleted = 0;
    if keys.is_empty() {
        return Ok(deleted);
    }
    let size = in_list_size(storage, base, fallback_batch);
    for chunk in keys.chunks(size) {
        let filter = base.clone().and(Filter::in_list(column, chunk.to_vec()));
        deleted += storage.delete_where(entity, &filter)?;
    }
    Ok(deleted)
}

/// Insert `records`, returning the generated key of each in order.
pub fn create_in_batches(
    storage: &mut dyn Storage,
    entity: &'static EntitySchema,
    records: &[Record],
    fallback_batch: usize,
) -> Result<Vec<Option<i64>>> {
    let columns = entity.fields.len().saturating_sub(1).max(1);
    let size = batch_size(&storage.features(), columns, fallback_batch);
    let mut keys = Vec::with_capacity(records.len());
    for chunk in records.chunks(size) {
        keys.extend(storage.create_many(entity, chunk)?);
    }
    Ok(keys)
}

/// Write `fields` of each `(pk, record)`.
pub fn update_in_batches(
    storage: &mut dyn Storage,
    entity: &'static EntitySchema,
    rows: &[(i64, &Record)],
    fields: &[&'static str],
    fallback_batch: usize,
) -> Result<u64> {
    if fields.is_empty() {
        return Ok(0);
    }
    let size = batch_size(&storage.features(), fields.len() + 1, fallback_batch);
    let mut updated = 0;
    for chunk in rows.chunks(size) {
        updated += storage.update_many(entity, chunk, fields)?;
    }
    Ok(updated)
}

fn in_list_size(storage: &dyn Storage, base: &Filter, fallback_batch: usize) -> usize {
    match storage.features().max_query_params {
        Some(max) => max.saturating_sub(base.param_count()).max(1),
        None => fallback_batch.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resmap_core::{FieldInfo, FieldKind, RelationshipInfo};
    use resmap_memory::{MemoryStore, StatementKind};

    static IMAGE_FIELDS: [FieldInfo; 3] = [
        FieldInfo::pk("id"),
        FieldInfo::fk("product_id", "Product"),
        FieldInfo::new("code", FieldKind::Text),
    ];
    static IMAGE_RELATIONS: [RelationshipInfo; 0] = [];
    static IMAGE: EntitySchema =
        EntitySchema::new("ProductImage", "productimage", &IMAGE_FIELDS, &IMAGE_RELATIONS, None);

    fn images(count: i64) -> Vec<Record> {
        (0..count)
            .map(|i| {
                let mut record = Record::new();
                record.set("product_id", Value::BigInt(i % 3));
                record.set("code", format!("img-{i}"));
                record
            })
            .collect()
    }

    #[test]
    fn test_create_and_select_stay_under_the_limit() {
        let mut store = MemoryStore::new().with_max_query_params(7);
        let keys = create_in_batches(&mut store, &IMAGE, &images(9), 500).unwrap();
        assert_eq!(keys.len(), 9);
        assert!(keys.iter().all(Option::is_some));
        // two columns per record, two records per statement
        assert_eq!(store.statement_count(StatementKind::Insert, "ProductImage"), 5);

        let owners: Vec<Value> = (0..3).map(Value::BigInt).collect();
        let rows = select_in_batches(
            &mut store,
            &IMAGE,
            "product_id",
            &owners,
            &Filter::eq("code", "img-4"),
            500,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<i64>("product_id").unwrap(), 1);
    }

    #[test]
    fn test_update_and_delete_in_batches() {
        let mut store = MemoryStore::new().with_max_query_params(4);
        create_in_batches(&mut store, &IMAGE, &images(6), 500).unwrap();

        let mut renamed = Record::new();
        renamed.set("code", "renamed");
        let targets: Vec<(i64, &Record)> = (1..=6).map(|pk| (pk, &renamed)).collect();
        let updated = update_in_batches(&mut store, &IMAGE, &targets, &["code"], 500).unwrap();
        assert_eq!(updated, 6);

        let pks: Vec<Value> = (1..=5).map(Value::BigInt).collect();
        let deleted = delete_in_batches(&mut store, &IMAGE, "id", &pks, &Filter::All, 500).unwrap();
        assert_eq!(deleted, 5);
        assert_eq!(store.count(&IMAGE), 1);
        assert!(store.statements().iter().all(|s| s.params <= 4));
    }
}
