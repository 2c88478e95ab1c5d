//! `MemoryStore`: an in-process implementation of [`Storage`].

#![allow(clippy::result_large_err)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use resmap_core::error::{QueryError, QueryErrorKind, TransactionError, TransactionErrorKind};
use resmap_core::row::Columns;
use resmap_core::{
    Dialect, EntitySchema, Error, Filter, Record, Result, Row, Storage, StorageFeatures, Value,
};

/// Kind of statement recorded in the statement log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Select,
    Delete,
}

/// One executed statement.
#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    /// Entity the statement targeted
    pub entity: &'static str,
    /// Rendered SQL, for diagnostics
    pub sql: String,
    /// Number of bound parameters
    pub params: usize,
}

type StoredRow = BTreeMap<&'static str, Value>;

#[derive(Debug, Clone, Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, StoredRow>,
}

/// In-memory relational store.
///
/// Enforces NOT NULL and UNIQUE column constraints, applies column defaults,
/// supports one flat transaction at a time through snapshots and keeps a log
/// of every statement it executed. Foreign keys are not enforced.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<&'static str, Table>,
    snapshot: Option<HashMap<&'static str, Table>>,
    features: StorageFeatures,
    dialect: Dialect,
    log: Vec<Statement>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject statements carrying more than `max` bound parameters.
    pub fn with_max_query_params(mut self, max: usize) -> Self {
        self.features.max_query_params = Some(max);
        self
    }

    /// Behave like an engine that cannot report keys generated by a bulk
    /// insert.
    pub fn without_generated_keys(mut self) -> Self {
        self.features.returns_generated_keys = false;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Every statement executed so far.
    pub fn statements(&self) -> &[Statement] {
        &self.log
    }

    /// Number of logged statements of `kind` against `entity`.
    pub fn statement_count(&self, kind: StatementKind, entity: &str) -> usize {
        self.log
            .iter()
            .filter(|s| s.kind == kind && s.entity == entity)
            .count()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Number of stored rows of `entity`. Not logged.
    pub fn count(&self, entity: &EntitySchema) -> usize {
        self.tables.get(entity.name).map_or(0, |t| t.rows.len())
    }

    /// Every stored row of `entity` in key order. Not logged.
    pub fn rows(&self, entity: &'static EntitySchema) -> Vec<Row> {
        let columns = entity.columns();
        self.tables.get(entity.name).map_or_else(Vec::new, |table| {
            table
                .rows
                .values()
                .map(|row| to_row(entity, &columns, row))
                .collect()
        })
    }

    fn check_params(&self, entity: &EntitySchema, sql: &str, params: usize) -> Result<()> {
        if let Some(max) = self.features.max_query_params {
            if params > max {
                return Err(QueryError::new(
                    QueryErrorKind::TooManyParameters,
                    entity.name,
                    format!("statement carries {params} parameters, limit is {max}"),
                )
                .with_sql(sql)
                .into());
            }
        }
        Ok(())
    }

    fn record(&mut self, kind: StatementKind, entity: &'static EntitySchema, sql: String, params: usize) {
        tracing::trace!(entity = entity.name, params = params, sql = %sql, "Executing statement");
        self.log.push(Statement {
            kind,
            entity: entity.name,
            sql,
            params,
        });
    }

    fn where_clause(&self, filter: &Filter) -> (String, usize) {
        let (sql, params) = filter.to_sql(self.dialect);
        (sql, params.len())
    }

    fn quote(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }
}

fn to_row(entity: &EntitySchema, columns: &Columns, row: &StoredRow) -> Row {
    let values = entity
        .fields
        .iter()
        .map(|f| row.get(f.name).cloned().unwrap_or(Value::Null))
        .collect();
    Row::new(Arc::clone(columns), values)
}

fn constraint(entity: &EntitySchema, message: String) -> Error {
    QueryError::new(QueryErrorKind::Constraint, entity.name, message).into()
}

/// Check NOT NULL and UNIQUE for the rows in `changed` against every row of
/// `table`.
fn check_constraints(entity: &EntitySchema, table: &Table, changed: &[i64]) -> Result<()> {
    for pk in changed {
        let Some(row) = table.rows.get(pk) else {
            continue;
        };
        for field in entity.fields.iter().filter(|f| !f.primary_key) {
            let value = row.get(field.name).unwrap_or(&Value::Null);
            if value.is_null() {
                if !field.nullable {
                    return Err(constraint(
                        entity,
                        format!("NOT NULL constraint failed: {}.{}", entity.table, field.name),
                    ));
                }
                continue;
            }
            if field.unique {
                let clash = table.rows.iter().any(|(other_pk, other)| {
                    other_pk != pk && other.get(field.name).is_some_and(|v| v.sql_eq(value))
                });
                if clash {
                    return Err(constraint(
                        entity,
                        format!("UNIQUE constraint failed: {}.{}", entity.table, field.name),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_columns<'a>(entity: &EntitySchema, fields: impl IntoIterator<Item = &'a str>) -> Result<()> {
    for name in fields {
        if !entity.has_field(name) {
            return Err(QueryError::new(
                QueryErrorKind::NotFound,
                entity.name,
                format!("no such column: {}.{}", entity.table, name),
            )
            .into());
        }
    }
    Ok(())
}

impl Storage for MemoryStore {
    fn features(&self) -> StorageFeatures {
        self.features
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(TransactionError {
                kind: TransactionErrorKind::NestedNotSupported,
                message: "Already in a transaction".to_string(),
            }
            .into());
        }
        self.snapshot = Some(self.tables.clone());
        tracing::debug!("BEGIN");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.snapshot.take().is_none() {
            return Err(TransactionError {
                kind: TransactionErrorKind::NotActive,
                message: "Not in a transaction".to_string(),
            }
            .into());
        }
        tracing::debug!("COMMIT");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let Some(snapshot) = self.snapshot.take() else {
            return Err(TransactionError {
                kind: TransactionErrorKind::NotActive,
                message: "Not in a transaction".to_string(),
            }
            .into());
        };
        self.tables = snapshot;
        tracing::debug!("ROLLBACK");
        Ok(())
    }

    fn create_many(
        &mut self,
        entity: &'static EntitySchema,
        records: &[Record],
    ) -> Result<Vec<Option<i64>>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let params: usize = records.iter().map(Record::len).sum();
        let sql = format!(
            "INSERT INTO {} ... {} rows",
            self.quote(entity.table),
            records.len()
        );
        self.check_params(entity, &sql, params)?;
        for record in records {
            check_columns(entity, record.fields())?;
        }

        let mut table = self.tables.get(entity.name).cloned().unwrap_or_default();
        let mut keys = Vec::with_capacity(records.len());
        for record in records {
            table.next_id += 1;
            let pk = table.next_id;
            let mut row = StoredRow::new();
            row.insert(entity.pk_column(), Value::BigInt(pk));
            for field in entity.fields.iter().filter(|f| !f.primary_key) {
                let value = match record.get(field.name) {
                    Some(value) => value.clone(),
                    None => field.default.map_or(Value::Null, |d| d.to_value()),
                };
                row.insert(field.name, value);
            }
            table.rows.insert(pk, row);
            keys.push(pk);
        }
        check_constraints(entity, &table, &keys)?;
        self.tables.insert(entity.name, table);
        self.record(StatementKind::Insert, entity, sql, params);

        if self.features.returns_generated_keys {
            Ok(keys.into_iter().map(Some).collect())
        } else {
            Ok(vec![None; keys.len()])
        }
    }

    fn update_many(
        &mut self,
        entity: &'static EntitySchema,
        rows: &[(i64, &Record)],
        fields: &[&'static str],
    ) -> Result<u64> {
        if rows.is_empty() || fields.is_empty() {
            return Ok(0);
        }
        check_columns(entity, fields.iter().copied())?;
        let params = rows.len() * (fields.len() + 1);
        let sql = format!(
            "UPDATE {} SET {} WHERE {} IN (...{} keys)",
            self.quote(entity.table),
            fields
                .iter()
                .map(|f| format!("{} = CASE ...", self.quote(f)))
                .collect::<Vec<_>>()
                .join(", "),
            self.quote(entity.pk_column()),
            rows.len()
        );
        self.check_params(entity, &sql, params)?;

        let Some(current) = self.tables.get(entity.name) else {
            self.record(StatementKind::Update, entity, sql, params);
            return Ok(0);
        };
        let mut table = current.clone();
        let mut changed = Vec::new();
        for (pk, record) in rows {
            let Some(row) = table.rows.get_mut(pk) else {
                continue;
            };
            for field in fields {
                if let Some(value) = record.get(field) {
                    row.insert(*field, value.clone());
                }
            }
            changed.push(*pk);
        }
        check_constraints(entity, &table, &changed)?;
        self.tables.insert(entity.name, table);
        self.record(StatementKind::Update, entity, sql, params);
        Ok(changed.len() as u64)
    }

    fn select(&mut self, entity: &'static EntitySchema, filter: &Filter) -> Result<Vec<Row>> {
        let (where_sql, params) = self.where_clause(filter);
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            entity
                .fields
                .iter()
                .map(|f| self.quote(f.name))
                .collect::<Vec<_>>()
                .join(", "),
            self.quote(entity.table),
            where_sql
        );
        self.check_params(entity, &sql, params)?;

        let columns = entity.columns();
        let rows = self.tables.get(entity.name).map_or_else(Vec::new, |table| {
            table
                .rows
                .values()
                .filter(|row| filter.matches(&|column: &str| row.get(column)))
                .map(|row| to_row(entity, &columns, row))
                .collect()
        });
        self.record(StatementKind::Select, entity, sql, params);
        Ok(rows)
    }

    fn delete_where(&mut self, entity: &'static EntitySchema, filter: &Filter) -> Result<u64> {
        let (where_sql, params) = self.where_clause(filter);
        let sql = format!("DELETE FROM {} WHERE {}", self.quote(entity.table), where_sql);
        self.check_params(entity, &sql, params)?;

        let mut deleted = 0;
        if let Some(table) = self.tables.get_mut(entity.name) {
            let before = table.rows.len();
            table
                .rows
                .retain(|_, row| !filter.matches(&|column: &str| row.get(column)));
            deleted = (before - table.rows.len()) as u64;
        }
        self.record(StatementKind::Delete, entity, sql, params);
        Ok(deleted)
    }
}
