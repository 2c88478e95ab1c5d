//! The storage collaborator.
//!
//! Everything that reads or writes rows goes through the [`Storage`] trait.
//! It is deliberately small: bulk insert, bulk update, filtered select,
//! filtered delete and a flat transaction scope.

use crate::Result;
use crate::entity::EntitySchema;
use crate::filter::Filter;
use crate::record::Record;
use crate::row::Row;
use crate::value::Value;

/// SQL dialect used when rendering statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    #[default]
    Postgres,
    /// SQLite dialect (uses ?1, ?2 placeholders)
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote an identifier for this dialect.
    ///
    /// Embedded quote characters are doubled.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                let escaped = name.replace('"', "\"\"");
                format!("\"{}\"", escaped)
            }
            Dialect::Mysql => {
                let escaped = name.replace('`', "``");
                format!("`{}`", escaped)
            }
        }
    }
}

/// Capabilities reported by a storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageFeatures {
    /// Largest number of bound parameters one statement may carry.
    pub max_query_params: Option<usize>,
    /// Whether a bulk insert reports the generated primary keys.
    pub returns_generated_keys: bool,
}

impl Default for StorageFeatures {
    fn default() -> Self {
        Self {
            max_query_params: None,
            returns_generated_keys: true,
        }
    }
}

/// A relational store reached through bulk operations.
pub trait Storage {
    /// Capabilities of this storage.
    fn features(&self) -> StorageFeatures;

    /// Dialect used to render statements.
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    /// Open a transaction. Transactions do not nest.
    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Insert `records`, returning the generated key of each in order.
    ///
    /// A storage that cannot report generated keys returns `None` entries.
    fn create_many(
        &mut self,
        entity: &'static EntitySchema,
        records: &[Record],
    ) -> Result<Vec<Option<i64>>>;

    /// Write `fields` of each `(pk, record)`. Fields a record does not carry
    /// are left untouched.
    fn update_many(
        &mut self,
        entity: &'static EntitySchema,
        rows: &[(i64, &Record)],
        fields: &[&'static str],
    ) -> Result<u64>;

    /// Rows matching `filter`, in primary key order.
    fn select(&mut self, entity: &'static EntitySchema, filter: &Filter) -> Result<Vec<Row>>;

    /// Delete rows matching `filter`, returning how many were removed.
    fn delete_where(&mut self, entity: &'static EntitySchema, filter: &Filter) -> Result<u64>;

    /// Rows whose `fields` equal any of `tuples`.
    ///
    /// Issues one statement; callers are responsible for keeping it under
    /// [`StorageFeatures::max_query_params`].
    fn filter_by_or_of_tuples(
        &mut self,
        entity: &'static EntitySchema,
        fields: &[&'static str],
        tuples: &[Vec<Value>],
    ) -> Result<Vec<Row>> {
        if tuples.is_empty() {
            return Ok(Vec::new());
        }
        self.select(entity, &Filter::any_tuple(fields, tuples))
    }
}

/// Run `f` inside a transaction.
///
/// Commits when `f` returns `Ok`, rolls back when it returns `Err`.
pub fn atomic<S, T, F>(storage: &mut S, f: F) -> Result<T>
where
    S: Storage + ?Sized,
    F: FnOnce(&mut S) -> Result<T>,
{
    storage.begin()?;
    match f(storage) {
        Ok(value) => {
            storage.commit()?;
            Ok(value)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Rolling back transaction");
            if let Err(rollback_err) = storage.rollback() {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?3");
        assert_eq!(Dialect::Mysql.placeholder(3), "?");
    }

    #[test]
    fn test_quote_identifier_escapes() {
        assert_eq!(Dialect::Postgres.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::Mysql.quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn test_default_features() {
        let features = StorageFeatures::default();
        assert!(features.returns_generated_keys);
        assert_eq!(features.max_query_params, None);
    }
}
