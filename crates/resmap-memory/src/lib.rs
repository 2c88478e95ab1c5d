//! In-memory transactional storage for Resmap.
//!
//! `MemoryStore` implements the `Storage` collaborator without an external
//! database. It is used by the test suites and by embedders that want to run
//! the mapping layers against a throwaway store.
//!
//! # Example
//!
//! ```ignore
//! use resmap_memory::MemoryStore;
//!
//! let mut store = MemoryStore::new().with_max_query_params(999);
//! let outcome = upsert(&mut store, &mapper, &resources, &config, None)?;
//! ```

pub mod store;

pub use store::{MemoryStore, Statement, StatementKind};

#[cfg(test)]
mod tests {
    use super::*;
    use resmap_core::error::{QueryErrorKind, TransactionErrorKind};
    use resmap_core::{
        DefaultValue, EntitySchema, Error, FieldInfo, FieldKind, Filter, Record, RelationshipInfo,
        Storage, Value, atomic,
    };

    static PARTNER_FIELDS: [FieldInfo; 4] = [
        FieldInfo::pk("id"),
        FieldInfo::new("code", FieldKind::Text).unique(true).nullable(true),
        FieldInfo::new("name", FieldKind::Text),
        FieldInfo::new("active", FieldKind::Boolean).default(DefaultValue::Bool(true)),
    ];
    static PARTNER_RELATIONS: [RelationshipInfo; 0] = [];
    static PARTNER: EntitySchema =
        EntitySchema::new("Partner", "partner", &PARTNER_FIELDS, &PARTNER_RELATIONS, None);

    fn partner(code: &str, name: &str) -> Record {
        let mut record = Record::new();
        record.set("code", code);
        record.set("name", name);
        record
    }

    #[test]
    fn test_create_applies_defaults_and_returns_keys() {
        let mut store = MemoryStore::new();
        let keys = store
            .create_many(&PARTNER, &[partner("a", "A"), partner("b", "B")])
            .unwrap();
        assert_eq!(keys, vec![Some(1), Some(2)]);

        let rows = store.select(&PARTNER, &Filter::eq("code", "b")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pk("id").unwrap(), 2);
        assert!(rows[0].get_named::<bool>("active").unwrap());
    }

    #[test]
    fn test_constraints() {
        let mut store = MemoryStore::new();
        store.create_many(&PARTNER, &[partner("a", "A")]).unwrap();

        let err = store.create_many(&PARTNER, &[partner("a", "again")]).unwrap_err();
        assert!(matches!(err, Error::Query(ref q) if q.is_constraint_violation()));

        let mut nameless = Record::new();
        nameless.set("code", "c");
        let err = store.create_many(&PARTNER, &[nameless]).unwrap_err();
        assert!(err.to_string().contains("NOT NULL"));

        // failed statements leave no rows behind
        assert_eq!(store.count(&PARTNER), 1);
    }

    #[test]
    fn test_update_writes_only_listed_fields() {
        let mut store = MemoryStore::new();
        store.create_many(&PARTNER, &[partner("a", "A")]).unwrap();

        let changes = partner("z", "Renamed");
        store.update_many(&PARTNER, &[(1, &changes)], &["name"]).unwrap();
        let row = &store.rows(&PARTNER)[0];
        assert_eq!(row.get_named::<String>("name").unwrap(), "Renamed");
        assert_eq!(row.get_named::<String>("code").unwrap(), "a");
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let mut store = MemoryStore::new();
        store.create_many(&PARTNER, &[partner("a", "A")]).unwrap();

        let result: resmap_core::Result<()> = atomic(&mut store, |s| {
            s.create_many(&PARTNER, &[partner("b", "B")])?;
            s.delete_where(&PARTNER, &Filter::eq("code", "a"))?;
            Err(Error::Custom("abort".into()))
        });
        assert!(result.is_err());
        assert!(!store.in_transaction());
        let rows = store.rows(&PARTNER);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<String>("code").unwrap(), "a");
    }

    #[test]
    fn test_transactions_do_not_nest() {
        let mut store = MemoryStore::new();
        store.begin().unwrap();
        let err = store.begin().unwrap_err();
        assert!(matches!(
            err,
            Error::Transaction(ref t) if t.kind == TransactionErrorKind::NestedNotSupported
        ));
        store.commit().unwrap();
        assert!(store.commit().is_err());
    }

    #[test]
    fn test_oversized_statements_are_rejected() {
        let mut store = MemoryStore::new().with_max_query_params(3);
        let filter = Filter::in_list("code", vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        let err = store.select(&PARTNER, &filter).unwrap_err();
        assert!(matches!(err, Error::Query(ref q) if q.kind == QueryErrorKind::TooManyParameters));
        assert!(store.statements().is_empty());
    }

    #[test]
    fn test_without_generated_keys() {
        let mut store = MemoryStore::new().without_generated_keys();
        let keys = store.create_many(&PARTNER, &[partner("a", "A")]).unwrap();
        assert_eq!(keys, vec![None]);
        assert_eq!(store.count(&PARTNER), 1);
    }

    #[test]
    fn test_statement_log() {
        let mut store = MemoryStore::new();
        store.create_many(&PARTNER, &[partner("a", "A")]).unwrap();
        store.select(&PARTNER, &Filter::All).unwrap();
        store
            .delete_where(&PARTNER, &Filter::eq("code", Value::from("a")))
            .unwrap();
        assert_eq!(store.statement_count(StatementKind::Select, "Partner"), 1);
        assert_eq!(store.statement_count(StatementKind::Delete, "Partner"), 1);
        assert!(store.statements()[2].sql.starts_with("DELETE FROM \"partner\""));
        store.clear_log();
        assert!(store.statements().is_empty());
    }
}
