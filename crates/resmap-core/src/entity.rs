//! Entity schemas.
//!
//! An [`EntitySchema`] is the static description of one stored entity type:
//! its fields, its relations and an optional cross-field clean hook. Schemas
//! are declared as `static` items so relations can point at each other,
//! including at themselves.

use std::fmt;
use std::sync::OnceLock;

use crate::error::ValidationError;
use crate::field::FieldInfo;
use crate::record::Record;
use crate::relationship::{RelationSet, RelationshipInfo};
use crate::row::{Columns, Row};

/// Cross-field validation run after the per-field checks of a full clean.
pub type CleanHook = fn(&Record) -> std::result::Result<(), ValidationError>;

/// Static description of a stored entity type.
pub struct EntitySchema {
    /// Entity name, used in configuration (`"Product"`)
    pub name: &'static str,
    /// Table name
    pub table: &'static str,
    pub fields: &'static [FieldInfo],
    pub relations: &'static [RelationshipInfo],
    pub clean: Option<CleanHook>,
    relation_set: OnceLock<RelationSet>,
}

impl EntitySchema {
    pub const fn new(
        name: &'static str,
        table: &'static str,
        fields: &'static [FieldInfo],
        relations: &'static [RelationshipInfo],
        clean: Option<CleanHook>,
    ) -> Self {
        Self {
            name,
            table,
            fields,
            relations,
            clean,
            relation_set: OnceLock::new(),
        }
    }

    /// The relations of this entity grouped by kind, discovered on first use.
    pub fn relation_set(&'static self) -> &'static RelationSet {
        self.relation_set
            .get_or_init(|| RelationSet::discover(self))
    }

    /// Get field metadata by name.
    pub fn field(&self, name: &str) -> Option<&'static FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// The primary key column.
    pub fn pk_column(&self) -> &'static str {
        self.fields
            .iter()
            .find(|f| f.primary_key)
            .map_or("id", |f| f.name)
    }

    /// Column names in declaration order, shared by every row read back.
    pub fn columns(&self) -> Columns {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Copy the declared columns of a stored row into a record.
    pub fn record_from_row(&self, row: &Row) -> Record {
        self.fields
            .iter()
            .filter(|f| !f.primary_key)
            .filter_map(|f| row.get_by_name(f.name).map(|v| (f.name, v.clone())))
            .collect()
    }

    /// Whether this is the same entity type as `other`.
    pub fn is(&self, other: &EntitySchema) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for EntitySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("name", &self.name)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl PartialEq for EntitySchema {
    fn eq(&self, other: &Self) -> bool {
        self.is(other)
    }
}

impl Eq for EntitySchema {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldKind;
    use crate::relationship::RelationshipKind;
    use crate::value::Value;

    static NODE_FIELDS: [FieldInfo; 3] = [
        FieldInfo::pk("id"),
        FieldInfo::new("code", FieldKind::Text).unique(true),
        FieldInfo::fk("parent_id", "Node").nullable(true),
    ];
    static NODE_RELATIONS: [RelationshipInfo; 2] = [
        RelationshipInfo::many_to_one("parent", &NODE, "parent_id"),
        RelationshipInfo::one_to_many("children", &NODE, "parent_id"),
    ];
    static NODE: EntitySchema =
        EntitySchema::new("Node", "node", &NODE_FIELDS, &NODE_RELATIONS, None);

    #[test]
    fn test_self_referencing_schema() {
        let set = NODE.relation_set();
        assert_eq!(set.foreign_keys.len(), 1);
        assert_eq!(set.one_to_many.len(), 1);
        let parent = set.by_column("parent_id").unwrap();
        assert_eq!(parent.kind, RelationshipKind::ManyToOne);
        assert!(parent.related.is(&NODE));
        assert!(std::ptr::eq(set, NODE.relation_set()));
    }

    #[test]
    fn test_record_from_row_skips_pk() {
        let row = Row::new(
            NODE.columns(),
            vec![Value::BigInt(1), Value::from("root"), Value::Null],
        );
        let record = NODE.record_from_row(&row);
        assert_eq!(record.len(), 2);
        assert_eq!(record.value("code"), &Value::from("root"));
        assert_eq!(NODE.pk_column(), "id");
    }
}
