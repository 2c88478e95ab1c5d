//! Identifying tuples.

use std::fmt;

use resmap_core::{Record, Row, Value, ValueKey};

/// The hashable values of an entity's identifying fields, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(Vec<ValueKey>);

impl IdentityKey {
    pub fn from_values(values: &[Value]) -> Self {
        Self(values.iter().map(Value::key).collect())
    }

    /// Key of a record; unassigned fields count as NULL.
    pub fn from_record(record: &Record, fields: &[&str]) -> Self {
        Self(fields.iter().map(|f| record.value(f).key()).collect())
    }

    /// Key of a stored row; missing columns count as NULL.
    pub fn from_row(row: &Row, fields: &[&str]) -> Self {
        Self(
            fields
                .iter()
                .map(|f| row.get_by_name(f).map_or(ValueKey::Null, Value::key))
                .collect(),
        )
    }

    /// A NULL component never equals a stored value.
    pub fn has_null(&self) -> bool {
        self.0.iter().any(ValueKey::is_null)
    }

    pub fn parts(&self) -> &[ValueKey] {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", part)?;
        }
        write!(f, ")")
    }
}

/// The raw values of `fields` on `record`, NULL for unassigned fields.
pub fn record_tuple(record: &Record, fields: &[&str]) -> Vec<Value> {
    fields.iter().map(|f| record.value(f).clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_row_keys_agree() {
        let mut record = Record::new();
        record.set("partner_id", Value::Int(3));
        record.set("partner_sku", "A");
        let row = Row::new(
            std::sync::Arc::from(["id", "partner_id", "partner_sku"]),
            vec![Value::BigInt(9), Value::BigInt(3), Value::from("A")],
        );
        let fields = ["partner_id", "partner_sku"];
        assert_eq!(
            IdentityKey::from_record(&record, &fields),
            IdentityKey::from_row(&row, &fields)
        );
    }

    #[test]
    fn test_unassigned_fields_are_null() {
        let record = Record::new();
        let key = IdentityKey::from_record(&record, &["upc"]);
        assert!(key.has_null());
        assert_eq!(record_tuple(&record, &["upc"]), vec![Value::Null]);
    }
}
