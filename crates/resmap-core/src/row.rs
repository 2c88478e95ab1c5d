//! Rows read back from storage.
//!
//! Every row of a select shares the column list of the entity it was read
//! from, so a row is a value vector plus a reference-counted slice of the
//! schema's column names.

use std::sync::Arc;

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;

/// Column names of a result set, shared by all of its rows.
pub type Columns = Arc<[&'static str]>;

/// A single row read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Columns,
    values: Vec<Value>,
}

impl Row {
    /// `values` must line up with `columns`; missing trailing values read
    /// as absent.
    pub fn new(columns: Columns, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|column| *column == name)?;
        self.values.get(index)
    }

    /// The value of `name` converted to `T`. Conversion errors name the
    /// column.
    #[allow(clippy::result_large_err)]
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let Some(value) = self.get_by_name(name) else {
            return Err(Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: "no such column".to_string(),
                column: Some(name.to_string()),
            }));
        };
        T::from_value(value).map_err(|err| match err {
            Error::Type(found) => Error::Type(TypeError {
                column: Some(name.to_string()),
                ..found
            }),
            other => other,
        })
    }

    /// The integer primary key stored under `column`.
    #[allow(clippy::result_large_err)]
    pub fn pk(&self, column: &str) -> Result<i64> {
        self.get_by_name(column)
            .unwrap_or(&Value::Null)
            .to_pk(column)
    }

    /// This row with `extra` columns appended, for loaders that decorate
    /// related rows with values joined from another entity.
    pub fn with_extra(&self, extra: &[(&'static str, Value)]) -> Self {
        let columns: Columns = self
            .columns
            .iter()
            .copied()
            .chain(extra.iter().map(|(name, _)| *name))
            .collect();
        let mut values = self.values.clone();
        values.extend(extra.iter().map(|(_, value)| value.clone()));
        Self { columns, values }
    }
}

/// Trait for converting from a `Value` to a typed value.
pub trait FromValue: Sized {
    /// Convert from a Value, returning an error if the conversion fails.
    #[allow(clippy::result_large_err)]
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &'static str, value: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: value.type_name().to_string(),
        column: None,
    })
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) | Value::Decimal(s) => Ok(s.clone()),
            _ => Err(mismatch("String", value)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_row() -> Row {
        Row::new(
            Arc::from(["id", "upc", "parent_id"]),
            vec![Value::BigInt(4), Value::Text("A".into()), Value::Null],
        )
    }

    #[test]
    fn test_named_access() {
        let row = product_row();
        assert_eq!(row.get_named::<String>("upc").unwrap(), "A");
        assert_eq!(row.get_named::<Option<i64>>("parent_id").unwrap(), None);
        assert_eq!(row.pk("id").unwrap(), 4);
    }

    #[test]
    fn test_type_errors_name_the_column() {
        let row = product_row();
        let err = row.get_named::<i64>("upc").unwrap_err();
        assert!(err.to_string().contains("'upc'"));
        assert!(row.get_named::<i64>("missing").is_err());
        assert!(row.pk("parent_id").is_err());
    }

    #[test]
    fn test_extra_columns_are_appended() {
        let row = product_row().with_extra(&[("code", Value::from("henk"))]);
        assert_eq!(row.get_named::<String>("code").unwrap(), "henk");
        assert_eq!(row.pk("id").unwrap(), 4);
        assert!(product_row().get_by_name("code").is_none());
    }
}
