//! Field and column definitions.

use crate::date::now_micros;
use crate::value::Value;

/// Storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Integer primary or foreign key
    Key,
    Text,
    Integer,
    Boolean,
    /// Fixed point, carried as `Value::Decimal`
    Decimal,
    Float,
    Date,
    Timestamp,
    Json,
}

impl FieldKind {
    /// Name used in validation messages.
    pub const fn name(&self) -> &'static str {
        match self {
            FieldKind::Key => "key",
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Decimal => "decimal",
            FieldKind::Float => "float",
            FieldKind::Date => "date",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Json => "json",
        }
    }

    /// Whether a non-null value can be stored in a column of this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldKind::Key | FieldKind::Integer, Value::Int(_) | Value::BigInt(_)) => true,
            (FieldKind::Text, Value::Text(_)) => true,
            (FieldKind::Boolean, Value::Bool(_)) => true,
            (FieldKind::Decimal, Value::Decimal(s)) => s.trim().parse::<f64>().is_ok(),
            (FieldKind::Decimal, Value::Int(_) | Value::BigInt(_)) => true,
            (FieldKind::Float, Value::Double(_) | Value::Int(_) | Value::BigInt(_)) => true,
            (FieldKind::Date, Value::Date(_)) => true,
            (FieldKind::Timestamp, Value::Timestamp(_)) => true,
            (FieldKind::Json, _) => true,
            _ => false,
        }
    }
}

/// Column default applied by storage when an insert omits the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Text(&'static str),
    /// Current timestamp at insert time
    Now,
}

impl DefaultValue {
    pub fn to_value(&self) -> Value {
        match self {
            DefaultValue::Bool(b) => Value::Bool(*b),
            DefaultValue::Int(i) => Value::BigInt(*i),
            DefaultValue::Text(s) => Value::Text((*s).to_string()),
            DefaultValue::Now => Value::Timestamp(now_micros()),
        }
    }
}

/// Metadata about an entity field/column.
#[derive(Debug, Clone, Copy)]
pub struct FieldInfo {
    /// Field name, also used as the column name
    pub name: &'static str,
    /// Storage type
    pub kind: FieldKind,
    /// Whether NULL may be stored
    pub nullable: bool,
    /// Whether the empty string passes validation
    pub blank: bool,
    /// Whether this is the primary key
    pub primary_key: bool,
    /// Whether storage enforces uniqueness
    pub unique: bool,
    /// Maximum length for text fields
    pub max_length: Option<usize>,
    /// Allowed values for text fields (empty means unrestricted)
    pub choices: &'static [&'static str],
    /// Regex the text value must match
    pub pattern: Option<&'static str>,
    /// Default applied on insert
    pub default: Option<DefaultValue>,
    /// Name of the referenced entity for foreign key columns
    pub foreign_key: Option<&'static str>,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            blank: false,
            primary_key: false,
            unique: false,
            max_length: None,
            choices: &[],
            pattern: None,
            default: None,
            foreign_key: None,
        }
    }

    /// Integer primary key named `name`.
    pub const fn pk(name: &'static str) -> Self {
        Self::new(name, FieldKind::Key).primary_key(true)
    }

    /// Foreign key column referencing `entity`.
    pub const fn fk(name: &'static str, entity: &'static str) -> Self {
        let mut field = Self::new(name, FieldKind::Key);
        field.foreign_key = Some(entity);
        field
    }

    /// Set whether this field is nullable.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set whether empty strings are accepted.
    pub const fn blank(mut self, value: bool) -> Self {
        self.blank = value;
        self
    }

    /// Set whether this is a primary key.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set whether this field has a unique constraint.
    pub const fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }

    /// Set the maximum text length.
    pub const fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Restrict text values to a fixed set.
    pub const fn choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }

    /// Require text values to match a regex.
    pub const fn pattern(mut self, pattern: &'static str) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Set the insert default.
    pub const fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    /// A missing or NULL value is a validation error.
    pub const fn is_required(&self) -> bool {
        !self.nullable && self.default.is_none() && !self.primary_key
    }

    /// Whether this column references another entity.
    pub const fn is_foreign_key(&self) -> bool {
        self.foreign_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_flags() {
        const UPC: FieldInfo = FieldInfo::new("upc", FieldKind::Text)
            .nullable(true)
            .unique(true)
            .max_length(64);
        assert!(UPC.nullable);
        assert!(UPC.unique);
        assert_eq!(UPC.max_length, Some(64));
        assert!(!UPC.is_required());

        const CLASS: FieldInfo = FieldInfo::fk("product_class_id", "ProductClass");
        assert!(CLASS.is_foreign_key());
        assert!(CLASS.is_required());

        const ID: FieldInfo = FieldInfo::pk("id");
        assert!(ID.primary_key);
        assert!(!ID.is_required());
    }

    #[test]
    fn test_kind_accepts() {
        assert!(FieldKind::Decimal.accepts(&Value::Decimal("20.00".into())));
        assert!(!FieldKind::Decimal.accepts(&Value::Decimal("twenty".into())));
        assert!(FieldKind::Integer.accepts(&Value::Int(3)));
        assert!(!FieldKind::Boolean.accepts(&Value::Text("yes".into())));
        assert!(FieldKind::Text.accepts(&Value::Null));
    }
}
