//! Row predicates.
//!
//! A [`Filter`] is evaluated directly by in-process storages through
//! [`Filter::matches`] and rendered to a parameterized `WHERE` clause by
//! SQL storages through [`Filter::to_sql`].

use crate::storage::Dialect;
use crate::value::Value;

/// A predicate over the columns of one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every row
    All,
    /// `column = value`
    Eq(&'static str, Value),
    /// `column IN (values)`
    In(&'static str, Vec<Value>),
    /// `column IS NULL`
    IsNull(&'static str),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Eq(column, value.into())
    }

    pub fn in_list(column: &'static str, values: Vec<Value>) -> Self {
        Filter::In(column, values)
    }

    /// `column IN (keys)` for integer keys.
    pub fn in_keys(column: &'static str, keys: &[i64]) -> Self {
        Filter::In(column, keys.iter().map(|k| Value::BigInt(*k)).collect())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::All => other,
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            this => Filter::And(vec![this, other]),
        }
    }

    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// OR of one AND-of-equalities per tuple.
    ///
    /// `(f1 = t1[0] AND f2 = t1[1]) OR (f1 = t2[0] AND f2 = t2[1]) ...`.
    /// Single-field lookups collapse to an `IN` list.
    pub fn any_tuple(fields: &[&'static str], tuples: &[Vec<Value>]) -> Self {
        if let [field] = fields {
            return Filter::In(*field, tuples.iter().filter_map(|t| t.first().cloned()).collect());
        }
        Filter::Or(
            tuples
                .iter()
                .map(|tuple| {
                    Filter::And(
                        fields
                            .iter()
                            .zip(tuple)
                            .map(|(field, value)| Filter::Eq(*field, value.clone()))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    /// Number of bound parameters the rendered statement carries.
    pub fn param_count(&self) -> usize {
        match self {
            Filter::All | Filter::IsNull(_) => 0,
            Filter::Eq(..) => 1,
            Filter::In(_, values) => values.len(),
            Filter::And(parts) | Filter::Or(parts) => parts.iter().map(Filter::param_count).sum(),
            Filter::Not(inner) => inner.param_count(),
        }
    }

    /// Evaluate against a row, with SQL NULL semantics for comparisons.
    pub fn matches<'a, F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<&'a Value>,
    {
        match self {
            Filter::All => true,
            Filter::Eq(column, value) => lookup(column).is_some_and(|v| v.sql_eq(value)),
            Filter::In(column, values) => {
                lookup(column).is_some_and(|v| values.iter().any(|candidate| v.sql_eq(candidate)))
            }
            Filter::IsNull(column) => lookup(column).is_none_or(Value::is_null),
            Filter::And(parts) => parts.iter().all(|p| p.matches(lookup)),
            Filter::Or(parts) => parts.iter().any(|p| p.matches(lookup)),
            Filter::Not(inner) => !inner.matches(lookup),
        }
    }

    /// Render as a `WHERE` clause body with bound parameters.
    pub fn to_sql(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.build(dialect, &mut params);
        (sql, params)
    }

    fn build(&self, dialect: Dialect, params: &mut Vec<Value>) -> String {
        match self {
            Filter::All => "1 = 1".to_string(),
            Filter::Eq(column, value) => {
                params.push(value.clone());
                format!(
                    "{} = {}",
                    dialect.quote_identifier(column),
                    dialect.placeholder(params.len())
                )
            }
            Filter::In(_, values) if values.is_empty() => "1 = 0".to_string(),
            Filter::In(column, values) => {
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|value| {
                        params.push(value.clone());
                        dialect.placeholder(params.len())
                    })
                    .collect();
                format!(
                    "{} IN ({})",
                    dialect.quote_identifier(column),
                    placeholders.join(", ")
                )
            }
            Filter::IsNull(column) => format!("{} IS NULL", dialect.quote_identifier(column)),
            Filter::And(parts) if parts.is_empty() => "1 = 1".to_string(),
            Filter::Or(parts) if parts.is_empty() => "1 = 0".to_string(),
            Filter::And(parts) => join(parts, " AND ", dialect, params),
            Filter::Or(parts) => join(parts, " OR ", dialect, params),
            Filter::Not(inner) => format!("NOT ({})", inner.build(dialect, params)),
        }
    }
}

fn join(parts: &[Filter], sep: &str, dialect: Dialect, params: &mut Vec<Value>) -> String {
    if let [only] = parts {
        return only.build(dialect, params);
    }
    parts
        .iter()
        .map(|p| format!("({})", p.build(dialect, params)))
        .collect::<Vec<_>>()
        .join(sep)
}
