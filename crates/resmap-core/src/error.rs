//! Error types for Resmap operations.

use std::collections::BTreeMap;
use std::fmt;

/// Field name under which cross-field (model level) errors are recorded.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// The primary error type for all Resmap operations.
#[derive(Debug)]
pub enum Error {
    /// Storage statement errors
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Transaction errors
    Transaction(TransactionError),
    /// Fatal structural errors that abort the current chunk
    Structural(StructuralError),
    /// Validation errors
    Validation(ValidationError),
    /// Configuration errors
    Config(ConfigError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub entity: Option<String>,
    pub sql: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Constraint violation (unique, not null)
    Constraint,
    /// Entity or column not found
    NotFound,
    /// Statement carries more bound parameters than the storage accepts
    TooManyParameters,
    /// Other storage error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// A transaction is already open on this storage
    NestedNotSupported,
    /// Commit or rollback without an open transaction
    NotActive,
}

/// A non-recoverable condition raised while saving a chunk.
#[derive(Debug)]
pub struct StructuralError {
    pub kind: StructuralErrorKind,
    /// Entity type the failing operation was acting on.
    pub entity: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralErrorKind {
    /// A related instance of the type being saved would have to be created
    /// as a side effect of saving its dependents.
    SelfReferentialCreate,
    /// A required link does not resolve to an existing row.
    MissingParent,
    /// The storage did not report generated primary keys for a bulk insert.
    MissingGeneratedKeys,
    /// A through row references a target without a primary key.
    UnlinkedThroughRow,
}

impl StructuralErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StructuralErrorKind::SelfReferentialCreate => "self-referential create",
            StructuralErrorKind::MissingParent => "missing parent",
            StructuralErrorKind::MissingGeneratedKeys => "missing generated keys",
            StructuralErrorKind::UnlinkedThroughRow => "unlinked through row",
        }
    }
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

/// Validation error for field-level and model-level validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// The errors in the order they were found
    pub errors: Vec<FieldValidationError>,
}

/// A single validation error for a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValidationError {
    /// The field name that failed validation, or `__all__`
    pub field: String,
    /// The kind of validation that failed
    pub kind: ValidationErrorKind,
    /// Human-readable error message
    pub message: String,
}

/// The type of validation constraint that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Required field is missing/null
    Required,
    /// String field is empty but blanks are not allowed
    Blank,
    /// String is longer than maximum length
    MaxLength,
    /// Value is not one of the declared choices
    Choice,
    /// Value doesn't match regex pattern
    Pattern,
    /// Value has the wrong type for the column
    Type,
    /// A linked instance was never saved
    Related,
    /// Custom validation failed
    Custom,
    /// Model-level validation failed
    Model,
}

impl ValidationError {
    /// Create a new empty validation error container.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Check if there are any validation errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add a field validation error.
    pub fn add(
        &mut self,
        field: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(FieldValidationError {
            field: field.into(),
            kind,
            message: message.into(),
        });
    }

    /// Add a required field error.
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(
            field,
            ValidationErrorKind::Required,
            "This field is required.".to_string(),
        );
    }

    /// Add a blank string error.
    pub fn add_blank(&mut self, field: impl Into<String>) {
        self.add(
            field,
            ValidationErrorKind::Blank,
            "This field cannot be blank.".to_string(),
        );
    }

    /// Add a max length error.
    pub fn add_max_length(&mut self, field: impl Into<String>, max: usize, actual: usize) {
        self.add(
            field,
            ValidationErrorKind::MaxLength,
            format!("must be at most {max} characters, got {actual}"),
        );
    }

    /// Add an invalid choice error.
    pub fn add_choice(&mut self, field: impl Into<String>, value: &str, choices: &[&str]) {
        self.add(
            field,
            ValidationErrorKind::Choice,
            format!("'{value}' is not a valid choice, expected one of: {}", choices.join(", ")),
        );
    }

    /// Add a pattern match error.
    pub fn add_pattern(&mut self, field: impl Into<String>, pattern: &str) {
        self.add(
            field,
            ValidationErrorKind::Pattern,
            format!("must match pattern '{pattern}'"),
        );
    }

    /// Add a column type mismatch error.
    pub fn add_type(&mut self, field: impl Into<String>, expected: &str, actual: &str) {
        self.add(
            field,
            ValidationErrorKind::Type,
            format!("expected {expected}, got {actual}"),
        );
    }

    /// Add an error for a link to an instance that was never saved.
    pub fn add_unsaved_related(&mut self, field: impl Into<String>, related: &str) {
        self.add(
            field,
            ValidationErrorKind::Related,
            format!("related {related} was not saved"),
        );
    }

    /// Add a custom validation error.
    pub fn add_custom(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.add(field, ValidationErrorKind::Custom, message);
    }

    /// Add a model-level validation error.
    ///
    /// The error is recorded under [`NON_FIELD_ERRORS`].
    pub fn add_model_error(&mut self, message: impl Into<String>) {
        self.add(NON_FIELD_ERRORS, ValidationErrorKind::Model, message);
    }

    /// Append every error of `other`.
    pub fn merge(&mut self, other: ValidationError) {
        self.errors.extend(other.errors);
    }

    /// Check whether a field has at least one error.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Group messages by field, `{field: [messages]}`.
    pub fn message_dict(&self) -> BTreeMap<String, Vec<String>> {
        let mut dict: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for err in &self.errors {
            dict.entry(err.field.clone())
                .or_default()
                .push(err.message.clone());
        }
        dict
    }

    /// Convert to Result, returning Ok(()) if no errors, Err(self) otherwise.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new()
    }
}

impl Error {
    /// Structural errors abort the chunk that raised them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Structural(_))
    }

    /// The structural kind, if this is a structural error.
    pub fn structural_kind(&self) -> Option<StructuralErrorKind> {
        match self {
            Error::Structural(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Get the rendered statement that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    pub fn structural(
        kind: StructuralErrorKind,
        entity: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Error::Structural(StructuralError {
            kind,
            entity,
            message: message.into(),
        })
    }
}

impl StructuralError {
    pub fn new(kind: StructuralErrorKind, entity: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity,
            message: message.into(),
        }
    }
}

impl QueryError {
    pub fn new(kind: QueryErrorKind, entity: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity: Some(entity.to_string()),
            sql: None,
            message: message.into(),
        }
    }

    /// Attach the rendered statement.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Is this a unique or not-null constraint violation?
    pub fn is_constraint_violation(&self) -> bool {
        self.kind == QueryErrorKind::Constraint
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Query(e) => write!(f, "Query error: {}", e),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Structural(e) => write!(f, "Structural error: {}", e),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity {
            Some(entity) => write!(f, "{} ({})", self.message, entity),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.as_str(), self.entity, self.message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "validation passed")
        } else if self.errors.len() == 1 {
            let err = &self.errors[0];
            write!(f, "validation error on '{}': {}", err.field, err.message)
        } else {
            writeln!(f, "validation errors:")?;
            for err in &self.errors {
                writeln!(f, "  - {}: {}", err.field, err.message)?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<StructuralError> for Error {
    fn from(err: StructuralError) -> Self {
        Error::Structural(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for Resmap operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_dict_groups_by_field() {
        let mut err = ValidationError::new();
        err.add_model_error("upc, currency and partner are required");
        err.add_required("currency");
        err.add_custom("currency", "Currency can not be empty.");

        let dict = err.message_dict();
        assert_eq!(dict[NON_FIELD_ERRORS].len(), 1);
        assert_eq!(dict["currency"].len(), 2);
        assert!(err.has_field("currency"));
        assert!(!err.has_field("partner"));
    }

    #[test]
    fn structural_errors_are_fatal() {
        let err = Error::structural(
            StructuralErrorKind::MissingParent,
            "Product",
            "parent with upc 'x' does not exist",
        );
        assert!(err.is_fatal());
        assert_eq!(err.structural_kind(), Some(StructuralErrorKind::MissingParent));
        assert!(err.to_string().contains("missing parent"));

        let query = Error::Query(
            QueryError::new(QueryErrorKind::Constraint, "Product", "duplicate upc")
                .with_sql("INSERT INTO \"product\""),
        );
        assert!(!query.is_fatal());
        assert_eq!(query.sql(), Some("INSERT INTO \"product\""));
    }

    #[test]
    fn into_result_passes_when_empty() {
        assert!(ValidationError::new().into_result().is_ok());
        let mut err = ValidationError::new();
        err.add_blank("title");
        assert_eq!(err.into_result().unwrap_err().errors.len(), 1);
    }
}
