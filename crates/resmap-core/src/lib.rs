//! Core types and traits for Resmap.
//!
//! This crate provides the foundational abstractions shared by the mapping
//! layers:
//!
//! - `Value`, `Record` and `Row` for column data
//! - `EntitySchema`, `FieldInfo` and `RelationshipInfo` for static entity metadata
//! - `Resource` for validated client-facing objects
//! - `Filter` and the `Storage` collaborator trait
//! - the validation engine and error types

pub mod date;
pub mod entity;
pub mod error;
pub mod field;
pub mod filter;
pub mod record;
pub mod relationship;
pub mod resource;
pub mod row;
pub mod storage;
pub mod validate;
pub mod value;

pub use entity::{CleanHook, EntitySchema};
pub use error::{
    ConfigError, Error, FieldValidationError, NON_FIELD_ERRORS, QueryError, QueryErrorKind,
    Result, StructuralError, StructuralErrorKind, TransactionError, TransactionErrorKind,
    TypeError, ValidationError, ValidationErrorKind,
};
pub use field::{DefaultValue, FieldInfo, FieldKind};
pub use filter::Filter;
pub use record::Record;
pub use relationship::{LinkTableInfo, RelationSet, RelationshipInfo, RelationshipKind};
pub use resource::{EntityRef, Resource, clean_nested};
pub use row::{Columns, FromValue, Row};
pub use storage::{Dialect, Storage, StorageFeatures, atomic};
pub use validate::{full_clean, matches_pattern, validate_fields};
pub use value::{Value, ValueKey};
