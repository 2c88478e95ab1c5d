//! Reverse mapping and bulk upsert for Resmap.
//!
//! `resmap-session` is the **write path**. It turns batches of resources
//! into entity rows: reverse mappers build instances inside a
//! [`MapperContext`], and the executor saves what the context collected in
//! dependency order with a bounded number of bulk statements.
//!
//! # Role In The Architecture
//!
//! - **Reverse mapping**: [`ReverseMapper`] rules produce instances and
//!   register their relations.
//! - **Identity resolution**: [`resolve`] matches instances to stored rows
//!   by their identifying fields.
//! - **Phased save**: [`save_context`] writes foreign key targets, primaries,
//!   children, many-to-many links and an optional [`DomainPhase`].
//! - **Orchestration**: [`upsert`] validates, chunks and wraps every chunk
//!   in a transaction.
//!
//! # Example
//!
//! ```ignore
//! let config = UpsertConfig::new()
//!     .identifier_mapping(IdentifierMapping::new().with("Product", ["upc"]))
//!     .fields_to_update(FieldsToUpdate::new(["Product.title"]));
//!
//! let outcome = upsert(&mut storage, &ProductMapper, &resources, &config, None)?;
//! for error in &outcome.errors {
//!     eprintln!("{error}");
//! }
//! ```

pub mod config;
pub mod context;
pub mod errors;
pub mod executor;
pub mod instance;
pub mod mapper;
pub mod multimap;
pub mod orchestrator;
pub mod relations;
pub mod resolve;

#[cfg(test)]
mod fixtures;

pub use config::{DEFAULT_CHUNK_SIZE, FieldsToUpdate, IdentifierMapping, UpsertConfig};
pub use context::MapperContext;
pub use errors::{ErrorLog, RecordError};
pub use executor::{DomainPhase, SaveSummary, save_context};
pub use instance::{Instance, InstanceId, InstanceState, Instances};
pub use mapper::{AssignFn, ConvertFn, MappingRule, ReverseMapper, RuleAction, map_resource};
pub use multimap::{Link, MultiMap, OwnedItems, RelationKey};
pub use orchestrator::{UpsertOutcome, upsert, validate_resources};
pub use relations::{Extracted, Mapped, extract};
pub use resolve::{Resolution, resolve};
