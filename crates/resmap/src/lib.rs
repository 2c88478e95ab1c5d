//! Resmap - bulk mapping between nested resources and relational rows.
//!
//! Resmap takes batches of resource trees (a product with its images,
//! stock records, categories and attributes) and reconciles them against
//! storage with a bounded number of bulk statements:
//!
//! - rows are matched to stored ones by business identifiers, not keys
//! - foreign key targets are saved before their owners, owners before
//!   their children and many-to-many links
//! - one invalid record is reported without aborting the batch
//! - an allow-list decides which fields an update may touch
//!
//! The read direction loads stored products back into resources with
//! prefetched relations.
//!
//! # Quick Start
//!
//! ```ignore
//! use resmap::prelude::*;
//!
//! let mut store = MemoryStore::new();
//! let product = ProductResource {
//!     price: Some("20".into()),
//!     partner: Some(PartnerResource::new("klaas")),
//!     images: Some(vec![ImageResource::new("front", "front.jpg")]),
//!     ..ProductResource::new("A", "Shirt")
//! };
//!
//! let outcome = products_to_db(&mut store, &[product], &default_upsert_config())?;
//! assert!(outcome.is_clean());
//!
//! let read = products_to_resources(
//!     &mut store,
//!     &PrefetchRegistry::with_defaults(),
//!     &Filter::eq("upc", "A"),
//!     false,
//! )?;
//! ```
//!
//! # Crates
//!
//! - `resmap-core`: values, records, schemas, validation, `Storage`
//! - `resmap-query`: identity keys and parameter-bounded bulk statements
//! - `resmap-session`: reverse mappers, identity resolution, phased save
//! - `resmap-memory`: in-memory transactional storage
//! - `resmap-catalogue`: the product catalogue on top of all of the above

pub use resmap_core::{
    EntityRef, EntitySchema, Error, FieldInfo, FieldKind, Filter, Record, RelationshipInfo,
    RelationshipKind, Resource, Result, Row, Storage, StorageFeatures, StructuralError,
    StructuralErrorKind, ValidationError, Value, atomic,
};
pub use resmap_memory::{MemoryStore, Statement, StatementKind};
pub use resmap_query::{DEFAULT_BATCH_SIZE, IdentityKey, in_bulk};
pub use resmap_session::{
    DomainPhase, FieldsToUpdate, IdentifierMapping, MapperContext, Mapped, MappingRule,
    RecordError, ReverseMapper, SaveSummary, UpsertConfig, UpsertOutcome, upsert,
};

pub use resmap_catalogue as catalogue;
pub use resmap_memory as memory;
pub use resmap_query as query;
pub use resmap_session as session;

pub use resmap_catalogue::{
    CategoryResource, ImageResource, PartnerResource, PrefetchRegistry, ProductAttributePhase,
    ProductClassResource, ProductMapper, ProductRefResource, ProductResource,
    StockRecordResource, default_upsert_config, products_to_db, products_to_resources,
};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use resmap::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Catalogue
        CategoryResource,
        // Storage and values
        EntityRef,
        Error,
        FieldsToUpdate,
        Filter,
        IdentifierMapping,
        ImageResource,
        MemoryStore,
        PartnerResource,
        PrefetchRegistry,
        ProductClassResource,
        ProductRefResource,
        ProductResource,
        // Write path
        RecordError,
        Resource,
        Result,
        ReverseMapper,
        Storage,
        StockRecordResource,
        UpsertConfig,
        UpsertOutcome,
        ValidationError,
        Value,
        default_upsert_config,
        products_to_db,
        products_to_resources,
        upsert,
    };
}
