//! E-commerce catalogue for Resmap.
//!
//! Entity schemas for products and everything that hangs off them, the
//! resources they are exchanged as, and both mapping directions:
//!
//! - [`products_to_db`] saves product resources with [`ProductMapper`] and
//!   the [`ProductAttributePhase`].
//! - [`products_to_resources`] reads stored products back, loading the
//!   relations registered in a [`PrefetchRegistry`] in bulk.
//!
//! # Example
//!
//! ```ignore
//! let config = default_upsert_config().delete_related(true);
//! let outcome = products_to_db(&mut storage, &products, &config)?;
//! assert!(outcome.is_clean());
//!
//! let registry = PrefetchRegistry::with_defaults();
//! let read = products_to_resources(&mut storage, &registry, &Filter::All, false)?;
//! ```

pub mod attributes;
pub mod constants;
pub mod forward;
pub mod mappers;
pub mod prefetch;
pub mod resources;
pub mod schema;

pub use attributes::{ATTRIBUTE_BATCH_SIZE, ProductAttributePhase};
pub use constants::{
    ALL_CATEGORY_FIELDS, ALL_PRODUCT_FIELDS, ALL_PRODUCTCLASS_FIELDS, ALL_PRODUCTIMAGE_FIELDS,
    ALL_STOCKRECORD_FIELDS, DEFAULT_CURRENCY, PARTNER_IDENTIFIER, all_catalogue_fields,
    model_identifiers_mapping,
};
pub use forward::products_to_resources;
pub use mappers::{
    CategoryMapper, ImageMapper, PartnerMapper, ProductClassMapper, ProductMapper,
    StockRecordMapper,
};
pub use prefetch::{Prefetch, PrefetchFn, PrefetchRegistry, Prefetched};
pub use resources::{
    CategoryResource, ImageResource, PartnerResource, ProductClassResource, ProductRefResource,
    ProductResource, StockRecordResource,
};

use resmap_core::{Result, Storage};
use resmap_session::{UpsertConfig, UpsertOutcome, upsert};

/// Upsert configuration with the catalogue allow-list and identifiers.
pub fn default_upsert_config() -> UpsertConfig {
    UpsertConfig::new()
        .fields_to_update(all_catalogue_fields())
        .identifier_mapping(model_identifiers_mapping())
}

/// Save `products` and everything nested in them.
#[tracing::instrument(level = "debug", skip_all, fields(products = products.len()))]
pub fn products_to_db(
    storage: &mut dyn Storage,
    products: &[ProductResource],
    config: &UpsertConfig,
) -> Result<UpsertOutcome> {
    upsert(storage, &ProductMapper, products, config, Some(&ProductAttributePhase))
}
