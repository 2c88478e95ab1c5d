//! Forward read path: stored products to [`ProductResource`]s.
//!
//! Relations registered in the [`PrefetchRegistry`] are loaded for the
//! whole batch of products before any resource is built. Everything else
//! is loaded per product as it is mapped.

use std::collections::{BTreeMap, HashMap};
use std::slice;

use resmap_core::date::format_date;
use resmap_core::{EntityRef, Filter, Result, Row, Storage, Value};
use resmap_query::{DEFAULT_BATCH_SIZE, select_in_batches};

use crate::mappers::ATTRIBUTES;
use crate::prefetch::{
    PrefetchRegistry, Prefetched, RelatedRows, load_relation, prefetch_attribute_values,
};
use crate::resources::{
    CategoryResource, ImageResource, PartnerResource, ProductClassResource, ProductRefResource,
    ProductResource, StockRecordResource,
};
use crate::schema::{PRODUCT, STOCK_RECORD};

fn text(row: &Row, column: &str) -> Option<String> {
    row.get_by_name(column)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn int(row: &Row, column: &str) -> Option<i64> {
    row.get_by_name(column).and_then(Value::as_i64)
}

fn boolean(row: &Row, column: &str) -> Option<bool> {
    row.get_by_name(column).and_then(Value::as_bool)
}

fn timestamp(row: &Row, column: &str) -> Option<i64> {
    match row.get_by_name(column) {
        Some(Value::Timestamp(ts)) => Some(*ts),
        _ => None,
    }
}

/// The JSON form of a stored attribute value.
fn attribute_json(row: &Row) -> serde_json::Value {
    use serde_json::Value as Json;

    let attribute_type = text(row, "type").unwrap_or_default();
    let column = crate::attributes::value_column(&attribute_type).unwrap_or("value_text");
    match row.get_by_name(column) {
        None | Some(Value::Null) => Json::Null,
        Some(Value::Date(days)) => Json::String(format_date(*days)),
        Some(Value::Bool(b)) => Json::Bool(*b),
        Some(value @ (Value::Int(_) | Value::BigInt(_))) => value.as_i64().map_or(Json::Null, Json::from),
        Some(Value::Double(f)) => Json::from(*f),
        Some(value) => Json::String(value.to_string()),
    }
}

/// Loads relations of single products, preferring prefetched rows.
struct Loader<'a> {
    storage: &'a mut dyn Storage,
    prefetched: &'a Prefetched,
    partners: &'a HashMap<i64, Row>,
}

impl Loader<'_> {
    fn related(&mut self, name: &'static str, product: &Row) -> Result<Vec<Row>> {
        let pk = product.pk(PRODUCT.pk_column())?;
        if let Some(rows) = self.prefetched.get(name, pk) {
            return Ok(rows.to_vec());
        }
        let mut rows = if name == ATTRIBUTES {
            prefetch_attribute_values(&mut *self.storage, &[pk], DEFAULT_BATCH_SIZE)?
        } else {
            load_relation(
                &mut *self.storage,
                &PRODUCT,
                name,
                slice::from_ref(product),
                DEFAULT_BATCH_SIZE,
            )?
        };
        Ok(rows.remove(&pk).unwrap_or_default())
    }

    fn partner(&mut self, record: &Row) -> Result<Option<PartnerResource>> {
        let Some(partner_id) = int(record, "partner_id") else {
            return Ok(None);
        };
        let row = match self.partners.get(&partner_id) {
            Some(row) => Some(row.clone()),
            None => {
                let pk = record.pk(STOCK_RECORD.pk_column())?;
                let mut rows = load_relation(
                    &mut *self.storage,
                    &STOCK_RECORD,
                    "partner",
                    slice::from_ref(record),
                    DEFAULT_BATCH_SIZE,
                )?;
                rows.remove(&pk).and_then(|rows| rows.into_iter().next())
            }
        };
        Ok(row.map(|row| PartnerResource {
            code: text(&row, "code").unwrap_or_default(),
            name: text(&row, "name").unwrap_or_default(),
        }))
    }

    fn product_class(&mut self, product: &Row) -> Result<Option<ProductClassResource>> {
        let mut rows = self.related("product_class", product)?;
        if rows.is_empty() {
            // children show the class of their parent
            if let Some(parent) = self.related("parent", product)?.first() {
                rows = self.related("product_class", parent)?;
            }
        }
        Ok(rows.first().map(|row| ProductClassResource {
            name: text(row, "name"),
            slug: text(row, "slug").unwrap_or_default(),
            requires_shipping: boolean(row, "requires_shipping"),
            track_stock: boolean(row, "track_stock"),
        }))
    }

    fn resource(&mut self, product: &Row, children: Option<Vec<ProductResource>>) -> Result<ProductResource> {
        let pk = product.pk(PRODUCT.pk_column())?;
        let product_class = self.product_class(product)?;
        let parent = self
            .related("parent", product)?
            .first()
            .and_then(|row| text(row, "upc"))
            .map(ProductRefResource::new);

        let mut images: Vec<ImageResource> = self
            .related("images", product)?
            .iter()
            .map(|row| ImageResource {
                code: text(row, "code").unwrap_or_default(),
                original: text(row, "original"),
                caption: text(row, "caption"),
                display_order: int(row, "display_order").unwrap_or(0),
                date_created: timestamp(row, "date_created"),
            })
            .collect();
        images.sort_by_key(|image| image.display_order);

        let mut stockrecords = Vec::new();
        for row in self.related("stockrecords", product)? {
            stockrecords.push(StockRecordResource {
                partner_sku: text(&row, "partner_sku").unwrap_or_default(),
                num_in_stock: int(&row, "num_in_stock"),
                num_allocated: int(&row, "num_allocated"),
                price: text(&row, "price"),
                currency: text(&row, "price_currency"),
                partner: self.partner(&row)?,
            });
        }

        let categories = self
            .related("categories", product)?
            .iter()
            .map(|row| CategoryResource {
                code: text(row, "code").unwrap_or_default(),
                name: text(row, "name"),
                slug: text(row, "slug"),
                description: text(row, "description"),
                meta_title: text(row, "meta_title"),
                meta_description: text(row, "meta_description"),
                image: text(row, "image"),
                is_public: boolean(row, "is_public"),
            })
            .collect();

        let recommended_products = self
            .related("recommended_products", product)?
            .iter()
            .filter_map(|row| text(row, "upc"))
            .map(ProductRefResource::new)
            .collect();

        let attributes: BTreeMap<String, serde_json::Value> = self
            .related(ATTRIBUTES, product)?
            .iter()
            .filter_map(|row| Some((text(row, "code")?, attribute_json(row))))
            .collect();

        let first = stockrecords.first();
        let availability = first.and_then(|record| record.num_in_stock);
        let is_available_to_buy = first.map(|record| {
            record.num_in_stock.unwrap_or(0) - record.num_allocated.unwrap_or(0) > 0
        });

        Ok(ProductResource {
            upc: text(product, "upc"),
            structure: text(product, "structure").unwrap_or_default(),
            title: text(product, "title").unwrap_or_default(),
            slug: text(product, "slug"),
            description: text(product, "description"),
            meta_title: text(product, "meta_title"),
            meta_description: text(product, "meta_description"),
            rating: product.get_by_name("rating").and_then(Value::as_f64),
            is_discountable: boolean(product, "is_discountable").unwrap_or(true),
            is_public: boolean(product, "is_public").unwrap_or(true),
            priority: int(product, "priority").unwrap_or(0),
            price: first.and_then(|record| record.price.clone()),
            currency: first.and_then(|record| record.currency.clone()),
            availability,
            is_available_to_buy,
            partner: first.and_then(|record| record.partner.clone()),
            product_class,
            parent,
            images: Some(images),
            categories: Some(categories),
            recommended_products: Some(recommended_products),
            attributes: Some(attributes),
            children,
            date_created: timestamp(product, "date_created"),
            date_updated: timestamp(product, "date_updated"),
            source_entity: Some(EntityRef::new(PRODUCT.name, pk)),
            stockrecords: Some(stockrecords),
        })
    }
}

/// Partners of every prefetched stock record, keyed by partner key.
fn prefetch_partners(
    storage: &mut dyn Storage,
    prefetched: &Prefetched,
    owners: &[Row],
) -> Result<HashMap<i64, Row>> {
    let mut partners = HashMap::new();
    if !prefetched.contains("stockrecords") {
        return Ok(partners);
    }
    let mut records = Vec::new();
    for owner in owners {
        if let Some(rows) = prefetched.get("stockrecords", owner.pk(PRODUCT.pk_column())?) {
            records.extend_from_slice(rows);
        }
    }
    if records.is_empty() {
        return Ok(partners);
    }
    let loaded: RelatedRows = load_relation(storage, &STOCK_RECORD, "partner", &records, DEFAULT_BATCH_SIZE)?;
    for row in loaded.into_values().flatten() {
        partners.insert(row.pk("id")?, row);
    }
    Ok(partners)
}

/// Read the products matching `filter` as resources, in key order.
///
/// With `include_children`, the children of each product are read too,
/// using the registry's children prefetches.
#[tracing::instrument(level = "debug", skip(storage, registry, filter))]
pub fn products_to_resources(
    storage: &mut dyn Storage,
    registry: &PrefetchRegistry,
    filter: &Filter,
    include_children: bool,
) -> Result<Vec<ProductResource>> {
    let products = storage.select(&PRODUCT, filter)?;
    let prefetched = Prefetched::load(
        &mut *storage,
        &PRODUCT,
        &products,
        registry.get_select_related(),
        registry.get_prefetches(),
        DEFAULT_BATCH_SIZE,
    )?;
    let partners = prefetch_partners(&mut *storage, &prefetched, &products)?;

    let mut children_by_parent: HashMap<i64, Vec<ProductResource>> = HashMap::new();
    if include_children && !products.is_empty() {
        let keys = products
            .iter()
            .map(|row| row.pk(PRODUCT.pk_column()).map(Value::BigInt))
            .collect::<Result<Vec<_>>>()?;
        let children = select_in_batches(
            &mut *storage,
            &PRODUCT,
            "parent_id",
            &keys,
            &Filter::All,
            DEFAULT_BATCH_SIZE,
        )?;
        let children_prefetched = Prefetched::load(
            &mut *storage,
            &PRODUCT,
            &children,
            &[],
            registry.get_children_prefetches(),
            DEFAULT_BATCH_SIZE,
        )?;
        let children_partners = prefetch_partners(&mut *storage, &children_prefetched, &children)?;
        let mut loader = Loader {
            storage: &mut *storage,
            prefetched: &children_prefetched,
            partners: &children_partners,
        };
        for child in &children {
            let Some(parent) = int(child, "parent_id") else {
                continue;
            };
            let resource = loader.resource(child, None)?;
            children_by_parent.entry(parent).or_default().push(resource);
        }
    }

    let mut loader = Loader {
        storage,
        prefetched: &prefetched,
        partners: &partners,
    };
    let mut resources = Vec::with_capacity(products.len());
    for product in &products {
        let pk = product.pk(PRODUCT.pk_column())?;
        let children = include_children.then(|| children_by_parent.remove(&pk).unwrap_or_default());
        resources.push(loader.resource(product, children)?);
    }
    tracing::info!(products = resources.len(), "Read products");
    Ok(resources)
}
