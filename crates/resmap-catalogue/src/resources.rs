//! Catalogue resources.
//!
//! These are the validated shapes products travel in, both when they are
//! read from storage and when they are imported. Nested relations are plain
//! fields; the reverse mappers decide how each one is saved.

use std::collections::BTreeMap;
use std::slice;

use serde::{Deserialize, Serialize};

use resmap_core::{EntityRef, FieldInfo, FieldKind, Resource, ValidationError, Value, clean_nested};

use crate::constants::DEFAULT_CURRENCY;
use crate::schema::{STANDALONE, STRUCTURES};

fn timestamp(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Timestamp)
}

fn decimal(value: Option<&String>) -> Value {
    value.map_or(Value::Null, |v| Value::Decimal(v.clone()))
}

// ==================== ProductClass ====================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductClassResource {
    pub name: Option<String>,
    pub slug: String,
    pub requires_shipping: Option<bool>,
    pub track_stock: Option<bool>,
}

static PRODUCT_CLASS_RESOURCE_FIELDS: [FieldInfo; 4] = [
    FieldInfo::new("name", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("slug", FieldKind::Text),
    FieldInfo::new("requires_shipping", FieldKind::Boolean).nullable(true),
    FieldInfo::new("track_stock", FieldKind::Boolean).nullable(true),
];

impl Resource for ProductClassResource {
    const NAME: &'static str = "ProductClass";

    fn fields() -> &'static [FieldInfo] {
        &PRODUCT_CLASS_RESOURCE_FIELDS
    }

    fn field_value(&self, name: &str) -> Option<Value> {
        let value = match name {
            "name" => self.name.clone().into(),
            "slug" => Value::from(&self.slug),
            "requires_shipping" => self.requires_shipping.into(),
            "track_stock" => self.track_stock.into(),
            _ => return None,
        };
        Some(value)
    }
}

// ==================== Category ====================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryResource {
    pub code: String,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub image: Option<String>,
    pub is_public: Option<bool>,
}

impl CategoryResource {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

static CATEGORY_RESOURCE_FIELDS: [FieldInfo; 8] = [
    FieldInfo::new("code", FieldKind::Text),
    FieldInfo::new("name", FieldKind::Text).nullable(true),
    FieldInfo::new("slug", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("description", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("meta_title", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("meta_description", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("image", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("is_public", FieldKind::Boolean).nullable(true),
];

impl Resource for CategoryResource {
    const NAME: &'static str = "Category";

    fn fields() -> &'static [FieldInfo] {
        &CATEGORY_RESOURCE_FIELDS
    }

    fn field_value(&self, name: &str) -> Option<Value> {
        let value = match name {
            "code" => Value::from(&self.code),
            "name" => self.name.clone().into(),
            "slug" => self.slug.clone().into(),
            "description" => self.description.clone().into(),
            "meta_title" => self.meta_title.clone().into(),
            "meta_description" => self.meta_description.clone().into(),
            "image" => self.image.clone().into(),
            "is_public" => self.is_public.into(),
            _ => return None,
        };
        Some(value)
    }
}

// ==================== ProductImage ====================

/// An image of a product. Display order zero marks the primary image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageResource {
    pub code: String,
    pub original: Option<String>,
    pub caption: Option<String>,
    pub display_order: i64,
    /// Microseconds since the epoch.
    pub date_created: Option<i64>,
}

impl ImageResource {
    pub fn new(code: impl Into<String>, original: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            original: Some(original.into()),
            ..Self::default()
        }
    }
}

static IMAGE_RESOURCE_FIELDS: [FieldInfo; 5] = [
    FieldInfo::new("code", FieldKind::Text),
    FieldInfo::new("original", FieldKind::Text).nullable(true),
    FieldInfo::new("caption", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("display_order", FieldKind::Integer),
    FieldInfo::new("date_created", FieldKind::Timestamp).nullable(true),
];

impl Resource for ImageResource {
    const NAME: &'static str = "ProductImage";

    fn fields() -> &'static [FieldInfo] {
        &IMAGE_RESOURCE_FIELDS
    }

    fn field_value(&self, name: &str) -> Option<Value> {
        let value = match name {
            "code" => Value::from(&self.code),
            "original" => self.original.clone().into(),
            "caption" => self.caption.clone().into(),
            "display_order" => Value::BigInt(self.display_order),
            "date_created" => timestamp(self.date_created),
            _ => return None,
        };
        Some(value)
    }
}

// ==================== Partner ====================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartnerResource {
    pub code: String,
    pub name: String,
}

impl PartnerResource {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: String::new(),
        }
    }
}

static PARTNER_RESOURCE_FIELDS: [FieldInfo; 2] = [
    FieldInfo::new("code", FieldKind::Text),
    FieldInfo::new("name", FieldKind::Text).blank(true),
];

impl Resource for PartnerResource {
    const NAME: &'static str = "Partner";

    fn fields() -> &'static [FieldInfo] {
        &PARTNER_RESOURCE_FIELDS
    }

    fn field_value(&self, name: &str) -> Option<Value> {
        match name {
            "code" => Some(Value::from(&self.code)),
            "name" => Some(Value::from(&self.name)),
            _ => None,
        }
    }
}

// ==================== StockRecord ====================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockRecordResource {
    pub partner_sku: String,
    pub num_in_stock: Option<i64>,
    pub num_allocated: Option<i64>,
    /// Decimal string, e.g. `"20.00"`.
    pub price: Option<String>,
    pub currency: Option<String>,
    pub partner: Option<PartnerResource>,
}

static STOCK_RECORD_RESOURCE_FIELDS: [FieldInfo; 5] = [
    FieldInfo::new("partner_sku", FieldKind::Text),
    FieldInfo::new("num_in_stock", FieldKind::Integer).nullable(true),
    FieldInfo::new("num_allocated", FieldKind::Integer).nullable(true),
    FieldInfo::new("price", FieldKind::Decimal),
    FieldInfo::new("currency", FieldKind::Text).nullable(true),
];

impl Resource for StockRecordResource {
    const NAME: &'static str = "StockRecord";

    fn fields() -> &'static [FieldInfo] {
        &STOCK_RECORD_RESOURCE_FIELDS
    }

    fn field_value(&self, name: &str) -> Option<Value> {
        let value = match name {
            "partner_sku" => Value::from(&self.partner_sku),
            "num_in_stock" => self.num_in_stock.into(),
            "num_allocated" => self.num_allocated.into(),
            "price" => decimal(self.price.as_ref()),
            "currency" => self.currency.clone().into(),
            _ => return None,
        };
        Some(value)
    }

    fn clean(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        match &self.partner {
            Some(partner) => clean_nested("partner", slice::from_ref(partner), &mut errors),
            None => errors.add_required("partner"),
        }
        errors.into_result()
    }
}

// ==================== Product ====================

/// Reference to an existing product by its UPC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRefResource {
    pub upc: String,
}

impl ProductRefResource {
    pub fn new(upc: impl Into<String>) -> Self {
        Self { upc: upc.into() }
    }
}

/// A product with everything that hangs off it.
///
/// The price shortcut (`price`, `currency`, `availability`, `partner`)
/// describes a single stock record without spelling out `stockrecords`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductResource {
    pub upc: Option<String>,
    pub structure: String,
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub rating: Option<f64>,
    pub is_discountable: bool,
    pub is_public: bool,
    pub priority: i64,

    pub price: Option<String>,
    pub currency: Option<String>,
    pub availability: Option<i64>,
    pub is_available_to_buy: Option<bool>,
    pub partner: Option<PartnerResource>,
    pub stockrecords: Option<Vec<StockRecordResource>>,

    pub product_class: Option<ProductClassResource>,
    pub parent: Option<ProductRefResource>,
    pub images: Option<Vec<ImageResource>>,
    pub categories: Option<Vec<CategoryResource>>,
    pub recommended_products: Option<Vec<ProductRefResource>>,
    /// Attribute values keyed by attribute code. `null` removes a value.
    pub attributes: Option<BTreeMap<String, serde_json::Value>>,
    pub children: Option<Vec<ProductResource>>,

    pub date_created: Option<i64>,
    pub date_updated: Option<i64>,

    #[serde(skip)]
    pub source_entity: Option<EntityRef>,
}

impl Default for ProductResource {
    fn default() -> Self {
        Self {
            upc: None,
            structure: STANDALONE.to_string(),
            title: String::new(),
            slug: None,
            description: None,
            meta_title: None,
            meta_description: None,
            rating: None,
            is_discountable: true,
            is_public: true,
            priority: 0,
            price: None,
            currency: Some(DEFAULT_CURRENCY.to_string()),
            availability: None,
            is_available_to_buy: None,
            partner: None,
            stockrecords: None,
            product_class: None,
            parent: None,
            images: None,
            categories: None,
            recommended_products: None,
            attributes: None,
            children: None,
            date_created: None,
            date_updated: None,
            source_entity: None,
        }
    }
}

impl ProductResource {
    pub fn new(upc: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            upc: Some(upc.into()),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Whether the price shortcut fields are in use.
    pub fn has_price_shortcut(&self) -> bool {
        self.stockrecords.as_ref().is_none_or(Vec::is_empty)
            && (self.price.is_some() || self.availability.is_some())
    }
}

static PRODUCT_RESOURCE_FIELDS: [FieldInfo; 17] = [
    FieldInfo::new("upc", FieldKind::Text).nullable(true).max_length(64),
    FieldInfo::new("structure", FieldKind::Text).choices(STRUCTURES),
    FieldInfo::new("title", FieldKind::Text).max_length(255),
    FieldInfo::new("slug", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("description", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("meta_title", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("meta_description", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("rating", FieldKind::Float).nullable(true),
    FieldInfo::new("is_discountable", FieldKind::Boolean),
    FieldInfo::new("is_public", FieldKind::Boolean),
    FieldInfo::new("priority", FieldKind::Integer),
    FieldInfo::new("price", FieldKind::Decimal).nullable(true),
    FieldInfo::new("currency", FieldKind::Text).nullable(true),
    FieldInfo::new("availability", FieldKind::Integer).nullable(true),
    FieldInfo::new("is_available_to_buy", FieldKind::Boolean).nullable(true),
    FieldInfo::new("date_created", FieldKind::Timestamp).nullable(true),
    FieldInfo::new("date_updated", FieldKind::Timestamp).nullable(true),
];

impl Resource for ProductResource {
    const NAME: &'static str = "Product";

    fn fields() -> &'static [FieldInfo] {
        &PRODUCT_RESOURCE_FIELDS
    }

    fn field_value(&self, name: &str) -> Option<Value> {
        let value = match name {
            "upc" => self.upc.clone().into(),
            "structure" => Value::from(&self.structure),
            "title" => Value::from(&self.title),
            "slug" => self.slug.clone().into(),
            "description" => self.description.clone().into(),
            "meta_title" => self.meta_title.clone().into(),
            "meta_description" => self.meta_description.clone().into(),
            "rating" => self.rating.into(),
            "is_discountable" => Value::Bool(self.is_discountable),
            "is_public" => Value::Bool(self.is_public),
            "priority" => Value::BigInt(self.priority),
            "price" => decimal(self.price.as_ref()),
            "currency" => self.currency.clone().into(),
            "availability" => self.availability.into(),
            "is_available_to_buy" => self.is_available_to_buy.into(),
            "date_created" => timestamp(self.date_created),
            "date_updated" => timestamp(self.date_updated),
            _ => return None,
        };
        Some(value)
    }

    fn clean(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if self.has_price_shortcut()
            && !(self.upc.is_some() && self.currency.is_some() && self.partner.is_some())
        {
            errors.add_model_error(
                "upc, currency and partner are required when specifying price or availability",
            );
            if self.currency.is_none() {
                errors.add_custom("currency", "Currency can not be empty.");
            }
            if self.partner.is_none() {
                errors.add_custom("partner", "Partner can not be empty.");
            }
        }

        if let Some(class) = &self.product_class {
            clean_nested("product_class", slice::from_ref(class), &mut errors);
        }
        if let Some(partner) = &self.partner {
            clean_nested("partner", slice::from_ref(partner), &mut errors);
        }
        if let Some(images) = &self.images {
            clean_nested("images", images, &mut errors);
        }
        if let Some(stockrecords) = &self.stockrecords {
            clean_nested("stockrecords", stockrecords, &mut errors);
        }
        if let Some(categories) = &self.categories {
            clean_nested("categories", categories, &mut errors);
        }
        if let Some(children) = &self.children {
            clean_nested("children", children, &mut errors);
        }
        errors.into_result()
    }

    fn source_entity(&self) -> Option<&EntityRef> {
        self.source_entity.as_ref()
    }
}
