//! Entity schemas of the catalogue and partner tables.

use resmap_core::{
    DefaultValue, EntitySchema, FieldInfo, FieldKind, LinkTableInfo, Record, RelationshipInfo,
    ValidationError,
};

use crate::constants::DEFAULT_CURRENCY;

/// Allowed values of `Product.structure`.
pub const STRUCTURES: &[&str] = &[STANDALONE, PARENT, CHILD];
pub const STANDALONE: &str = "standalone";
pub const PARENT: &str = "parent";
pub const CHILD: &str = "child";

/// Allowed values of `ProductAttribute.type`.
pub const ATTRIBUTE_TYPES: &[&str] = &["text", "richtext", "integer", "boolean", "float", "date"];

static NO_RELATIONS: [RelationshipInfo; 0] = [];

// ==================== ProductClass ====================

static PRODUCT_CLASS_FIELDS: [FieldInfo; 5] = [
    FieldInfo::pk("id"),
    FieldInfo::new("name", FieldKind::Text)
        .blank(true)
        .max_length(128)
        .default(DefaultValue::Text("")),
    FieldInfo::new("slug", FieldKind::Text)
        .unique(true)
        .max_length(128)
        .pattern(r"^[-a-zA-Z0-9_]+$"),
    FieldInfo::new("requires_shipping", FieldKind::Boolean).default(DefaultValue::Bool(true)),
    FieldInfo::new("track_stock", FieldKind::Boolean).default(DefaultValue::Bool(true)),
];

pub static PRODUCT_CLASS: EntitySchema = EntitySchema::new(
    "ProductClass",
    "catalogue_productclass",
    &PRODUCT_CLASS_FIELDS,
    &NO_RELATIONS,
    None,
);

// ==================== Product ====================

static PRODUCT_FIELDS: [FieldInfo; 16] = [
    FieldInfo::pk("id"),
    FieldInfo::new("structure", FieldKind::Text)
        .choices(STRUCTURES)
        .default(DefaultValue::Text(STANDALONE)),
    FieldInfo::new("is_public", FieldKind::Boolean).default(DefaultValue::Bool(true)),
    FieldInfo::new("upc", FieldKind::Text)
        .nullable(true)
        .unique(true)
        .max_length(64),
    FieldInfo::fk("parent_id", "Product").nullable(true),
    FieldInfo::new("title", FieldKind::Text)
        .blank(true)
        .max_length(255)
        .default(DefaultValue::Text("")),
    FieldInfo::new("slug", FieldKind::Text)
        .blank(true)
        .max_length(255)
        .default(DefaultValue::Text("")),
    FieldInfo::new("description", FieldKind::Text)
        .blank(true)
        .default(DefaultValue::Text("")),
    FieldInfo::new("meta_title", FieldKind::Text)
        .nullable(true)
        .blank(true)
        .max_length(255),
    FieldInfo::new("meta_description", FieldKind::Text)
        .nullable(true)
        .blank(true),
    FieldInfo::fk("product_class_id", "ProductClass").nullable(true),
    FieldInfo::new("rating", FieldKind::Float).nullable(true),
    FieldInfo::new("is_discountable", FieldKind::Boolean).default(DefaultValue::Bool(true)),
    FieldInfo::new("priority", FieldKind::Integer).default(DefaultValue::Int(0)),
    FieldInfo::new("date_created", FieldKind::Timestamp).default(DefaultValue::Now),
    FieldInfo::new("date_updated", FieldKind::Timestamp).default(DefaultValue::Now),
];

static PRODUCT_RELATIONS: [RelationshipInfo; 7] = [
    RelationshipInfo::many_to_one("product_class", &PRODUCT_CLASS, "product_class_id"),
    RelationshipInfo::many_to_one("parent", &PRODUCT, "parent_id").must_exist(true),
    RelationshipInfo::one_to_many("children", &PRODUCT, "parent_id"),
    RelationshipInfo::one_to_many("images", &PRODUCT_IMAGE, "product_id"),
    RelationshipInfo::one_to_many("stockrecords", &STOCK_RECORD, "product_id"),
    RelationshipInfo::many_to_many(
        "categories",
        &CATEGORY,
        LinkTableInfo::new(&PRODUCT_CATEGORY, "product_id", "category_id"),
    ),
    RelationshipInfo::many_to_many(
        "recommended_products",
        &PRODUCT,
        LinkTableInfo::new(&PRODUCT_RECOMMENDATION, "primary_id", "recommendation_id"),
    )
    .must_exist(true),
];

pub static PRODUCT: EntitySchema = EntitySchema::new(
    "Product",
    "catalogue_product",
    &PRODUCT_FIELDS,
    &PRODUCT_RELATIONS,
    Some(clean_product),
);

/// Child products need a parent; other structures cannot have one.
fn clean_product(record: &Record) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    let has_parent = !record.value("parent_id").is_null();
    match record.value("structure").as_str().unwrap_or(STANDALONE) {
        CHILD if !has_parent => {
            errors.add_custom("parent", "A child product needs a parent.");
        }
        STANDALONE | PARENT if has_parent => {
            errors.add_custom("parent", "Only child products can have a parent.");
        }
        _ => {}
    }
    errors.into_result()
}

// ==================== ProductImage ====================

static PRODUCT_IMAGE_FIELDS: [FieldInfo; 7] = [
    FieldInfo::pk("id"),
    FieldInfo::fk("product_id", "Product"),
    FieldInfo::new("code", FieldKind::Text)
        .nullable(true)
        .unique(true)
        .max_length(128),
    FieldInfo::new("original", FieldKind::Text).max_length(255),
    FieldInfo::new("caption", FieldKind::Text)
        .blank(true)
        .max_length(200)
        .default(DefaultValue::Text("")),
    FieldInfo::new("display_order", FieldKind::Integer).default(DefaultValue::Int(0)),
    FieldInfo::new("date_created", FieldKind::Timestamp).default(DefaultValue::Now),
];

pub static PRODUCT_IMAGE: EntitySchema = EntitySchema::new(
    "ProductImage",
    "catalogue_productimage",
    &PRODUCT_IMAGE_FIELDS,
    &NO_RELATIONS,
    None,
);

// ==================== Category ====================

static CATEGORY_FIELDS: [FieldInfo; 9] = [
    FieldInfo::pk("id"),
    FieldInfo::new("code", FieldKind::Text)
        .nullable(true)
        .unique(true)
        .max_length(255),
    FieldInfo::new("name", FieldKind::Text).max_length(255),
    FieldInfo::new("slug", FieldKind::Text)
        .blank(true)
        .max_length(255)
        .default(DefaultValue::Text("")),
    FieldInfo::new("description", FieldKind::Text)
        .blank(true)
        .default(DefaultValue::Text("")),
    FieldInfo::new("meta_title", FieldKind::Text)
        .nullable(true)
        .blank(true)
        .max_length(255),
    FieldInfo::new("meta_description", FieldKind::Text)
        .nullable(true)
        .blank(true),
    FieldInfo::new("image", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("is_public", FieldKind::Boolean).default(DefaultValue::Bool(true)),
];

pub static CATEGORY: EntitySchema = EntitySchema::new(
    "Category",
    "catalogue_category",
    &CATEGORY_FIELDS,
    &NO_RELATIONS,
    None,
);

static PRODUCT_CATEGORY_FIELDS: [FieldInfo; 3] = [
    FieldInfo::pk("id"),
    FieldInfo::fk("product_id", "Product"),
    FieldInfo::fk("category_id", "Category"),
];

pub static PRODUCT_CATEGORY: EntitySchema = EntitySchema::new(
    "ProductCategory",
    "catalogue_productcategory",
    &PRODUCT_CATEGORY_FIELDS,
    &NO_RELATIONS,
    None,
);

static PRODUCT_RECOMMENDATION_FIELDS: [FieldInfo; 4] = [
    FieldInfo::pk("id"),
    FieldInfo::fk("primary_id", "Product"),
    FieldInfo::fk("recommendation_id", "Product"),
    FieldInfo::new("ranking", FieldKind::Integer).default(DefaultValue::Int(0)),
];

pub static PRODUCT_RECOMMENDATION: EntitySchema = EntitySchema::new(
    "ProductRecommendation",
    "catalogue_productrecommendation",
    &PRODUCT_RECOMMENDATION_FIELDS,
    &NO_RELATIONS,
    None,
);

// ==================== Attributes ====================

static PRODUCT_ATTRIBUTE_FIELDS: [FieldInfo; 6] = [
    FieldInfo::pk("id"),
    FieldInfo::fk("product_class_id", "ProductClass"),
    FieldInfo::new("code", FieldKind::Text)
        .max_length(128)
        .pattern(r"^[a-zA-Z_][0-9a-zA-Z_]*$"),
    FieldInfo::new("name", FieldKind::Text)
        .blank(true)
        .max_length(128)
        .default(DefaultValue::Text("")),
    FieldInfo::new("type", FieldKind::Text)
        .choices(ATTRIBUTE_TYPES)
        .default(DefaultValue::Text("text")),
    FieldInfo::new("required", FieldKind::Boolean).default(DefaultValue::Bool(false)),
];

static PRODUCT_ATTRIBUTE_RELATIONS: [RelationshipInfo; 1] = [RelationshipInfo::many_to_one(
    "product_class",
    &PRODUCT_CLASS,
    "product_class_id",
)];

pub static PRODUCT_ATTRIBUTE: EntitySchema = EntitySchema::new(
    "ProductAttribute",
    "catalogue_productattribute",
    &PRODUCT_ATTRIBUTE_FIELDS,
    &PRODUCT_ATTRIBUTE_RELATIONS,
    None,
);

static PRODUCT_ATTRIBUTE_VALUE_FIELDS: [FieldInfo; 9] = [
    FieldInfo::pk("id"),
    FieldInfo::fk("product_id", "Product"),
    FieldInfo::fk("attribute_id", "ProductAttribute"),
    FieldInfo::new("value_text", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("value_richtext", FieldKind::Text).nullable(true).blank(true),
    FieldInfo::new("value_integer", FieldKind::Integer).nullable(true),
    FieldInfo::new("value_boolean", FieldKind::Boolean).nullable(true),
    FieldInfo::new("value_float", FieldKind::Float).nullable(true),
    FieldInfo::new("value_date", FieldKind::Date).nullable(true),
];

pub static PRODUCT_ATTRIBUTE_VALUE: EntitySchema = EntitySchema::new(
    "ProductAttributeValue",
    "catalogue_productattributevalue",
    &PRODUCT_ATTRIBUTE_VALUE_FIELDS,
    &NO_RELATIONS,
    None,
);

// ==================== Partner ====================

static PARTNER_FIELDS: [FieldInfo; 3] = [
    FieldInfo::pk("id"),
    FieldInfo::new("code", FieldKind::Text)
        .unique(true)
        .max_length(128),
    FieldInfo::new("name", FieldKind::Text)
        .blank(true)
        .max_length(128)
        .default(DefaultValue::Text("")),
];

pub static PARTNER: EntitySchema =
    EntitySchema::new("Partner", "partner_partner", &PARTNER_FIELDS, &NO_RELATIONS, None);

static STOCK_RECORD_FIELDS: [FieldInfo; 10] = [
    FieldInfo::pk("id"),
    FieldInfo::fk("product_id", "Product"),
    FieldInfo::fk("partner_id", "Partner"),
    FieldInfo::new("partner_sku", FieldKind::Text).max_length(128),
    FieldInfo::new("price_currency", FieldKind::Text)
        .max_length(12)
        .default(DefaultValue::Text(DEFAULT_CURRENCY)),
    FieldInfo::new("price", FieldKind::Decimal).nullable(true),
    FieldInfo::new("num_in_stock", FieldKind::Integer).nullable(true),
    FieldInfo::new("num_allocated", FieldKind::Integer).nullable(true),
    FieldInfo::new("date_created", FieldKind::Timestamp).default(DefaultValue::Now),
    FieldInfo::new("date_updated", FieldKind::Timestamp).default(DefaultValue::Now),
];

static STOCK_RECORD_RELATIONS: [RelationshipInfo; 1] =
    [RelationshipInfo::many_to_one("partner", &PARTNER, "partner_id")];

pub static STOCK_RECORD: EntitySchema = EntitySchema::new(
    "StockRecord",
    "partner_stockrecord",
    &STOCK_RECORD_FIELDS,
    &STOCK_RECORD_RELATIONS,
    None,
);
