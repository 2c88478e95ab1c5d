//! Default allow-lists and identifiers for catalogue imports.

use resmap_session::{FieldsToUpdate, IdentifierMapping};

/// Currency of stock records that do not name one.
pub const DEFAULT_CURRENCY: &str = "EUR";

pub const PRODUCT_STRUCTURE: &str = "Product.structure";
pub const PRODUCT_IS_PUBLIC: &str = "Product.is_public";
pub const PRODUCT_UPC: &str = "Product.upc";
pub const PRODUCT_PARENT: &str = "Product.parent";
pub const PRODUCT_TITLE: &str = "Product.title";
pub const PRODUCT_SLUG: &str = "Product.slug";
pub const PRODUCT_DESCRIPTION: &str = "Product.description";
pub const PRODUCT_META_TITLE: &str = "Product.meta_title";
pub const PRODUCT_META_DESCRIPTION: &str = "Product.meta_description";
pub const PRODUCT_IS_DISCOUNTABLE: &str = "Product.is_discountable";

pub const PRODUCTCLASS_SLUG: &str = "ProductClass.slug";
pub const PRODUCTCLASS_REQUIRESSHIPPING: &str = "ProductClass.requires_shipping";
pub const PRODUCTCLASS_TRACKSTOCK: &str = "ProductClass.track_stock";
pub const PRODUCTCLASS_NAME: &str = "ProductClass.name";

pub const CATEGORY_NAME: &str = "Category.name";
pub const CATEGORY_CODE: &str = "Category.code";
pub const CATEGORY_DESCRIPTION: &str = "Category.description";
pub const CATEGORY_META_TITLE: &str = "Category.meta_title";
pub const CATEGORY_META_DESCRIPTION: &str = "Category.meta_description";
pub const CATEGORY_IMAGE: &str = "Category.image";
pub const CATEGORY_IS_PUBLIC: &str = "Category.is_public";
pub const CATEGORY_SLUG: &str = "Category.slug";

pub const PRODUCTIMAGE_CODE: &str = "ProductImage.code";
pub const PRODUCTIMAGE_ORIGINAL: &str = "ProductImage.original";
pub const PRODUCTIMAGE_CAPTION: &str = "ProductImage.caption";
pub const PRODUCTIMAGE_DISPLAY_ORDER: &str = "ProductImage.display_order";

pub const STOCKRECORD_PARTNER: &str = "StockRecord.partner";
pub const STOCKRECORD_PARTNER_SKU: &str = "StockRecord.partner_sku";
pub const STOCKRECORD_PRICE_CURRENCY: &str = "StockRecord.price_currency";
pub const STOCKRECORD_PRICE: &str = "StockRecord.price";
pub const STOCKRECORD_NUM_IN_STOCK: &str = "StockRecord.num_in_stock";
pub const STOCKRECORD_NUM_ALLOCATED: &str = "StockRecord.num_allocated";

pub const ALL_PRODUCT_FIELDS: &[&str] = &[
    PRODUCT_STRUCTURE,
    PRODUCT_IS_PUBLIC,
    PRODUCT_UPC,
    PRODUCT_PARENT,
    PRODUCT_TITLE,
    PRODUCT_SLUG,
    PRODUCT_DESCRIPTION,
    PRODUCT_META_TITLE,
    PRODUCT_META_DESCRIPTION,
    PRODUCT_IS_DISCOUNTABLE,
];

pub const ALL_PRODUCTCLASS_FIELDS: &[&str] = &[
    PRODUCTCLASS_SLUG,
    PRODUCTCLASS_REQUIRESSHIPPING,
    PRODUCTCLASS_TRACKSTOCK,
    PRODUCTCLASS_NAME,
];

pub const ALL_CATEGORY_FIELDS: &[&str] = &[
    CATEGORY_NAME,
    CATEGORY_CODE,
    CATEGORY_DESCRIPTION,
    CATEGORY_META_TITLE,
    CATEGORY_META_DESCRIPTION,
    CATEGORY_IMAGE,
    CATEGORY_IS_PUBLIC,
    CATEGORY_SLUG,
];

pub const ALL_PRODUCTIMAGE_FIELDS: &[&str] = &[
    PRODUCTIMAGE_CODE,
    PRODUCTIMAGE_ORIGINAL,
    PRODUCTIMAGE_CAPTION,
    PRODUCTIMAGE_DISPLAY_ORDER,
];

pub const ALL_STOCKRECORD_FIELDS: &[&str] = &[
    STOCKRECORD_PARTNER,
    STOCKRECORD_PARTNER_SKU,
    STOCKRECORD_PRICE_CURRENCY,
    STOCKRECORD_PRICE,
    STOCKRECORD_NUM_IN_STOCK,
    STOCKRECORD_NUM_ALLOCATED,
];

/// Product, image and stock record fields, plus the keys of product classes
/// and categories so their links are kept in sync.
pub fn all_catalogue_fields() -> FieldsToUpdate {
    let mut fields = FieldsToUpdate::new(ALL_PRODUCT_FIELDS.iter().copied());
    fields.extend(ALL_PRODUCTIMAGE_FIELDS.iter().copied());
    fields.extend(ALL_STOCKRECORD_FIELDS.iter().copied());
    fields.extend([PRODUCTCLASS_SLUG, CATEGORY_CODE]);
    fields
}

/// Identifying column of partners. The partner table has no slug; `code` is
/// its unique key. Override it through [`IdentifierMapping::with`].
pub const PARTNER_IDENTIFIER: &str = "code";

/// Business identifiers of the catalogue entities.
pub fn model_identifiers_mapping() -> IdentifierMapping {
    IdentifierMapping::new()
        .with("Category", ["code"])
        .with("Product", ["upc"])
        .with("StockRecord", ["partner_id", "partner_sku"])
        .with("ProductClass", ["slug"])
        .with("ProductImage", ["code"])
        .with("Partner", [PARTNER_IDENTIFIER])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PARTNER, PRODUCT, STOCK_RECORD};

    #[test]
    fn test_catalogue_fields_cover_linked_entities() {
        let fields = all_catalogue_fields();
        assert_eq!(fields.fields_for("ProductClass"), Some(vec!["slug"]));
        assert_eq!(fields.fields_for("Category"), Some(vec!["code"]));
        assert!(fields.fields_for("Partner").is_none());

        let columns = fields.columns_for(&PRODUCT).unwrap().unwrap();
        assert!(columns.contains(&"parent_id"));
        let columns = fields.columns_for(&STOCK_RECORD).unwrap().unwrap();
        assert_eq!(columns[0], "partner_id");
    }

    #[test]
    fn test_identifiers_resolve_to_columns() {
        let mapping = model_identifiers_mapping();
        assert_eq!(
            mapping.columns_for(&STOCK_RECORD).unwrap(),
            vec!["partner_id", "partner_sku"]
        );
        assert_eq!(mapping.columns_for(&PARTNER).unwrap(), vec![PARTNER_IDENTIFIER]);
        assert_eq!(mapping.get("ProductAttribute"), &[] as &[String]);
    }
}
