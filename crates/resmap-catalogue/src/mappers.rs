//! Reverse mappers from catalogue resources to catalogue entities.

use resmap_core::date::now_micros;
use resmap_core::{EntitySchema, Result, Value};
use resmap_session::{MapperContext, Mapped, MappingRule, ReverseMapper};

use crate::constants::DEFAULT_CURRENCY;
use crate::resources::{
    CategoryResource, ImageResource, PartnerResource, ProductClassResource, ProductResource,
    StockRecordResource,
};
use crate::schema::{
    CATEGORY, PARENT, PARTNER, PRODUCT, PRODUCT_CLASS, PRODUCT_IMAGE, STOCK_RECORD,
};

/// Side value name under which product attribute bags are handed to
/// [`ProductAttributePhase`](crate::attributes::ProductAttributePhase).
pub const ATTRIBUTES: &str = "attributes";

fn now_if_null(values: &[Value]) -> Result<Vec<Value>> {
    Ok(values
        .iter()
        .map(|v| if v.is_null() { Value::Timestamp(now_micros()) } else { v.clone() })
        .collect())
}

fn currency_or_default(values: &[Value]) -> Result<Vec<Value>> {
    Ok(values
        .iter()
        .map(|v| if v.is_null() { Value::from(DEFAULT_CURRENCY) } else { v.clone() })
        .collect())
}

pub struct ProductClassMapper;

impl ReverseMapper for ProductClassMapper {
    type Resource = ProductClassResource;

    fn entity(&self) -> &'static EntitySchema {
        &PRODUCT_CLASS
    }

    fn rules(&self) -> &[MappingRule<ProductClassResource>] {
        &[]
    }
}

pub struct CategoryMapper;

impl ReverseMapper for CategoryMapper {
    type Resource = CategoryResource;

    fn entity(&self) -> &'static EntitySchema {
        &CATEGORY
    }

    fn rules(&self) -> &[MappingRule<CategoryResource>] {
        &[]
    }
}

static IMAGE_RULES: [MappingRule<ImageResource>; 1] =
    [MappingRule::convert(&["date_created"], &["date_created"], now_if_null)];

pub struct ImageMapper;

impl ReverseMapper for ImageMapper {
    type Resource = ImageResource;

    fn entity(&self) -> &'static EntitySchema {
        &PRODUCT_IMAGE
    }

    fn rules(&self) -> &[MappingRule<ImageResource>] {
        &IMAGE_RULES
    }
}

pub struct PartnerMapper;

impl ReverseMapper for PartnerMapper {
    type Resource = PartnerResource;

    fn entity(&self) -> &'static EntitySchema {
        &PARTNER
    }

    fn rules(&self) -> &[MappingRule<PartnerResource>] {
        &[]
    }
}

fn map_partner(partner: Option<&PartnerResource>, ctx: &mut MapperContext) -> Result<Mapped> {
    let id = partner.map(|p| PartnerMapper.map(p, ctx)).transpose()?;
    Ok(Mapped::One(id))
}

fn stock_record_partner(res: &StockRecordResource, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    Ok(vec![map_partner(res.partner.as_ref(), ctx)?])
}

static STOCK_RECORD_RULES: [MappingRule<StockRecordResource>; 2] = [
    MappingRule::convert(&["currency"], &["price_currency"], currency_or_default),
    MappingRule::assign(&["partner"], stock_record_partner),
];

pub struct StockRecordMapper;

impl ReverseMapper for StockRecordMapper {
    type Resource = StockRecordResource;

    fn entity(&self) -> &'static EntitySchema {
        &STOCK_RECORD
    }

    fn rules(&self) -> &[MappingRule<StockRecordResource>] {
        &STOCK_RECORD_RULES
    }
}

// ==================== Product ====================

fn product_class(res: &ProductResource, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    let id = res
        .product_class
        .as_ref()
        .map(|class| ProductClassMapper.map(class, ctx))
        .transpose()?;
    Ok(vec![Mapped::One(id)])
}

/// Parents are referenced by UPC and must already exist.
fn parent(res: &ProductResource, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    let Some(parent) = &res.parent else {
        return Ok(vec![Mapped::One(None)]);
    };
    let id = ctx.register(
        &PRODUCT,
        vec![
            ("upc", Mapped::Scalar(Value::from(&parent.upc))),
            ("structure", Mapped::Scalar(Value::from(PARENT))),
        ],
    )?;
    Ok(vec![Mapped::One(Some(id))])
}

fn images(res: &ProductResource, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    let ids = match &res.images {
        Some(images) => Some(ImageMapper.map_all(images, ctx)?),
        None => None,
    };
    Ok(vec![Mapped::Many(ids)])
}

/// Explicit stock records win over the price shortcut, which describes one
/// record keyed by the product UPC.
fn stockrecords(res: &ProductResource, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    if let Some(records) = res.stockrecords.as_ref().filter(|r| !r.is_empty()) {
        let ids = StockRecordMapper.map_all(records, ctx)?;
        return Ok(vec![Mapped::Many(Some(ids))]);
    }
    if !res.has_price_shortcut() {
        return Ok(vec![Mapped::Many(res.stockrecords.as_ref().map(|_| Vec::new()))]);
    }

    let partner = map_partner(res.partner.as_ref(), ctx)?;
    let currency = res.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);
    let id = ctx.register(
        &STOCK_RECORD,
        vec![
            ("partner", partner),
            ("partner_sku", Mapped::Scalar(res.upc.clone().into())),
            (
                "price",
                Mapped::Scalar(res.price.clone().map_or(Value::Null, Value::Decimal)),
            ),
            ("price_currency", Mapped::Scalar(Value::from(currency))),
            ("num_in_stock", Mapped::Scalar(res.availability.into())),
        ],
    )?;
    Ok(vec![Mapped::Many(Some(vec![id]))])
}

fn categories(res: &ProductResource, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    let ids = match &res.categories {
        Some(categories) => Some(CategoryMapper.map_all(categories, ctx)?),
        None => None,
    };
    Ok(vec![Mapped::Many(ids)])
}

fn recommended_products(res: &ProductResource, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    let Some(recommended) = &res.recommended_products else {
        return Ok(vec![Mapped::Many(None)]);
    };
    let mut ids = Vec::with_capacity(recommended.len());
    for product in recommended {
        ids.push(ctx.register(
            &PRODUCT,
            vec![("upc", Mapped::Scalar(Value::from(&product.upc)))],
        )?);
    }
    Ok(vec![Mapped::Many(Some(ids))])
}

fn attributes(res: &ProductResource, _ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    let bag = match &res.attributes {
        Some(values) => serde_json::Value::Object(
            values.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        ),
        None => serde_json::Value::Null,
    };
    Ok(vec![Mapped::Side(bag)])
}

static PRODUCT_RULES: [MappingRule<ProductResource>; 7] = [
    MappingRule::assign(&["product_class"], product_class),
    MappingRule::assign(&["parent"], parent),
    MappingRule::assign(&["images"], images),
    MappingRule::assign(&["stockrecords"], stockrecords),
    MappingRule::assign(&["categories"], categories),
    MappingRule::assign(&["recommended_products"], recommended_products),
    MappingRule::assign(&[ATTRIBUTES], attributes),
];

/// Maps a [`ProductResource`] and everything nested in it.
///
/// Children listed on a parent are not saved through the parent; they are
/// imported as products of their own that name the parent.
pub struct ProductMapper;

impl ReverseMapper for ProductMapper {
    type Resource = ProductResource;

    fn entity(&self) -> &'static EntitySchema {
        &PRODUCT
    }

    fn rules(&self) -> &[MappingRule<ProductResource>] {
        &PRODUCT_RULES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ProductRefResource;
    use resmap_session::RelationKey;

    fn shirt() -> ProductResource {
        ProductResource {
            price: Some("20".into()),
            availability: Some(3),
            partner: Some(PartnerResource::new("klaas")),
            images: Some(vec![ImageResource::new("a", "a.jpg")]),
            ..ProductResource::new("A", "Shirt")
        }
    }

    #[test]
    fn test_price_shortcut_becomes_stock_record() {
        let mut ctx = MapperContext::new(&PRODUCT);
        let id = ProductMapper.map(&shirt(), &mut ctx).unwrap();

        let product = ctx.instance(id);
        assert_eq!(product.record.value("upc"), &Value::from("A"));
        assert!(!product.record.contains("price"));

        let stockrecords = PRODUCT.relation_set().get("stockrecords").unwrap();
        let owned = ctx.one_to_many().get(&RelationKey::new(&PRODUCT, stockrecords));
        assert_eq!(owned.len(), 1);
        let record = &ctx.instance(owned[0].items[0]).record;
        assert_eq!(record.value("partner_sku"), &Value::from("A"));
        assert_eq!(record.value("price"), &Value::Decimal("20".into()));
        assert_eq!(record.value("price_currency"), &Value::from(DEFAULT_CURRENCY));
        assert_eq!(record.value("num_in_stock"), &Value::BigInt(3));
    }

    #[test]
    fn test_images_default_their_creation_time() {
        let mut ctx = MapperContext::new(&PRODUCT);
        let id = ImageMapper.map(&ImageResource::new("a", "a.jpg"), &mut ctx).unwrap();
        assert!(matches!(ctx.instance(id).record.value("date_created"), Value::Timestamp(_)));
    }

    #[test]
    fn test_absent_relations_are_left_alone() {
        let mut ctx = MapperContext::new(&PRODUCT);
        let product = ProductResource::new("B", "Plain");
        ProductMapper.map(&product, &mut ctx).unwrap();
        assert!(ctx.one_to_many().is_empty());
        assert!(ctx.many_to_many().is_empty());
        assert_eq!(ctx.side_values(ATTRIBUTES).len(), 1);
        assert!(ctx.side_values(ATTRIBUTES)[0].1.is_null());
    }

    #[test]
    fn test_parent_and_recommendations_are_references() {
        let mut ctx = MapperContext::new(&PRODUCT);
        let child = ProductResource {
            structure: "child".into(),
            parent: Some(ProductRefResource::new("P")),
            recommended_products: Some(vec![ProductRefResource::new("R")]),
            ..ProductResource::new("C", "Child")
        };
        ProductMapper.map(&child, &mut ctx).unwrap();
        assert_eq!(ctx.foreign_keys().len(), 1);
        assert_eq!(ctx.many_to_many().len(), 1);
        assert_eq!(ctx.instances().len(), 3);
    }
}
