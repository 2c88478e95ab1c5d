//! Small catalogue used by the unit tests of this crate.

use resmap_core::{
    DefaultValue, EntitySchema, FieldInfo, FieldKind, LinkTableInfo, RelationshipInfo, Resource,
    Result, Value,
};

use crate::context::MapperContext;
use crate::mapper::{MappingRule, ReverseMapper};
use crate::relations::Mapped;

static CLASS_FIELDS: [FieldInfo; 3] = [
    FieldInfo::pk("id"),
    FieldInfo::new("slug", FieldKind::Text).unique(true),
    FieldInfo::new("name", FieldKind::Text).blank(true).default(DefaultValue::Text("")),
];
static PRODUCT_FIELDS: [FieldInfo; 6] = [
    FieldInfo::pk("id"),
    FieldInfo::new("upc", FieldKind::Text).unique(true).nullable(true),
    FieldInfo::new("title", FieldKind::Text),
    FieldInfo::new("structure", FieldKind::Text)
        .choices(&["standalone", "parent", "child"])
        .default(DefaultValue::Text("standalone")),
    FieldInfo::fk("product_class_id", "ProductClass").nullable(true),
    FieldInfo::fk("parent_id", "Product").nullable(true),
];
static IMAGE_FIELDS: [FieldInfo; 4] = [
    FieldInfo::pk("id"),
    FieldInfo::fk("product_id", "Product"),
    FieldInfo::new("code", FieldKind::Text).nullable(true),
    FieldInfo::new("original", FieldKind::Text),
];
static CATEGORY_FIELDS: [FieldInfo; 3] = [
    FieldInfo::pk("id"),
    FieldInfo::new("code", FieldKind::Text).unique(true),
    FieldInfo::new("name", FieldKind::Text),
];
static PRODUCT_CATEGORY_FIELDS: [FieldInfo; 3] = [
    FieldInfo::pk("id"),
    FieldInfo::fk("product_id", "Product"),
    FieldInfo::fk("category_id", "Category"),
];
static NODE_FIELDS: [FieldInfo; 3] = [
    FieldInfo::pk("id"),
    FieldInfo::new("name", FieldKind::Text),
    FieldInfo::fk("parent_id", "Node").nullable(true),
];

static NO_RELATIONS: [RelationshipInfo; 0] = [];
static PRODUCT_RELATIONS: [RelationshipInfo; 4] = [
    RelationshipInfo::many_to_one("product_class", &CLASS, "product_class_id"),
    RelationshipInfo::many_to_one("parent", &PRODUCT, "parent_id").must_exist(true),
    RelationshipInfo::one_to_many("images", &IMAGE, "product_id"),
    RelationshipInfo::many_to_many(
        "categories",
        &CATEGORY,
        LinkTableInfo::new(&PRODUCT_CATEGORY, "product_id", "category_id"),
    ),
];
static NODE_RELATIONS: [RelationshipInfo; 1] =
    [RelationshipInfo::many_to_one("parent", &NODE, "parent_id")];

pub static CLASS: EntitySchema =
    EntitySchema::new("ProductClass", "productclass", &CLASS_FIELDS, &NO_RELATIONS, None);
pub static PRODUCT: EntitySchema =
    EntitySchema::new("Product", "product", &PRODUCT_FIELDS, &PRODUCT_RELATIONS, None);
pub static IMAGE: EntitySchema =
    EntitySchema::new("ProductImage", "productimage", &IMAGE_FIELDS, &NO_RELATIONS, None);
pub static CATEGORY: EntitySchema =
    EntitySchema::new("Category", "category", &CATEGORY_FIELDS, &NO_RELATIONS, None);
pub static PRODUCT_CATEGORY: EntitySchema = EntitySchema::new(
    "ProductCategory",
    "productcategory",
    &PRODUCT_CATEGORY_FIELDS,
    &NO_RELATIONS,
    None,
);
pub static NODE: EntitySchema =
    EntitySchema::new("Node", "node", &NODE_FIELDS, &NODE_RELATIONS, None);

#[derive(Debug, Clone, Default)]
pub struct ImageRes {
    pub code: Option<String>,
    pub original: Option<String>,
}

static IMAGE_RES_FIELDS: [FieldInfo; 2] = [
    FieldInfo::new("code", FieldKind::Text).nullable(true),
    FieldInfo::new("original", FieldKind::Text).nullable(true),
];

impl Resource for ImageRes {
    const NAME: &'static str = "Image";

    fn fields() -> &'static [FieldInfo] {
        &IMAGE_RES_FIELDS
    }

    fn field_value(&self, name: &str) -> Option<Value> {
        let value = match name {
            "code" => self.code.as_deref(),
            "original" => self.original.as_deref(),
            _ => return None,
        };
        Some(value.map_or(Value::Null, Value::from))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductRes {
    pub upc: String,
    pub title: String,
    pub class: Option<String>,
    pub parent: Option<String>,
    pub images: Option<Vec<ImageRes>>,
    pub categories: Option<Vec<String>>,
}

static PRODUCT_RES_FIELDS: [FieldInfo; 2] = [
    FieldInfo::new("upc", FieldKind::Text).max_length(16),
    FieldInfo::new("title", FieldKind::Text),
];

impl Resource for ProductRes {
    const NAME: &'static str = "Product";

    fn fields() -> &'static [FieldInfo] {
        &PRODUCT_RES_FIELDS
    }

    fn field_value(&self, name: &str) -> Option<Value> {
        match name {
            "upc" => Some(Value::from(self.upc.as_str())),
            "title" => Some(Value::from(self.title.as_str())),
            _ => None,
        }
    }
}

pub fn product(upc: &str, title: &str) -> ProductRes {
    ProductRes {
        upc: upc.into(),
        title: title.into(),
        ..ProductRes::default()
    }
}

pub fn image(code: &str) -> ImageRes {
    ImageRes {
        code: Some(code.into()),
        original: Some(format!("{code}.jpg")),
    }
}

pub struct ImageMapper;

impl ReverseMapper for ImageMapper {
    type Resource = ImageRes;

    fn entity(&self) -> &'static EntitySchema {
        &IMAGE
    }

    fn rules(&self) -> &[MappingRule<ImageRes>] {
        &[]
    }
}

fn product_class(res: &ProductRes, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    let Some(slug) = &res.class else {
        return Ok(vec![Mapped::One(None)]);
    };
    let id = ctx.register(&CLASS, vec![("slug", Mapped::Scalar(Value::from(slug.as_str())))])?;
    Ok(vec![Mapped::One(Some(id))])
}

fn parent(res: &ProductRes, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    let Some(upc) = &res.parent else {
        return Ok(vec![Mapped::One(None)]);
    };
    let id = ctx.register(
        &PRODUCT,
        vec![
            ("upc", Mapped::Scalar(Value::from(upc.as_str()))),
            ("structure", Mapped::Scalar(Value::from("parent"))),
        ],
    )?;
    Ok(vec![Mapped::One(Some(id))])
}

fn images(res: &ProductRes, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    let ids = match &res.images {
        Some(images) => Some(ImageMapper.map_all(images, ctx)?),
        None => None,
    };
    Ok(vec![Mapped::Many(ids)])
}

fn categories(res: &ProductRes, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    let Some(codes) = &res.categories else {
        return Ok(vec![Mapped::Many(None)]);
    };
    let mut ids = Vec::with_capacity(codes.len());
    for code in codes {
        ids.push(ctx.register(
            &CATEGORY,
            vec![
                ("code", Mapped::Scalar(Value::from(code.as_str()))),
                ("name", Mapped::Scalar(Value::from(code.to_uppercase()))),
            ],
        )?);
    }
    Ok(vec![Mapped::Many(Some(ids))])
}

static PRODUCT_RULES: [MappingRule<ProductRes>; 4] = [
    MappingRule::assign(&["product_class"], product_class),
    MappingRule::assign(&["parent"], parent),
    MappingRule::assign(&["images"], images),
    MappingRule::assign(&["categories"], categories),
];

pub struct ProductMapper;

impl ReverseMapper for ProductMapper {
    type Resource = ProductRes;

    fn entity(&self) -> &'static EntitySchema {
        &PRODUCT
    }

    fn rules(&self) -> &[MappingRule<ProductRes>] {
        &PRODUCT_RULES
    }
}

#[derive(Debug, Clone)]
pub struct NodeRes {
    pub name: String,
    pub parent: Option<String>,
}

static NODE_RES_FIELDS: [FieldInfo; 1] = [FieldInfo::new("name", FieldKind::Text)];

impl Resource for NodeRes {
    const NAME: &'static str = "Node";

    fn fields() -> &'static [FieldInfo] {
        &NODE_RES_FIELDS
    }

    fn field_value(&self, name: &str) -> Option<Value> {
        (name == "name").then(|| Value::from(self.name.as_str()))
    }
}

fn node_parent(res: &NodeRes, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
    let Some(name) = &res.parent else {
        return Ok(vec![Mapped::One(None)]);
    };
    let id = ctx.register(&NODE, vec![("name", Mapped::Scalar(Value::from(name.as_str())))])?;
    Ok(vec![Mapped::One(Some(id))])
}

static NODE_RULES: [MappingRule<NodeRes>; 1] = [MappingRule::assign(&["parent"], node_parent)];

pub struct NodeMapper;

impl ReverseMapper for NodeMapper {
    type Resource = NodeRes;

    fn entity(&self) -> &'static EntitySchema {
        &NODE
    }

    fn rules(&self) -> &[MappingRule<NodeRes>] {
        &NODE_RULES
    }
}
