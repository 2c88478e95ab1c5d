//! Rule-driven reverse mapping from resources to entity instances.
//!
//! A reverse mapper is a list of [`MappingRule`]s evaluated by
//! [`map_resource`]. Resource fields that are also entity fields and that no
//! rule mentions are copied as they are.

use resmap_core::{EntitySchema, Error, Resource, Result, Value};

use crate::context::MapperContext;
use crate::instance::InstanceId;
use crate::relations::Mapped;

/// Conversion from resource values to entity values.
pub type ConvertFn = fn(&[Value]) -> Result<Vec<Value>>;

/// Mapping that needs the whole resource or the context, typically to map
/// nested resources.
pub type AssignFn<R> = fn(&R, &mut MapperContext) -> Result<Vec<Mapped>>;

/// What a rule does with its source values.
pub enum RuleAction<R> {
    /// Copy source values to the targets position by position.
    Copy,
    Convert(ConvertFn),
    Assign(AssignFn<R>),
}

/// One `(sources, transform, targets)` mapping rule.
pub struct MappingRule<R> {
    /// Resource fields read by the rule.
    pub from: &'static [&'static str],
    /// Entity fields or relations written by the rule.
    pub to: &'static [&'static str],
    pub action: RuleAction<R>,
}

impl<R> MappingRule<R> {
    pub const fn copy(from: &'static [&'static str], to: &'static [&'static str]) -> Self {
        Self {
            from,
            to,
            action: RuleAction::Copy,
        }
    }

    pub const fn convert(
        from: &'static [&'static str],
        to: &'static [&'static str],
        f: ConvertFn,
    ) -> Self {
        Self {
            from,
            to,
            action: RuleAction::Convert(f),
        }
    }

    pub const fn assign(to: &'static [&'static str], f: AssignFn<R>) -> Self {
        Self {
            from: &[],
            to,
            action: RuleAction::Assign(f),
        }
    }

    fn mentions(&self, name: &str) -> bool {
        self.from.contains(&name) || self.to.contains(&name)
    }
}

/// Maps one resource type onto one entity type.
pub trait ReverseMapper {
    type Resource: Resource;

    /// The entity type produced.
    fn entity(&self) -> &'static EntitySchema;

    fn rules(&self) -> &[MappingRule<Self::Resource>];

    /// Map `resource` into a new instance registered with `ctx`.
    fn map(&self, resource: &Self::Resource, ctx: &mut MapperContext) -> Result<InstanceId> {
        map_resource(self.entity(), self.rules(), resource, ctx)
    }

    /// Map every item of a nested list.
    fn map_all(&self, resources: &[Self::Resource], ctx: &mut MapperContext) -> Result<Vec<InstanceId>> {
        resources.iter().map(|r| self.map(r, ctx)).collect()
    }
}

/// Evaluate `rules` against `resource` and register the resulting instance.
pub fn map_resource<R: Resource>(
    entity: &'static EntitySchema,
    rules: &[MappingRule<R>],
    resource: &R,
    ctx: &mut MapperContext,
) -> Result<InstanceId> {
    let mut values: Vec<(&'static str, Mapped)> = Vec::new();

    for field in R::fields() {
        if field.primary_key
            || !entity.has_field(field.name)
            || rules.iter().any(|rule| rule.mentions(field.name))
        {
            continue;
        }
        // an unset resource field leaves the column to its default
        match resource.field_value(field.name) {
            Some(Value::Null) | None => {}
            Some(value) => values.push((field.name, Mapped::Scalar(value))),
        }
    }

    for rule in rules {
        let produced: Vec<Mapped> = match &rule.action {
            RuleAction::Copy => source_values(rule, resource)
                .into_iter()
                .map(Mapped::Scalar)
                .collect(),
            RuleAction::Convert(f) => f(&source_values(rule, resource))?
                .into_iter()
                .map(Mapped::Scalar)
                .collect(),
            RuleAction::Assign(f) => f(resource, ctx)?,
        };
        if produced.len() != rule.to.len() {
            return Err(Error::Custom(format!(
                "{} rule for {:?} produced {} values",
                R::NAME,
                rule.to,
                produced.len()
            )));
        }
        values.extend(rule.to.iter().copied().zip(produced));
    }

    ctx.register(entity, values)
}

fn source_values<R: Resource>(rule: &MappingRule<R>, resource: &R) -> Vec<Value> {
    rule.from
        .iter()
        .map(|name| resource.field_value(name).unwrap_or(Value::Null))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use resmap_core::{FieldInfo, FieldKind, RelationshipInfo};

    static IMAGE_FIELDS: [FieldInfo; 4] = [
        FieldInfo::pk("id"),
        FieldInfo::fk("product_id", "Product"),
        FieldInfo::new("original", FieldKind::Text),
        FieldInfo::new("caption", FieldKind::Text).blank(true),
    ];
    static PRODUCT_FIELDS: [FieldInfo; 3] = [
        FieldInfo::pk("id"),
        FieldInfo::new("upc", FieldKind::Text),
        FieldInfo::new("title", FieldKind::Text),
    ];
    static NO_RELATIONS: [RelationshipInfo; 0] = [];
    static PRODUCT_RELATIONS: [RelationshipInfo; 1] =
        [RelationshipInfo::one_to_many("images", &IMAGE, "product_id")];
    static IMAGE: EntitySchema =
        EntitySchema::new("ProductImage", "productimage", &IMAGE_FIELDS, &NO_RELATIONS, None);
    static PRODUCT: EntitySchema =
        EntitySchema::new("Product", "product", &PRODUCT_FIELDS, &PRODUCT_RELATIONS, None);

    struct ImageResource {
        original: String,
        caption: Option<String>,
    }

    static IMAGE_RESOURCE_FIELDS: [FieldInfo; 2] = [
        FieldInfo::new("original", FieldKind::Text),
        FieldInfo::new("caption", FieldKind::Text).nullable(true),
    ];

    impl Resource for ImageResource {
        const NAME: &'static str = "Image";

        fn fields() -> &'static [FieldInfo] {
            &IMAGE_RESOURCE_FIELDS
        }

        fn field_value(&self, name: &str) -> Option<Value> {
            match name {
                "original" => Some(Value::from(self.original.as_str())),
                "caption" => Some(self.caption.clone().map_or(Value::Null, Value::from)),
                _ => None,
            }
        }
    }

    struct ProductResource {
        upc: String,
        name: String,
        images: Vec<ImageResource>,
    }

    static PRODUCT_RESOURCE_FIELDS: [FieldInfo; 2] = [
        FieldInfo::new("upc", FieldKind::Text),
        FieldInfo::new("name", FieldKind::Text),
    ];

    impl Resource for ProductResource {
        const NAME: &'static str = "Product";

        fn fields() -> &'static [FieldInfo] {
            &PRODUCT_RESOURCE_FIELDS
        }

        fn field_value(&self, name: &str) -> Option<Value> {
            match name {
                "upc" => Some(Value::from(self.upc.as_str())),
                "name" => Some(Value::from(self.name.as_str())),
                _ => None,
            }
        }
    }

    struct ImageMapper;

    impl ReverseMapper for ImageMapper {
        type Resource = ImageResource;

        fn entity(&self) -> &'static EntitySchema {
            &IMAGE
        }

        fn rules(&self) -> &[MappingRule<ImageResource>] {
            &[]
        }
    }

    fn upper(values: &[Value]) -> Result<Vec<Value>> {
        Ok(values
            .iter()
            .map(|v| Value::from(v.to_string().to_uppercase()))
            .collect())
    }

    fn images(resource: &ProductResource, ctx: &mut MapperContext) -> Result<Vec<Mapped>> {
        let ids = ImageMapper.map_all(&resource.images, ctx)?;
        Ok(vec![Mapped::Many(Some(ids))])
    }

    struct ProductMapper {
        rules: Vec<MappingRule<ProductResource>>,
    }

    impl ProductMapper {
        fn new() -> Self {
            Self {
                rules: vec![
                    MappingRule::copy(&["name"], &["title"]),
                    MappingRule::convert(&["upc"], &["upc"], upper),
                    MappingRule::assign(&["images"], images),
                ],
            }
        }
    }

    impl ReverseMapper for ProductMapper {
        type Resource = ProductResource;

        fn entity(&self) -> &'static EntitySchema {
            &PRODUCT
        }

        fn rules(&self) -> &[MappingRule<ProductResource>] {
            &self.rules
        }
    }

    #[test]
    fn test_rules_and_nested_resources() {
        let resource = ProductResource {
            upc: "abc".into(),
            name: "Shirt".into(),
            images: vec![
                ImageResource {
                    original: "a.jpg".into(),
                    caption: None,
                },
                ImageResource {
                    original: "b.jpg".into(),
                    caption: Some("back".into()),
                },
            ],
        };
        let mut ctx = MapperContext::new(&PRODUCT);
        let id = ProductMapper::new().map(&resource, &mut ctx).unwrap();

        let product = ctx.instance(id);
        assert_eq!(product.record.value("title"), &Value::from("Shirt"));
        assert_eq!(product.record.value("upc"), &Value::from("ABC"));
        assert_eq!(ctx.instances().len(), 3);

        let (_, owned) = ctx.one_to_many().iter().next().unwrap();
        assert_eq!(owned[0].owner, id);
        let first = ctx.instance(owned[0].items[0]);
        assert_eq!(first.record.value("original"), &Value::from("a.jpg"));
        assert!(!first.record.contains("caption"));
        let second = ctx.instance(owned[0].items[1]);
        assert_eq!(second.record.value("caption"), &Value::from("back"));
    }

    #[test]
    fn test_rule_arity_is_checked() {
        fn nothing(_: &[Value]) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }
        let rules = [MappingRule::<ImageResource>::convert(&["original"], &["original"], nothing)];
        let resource = ImageResource {
            original: "a.jpg".into(),
            caption: None,
        };
        let mut ctx = MapperContext::new(&IMAGE);
        assert!(map_resource(&IMAGE, &rules, &resource, &mut ctx).is_err());
    }
}
