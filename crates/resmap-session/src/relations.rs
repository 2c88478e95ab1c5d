//! Relation graph extraction.
//!
//! A reverse mapper produces a flat list of named values for one entity.
//! [`extract`] separates the ones that name relations from the plain columns
//! before the entity is built, so the entity only ever receives scalar and
//! foreign key values and the relations can be registered with the mapper
//! context once the owner exists.

use resmap_core::{ConfigError, EntitySchema, Error, Record, RelationshipInfo, Result, Value};

use crate::instance::InstanceId;

/// A value produced by a mapping rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapped {
    /// A column value, or the raw key of a foreign key relation.
    Scalar(Value),
    /// A single related instance. `None` clears a foreign key.
    One(Option<InstanceId>),
    /// Related instances of a to-many relation. `None` leaves the relation
    /// untouched; an empty list clears it.
    Many(Option<Vec<InstanceId>>),
    /// Data handled by a domain phase instead of being persisted as a column.
    Side(serde_json::Value),
}

/// The values of one entity, split by destination.
#[derive(Debug, Default)]
pub struct Extracted {
    pub record: Record,
    /// Foreign key relations pointing at mapped instances.
    pub links: Vec<(&'static RelationshipInfo, InstanceId)>,
    /// Reverse relations whose items point back at the owner.
    pub children: Vec<(&'static RelationshipInfo, Vec<InstanceId>)>,
    pub many_to_many: Vec<(&'static RelationshipInfo, Vec<InstanceId>)>,
    pub side_values: Vec<(&'static str, serde_json::Value)>,
}

impl Extracted {
    /// Whether any relation or side value was collected.
    pub fn has_relations(&self) -> bool {
        !self.links.is_empty()
            || !self.children.is_empty()
            || !self.many_to_many.is_empty()
            || !self.side_values.is_empty()
    }
}

/// Split `values` for an entity of type `schema`.
pub fn extract(schema: &'static EntitySchema, values: Vec<(&'static str, Mapped)>) -> Result<Extracted> {
    let relations = schema.relation_set();
    let mut out = Extracted::default();

    for (name, value) in values {
        if let Mapped::Side(data) = value {
            out.side_values.push((name, data));
            continue;
        }
        if let Some(relation) = relations.get(name) {
            extract_relation(schema, relation, value, &mut out)?;
            continue;
        }
        match (schema.field(name), value) {
            (Some(field), Mapped::Scalar(v)) => {
                out.record.set(field.name, v);
            }
            (Some(_), _) => {
                return Err(mismatch(schema, name, "a scalar value"));
            }
            (None, _) => {
                return Err(Error::Config(ConfigError {
                    message: format!("{} has no field or relation named '{}'", schema.name, name),
                }));
            }
        }
    }
    Ok(out)
}

fn extract_relation(
    schema: &'static EntitySchema,
    relation: &'static RelationshipInfo,
    value: Mapped,
    out: &mut Extracted,
) -> Result<()> {
    if relation.is_foreign_key() {
        let Some(column) = relation.local_key else {
            return Ok(());
        };
        match value {
            Mapped::One(Some(target)) => out.links.push((relation, target)),
            Mapped::One(None) => {
                out.record.set(column, Value::Null);
            }
            Mapped::Scalar(key) => {
                out.record.set(column, key);
            }
            _ => return Err(mismatch(schema, relation.name, "a single instance")),
        }
    } else if relation.is_reverse() || relation.is_many_to_many() {
        let items = match value {
            Mapped::Many(Some(items)) => items,
            Mapped::One(Some(item)) => vec![item],
            Mapped::Many(None) | Mapped::One(None) => return Ok(()),
            _ => return Err(mismatch(schema, relation.name, "related instances")),
        };
        if relation.is_many_to_many() {
            out.many_to_many.push((relation, items));
        } else {
            out.children.push((relation, items));
        }
    } else {
        return Err(Error::Config(ConfigError {
            message: format!(
                "relation '{}' of {} has no key to save through",
                relation.name, schema.name
            ),
        }));
    }
    Ok(())
}

fn mismatch(schema: &EntitySchema, name: &str, expected: &str) -> Error {
    Error::Config(ConfigError {
        message: format!("'{}' of {} expects {}", name, schema.name, expected),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use resmap_core::{FieldInfo, FieldKind, LinkTableInfo};

    static CATEGORY_FIELDS: [FieldInfo; 2] = [
        FieldInfo::pk("id"),
        FieldInfo::new("code", FieldKind::Text),
    ];
    static IMAGE_FIELDS: [FieldInfo; 2] = [
        FieldInfo::pk("id"),
        FieldInfo::fk("product_id", "Product"),
    ];
    static LINK_FIELDS: [FieldInfo; 3] = [
        FieldInfo::pk("id"),
        FieldInfo::fk("product_id", "Product"),
        FieldInfo::fk("category_id", "Category"),
    ];
    static PRODUCT_FIELDS: [FieldInfo; 3] = [
        FieldInfo::pk("id"),
        FieldInfo::new("upc", FieldKind::Text),
        FieldInfo::fk("parent_id", "Product").nullable(true),
    ];
    static NO_RELATIONS: [RelationshipInfo; 0] = [];
    static PRODUCT_RELATIONS: [RelationshipInfo; 3] = [
        RelationshipInfo::many_to_one("parent", &PRODUCT, "parent_id"),
        RelationshipInfo::one_to_many("images", &IMAGE, "product_id"),
        RelationshipInfo::many_to_many(
            "categories",
            &CATEGORY,
            LinkTableInfo::new(&LINK, "product_id", "category_id"),
        ),
    ];
    static CATEGORY: EntitySchema =
        EntitySchema::new("Category", "category", &CATEGORY_FIELDS, &NO_RELATIONS, None);
    static IMAGE: EntitySchema =
        EntitySchema::new("ProductImage", "productimage", &IMAGE_FIELDS, &NO_RELATIONS, None);
    static LINK: EntitySchema =
        EntitySchema::new("ProductCategory", "productcategory", &LINK_FIELDS, &NO_RELATIONS, None);
    static PRODUCT: EntitySchema =
        EntitySchema::new("Product", "product", &PRODUCT_FIELDS, &PRODUCT_RELATIONS, None);

    fn ids(instances: &mut crate::instance::Instances, count: usize) -> Vec<InstanceId> {
        (0..count)
            .map(|_| instances.add(crate::instance::Instance::new(&IMAGE, Record::new())))
            .collect()
    }

    #[test]
    fn test_relations_are_split_from_columns() {
        let mut instances = crate::instance::Instances::new();
        let items = ids(&mut instances, 3);
        let extracted = extract(
            &PRODUCT,
            vec![
                ("upc", Mapped::Scalar(Value::from("A"))),
                ("parent", Mapped::One(Some(items[0]))),
                ("images", Mapped::Many(Some(vec![items[1]]))),
                ("categories", Mapped::Many(Some(vec![items[2]]))),
                ("attributes", Mapped::Side(serde_json::json!({"size": 4}))),
            ],
        )
        .unwrap();

        assert_eq!(extracted.record.len(), 1);
        assert_eq!(extracted.record.value("upc"), &Value::from("A"));
        assert_eq!(extracted.links[0].1, items[0]);
        assert_eq!(extracted.children[0].0.name, "images");
        assert_eq!(extracted.many_to_many[0].1, vec![items[2]]);
        assert_eq!(extracted.side_values[0].0, "attributes");
    }

    #[test]
    fn test_absent_and_cleared_relations() {
        let extracted = extract(
            &PRODUCT,
            vec![
                ("parent", Mapped::One(None)),
                ("images", Mapped::Many(None)),
                ("categories", Mapped::Many(Some(Vec::new()))),
            ],
        )
        .unwrap();
        assert_eq!(extracted.record.value("parent_id"), &Value::Null);
        assert!(extracted.children.is_empty());
        assert_eq!(extracted.many_to_many.len(), 1);
        assert!(extracted.many_to_many[0].1.is_empty());
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        let result = extract(&PRODUCT, vec![("colour", Mapped::Scalar(Value::Null))]);
        assert!(matches!(result, Err(Error::Config(_))));

        let result = extract(&PRODUCT, vec![("images", Mapped::Scalar(Value::Null))]);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
