//! Product attribute values.
//!
//! Attributes are free-form `code -> value` bags on product resources. The
//! codes a product may use are the [`PRODUCT_ATTRIBUTE`] definitions of its
//! product class, and each definition's type decides which typed column of
//! [`PRODUCT_ATTRIBUTE_VALUE`] holds the value. Child products use the class
//! of their parent.

use std::collections::{BTreeSet, HashMap};

use resmap_core::date::parse_date;
use resmap_core::{Filter, Record, Result, Storage, ValidationError, Value};
use resmap_query::{create_in_batches, delete_in_batches, select_in_batches, update_in_batches};
use resmap_session::{DomainPhase, InstanceId, MapperContext, SaveSummary, UpsertConfig};

use crate::mappers::ATTRIBUTES;
use crate::schema::{PRODUCT, PRODUCT_ATTRIBUTE, PRODUCT_ATTRIBUTE_VALUE};

/// Attribute values are written in statements of at most this many rows.
pub const ATTRIBUTE_BATCH_SIZE: usize = 500;

/// The typed value column used by an attribute type.
pub fn value_column(attribute_type: &str) -> Option<&'static str> {
    let column = match attribute_type {
        "text" => "value_text",
        "richtext" => "value_richtext",
        "integer" => "value_integer",
        "boolean" => "value_boolean",
        "float" => "value_float",
        "date" => "value_date",
        _ => return None,
    };
    Some(column)
}

/// Convert a JSON attribute value for an attribute of type `attribute_type`.
pub fn coerce(attribute_type: &str, value: &serde_json::Value) -> std::result::Result<Value, String> {
    use serde_json::Value as Json;

    let invalid = || format!("'{value}' is not a valid {attribute_type} value");
    match (attribute_type, value) {
        ("text" | "richtext", Json::String(s)) => Ok(Value::Text(s.clone())),
        ("text" | "richtext", Json::Number(n)) => Ok(Value::Text(n.to_string())),
        ("integer", Json::Number(n)) => n.as_i64().map(Value::BigInt).ok_or_else(invalid),
        ("integer", Json::String(s)) => s.trim().parse().map(Value::BigInt).map_err(|_| invalid()),
        ("boolean", Json::Bool(b)) => Ok(Value::Bool(*b)),
        ("boolean", Json::String(s)) => match s.as_str() {
            "true" | "True" | "1" => Ok(Value::Bool(true)),
            "false" | "False" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        ("float", Json::Number(n)) => n.as_f64().map(Value::Double).ok_or_else(invalid),
        ("float", Json::String(s)) => s.trim().parse().map(Value::Double).map_err(|_| invalid()),
        ("date", Json::String(s)) => parse_date(s)
            .map(Value::Date)
            .ok_or_else(|| format!("'{s}' is not a valid date, expected YYYY-MM-DD")),
        _ => Err(invalid()),
    }
}

struct Definition {
    pk: i64,
    column: &'static str,
    attribute_type: String,
}

/// Saves the attribute bags collected by the product mapper.
///
/// Runs after the products are saved, so every product it sees has a key
/// and its stored product class.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProductAttributePhase;

impl DomainPhase for ProductAttributePhase {
    fn name(&self) -> &'static str {
        "product attributes"
    }

    #[tracing::instrument(level = "debug", skip_all, fields(bags = ctx.side_values(ATTRIBUTES).len()))]
    fn run(
        &self,
        storage: &mut dyn Storage,
        ctx: &mut MapperContext,
        config: &UpsertConfig,
    ) -> Result<SaveSummary> {
        let mut summary = SaveSummary::new();
        let bags: Vec<(InstanceId, i64, serde_json::Map<String, serde_json::Value>)> = ctx
            .side_values(ATTRIBUTES)
            .iter()
            .filter_map(|(id, data)| {
                let bag = data.as_object()?;
                let pk = ctx.pk(*id)?;
                Some((*id, pk, bag.clone()))
            })
            .collect();
        if bags.is_empty() {
            return Ok(summary);
        }

        let product_keys: Vec<i64> = bags.iter().map(|(_, pk, _)| *pk).collect();
        let classes = product_classes(storage, &product_keys, config.batch_size)?;
        let definitions = load_definitions(storage, &classes, config.batch_size)?;
        let existing = load_values(storage, &product_keys, config.batch_size)?;

        let mut to_create = Vec::new();
        let mut to_update: Vec<(i64, Record)> = Vec::new();
        let mut update_columns: BTreeSet<&'static str> = BTreeSet::new();
        let mut to_delete = Vec::new();

        for (id, product, bag) in bags {
            let class = classes.get(&product).copied();
            let mut errors = ValidationError::new();
            let mut creates = Vec::new();
            let mut updates = Vec::new();
            let mut deletes = Vec::new();

            for (code, raw) in &bag {
                let Some(definition) = class.and_then(|c| definitions.get(&(c, code.clone()))) else {
                    tracing::warn!(product, code = %code, "Skipping unknown product attribute");
                    continue;
                };
                let stored = existing.get(&(product, definition.pk)).copied();
                if raw.is_null() {
                    if let Some(value_pk) = stored.filter(|_| config.delete_related) {
                        deletes.push(Value::BigInt(value_pk));
                    }
                    continue;
                }
                let value = match coerce(&definition.attribute_type, raw) {
                    Ok(value) => value,
                    Err(message) => {
                        errors.add_custom(ATTRIBUTES, format!("{code}: {message}"));
                        continue;
                    }
                };
                let mut record = Record::new();
                record.set(definition.column, value);
                match stored {
                    Some(value_pk) => updates.push((value_pk, definition.column, record)),
                    None => {
                        record.set("product_id", product);
                        record.set("attribute_id", definition.pk);
                        creates.push(record);
                    }
                }
            }

            if !errors.is_empty() {
                ctx.record_error(id, errors, config);
                continue;
            }
            to_create.extend(creates);
            for (value_pk, column, record) in updates {
                update_columns.insert(column);
                to_update.push((value_pk, record));
            }
            to_delete.extend(deletes);
        }

        if !to_delete.is_empty() {
            let deleted = delete_in_batches(
                storage,
                &PRODUCT_ATTRIBUTE_VALUE,
                PRODUCT_ATTRIBUTE_VALUE.pk_column(),
                &to_delete,
                &Filter::All,
                ATTRIBUTE_BATCH_SIZE,
            )?;
            summary.deleted += usize::try_from(deleted).unwrap_or(usize::MAX);
        }
        if !to_update.is_empty() {
            let rows: Vec<(i64, &Record)> = to_update.iter().map(|(pk, r)| (*pk, r)).collect();
            let columns: Vec<&'static str> = update_columns.into_iter().collect();
            update_in_batches(
                storage,
                &PRODUCT_ATTRIBUTE_VALUE,
                &rows,
                &columns,
                ATTRIBUTE_BATCH_SIZE,
            )?;
            summary.updated += rows.len();
        }
        if !to_create.is_empty() {
            create_in_batches(
                storage,
                &PRODUCT_ATTRIBUTE_VALUE,
                &to_create,
                ATTRIBUTE_BATCH_SIZE,
            )?;
            summary.created += to_create.len();
        }
        Ok(summary)
    }
}

/// Product class of each product, falling back to the parent's class.
fn product_classes(
    storage: &mut dyn Storage,
    products: &[i64],
    batch_size: usize,
) -> Result<HashMap<i64, i64>> {
    let keys: Vec<Value> = products.iter().map(|pk| Value::BigInt(*pk)).collect();
    let rows = select_in_batches(storage, &PRODUCT, "id", &keys, &Filter::All, batch_size)?;

    let mut classes = HashMap::with_capacity(rows.len());
    let mut orphans: Vec<(i64, i64)> = Vec::new();
    for row in &rows {
        let pk = row.pk("id")?;
        let class = row.get_by_name("product_class_id").and_then(Value::as_i64);
        let parent = row.get_by_name("parent_id").and_then(Value::as_i64);
        match (class, parent) {
            (Some(class), _) => {
                classes.insert(pk, class);
            }
            (None, Some(parent)) => orphans.push((pk, parent)),
            (None, None) => {}
        }
    }
    if orphans.is_empty() {
        return Ok(classes);
    }

    let parent_keys: Vec<Value> = orphans
        .iter()
        .map(|(_, parent)| *parent)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(Value::BigInt)
        .collect();
    let parents = select_in_batches(storage, &PRODUCT, "id", &parent_keys, &Filter::All, batch_size)?;
    let mut parent_classes = HashMap::with_capacity(parents.len());
    for row in &parents {
        if let Some(class) = row.get_by_name("product_class_id").and_then(Value::as_i64) {
            parent_classes.insert(row.pk("id")?, class);
        }
    }
    for (pk, parent) in orphans {
        if let Some(class) = parent_classes.get(&parent) {
            classes.insert(pk, *class);
        }
    }
    Ok(classes)
}

/// Attribute definitions of every distinct class, keyed by `(class, code)`.
fn load_definitions(
    storage: &mut dyn Storage,
    classes: &HashMap<i64, i64>,
    batch_size: usize,
) -> Result<HashMap<(i64, String), Definition>> {
    let distinct: BTreeSet<i64> = classes.values().copied().collect();
    let keys: Vec<Value> = distinct.into_iter().map(Value::BigInt).collect();
    let rows = select_in_batches(
        storage,
        &PRODUCT_ATTRIBUTE,
        "product_class_id",
        &keys,
        &Filter::All,
        batch_size,
    )?;

    let mut definitions = HashMap::with_capacity(rows.len());
    for row in &rows {
        let class: i64 = row.get_named("product_class_id")?;
        let code: String = row.get_named("code")?;
        let attribute_type: String = row.get_named("type")?;
        let Some(column) = value_column(&attribute_type) else {
            tracing::warn!(code = %code, attribute_type = %attribute_type, "Unsupported attribute type");
            continue;
        };
        definitions.insert(
            (class, code),
            Definition {
                pk: row.pk("id")?,
                column,
                attribute_type,
            },
        );
    }
    Ok(definitions)
}

/// Stored value rows, keyed by `(product, attribute)`.
fn load_values(
    storage: &mut dyn Storage,
    products: &[i64],
    batch_size: usize,
) -> Result<HashMap<(i64, i64), i64>> {
    let keys: Vec<Value> = products.iter().map(|pk| Value::BigInt(*pk)).collect();
    let rows = select_in_batches(
        storage,
        &PRODUCT_ATTRIBUTE_VALUE,
        "product_id",
        &keys,
        &Filter::All,
        batch_size,
    )?;
    let mut values = HashMap::with_capacity(rows.len());
    for row in &rows {
        let product: i64 = row.get_named("product_id")?;
        let attribute: i64 = row.get_named("attribute_id")?;
        values.insert((product, attribute), row.pk("id")?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use resmap_memory::{MemoryStore, StatementKind};

    use crate::resources::{ProductClassResource, ProductRefResource, ProductResource};
    use crate::schema::PRODUCT_CLASS;
    use crate::{default_upsert_config, products_to_db};

    fn seed(store: &mut MemoryStore) -> i64 {
        let mut class = Record::new();
        class.set("name", "Shirts");
        class.set("slug", "shirts");
        let class_pk = store.create_many(&PRODUCT_CLASS, &[class]).unwrap()[0].unwrap();

        let definitions: Vec<Record> = [("size", "integer"), ("colour", "text"), ("launch", "date")]
            .into_iter()
            .map(|(code, attribute_type)| {
                let mut record = Record::new();
                record.set("product_class_id", class_pk);
                record.set("code", code);
                record.set("type", attribute_type);
                record
            })
            .collect();
        store.create_many(&PRODUCT_ATTRIBUTE, &definitions).unwrap();
        class_pk
    }

    fn shirt(upc: &str, attributes: &[(&str, serde_json::Value)]) -> ProductResource {
        ProductResource {
            product_class: Some(ProductClassResource {
                slug: "shirts".into(),
                ..ProductClassResource::default()
            }),
            attributes: Some(
                attributes
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), v.clone()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..ProductResource::new(upc, "Shirt")
        }
    }

    fn stored_values(store: &MemoryStore) -> Vec<(i64, Value, Value)> {
        store
            .rows(&PRODUCT_ATTRIBUTE_VALUE)
            .iter()
            .map(|row| {
                (
                    row.get_named::<i64>("attribute_id").unwrap(),
                    row.get_by_name("value_integer").cloned().unwrap_or(Value::Null),
                    row.get_by_name("value_text").cloned().unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    #[test]
    fn test_coerce_by_attribute_type() {
        use serde_json::json;
        assert_eq!(coerce("integer", &json!("42")), Ok(Value::BigInt(42)));
        assert_eq!(coerce("boolean", &json!(true)), Ok(Value::Bool(true)));
        assert_eq!(coerce("float", &json!(1.5)), Ok(Value::Double(1.5)));
        assert_eq!(coerce("text", &json!(7)), Ok(Value::Text("7".into())));
        assert!(matches!(coerce("date", &json!("2024-02-29")), Ok(Value::Date(_))));
        assert!(coerce("date", &json!("29/02/2024")).unwrap_err().contains("YYYY-MM-DD"));
        assert!(coerce("integer", &json!("large")).is_err());
        assert_eq!(value_column("richtext"), Some("value_richtext"));
        assert_eq!(value_column("option"), None);
    }

    #[test]
    fn test_values_are_created_then_updated() {
        let mut store = MemoryStore::new();
        seed(&mut store);
        let config = default_upsert_config();

        let products = vec![shirt("A", &[("size", serde_json::json!(4)), ("colour", serde_json::json!("red"))])];
        let outcome = products_to_db(&mut store, &products, &config).unwrap();
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        assert_eq!(store.count(&PRODUCT_ATTRIBUTE_VALUE), 2);

        let products = vec![shirt("A", &[("size", serde_json::json!(5))])];
        let outcome = products_to_db(&mut store, &products, &config).unwrap();
        assert!(outcome.is_clean());
        let values = stored_values(&store);
        assert_eq!(values.len(), 2);
        assert!(values.iter().any(|(_, int, _)| *int == Value::BigInt(5)));
        assert!(values.iter().any(|(_, _, text)| *text == Value::Text("red".into())));
    }

    #[test]
    fn test_null_deletes_only_with_delete_related() {
        let mut store = MemoryStore::new();
        seed(&mut store);
        let config = default_upsert_config();
        products_to_db(&mut store, &[shirt("A", &[("colour", serde_json::json!("red"))])], &config)
            .unwrap();

        let cleared = [shirt("A", &[("colour", serde_json::Value::Null)])];
        products_to_db(&mut store, &cleared, &config).unwrap();
        assert_eq!(store.count(&PRODUCT_ATTRIBUTE_VALUE), 1);

        let config = default_upsert_config().delete_related(true);
        let outcome = products_to_db(&mut store, &cleared, &config).unwrap();
        assert_eq!(store.count(&PRODUCT_ATTRIBUTE_VALUE), 0);
        assert_eq!(outcome.summary.deleted, 1);
    }

    #[test]
    fn test_unknown_codes_are_skipped_and_bad_values_reported() {
        let mut store = MemoryStore::new();
        seed(&mut store);
        let config = default_upsert_config();
        let products = vec![
            shirt("A", &[("weight", serde_json::json!(3)), ("colour", serde_json::json!("red"))]),
            shirt("B", &[("launch", serde_json::json!("soon")), ("colour", serde_json::json!("blue"))]),
        ];
        let outcome = products_to_db(&mut store, &products, &config).unwrap();

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].entity, "Product");
        assert!(outcome.errors[0].error.has_field(ATTRIBUTES));
        assert_eq!(store.count(&PRODUCT_ATTRIBUTE_VALUE), 1);
    }

    #[test]
    fn test_children_use_the_parent_class_and_definitions_load_once() {
        let mut store = MemoryStore::new();
        seed(&mut store);
        let config = default_upsert_config();
        let parent = ProductResource {
            structure: "parent".into(),
            ..shirt("P", &[])
        };
        products_to_db(&mut store, &[parent], &config).unwrap();

        let children: Vec<ProductResource> = ["C1", "C2", "C3"]
            .into_iter()
            .map(|upc| ProductResource {
                structure: "child".into(),
                product_class: None,
                parent: Some(ProductRefResource::new("P")),
                ..shirt(upc, &[("size", serde_json::json!(1))])
            })
            .collect();
        store.clear_log();
        let outcome = products_to_db(&mut store, &children, &config).unwrap();
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        assert_eq!(store.count(&PRODUCT_ATTRIBUTE_VALUE), 3);
        assert_eq!(store.statement_count(StatementKind::Select, "ProductAttribute"), 1);
        assert_eq!(store.statement_count(StatementKind::Insert, "ProductAttributeValue"), 1);
    }
}
