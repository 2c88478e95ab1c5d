#![allow(dead_code)]

use resmap::catalogue::schema::{
    CATEGORY, PARTNER, PRODUCT, PRODUCT_ATTRIBUTE, PRODUCT_CLASS,
};
use resmap::prelude::*;
use resmap::{EntitySchema, Record};

pub fn insert(store: &mut MemoryStore, entity: &'static EntitySchema, values: &[(&'static str, Value)]) -> i64 {
    let mut record = Record::new();
    for (name, value) in values {
        record.set(*name, value.clone());
    }
    store.create_many(entity, &[record]).unwrap()[0].unwrap()
}

/// The "klaas" product class with a text and an integer attribute, the
/// "klaas" partner and two root categories.
pub fn seed(store: &mut MemoryStore) -> i64 {
    let class = insert(
        store,
        &PRODUCT_CLASS,
        &[("name", Value::from("Klaas")), ("slug", Value::from("klaas"))],
    );
    for (code, name, kind) in [("henk", "Henk", "text"), ("harrie", "Harrie", "integer")] {
        insert(
            store,
            &PRODUCT_ATTRIBUTE,
            &[
                ("product_class_id", Value::BigInt(class)),
                ("code", Value::from(code)),
                ("name", Value::from(name)),
                ("type", Value::from(kind)),
            ],
        );
    }
    insert(store, &PARTNER, &[("code", Value::from("klaas")), ("name", Value::from("Klaas"))]);
    for (code, name) in [("1", "Hatsie"), ("2", "henk")] {
        insert(store, &CATEGORY, &[("code", Value::from(code)), ("name", Value::from(name))]);
    }
    store.clear_log();
    class
}

pub fn klaas_class() -> ProductClassResource {
    ProductClassResource {
        name: Some("Klaas".into()),
        slug: "klaas".into(),
        ..ProductClassResource::default()
    }
}

/// A standalone product priced through the price shortcut.
pub fn priced(upc: &str, title: &str, price: &str) -> ProductResource {
    ProductResource {
        price: Some(price.into()),
        currency: Some("EUR".into()),
        availability: Some(2),
        partner: Some(PartnerResource::new("klaas")),
        product_class: Some(klaas_class()),
        ..ProductResource::new(upc, title)
    }
}

pub fn image(code: &str, order: i64) -> ImageResource {
    ImageResource {
        caption: Some(format!("caption {code}")),
        display_order: order,
        ..ImageResource::new(code, format!("{code}.jpg"))
    }
}

pub fn product_row(store: &MemoryStore, upc: &str) -> resmap::Row {
    store
        .rows(&PRODUCT)
        .into_iter()
        .find(|row| row.get_by_name("upc") == Some(&Value::from(upc)))
        .unwrap_or_else(|| panic!("no product with upc {upc}"))
}

/// Values of `column` over every row of `entity`, sorted.
pub fn column(store: &MemoryStore, entity: &'static EntitySchema, column: &str) -> Vec<String> {
    let mut values: Vec<String> = store
        .rows(entity)
        .iter()
        .map(|row| row.get_by_name(column).map(ToString::to_string).unwrap_or_default())
        .collect();
    values.sort();
    values
}
