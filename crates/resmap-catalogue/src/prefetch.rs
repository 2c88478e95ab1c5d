//! Batched loading of related rows for the forward read path.
//!
//! The registry lists which relations of a product are loaded up front.
//! A registered relation costs one query per relation for the whole batch
//! of products (two for many-to-many); anything not registered is loaded per
//! product when it is read.

use std::collections::{BTreeSet, HashMap, HashSet};

use resmap_core::{
    ConfigError, EntitySchema, Error, Filter, RelationshipKind, Result, Row, Storage, Value,
};
use resmap_query::select_in_batches;

use crate::mappers::ATTRIBUTES;
use crate::schema::{PRODUCT_ATTRIBUTE, PRODUCT_ATTRIBUTE_VALUE};

/// Rows related to each owner, keyed by owner primary key.
pub type RelatedRows = HashMap<i64, Vec<Row>>;

/// Custom loader: related rows for the given owner keys.
pub type PrefetchFn = fn(&mut dyn Storage, &[i64], usize) -> Result<RelatedRows>;

/// One registered prefetch.
#[derive(Debug, Clone, Copy)]
pub enum Prefetch {
    /// A relation of the owning entity, loaded from its metadata.
    Relation(&'static str),
    /// A named custom loader.
    Custom { name: &'static str, load: PrefetchFn },
}

impl Prefetch {
    pub const fn custom(name: &'static str, load: PrefetchFn) -> Self {
        Self::Custom { name, load }
    }

    /// The key the prefetch is registered and cached under.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Relation(name) | Self::Custom { name, .. } => *name,
        }
    }
}

impl From<&'static str> for Prefetch {
    fn from(name: &'static str) -> Self {
        Self::Relation(name)
    }
}

/// Which related data the forward read path loads in bulk.
#[derive(Debug, Clone, Default)]
pub struct PrefetchRegistry {
    select_related: Vec<&'static str>,
    prefetches: Vec<Prefetch>,
    children_prefetches: Vec<Prefetch>,
}

impl PrefetchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registrations the product read path is tuned for.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_select_related(["product_class", "parent"]);
        registry.register_prefetch("images");
        registry.register_prefetch("stockrecords");
        registry.register_prefetch("categories");
        registry.register_prefetch(Prefetch::custom(ATTRIBUTES, prefetch_attribute_values));
        registry.register_prefetch("recommended_products");
        registry.register_children_prefetch("images");
        registry.register_children_prefetch("stockrecords");
        registry
    }

    /// Register a prefetch. A prefetch with the same name is replaced in
    /// place.
    pub fn register_prefetch(&mut self, prefetch: impl Into<Prefetch>) {
        upsert_prefetch(&mut self.prefetches, prefetch.into());
    }

    /// Register a prefetch applied to the children of the loaded products.
    pub fn register_children_prefetch(&mut self, prefetch: impl Into<Prefetch>) {
        upsert_prefetch(&mut self.children_prefetches, prefetch.into());
    }

    pub fn register_select_related<I>(&mut self, relations: I)
    where
        I: IntoIterator<Item = &'static str>,
    {
        for relation in relations {
            if !self.select_related.contains(&relation) {
                self.select_related.push(relation);
            }
        }
    }

    /// Remove the prefetch named `name`, returning whether it was registered.
    pub fn unregister_prefetch(&mut self, name: &str) -> bool {
        remove_prefetch(&mut self.prefetches, name)
    }

    pub fn unregister_children_prefetch(&mut self, name: &str) -> bool {
        remove_prefetch(&mut self.children_prefetches, name)
    }

    pub fn unregister_select_related(&mut self, relation: &str) -> bool {
        let before = self.select_related.len();
        self.select_related.retain(|r| *r != relation);
        self.select_related.len() != before
    }

    /// Registered prefetches in registration order.
    pub fn get_prefetches(&self) -> &[Prefetch] {
        &self.prefetches
    }

    pub fn get_children_prefetches(&self) -> &[Prefetch] {
        &self.children_prefetches
    }

    pub fn get_select_related(&self) -> &[&'static str] {
        &self.select_related
    }
}

fn upsert_prefetch(list: &mut Vec<Prefetch>, prefetch: Prefetch) {
    match list.iter_mut().find(|p| p.name() == prefetch.name()) {
        Some(slot) => *slot = prefetch,
        None => list.push(prefetch),
    }
}

fn remove_prefetch(list: &mut Vec<Prefetch>, name: &str) -> bool {
    let before = list.len();
    list.retain(|p| p.name() != name);
    list.len() != before
}

/// Related rows loaded ahead of mapping, by prefetch name.
#[derive(Debug, Default)]
pub struct Prefetched {
    owners: HashSet<i64>,
    loaded: HashMap<&'static str, RelatedRows>,
}

impl Prefetched {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` was loaded, even if it found nothing.
    pub fn contains(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    /// Rows of `name` for `owner`, or `None` when `name` was not loaded
    /// for that owner.
    pub fn get(&self, name: &str, owner: i64) -> Option<&[Row]> {
        if !self.owners.contains(&owner) {
            return None;
        }
        self.loaded
            .get(name)
            .map(|rows| rows.get(&owner).map_or(&[][..], Vec::as_slice))
    }

    fn insert(&mut self, name: &'static str, rows: RelatedRows) {
        self.loaded.insert(name, rows);
    }

    /// Load every `select_related` relation and prefetch for `owners`.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = entity.name, owners = owners.len()))]
    pub fn load(
        storage: &mut dyn Storage,
        entity: &'static EntitySchema,
        owners: &[Row],
        select_related: &[&'static str],
        prefetches: &[Prefetch],
        batch_size: usize,
    ) -> Result<Self> {
        let mut prefetched = Self::new();
        if owners.is_empty() {
            return Ok(prefetched);
        }
        prefetched.owners = owner_keys(entity, owners)?.into_iter().collect();
        for relation in select_related {
            let rows = load_relation(storage, entity, relation, owners, batch_size)?;
            prefetched.insert(*relation, rows);
        }
        for prefetch in prefetches {
            let rows = match prefetch {
                Prefetch::Relation(name) => load_relation(storage, entity, name, owners, batch_size)?,
                Prefetch::Custom { load, .. } => {
                    let keys = owner_keys(entity, owners)?;
                    load(&mut *storage, &keys, batch_size)?
                }
            };
            prefetched.insert(prefetch.name(), rows);
        }
        Ok(prefetched)
    }
}

fn owner_keys(entity: &EntitySchema, owners: &[Row]) -> Result<Vec<i64>> {
    owners.iter().map(|row| row.pk(entity.pk_column())).collect()
}

fn distinct_keys(keys: impl IntoIterator<Item = i64>) -> Vec<Value> {
    keys.into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(Value::BigInt)
        .collect()
}

/// Rows of the relation `name` of `entity` for every row in `owners`.
pub fn load_relation(
    storage: &mut dyn Storage,
    entity: &'static EntitySchema,
    name: &str,
    owners: &[Row],
    batch_size: usize,
) -> Result<RelatedRows> {
    let Some(relation) = entity.relation_set().get(name) else {
        return Err(Error::Config(ConfigError {
            message: format!("{} has no relation named '{}' to prefetch", entity.name, name),
        }));
    };
    let related = relation.related;
    let related_pk = related.pk_column();
    let mut out = RelatedRows::new();

    match (relation.kind, relation.local_key, relation.remote_key, relation.link_table) {
        (RelationshipKind::ManyToOne | RelationshipKind::OneToOne, Some(local_key), _, _) => {
            let targets: Vec<(i64, i64)> = owners
                .iter()
                .filter_map(|row| {
                    let target = row.get_by_name(local_key).and_then(Value::as_i64)?;
                    Some(row.pk(entity.pk_column()).map(|pk| (pk, target)))
                })
                .collect::<Result<_>>()?;
            let keys = distinct_keys(targets.iter().map(|(_, target)| *target));
            let rows = select_in_batches(storage, related, related_pk, &keys, &Filter::All, batch_size)?;
            let by_pk: HashMap<i64, Row> = rows
                .into_iter()
                .map(|row| row.pk(related_pk).map(|pk| (pk, row)))
                .collect::<Result<_>>()?;
            for (owner, target) in targets {
                if let Some(row) = by_pk.get(&target) {
                    out.entry(owner).or_default().push(row.clone());
                }
            }
        }
        (_, _, Some(remote_key), _) => {
            let keys = distinct_keys(owner_keys(entity, owners)?);
            let rows = select_in_batches(storage, related, remote_key, &keys, &Filter::All, batch_size)?;
            for row in rows {
                if let Some(owner) = row.get_by_name(remote_key).and_then(Value::as_i64) {
                    out.entry(owner).or_default().push(row);
                }
            }
        }
        (RelationshipKind::ManyToMany, _, _, Some(link)) => {
            let keys = distinct_keys(owner_keys(entity, owners)?);
            let links = select_in_batches(
                storage,
                link.entity,
                link.local_column,
                &keys,
                &Filter::All,
                batch_size,
            )?;
            let pairs: Vec<(i64, i64)> = links
                .iter()
                .filter_map(|row| {
                    let owner = row.get_by_name(link.local_column).and_then(Value::as_i64)?;
                    let target = row.get_by_name(link.remote_column).and_then(Value::as_i64)?;
                    Some((owner, target))
                })
                .collect();
            let keys = distinct_keys(pairs.iter().map(|(_, target)| *target));
            let rows = select_in_batches(storage, related, related_pk, &keys, &Filter::All, batch_size)?;
            let by_pk: HashMap<i64, Row> = rows
                .into_iter()
                .map(|row| row.pk(related_pk).map(|pk| (pk, row)))
                .collect::<Result<_>>()?;
            for (owner, target) in pairs {
                if let Some(row) = by_pk.get(&target) {
                    out.entry(owner).or_default().push(row.clone());
                }
            }
        }
        _ => {
            return Err(Error::Config(ConfigError {
                message: format!("relation '{}' of {} cannot be prefetched", name, entity.name),
            }));
        }
    }
    Ok(out)
}

/// Attribute values of each product, with the code and type of their
/// definition added as `code` and `type` columns.
pub fn prefetch_attribute_values(
    storage: &mut dyn Storage,
    products: &[i64],
    batch_size: usize,
) -> Result<RelatedRows> {
    let keys = distinct_keys(products.iter().copied());
    let values = select_in_batches(
        storage,
        &PRODUCT_ATTRIBUTE_VALUE,
        "product_id",
        &keys,
        &Filter::All,
        batch_size,
    )?;
    let attribute_keys = distinct_keys(
        values
            .iter()
            .filter_map(|row| row.get_by_name("attribute_id").and_then(Value::as_i64)),
    );
    let definitions = select_in_batches(
        storage,
        &PRODUCT_ATTRIBUTE,
        "id",
        &attribute_keys,
        &Filter::All,
        batch_size,
    )?;
    let mut by_pk: HashMap<i64, (Value, Value)> = HashMap::with_capacity(definitions.len());
    for row in &definitions {
        let code = row.get_by_name("code").cloned().unwrap_or(Value::Null);
        let attribute_type = row.get_by_name("type").cloned().unwrap_or(Value::Null);
        by_pk.insert(row.pk("id")?, (code, attribute_type));
    }

    let mut out = RelatedRows::new();
    for row in values {
        let (Some(product), Some(attribute)) = (
            row.get_by_name("product_id").and_then(Value::as_i64),
            row.get_by_name("attribute_id").and_then(Value::as_i64),
        ) else {
            continue;
        };
        let Some((code, attribute_type)) = by_pk.get(&attribute) else {
            continue;
        };
        out.entry(product)
            .or_default()
            .push(row.with_extra(&[("code", code.clone()), ("type", attribute_type.clone())]));
    }
    Ok(out)
}
