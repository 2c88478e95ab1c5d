//! Relationship metadata.
//!
//! Relationships are declared as static tables next to each entity schema.
//! [`RelationSet`] groups them by kind and is derived once per entity type,
//! then cached on the schema for the lifetime of the process.

use crate::entity::EntitySchema;

/// The type of relationship between two entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelationshipKind {
    /// One-to-one. Owned through `local_key`, or reversed through `remote_key`.
    OneToOne,
    /// Many-to-one: this entity carries the foreign key.
    #[default]
    ManyToOne,
    /// One-to-many: the related entity carries a foreign key back to this one.
    OneToMany,
    /// Many-to-many through an association entity.
    ManyToMany,
}

/// Association entity implementing a many-to-many relation.
#[derive(Debug, Clone, Copy)]
pub struct LinkTableInfo {
    /// The association entity (e.g. `ProductCategory`).
    pub entity: &'static EntitySchema,
    /// Column pointing at the owning entity (e.g. `"product_id"`).
    pub local_column: &'static str,
    /// Column pointing at the target entity (e.g. `"category_id"`).
    pub remote_column: &'static str,
}

impl LinkTableInfo {
    pub const fn new(
        entity: &'static EntitySchema,
        local_column: &'static str,
        remote_column: &'static str,
    ) -> Self {
        Self {
            entity,
            local_column,
            remote_column,
        }
    }
}

/// Static metadata for one relation of an entity.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipInfo {
    /// Name of the relation on the owning resource and entity.
    pub name: &'static str,
    pub kind: RelationshipKind,
    /// The related entity type.
    pub related: &'static EntitySchema,
    /// Foreign key column on this entity (`ManyToOne`, owning `OneToOne`).
    pub local_key: Option<&'static str>,
    /// Foreign key column on the related entity (`OneToMany`, reverse `OneToOne`).
    pub remote_key: Option<&'static str>,
    /// Association entity for `ManyToMany`.
    pub link_table: Option<LinkTableInfo>,
    /// The related row must already exist; saving never creates it.
    pub must_exist: bool,
}

impl RelationshipInfo {
    pub const fn new(
        name: &'static str,
        kind: RelationshipKind,
        related: &'static EntitySchema,
    ) -> Self {
        Self {
            name,
            kind,
            related,
            local_key: None,
            remote_key: None,
            link_table: None,
            must_exist: false,
        }
    }

    /// Many-to-one relation through the local column `key`.
    pub const fn many_to_one(
        name: &'static str,
        related: &'static EntitySchema,
        key: &'static str,
    ) -> Self {
        Self::new(name, RelationshipKind::ManyToOne, related).local_key(key)
    }

    /// One-to-many relation whose children point back through `key`.
    pub const fn one_to_many(
        name: &'static str,
        related: &'static EntitySchema,
        key: &'static str,
    ) -> Self {
        Self::new(name, RelationshipKind::OneToMany, related).remote_key(key)
    }

    /// Many-to-many relation through `link`.
    pub const fn many_to_many(
        name: &'static str,
        related: &'static EntitySchema,
        link: LinkTableInfo,
    ) -> Self {
        Self::new(name, RelationshipKind::ManyToMany, related).link_table(link)
    }

    pub const fn local_key(mut self, key: &'static str) -> Self {
        self.local_key = Some(key);
        self
    }

    pub const fn remote_key(mut self, key: &'static str) -> Self {
        self.remote_key = Some(key);
        self
    }

    pub const fn link_table(mut self, info: LinkTableInfo) -> Self {
        self.link_table = Some(info);
        self
    }

    pub const fn must_exist(mut self, value: bool) -> Self {
        self.must_exist = value;
        self
    }

    /// This entity carries the foreign key.
    pub const fn is_foreign_key(&self) -> bool {
        self.local_key.is_some()
            && matches!(
                self.kind,
                RelationshipKind::ManyToOne | RelationshipKind::OneToOne
            )
    }

    /// The related entity carries the foreign key, so related rows are
    /// children of this entity.
    pub const fn is_reverse(&self) -> bool {
        self.remote_key.is_some()
            && matches!(
                self.kind,
                RelationshipKind::OneToMany | RelationshipKind::OneToOne
            )
    }

    pub const fn is_many_to_many(&self) -> bool {
        matches!(self.kind, RelationshipKind::ManyToMany) && self.link_table.is_some()
    }
}

/// The relations of one entity type, grouped by kind.
#[derive(Debug, Clone, Default)]
pub struct RelationSet {
    pub one_to_one: Vec<&'static RelationshipInfo>,
    pub many_to_one: Vec<&'static RelationshipInfo>,
    pub one_to_many: Vec<&'static RelationshipInfo>,
    pub many_to_many: Vec<&'static RelationshipInfo>,
    /// Every relation whose key lives on this entity.
    pub foreign_keys: Vec<&'static RelationshipInfo>,
}

impl RelationSet {
    /// Group the declared relations of `schema`.
    pub fn discover(schema: &'static EntitySchema) -> Self {
        let mut set = RelationSet::default();
        for rel in schema.relations {
            match rel.kind {
                RelationshipKind::OneToOne => set.one_to_one.push(rel),
                RelationshipKind::ManyToOne => set.many_to_one.push(rel),
                RelationshipKind::OneToMany => set.one_to_many.push(rel),
                RelationshipKind::ManyToMany => set.many_to_many.push(rel),
            }
            if rel.is_foreign_key() {
                set.foreign_keys.push(rel);
            }
        }
        tracing::debug!(
            entity = schema.name,
            foreign_keys = set.foreign_keys.len(),
            one_to_many = set.one_to_many.len(),
            many_to_many = set.many_to_many.len(),
            "Discovered relations"
        );
        set
    }

    /// Look a relation up by name.
    pub fn get(&self, name: &str) -> Option<&'static RelationshipInfo> {
        self.one_to_one
            .iter()
            .chain(&self.many_to_one)
            .chain(&self.one_to_many)
            .chain(&self.many_to_many)
            .copied()
            .find(|rel| rel.name == name)
    }

    /// The foreign key relation stored in `column`.
    pub fn by_column(&self, column: &str) -> Option<&'static RelationshipInfo> {
        self.foreign_keys
            .iter()
            .copied()
            .find(|rel| rel.local_key == Some(column))
    }

    /// Whether `name` is a relation rather than a plain field.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}
