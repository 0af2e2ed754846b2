//! Entity schema: columns, relationships, mapped attributes and exposure.
//!
//! A [`Schema`] is assembled once, validated, and read-only afterwards. Each
//! [`Entity`] carries a name → attribute lookup table built at registration,
//! so path resolution never scans attribute lists.

mod definition;

pub use definition::{ColumnDef, EntityDef, RelationshipDef, SchemaDef};

use std::collections::{HashMap, HashSet};

use crate::error::{SchemaError, SchemaResult};
use crate::resolve::path::{resolve_path, Terminal};

// =============================================================================
// Columns
// =============================================================================

/// A foreign-key reference from a column to another entity's column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub entity: String,
    pub column: String,
}

/// A scalar column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Explicit exposure. Defaults to "not a primary key" when unset.
    pub exposed: Option<bool>,
    pub references: Option<ColumnRef>,
}

impl Column {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            exposed: None,
            references: None,
        }
    }

    pub fn exposed(mut self, exposed: bool) -> Self {
        self.exposed = Some(exposed);
        self
    }

    pub fn hidden(self) -> Self {
        self.exposed(false)
    }

    pub fn references(mut self, entity: &str, column: &str) -> Self {
        self.references = Some(ColumnRef {
            entity: entity.into(),
            column: column.into(),
        });
        self
    }
}

// =============================================================================
// Relationships
// =============================================================================

/// Whether a relationship yields one related record or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

/// Link table for many-to-many relationships.
///
/// `local_column` matches the owner's `local_key`, `remote_column` matches the
/// target's `remote_key`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Association {
    pub table: String,
    pub local_column: String,
    pub remote_column: String,
}

/// A relationship from the owning entity to a target entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    /// Join column on the owning entity.
    pub local_key: String,
    /// Join column on the target entity.
    pub remote_key: String,
    pub association: Option<Association>,
    /// Target column used to re-key materialized children into an object.
    pub remap_by: Option<String>,
    pub exposed: bool,
}

impl Relationship {
    /// A to-one relationship: `owner.local_key = target.remote_key`.
    pub fn to_one(name: &str, target: &str, local_key: &str, remote_key: &str) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::One,
            local_key: local_key.into(),
            remote_key: remote_key.into(),
            association: None,
            remap_by: None,
            exposed: true,
        }
    }

    /// A to-many relationship: `owner.local_key = target.remote_key`.
    pub fn to_many(name: &str, target: &str, local_key: &str, remote_key: &str) -> Self {
        Self {
            cardinality: Cardinality::Many,
            ..Self::to_one(name, target, local_key, remote_key)
        }
    }

    /// Route the relationship through a link table.
    pub fn through(mut self, table: &str, local_column: &str, remote_column: &str) -> Self {
        self.association = Some(Association {
            table: table.into(),
            local_column: local_column.into(),
            remote_column: remote_column.into(),
        });
        self
    }

    pub fn remap_by(mut self, column: &str) -> Self {
        self.remap_by = Some(column.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.exposed = false;
        self
    }

    pub fn is_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }
}

// =============================================================================
// Mapped Attributes
// =============================================================================

/// The shape a mapped attribute stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapTarget {
    /// Alias of exactly one underlying path.
    Path(String),
    /// Ordered list of targets.
    List(Vec<MapTarget>),
    /// Virtual sub-document: ordered key → target.
    Dict(Vec<(String, MapTarget)>),
}

impl MapTarget {
    pub fn path(p: &str) -> Self {
        MapTarget::Path(p.into())
    }

    pub fn list(items: Vec<MapTarget>) -> Self {
        MapTarget::List(items)
    }

    pub fn dict<K: Into<String>>(entries: Vec<(K, MapTarget)>) -> Self {
        MapTarget::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up a key of a dict-shaped target.
    pub fn key(&self, key: &str) -> Option<&MapTarget> {
        match self {
            MapTarget::Dict(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Dotted key paths of every non-dict leaf, in declaration order.
    pub fn flattened_keys(&self) -> Vec<String> {
        let mut out = Vec::new();
        flatten_into(self, &mut Vec::new(), &mut out);
        out
    }

    /// Every concrete path this target ultimately reads, in declaration order.
    pub fn leaf_paths(&self) -> Vec<&str> {
        match self {
            MapTarget::Path(p) => vec![p.as_str()],
            MapTarget::List(items) => items.iter().flat_map(|t| t.leaf_paths()).collect(),
            MapTarget::Dict(entries) => entries.iter().flat_map(|(_, t)| t.leaf_paths()).collect(),
        }
    }
}

fn flatten_into(target: &MapTarget, prefix: &mut Vec<String>, out: &mut Vec<String>) {
    match target {
        MapTarget::Dict(entries) => {
            for (k, v) in entries {
                prefix.push(k.clone());
                flatten_into(v, prefix, out);
                prefix.pop();
            }
        }
        _ => out.push(prefix.join(".")),
    }
}

impl TryFrom<serde_json::Value> for MapTarget {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;
        match value {
            Value::String(s) => Ok(MapTarget::Path(s)),
            Value::Array(items) => items
                .into_iter()
                .map(MapTarget::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(MapTarget::List),
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| MapTarget::try_from(v).map(|t| (k, t)))
                .collect::<Result<Vec<_>, _>>()
                .map(MapTarget::Dict),
            other => Err(format!(
                "expected a path string, list or table, found {}",
                other
            )),
        }
    }
}

/// A named virtual attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedAttribute {
    pub name: String,
    pub target: MapTarget,
}

// =============================================================================
// Entities
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Column(usize),
    Relationship(usize),
    Mapped(usize),
}

/// A borrowed attribute descriptor returned by [`Entity::attribute`].
#[derive(Debug, Clone, Copy)]
pub enum Attribute<'a> {
    Column(&'a Column),
    Relationship(&'a Relationship),
    Mapped(&'a MappedAttribute),
}

/// A relational record type.
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub table: String,
    primary_key: String,
    pub columns: Vec<Column>,
    pub relationships: Vec<Relationship>,
    pub mapped: Vec<MappedAttribute>,
    /// Projection used when the caller requests none (or `*`).
    pub default_projection: Vec<String>,
    lookup: HashMap<String, Slot>,
}

impl Entity {
    /// Create an entity whose primary key column is `primary_key`.
    pub fn new(name: &str, table: &str, primary_key: &str) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: primary_key.into(),
            columns: vec![Column::new(primary_key)],
            relationships: vec![],
            mapped: vec![],
            default_projection: vec![primary_key.into()],
            lookup: HashMap::new(),
        }
    }

    /// Add (or replace) a column.
    pub fn column(mut self, column: Column) -> Self {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        self
    }

    /// Add several plain columns.
    pub fn columns(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.column(Column::new(name));
        }
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn mapped(mut self, name: &str, target: MapTarget) -> Self {
        self.mapped.push(MappedAttribute {
            name: name.into(),
            target,
        });
        self
    }

    pub fn default_projection(mut self, paths: &[&str]) -> Self {
        self.default_projection = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key == column
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<Attribute<'_>> {
        self.lookup.get(name).map(|slot| match *slot {
            Slot::Column(i) => Attribute::Column(&self.columns[i]),
            Slot::Relationship(i) => Attribute::Relationship(&self.relationships[i]),
            Slot::Mapped(i) => Attribute::Mapped(&self.mapped[i]),
        })
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        match self.attribute(name) {
            Some(Attribute::Column(c)) => Some(c),
            _ => None,
        }
    }

    pub fn get_relationship(&self, name: &str) -> Option<&Relationship> {
        match self.attribute(name) {
            Some(Attribute::Relationship(r)) => Some(r),
            _ => None,
        }
    }

    /// Columns holding foreign keys.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.references.is_some())
    }

    fn build_lookup(&mut self) -> SchemaResult<()> {
        let mut lookup = HashMap::new();
        let slots = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), Slot::Column(i)))
            .chain(
                self.relationships
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (r.name.clone(), Slot::Relationship(i))),
            )
            .chain(
                self.mapped
                    .iter()
                    .enumerate()
                    .map(|(i, m)| (m.name.clone(), Slot::Mapped(i))),
            );
        for (name, slot) in slots {
            if lookup.insert(name.clone(), slot).is_some() {
                return Err(SchemaError::DuplicateAttribute {
                    entity: self.name.clone(),
                    name,
                });
            }
        }
        self.lookup = lookup;
        Ok(())
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Registry of validated entities.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: HashMap<String, Entity>,
}

impl Schema {
    /// Register and validate a set of entities.
    pub fn new(entities: Vec<Entity>) -> SchemaResult<Self> {
        let mut map = HashMap::new();
        for mut entity in entities {
            if entity.get_column_index(&entity.primary_key).is_none() {
                return Err(SchemaError::MissingPrimaryKey {
                    entity: entity.name.clone(),
                    column: entity.primary_key.clone(),
                });
            }
            if entity.default_projection.is_empty() {
                entity.default_projection = vec![entity.primary_key.clone()];
            }
            entity.build_lookup()?;
            if map.contains_key(&entity.name) {
                return Err(SchemaError::DuplicateAttribute {
                    entity: "<schema>".into(),
                    name: entity.name,
                });
            }
            map.insert(entity.name.clone(), entity);
        }

        let schema = Schema { entities: map };
        schema.validate()?;
        Ok(schema)
    }

    /// Parse entity definitions from TOML.
    pub fn from_toml_str(s: &str) -> SchemaResult<Self> {
        let def: SchemaDef = toml::from_str(s).map_err(|e| SchemaError::Parse(e.to_string()))?;
        def.into_schema()
    }

    /// Parse entity definitions from JSON.
    pub fn from_json_str(s: &str) -> SchemaResult<Self> {
        let def: SchemaDef =
            serde_json::from_str(s).map_err(|e| SchemaError::Parse(e.to_string()))?;
        def.into_schema()
    }

    pub fn entity(&self, name: &str) -> SchemaResult<&Entity> {
        self.entities
            .get(name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.into()))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Exposure of `column` on `entity`.
    ///
    /// A column referencing a hidden column is hidden regardless of its own
    /// flag; otherwise its explicit flag applies, defaulting to "not a
    /// primary key".
    pub fn column_exposed(&self, entity: &Entity, column: &Column) -> bool {
        if let Some(reference) = &column.references {
            if let Ok(target) = self.entity(&reference.entity) {
                if let Some(referenced) = target.get_column(&reference.column) {
                    let default = !target.is_primary_key(&referenced.name);
                    if !referenced.exposed.unwrap_or(default) {
                        return false;
                    }
                }
            }
        }
        column
            .exposed
            .unwrap_or(!entity.is_primary_key(&column.name))
    }

    fn validate(&self) -> SchemaResult<()> {
        for entity in self.entities.values() {
            for column in &entity.columns {
                if let Some(r) = &column.references {
                    let target = self.entity(&r.entity)?;
                    if target.get_column(&r.column).is_none() {
                        return Err(SchemaError::UnknownAttribute {
                            entity: r.entity.clone(),
                            attribute: r.column.clone(),
                        });
                    }
                }
            }
            for rel in &entity.relationships {
                self.validate_relationship(entity, rel)?;
            }
        }
        // Mapped targets resolve through relationships, so they are checked
        // once every relationship is known to be sound.
        for entity in self.entities.values() {
            for mapped in &entity.mapped {
                self.validate_mapped(entity, mapped)?;
            }
        }
        Ok(())
    }

    fn validate_relationship(&self, entity: &Entity, rel: &Relationship) -> SchemaResult<()> {
        let invalid = |reason: String| SchemaError::InvalidRelationship {
            entity: entity.name.clone(),
            relationship: rel.name.clone(),
            reason,
        };
        let target = self
            .entity(&rel.target)
            .map_err(|_| invalid(format!("unknown target entity '{}'", rel.target)))?;
        if entity.get_column(&rel.local_key).is_none() {
            return Err(invalid(format!("unknown local key '{}'", rel.local_key)));
        }
        if target.get_column(&rel.remote_key).is_none() {
            return Err(invalid(format!("unknown remote key '{}'", rel.remote_key)));
        }
        if let Some(remap) = &rel.remap_by {
            if !rel.is_many() {
                return Err(invalid("remap_by requires a to-many relationship".into()));
            }
            if target.get_column(remap).is_none() {
                return Err(invalid(format!("unknown remap column '{}'", remap)));
            }
        }
        if let Some(assoc) = &rel.association {
            if assoc.table.is_empty() || assoc.local_column.is_empty() || assoc.remote_column.is_empty() {
                return Err(invalid("association needs table and both columns".into()));
            }
        }
        Ok(())
    }

    fn validate_mapped(&self, entity: &Entity, mapped: &MappedAttribute) -> SchemaResult<()> {
        let mut stack = Vec::new();
        self.check_mapped(entity, &mapped.name, &mapped.target, &mut stack)
            .map_err(|reason| SchemaError::MalformedMapped {
                entity: entity.name.clone(),
                name: mapped.name.clone(),
                reason,
            })
    }

    /// Resolve every leaf of `target`, following nested list/dict mapped
    /// attributes so a shape that contains itself is reported as a cycle.
    fn check_mapped<'s>(
        &'s self,
        entity: &'s Entity,
        name: &'s str,
        target: &'s MapTarget,
        stack: &mut Vec<(&'s str, &'s str)>,
    ) -> Result<(), String> {
        check_shape(target)?;
        let key = (entity.name.as_str(), name);
        if stack.contains(&key) {
            return Err("mapped attributes form a cycle".into());
        }
        stack.push(key);
        for leaf in target.leaf_paths() {
            let resolved = resolve_path(self, entity, leaf).map_err(|e| match e {
                SchemaError::MalformedMapped { reason, .. } => reason,
                other => format!("target '{}': {}", leaf, other),
            })?;
            if let Terminal::Mapped {
                entity: owner,
                name: nested,
                target: shape,
            } = resolved.terminal
            {
                self.check_mapped(owner, nested, shape, stack)?;
            }
        }
        stack.pop();
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn entity_names(&self) -> HashSet<&str> {
        self.entities.keys().map(String::as_str).collect()
    }
}

impl Entity {
    fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

fn check_shape(target: &MapTarget) -> Result<(), String> {
    match target {
        MapTarget::Path(p) if p.is_empty() || p.split('.').any(str::is_empty) => {
            Err(format!("empty segment in path '{}'", p))
        }
        MapTarget::Path(_) => Ok(()),
        MapTarget::List(items) if items.is_empty() => Err("empty list".into()),
        MapTarget::Dict(entries) if entries.is_empty() => Err("empty dict".into()),
        MapTarget::List(items) => items.iter().try_for_each(check_shape),
        MapTarget::Dict(entries) => {
            let mut seen = HashSet::new();
            for (k, v) in entries {
                if !seen.insert(k.as_str()) {
                    return Err(format!("duplicate key '{}'", k));
                }
                check_shape(v)?;
            }
            Ok(())
        }
    }
}
