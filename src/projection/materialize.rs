//! Loading rows into records and shaping them into documents.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::schema::{Attribute, Entity, MapTarget, Schema};
use crate::sql::{lit_json, Query};
use crate::storage::{Row, Storage};

use super::build::{eager_query, LoadPlan, PARENT_KEY};
use super::tree::FieldTree;

/// One loaded entity instance with its eagerly loaded relationships.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub values: Row,
    /// Children per relationship name; present only for loaded relationships.
    pub children: HashMap<String, Vec<Record>>,
}

impl Record {
    fn new(values: Row) -> Self {
        Self {
            values,
            children: HashMap::new(),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Run the root query, then one eager query per plan level.
pub fn load<S: Storage + ?Sized>(
    storage: &S,
    plan: &LoadPlan<'_>,
    root: &Query,
) -> Result<Vec<Record>> {
    let mut records: Vec<Record> = storage
        .fetch(root)?
        .into_iter()
        .map(Record::new)
        .collect();
    debug!(rows = records.len(), "loaded root records");

    for level in plan.eager() {
        let Some(rel) = level.via else { continue };
        let mut parents = Vec::new();
        collect_mut(&mut records, level.parent_path(), &mut parents);

        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for parent in &parents {
            if let Some(value) = parent.values.get(&rel.local_key) {
                if let Some(lit) = lit_json(value) {
                    if !value.is_null() && seen.insert(value.to_string()) {
                        keys.push(lit);
                    }
                }
            }
        }

        let rows = if keys.is_empty() {
            Vec::new()
        } else {
            storage.fetch(&eager_query(level, keys))?
        };
        debug!(level = %level.key(), rows = rows.len(), "eager load");

        let match_column = if rel.association.is_some() {
            PARENT_KEY
        } else {
            rel.remote_key.as_str()
        };
        let mut by_parent: HashMap<String, Vec<Row>> = HashMap::new();
        for mut row in rows {
            let key = match row.get(match_column) {
                Some(value) => value.to_string(),
                None => continue,
            };
            row.remove(PARENT_KEY);
            by_parent.entry(key).or_default().push(row);
        }

        for parent in parents {
            let children: Vec<Record> = parent
                .values
                .get(&rel.local_key)
                .filter(|v| !v.is_null())
                .and_then(|v| by_parent.get(&v.to_string()))
                .map(|rows| rows.iter().cloned().map(Record::new).collect())
                .unwrap_or_default();
            parent.children.insert(rel.name.clone(), children);
        }
    }

    Ok(records)
}

/// Gather mutable references to every record reached by `path`.
fn collect_mut<'a>(records: &'a mut [Record], path: &[String], out: &mut Vec<&'a mut Record>) {
    let Some((head, rest)) = path.split_first() else {
        out.extend(records.iter_mut());
        return;
    };
    for record in records.iter_mut() {
        if let Some(children) = record.children.get_mut(head) {
            collect_mut(children, rest, out);
        }
    }
}

// =============================================================================
// Materialization
// =============================================================================

/// Shape `record` into a document following `tree`.
///
/// Attributes that were not loaded are omitted. To-many relationships become
/// arrays, or objects keyed by `remap_by`; to-one relationships become an
/// object or `null`.
pub fn materialize(
    schema: &Schema,
    entity: &Entity,
    record: &Record,
    tree: &FieldTree,
) -> Result<Value> {
    let mut out = Map::new();
    for (name, sub) in tree.children() {
        let attribute = entity.attribute(name).ok_or_else(|| SchemaError::UnknownAttribute {
            entity: entity.name.clone(),
            attribute: name.clone(),
        })?;

        match attribute {
            Attribute::Column(column) => {
                if let Some(value) = record.values.get(&column.name) {
                    out.insert(name.clone(), value.clone());
                }
            }
            Attribute::Relationship(rel) => {
                let Some(children) = record.children.get(&rel.name) else {
                    continue;
                };
                let target = schema.entity(&rel.target)?;
                let value = if !rel.is_many() {
                    match children.first() {
                        Some(child) => materialize(schema, target, child, sub)?,
                        None => Value::Null,
                    }
                } else if let Some(remap) = &rel.remap_by {
                    let mut keyed = Map::new();
                    for child in children {
                        let key = child.values.get(remap).map(object_key).unwrap_or_default();
                        keyed.insert(key, materialize(schema, target, child, sub)?);
                    }
                    Value::Object(keyed)
                } else {
                    Value::Array(
                        children
                            .iter()
                            .map(|c| materialize(schema, target, c, sub))
                            .collect::<Result<_>>()?,
                    )
                };
                out.insert(name.clone(), value);
            }
            Attribute::Mapped(mapped) => {
                if let Some(value) = shape(schema, entity, record, &mapped.target, Some(sub))? {
                    out.insert(name.clone(), value);
                }
            }
        }
    }
    Ok(Value::Object(out))
}

/// Rebuild a mapped shape. For dicts, `requested` narrows the keys; a leaf
/// or missing sub-tree selects every key.
fn shape(
    schema: &Schema,
    entity: &Entity,
    record: &Record,
    target: &MapTarget,
    requested: Option<&FieldTree>,
) -> Result<Option<Value>> {
    match target {
        MapTarget::Path(path) => {
            let segments: Vec<&str> = path.split('.').collect();
            value_at(schema, entity, record, &segments)
        }
        MapTarget::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(shape(schema, entity, record, item, None)?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Array(values)))
        }
        MapTarget::Dict(entries) => {
            let mut out = Map::new();
            match requested.filter(|t| !t.is_leaf()) {
                Some(tree) => {
                    for (key, sub) in tree.children() {
                        if let Some(inner) = target.key(key) {
                            if let Some(value) = shape(schema, entity, record, inner, Some(sub))? {
                                out.insert(key.clone(), value);
                            }
                        }
                    }
                }
                None => {
                    for (key, inner) in entries {
                        if let Some(value) = shape(schema, entity, record, inner, None)? {
                            out.insert(key.clone(), value);
                        }
                    }
                }
            }
            Ok(Some(Value::Object(out)))
        }
    }
}

/// Read the loaded value at a dotted path. A to-one relationship without a
/// related row yields `null`; a to-many relationship yields an array.
fn value_at(
    schema: &Schema,
    entity: &Entity,
    record: &Record,
    segments: &[&str],
) -> Result<Option<Value>> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(None);
    };
    let attribute = entity.attribute(head).ok_or_else(|| SchemaError::UnknownAttribute {
        entity: entity.name.clone(),
        attribute: head.to_string(),
    })?;

    match attribute {
        Attribute::Column(column) => Ok(record.values.get(&column.name).cloned()),
        Attribute::Relationship(rel) => {
            let Some(children) = record.children.get(&rel.name) else {
                return Ok(None);
            };
            let target = schema.entity(&rel.target)?;
            if rel.is_many() {
                let mut values = Vec::with_capacity(children.len());
                for child in children {
                    if let Some(value) = value_at(schema, target, child, rest)? {
                        values.push(value);
                    }
                }
                Ok(Some(Value::Array(values)))
            } else {
                match children.first() {
                    Some(child) => value_at(schema, target, child, rest),
                    None => Ok(Some(Value::Null)),
                }
            }
        }
        Attribute::Mapped(mapped) => {
            let mut target = &mapped.target;
            for (i, key) in rest.iter().enumerate() {
                match target {
                    MapTarget::Dict(_) => match target.key(key) {
                        Some(inner) => target = inner,
                        None => return Ok(None),
                    },
                    MapTarget::Path(path) => {
                        let mut segments: Vec<&str> = path.split('.').collect();
                        segments.extend_from_slice(&rest[i..]);
                        return value_at(schema, entity, record, &segments);
                    }
                    MapTarget::List(_) => return Ok(None),
                }
            }
            shape(schema, entity, record, target, None)
        }
    }
}

/// Object key for a `remap_by` value.
fn object_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
