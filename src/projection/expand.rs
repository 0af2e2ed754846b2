//! Projection string expansion.
//!
//! ```text
//! "teachers(id,students(name))"  -> teachers.id, teachers.students.name
//! "name,email"                   -> name, email
//! "teacher.*"                    -> teacher.<each default projection entry>
//! "contact_info"                 -> contact_info.phone, contact_info.email, ...
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, SchemaError, SpecError};
use crate::resolve::{resolve_path, Terminal};
use crate::schema::{Attribute, Entity, MapTarget, Schema};

static BRACKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^,()]+?)\(([^()]+?)\)").unwrap());

/// Nested `*` expansions deeper than this are treated as a cycle between
/// default projections.
const MAX_DEPTH: usize = 32;

/// Expand a requested projection into concrete dotted paths.
///
/// Duplicates in `requested` are rejected; duplicates produced by expansion
/// are dropped, keeping the first occurrence.
pub fn expand_projection(
    schema: &Schema,
    entity: &Entity,
    requested: &[String],
) -> Result<Vec<String>> {
    let duplicates: Vec<String> = requested
        .iter()
        .filter(|r| requested.iter().filter(|o| o == r).count() > 1)
        .cloned()
        .collect();
    if !duplicates.is_empty() {
        return Err(SpecError::DuplicateProjection(duplicates).into());
    }

    let mut out: Vec<String> = Vec::new();
    for entry in requested {
        for path in expand_entry(schema, entity, entry, 0)? {
            if !out.contains(&path) {
                out.push(path);
            }
        }
    }
    Ok(out)
}

fn expand_entry(schema: &Schema, entity: &Entity, entry: &str, depth: usize) -> Result<Vec<String>> {
    if depth > MAX_DEPTH {
        return Err(malformed(entry, "'*' expansion does not terminate"));
    }

    let mut key = entry.to_string();
    while BRACKET.is_match(&key) {
        key = BRACKET
            .replace_all(&key, |caps: &regex::Captures<'_>| {
                caps[2]
                    .split(',')
                    .map(|field| format!("{}.{}", caps[1].trim(), field.trim()))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .into_owned();
    }
    if key.contains('(') || key.contains(')') {
        return Err(malformed(entry, "unbalanced brackets"));
    }

    if key.contains(',') {
        let mut out = Vec::new();
        for part in key.split(',') {
            out.extend(expand_entry(schema, entity, part.trim(), depth)?);
        }
        return Ok(out);
    }

    if key.is_empty() || key.split('.').any(str::is_empty) {
        return Err(malformed(entry, "empty path segment"));
    }

    if key == "*" || key.ends_with(".*") {
        let prefix = &key[..key.len() - 1];
        let mut out = Vec::new();
        for field in star_fields(schema, entity, prefix, entry)? {
            out.extend(expand_entry(schema, entity, &format!("{}{}", prefix, field), depth + 1)?);
        }
        return Ok(out);
    }

    // A dict-shaped mapped attribute requested without a key expands to
    // every key.
    let resolved = resolve_path(schema, entity, &key)?;
    if let Terminal::Mapped { target, .. } = resolved.terminal {
        if !matches!(target, MapTarget::Dict(_)) {
            return Ok(vec![key]);
        }
        return Ok(target
            .flattened_keys()
            .into_iter()
            .map(|k| format!("{}.{}", key, k))
            .collect());
    }
    Ok(vec![key])
}

/// Fields a trailing `*` stands for: the default projection of the entity
/// reached by `prefix`, or the keys of a dict-shaped mapped attribute.
fn star_fields(schema: &Schema, root: &Entity, prefix: &str, entry: &str) -> Result<Vec<String>> {
    enum At<'s> {
        Entity(&'s Entity),
        Shape(&'s MapTarget),
    }

    let mut at = At::Entity(root);
    for segment in prefix.split('.').filter(|s| !s.is_empty()) {
        at = match at {
            At::Entity(entity) => match entity.attribute(segment) {
                Some(Attribute::Relationship(rel)) => At::Entity(schema.entity(&rel.target)?),
                Some(Attribute::Mapped(mapped)) => At::Shape(&mapped.target),
                Some(Attribute::Column(_)) => {
                    return Err(SchemaError::NotTraversable {
                        path: entry.into(),
                        attribute: segment.into(),
                    }
                    .into())
                }
                None => {
                    return Err(SchemaError::UnknownAttribute {
                        entity: entity.name.clone(),
                        attribute: segment.into(),
                    }
                    .into())
                }
            },
            At::Shape(shape) => match shape.key(segment) {
                Some(inner) => At::Shape(inner),
                None => return Err(malformed(entry, "'*' must follow a relationship or dict")),
            },
        };
    }

    match at {
        At::Entity(entity) => Ok(entity.default_projection.clone()),
        At::Shape(shape) if matches!(shape, MapTarget::Dict(_)) => Ok(shape.flattened_keys()),
        At::Shape(_) => Err(malformed(entry, "'*' must follow a relationship or dict")),
    }
}

fn malformed(input: &str, reason: &str) -> crate::Error {
    SpecError::MalformedProjection {
        input: input.into(),
        reason: reason.into(),
    }
    .into()
}
