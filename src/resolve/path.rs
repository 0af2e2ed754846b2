//! Dotted attribute path resolution.
//!
//! `resolve_path(schema, Teacher, "students.name")` walks the relationship
//! `students` and terminates on the `name` column of `Student`. Alias-shaped
//! mapped attributes are substituted on the way, so `guardian_number`
//! resolves exactly like `home_phone`.

use crate::error::{SchemaError, SchemaResult};
use crate::schema::{Attribute, Column, Entity, MapTarget, Relationship, Schema};

/// One relationship traversal: `entity.relationship`.
#[derive(Debug, Clone, Copy)]
pub struct Hop<'s> {
    /// The owning entity.
    pub entity: &'s Entity,
    pub relationship: &'s Relationship,
}

/// Where a path ends.
#[derive(Debug, Clone, Copy)]
pub enum Terminal<'s> {
    Column {
        entity: &'s Entity,
        column: &'s Column,
    },
    /// A list- or dict-shaped mapped attribute, left for the caller to fan out.
    Mapped {
        entity: &'s Entity,
        name: &'s str,
        target: &'s MapTarget,
    },
}

/// A fully walked attribute path.
#[derive(Debug, Clone)]
pub struct ResolvedPath<'s> {
    pub hops: Vec<Hop<'s>>,
    pub terminal: Terminal<'s>,
    /// Concrete segments after alias substitution.
    pub segments: Vec<String>,
}

impl<'s> ResolvedPath<'s> {
    /// Whether any hop crosses a to-many relationship.
    pub fn crosses_many(&self) -> bool {
        self.hops.iter().any(|h| h.relationship.is_many())
    }

    /// The concrete dotted path.
    pub fn concrete(&self) -> String {
        self.segments.join(".")
    }

    /// Relationship names up to and including the first to-many hop.
    pub fn many_prefix(&self) -> Option<Vec<&'s str>> {
        let end = self.hops.iter().position(|h| h.relationship.is_many())?;
        Some(
            self.hops[..=end]
                .iter()
                .map(|h| h.relationship.name.as_str())
                .collect(),
        )
    }

    /// Entity owning the terminal.
    pub fn terminal_entity(&self) -> &'s Entity {
        match self.terminal {
            Terminal::Column { entity, .. } | Terminal::Mapped { entity, .. } => entity,
        }
    }
}

/// Resolve a dotted `path` against `entity`.
pub fn resolve_path<'s>(
    schema: &'s Schema,
    entity: &'s Entity,
    path: &str,
) -> SchemaResult<ResolvedPath<'s>> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut stack = Vec::new();
    walk(schema, entity, &segments, path, &mut stack)
}

fn walk<'s>(
    schema: &'s Schema,
    start: &'s Entity,
    segments: &[&str],
    original: &str,
    stack: &mut Vec<(&'s str, &'s str)>,
) -> SchemaResult<ResolvedPath<'s>> {
    let mut entity = start;
    let mut hops = Vec::new();
    let mut concrete = Vec::new();

    for (i, name) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        let attribute = entity
            .attribute(name)
            .ok_or_else(|| SchemaError::UnknownAttribute {
                entity: entity.name.clone(),
                attribute: name.to_string(),
            })?;

        match attribute {
            Attribute::Column(column) => {
                if !last {
                    return Err(SchemaError::NotTraversable {
                        path: original.into(),
                        attribute: name.to_string(),
                    });
                }
                concrete.push(column.name.clone());
                return Ok(ResolvedPath {
                    hops,
                    terminal: Terminal::Column { entity, column },
                    segments: concrete,
                });
            }

            Attribute::Relationship(relationship) => {
                if last {
                    return Err(SchemaError::PathEndsOnRelationship {
                        path: original.into(),
                        relationship: relationship.name.clone(),
                    });
                }
                hops.push(Hop {
                    entity,
                    relationship,
                });
                concrete.push(relationship.name.clone());
                entity = schema.entity(&relationship.target)?;
            }

            Attribute::Mapped(mapped) => {
                let key = (entity.name.as_str(), mapped.name.as_str());
                if stack.contains(&key) {
                    return Err(SchemaError::MalformedMapped {
                        entity: entity.name.clone(),
                        name: mapped.name.clone(),
                        reason: "mapped attributes form a cycle".into(),
                    });
                }

                // descend into dict keys
                let mut target = &mapped.target;
                let mut consumed = vec![mapped.name.clone()];
                let mut rest = &segments[i + 1..];
                while let (MapTarget::Dict(_), Some((k, tail))) = (target, rest.split_first()) {
                    target = target.key(k).ok_or_else(|| SchemaError::UnknownAttribute {
                        entity: entity.name.clone(),
                        attribute: format!("{}.{}", consumed.join("."), k),
                    })?;
                    consumed.push(k.to_string());
                    rest = tail;
                }

                match target {
                    MapTarget::Path(p) => {
                        let substituted: Vec<&str> =
                            p.split('.').chain(rest.iter().copied()).collect();
                        stack.push(key);
                        let sub = walk(schema, entity, &substituted, original, stack)?;
                        stack.pop();
                        hops.extend(sub.hops);
                        concrete.extend(sub.segments);
                        return Ok(ResolvedPath {
                            hops,
                            terminal: sub.terminal,
                            segments: concrete,
                        });
                    }
                    MapTarget::List(_) | MapTarget::Dict(_) => {
                        if let Some(next) = rest.first() {
                            return Err(SchemaError::NotTraversable {
                                path: original.into(),
                                attribute: format!("{}.{}", consumed.join("."), next),
                            });
                        }
                        concrete.extend(consumed);
                        return Ok(ResolvedPath {
                            hops,
                            terminal: Terminal::Mapped {
                                entity,
                                name: &mapped.name,
                                target,
                            },
                            segments: concrete,
                        });
                    }
                }
            }
        }
    }

    // unreachable: split yields at least one segment
    Err(SchemaError::UnknownAttribute {
        entity: start.name.clone(),
        attribute: original.into(),
    })
}
