//! Exposure filtering and required-column computation.

use crate::error::{Result, SchemaResult};
use crate::resolve::{resolve_path, Hop, ResolvedPath, Terminal};
use crate::schema::{Entity, Relationship, Schema};

// =============================================================================
// Exposure
// =============================================================================

/// Whether `path` may appear in output without `expose_all`.
///
/// Every relationship crossed must be exposed; a column terminal follows
/// [`Schema::column_exposed`]; a list or dict mapped terminal is exposed
/// only when every path it reads is.
pub fn is_exposed(schema: &Schema, entity: &Entity, path: &str) -> SchemaResult<bool> {
    let resolved = resolve_path(schema, entity, path)?;
    resolved_exposed(schema, &resolved)
}

fn resolved_exposed(schema: &Schema, resolved: &ResolvedPath<'_>) -> SchemaResult<bool> {
    if resolved.hops.iter().any(|h| !h.relationship.exposed) {
        return Ok(false);
    }
    match resolved.terminal {
        Terminal::Column { entity, column } => Ok(schema.column_exposed(entity, column)),
        Terminal::Mapped { entity, target, .. } => {
            for leaf in target.leaf_paths() {
                if !is_exposed(schema, entity, leaf)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

/// Keep only the exposed paths, order preserved.
pub fn exposed_paths(schema: &Schema, entity: &Entity, paths: Vec<String>) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        if is_exposed(schema, entity, &path)? {
            out.push(path);
        }
    }
    Ok(out)
}

// =============================================================================
// Required columns
// =============================================================================

/// Columns to load for one entity instance reached from the root.
#[derive(Debug, Clone)]
pub struct LoadLevel<'s> {
    /// Relationship names from the root; empty for the root itself.
    pub path: Vec<String>,
    pub entity: &'s Entity,
    /// Relationship that reaches this level from its parent.
    pub via: Option<&'s Relationship>,
    pub columns: Vec<String>,
}

impl<'s> LoadLevel<'s> {
    fn new(path: Vec<String>, entity: &'s Entity, via: Option<&'s Relationship>) -> Self {
        let mut level = Self {
            path,
            entity,
            via,
            columns: Vec::new(),
        };
        level.require(entity.primary_key());
        level
    }

    pub fn key(&self) -> String {
        self.path.join(".")
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Relationship path of the parent level.
    pub fn parent_path(&self) -> &[String] {
        &self.path[..self.path.len().saturating_sub(1)]
    }

    fn require(&mut self, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
    }
}

/// Compute every level that has to be loaded for `paths`, parents first.
///
/// The root always loads its primary key and foreign keys. Each relationship
/// hop adds the parent's local key and the target's remote key, plus
/// `remap_by` for re-keyed to-many relationships. Mapped terminals are
/// replaced by the concrete paths they read.
pub fn required_levels<'s>(
    schema: &'s Schema,
    root: &'s Entity,
    paths: &[String],
) -> Result<Vec<LoadLevel<'s>>> {
    let mut root_level = LoadLevel::new(Vec::new(), root, None);
    for fk in root.foreign_keys() {
        root_level.require(&fk.name);
    }

    let mut levels = vec![root_level];
    for path in paths {
        let resolved = resolve_path(schema, root, path)?;
        add_resolved(schema, &mut levels, &[], &resolved)?;
    }
    Ok(levels)
}

fn add_resolved<'s>(
    schema: &'s Schema,
    levels: &mut Vec<LoadLevel<'s>>,
    prefix: &[String],
    resolved: &ResolvedPath<'s>,
) -> Result<()> {
    let mut path = prefix.to_vec();
    for hop in &resolved.hops {
        add_hop(schema, levels, &path, hop)?;
        path.push(hop.relationship.name.clone());
    }

    match resolved.terminal {
        Terminal::Column { column, .. } => {
            level_mut(levels, &path).require(&column.name);
        }
        Terminal::Mapped { entity, target, .. } => {
            for leaf in target.leaf_paths() {
                let inner = resolve_path(schema, entity, leaf)?;
                add_resolved(schema, levels, &path, &inner)?;
            }
        }
    }
    Ok(())
}

fn add_hop<'s>(
    schema: &'s Schema,
    levels: &mut Vec<LoadLevel<'s>>,
    parent: &[String],
    hop: &Hop<'s>,
) -> Result<()> {
    let rel = hop.relationship;
    level_mut(levels, parent).require(&rel.local_key);

    let mut path = parent.to_vec();
    path.push(rel.name.clone());
    if !levels.iter().any(|l| l.path == path) {
        let target = schema.entity(&rel.target)?;
        levels.push(LoadLevel::new(path.clone(), target, Some(rel)));
    }

    let level = level_mut(levels, &path);
    level.require(&rel.remote_key);
    if let Some(remap) = &rel.remap_by {
        level.require(remap);
    }
    Ok(())
}

/// Levels are created parents first, so the lookup always succeeds once
/// the parent hop has been added.
fn level_mut<'a, 's>(
    levels: &'a mut Vec<LoadLevel<'s>>,
    path: &[String],
) -> &'a mut LoadLevel<'s> {
    let index = levels
        .iter()
        .position(|l| l.path == path)
        .unwrap_or(0);
    &mut levels[index]
}
