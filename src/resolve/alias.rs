//! Join aliases and the AND-scope tracker.
//!
//! Every joined instance of an entity gets an alias named after the
//! relationship chain that reached it (`teacher.students`). Once a chain
//! crosses a to-many relationship the alias also carries the AND-scope
//! signature (`teacher.students.0-1`), so two AND-ed conditions on the same
//! to-many relationship each get their own join while OR-ed conditions share
//! one.

use std::collections::HashSet;

use super::path::Hop;

// =============================================================================
// AND Scope
// =============================================================================

/// Nesting depth of AND groups plus a sibling counter per depth.
///
/// Counters are never reset when a level is exited, so re-entering a depth
/// continues numbering where the previous group stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AndScope {
    depth: Option<usize>,
    counts: Vec<u32>,
}

impl AndScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a nested AND level.
    pub fn enter(&mut self) {
        let depth = self.depth.map_or(0, |d| d + 1);
        if self.counts.len() <= depth {
            self.counts.push(0);
        }
        self.depth = Some(depth);
        tracing::trace!(depth, counts = ?self.counts, "enter AND scope");
    }

    /// Close the innermost AND level.
    pub fn exit(&mut self) {
        self.depth = self.depth.and_then(|d| d.checked_sub(1));
        tracing::trace!(depth = ?self.depth, "exit AND scope");
    }

    /// Advance the sibling counter of the innermost level.
    pub fn bump(&mut self) {
        if let Some(d) = self.depth {
            self.counts[d] += 1;
        }
    }

    pub fn depth(&self) -> Option<usize> {
        self.depth
    }

    /// Sibling counter of the innermost level.
    pub fn current(&self) -> Option<u32> {
        self.depth.map(|d| self.counts[d])
    }

    /// Overwrite the sibling counter of the innermost level.
    pub fn set_current(&mut self, value: u32) {
        if let Some(d) = self.depth {
            self.counts[d] = value;
        }
    }

    /// Counters from the outermost level to the current one, joined by `-`.
    /// `None` outside any AND group.
    pub fn signature(&self) -> Option<String> {
        self.depth.map(|d| {
            self.counts[..=d]
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join("-")
        })
    }
}

// =============================================================================
// Alias Cache
// =============================================================================

/// One step of an alias chain, ready to be joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasStep {
    /// Alias of the owning side.
    pub parent: String,
    /// Alias assigned to the target side.
    pub alias: String,
}

/// Alias keys computed for a hop sequence.
///
/// Keys accumulate relationship names from `root`; the AND-scope signature is
/// appended once, at the first to-many hop, and inherited by every deeper hop.
pub fn alias_chain(root: &str, hops: &[Hop<'_>], scope: &AndScope) -> Vec<AliasStep> {
    let mut steps = Vec::with_capacity(hops.len());
    let mut key = root.to_string();
    let mut unique = false;

    for hop in hops {
        let parent = key.clone();
        key.push('.');
        key.push_str(&hop.relationship.name);
        if !unique && hop.relationship.is_many() {
            if let Some(signature) = scope.signature() {
                key.push('.');
                key.push_str(&signature);
            }
            unique = true;
        }
        steps.push(AliasStep {
            parent,
            alias: key.clone(),
        });
    }
    steps
}

/// Aliases already joined into one query.
#[derive(Debug, Clone, Default)]
pub struct AliasCache {
    joined: HashSet<String>,
}

impl AliasCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.joined.contains(key)
    }

    /// Record a join for `key`; returns false when it was already present.
    pub fn insert(&mut self, key: &str) -> bool {
        self.joined.insert(key.to_string())
    }

    pub fn len(&self) -> usize {
        self.joined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joined.is_empty()
    }

    /// Every alias key, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.joined.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::path::resolve_path;
    use crate::schema::fixtures::school_schema;

    #[test]
    fn test_scope_signature() {
        let mut scope = AndScope::new();
        assert_eq!(scope.signature(), None);

        scope.enter();
        assert_eq!(scope.signature().as_deref(), Some("0"));
        scope.bump();
        scope.enter();
        assert_eq!(scope.signature().as_deref(), Some("1-0"));
        scope.bump();
        scope.exit();
        scope.bump();
        scope.enter();
        // counters survive exit
        assert_eq!(scope.signature().as_deref(), Some("2-1"));
        scope.exit();
        scope.exit();
        assert_eq!(scope.depth(), None);
    }

    #[test]
    fn test_alias_chain_suffixes_first_many_hop() {
        let schema = school_schema();
        let school = schema.entity("School").unwrap();
        let resolved = resolve_path(&schema, school, "classrooms.teacher.name").unwrap();

        let mut scope = AndScope::new();
        let keys: Vec<String> = alias_chain("school", &resolved.hops, &scope)
            .into_iter()
            .map(|s| s.alias)
            .collect();
        assert_eq!(keys, vec!["school.classrooms", "school.classrooms.teacher"]);

        scope.enter();
        scope.bump();
        let steps = alias_chain("school", &resolved.hops, &scope);
        assert_eq!(steps[0].alias, "school.classrooms.1");
        assert_eq!(steps[1].parent, "school.classrooms.1");
        assert_eq!(steps[1].alias, "school.classrooms.1.teacher");
    }

    #[test]
    fn test_to_one_chain_ignores_scope() {
        let schema = school_schema();
        let teacher = schema.entity("Teacher").unwrap();
        let resolved = resolve_path(&schema, teacher, "classroom.school.name").unwrap();

        let mut scope = AndScope::new();
        scope.enter();
        scope.bump();
        let last = alias_chain("teacher", &resolved.hops, &scope).pop().unwrap();
        assert_eq!(last.alias, "teacher.classroom.school");
    }

    #[test]
    fn test_cache_insert_once() {
        let mut cache = AliasCache::new();
        assert!(cache.insert("teacher.students.0"));
        assert!(!cache.insert("teacher.students.0"));
        assert_eq!(cache.keys(), vec!["teacher.students.0"]);
    }
}
