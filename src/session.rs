//! Query build session.
//!
//! A [`QuerySession`] owns the query being built for one top-level
//! operation, the aliases already joined into it and the AND-scope tracker.
//! Filters compiled through the same session share joins; a new session
//! starts from a bare `SELECT DISTINCT root.*`.

use tracing::{debug, trace};

use crate::error::{Result, SchemaResult, SpecError};
use crate::filter::{self, FilterSpec};
use crate::resolve::{
    alias_chain, resolve_path, AliasCache, AliasStep, AndScope, Hop, ResolvedPath, Terminal,
};
use crate::schema::{Entity, Schema};
use crate::sql::{table_col, Expr, ExprExt, Query, TableRef};

/// Session state saved before compiling a filter.
#[derive(Debug)]
struct Checkpoint {
    query: Query,
    aliases: AliasCache,
    scope: AndScope,
    grouped: bool,
}

/// Mutable state for compiling one query.
#[derive(Debug, Clone)]
pub struct QuerySession<'s> {
    schema: &'s Schema,
    root: &'s Entity,
    root_alias: String,
    query: Query,
    aliases: AliasCache,
    scope: AndScope,
    grouped: bool,
}

impl<'s> QuerySession<'s> {
    /// Start a session selecting every column of `root`.
    pub fn new(schema: &'s Schema, root: &'s Entity) -> Self {
        let root_alias = root.table.clone();
        let query = Query::new()
            .select(vec![Expr::Star {
                table: Some(root_alias.clone()),
            }])
            .distinct()
            .from(TableRef::new(&root.table).with_alias(&root_alias));

        Self {
            schema,
            root,
            root_alias,
            query,
            aliases: AliasCache::new(),
            scope: AndScope::new(),
            grouped: false,
        }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn root(&self) -> &'s Entity {
        self.root
    }

    pub fn root_alias(&self) -> &str {
        &self.root_alias
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn into_query(self) -> Query {
        self.query
    }

    pub fn aliases(&self) -> &AliasCache {
        &self.aliases
    }

    pub fn scope(&self) -> &AndScope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut AndScope {
        &mut self.scope
    }

    /// Whether the query is grouped by the root primary key.
    pub fn is_grouped(&self) -> bool {
        self.grouped
    }

    /// Qualified primary key column of the root.
    pub fn root_key(&self) -> Expr {
        table_col(&self.root_alias, self.root.primary_key())
    }

    /// Compile `spec` into this session's query.
    ///
    /// `skip_nones` drops `null` entries of a map filter and is rejected for
    /// expression trees. A failed filter leaves the session as it was before
    /// the call.
    pub fn filter(&mut self, spec: impl Into<FilterSpec>, skip_nones: bool) -> Result<&mut Self> {
        let checkpoint = self.checkpoint();
        if let Err(err) = filter::apply(self, spec.into(), skip_nones) {
            debug!(error = %err, "filter failed, session restored");
            self.restore(checkpoint);
            return Err(err);
        }
        Ok(self)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            query: self.query.clone(),
            aliases: self.aliases.clone(),
            scope: self.scope.clone(),
            grouped: self.grouped,
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.query = checkpoint.query;
        self.aliases = checkpoint.aliases;
        self.scope = checkpoint.scope;
        self.grouped = checkpoint.grouped;
    }

    // =========================================================================
    // Join aliases
    // =========================================================================

    /// Resolve a dotted path to a joined column, adding joins as needed.
    pub fn resolve(&mut self, path: &str) -> Result<Expr> {
        let resolved = resolve_path(self.schema, self.root, path)?;
        self.resolve_column(&resolved)
    }

    /// Join the hops of an already resolved path and return its column.
    pub fn resolve_column(&mut self, resolved: &ResolvedPath<'s>) -> Result<Expr> {
        match resolved.terminal {
            Terminal::Column { column, .. } => {
                let alias = self.join_hops(&resolved.hops)?;
                Ok(table_col(&alias, &column.name))
            }
            Terminal::Mapped { .. } => Err(SpecError::FilterOnShapedMapped(resolved.concrete()).into()),
        }
    }

    /// Ensure every hop is joined under the current AND scope and return the
    /// alias of the last one.
    pub fn join_hops(&mut self, hops: &[Hop<'s>]) -> SchemaResult<String> {
        let steps = alias_chain(&self.root_alias, hops, &self.scope);
        for (step, hop) in steps.iter().zip(hops) {
            if self.aliases.insert(&step.alias) {
                self.add_join(step, hop)?;
            }
        }
        Ok(steps
            .last()
            .map(|s| s.alias.clone())
            .unwrap_or_else(|| self.root_alias.clone()))
    }

    fn add_join(&mut self, step: &AliasStep, hop: &Hop<'s>) -> SchemaResult<()> {
        let rel = hop.relationship;
        let target = self.schema.entity(&rel.target)?;
        let mut query = std::mem::take(&mut self.query);

        query = match &rel.association {
            None => query.left_join(
                TableRef::new(&target.table).with_alias(&step.alias),
                table_col(&step.parent, &rel.local_key).eq(table_col(&step.alias, &rel.remote_key)),
            ),
            Some(link) => {
                let link_alias = format!("{}__link", step.alias);
                query
                    .left_join(
                        TableRef::new(&link.table).with_alias(&link_alias),
                        table_col(&step.parent, &rel.local_key)
                            .eq(table_col(&link_alias, &link.local_column)),
                    )
                    .left_join(
                        TableRef::new(&target.table).with_alias(&step.alias),
                        table_col(&link_alias, &link.remote_column)
                            .eq(table_col(&step.alias, &rel.remote_key)),
                    )
            }
        };

        trace!(alias = %step.alias, table = %target.table, "join alias created");
        self.query = query;
        Ok(())
    }

    // =========================================================================
    // Query mutation
    // =========================================================================

    /// AND a condition onto WHERE.
    pub fn add_filter(&mut self, condition: Expr) {
        self.query = std::mem::take(&mut self.query).filter(condition);
    }

    /// AND a condition onto HAVING.
    pub fn add_having(&mut self, condition: Expr) {
        self.query = std::mem::take(&mut self.query).having(condition);
    }

    /// Group by the root primary key, once.
    pub fn group_by_root(&mut self) {
        if self.grouped {
            return;
        }
        let key = self.root_key();
        self.query = std::mem::take(&mut self.query).group_by(vec![key]);
        self.grouped = true;
    }
}
