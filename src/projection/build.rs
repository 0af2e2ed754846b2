//! Query construction for serialization.
//!
//! The root query pages over distinct root entities with a dense rank:
//!
//! ```text
//! SELECT root.<required columns>
//! FROM root
//! INNER JOIN (
//!     SELECT __pk, MIN(__rank) AS __rank
//!     FROM (SELECT root.pk AS __pk, DENSE_RANK() OVER (ORDER BY ...) AS __rank
//!           FROM <filtered, joined, grouped session query>) AS __ranked
//!     GROUP BY __pk
//! ) AS __page ON root.pk = __page.__pk
//! ORDER BY __page.__rank
//! LIMIT ... OFFSET ...
//! ```
//!
//! Joins to to-many relationships multiply root rows; collapsing each key to
//! its best rank before LIMIT/OFFSET keeps pages stable.

use crate::error::Result;
use crate::filter;
use crate::schema::{Entity, Schema};
use crate::session::QuerySession;
use crate::sql::{
    dense_rank, min, table_col, Expr, ExprExt, OrderByExpr, Query, TableRef, WindowExt,
    WindowOrderBy,
};

use super::columns::{required_levels, LoadLevel};

/// Output column carrying the parent key of an association-backed load.
pub const PARENT_KEY: &str = "__parent";

const PK: &str = "__pk";
const RANK: &str = "__rank";
const RANKED: &str = "__ranked";
const PAGE: &str = "__page";

// =============================================================================
// Load plan
// =============================================================================

/// Every level that serialization loads, parents first.
#[derive(Debug, Clone)]
pub struct LoadPlan<'s> {
    levels: Vec<LoadLevel<'s>>,
}

impl<'s> LoadPlan<'s> {
    pub fn new(schema: &'s Schema, root: &'s Entity, paths: &[String]) -> Result<Self> {
        Ok(Self {
            levels: required_levels(schema, root, paths)?,
        })
    }

    pub fn root(&self) -> &LoadLevel<'s> {
        &self.levels[0]
    }

    /// Levels reached through relationships, parents first.
    pub fn eager(&self) -> &[LoadLevel<'s>] {
        &self.levels[1..]
    }

    pub fn levels(&self) -> &[LoadLevel<'s>] {
        &self.levels
    }
}

// =============================================================================
// Root query
// =============================================================================

/// Turn a filtered session into the paginated root query.
///
/// Caller order terms may reference attribute paths; they are resolved in
/// the same session. The root primary key is appended unless it already
/// closes the ordering.
pub fn paginate(
    mut session: QuerySession<'_>,
    order_by: &[OrderByExpr],
    limit: Option<u64>,
    offset: Option<u64>,
    columns: &[String],
) -> Result<Query> {
    let root = session.root();
    let alias = session.root_alias().to_string();
    let key = session.root_key();

    let mut window = Vec::with_capacity(order_by.len() + 1);
    for term in order_by {
        window.push(WindowOrderBy {
            expr: filter::rewrite(&mut session, term.expr.clone())?,
            dir: term.dir,
            nulls: term.nulls,
        });
    }
    if window.last().map(|w| &w.expr) != Some(&key) {
        window.push(WindowOrderBy::asc(key.clone()));
    }

    let mut ranked = session.into_query();
    ranked.distinct = false;
    ranked.order_by.clear();
    ranked.limit_offset = None;
    let ranked = ranked.select(vec![
        key.clone().alias(PK),
        dense_rank().over().order_by(window).build().alias(RANK),
    ]);

    let collapsed = Query::new()
        .select(vec![
            table_col(RANKED, PK).alias(PK),
            min(table_col(RANKED, RANK)).alias(RANK),
        ])
        .from(TableRef::derived(ranked, RANKED))
        .group_by(vec![table_col(RANKED, PK)]);

    let mut query = Query::new()
        .select(
            columns
                .iter()
                .map(|c| table_col(&alias, c).alias(c))
                .collect::<Vec<_>>(),
        )
        .from(TableRef::new(&root.table).with_alias(&alias))
        .inner_join(TableRef::derived(collapsed, PAGE), key.eq(table_col(PAGE, PK)))
        .order_by(vec![OrderByExpr::asc(table_col(PAGE, RANK))]);
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    if let Some(offset) = offset {
        query = query.offset(offset);
    }
    Ok(query)
}

// =============================================================================
// Eager loads
// =============================================================================

/// Load the columns of `level` for the given parent key values.
///
/// Without an association the children are matched on the remote key. With
/// one, the link table's local column is selected as [`PARENT_KEY`].
pub fn eager_query(level: &LoadLevel<'_>, parents: Vec<Expr>) -> Query {
    let entity = level.entity;
    let alias = entity.table.as_str();
    let columns: Vec<_> = level
        .columns
        .iter()
        .map(|c| table_col(alias, c).alias(c))
        .collect();
    let order = vec![OrderByExpr::asc(table_col(alias, entity.primary_key()))];

    let Some(rel) = level.via else {
        // the root level has no parent to key on
        return Query::new()
            .select(columns)
            .from(TableRef::new(&entity.table).with_alias(alias))
            .order_by(order);
    };

    let query = match &rel.association {
        None => Query::new()
            .select(columns)
            .distinct()
            .from(TableRef::new(&entity.table).with_alias(alias))
            .filter(table_col(alias, &rel.remote_key).in_list(parents)),
        Some(link) => {
            let link_alias = link.table.as_str();
            let mut select = vec![table_col(link_alias, &link.local_column).alias(PARENT_KEY)];
            select.extend(columns);
            Query::new()
                .select(select)
                .distinct()
                .from(TableRef::new(&link.table).with_alias(link_alias))
                .inner_join(
                    TableRef::new(&entity.table).with_alias(alias),
                    table_col(link_alias, &link.remote_column).eq(table_col(alias, &rel.remote_key)),
                )
                .filter(table_col(link_alias, &link.local_column).in_list(parents))
        }
    };
    query.order_by(order)
}
