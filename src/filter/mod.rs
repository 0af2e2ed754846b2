//! Filter compilation.
//!
//! Two input forms compile into the same session:
//!
//! - **map**: ordered `path -> value` entries, AND-ed together
//!   (`{"students.id": [1, 2], "name": "Ms. Frizzle"}`)
//! - **tree**: an [`Expr`] whose leaves reference attributes with
//!   [`crate::sql::path`]

mod map;
mod tree;

pub(crate) use tree::rewrite;

use serde_json::Value;

use crate::error::{Result, SpecError};
use crate::session::QuerySession;
use crate::sql::Expr;

/// A filter in either supported form.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    Map(Vec<(String, Value)>),
    Tree(Expr),
}

impl FilterSpec {
    /// Build a map filter from ordered entries.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        FilterSpec::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<Expr> for FilterSpec {
    fn from(expr: Expr) -> Self {
        FilterSpec::Tree(expr)
    }
}

impl TryFrom<Value> for FilterSpec {
    type Error = SpecError;

    /// A JSON object becomes a map filter, keeping key order.
    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(FilterSpec::Map(map.into_iter().collect())),
            other => Err(SpecError::MalformedFilterValue {
                path: String::new(),
                value: other.to_string(),
            }),
        }
    }
}

/// Compile `spec` into `session`.
pub fn apply(session: &mut QuerySession<'_>, spec: FilterSpec, skip_nones: bool) -> Result<()> {
    match spec {
        FilterSpec::Map(entries) => map::apply_map(session, entries, skip_nones),
        FilterSpec::Tree(_) if skip_nones => Err(SpecError::SkipNonesOnTree.into()),
        FilterSpec::Tree(expr) => {
            let condition = tree::rewrite(session, expr)?;
            session.add_filter(condition);
            Ok(())
        }
    }
}
