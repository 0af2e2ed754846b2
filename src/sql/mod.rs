//! SQL generation module.
//!
//! This module provides a type-safe SQL builder that generates multi-dialect SQL.
//! It includes:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    and_all, case_when, cast, coalesce, col, count, count_distinct, dense_rank, func, lit_bool,
    lit_float, lit_int, lit_json, lit_null, lit_str, lower, max, min, or_any, path, raw_sql, star,
    table_col, BinaryOperator, Expr, ExprExt, Literal, NullsOrder, SortDir, UnaryOperator,
    WindowExt, WindowOrderBy,
};
pub use query::{Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, TableRef, TableSource};
pub use token::{Token, TokenStream};
