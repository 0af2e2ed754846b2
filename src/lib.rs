//! # dotquery
//!
//! Dotted-path filters and projections over a relational entity model,
//! compiled to deduplicated, paginated SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │    Schema (entities, relationships, mapped attributes)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [resolve]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Path resolution + join aliases under an AND scope      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [filter, session]
//! ┌─────────────────────────────────────────────────────────┐
//! │        QuerySession (one live sql::Query per call)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [projection]
//! ┌─────────────────────────────────────────────────────────┐
//! │  Dense-rank paged root query + eager loads → documents   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Engine`] ties the pieces together; [`storage::SqliteStorage`] runs the
//! generated SQL.

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod projection;
pub mod resolve;
pub mod schema;
pub mod session;
pub mod sql;
pub mod storage;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::engine::{Engine, Prepared, SerializeOptions};
    pub use crate::error::{Error, Result};
    pub use crate::filter::FilterSpec;
    pub use crate::schema::{
        Association, Cardinality, Column, Entity, MapTarget, Relationship, Schema,
    };
    pub use crate::session::QuerySession;
    pub use crate::sql::{
        and_all, lit_int, lit_null, lit_str, or_any, path, Dialect, Expr, ExprExt, OrderByExpr,
        Query,
    };
    pub use crate::storage::{SqliteStorage, Storage};
}

// Also export at crate root for convenience
pub use engine::{Engine, Prepared, SerializeOptions};
pub use error::{Error, Result};
pub use filter::FilterSpec;
pub use schema::Schema;
pub use session::QuerySession;
