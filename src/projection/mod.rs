//! Projection engine: expansion, exposure, loading and materialization.
//!
//! A request like `["name", "students(name,email)"]` is expanded to concrete
//! paths, filtered by exposure, turned into a [`LoadPlan`] (one paginated
//! root query plus one eager query per relationship path) and finally shaped
//! into documents by walking a [`FieldTree`].

mod build;
mod columns;
mod expand;
mod materialize;
mod tree;

pub use build::{eager_query, paginate, LoadPlan, PARENT_KEY};
pub use columns::{exposed_paths, is_exposed, required_levels, LoadLevel};
pub use expand::expand_projection;
pub use materialize::{load, materialize, Record};
pub use tree::FieldTree;
