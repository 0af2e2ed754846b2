//! Path resolution and join aliasing.

pub mod alias;
pub mod path;

pub use alias::{alias_chain, AliasCache, AliasStep, AndScope};
pub use path::{resolve_path, Hop, ResolvedPath, Terminal};
