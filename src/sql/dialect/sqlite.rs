//! SQLite SQL dialect.
//!
//! SQLite features relevant to the engine:
//! - ANSI identifier quoting (`"`)
//! - No boolean storage class (true/false stored as 1/0)
//! - OFFSET only valid after a LIMIT clause
//! - Window functions (3.25+), NULLS FIRST/LAST (3.30+)

use super::super::token::TokenStream;
use super::helpers;
use super::SqlDialect;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_sqlite(limit, offset)
    }

    fn remap_type(&self, name: &str) -> String {
        helpers::remap_type_sqlite(name)
    }
}
