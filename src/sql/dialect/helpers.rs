//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use super::super::token::{Token, TokenStream};

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
///
/// Join aliases contain dots (`teacher.students.0-1`), which stay inside the
/// quotes and never split into a qualified name.
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
/// Used by: Postgres, DuckDB
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Format boolean as numeric 1/0.
/// Used by: SQLite (no native boolean storage class)
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Emit LIMIT ... OFFSET ... (standard SQL).
/// Used by: Postgres, DuckDB
pub fn emit_limit_offset_standard(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let mut ts = TokenStream::new();

    if let Some(lim) = limit {
        ts.push(Token::Limit)
            .space()
            .push(Token::LitInt(lim as i64));
    }

    if let Some(off) = offset {
        if limit.is_some() {
            ts.space();
        }
        ts.push(Token::Offset)
            .space()
            .push(Token::LitInt(off as i64));
    }

    ts
}

/// Emit LIMIT ... OFFSET ... where OFFSET requires a LIMIT.
/// Used by: SQLite, which spells "no limit" as `LIMIT -1`.
pub fn emit_limit_offset_sqlite(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    match (limit, offset) {
        (None, Some(_)) => {
            let mut ts = TokenStream::new();
            ts.push(Token::Limit).space().push(Token::LitInt(-1)).space();
            ts.append(&emit_limit_offset_standard(None, offset));
            ts
        }
        _ => emit_limit_offset_standard(limit, offset),
    }
}

// =============================================================================
// Cast Type Names
// =============================================================================

/// Map portable type names onto SQLite storage classes.
pub fn remap_type_sqlite(name: &str) -> String {
    match name.to_lowercase().as_str() {
        "string" | "varchar" | "text" => "TEXT".into(),
        "int" | "integer" | "bigint" | "bool" | "boolean" => "INTEGER".into(),
        "float" | "double" | "real" | "decimal" => "REAL".into(),
        _ => name.into(),
    }
}

/// Map portable type names onto ANSI-style type names.
/// Used by: Postgres, DuckDB
pub fn remap_type_ansi(name: &str) -> String {
    match name.to_lowercase().as_str() {
        "string" | "varchar" | "text" => "TEXT".into(),
        "int" | "integer" | "bigint" => "BIGINT".into(),
        "bool" | "boolean" => "BOOLEAN".into(),
        "float" | "double" | "real" => "DOUBLE PRECISION".into(),
        _ => name.into(),
    }
}
