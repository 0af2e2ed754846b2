//! Map-form filters.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{Result, SpecError};
use crate::resolve::resolve_path;
use crate::session::QuerySession;
use crate::sql::{case_when, count_distinct, lit_bool, lit_int, lit_json, Expr, ExprExt, Literal};

/// Compile map entries into `session`.
///
/// The map is one AND level. Entries that cross a to-many relationship get a
/// sibling slot at that level; entries reaching the first to-many hop through
/// the same relationship chain share a slot, and therefore a join.
pub(super) fn apply_map(
    session: &mut QuerySession<'_>,
    entries: Vec<(String, Value)>,
    skip_nones: bool,
) -> Result<()> {
    let entries: Vec<(String, Value)> = entries
        .into_iter()
        .filter(|(_, v)| !(skip_nones && v.is_null()))
        .collect();
    if entries.is_empty() {
        return Ok(());
    }

    let schema = session.schema();
    let root = session.root();

    session.scope_mut().enter();
    let mut next_slot = session.scope().current().unwrap_or(0);
    let mut slots: HashMap<String, u32> = HashMap::new();

    for (path, value) in entries {
        let values = normalize(&path, value)?;
        let resolved = resolve_path(schema, root, &path)?;
        let to_many = resolved.crosses_many();

        if let Some(prefix) = resolved.many_prefix() {
            let slot = *slots.entry(prefix.join(".")).or_insert_with(|| {
                let slot = next_slot;
                next_slot += 1;
                slot
            });
            session.scope_mut().set_current(slot);
        }

        if values.is_empty() {
            // An empty to-many list constrains nothing.
            if !to_many {
                session.add_filter(lit_bool(false));
            }
            continue;
        }

        let column = session.resolve_column(&resolved)?;
        let n = values.len();
        let mut literals = values.into_iter();

        match (n, to_many) {
            (1, _) => {
                let condition = match literals.next() {
                    Some(Expr::Literal(Literal::Null)) | None => column.is_null(),
                    Some(lit) => column.eq(lit),
                };
                session.add_filter(condition);
            }
            (_, false) => session.add_filter(column.in_list(literals.collect())),
            (_, true) => {
                session.group_by_root();
                let matched = case_when(column.clone().in_list(literals.collect()), column);
                session.add_having(count_distinct(matched).eq(lit_int(n as i64)));
            }
        }
    }

    session.scope_mut().set_current(next_slot);
    session.scope_mut().exit();
    Ok(())
}

/// Turn a filter value into de-duplicated literals, order preserved.
///
/// A scalar becomes a single literal (`null` included). Lists may not
/// contain `null`, arrays or objects.
fn normalize(path: &str, value: Value) -> Result<Vec<Expr>> {
    let malformed = |value: &Value| SpecError::MalformedFilterValue {
        path: path.to_string(),
        value: value.to_string(),
    };

    match value {
        Value::Array(items) => {
            let mut seen: Vec<&Value> = Vec::new();
            let mut out = Vec::new();
            for item in &items {
                if item.is_null() || item.is_array() || item.is_object() {
                    return Err(malformed(&Value::Array(items.clone())).into());
                }
                if seen.contains(&item) {
                    continue;
                }
                seen.push(item);
                out.push(lit_json(item).ok_or_else(|| malformed(item))?);
            }
            Ok(out)
        }
        Value::Object(_) => Err(malformed(&value).into()),
        scalar => Ok(vec![lit_json(&scalar).ok_or_else(|| malformed(&scalar))?]),
    }
}
