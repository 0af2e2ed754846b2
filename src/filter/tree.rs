//! Expression-tree filters.

use crate::error::{Result, SchemaError};
use crate::session::QuerySession;
use crate::sql::{BinaryOperator, Expr, Query, SelectExpr};

/// Rewrite `expr`, replacing every [`Expr::PathRef`] with a joined column.
///
/// AND groups open an AND level and advance its counter after each child, so
/// siblings reaching the same to-many relationship join it independently.
/// OR groups leave the scope alone and share joins.
pub(crate) fn rewrite(session: &mut QuerySession<'_>, expr: Expr) -> Result<Expr> {
    match expr {
        Expr::PathRef(path) => session.resolve(&path),

        Expr::And(children) => rewrite_and(session, children),
        Expr::Or(children) => Ok(Expr::Or(rewrite_all(session, children)?)),

        Expr::BinaryOp {
            op: BinaryOperator::And,
            ..
        } => {
            let mut children = Vec::new();
            flatten(expr, BinaryOperator::And, &mut children);
            rewrite_and(session, children)
        }
        Expr::BinaryOp {
            op: BinaryOperator::Or,
            ..
        } => {
            let mut children = Vec::new();
            flatten(expr, BinaryOperator::Or, &mut children);
            Ok(Expr::Or(rewrite_all(session, children)?))
        }

        Expr::BinaryOp { left, op, right } => Ok(Expr::BinaryOp {
            left: Box::new(rewrite(session, *left)?),
            op,
            right: Box::new(rewrite(session, *right)?),
        }),
        Expr::UnaryOp { op, expr } => Ok(Expr::UnaryOp {
            op,
            expr: Box::new(rewrite(session, *expr)?),
        }),
        Expr::Function {
            name,
            args,
            distinct,
        } => Ok(Expr::Function {
            name,
            args: rewrite_all(session, args)?,
            distinct,
        }),
        Expr::Cast { expr, data_type } => Ok(Expr::Cast {
            expr: Box::new(rewrite(session, *expr)?),
            data_type,
        }),
        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            let operand = operand.map(|o| rewrite(session, *o).map(Box::new)).transpose()?;
            let when_clauses = when_clauses
                .into_iter()
                .map(|(w, t)| Ok((rewrite(session, w)?, rewrite(session, t)?)))
                .collect::<Result<Vec<_>>>()?;
            let else_clause = else_clause
                .map(|e| rewrite(session, *e).map(Box::new))
                .transpose()?;
            Ok(Expr::Case {
                operand,
                when_clauses,
                else_clause,
            })
        }
        Expr::In {
            expr,
            values,
            negated,
        } => Ok(Expr::In {
            expr: Box::new(rewrite(session, *expr)?),
            values: rewrite_all(session, values)?,
            negated,
        }),
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => Ok(Expr::Between {
            expr: Box::new(rewrite(session, *expr)?),
            low: Box::new(rewrite(session, *low)?),
            high: Box::new(rewrite(session, *high)?),
            negated,
        }),
        Expr::IsNull { expr, negated } => Ok(Expr::IsNull {
            expr: Box::new(rewrite(session, *expr)?),
            negated,
        }),
        Expr::LikeEscape {
            expr,
            pattern,
            escape_char,
            negated,
        } => Ok(Expr::LikeEscape {
            expr: Box::new(rewrite(session, *expr)?),
            pattern: Box::new(rewrite(session, *pattern)?),
            escape_char,
            negated,
        }),
        Expr::Paren(inner) => Ok(Expr::Paren(Box::new(rewrite(session, *inner)?))),

        Expr::Subquery(query) => {
            let query = rewrite_subquery(session, *query)?;
            Ok(Expr::Subquery(Box::new(query)))
        }
        Expr::InSubquery {
            expr,
            subquery,
            negated,
        } => Ok(Expr::InSubquery {
            expr: Box::new(rewrite(session, *expr)?),
            subquery: Box::new(rewrite_subquery(session, *subquery)?),
            negated,
        }),

        Expr::Column { .. } | Expr::Literal(_) | Expr::Raw(_) => Ok(expr),

        Expr::WindowFunction { .. } | Expr::Star { .. } => {
            Err(SchemaError::UnsupportedExpr(expr.kind()).into())
        }
    }
}

fn rewrite_all(session: &mut QuerySession<'_>, exprs: Vec<Expr>) -> Result<Vec<Expr>> {
    exprs.into_iter().map(|e| rewrite(session, e)).collect()
}

/// Resolve paths in a subquery's select list, WHERE and HAVING against the
/// outer session. The joins they need land on the outer query, so the
/// subquery reads the outer aliases as correlated columns.
fn rewrite_subquery(session: &mut QuerySession<'_>, mut query: Query) -> Result<Query> {
    let mut select = Vec::with_capacity(query.select.len());
    for SelectExpr { expr, alias } in query.select {
        let expr = match expr {
            Expr::Star { table } => Expr::Star { table },
            other => rewrite(session, other)?,
        };
        select.push(SelectExpr { expr, alias });
    }
    query.select = select;

    if let Some(condition) = query.where_clause.take() {
        query.where_clause = Some(rewrite(session, condition)?);
    }
    if let Some(condition) = query.having.take() {
        query.having = Some(rewrite(session, condition)?);
    }
    Ok(query)
}

fn rewrite_and(session: &mut QuerySession<'_>, children: Vec<Expr>) -> Result<Expr> {
    session.scope_mut().enter();
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        out.push(rewrite(session, child)?);
        session.scope_mut().bump();
    }
    session.scope_mut().exit();
    Ok(Expr::And(out))
}

/// Collect the operands of a left-deep chain of `op`.
fn flatten(expr: Expr, op: BinaryOperator, out: &mut Vec<Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: this,
            right,
        } if this == op => {
            flatten(*left, op, out);
            flatten(*right, op, out);
        }
        other => out.push(other),
    }
}
