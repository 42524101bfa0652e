//! Parser-backed gate
//!
//! Accepts exactly one query statement (`SELECT`, `WITH ... SELECT`, set
//! operations, `VALUES`, `TABLE`) and still applies the keyword blacklist.

use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use super::{find_forbidden_keyword, strip_comments, RejectReason, Verdict};

pub(super) fn check_parsed(query: &str) -> Verdict {
    let cleaned = strip_comments(query);
    if cleaned.trim().is_empty() {
        return Verdict::Rejected(RejectReason::Empty);
    }

    let statements = match Parser::parse_sql(&PostgreSqlDialect {}, query) {
        Ok(statements) => statements,
        Err(e) => return Verdict::Rejected(RejectReason::Unparseable(e.to_string())),
    };

    let query_ast = match statements.as_slice() {
        [] => return Verdict::Rejected(RejectReason::Empty),
        [Statement::Query(query_ast)] => query_ast,
        [_] => return Verdict::Rejected(RejectReason::NotSelect),
        many => return Verdict::Rejected(RejectReason::MultipleStatements(many.len())),
    };

    if let Err(reason) = inspect_query(query_ast) {
        return Verdict::Rejected(reason);
    }

    match find_forbidden_keyword(cleaned.trim()) {
        Some(keyword) => Verdict::Rejected(RejectReason::ForbiddenKeyword(keyword)),
        None => Verdict::Accepted,
    }
}

fn inspect_query(query: &Query) -> Result<(), RejectReason> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            inspect_query(&cte.query)?;
        }
    }
    inspect_set_expr(&query.body)
}

fn inspect_set_expr(expr: &SetExpr) -> Result<(), RejectReason> {
    match expr {
        SetExpr::Select(select) if select.into.is_some() => Err(RejectReason::SelectInto),
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => Ok(()),
        SetExpr::Query(inner) => inspect_query(inner),
        SetExpr::SetOperation { left, right, .. } => {
            inspect_set_expr(left)?;
            inspect_set_expr(right)
        }
        _ => Err(RejectReason::DataModifying),
    }
}
