//! Trailing `LIMIT ?` / `OFFSET ?` → native paging clauses.
//!
//! The limit/offset values must be the last bound arguments of the template.
//! Only their presence (and, for `rownum` paging, their integer type) is
//! checked; a template that binds other parameters after them gets silently
//! misbound arguments.

use crate::dialect::Paging;
use crate::error::{Error, Result};
use crate::parser::rfind_keyword;
use crate::value::SqlValue;

const LIMIT: &str = "LIMIT ?";
const OFFSET: &str = "OFFSET ?";

/// Rewrite the paging clause of `sql` for `paging`, adjusting the tail of `args`.
pub fn rewrite_paging(sql: &str, args: &mut [SqlValue], paging: Paging) -> Result<String> {
    if paging == Paging::Native {
        return Ok(sql.to_string());
    }

    let limit = rfind_keyword(sql, LIMIT);
    let offset = rfind_keyword(sql, OFFSET);

    match paging {
        Paging::Native => Ok(sql.to_string()),
        Paging::Fetch => fetch(sql, args, limit, offset),
        Paging::RowNum => rownum(sql, args, limit, offset),
    }
}

fn fetch(sql: &str, args: &mut [SqlValue], limit: Option<usize>, offset: Option<usize>) -> Result<String> {
    let text = match (limit, offset) {
        (Some(l), Some(o)) if l < o => {
            let n = require_tail(args, 2)?;
            args.swap(n - 2, n - 1);
            format!(
                "{}OFFSET ? ROWS{}FETCH NEXT ? ROWS ONLY{}",
                &sql[..l],
                &sql[l + LIMIT.len()..o],
                &sql[o + OFFSET.len()..]
            )
        }
        // Already in offset-then-limit order.
        (Some(l), Some(o)) => format!(
            "{}OFFSET ? ROWS{}FETCH NEXT ? ROWS ONLY{}",
            &sql[..o],
            &sql[o + OFFSET.len()..l],
            &sql[l + LIMIT.len()..]
        ),
        (Some(l), None) => format!(
            "{}OFFSET 0 ROWS FETCH NEXT ? ROWS ONLY{}",
            &sql[..l],
            &sql[l + LIMIT.len()..]
        ),
        (None, Some(o)) => format!("{}OFFSET ? ROWS{}", &sql[..o], &sql[o + OFFSET.len()..]),
        (None, None) => sql.to_string(),
    };
    Ok(text)
}

fn rownum(sql: &str, args: &mut [SqlValue], limit: Option<usize>, offset: Option<usize>) -> Result<String> {
    let (head, filter) = match (limit, offset) {
        (Some(l), Some(o)) => {
            let n = require_tail(args, 2)?;
            let (limit_at, offset_at) = if l < o { (n - 2, n - 1) } else { (n - 1, n - 2) };
            let rows = int_arg(args, limit_at, "limit")?;
            let skip = int_arg(args, offset_at, "offset")?;
            args[n - 2] = SqlValue::Int(bound(skip, 1)?);
            args[n - 1] = SqlValue::Int(bound(skip, rows)?);
            (&sql[..l.min(o)], "rownum BETWEEN ? AND ?")
        }
        (Some(l), None) => (&sql[..l], "rownum BETWEEN 0 AND ?"),
        (None, Some(o)) => {
            let n = require_tail(args, 1)?;
            let skip = int_arg(args, n - 1, "offset")?;
            args[n - 1] = SqlValue::Int(bound(skip, 1)?);
            (&sql[..o], "rownum >= ?")
        }
        (None, None) => return Ok(sql.to_string()),
    };

    Ok(format!("SELECT * FROM (\n{})\nWHERE {}", head.trim(), filter))
}

fn require_tail(args: &[SqlValue], needed: usize) -> Result<usize> {
    if args.len() < needed {
        return Err(Error::paging(format!(
            "expected the last {} argument(s) to hold the paging values, got {} argument(s)",
            needed,
            args.len()
        )));
    }
    Ok(args.len())
}

fn int_arg(args: &[SqlValue], index: usize, what: &str) -> Result<i64> {
    args[index]
        .as_int()
        .ok_or_else(|| Error::paging(format!("{} must be an integer, got {}", what, args[index].type_name())))
}

fn bound(a: i64, b: i64) -> Result<i64> {
    a.checked_add(b)
        .ok_or_else(|| Error::paging(format!("row bound {} + {} overflows", a, b)))
}
