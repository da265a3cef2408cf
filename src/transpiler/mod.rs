//! Query rewriter.
//!
//! Turns a dialect-neutral template into the text and argument order a
//! backend expects. Stages run in a fixed order: idioms, then paging, then
//! placeholder numbering. The first two look for a literal `?` in context
//! (`DATE ?`, `LIMIT ?`), so numbering always comes last.

pub mod idiom;
pub mod paging;
pub mod placeholder;

use tracing::debug;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::value::SqlValue;

pub use idiom::rewrite_idioms;
pub use paging::rewrite_paging;
pub use placeholder::renumber;

/// A query template with its arguments, rewritten for one dialect.
///
/// Query parameter placeholders are written as `?` in every dialect:
///
/// ```
/// use sqlport::{Dialect, PreparedQuery};
///
/// let pq = PreparedQuery::new(Dialect::Postgres, "select id from users where email = ? limit ?")
///     .bind("a@b.c")
///     .bind(10)
///     .prepare()
///     .unwrap();
/// assert_eq!(pq.text(), "select id from users where email = $1 limit $2");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    dialect: Dialect,
    template: String,
    text: String,
    args: Vec<SqlValue>,
    prepared: bool,
}

impl PreparedQuery {
    pub fn new(dialect: Dialect, template: impl Into<String>) -> Self {
        let template = template.into();
        Self {
            dialect,
            text: template.clone(),
            template,
            args: Vec::new(),
            prepared: false,
        }
    }

    /// Append an argument.
    pub fn bind<T: Into<SqlValue>>(mut self, value: T) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set argument `index`, padding with NULLs as needed.
    pub fn set_arg<T: Into<SqlValue>>(&mut self, index: usize, value: T) {
        if self.args.len() <= index {
            self.args.resize(index + 1, SqlValue::Null);
        }
        self.args[index] = value.into();
    }

    /// Rewrite the template for the dialect. Preparing twice is a no-op.
    pub fn prepare(mut self) -> Result<Self> {
        if self.prepared {
            return Ok(self);
        }
        let rules = self.dialect.rules();

        let text = rewrite_idioms(&self.template, rules.idioms);
        debug!(dialect = %self.dialect, %text, "idioms rewritten");

        let text = rewrite_paging(&text, &mut self.args, rules.paging)?;
        debug!(dialect = %self.dialect, %text, "paging rewritten");

        self.text = renumber(&text, rules.placeholder_prefix);
        self.prepared = true;
        debug!(dialect = %self.dialect, text = %self.text, args = self.args.len(), "query prepared");

        Ok(self)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The caller-supplied template.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The rewritten text (the template until prepared).
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn args(&self) -> &[SqlValue] {
        &self.args
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.text, self.args)
    }
}

/// Rewrite `template` and `args` for `dialect`.
pub fn rewrite(dialect: Dialect, template: &str, args: Vec<SqlValue>) -> Result<PreparedQuery> {
    PreparedQuery {
        args,
        ..PreparedQuery::new(dialect, template)
    }
    .prepare()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sqlserver_scenario() {
        let pq = rewrite(
            Dialect::SqlServer,
            "select * from t where c1 = ? limit ? offset ?",
            vec!["x".into(), 5.into(), 0.into()],
        )
        .unwrap();
        assert_eq!(pq.text(), "select * from t where c1 = ? OFFSET ? ROWS FETCH NEXT ? ROWS ONLY");
        assert_eq!(pq.args(), &[SqlValue::from("x"), SqlValue::Int(0), SqlValue::Int(5)]);
    }

    #[test]
    fn test_oracle_fetch_numbered_after_paging() {
        let pq = rewrite(
            Dialect::Oracle,
            "select * from t where d > DATE ? limit ? offset ?",
            vec!["2024-01-01".into(), 10.into(), 20.into()],
        )
        .unwrap();
        assert_eq!(
            pq.text(),
            "select * from t where d > to_date(:1, 'yyyy-mm-dd') OFFSET :2 ROWS FETCH NEXT :3 ROWS ONLY"
        );
        assert_eq!(&pq.args()[1..], &[SqlValue::Int(20), SqlValue::Int(10)]);
    }

    #[test]
    fn test_oracle11g_rownum() {
        let pq = rewrite(Dialect::Oracle11g, "select a from t limit ? offset ?", vec![10.into(), 20.into()]).unwrap();
        assert_eq!(pq.text(), "SELECT * FROM (\nselect a from t)\nWHERE rownum BETWEEN :1 AND :2");
        assert_eq!(pq.args(), &[SqlValue::Int(21), SqlValue::Int(30)]);
    }

    #[test]
    fn test_postgres_keeps_limit() {
        let pq = rewrite(
            Dialect::Postgres,
            "select * from t where ts < now() limit ? offset ?",
            vec![10.into(), 20.into()],
        )
        .unwrap();
        assert_eq!(pq.text(), "select * from t where ts < now() at time zone 'UTC' limit $1 offset $2");
        assert_eq!(pq.args(), &[SqlValue::Int(10), SqlValue::Int(20)]);
    }

    #[test]
    fn test_placeholder_count_preserved() {
        let template = "insert into t (a, b, c, d) values (?, ?, DATE ?, TIMESTAMP ?)";
        for dialect in Dialect::ALL {
            let args: Vec<SqlValue> = (1..=4).map(SqlValue::from).collect();
            let pq = rewrite(dialect, template, args).unwrap();
            let prefix = dialect.placeholder_prefix();
            if prefix.is_empty() {
                assert_eq!(placeholder::count(pq.text()), 4, "{dialect}");
            } else {
                for n in 1..=4 {
                    assert!(pq.text().contains(&format!("{prefix}{n}")), "{dialect}: {}", pq.text());
                }
                assert!(!pq.text().contains(&format!("{prefix}5")));
                assert!(!pq.text().contains('?'));
            }
            assert_eq!(pq.args().len(), 4);
        }
    }

    #[test]
    fn test_prepare_twice_is_noop() {
        let pq = PreparedQuery::new(Dialect::Postgres, "a = ?").bind(1).prepare().unwrap();
        let again = pq.clone().prepare().unwrap();
        assert_eq!(again, pq);
        assert_eq!(again.text(), "a = $1");
    }

    #[test]
    fn test_set_arg_pads_with_null() {
        let mut pq = PreparedQuery::new(Dialect::MySql, "a = ? and b = ? and c = ?");
        pq.set_arg(2, "c");
        pq.set_arg(0, 1);
        assert_eq!(pq.args(), &[SqlValue::Int(1), SqlValue::Null, SqlValue::from("c")]);
    }

    #[test]
    fn test_paging_error_propagates() {
        let err = rewrite(Dialect::SqlServer, "select * from t limit ? offset ?", vec![]).unwrap_err();
        assert!(matches!(err, Error::PagingArguments(_)));
    }
}
