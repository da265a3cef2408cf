//! # sqlport: one placeholder, every backend
//!
//! Write SQL once with `?` placeholders and portable idioms, run it on
//! PostgreSQL, MySQL/MariaDB, SQL Server, Oracle or SQLite.
//!
//! ## Quick Example
//!
//! ```
//! use sqlport::prelude::*;
//!
//! let pq = PreparedQuery::new(Dialect::SqlServer, "select * from t where d > DATE ? LIMIT ? OFFSET ?")
//!     .bind("2024-01-01")
//!     .bind(10)
//!     .bind(20)
//!     .prepare()
//!     .unwrap();
//!
//! assert_eq!(pq.text(), "select * from t where d > convert(date, ?) OFFSET ? ROWS FETCH NEXT ? ROWS ONLY");
//! assert_eq!(&pq.args()[1..], &[SqlValue::Int(20), SqlValue::Int(10)]);
//! ```
//!
//! ## Rewrite stages
//!
//! | Stage       | Example (Oracle)                                   |
//! |-------------|----------------------------------------------------|
//! | Idioms      | `DATE ?` → `to_date(?, 'yyyy-mm-dd')`              |
//! | Paging      | `LIMIT ? OFFSET ?` → `OFFSET ? ROWS FETCH NEXT ...` |
//! | Placeholder | `?` → `:1`, `:2`, ...                              |

pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod parser;
pub mod scan;
pub mod temporal;
pub mod transpiler;
pub mod value;

pub use config::Config;
pub use dialect::Dialect;
pub use engine::{Database, Query};
pub use error::{Error, Result};
pub use scan::{FieldSpec, Record, RowScanner, RowSource, ValueRow};
pub use transpiler::{PreparedQuery, rewrite};
pub use value::{NullTime, SqlField, SqlValue};

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::dialect::{Dialect, DialectRules, Paging, TemporalQuirk};
    pub use crate::engine::{Database, Query};
    pub use crate::error::*;
    pub use crate::scan::{Record, RowScanner, RowSource, ValueRow};
    pub use crate::sql_record;
    pub use crate::transpiler::{PreparedQuery, rewrite};
    pub use crate::value::{NullTime, SqlField, SqlValue};
}
