//! Supported SQL dialects and their rewrite rules.
//!
//! Every backend is described by a static [`DialectRules`] entry: the prefix
//! used for positional placeholders, the paging style, the ordered idiom
//! table and the temporal quirk the row scanner has to correct.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    SqlServer,
    /// Oracle 12c and later (`OFFSET ... FETCH` paging).
    Oracle,
    /// Oracle 11g (`rownum` paging).
    Oracle11g,
    Sqlite,
}

/// How a dialect spells `LIMIT ? OFFSET ?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// The backend understands `LIMIT`/`OFFSET` as written.
    Native,
    /// `OFFSET ? ROWS FETCH NEXT ? ROWS ONLY`.
    Fetch,
    /// Subquery filtered on `rownum`.
    RowNum,
}

/// Driver behaviour the row scanner corrects for temporal columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalQuirk {
    /// Values arrive as proper instants.
    None,
    /// Values arrive tagged with the session offset but mean UTC wall-clock time.
    LocalAsUtc,
    /// Values arrive as loosely formatted text.
    Text,
}

/// Where an idiom may start (and end) to be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Anywhere in code.
    Anywhere,
    /// Not preceded by an identifier character, nor followed by one when the
    /// pattern itself ends in one.
    Word,
    /// Surrounded by whitespace on both sides.
    Keyword,
}

/// A portable construct and its native spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Idiom {
    pub pattern: &'static str,
    pub replacement: &'static str,
    pub bound: Bound,
}

const fn word(pattern: &'static str, replacement: &'static str) -> Idiom {
    Idiom {
        pattern,
        replacement,
        bound: Bound::Word,
    }
}

const fn keyword(pattern: &'static str, replacement: &'static str) -> Idiom {
    Idiom {
        pattern,
        replacement,
        bound: Bound::Keyword,
    }
}

const MINUS_TO_EXCEPT: [Idiom; 2] = [keyword("MINUS", "EXCEPT"), keyword("minus", "except")];
const EXCEPT_TO_MINUS: [Idiom; 2] = [keyword("EXCEPT", "MINUS"), keyword("except", "minus")];

static POSTGRES_IDIOMS: [Idiom; 10] = [
    word("now()", "now() at time zone 'UTC'"),
    word("NOW()", "NOW() at time zone 'UTC'"),
    word("current_timestamp", "current_timestamp at time zone 'UTC'"),
    word("CURRENT_TIMESTAMP", "CURRENT_TIMESTAMP at time zone 'UTC'"),
    word("DATE ?", "?"),
    word("TIMESTAMP ?", "?"),
    word("date ?", "?"),
    word("timestamp ?", "?"),
    MINUS_TO_EXCEPT[0],
    MINUS_TO_EXCEPT[1],
];

static MYSQL_IDIOMS: [Idiom; 11] = [
    word("now()", "UTC_TIMESTAMP()"),
    word("NOW()", "UTC_TIMESTAMP()"),
    word("current_timestamp", "UTC_TIMESTAMP()"),
    word("CURRENT_TIMESTAMP", "UTC_TIMESTAMP()"),
    word("DATE ?", "?"),
    word("TIMESTAMP ?", "?"),
    word("date ?", "?"),
    word("timestamp ?", "?"),
    Idiom {
        pattern: "\"",
        replacement: "`",
        bound: Bound::Anywhere,
    },
    MINUS_TO_EXCEPT[0],
    MINUS_TO_EXCEPT[1],
];

static SQLSERVER_IDIOMS: [Idiom; 12] = [
    word("now()", "getutcdate()"),
    word("NOW()", "getutcdate()"),
    word("getdate()", "getutcdate()"),
    word("GETDATE()", "getutcdate()"),
    word("current_timestamp", "getutcdate()"),
    word("CURRENT_TIMESTAMP", "getutcdate()"),
    word("DATE ?", "convert(date, ?)"),
    word("TIMESTAMP ?", "convert(datetime, ?)"),
    word("date ?", "convert(date, ?)"),
    word("timestamp ?", "convert(datetime, ?)"),
    MINUS_TO_EXCEPT[0],
    MINUS_TO_EXCEPT[1],
];

static ORACLE_IDIOMS: [Idiom; 14] = [
    word("now()", "sys_extract_utc(systimestamp)"),
    word("NOW()", "sys_extract_utc(systimestamp)"),
    word("systimestamp", "sys_extract_utc(systimestamp)"),
    word("SYSTIMESTAMP", "sys_extract_utc(systimestamp)"),
    word("sysdate", "sys_extract_utc(systimestamp)"),
    word("SYSDATE", "sys_extract_utc(systimestamp)"),
    word("current_timestamp", "sys_extract_utc(systimestamp)"),
    word("CURRENT_TIMESTAMP", "sys_extract_utc(systimestamp)"),
    word("DATE ?", "to_date(?, 'yyyy-mm-dd')"),
    word("TIMESTAMP ?", "to_timestamp(?, 'yyyy-mm-dd hh24:mi:ss')"),
    word("date ?", "to_date(?, 'yyyy-mm-dd')"),
    word("timestamp ?", "to_timestamp(?, 'yyyy-mm-dd hh24:mi:ss')"),
    EXCEPT_TO_MINUS[0],
    EXCEPT_TO_MINUS[1],
];

static SQLITE_IDIOMS: [Idiom; 8] = [
    word("now()", "datetime('now')"),
    word("NOW()", "datetime('now')"),
    word("DATE ?", "date(?)"),
    word("TIMESTAMP ?", "datetime(?)"),
    word("date ?", "date(?)"),
    word("timestamp ?", "datetime(?)"),
    MINUS_TO_EXCEPT[0],
    MINUS_TO_EXCEPT[1],
];

/// Static rewrite rules for one dialect.
#[derive(Debug)]
pub struct DialectRules {
    /// Canonical backend identifier.
    pub name: &'static str,
    /// Prefix for positional placeholders; empty when `?` is used in place.
    pub placeholder_prefix: &'static str,
    pub paging: Paging,
    /// Ordered: wider idioms come before narrower ones they contain.
    pub idioms: &'static [Idiom],
    pub temporal: TemporalQuirk,
    /// Quoted identifiers come back verbatim and match case-sensitively.
    pub quoted_identifiers: bool,
}

static POSTGRES: DialectRules = DialectRules {
    name: "postgres",
    placeholder_prefix: "$",
    paging: Paging::Native,
    idioms: &POSTGRES_IDIOMS,
    temporal: TemporalQuirk::None,
    quoted_identifiers: false,
};

static MYSQL: DialectRules = DialectRules {
    name: "mysql",
    placeholder_prefix: "",
    paging: Paging::Native,
    idioms: &MYSQL_IDIOMS,
    temporal: TemporalQuirk::None,
    quoted_identifiers: false,
};

static SQLSERVER: DialectRules = DialectRules {
    name: "mssql",
    placeholder_prefix: "",
    paging: Paging::Fetch,
    idioms: &SQLSERVER_IDIOMS,
    temporal: TemporalQuirk::None,
    quoted_identifiers: false,
};

static ORACLE: DialectRules = DialectRules {
    name: "oracle",
    placeholder_prefix: ":",
    paging: Paging::Fetch,
    idioms: &ORACLE_IDIOMS,
    temporal: TemporalQuirk::LocalAsUtc,
    quoted_identifiers: true,
};

static ORACLE11G: DialectRules = DialectRules {
    name: "oracle11g",
    placeholder_prefix: ":",
    paging: Paging::RowNum,
    idioms: &ORACLE_IDIOMS,
    temporal: TemporalQuirk::LocalAsUtc,
    quoted_identifiers: true,
};

static SQLITE: DialectRules = DialectRules {
    name: "sqlite3",
    placeholder_prefix: "",
    paging: Paging::Native,
    idioms: &SQLITE_IDIOMS,
    temporal: TemporalQuirk::Text,
    quoted_identifiers: false,
};

impl Dialect {
    /// All supported dialects.
    pub const ALL: [Dialect; 6] = [
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::SqlServer,
        Dialect::Oracle,
        Dialect::Oracle11g,
        Dialect::Sqlite,
    ];

    /// Resolve a backend identifier.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "mssql" | "sqlserver" => Ok(Dialect::SqlServer),
            "oracle" | "oci8" => Ok(Dialect::Oracle),
            "oracle11g" => Ok(Dialect::Oracle11g),
            "sqlite3" | "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(Error::UnsupportedDialect(name.to_string())),
        }
    }

    /// Infer the dialect from a connection URL scheme.
    ///
    /// Oracle URLs always resolve to 12c+ paging; use an explicit
    /// `oracle11g` identifier for older servers.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "mssql" | "sqlserver" => Ok(Dialect::SqlServer),
            "oracle" | "oci8" => Ok(Dialect::Oracle),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(Error::UnsupportedDialect(scheme.to_string())),
        }
    }

    /// The static rule table entry for this dialect.
    pub fn rules(&self) -> &'static DialectRules {
        match self {
            Dialect::Postgres => &POSTGRES,
            Dialect::MySql => &MYSQL,
            Dialect::SqlServer => &SQLSERVER,
            Dialect::Oracle => &ORACLE,
            Dialect::Oracle11g => &ORACLE11G,
            Dialect::Sqlite => &SQLITE,
        }
    }

    pub fn placeholder_prefix(&self) -> &'static str {
        self.rules().placeholder_prefix
    }

    pub fn uses_fetch_paging(&self) -> bool {
        self.rules().paging == Paging::Fetch
    }

    pub fn uses_rownum_paging(&self) -> bool {
        self.rules().paging == Paging::RowNum
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rules().name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_aliases() {
        assert_eq!(Dialect::from_name("postgres").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_name("mariadb").unwrap(), Dialect::MySql);
        assert_eq!(Dialect::from_name("oci8").unwrap(), Dialect::Oracle);
        assert_eq!(Dialect::from_name(" SQLite3 ").unwrap(), Dialect::Sqlite);
        assert_eq!("oracle11g".parse::<Dialect>().unwrap(), Dialect::Oracle11g);
    }

    #[test]
    fn test_unknown_dialect_fails() {
        let err = Dialect::from_name("db2").unwrap_err();
        assert!(matches!(err, Error::UnsupportedDialect(ref name) if name == "db2"));
        assert!(Dialect::from_name("").is_err());
    }

    #[test]
    fn test_from_url() {
        assert_eq!(Dialect::from_url("postgres://localhost/app").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_url("sqlite::memory:").unwrap(), Dialect::Sqlite);
        assert_eq!(Dialect::from_url("sqlserver://db:1433").unwrap(), Dialect::SqlServer);
        assert!(Dialect::from_url("redis://localhost").is_err());
    }

    #[test]
    fn test_rule_table() {
        assert_eq!(Dialect::Postgres.placeholder_prefix(), "$");
        assert_eq!(Dialect::Oracle.placeholder_prefix(), ":");
        assert_eq!(Dialect::Oracle11g.placeholder_prefix(), ":");
        assert_eq!(Dialect::MySql.placeholder_prefix(), "");
        assert!(Dialect::SqlServer.uses_fetch_paging());
        assert!(Dialect::Oracle.uses_fetch_paging());
        assert!(Dialect::Oracle11g.uses_rownum_paging());
        assert!(!Dialect::Sqlite.uses_fetch_paging());
    }

    #[test]
    fn test_display_round_trips() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>().unwrap(), dialect);
        }
    }

    #[test]
    fn test_wider_idioms_first() {
        // No idiom may be shadowed by an earlier, narrower one.
        for dialect in Dialect::ALL {
            let idioms = dialect.rules().idioms;
            for (i, narrow) in idioms.iter().enumerate() {
                for wide in &idioms[i + 1..] {
                    assert!(
                        !(wide.pattern.len() > narrow.pattern.len() && wide.pattern.starts_with(narrow.pattern)),
                        "{dialect}: '{}' shadows '{}'",
                        narrow.pattern,
                        wide.pattern
                    );
                }
            }
        }
    }
}
