//! Dynamic values exchanged with the database, and the field conversions
//! used by the row scanner.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Dynamic value type for query arguments and column values.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<FixedOffset>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Short type name used in bind error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Timestamp(_) => "timestamp",
        }
    }

    /// Render as JSON (timestamps as RFC 3339, bytes as an array).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SqlValue::Null => serde_json::Value::Null,
            SqlValue::Bool(v) => serde_json::Value::Bool(*v),
            SqlValue::Int(v) => serde_json::Value::Number((*v).into()),
            SqlValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            SqlValue::Text(v) => serde_json::Value::String(v.clone()),
            SqlValue::Bytes(v) => serde_json::Value::from(v.clone()),
            SqlValue::Timestamp(v) => serde_json::Value::String(v.to_rfc3339()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
            SqlValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            SqlValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for SqlValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    /// Zone-less timestamps are UTC wall-clock values.
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v.and_utc().fixed_offset())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        v.and_hms_opt(0, 0, 0)
            .map_or(SqlValue::Null, |midnight| midnight.into())
    }
}

impl From<NullTime> for SqlValue {
    fn from(v: NullTime) -> Self {
        if v.valid { v.time.into() } else { SqlValue::Null }
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// The zero instant: what a temporal field holds when it has no value.
pub fn zero_instant() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// An instant that may be NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullTime {
    pub time: DateTime<Utc>,
    /// `false` when the column was NULL.
    pub valid: bool,
}

impl NullTime {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self { time, valid: true }
    }

    pub fn null() -> Self {
        Self {
            time: zero_instant(),
            valid: false,
        }
    }

    pub fn set(&mut self, time: DateTime<Utc>) {
        self.time = time;
        self.valid = true;
    }

    pub fn get(&self) -> Option<DateTime<Utc>> {
        self.valid.then_some(self.time)
    }
}

impl From<Option<DateTime<Utc>>> for NullTime {
    fn from(v: Option<DateTime<Utc>>) -> Self {
        v.map(NullTime::new).unwrap_or_else(NullTime::null)
    }
}

/// What the scanner must know about a destination field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Value,
    /// Receives temporal correction before binding.
    Temporal,
}

/// A type a column value can be bound to.
pub trait SqlField: Sized + Default {
    const KIND: FieldKind = FieldKind::Value;

    /// Convert a column value; the error message is wrapped into a bind error.
    fn from_sql(value: SqlValue) -> Result<Self, String>;

    /// Convert back to an argument value.
    fn to_sql(&self) -> SqlValue;
}

fn mismatch<T>(expected: &str, value: &SqlValue) -> Result<T, String> {
    Err(format!("expected {}, found {}", expected, value.type_name()))
}

impl SqlField for bool {
    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Bool(v) => Ok(v),
            SqlValue::Int(v) => Ok(v != 0),
            other => mismatch("bool", &other),
        }
    }

    fn to_sql(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }
}

impl SqlField for i64 {
    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Int(v) => Ok(v),
            SqlValue::Bool(v) => Ok(v as i64),
            other => mismatch("integer", &other),
        }
    }

    fn to_sql(&self) -> SqlValue {
        SqlValue::Int(*self)
    }
}

macro_rules! narrow_int_field {
    ($($ty:ty),*) => {
        $(
            impl SqlField for $ty {
                fn from_sql(value: SqlValue) -> Result<Self, String> {
                    let wide = i64::from_sql(value)?;
                    <$ty>::try_from(wide).map_err(|_| format!("{} out of range for {}", wide, stringify!($ty)))
                }

                fn to_sql(&self) -> SqlValue {
                    SqlValue::Int(*self as i64)
                }
            }
        )*
    };
}

narrow_int_field!(i16, i32);

impl SqlField for f64 {
    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Float(v) => Ok(v),
            SqlValue::Int(v) => Ok(v as f64),
            // exact numerics (NUMERIC, DECIMAL) arrive as text
            SqlValue::Text(v) => v.trim().parse().map_err(|_| format!("expected float, found text '{}'", v)),
            other => mismatch("float", &other),
        }
    }

    fn to_sql(&self) -> SqlValue {
        SqlValue::Float(*self)
    }
}

impl SqlField for f32 {
    fn from_sql(value: SqlValue) -> Result<Self, String> {
        f64::from_sql(value).map(|v| v as f32)
    }

    fn to_sql(&self) -> SqlValue {
        SqlValue::Float(*self as f64)
    }
}

impl SqlField for String {
    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Text(v) => Ok(v),
            other => mismatch("text", &other),
        }
    }

    fn to_sql(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl SqlField for Vec<u8> {
    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Bytes(v) => Ok(v),
            SqlValue::Text(v) => Ok(v.into_bytes()),
            other => mismatch("bytes", &other),
        }
    }

    fn to_sql(&self) -> SqlValue {
        SqlValue::Bytes(self.clone())
    }
}

impl SqlField for DateTime<Utc> {
    const KIND: FieldKind = FieldKind::Temporal;

    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Timestamp(v) => Ok(v.with_timezone(&Utc)),
            other => mismatch("timestamp", &other),
        }
    }

    fn to_sql(&self) -> SqlValue {
        (*self).into()
    }
}

impl SqlField for NullTime {
    const KIND: FieldKind = FieldKind::Temporal;

    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Null => Ok(NullTime::null()),
            other => DateTime::<Utc>::from_sql(other).map(NullTime::new),
        }
    }

    fn to_sql(&self) -> SqlValue {
        (*self).into()
    }
}

impl<T: SqlField> SqlField for Option<T> {
    const KIND: FieldKind = T::KIND;

    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql(other).map(Some),
        }
    }

    fn to_sql(&self) -> SqlValue {
        self.as_ref().map(SqlField::to_sql).unwrap_or(SqlValue::Null)
    }
}
