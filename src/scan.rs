//! Row scanner: result columns → record fields, by declared column name.
//!
//! A destination type declares, per field, the exact column it binds to
//! (usually through [`sql_record!`](crate::sql_record)). The first row of a
//! result shape resolves columns to fields once; the resulting binding plan
//! is reused for every following row with the same columns.
//!
//! ```
//! use sqlport::{Dialect, RowScanner, SqlValue, ValueRow, sql_record};
//!
//! sql_record! {
//!     #[derive(Debug, Default)]
//!     pub struct User {
//!         pub id: i64 => "id",
//!         pub email: String => "email",
//!     }
//! }
//!
//! let row = ValueRow::new(["ID", "EMAIL", "extra"], vec![7.into(), "a@b.c".into(), SqlValue::Null]);
//! let mut scanner = RowScanner::new(Dialect::Postgres);
//! let mut user = User::default();
//! scanner.scan(&row, &mut user).unwrap();
//! assert_eq!(user.id, 7);
//! assert_eq!(user.email, "a@b.c");
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use crate::dialect::{Dialect, TemporalQuirk};
use crate::error::{Error, Result};
use crate::temporal;
use crate::value::{FieldKind, SqlValue};

/// Column consumed as a synthetic row number when `rownum` paging is used.
pub const DEFAULT_ROW_NUMBER_COLUMN: &str = "rnumignore";

/// A declared destination field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// The exact column name this field binds to.
    pub column: &'static str,
    pub kind: FieldKind,
}

/// A type rows can be scanned into.
pub trait Record {
    /// Declared fields, in declaration order.
    fn fields() -> &'static [FieldSpec];

    /// Columns that only carry a row number and are never bound.
    fn row_number_columns() -> &'static [&'static str] {
        &[]
    }

    /// Bind `value` to the field at `index`.
    fn bind(&mut self, index: usize, value: SqlValue) -> std::result::Result<(), String>;

    /// Reset the field at `index` to its zero value.
    fn clear_field(&mut self, index: usize);

    /// Field values as query arguments, in declaration order.
    fn to_args(&self) -> Vec<SqlValue>;
}

/// Declare a struct whose fields bind to named result columns.
///
/// ```
/// use chrono::{DateTime, Utc};
/// use sqlport::{NullTime, sql_record};
///
/// sql_record! {
///     #[derive(Debug, Default, Clone)]
///     pub struct Invoice {
///         pub id: i64 => "id",
///         pub issued_at: DateTime<Utc> => "issued_at",
///         pub paid_at: NullTime => "paid_at",
///     }
///     row_number = ["rnum"];
/// }
/// ```
#[macro_export]
macro_rules! sql_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty => $column:literal
            ),* $(,)?
        }
        $(row_number = [$($marker:literal),* $(,)?];)?
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::scan::Record for $name {
            fn fields() -> &'static [$crate::scan::FieldSpec] {
                const FIELDS: &[$crate::scan::FieldSpec] = &[
                    $(
                        $crate::scan::FieldSpec {
                            column: $column,
                            kind: <$ty as $crate::value::SqlField>::KIND,
                        },
                    )*
                ];
                FIELDS
            }

            fn row_number_columns() -> &'static [&'static str] {
                &[$($($marker),*)?]
            }

            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn bind(
                &mut self,
                index: usize,
                value: $crate::value::SqlValue,
            ) -> ::std::result::Result<(), ::std::string::String> {
                let mut slot = 0usize;
                $(
                    if index == slot {
                        self.$field = <$ty as $crate::value::SqlField>::from_sql(value)?;
                        return ::std::result::Result::Ok(());
                    }
                    slot += 1;
                )*
                ::std::result::Result::Err(::std::format!("no field at position {}", index))
            }

            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn clear_field(&mut self, index: usize) {
                let mut slot = 0usize;
                $(
                    if index == slot {
                        self.$field = ::std::default::Default::default();
                        return;
                    }
                    slot += 1;
                )*
            }

            fn to_args(&self) -> ::std::vec::Vec<$crate::value::SqlValue> {
                ::std::vec![$($crate::value::SqlField::to_sql(&self.$field)),*]
            }
        }
    };
}

/// A result row the scanner can read.
pub trait RowSource {
    fn column_count(&self) -> usize;

    fn column_name(&self, index: usize) -> &str;

    /// Read one column; failures surface as [`Error::ColumnBind`].
    fn value(&self, index: usize) -> Result<SqlValue>;
}

/// An owned in-memory row.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRow {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl ValueRow {
    pub fn new<I, S>(columns: I, values: Vec<SqlValue>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            values,
        }
    }

    /// A row sharing the column list of `self`.
    pub fn with_values(&self, values: Vec<SqlValue>) -> Self {
        Self {
            columns: Arc::clone(&self.columns),
            values,
        }
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

impl RowSource for ValueRow {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> &str {
        &self.columns[index]
    }

    fn value(&self, index: usize) -> Result<SqlValue> {
        self.values
            .get(index)
            .cloned()
            .ok_or_else(|| Error::bind(self.column_name(index), "row has no value for this column"))
    }
}

/// What to do with one result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Field { index: usize, kind: FieldKind },
    RowNumber,
    Skip,
}

/// Column-to-field resolution for one result shape and record type.
#[derive(Debug, Clone)]
struct BindingPlan {
    record: &'static str,
    columns: Vec<String>,
    slots: Vec<Slot>,
}

impl BindingPlan {
    fn build<R: Record, S: RowSource + ?Sized>(row: &S, dialect: Dialect, row_number_column: &str) -> Self {
        let quoted_identifiers = dialect.rules().quoted_identifiers;
        let rownum_paging = dialect.uses_rownum_paging();

        let columns: Vec<String> = (0..row.column_count()).map(|i| row.column_name(i).to_string()).collect();
        let slots = columns
            .iter()
            .map(|name| {
                let is_row_number = R::row_number_columns().iter().any(|m| m.eq_ignore_ascii_case(name))
                    || (rownum_paging && name.eq_ignore_ascii_case(row_number_column));
                if is_row_number {
                    return Slot::RowNumber;
                }
                R::fields()
                    .iter()
                    .position(|field| column_matches(name, field.column, quoted_identifiers))
                    .map_or(Slot::Skip, |index| Slot::Field {
                        index,
                        kind: R::fields()[index].kind,
                    })
            })
            .collect();

        let plan = Self {
            record: std::any::type_name::<R>(),
            columns,
            slots,
        };
        debug!(record = plan.record, columns = ?plan.columns, slots = ?plan.slots, "binding plan built");
        plan
    }

    fn fits<R: Record, S: RowSource + ?Sized>(&self, row: &S) -> bool {
        self.record == std::any::type_name::<R>()
            && self.columns.len() == row.column_count()
            && self.columns.iter().enumerate().all(|(i, c)| c == row.column_name(i))
    }
}

/// Quoted names (on dialects that return them verbatim) match exactly;
/// everything else ignores ASCII case.
fn column_matches(column: &str, declared: &str, quoted_identifiers: bool) -> bool {
    if quoted_identifiers && column.starts_with('"') {
        return column.trim_matches('"') == declared.trim_matches('"');
    }
    column.eq_ignore_ascii_case(declared)
}

/// Scans rows of one result set into records.
///
/// Holds the cached binding plan, so use one scanner per cursor. Taking
/// `&mut self` keeps a scanner from serving two traversals at once.
#[derive(Debug)]
pub struct RowScanner {
    dialect: Dialect,
    row_number_column: String,
    plan: Option<BindingPlan>,
    row_number: i64,
}

impl RowScanner {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            row_number_column: DEFAULT_ROW_NUMBER_COLUMN.to_string(),
            plan: None,
            row_number: 0,
        }
    }

    /// Use another synthetic row-number column name.
    pub fn with_row_number_column(mut self, column: impl Into<String>) -> Self {
        self.row_number_column = column.into();
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Drop the cached binding plan before reusing the scanner for another query.
    pub fn clear(&mut self) {
        self.plan = None;
        self.row_number = 0;
    }

    /// Value of the last row-number column consumed.
    pub fn row_number(&self) -> i64 {
        self.row_number
    }

    /// Bind the current row into `dest`. Unmatched columns are ignored.
    pub fn scan<R, S>(&mut self, row: &S, dest: &mut R) -> Result<()>
    where
        R: Record,
        S: RowSource + ?Sized,
    {
        let plan = match self.plan.take() {
            Some(plan) if plan.fits::<R, S>(row) => plan,
            _ => BindingPlan::build::<R, S>(row, self.dialect, &self.row_number_column),
        };
        let result = self.bind_row(&plan, row, dest);
        self.plan = Some(plan);
        result
    }

    /// Scan every row into a fresh record.
    pub fn scan_all<R, S>(&mut self, rows: &[S]) -> Result<Vec<R>>
    where
        R: Record + Default,
        S: RowSource,
    {
        rows.iter()
            .map(|row| {
                let mut record = R::default();
                self.scan(row, &mut record)?;
                Ok(record)
            })
            .collect()
    }

    /// Every column of the row, with instants corrected and normalized to UTC.
    ///
    /// A column whose type the driver cannot decode reads as NULL.
    pub fn scan_values<S: RowSource + ?Sized>(&self, row: &S) -> Result<Vec<(String, SqlValue)>> {
        (0..row.column_count())
            .map(|i| {
                let column = row.column_name(i);
                let value = match row.value(i) {
                    Ok(SqlValue::Timestamp(ts)) => SqlValue::Timestamp(self.normalize(ts)),
                    Ok(other) => other,
                    Err(Error::ColumnBind { message, .. }) => {
                        warn!(column, error = %message, "cannot decode column; using NULL");
                        SqlValue::Null
                    }
                    Err(e) => return Err(e),
                };
                Ok((column.to_string(), value))
            })
            .collect()
    }

    fn bind_row<R, S>(&mut self, plan: &BindingPlan, row: &S, dest: &mut R) -> Result<()>
    where
        R: Record,
        S: RowSource + ?Sized,
    {
        for (i, slot) in plan.slots.iter().enumerate() {
            match *slot {
                Slot::Skip => {}
                Slot::RowNumber => {
                    self.row_number = row.value(i)?.as_int().unwrap_or_default();
                }
                Slot::Field { index, kind } => {
                    let column = row.column_name(i);
                    let value = row.value(i)?;
                    let value = match kind {
                        FieldKind::Value => Some(value),
                        FieldKind::Temporal => self.correct_temporal(column, value),
                    };
                    match value {
                        Some(SqlValue::Null) if kind == FieldKind::Temporal && self.sqlite_text_temporal() => {
                            // NULL where the field cannot hold one reads as the zero value
                            if dest.bind(index, SqlValue::Null).is_err() {
                                dest.clear_field(index);
                            }
                        }
                        Some(value) => dest.bind(index, value).map_err(|message| Error::bind(column, message))?,
                        None => dest.clear_field(index),
                    }
                }
            }
        }
        Ok(())
    }

    /// `None` means the column degrades to the field's zero value.
    fn correct_temporal(&self, column: &str, value: SqlValue) -> Option<SqlValue> {
        match (self.dialect.rules().temporal, value) {
            (TemporalQuirk::Text, SqlValue::Text(text)) => match temporal::parse_text(&text) {
                Some(ts) => Some(SqlValue::Timestamp(ts.fixed_offset())),
                None => {
                    warn!(column, value = %text, "no known date format matches; using zero value");
                    None
                }
            },
            (_, SqlValue::Timestamp(ts)) => Some(SqlValue::Timestamp(self.normalize(ts))),
            (_, other) => Some(other),
        }
    }

    fn sqlite_text_temporal(&self) -> bool {
        self.dialect.rules().temporal == TemporalQuirk::Text
    }

    fn normalize(&self, ts: chrono::DateTime<chrono::FixedOffset>) -> chrono::DateTime<chrono::FixedOffset> {
        match self.dialect.rules().temporal {
            TemporalQuirk::LocalAsUtc => temporal::wall_clock_as_utc(ts).fixed_offset(),
            _ => ts.with_timezone(&chrono::Utc).fixed_offset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NullTime;
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    crate::sql_record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Event {
            id: i64 => "id",
            name: String => "event_name",
            score: Option<f64> => "score",
            happened_at: DateTime<Utc> => "happened_at",
            closed_at: NullTime => "closed_at",
        }
        row_number = ["rn"];
    }

    crate::sql_record! {
        #[derive(Debug, Default)]
        struct Quoted {
            upper: String => "\"Name\"",
            lower: String => "name",
        }
    }

    fn event_row(values: Vec<SqlValue>) -> ValueRow {
        ValueRow::new(["ID", "event_name", "score", "happened_at", "closed_at", "ignored"], values)
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_scan_binds_by_name() {
        let row = event_row(vec![
            1.into(),
            "launch".into(),
            SqlValue::Float(9.5),
            utc(2024, 1, 2, 3).into(),
            SqlValue::Null,
            "whatever".into(),
        ]);
        let mut scanner = RowScanner::new(Dialect::Postgres);
        let mut event = Event::default();
        scanner.scan(&row, &mut event).unwrap();

        assert_eq!(
            event,
            Event {
                id: 1,
                name: "launch".into(),
                score: Some(9.5),
                happened_at: utc(2024, 1, 2, 3),
                closed_at: NullTime::null(),
            }
        );
    }

    #[test]
    fn test_null_temporal_is_invalid_zero() {
        let row = event_row(vec![
            1.into(),
            "x".into(),
            SqlValue::Null,
            utc(2024, 1, 1, 0).into(),
            SqlValue::Null,
            SqlValue::Null,
        ]);
        let mut event = Event {
            closed_at: NullTime::new(utc(2020, 1, 1, 0)),
            ..Event::default()
        };
        RowScanner::new(Dialect::MySql).scan(&row, &mut event).unwrap();
        assert!(!event.closed_at.valid);
        assert_eq!(event.closed_at.time, crate::value::zero_instant());
        assert_eq!(event.score, None);
    }

    #[test]
    fn test_type_mismatch_surfaces_column() {
        let row = event_row(vec![
            "not a number".into(),
            "x".into(),
            SqlValue::Null,
            utc(2024, 1, 1, 0).into(),
            SqlValue::Null,
            SqlValue::Null,
        ]);
        let err = RowScanner::new(Dialect::Postgres)
            .scan(&row, &mut Event::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot bind column 'ID': expected integer, found text");
    }

    #[test]
    fn test_oracle_wall_clock_read_as_utc() {
        let local = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap();
        let row = event_row(vec![
            1.into(),
            "x".into(),
            SqlValue::Null,
            SqlValue::Timestamp(local),
            SqlValue::Timestamp(local),
            SqlValue::Null,
        ]);
        let mut event = Event::default();
        RowScanner::new(Dialect::Oracle).scan(&row, &mut event).unwrap();
        assert_eq!(event.happened_at, utc(2024, 6, 1, 12));
        assert_eq!(event.closed_at, NullTime::new(utc(2024, 6, 1, 12)));
    }

    #[test]
    fn test_other_dialects_convert_offsets() {
        let local = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap();
        let row = event_row(vec![
            1.into(),
            "x".into(),
            SqlValue::Null,
            SqlValue::Timestamp(local),
            SqlValue::Null,
            SqlValue::Null,
        ]);
        let mut event = Event::default();
        RowScanner::new(Dialect::Postgres).scan(&row, &mut event).unwrap();
        assert_eq!(event.happened_at, utc(2024, 6, 1, 10));
    }

    #[test]
    fn test_sqlite_text_timestamps() {
        let row = event_row(vec![
            1.into(),
            "x".into(),
            SqlValue::Int(3),
            "2024-02-03T04:00:00Z".into(),
            "2024-02-03 06:00:00+01:00".into(),
            SqlValue::Null,
        ]);
        let mut event = Event::default();
        RowScanner::new(Dialect::Sqlite).scan(&row, &mut event).unwrap();
        assert_eq!(event.happened_at, utc(2024, 2, 3, 4));
        assert_eq!(event.closed_at, NullTime::new(utc(2024, 2, 3, 5)));
        assert_eq!(event.score, Some(3.0));
    }

    #[test]
    fn test_sqlite_unparseable_degrades_to_zero() {
        let row = event_row(vec![
            1.into(),
            "x".into(),
            SqlValue::Null,
            "next tuesday".into(),
            "??".into(),
            SqlValue::Null,
        ]);
        let mut event = Event {
            happened_at: utc(2020, 1, 1, 0),
            closed_at: NullTime::new(utc(2020, 1, 1, 0)),
            ..Event::default()
        };
        RowScanner::new(Dialect::Sqlite).scan(&row, &mut event).unwrap();
        assert_eq!(event.happened_at, crate::value::zero_instant());
        assert_eq!(event.closed_at, NullTime::null());
    }

    #[test]
    fn test_sqlite_null_temporal_reads_as_zero() {
        let row = ValueRow::new(["id", "happened_at", "closed_at"], vec![1.into(), SqlValue::Null, SqlValue::Null]);
        let mut event = Event {
            happened_at: utc(2020, 1, 1, 0),
            closed_at: NullTime::new(utc(2020, 1, 1, 0)),
            ..Event::default()
        };
        RowScanner::new(Dialect::Sqlite).scan(&row, &mut event).unwrap();
        assert_eq!(event.happened_at, crate::value::zero_instant());
        assert_eq!(event.closed_at, NullTime::null());

        let err = RowScanner::new(Dialect::Postgres)
            .scan(&row, &mut Event::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot bind column 'happened_at': expected timestamp, found NULL");
    }

    #[test]
    fn test_row_number_columns_consumed() {
        let row = ValueRow::new(["rn", "id", "rnumignore"], vec![7.into(), 1.into(), 8.into()]);
        let mut scanner = RowScanner::new(Dialect::Oracle11g);
        let mut event = Event::default();
        scanner.scan(&row, &mut event).unwrap();
        assert_eq!(event.id, 1);
        assert_eq!(scanner.row_number(), 8);
    }

    #[test]
    fn test_quoted_names_case_sensitive_on_oracle() {
        let row = ValueRow::new(["\"Name\"", "NAME"], vec!["quoted".into(), "plain".into()]);
        let mut rec = Quoted::default();
        RowScanner::new(Dialect::Oracle).scan(&row, &mut rec).unwrap();
        assert_eq!(rec.upper, "quoted");
        assert_eq!(rec.lower, "plain");

        let row = ValueRow::new(["\"NAME\""], vec!["shouting".into()]);
        let mut rec = Quoted::default();
        RowScanner::new(Dialect::Oracle).scan(&row, &mut rec).unwrap();
        assert_eq!(rec.upper, "");
        assert_eq!(rec.lower, "");
    }

    #[test]
    fn test_plan_reused_and_rebuilt() {
        let first = event_row(vec![
            1.into(),
            "a".into(),
            SqlValue::Null,
            utc(2024, 1, 1, 0).into(),
            SqlValue::Null,
            SqlValue::Null,
        ]);
        let second = first.with_values(vec![
            2.into(),
            "b".into(),
            SqlValue::Null,
            utc(2024, 1, 2, 0).into(),
            SqlValue::Null,
            SqlValue::Null,
        ]);
        let mut scanner = RowScanner::new(Dialect::Postgres);
        let events: Vec<Event> = scanner.scan_all(&[first, second]).unwrap();
        assert_eq!(events.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);

        // Different shape, same scanner.
        let narrow = ValueRow::new(["event_name"], vec!["c".into()]);
        let mut event = Event::default();
        scanner.scan(&narrow, &mut event).unwrap();
        assert_eq!(event.name, "c");
        assert_eq!(event.id, 0);
    }

    #[test]
    fn test_round_trip_to_args() {
        let original = Event {
            id: 42,
            name: "round".into(),
            score: Some(1.25),
            happened_at: utc(2024, 3, 4, 5),
            closed_at: NullTime::new(utc(2024, 3, 5, 6)),
        };
        let columns: Vec<&str> = Event::fields().iter().map(|f| f.column).collect();
        let row = ValueRow::new(columns, original.to_args());

        let mut copy = Event::default();
        RowScanner::new(Dialect::Postgres).scan(&row, &mut copy).unwrap();
        assert_eq!(copy, original);
    }

    #[test]
    fn test_scan_values_normalizes() {
        let local = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 7, 0, 0)
            .unwrap();
        let row = ValueRow::new(["a", "t"], vec![1.into(), SqlValue::Timestamp(local)]);
        let values = RowScanner::new(Dialect::Postgres).scan_values(&row).unwrap();
        assert_eq!(values[1], ("t".to_string(), utc(2024, 6, 1, 12).into()));
    }

    /// A driver row with one column of a type it cannot decode.
    struct UndecodableRow;

    impl RowSource for UndecodableRow {
        fn column_count(&self) -> usize {
            2
        }

        fn column_name(&self, index: usize) -> &str {
            ["id", "span"][index]
        }

        fn value(&self, index: usize) -> Result<SqlValue> {
            match index {
                0 => Ok(SqlValue::Int(1)),
                _ => Err(Error::bind("span", "unsupported type INTERVAL")),
            }
        }
    }

    #[test]
    fn test_scan_values_undecodable_column_is_null() {
        let values = RowScanner::new(Dialect::Postgres).scan_values(&UndecodableRow).unwrap();
        assert_eq!(
            values,
            vec![("id".to_string(), SqlValue::Int(1)), ("span".to_string(), SqlValue::Null)]
        );
    }
}
