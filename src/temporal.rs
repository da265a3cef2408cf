//! Temporal corrections applied by the row scanner.

use chrono::format::{Parsed, StrftimeItems, parse};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};

/// A text layout a backend may use for temporal columns.
struct TextFormat {
    pattern: &'static str,
    has_date: bool,
    has_time: bool,
    has_offset: bool,
}

const fn fmt(pattern: &'static str, has_date: bool, has_offset: bool) -> TextFormat {
    TextFormat {
        pattern,
        has_date,
        has_time: true,
        has_offset,
    }
}

/// Tried in order; the first layout that parses wins.
static TEXT_FORMATS: [TextFormat; 15] = [
    fmt("%Y-%m-%d %H:%M:%S%.9f%:z", true, true),
    fmt("%Y-%m-%d %H:%M:%S%.6f%:z", true, true),
    fmt("%Y-%m-%d %H:%M:%S%.3f%:z", true, true),
    fmt("%Y-%m-%d %H:%M:%S%.3f", true, false),
    fmt("%Y-%m-%d %H:%M:%S%:z", true, true),
    fmt("%Y-%m-%d %H:%M:%S%.f", true, false),
    fmt("%Y-%m-%d %H:%M:%S", true, false),
    fmt("%Y-%m-%d %H:%M", true, false),
    TextFormat {
        pattern: "%Y-%m-%d",
        has_date: true,
        has_time: false,
        has_offset: false,
    },
    fmt("%H:%M:%S%.6f%:z", false, true),
    fmt("%H:%M:%S%.3f%:z", false, true),
    fmt("%H:%M:%S%.3f", false, false),
    fmt("%H:%M:%S%:z", false, true),
    fmt("%H:%M:%S", false, false),
    fmt("%H:%M", false, false),
];

/// Parse a loosely formatted temporal string as a UTC instant.
///
/// An ISO `T` separator and a trailing `Z` are accepted. Values without an
/// offset are taken as UTC; time-only values land on the zero date.
pub fn parse_text(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim().replacen('T', " ", 1).replacen('Z', "", 1);
    if text.is_empty() {
        return None;
    }

    TEXT_FORMATS.iter().find_map(|format| parse_with(&text, format))
}

fn parse_with(text: &str, format: &TextFormat) -> Option<DateTime<Utc>> {
    let mut parsed = Parsed::new();
    parse(&mut parsed, text, StrftimeItems::new(format.pattern)).ok()?;

    let date = if format.has_date {
        parsed.to_naive_date().ok()?
    } else {
        zero_date()
    };
    let time = if format.has_time {
        parsed.to_naive_time().ok()?
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)?
    };
    let wall = date.and_time(time);

    if format.has_offset {
        let offset = parsed.to_fixed_offset().ok()?;
        let local = wall.and_local_timezone(offset).single()?;
        Some(local.with_timezone(&Utc))
    } else {
        Some(wall.and_utc())
    }
}

fn zero_date() -> NaiveDate {
    crate::value::zero_instant().date_naive()
}

/// Reinterpret the printed wall-clock fields of `value` as UTC, dropping
/// whatever offset the driver attached.
pub fn wall_clock_as_utc(value: DateTime<FixedOffset>) -> DateTime<Utc> {
    value.naive_local().and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_full_timestamp_with_offset() {
        let dt = parse_text("2024-05-06 10:20:30.123456+02:00").unwrap();
        assert_eq!(dt, utc(2024, 5, 6, 8, 20, 30).with_nanosecond(123_456_000).unwrap());
    }

    #[test]
    fn test_iso_with_z() {
        assert_eq!(parse_text("2024-05-06T10:20:30Z").unwrap(), utc(2024, 5, 6, 10, 20, 30));
    }

    #[test]
    fn test_rfc3339_from_driver() {
        assert_eq!(
            parse_text("2024-01-02T03:04:05+00:00").unwrap(),
            utc(2024, 1, 2, 3, 4, 5)
        );
    }

    #[test]
    fn test_millis_without_offset() {
        let dt = parse_text("2024-05-06 10:20:30.250").unwrap();
        assert_eq!(dt, utc(2024, 5, 6, 10, 20, 30).with_nanosecond(250_000_000).unwrap());
    }

    #[test]
    fn test_bare_date_and_minutes() {
        assert_eq!(parse_text("2024-05-06").unwrap(), utc(2024, 5, 6, 0, 0, 0));
        assert_eq!(parse_text("2024-05-06 07:08").unwrap(), utc(2024, 5, 6, 7, 8, 0));
    }

    #[test]
    fn test_bare_time() {
        assert_eq!(parse_text("13:14:15").unwrap(), utc(1970, 1, 1, 13, 14, 15));
        assert_eq!(parse_text("13:14").unwrap(), utc(1970, 1, 1, 13, 14, 0));
    }

    #[test]
    fn test_unknown_format() {
        assert_eq!(parse_text("yesterday"), None);
        assert_eq!(parse_text(""), None);
        assert_eq!(parse_text("06/05/2024"), None);
    }

    #[test]
    fn test_wall_clock_as_utc() {
        let local = FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 7, 1, 9, 30, 0)
            .unwrap();
        assert_eq!(wall_clock_as_utc(local), utc(2024, 7, 1, 9, 30, 0));
    }
}
