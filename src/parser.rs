//! Minimal SQL tokenizer using nom.
//!
//! Splits a query template into code, single-quoted literals and comments so
//! that the rewriters never touch text inside a literal or a comment.
//!
//! ```text
//! select '?' from t -- why?
//! ───┬─── ─┬─ ──┬─── ───┬───
//!    │     │    │       └── Comment
//!    │     │    └── Code
//!    │     └── Quoted
//!    └── Code
//! ```

use std::ops::Range;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_until},
    character::complete::char,
    combinator::{not, opt, recognize, rest},
    multi::{many0, many1},
    sequence::{pair, tuple},
};

/// Kind of a template segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Code,
    Quoted,
    Comment,
}

/// A contiguous byte range of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub range: Range<usize>,
}

impl Segment {
    pub fn is_code(&self) -> bool {
        self.kind == SegmentKind::Code
    }
}

/// Split `sql` into segments covering the whole input, in order.
pub fn segments(sql: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut input = sql;

    while !input.is_empty() {
        let (remaining, kind) = match parse_segment(input) {
            Ok(parsed) => parsed,
            // Unreachable for non-empty input; keep the tail as code.
            Err(_) => ("", SegmentKind::Code),
        };
        let start = sql.len() - input.len();
        let end = sql.len() - remaining.len();
        push_segment(&mut out, kind, start..end);
        input = remaining;
    }

    out
}

/// Byte offset of the last `needle` inside code, matched ASCII-case-insensitively
/// and not preceded by an identifier character.
pub fn rfind_keyword(sql: &str, needle: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    let needle = needle.as_bytes();

    segments(sql)
        .iter()
        .rev()
        .filter(|seg| seg.is_code())
        .find_map(|seg| {
            let end = seg.range.end.checked_sub(needle.len())?;
            (seg.range.start..=end).rev().find(|&i| {
                bytes[i..i + needle.len()].eq_ignore_ascii_case(needle)
                    && (i == 0 || !is_ident_byte(bytes[i - 1]))
            })
        })
}

/// True for bytes that may continue an identifier.
pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn push_segment(out: &mut Vec<Segment>, kind: SegmentKind, range: Range<usize>) {
    if let Some(last) = out.last_mut() {
        if last.kind == kind && last.range.end == range.start {
            last.range.end = range.end;
            return;
        }
    }
    out.push(Segment { kind, range });
}

fn parse_segment(input: &str) -> IResult<&str, SegmentKind> {
    alt((
        |i| quoted(i).map(|(r, _)| (r, SegmentKind::Quoted)),
        |i| comment(i).map(|(r, _)| (r, SegmentKind::Comment)),
        |i| code(i).map(|(r, _)| (r, SegmentKind::Code)),
    ))(input)
}

/// `'...'` with `''` escapes; an unterminated literal runs to the end.
fn quoted(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        char('\''),
        many0(alt((is_not("'"), tag("''")))),
        opt(char('\'')),
    )))(input)
}

/// `-- ...` up to the newline, or `/* ... */`.
fn comment(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(pair(tag("--"), opt(is_not("\n")))),
        recognize(tuple((tag("/*"), take_until("*/"), tag("*/")))),
        recognize(pair(tag("/*"), rest)),
    ))(input)
}

/// Anything up to the next literal or comment opener.
fn code(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((
        is_not("'-/"),
        recognize(pair(char('-'), not(char('-')))),
        recognize(pair(char('/'), not(char('*')))),
    ))))(input)
}
