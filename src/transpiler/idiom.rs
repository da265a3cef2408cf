//! Portable idioms → native spellings.
//!
//! Plain substring substitution over the code parts of a template. At every
//! position, text that already equals some idiom's replacement is copied
//! through untouched, so rewriting rewritten text changes nothing.

use crate::dialect::{Bound, Idiom};
use crate::parser::{is_ident_byte, segments};

/// Apply `idioms` (in table order) to every code segment of `sql`.
pub fn rewrite_idioms(sql: &str, idioms: &[Idiom]) -> String {
    if idioms.is_empty() {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + 32);
    let mut pos = 0;

    for seg in segments(sql) {
        if seg.range.end <= pos {
            continue;
        }
        let start = seg.range.start.max(pos);
        if !seg.is_code() {
            out.push_str(&sql[start..seg.range.end]);
            pos = seg.range.end;
            continue;
        }

        let mut i = start;
        let mut copied = start;
        while i < seg.range.end {
            if let Some(len) = already_rewritten(sql, i, idioms) {
                // May run past this segment, e.g. over a quoted format mask.
                i += len;
                continue;
            }
            if let Some(idiom) = idioms.iter().find(|idiom| matches_at(sql, i, seg.range.end, idiom)) {
                out.push_str(&sql[copied..i]);
                out.push_str(idiom.replacement);
                i += idiom.pattern.len();
                copied = i;
                continue;
            }
            i += sql[i..].chars().next().map_or(1, char::len_utf8);
        }
        out.push_str(&sql[copied..i]);
        pos = i;
    }

    out
}

fn matches_at(sql: &str, i: usize, end: usize, idiom: &Idiom) -> bool {
    if !sql[i..end].starts_with(idiom.pattern) {
        return false;
    }
    let bytes = sql.as_bytes();
    let after = i + idiom.pattern.len();
    match idiom.bound {
        Bound::Anywhere => true,
        Bound::Word => {
            let ends_in_word = idiom.pattern.bytes().last().is_some_and(is_ident_byte);
            (i == 0 || !is_ident_byte(bytes[i - 1]))
                && (!ends_in_word || after == bytes.len() || !is_ident_byte(bytes[after]))
        }
        Bound::Keyword => {
            (i == 0 || bytes[i - 1].is_ascii_whitespace())
                && (after == bytes.len() || bytes[after].is_ascii_whitespace())
        }
    }
}

/// Length of an idiom replacement found verbatim (ignoring ASCII case) at `i`.
fn already_rewritten(sql: &str, i: usize, idioms: &[Idiom]) -> Option<usize> {
    let bytes = sql.as_bytes();
    idioms
        .iter()
        .map(|idiom| idiom.replacement.as_bytes())
        .filter(|r| r.len() > 1)
        .find(|r| {
            bytes.len() - i >= r.len()
                && bytes[i..i + r.len()].eq_ignore_ascii_case(r)
                && (i == 0 || !is_ident_byte(r[0]) || !is_ident_byte(bytes[i - 1]))
        })
        .map(|r| r.len())
}
