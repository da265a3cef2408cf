//! Generic `?` placeholders → positional tokens (`$1`, `:1`, ...).

use std::fmt::Write;

use crate::parser::segments;

/// Number every `?` in code as `prefix` + 1-based index.
///
/// With an empty prefix the dialect binds `?` in place and the text is
/// returned as is. Otherwise `??` stands for a literal `?`, and marks inside
/// literals or comments are left alone.
pub fn renumber(sql: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0usize;

    for seg in segments(sql) {
        let mut rest = &sql[seg.range.clone()];
        if !seg.is_code() {
            out.push_str(rest);
            continue;
        }

        while let Some(at) = rest.find('?') {
            out.push_str(&rest[..at]);
            if rest[at + 1..].starts_with('?') {
                out.push('?');
                rest = &rest[at + 2..];
            } else {
                index += 1;
                let _ = write!(out, "{}{}", prefix, index);
                rest = &rest[at + 1..];
            }
        }
        out.push_str(rest);
    }

    out
}

/// Number of generic placeholders `renumber` would replace.
pub fn count(sql: &str) -> usize {
    segments(sql)
        .iter()
        .filter(|seg| seg.is_code())
        .map(|seg| {
            let text = &sql[seg.range.clone()];
            text.matches('?').count() - 2 * text.matches("??").count()
        })
        .sum()
}
