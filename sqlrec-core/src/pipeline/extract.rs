//! SQL extraction from free-form model answers.
//!
//! Extraction is an ordered list of matchers tried in sequence; the first
//! non-empty capture wins. A looser matcher is only consulted when the
//! primary list finds nothing.

use crate::types::CandidateSql;
use once_cell::sync::Lazy;
use regex::Regex;

type Matcher = fn(&str) -> Option<String>;

/// The rest of the label line (`sql-server`, `sql title="q.sql"`) is not
/// part of the statement; a one-line fence has no label line to skip.
static SQL_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```[ \t]*sql\b(?:[^\n`]*\n)?(.*?)```").expect("valid sql fence pattern")
});

static ANY_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[^\n`]*\n(.*?)```").expect("valid code fence pattern")
});

static TERMINATED_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\b(?:select|insert|update|delete)\b.*?;").expect("valid statement pattern")
});

static SELECT_TO_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bselect\b.*").expect("valid select pattern"));

/// Primary matchers, in priority order.
const MATCHERS: &[(&str, Matcher)] = &[
    ("sql_fence", sql_fence),
    ("code_fence", code_fence),
    ("terminated_statement", terminated_statement),
];

fn non_empty(capture: &str) -> Option<String> {
    let trimmed = capture.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn sql_fence(text: &str) -> Option<String> {
    SQL_FENCE
        .captures_iter(text)
        .find_map(|caps| caps.get(1).and_then(|m| non_empty(m.as_str())))
}

fn code_fence(text: &str) -> Option<String> {
    ANY_FENCE
        .captures_iter(text)
        .find_map(|caps| caps.get(1).and_then(|m| non_empty(m.as_str())))
}

fn terminated_statement(text: &str) -> Option<String> {
    TERMINATED_STATEMENT
        .find_iter(text)
        .find_map(|m| non_empty(m.as_str()))
}

/// Extract the first SQL statement embedded in `text`.
///
/// Tries, in order: a fenced block labelled `sql`, any fenced block, and a
/// bare statement starting at `SELECT`/`INSERT`/`UPDATE`/`DELETE` up to the
/// next semicolon. Returns `None` when nothing matches.
pub fn extract(text: &str) -> Option<CandidateSql> {
    MATCHERS.iter().find_map(|(name, matcher)| {
        let sql = matcher(text)?;
        tracing::trace!("extracted SQL with matcher {}", name);
        Some(CandidateSql::new(sql))
    })
}

/// Loose extraction: everything from the first `SELECT` to the end of text.
pub fn fallback_extract(text: &str) -> Option<CandidateSql> {
    SELECT_TO_END
        .find(text)
        .and_then(|m| non_empty(m.as_str()))
        .map(CandidateSql::new)
}

/// Primary extraction, then the loose one.
pub fn extract_any(text: &str) -> Option<CandidateSql> {
    extract(text).or_else(|| fallback_extract(text))
}
