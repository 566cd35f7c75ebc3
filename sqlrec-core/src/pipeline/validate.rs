//! Truncation check applied before any SQL reaches the query service.

use crate::error::RecError;
use crate::types::{CandidateSql, ValidatedSql};

/// Markers models emit when they abbreviate instead of writing full SQL.
const ELLIPSIS_MARKERS: &[&str] = &["..", "\u{2026}"];

/// Reject candidates containing an ellipsis marker.
///
/// This is a textual check only; it does not parse SQL and does not stop
/// semantically invalid statements.
pub fn validate(candidate: CandidateSql) -> Result<ValidatedSql, RecError> {
    if let Some(marker) = ELLIPSIS_MARKERS
        .iter()
        .find(|marker| candidate.as_str().contains(**marker))
    {
        return Err(RecError::ellipsis(format!(
            "statement contains truncation marker \"{}\"",
            marker
        )));
    }

    Ok(ValidatedSql::new(candidate.into_inner()))
}
