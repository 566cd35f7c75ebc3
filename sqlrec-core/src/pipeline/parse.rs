//! Row parsing: the first column of every row is a catalog id.

use crate::types::QueryResponse;
use serde_json::Value;

/// Convert one cell to an id; floats are truncated toward zero.
fn cell_to_id(cell: &Value) -> Option<i64> {
    match cell {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
        _ => None,
    }
}

fn truncate(f: f64) -> Option<i64> {
    let t = f.trunc();
    // i64::MAX is not exactly representable; 2^63 is the first value out of range
    (t.is_finite() && t >= i64::MIN as f64 && t < 9_223_372_036_854_775_808.0).then_some(t as i64)
}

/// Ordered ids from the first column; rows without a numeric first cell are skipped.
pub fn parse(response: &QueryResponse) -> Vec<i64> {
    let ids: Vec<i64> = response
        .rows
        .iter()
        .filter_map(|row| row.first().and_then(cell_to_id))
        .collect();

    if ids.len() < response.rows.len() {
        tracing::debug!(
            "skipped {} of {} rows without a numeric first column",
            response.rows.len() - ids.len(),
            response.rows.len()
        );
    }

    ids
}
