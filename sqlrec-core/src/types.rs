//! Core types for recommendation runs.

use crate::error::RecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A request for `top_k` recommendations for one user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationRequest {
    pub user_id: i64,
    pub top_k: u32,
}

impl RecommendationRequest {
    /// Create a new request, rejecting `top_k == 0`
    pub fn new(user_id: i64, top_k: u32) -> Result<Self, RecError> {
        let req = Self { user_id, top_k };
        req.check()?;
        Ok(req)
    }

    /// Verify the request invariants (fields are public, so this is re-checked per run)
    pub fn check(&self) -> Result<(), RecError> {
        if self.top_k == 0 {
            return Err(RecError::invalid_request("top_k must be at least 1"));
        }
        Ok(())
    }
}

/// SQL text extracted from a model answer or synthesized by the fallback builder.
///
/// Not yet safe to execute; see [`crate::pipeline::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSql(String);

impl CandidateSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CandidateSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CandidateSql {
    fn from(sql: String) -> Self {
        CandidateSql::new(sql)
    }
}

/// SQL that passed validation. Only obtainable through the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSql(String);

impl ValidatedSql {
    pub(crate) fn new(sql: String) -> Self {
        Self(sql)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One result row: an ordered sequence of scalar or nested JSON values.
pub type Row = Vec<serde_json::Value>;

/// Response of the query execution service
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub changes: Option<i64>,
}

impl QueryResponse {
    /// Create a response holding only rows
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            message: None,
            changes: None,
        }
    }
}

/// Pipeline stage of a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// First model attempt with the plain prompt
    Simple,
    /// Second model attempt with the error-guided prompt
    Guided,
    /// Deterministic scoring query
    Fallback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Simple => "simple",
            Stage::Guided => "guided",
            Stage::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic record of one executed stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttemptReport {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Whether the failure matched the retry policy
    pub retryable: bool,
}

/// Final result of a run.
///
/// After a completed run exactly one of `recommended_ids` (non-empty) or
/// `error` is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationOutcome {
    pub recommended_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_answer_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stage that produced `recommended_ids`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Stage>,
    #[serde(default)]
    pub attempts: Vec<AttemptReport>,
}

impl RecommendationOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.recommended_ids.is_empty()
    }

    /// Outcome for a run that could not get past connectivity
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Service information
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
}

/// Endpoints reported by both services once a session is connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub completion: String,
    pub query: String,
}

/// Context passed to plugins for one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub request: RecommendationRequest,
    pub completion_id: Arc<str>,
    pub query_id: Arc<str>,
}

impl RunContext {
    /// Create a new run context with a fresh id
    pub fn new(
        request: RecommendationRequest,
        completion_id: impl Into<Arc<str>>,
        query_id: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            request,
            completion_id: completion_id.into(),
            query_id: query_id.into(),
        }
    }
}
