//! Per-stage failure counters.

use sqlrec_core::error::RecError;
use sqlrec_core::plugin::Plugin;
use sqlrec_core::types::*;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts runs, stage failures and the stage that produced each success.
///
/// Counters are shared across all sessions of a recommender, so the plugin
/// can be read while runs are in progress.
#[derive(Debug, Default)]
pub struct AttemptLogPlugin {
    runs: AtomicU64,
    failures: DashMap<Stage, u64>,
    successes: DashMap<Stage, u64>,
    last_failure: DashMap<Stage, String>,
}

impl AttemptLogPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runs started
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Number of failed attempts recorded for a stage
    pub fn failures(&self, stage: Stage) -> u64 {
        self.failures.get(&stage).map(|n| *n).unwrap_or(0)
    }

    /// Number of runs whose ids came from a stage
    pub fn successes(&self, stage: Stage) -> u64 {
        self.successes.get(&stage).map(|n| *n).unwrap_or(0)
    }

    /// Most recent failure text for a stage
    pub fn last_failure(&self, stage: Stage) -> Option<String> {
        self.last_failure.get(&stage).map(|s| s.clone())
    }
}

#[async_trait]
impl Plugin for AttemptLogPlugin {
    fn name(&self) -> &str {
        "attempt_log"
    }

    async fn on_run_start(&self, ctx: &RunContext) -> Result<(), RecError> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("run {} started for user {}", ctx.run_id, ctx.request.user_id);
        Ok(())
    }

    async fn on_attempt_failed(
        &self,
        ctx: &RunContext,
        report: &AttemptReport,
    ) -> Result<(), RecError> {
        *self.failures.entry(report.stage).or_insert(0) += 1;
        let failure = report.failure.as_ref().ok_or_else(|| {
            RecError::plugin(
                self.name(),
                format!("{} report for run {} carries no failure text", report.stage, ctx.run_id),
            )
        })?;
        self.last_failure.insert(report.stage, failure.clone());
        tracing::trace!("run {} failed at {}", ctx.run_id, report.stage);
        Ok(())
    }

    async fn on_run_end(
        &self,
        _ctx: &RunContext,
        outcome: &RecommendationOutcome,
    ) -> Result<(), RecError> {
        if let Some(stage) = outcome.source {
            *self.successes.entry(stage).or_insert(0) += 1;
        }
        Ok(())
    }
}
