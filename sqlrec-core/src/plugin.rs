//! Plugin system for run-level extensibility.

use crate::error::RecError;
use crate::types::*;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Plugin execution phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginPhase {
    /// Execute before normal plugins
    Pre,
    /// Execute in normal order
    Normal,
    /// Execute after normal plugins
    Post,
}

/// Plugin trait for run lifecycle hooks.
///
/// Plugins observe runs; unlike layers, which wrap a single service, they
/// see the whole orchestration. A plugin error is logged and never changes
/// the outcome of a run.
#[async_trait]
pub trait Plugin: Send + Sync + Debug + 'static {
    /// Plugin name
    fn name(&self) -> &str;

    /// Plugin execution phase
    fn enforce(&self) -> PluginPhase {
        PluginPhase::Normal
    }

    /// Hook called once a run is connected and about to start its first stage
    async fn on_run_start(&self, _ctx: &RunContext) -> Result<(), RecError> {
        Ok(())
    }

    /// Hook called when a stage fails
    async fn on_attempt_failed(
        &self,
        _ctx: &RunContext,
        _report: &AttemptReport,
    ) -> Result<(), RecError> {
        Ok(())
    }

    /// Hook called with the final outcome of a run
    async fn on_run_end(
        &self,
        _ctx: &RunContext,
        _outcome: &RecommendationOutcome,
    ) -> Result<(), RecError> {
        Ok(())
    }
}

/// Plugin execution engine.
///
/// Manages plugin execution order. Hooks of all plugins run concurrently.
#[derive(Debug, Clone)]
pub struct PluginEngine {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginEngine {
    /// Create a new plugin engine
    pub fn new(mut plugins: Vec<Arc<dyn Plugin>>) -> Self {
        // Sort plugins by phase
        plugins.sort_by_key(|p| match p.enforce() {
            PluginPhase::Pre => 0,
            PluginPhase::Normal => 1,
            PluginPhase::Post => 2,
        });

        Self { plugins }
    }

    /// Get all plugins
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    fn report(&self, hook: &str, results: Vec<Result<(), RecError>>) {
        for (plugin, result) in self.plugins.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!("plugin {} failed in {}: {}", plugin.name(), hook, e);
            }
        }
    }

    /// Run on_run_start hooks
    pub async fn on_run_start(&self, ctx: &RunContext) {
        let futures = self.plugins.iter().map(|p| p.on_run_start(ctx));
        let results = futures::future::join_all(futures).await;
        self.report("on_run_start", results);
    }

    /// Run on_attempt_failed hooks
    pub async fn on_attempt_failed(&self, ctx: &RunContext, report: &AttemptReport) {
        let futures = self.plugins.iter().map(|p| p.on_attempt_failed(ctx, report));
        let results = futures::future::join_all(futures).await;
        self.report("on_attempt_failed", results);
    }

    /// Run on_run_end hooks
    pub async fn on_run_end(&self, ctx: &RunContext, outcome: &RecommendationOutcome) {
        let futures = self.plugins.iter().map(|p| p.on_run_end(ctx, outcome));
        let results = futures::future::join_all(futures).await;
        self.report("on_run_end", results);
    }
}

impl Default for PluginEngine {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
