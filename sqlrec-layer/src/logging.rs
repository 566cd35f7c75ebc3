//! Logging layer for service calls.

use sqlrec_core::error::RecError;
use sqlrec_core::layer::Layer;
use sqlrec_core::service::{CompletionService, QueryService};
use sqlrec_core::types::*;
use async_trait::async_trait;
use std::sync::Arc;

/// Logging layer that logs service operations.
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    prefix: String,
}

impl LoggingLayer {
    /// Create a new logging layer
    pub fn new() -> Self {
        Self {
            prefix: "[sqlrec]".to_string(),
        }
    }

    /// Create a logging layer with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Layered = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Layered {
        LoggingService {
            inner,
            prefix: self.prefix.clone(),
        }
    }
}

/// Service wrapped with logging
#[derive(Debug)]
pub struct LoggingService<S> {
    inner: S,
    prefix: String,
}

impl<S> LoggingService<S> {
    fn log_connect(&self, kind: &str, result: &Result<String, RecError>) {
        match result {
            Ok(endpoint) => tracing::info!("{} {} connected: {}", self.prefix, kind, endpoint),
            Err(e) => tracing::error!("{} {} connect error: {}", self.prefix, kind, e),
        }
    }
}

#[async_trait]
impl<S: CompletionService> CompletionService for LoggingService<S> {
    fn info(&self) -> Arc<ServiceInfo> {
        self.inner.info()
    }

    async fn connect(&self) -> Result<String, RecError> {
        let result = self.inner.connect().await;
        self.log_connect("completion", &result);
        result
    }

    async fn ask(&self, prompt: &str) -> Result<String, RecError> {
        tracing::debug!(
            "{} ask request: service={}, prompt_chars={}",
            self.prefix,
            self.inner.info().id,
            prompt.len()
        );

        let start = std::time::Instant::now();
        let result = self.inner.ask(prompt).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(answer) => {
                tracing::debug!(
                    "{} ask success: answer_chars={}, elapsed={:?}",
                    self.prefix,
                    answer.len(),
                    elapsed
                );
            }
            Err(e) => {
                tracing::error!("{} ask error: {}, elapsed={:?}", self.prefix, e, elapsed);
            }
        }

        result
    }
}

#[async_trait]
impl<S: QueryService> QueryService for LoggingService<S> {
    fn info(&self) -> Arc<ServiceInfo> {
        self.inner.info()
    }

    async fn connect(&self) -> Result<String, RecError> {
        let result = self.inner.connect().await;
        self.log_connect("query", &result);
        result
    }

    async fn execute_sql(&self, sql: &str) -> Result<QueryResponse, RecError> {
        tracing::debug!(
            "{} execute_sql request: service={}, sql={}",
            self.prefix,
            self.inner.info().id,
            sql
        );

        let start = std::time::Instant::now();
        let result = self.inner.execute_sql(sql).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::debug!(
                    "{} execute_sql success: rows={}, elapsed={:?}",
                    self.prefix,
                    response.rows.len(),
                    elapsed
                );
            }
            Err(e) => {
                tracing::error!(
                    "{} execute_sql error: {}, elapsed={:?}",
                    self.prefix,
                    e,
                    elapsed
                );
            }
        }

        result
    }
}
