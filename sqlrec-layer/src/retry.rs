//! Retry layer with exponential backoff.
//!
//! Re-sends the same call on transport-level failures only (network,
//! timeout, rate limit). Backend errors such as SQL errors are returned as
//! they are; re-prompting on those is the orchestrator's job.

use sqlrec_core::error::RecError;
use sqlrec_core::layer::Layer;
use sqlrec_core::service::{CompletionService, QueryService};
use sqlrec_core::types::*;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Retry layer configuration
#[derive(Debug, Clone)]
pub struct RetryLayer {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryLayer {
    /// Create a new retry layer with default settings
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set initial delay
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculate delay for a given attempt
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

impl Default for RetryLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for RetryLayer {
    type Layered = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Layered {
        RetryService {
            inner,
            config: self.clone(),
        }
    }
}

/// Service wrapped with retry logic
#[derive(Debug)]
pub struct RetryService<S> {
    inner: S,
    config: RetryLayer,
}

impl<S> RetryService<S> {
    /// Execute with retry logic
    async fn execute_with_retry<T, F, Fut>(&self, mut operation: F) -> Result<T, RecError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, RecError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_transient() || attempt >= self.config.max_retries {
                        return Err(e);
                    }

                    let delay = self.config.calculate_delay(attempt);
                    tracing::debug!(
                        "Retry attempt {}/{} after {}, waiting {:?}",
                        attempt + 1,
                        self.config.max_retries,
                        e,
                        delay
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<S: CompletionService> CompletionService for RetryService<S> {
    fn info(&self) -> Arc<ServiceInfo> {
        self.inner.info()
    }

    async fn connect(&self) -> Result<String, RecError> {
        self.execute_with_retry(|| self.inner.connect()).await
    }

    async fn ask(&self, prompt: &str) -> Result<String, RecError> {
        self.execute_with_retry(|| self.inner.ask(prompt)).await
    }
}

#[async_trait]
impl<S: QueryService> QueryService for RetryService<S> {
    fn info(&self) -> Arc<ServiceInfo> {
        self.inner.info()
    }

    async fn connect(&self) -> Result<String, RecError> {
        self.execute_with_retry(|| self.inner.connect()).await
    }

    async fn execute_sql(&self, sql: &str) -> Result<QueryResponse, RecError> {
        self.execute_with_retry(|| self.inner.execute_sql(sql)).await
    }
}
