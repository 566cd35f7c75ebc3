//! External service traits.
//!
//! The pipeline talks to two collaborators it does not implement: a
//! prompt-completion service (free-form text in, free-form text out) and a
//! query execution service (SQL in, rows out). Concrete clients live in
//! `sqlrec-provider`; layers in `sqlrec-layer` wrap either kind.

use crate::error::RecError;
use crate::types::{QueryResponse, ServiceInfo};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Prompt-completion service.
#[async_trait]
pub trait CompletionService: Send + Sync + Debug + 'static {
    /// Get service information
    fn info(&self) -> Arc<ServiceInfo>;

    /// Verify connectivity and return the endpoint in use
    async fn connect(&self) -> Result<String, RecError>;

    /// Send a prompt and return the completion text
    async fn ask(&self, prompt: &str) -> Result<String, RecError>;
}

/// Query execution service.
#[async_trait]
pub trait QueryService: Send + Sync + Debug + 'static {
    /// Get service information
    fn info(&self) -> Arc<ServiceInfo>;

    /// Verify connectivity and return the endpoint in use
    async fn connect(&self) -> Result<String, RecError>;

    /// Execute a SQL statement
    ///
    /// Error messages must carry the backend error text; the orchestrator
    /// classifies retries on it.
    async fn execute_sql(&self, sql: &str) -> Result<QueryResponse, RecError>;
}

#[async_trait]
impl<T: CompletionService + ?Sized> CompletionService for Arc<T> {
    fn info(&self) -> Arc<ServiceInfo> {
        (**self).info()
    }

    async fn connect(&self) -> Result<String, RecError> {
        (**self).connect().await
    }

    async fn ask(&self, prompt: &str) -> Result<String, RecError> {
        (**self).ask(prompt).await
    }
}

#[async_trait]
impl<T: QueryService + ?Sized> QueryService for Arc<T> {
    fn info(&self) -> Arc<ServiceInfo> {
        (**self).info()
    }

    async fn connect(&self) -> Result<String, RecError> {
        (**self).connect().await
    }

    async fn execute_sql(&self, sql: &str) -> Result<QueryResponse, RecError> {
        (**self).execute_sql(sql).await
    }
}
