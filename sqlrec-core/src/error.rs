//! Error types for recommendation pipeline operations.

/// The main error type for the recommendation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RecError {
    /// The model answer contained no recognizable SQL statement
    #[error("No SQL found in model answer")]
    NoSqlFound,

    /// The candidate SQL was truncated by the model
    #[error("SQL rejected: {0}")]
    EllipsisRejected(String),

    /// The query ran but yielded no usable identifiers
    #[error("Query returned no usable rows")]
    EmptyResult,

    /// Prompt-completion service errors
    #[error("Completion service error: {0}")]
    Completion(String),

    /// Query execution service errors (message carries backend text)
    #[error("Query service error: {0}")]
    Query(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Rate limit errors
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Timeout errors
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// The deterministic fallback query failed or returned nothing
    #[error("Fallback exhausted: {0}")]
    FallbackExhausted(String),

    /// A run is already in flight for this session
    #[error("A recommendation run is already in progress")]
    Busy,

    /// Invalid request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Plugin errors
    #[error("Plugin error ({plugin}): {message}")]
    Plugin { plugin: String, message: String },
}

impl RecError {
    /// Create an ellipsis rejection
    pub fn ellipsis(msg: impl Into<String>) -> Self {
        Self::EllipsisRejected(msg.into())
    }

    /// Create a completion service error
    pub fn completion(msg: impl Into<String>) -> Self {
        Self::Completion(msg.into())
    }

    /// Create a query service error
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create an authentication error
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limit(msg: impl Into<String>) -> Self {
        Self::RateLimit(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a fallback exhaustion error
    pub fn fallback_exhausted(msg: impl Into<String>) -> Self {
        Self::FallbackExhausted(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a plugin error
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Check if this is a transport-level error worth re-sending as-is
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RecError::Network(_) | RecError::Timeout(_) | RecError::RateLimit(_)
        )
    }
}
