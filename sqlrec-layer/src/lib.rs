//! # sqlrec layers
//!
//! Built-in layers for sqlrec services. Each layer wraps either the
//! completion service or the query service.
//!
//! Currently implemented layers:
//! - `LoggingLayer`: Logs every call with timing information
//! - `RetryLayer`: Automatic retry with exponential backoff for transient errors
//!
//! ## Usage
//!
//! ```ignore
//! use sqlrec_core::Recommender;
//! use sqlrec_layer::{LoggingLayer, RetryLayer};
//!
//! let recommender = Recommender::builder(completion, query)
//!     .completion_layer(RetryLayer::new().with_max_retries(3))
//!     .completion_layer(LoggingLayer::new())
//!     .query_layer(LoggingLayer::new())
//!     .finish();
//! ```

pub mod logging;
pub mod retry;

// Re-exports
pub use logging::{LoggingLayer, LoggingService};
pub use retry::{RetryLayer, RetryService};
