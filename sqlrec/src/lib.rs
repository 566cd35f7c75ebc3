//! # sqlrec
//!
//! Natural-language recommendations through generated SQL, with a
//! deterministic fallback query when the model cannot produce a usable one.
//!
//! A run asks the completion service for SQL, extracts and validates it,
//! executes it on the query service and parses program ids from the rows.
//! A failed first attempt is retried once with the database error fed back
//! into the prompt, then a fixed scoring query takes over.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! sqlrec = { version = "0.1", features = ["openai", "layers"] }
//! ```
//!
//! ```ignore
//! use sqlrec::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let completion = OpenAiCompletion::builder()
//!     .api_key("your-api-key")
//!     .temperature(0.0)
//!     .build()?;
//! let query = HttpQueryService::builder()
//!     .base_url("http://localhost:8080")
//!     .build()?;
//!
//! let recommender = Recommender::builder(completion, query)
//!     .completion_layer(LoggingLayer::new())
//!     .query_layer(LoggingLayer::new())
//!     .finish();
//!
//! let outcome = recommender
//!     .session()
//!     .recommend(RecommendationRequest::new(42, 5)?)
//!     .await?;
//! println!("{:?}", outcome.recommended_ids);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: `openai`, `layers` and `plugins`
//! - `openai`: OpenAI-compatible completion service and HTTP query service
//! - `providers`: All available services
//! - `layers`: Built-in layers (logging, retry)
//! - `plugins`: Built-in plugins (outcome channel, attempt log)
//! - `full`: All features enabled

// Re-export core types and traits
pub use sqlrec_core::*;

// Re-export services under `provider` module
#[cfg(feature = "sqlrec-provider")]
pub mod provider {
    //! Completion and query service implementations.
    pub use sqlrec_provider::*;
}

// Re-export layers under `layer` module
#[cfg(feature = "sqlrec-layer")]
pub mod layer {
    //! Built-in service layers.
    pub use sqlrec_layer::*;
}

// Re-export plugins under `plugin` module
#[cfg(feature = "sqlrec-plugin")]
pub mod plugin {
    //! Built-in run plugins.
    pub use sqlrec_plugin::*;
}

/// Prelude module for convenient imports
pub mod prelude {
    //! Prelude module containing the most commonly used types and traits.
    //!
    //! ```
    //! use sqlrec::prelude::*;
    //! ```

    pub use crate::{
        CompletionService, Layer, Plugin, QueryService, RecError, RecommendationOutcome,
        RecommendationRequest, Recommender, Result, RetryPolicy, Session, Stage,
    };

    #[cfg(feature = "sqlrec-provider")]
    pub use crate::provider::*;

    #[cfg(feature = "sqlrec-layer")]
    pub use crate::layer::*;

    #[cfg(feature = "sqlrec-plugin")]
    pub use crate::plugin::*;
}
