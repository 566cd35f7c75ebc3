//! Runtime layer for the recommendation pipeline.
//!
//! This module sequences the pure pipeline stages against the two external
//! services. It is responsible for:
//! - Choosing the prompt strategy for each attempt
//! - Classifying failures into guided retry or fallback
//! - Bounding every network call with a timeout
//! - Guarding sessions against re-entrant runs
//! - Executing plugins in the run lifecycle

pub mod executor;
pub mod policy;
pub mod session;

pub use executor::{Recommender, RecommenderBuilder, DEFAULT_CALL_TIMEOUT};
pub use policy::{RetryPolicy, DEFAULT_SIGNATURES};
pub use session::Session;
