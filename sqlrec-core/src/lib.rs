//! # sqlrec core
//!
//! Core abstractions and runtime for turning "recommend N items for user U"
//! into generated SQL, with a deterministic fallback query.
//!
//! This crate provides the service traits, the pure pipeline stages
//! (extraction, validation, fallback query, row parsing), prompt strategies,
//! and the runtime that sequences them with retry escalation.

pub mod error;
pub mod layer;
pub mod pipeline;
pub mod plugin;
pub mod runtime;
pub mod service;
pub mod strategy;
pub mod types;

// Re-exports
pub use error::RecError;
pub use layer::Layer;
pub use pipeline::{CatalogSchema, FallbackQueryBuilder, Ident};
pub use plugin::{Plugin, PluginEngine, PluginPhase};
pub use runtime::{Recommender, RecommenderBuilder, RetryPolicy, Session};
pub use service::{CompletionService, QueryService};
pub use strategy::{GuidedPrompt, PromptContext, PromptStrategy, SimplePrompt};
pub use types::*;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RecError>;
