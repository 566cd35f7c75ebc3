//! Strategy layer for attempt-specific behaviors.
//!
//! This module defines how the natural-language request is phrased on each
//! model attempt (plain first attempt vs error-guided retry).

pub mod prompt;

pub use prompt::{build_prompt, GuidedPrompt, PromptContext, PromptStrategy, SimplePrompt};
