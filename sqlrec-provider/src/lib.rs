//! # sqlrec providers
//!
//! Concrete completion and query services.

pub mod http;
pub mod openai;

// Re-exports
pub use http::{HttpQueryBuilder, HttpQueryService};
pub use openai::{OpenAiBuilder, OpenAiCompletion};

use sqlrec_core::error::RecError;

/// Create a DeepSeek completion service (OpenAI-compatible)
///
/// # Example
///
/// ```ignore
/// use sqlrec_provider::deepseek;
///
/// let completion = deepseek("your-api-key")?;
/// ```
pub fn deepseek(api_key: impl Into<String>) -> Result<OpenAiCompletion, RecError> {
    OpenAiCompletion::builder()
        .api_key(api_key)
        .api_base("https://api.deepseek.com/v1")
        .model("deepseek-chat")
        .build_with_id("deepseek", "DeepSeek")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlrec_core::service::CompletionService;

    #[test]
    fn test_deepseek_identity() {
        let service = deepseek("sk-test").unwrap();
        assert_eq!(service.info().id, "deepseek");
        assert_eq!(service.model(), "deepseek-chat");
    }
}
