//! Prompt strategies for the model attempts.
//!
//! - SimplePrompt: the plain request used on the first attempt
//! - GuidedPrompt: the same request plus the previous backend error and
//!   stricter instructions, used on the retry attempt

use crate::types::RecommendationRequest;

/// Inputs available to a prompt strategy.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub user_id: i64,
    pub top_k: u32,
    /// Error text of the previous failed attempt
    pub error_hint: Option<&'a str>,
}

impl<'a> PromptContext<'a> {
    pub fn new(request: &RecommendationRequest) -> Self {
        Self {
            user_id: request.user_id,
            top_k: request.top_k,
            error_hint: None,
        }
    }

    pub fn with_error_hint(mut self, hint: &'a str) -> Self {
        self.error_hint = Some(hint);
        self
    }
}

/// Strategy for rendering the natural-language request sent to the model.
pub trait PromptStrategy: Send + Sync {
    /// Get the strategy name for debugging
    fn name(&self) -> &str;

    /// Render the prompt text
    fn render(&self, ctx: &PromptContext<'_>) -> String;
}

/// Render the first-attempt request for `top_k` recommendations for `user_id`.
pub fn build_prompt(user_id: i64, top_k: u32) -> String {
    format!(
        "Recommend exactly {top_k} programs for the user with id {user_id}.\n\
         Use only this user's own attributes: specialty, track, budget, location, \
         establishment, academic level, grades and stored preferences.\n\
         Write one read-only PostgreSQL SELECT statement that returns the recommended \
         program ids in the first column, best match first, ending with LIMIT {top_k}.\n\
         Return the statement inside a ```sql code block."
    )
}

/// Plain first-attempt prompt.
#[derive(Debug, Clone, Default)]
pub struct SimplePrompt;

impl PromptStrategy for SimplePrompt {
    fn name(&self) -> &str {
        "SimplePrompt"
    }

    fn render(&self, ctx: &PromptContext<'_>) -> String {
        build_prompt(ctx.user_id, ctx.top_k)
    }
}

/// Retry prompt that feeds the previous failure back to the model.
#[derive(Debug, Clone)]
pub struct GuidedPrompt {
    /// Upper bound on the echoed error text, in characters
    pub max_hint_chars: usize,
}

impl GuidedPrompt {
    pub fn new() -> Self {
        Self {
            max_hint_chars: 500,
        }
    }

    pub fn with_max_hint_chars(max_hint_chars: usize) -> Self {
        Self { max_hint_chars }
    }

    fn clip<'s>(&self, hint: &'s str) -> &'s str {
        match hint.char_indices().nth(self.max_hint_chars) {
            Some((idx, _)) => &hint[..idx],
            None => hint,
        }
    }
}

impl Default for GuidedPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptStrategy for GuidedPrompt {
    fn name(&self) -> &str {
        "GuidedPrompt"
    }

    fn render(&self, ctx: &PromptContext<'_>) -> String {
        let mut prompt = build_prompt(ctx.user_id, ctx.top_k);

        if let Some(hint) = ctx.error_hint {
            prompt.push_str(&format!(
                "\n\nThe previous query failed with this database error:\n{}\n",
                self.clip(hint.trim())
            ));
        }

        prompt.push_str(
            "\nIMPORTANT:\n\
             1. Only call jsonb_array_elements_text on columns that hold JSON arrays; \
             otherwise compare the column as text\n\
             2. Cast explicitly when comparing numbers stored as text\n\
             3. Write the complete statement, never abbreviate with \"...\"\n\
             4. Return a single statement, nothing after the closing semicolon",
        );

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_prompt_states_count_and_scope() {
        let prompt = SimplePrompt.render(&PromptContext {
            user_id: 42,
            top_k: 5,
            error_hint: None,
        });

        assert!(prompt.contains("exactly 5 programs"));
        assert!(prompt.contains("user with id 42"));
        assert!(prompt.contains("LIMIT 5"));
        for attribute in ["specialty", "track", "budget", "location", "grades", "preferences"] {
            assert!(prompt.contains(attribute), "missing {attribute}");
        }
    }

    #[test]
    fn test_build_prompt_is_deterministic() {
        assert_eq!(build_prompt(1, 3), build_prompt(1, 3));
        assert_ne!(build_prompt(1, 3), build_prompt(2, 3));
    }

    #[test]
    fn test_guided_prompt_echoes_error() {
        let req = RecommendationRequest { user_id: 9, top_k: 2 };
        let ctx = PromptContext::new(&req)
            .with_error_hint("function jsonb_array_elements_text(text) does not exist");
        let prompt = GuidedPrompt::new().render(&ctx);

        assert!(prompt.starts_with(&build_prompt(9, 2)));
        assert!(prompt.contains("function jsonb_array_elements_text(text) does not exist"));
        assert!(prompt.contains("never abbreviate"));
    }

    #[test]
    fn test_guided_prompt_clips_long_hint() {
        let hint = "é".repeat(50);
        let req = RecommendationRequest { user_id: 1, top_k: 1 };
        let prompt = GuidedPrompt::with_max_hint_chars(10)
            .render(&PromptContext::new(&req).with_error_hint(&hint));

        assert!(prompt.contains(&"é".repeat(10)));
        assert!(!prompt.contains(&"é".repeat(11)));
    }
}
