//! OpenAI completion service using the async-openai crate.
//!
//! Works against any OpenAI-compatible chat endpoint (DeepSeek, local
//! gateways) by overriding the API base.

use sqlrec_core::error::RecError;
use sqlrec_core::service::CompletionService;
use sqlrec_core::types::ServiceInfo;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::sync::Arc;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a PostgreSQL expert. Answer with one SQL query inside a ```sql code block.";

/// Map an async-openai error onto the pipeline error taxonomy
fn map_error(err: OpenAIError) -> RecError {
    if let OpenAIError::Reqwest(e) = &err {
        if e.is_timeout() {
            return RecError::timeout(e.to_string());
        }
    }

    let text = err.to_string();
    let lower = text.to_lowercase();
    if lower.contains("rate limit") {
        RecError::rate_limit(text)
    } else if lower.contains("api key") || lower.contains("unauthorized") {
        RecError::authentication(text)
    } else {
        RecError::completion(format!("OpenAI API error: {}", text))
    }
}

/// OpenAI completion service
#[derive(Clone)]
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    api_base: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    system_prompt: String,
    info: Arc<ServiceInfo>,
}

impl std::fmt::Debug for OpenAiCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompletion")
            .field("info", &self.info)
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiCompletion {
    /// Create a service with default model and endpoint
    pub fn new(api_key: impl Into<String>) -> Result<Self, RecError> {
        Self::builder().api_key(api_key).build()
    }

    /// Create a builder for more configuration options
    pub fn builder() -> OpenAiBuilder {
        OpenAiBuilder::default()
    }

    /// Model used for completions
    pub fn model(&self) -> &str {
        &self.model
    }

    #[allow(deprecated)]
    fn build_request(&self, prompt: &str) -> Result<CreateChatCompletionRequest, RecError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(self.system_prompt.as_str())
            .build()
            .map_err(|e| RecError::completion(format!("Failed to build system message: {}", e)))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| RecError::completion(format!("Failed to build user message: {}", e)))?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(vec![
            ChatCompletionRequestMessage::System(system),
            ChatCompletionRequestMessage::User(user),
        ]);

        if let Some(temperature) = self.temperature {
            builder.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            builder.max_tokens(max_tokens);
        }

        builder
            .build()
            .map_err(|e| RecError::completion(format!("Failed to build request: {}", e)))
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    fn info(&self) -> Arc<ServiceInfo> {
        self.info.clone()
    }

    async fn connect(&self) -> Result<String, RecError> {
        let models = self.client.models().list().await.map_err(map_error)?;
        tracing::debug!(
            "{} reachable at {} ({} models)",
            self.info.name,
            self.api_base,
            models.data.len()
        );
        Ok(self.api_base.clone())
    }

    async fn ask(&self, prompt: &str) -> Result<String, RecError> {
        let request = self.build_request(prompt)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_error)?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RecError::completion("response contained no choices"))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

/// Builder for the OpenAI completion service
#[derive(Default)]
pub struct OpenAiBuilder {
    api_key: Option<String>,
    api_base: Option<String>,
    org_id: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
}

impl OpenAiBuilder {
    /// Set API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set API base URL (for OpenAI-compatible APIs like DeepSeek)
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Set organization ID
    pub fn organization(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// Set model name
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set completion token limit
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Override the system message sent before every prompt
    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Build the service
    pub fn build(self) -> Result<OpenAiCompletion, RecError> {
        self.build_with_id("openai", "OpenAI")
    }

    /// Build a service with a custom id and name
    ///
    /// Useful for OpenAI-compatible APIs that share the protocol but not
    /// the endpoint.
    pub fn build_with_id(
        self,
        service_id: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Result<OpenAiCompletion, RecError> {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| RecError::configuration("API key is required"))?;

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(RecError::configuration(format!(
                    "temperature must be within 0.0..=2.0, got {}",
                    temperature
                )));
            }
        }

        let api_base = self
            .api_base
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let mut config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base.clone());

        if let Some(org_id) = self.org_id {
            config = config.with_org_id(org_id);
        }

        Ok(OpenAiCompletion {
            client: Client::with_config(config),
            api_base,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            system_prompt: self
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            info: Arc::new(ServiceInfo {
                id: service_id.into(),
                name: service_name.into(),
            }),
        })
    }
}
