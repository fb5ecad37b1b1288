mod ollama;
mod openai;

use async_trait::async_trait;
use std::time::Duration;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// Request to a chat model
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Instructions sent as the system message
    pub system_prompt: String,
    /// The user prompt text
    pub prompt: String,
    /// Optional image (data URL or http URL) for multimodal prompts
    pub image_url: Option<String>,
    /// Maximum response length in tokens (provider-dependent)
    pub max_tokens: Option<u32>,
    /// Timeout for the request
    pub timeout: Duration,
    /// Optional model override (e.g., "google/gemini-2.0-flash-001" instead of configured model)
    pub model_override: Option<String>,
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// The generated text
    pub text: String,
    /// Provider-specific metadata (model used, tokens consumed, etc.)
    pub metadata: ResponseMetadata,
}

/// Metadata about the LLM response
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// Name of the provider (e.g., "openrouter", "ollama")
    pub provider: String,
    /// Model name used
    pub model: String,
    /// Tokens consumed (if available)
    pub tokens_used: Option<u32>,
    /// Latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all LLM providers must implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run a single chat completion
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse>;

    /// Get the name of this provider
    fn name(&self) -> &str;

    /// Whether this provider supports vision/image inputs
    fn supports_vision(&self) -> bool {
        false
    }
}

/// Routes requests to the configured providers
pub struct LlmManager {
    pub providers: Vec<Box<dyn LlmProvider>>,
}

/// Split a `provider:model` id
pub fn split_model_id(model_id: &str) -> LlmResult<(&str, &str)> {
    match model_id.split_once(':') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
            Ok((provider, model))
        }
        _ => Err(LlmError::ConfigError(format!(
            "Invalid model ID '{}', expected 'provider:model'",
            model_id
        ))),
    }
}

impl LlmManager {
    /// Create a new LLM manager with the given providers
    pub fn new(providers: Vec<Box<dyn LlmProvider>>) -> Self {
        Self { providers }
    }

    /// Generate from a specific provider with the model taken from the id
    /// model_id format: "provider:model" (e.g., "openrouter:mistralai/pixtral-12b", "ollama:llava")
    pub async fn generate_from_model(
        &self,
        model_id: &str,
        request: GenerateRequest,
    ) -> LlmResult<GenerateResponse> {
        let (provider_name, model_name) = split_model_id(model_id)?;

        let provider = self
            .providers
            .iter()
            .find(|p| p.name() == provider_name)
            .ok_or_else(|| {
                LlmError::ConfigError(format!("Provider '{}' not configured", provider_name))
            })?;

        if request.image_url.is_some() && !provider.supports_vision() {
            return Err(LlmError::ConfigError(format!(
                "Provider '{}' does not support vision for multimodal requests",
                provider_name
            )));
        }

        let request_with_override = GenerateRequest {
            model_override: Some(model_name.to_string()),
            ..request
        };

        provider.generate(request_with_override).await
    }
}

/// Configuration for LLM providers
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key for the OpenAI-compatible endpoint (OpenRouter by default)
    pub openrouter_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible endpoint
    pub openrouter_base_url: String,
    /// Ollama base URL
    pub ollama_base_url: Option<String>,
    /// Model used to invent drawing prompts, in `provider:model` form
    pub prompt_model: String,
    /// Default timeout for LLM requests
    pub default_timeout: Duration,
    /// Max tokens for a guess
    pub guess_max_tokens: u32,
    /// Max tokens for a generated prompt
    pub prompt_max_tokens: u32,
}

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_PROMPT_MODEL: &str = "openrouter:x-ai/grok-2-1212";

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            openrouter_base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            ollama_base_url: Some("http://localhost:11434".to_string()),
            prompt_model: DEFAULT_PROMPT_MODEL.to_string(),
            default_timeout: Duration::from_secs(30),
            guess_max_tokens: 20,
            prompt_max_tokens: 50,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ollama_base_url = match std::env::var("OLLAMA_BASE_URL") {
            Ok(url) => {
                let trimmed = url.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Err(_) => defaults.ollama_base_url,
        };

        Self {
            openrouter_api_key: non_empty_env("OPENROUTER_API_KEY"),
            openrouter_base_url: non_empty_env("OPENROUTER_BASE_URL")
                .unwrap_or(defaults.openrouter_base_url),
            ollama_base_url,
            prompt_model: non_empty_env("PROMPT_MODEL").unwrap_or(defaults.prompt_model),
            default_timeout: std::env::var("LLM_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_timeout),
            guess_max_tokens: std::env::var("GUESS_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.guess_max_tokens),
            prompt_max_tokens: std::env::var("PROMPT_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.prompt_max_tokens),
        }
    }

    /// Build an LlmManager with all configured providers
    pub fn build_manager(&self) -> LlmResult<LlmManager> {
        let mut providers: Vec<Box<dyn LlmProvider>> = Vec::new();

        if let Some(api_key) = &self.openrouter_api_key {
            providers.push(Box::new(OpenAiProvider::new(
                "openrouter",
                api_key.clone(),
                self.openrouter_base_url.clone(),
            )));
        }

        if let Some(base_url) = &self.ollama_base_url {
            providers.push(Box::new(OllamaProvider::new(base_url.clone())?));
        }

        if providers.is_empty() {
            return Err(LlmError::ConfigError(
                "No LLM providers configured. Set OPENROUTER_API_KEY or OLLAMA_BASE_URL"
                    .to_string(),
            ));
        }

        Ok(LlmManager::new(providers))
    }
}
