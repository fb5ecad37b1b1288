//! Prompt source: picks the phrase the user has to draw.

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::sync::Arc;
use std::time::Duration;

use crate::llm::{GenerateRequest, LlmError, LlmManager, LlmResult};

const PROMPT_SYSTEM_PROMPT: &str = "You are a helpful assistant that generates simple, clear drawing prompts for a Pictionary game. \
    Generate a single word or short phrase that would be fun to draw and guess. \
    Respond with ONLY the word or short phrase, nothing else.";

/// Used whenever the prompt model is unavailable
pub const FALLBACK_PROMPTS: &[&str] = &[
    "cat",
    "dog",
    "house",
    "tree",
    "car",
    "bicycle",
    "sun",
    "moon",
    "star",
    "flower",
    "book",
    "computer",
    "phone",
    "chair",
    "table",
    "pizza",
    "hamburger",
    "airplane",
    "train",
    "boat",
];

#[async_trait]
pub trait PromptSource: Send + Sync {
    async fn generate_prompt(&self) -> LlmResult<String>;
}

/// Pick a random phrase from the fallback list
pub fn random_fallback() -> String {
    FALLBACK_PROMPTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or("cat")
        .to_string()
}

/// Ask the source for a phrase, falling back to the local list on failure
pub async fn prompt_or_fallback(source: &dyn PromptSource) -> String {
    match source.generate_prompt().await {
        Ok(phrase) => phrase,
        Err(e) => {
            let fallback = random_fallback();
            tracing::warn!("Prompt generation failed: {}, using fallback {:?}", e, fallback);
            fallback
        }
    }
}

/// Prompt source backed by a chat model
pub struct LlmPromptSource {
    manager: Arc<LlmManager>,
    model_id: String,
    timeout: Duration,
    max_tokens: u32,
}

impl LlmPromptSource {
    pub fn new(manager: Arc<LlmManager>, model_id: String, timeout: Duration, max_tokens: u32) -> Self {
        Self {
            manager,
            model_id,
            timeout,
            max_tokens,
        }
    }
}

#[async_trait]
impl PromptSource for LlmPromptSource {
    async fn generate_prompt(&self) -> LlmResult<String> {
        let request = GenerateRequest {
            system_prompt: PROMPT_SYSTEM_PROMPT.to_string(),
            prompt: "Generate a Pictionary prompt.".to_string(),
            image_url: None,
            max_tokens: Some(self.max_tokens),
            timeout: self.timeout,
            model_override: None,
        };

        let response = self
            .manager
            .generate_from_model(&self.model_id, request)
            .await?;

        let phrase = response
            .text
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim_end_matches('.')
            .trim()
            .to_string();

        if phrase.is_empty() {
            return Err(LlmError::ParseError("Prompt model returned nothing".to_string()));
        }

        Ok(phrase)
    }
}

/// Prompt source that never calls out, for running without any provider
pub struct FallbackPromptSource;

#[async_trait]
impl PromptSource for FallbackPromptSource {
    async fn generate_prompt(&self) -> LlmResult<String> {
        Ok(random_fallback())
    }
}
