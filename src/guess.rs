//! Guess source: asks the configured vision models what the drawing shows.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::canvas::CanvasImage;
use crate::llm::{GenerateRequest, LlmManager, LlmResult};
use crate::matching::clean_guess;
use crate::types::{Guess, GuessRecord, ModelId};

const GUESS_SYSTEM_PROMPT: &str = "You are an AI that analyzes drawings and tries to guess what they represent. \
    Be extremely concise and direct in your guess. Respond with ONLY the object or concept you see in the drawing, \
    using a single word or very short phrase. Do not include explanations, confidence levels, or any other text. \
    Just the object name.";

const GUESS_USER_PROMPT: &str = "What is drawn in this image? Provide ONLY a single word or very short phrase as your guess. No explanations.";

/// Error marker shown for a model whose request failed
pub fn error_marker(model_id: &str) -> String {
    format!("Error: Could not analyze the drawing with {}", model_id)
}

#[async_trait]
pub trait GuessSource: Send + Sync {
    /// Raw answer of one model for the given drawing
    async fn guess(&self, image: &CanvasImage, model_id: &str) -> LlmResult<String>;

    /// Ask every model concurrently and wait for all of them to settle.
    ///
    /// Never fails as a whole: a model whose request fails contributes an
    /// error marker instead of an answer. Successful answers are cleaned up
    /// with [`clean_guess`].
    async fn guess_all(&self, image: &CanvasImage, model_ids: &[ModelId]) -> GuessRecord {
        let tasks = model_ids.iter().map(|model_id| async move {
            let guess = match self.guess(image, model_id).await {
                Ok(raw) => {
                    let cleaned = clean_guess(&raw);
                    tracing::debug!("Model {} guessed {:?} (raw {:?})", model_id, cleaned, raw);
                    Guess::Answer(cleaned)
                }
                Err(e) => {
                    tracing::error!("Model {} failed: {}", model_id, e);
                    Guess::Error(error_marker(model_id))
                }
            };
            (model_id.clone(), guess)
        });

        futures::future::join_all(tasks).await.into_iter().collect()
    }
}

/// Guess source backed by the LLM providers
pub struct LlmGuessSource {
    manager: Arc<LlmManager>,
    timeout: Duration,
    max_tokens: u32,
}

impl LlmGuessSource {
    pub fn new(manager: Arc<LlmManager>, timeout: Duration, max_tokens: u32) -> Self {
        Self {
            manager,
            timeout,
            max_tokens,
        }
    }
}

#[async_trait]
impl GuessSource for LlmGuessSource {
    async fn guess(&self, image: &CanvasImage, model_id: &str) -> LlmResult<String> {
        let request = GenerateRequest {
            system_prompt: GUESS_SYSTEM_PROMPT.to_string(),
            prompt: GUESS_USER_PROMPT.to_string(),
            image_url: Some(image.as_data_url().to_string()),
            max_tokens: Some(self.max_tokens),
            timeout: self.timeout,
            model_override: None,
        };

        let response = self.manager.generate_from_model(model_id, request).await?;
        Ok(response.text)
    }
}
