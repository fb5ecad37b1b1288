use super::*;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessageContentPartImage, ChatCompletionRequestMessageContentPartText,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use std::time::Instant;

/// Provider for OpenAI-compatible chat completion endpoints (OpenRouter, OpenAI)
pub struct OpenAiProvider {
    name: String,
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Create a provider registered under `name`, talking to `api_base`
    pub fn new(name: &str, api_key: String, api_base: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        let client = Client::with_config(config);

        Self {
            name: name.to_string(),
            client,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse> {
        let start = Instant::now();

        let model = request.model_override.clone().ok_or_else(|| {
            LlmError::ConfigError(format!("No model given for provider {}", self.name))
        })?;

        // Either text-only or multimodal with the drawing attached
        let user_message: ChatCompletionRequestUserMessage = if let Some(ref image_url) =
            request.image_url
        {
            let content_parts = vec![
                ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartText {
                        text: request.prompt.clone(),
                    },
                ),
                ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImage {
                        image_url: ImageUrl {
                            url: image_url.clone(),
                            detail: Some(ImageDetail::Auto),
                        },
                    },
                ),
            ];

            ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Array(content_parts),
                name: None,
            }
        } else {
            ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(request.prompt.clone()),
                name: None,
            }
        };

        let mut req_builder = CreateChatCompletionRequestArgs::default();
        req_builder.model(&model).messages([
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system_prompt.as_str())
                .build()
                .map_err(|e| LlmError::ApiError(e.to_string()))?
                .into(),
            user_message.into(),
        ]);

        if let Some(max_tokens) = request.max_tokens {
            req_builder.max_tokens(max_tokens);
        }

        let chat_request = req_builder
            .build()
            .map_err(|e| LlmError::ApiError(e.to_string()))?;

        let response =
            tokio::time::timeout(request.timeout, self.client.chat().create(chat_request))
                .await
                .map_err(|_| LlmError::Timeout(request.timeout))?
                .map_err(|e| LlmError::ApiError(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::ParseError("No content in response".to_string()))?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let tokens_used = response.usage.map(|u| u.total_tokens);

        tracing::debug!(
            "{} answered with {} in {}ms ({:?} tokens)",
            model,
            text.trim(),
            latency_ms,
            tokens_used
        );

        Ok(GenerateResponse {
            text: text.trim().to_string(),
            metadata: ResponseMetadata {
                provider: self.name.clone(),
                model,
                tokens_used,
                latency_ms,
            },
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn supports_vision(&self) -> bool {
        // Text-only models behind the endpoint answer with an API error, which
        // surfaces as that model's error marker
        true
    }
}
