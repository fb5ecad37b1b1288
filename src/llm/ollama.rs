use super::*;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Ollama provider implementation
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider talking to the given base URL
    pub fn new(base_url: String) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    /// Check if a model name indicates vision support
    pub fn is_vision_model(model: &str) -> bool {
        let model_lower = model.to_lowercase();
        // Known vision models in Ollama
        model_lower.contains("llava")
            || model_lower.contains("bakllava")
            || model_lower.contains("moondream")
            || model_lower.contains("minicpm-v")
            || model_lower.contains("qwen2-vl")
            || model_lower.contains("qwen2.5-vl")
            || model_lower.contains("llama3.2-vision")
    }

    /// Ollama wants raw base64; accept data URLs directly and fetch anything else
    async fn image_as_base64(&self, url: &str) -> Result<String, LlmError> {
        if let Some((_, payload)) = url.strip_prefix("data:").and_then(|rest| rest.split_once(",")) {
            return Ok(payload.to_string());
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LlmError::ApiError(format!("Failed to fetch image: {}", e)))?;

        if !response.status().is_success() {
            return Err(LlmError::ApiError(format!(
                "Failed to fetch image, status: {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LlmError::ApiError(format!("Failed to read image bytes: {}", e)))?;

        Ok(STANDARD.encode(&bytes))
    }
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    system: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse> {
        let start = Instant::now();

        let model = request.model_override.clone().ok_or_else(|| {
            LlmError::ConfigError("No model given for provider ollama".to_string())
        })?;

        let images = if let Some(ref image_url) = request.image_url {
            if !Self::is_vision_model(&model) {
                return Err(LlmError::ConfigError(format!(
                    "Model {} does not support vision. Use a vision model like llava or moondream.",
                    model
                )));
            }
            Some(vec![self.image_as_base64(image_url).await?])
        } else {
            None
        };

        let ollama_request = OllamaGenerateRequest {
            model: model.clone(),
            system: request.system_prompt,
            prompt: request.prompt,
            stream: false,
            options: request.max_tokens.map(|num_predict| OllamaOptions {
                num_predict: Some(num_predict),
            }),
            images,
        };

        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));

        let response = tokio::time::timeout(
            request.timeout,
            self.client.post(&url).json(&ollama_request).send(),
        )
        .await
        .map_err(|_| LlmError::Timeout(request.timeout))?
        .map_err(|e| LlmError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::ApiError(format!(
                "Ollama API returned status: {}",
                response.status()
            )));
        }

        let ollama_response: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let latency_ms = start.elapsed().as_millis() as u64;

        Ok(GenerateResponse {
            text: ollama_response.response.trim().to_string(),
            metadata: ResponseMetadata {
                provider: "ollama".to_string(),
                model,
                tokens_used: ollama_response.eval_count,
                latency_ms,
            },
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn supports_vision(&self) -> bool {
        // Checked per model in generate()
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_model_detection() {
        assert!(OllamaProvider::is_vision_model("llava:13b"));
        assert!(OllamaProvider::is_vision_model("Moondream"));
        assert!(!OllamaProvider::is_vision_model("llama3.2"));
    }

    #[tokio::test]
    async fn test_data_url_payload_is_passed_through() {
        let provider = OllamaProvider::new("http://localhost:11434".to_string()).unwrap();
        let payload = provider
            .image_as_base64("data:image/png;base64,iVBORw0KGgo=")
            .await
            .unwrap();
        assert_eq!(payload, "iVBORw0KGgo=");
    }

    #[tokio::test]
    async fn test_text_model_rejects_images() {
        let provider = OllamaProvider::new("http://localhost:11434".to_string()).unwrap();
        let request = GenerateRequest {
            system_prompt: String::new(),
            prompt: "What is drawn here?".to_string(),
            image_url: Some("data:image/png;base64,AA==".to_string()),
            max_tokens: Some(20),
            timeout: Duration::from_secs(1),
            model_override: Some("llama3.2".to_string()),
        };

        let result = provider.generate(request).await;
        assert!(matches!(result, Err(LlmError::ConfigError(_))));
    }

    #[tokio::test]
    #[ignore] // Only run with Ollama running locally
    async fn test_ollama_generate() {
        let provider = OllamaProvider::new("http://localhost:11434".to_string()).unwrap();

        let request = GenerateRequest {
            system_prompt: "Respond with a single word.".to_string(),
            prompt: "Name an animal that barks.".to_string(),
            image_url: None,
            max_tokens: Some(20),
            timeout: Duration::from_secs(30),
            model_override: Some("llama3.2".to_string()),
        };

        let response = provider.generate(request).await.unwrap();

        assert!(!response.text.is_empty());
        assert_eq!(response.metadata.provider, "ollama");
        println!("Generated text: {}", response.text);
    }
}
