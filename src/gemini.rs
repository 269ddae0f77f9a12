use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ProviderError;

/// Model used for the one-shot key test.
pub const TEST_MODEL: &str = "gemini-1.5-flash-latest";

/// Capability a model must list to be offered for post generation.
pub const GENERATE_CONTENT: &str = "generateContent";

/// A model entry as returned by the provider's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawModel {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

/// External generative text API.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Generate text for `prompt` with `model`. One request, no retries.
    async fn generate(&self, api_key: &str, model: &str, prompt: &str) -> Result<String, ProviderError>;
    /// Issue a minimal request to check that `api_key` is accepted.
    async fn check_key(&self, api_key: &str) -> Result<(), ProviderError>;
    /// Fetch the raw model catalog.
    async fn list_models(&self, api_key: &str) -> Result<Vec<RawModel>, ProviderError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

impl GenerationConfig {
    fn posts() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

impl<'a> GenerateRequest<'a> {
    fn new(prompt: &'a str, generation_config: Option<GenerationConfig>) -> Self {
        Self {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
            generation_config,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelsResponse {
    models: Option<Vec<RawModel>>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates?
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

fn upstream_message(error: Option<ApiErrorBody>, fallback: &str) -> ProviderError {
    ProviderError::Upstream(
        error
            .and_then(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string()),
    )
}

/// Google Generative Language API client (API key passed as a query parameter).
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    test_timeout: Duration,
}

impl GeminiClient {
    pub fn new(base_url: &str, timeout: Duration, test_timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            test_timeout,
        }
    }

    async fn post_generate(
        &self,
        api_key: &str,
        model: &str,
        body: &GenerateRequest<'_>,
        timeout: Duration,
    ) -> Result<(StatusCode, GenerateResponse), ProviderError> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(body)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        // Non-JSON bodies are treated as an empty payload so the generic message applies.
        let text = response.text().await?;
        let data = serde_json::from_str(&text).unwrap_or_default();
        Ok((status, data))
    }
}

#[async_trait]
impl TextProvider for GeminiClient {
    async fn generate(&self, api_key: &str, model: &str, prompt: &str) -> Result<String, ProviderError> {
        debug!(model = %model, prompt_chars = prompt.len(), "requesting generation");
        let body = GenerateRequest::new(prompt, Some(GenerationConfig::posts()));
        let (status, mut data) = self.post_generate(api_key, model, &body, self.timeout).await?;

        let error = data.error.take();
        match data.first_text() {
            Some(text) if status == StatusCode::OK => Ok(text),
            _ => {
                warn!(status = %status, model = %model, "generation request failed");
                Err(upstream_message(error, "AI generation failed"))
            }
        }
    }

    async fn check_key(&self, api_key: &str) -> Result<(), ProviderError> {
        let body = GenerateRequest::new("Say hello", None);
        let (status, data) = self
            .post_generate(api_key, TEST_MODEL, &body, self.test_timeout)
            .await?;

        if status == StatusCode::OK && data.candidates.is_some() {
            Ok(())
        } else {
            Err(upstream_message(data.error, "Invalid API key"))
        }
    }

    async fn list_models(&self, api_key: &str) -> Result<Vec<RawModel>, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("key", api_key)])
            .timeout(self.test_timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let data: ModelsResponse = serde_json::from_str(&text).unwrap_or_default();

        match data.models {
            Some(models) if status == StatusCode::OK => Ok(models),
            _ => Err(upstream_message(data.error, "Failed to fetch available models")),
        }
    }
}
