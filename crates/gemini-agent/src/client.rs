use async_trait::async_trait;
use tracing::{debug, info};

use crate::service::{DecisionRequest, DecisionService, RequestKind};
use crate::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, ThinkingConfig,
};
use crate::{GeminiAgentError, Result};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

// ─── GeminiConfig ─────────────────────────────────────────────────────────

/// Connection and generation settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// Scheme + host, no trailing slash. Overridden in tests.
    pub base_url: String,
    pub temperature: f32,
    /// Sent as `systemInstruction` on every request.
    pub system_prompt: String,
    /// Replaces `system_prompt` for story-plan requests when set.
    pub story_prompt: Option<String>,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: system_prompt.into(),
            story_prompt: None,
        }
    }
}

// ─── GeminiClient ─────────────────────────────────────────────────────────

/// Single-shot `generateContent` client.
///
/// The model is asked for `application/json` output with thinking disabled;
/// the raw text of the first candidate is returned unparsed.
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Build the request body for `prompt`.
    pub fn build_request(&self, prompt: &str) -> GenerateContentRequest {
        self.request_with(&self.config.system_prompt, prompt)
    }

    fn system_prompt_for(&self, kind: RequestKind) -> &str {
        match (kind, &self.config.story_prompt) {
            (RequestKind::Story, Some(story)) => story,
            _ => &self.config.system_prompt,
        }
    }

    fn request_with(&self, system_prompt: &str, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: if system_prompt.is_empty() {
                None
            } else {
                Some(Content::system(system_prompt.to_string()))
            },
            contents: vec![Content::user(prompt)],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".into()),
                candidate_count: Some(1),
                temperature: Some(self.config.temperature),
                thinking_config: Some(ThinkingConfig { thinking_budget: 0 }),
            }),
        }
    }

    /// Send `prompt` and return the first candidate's text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        self.send(self.build_request(prompt)).await
    }

    async fn send(&self, body: GenerateContentRequest) -> Result<String> {
        info!(model = %self.config.model, "calling decision service");

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GeminiAgentError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|source| GeminiAgentError::Parse {
                body: text.clone(),
                source,
            })?;
        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "decision service usage"
            );
        }
        parsed.text().ok_or(GeminiAgentError::EmptyResponse)
    }
}

#[async_trait]
impl DecisionService for GeminiClient {
    async fn decide(&self, request: &DecisionRequest) -> Result<String> {
        let system_prompt = self.system_prompt_for(request.kind);
        self.send(self.request_with(system_prompt, &request.prompt()))
            .await
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
