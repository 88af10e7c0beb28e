//! OpenAI-compatible embedding provider and chat generator.
//!
//! Both talk to any service exposing the OpenAI REST surface (OpenAI,
//! OpenRouter, Groq, DeepSeek, ...) through a configurable base URL.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{
    DirectionPrefixes, EmbedDirection, EmbeddingProvider, check_dimensions, ensure_not_blank,
};
use crate::error::{RagError, Result};
use crate::generator::{AnswerGenerator, PromptTemplate};

/// The default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// The OpenRouter API base URL.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// The default model for OpenAI embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const PROVIDER: &str = "OpenAI";

fn require_key(api_key: String) -> Result<String> {
    if api_key.trim().is_empty() {
        return Err(RagError::provider(PROVIDER, "API key must not be empty"));
    }
    Ok(api_key)
}

fn key_from_env(var: &str) -> Result<String> {
    std::env::var(var)
        .map_err(|_| RagError::provider(PROVIDER, format!("{var} environment variable not set")))
}

async fn api_error(response: reqwest::Response) -> RagError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    error!(provider = PROVIDER, %status, "API error");
    RagError::provider(PROVIDER, format!("API returned {status}: {detail}"))
}

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// Uses `reqwest` to call the endpoint directly.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `prefixes` – per-direction framing, none by default.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?;
/// let embedding = provider.embed("hello world", EmbedDirection::Query).await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
    prefixes: DirectionPrefixes,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    ///
    /// Uses the default model (`text-embedding-3-small`) and dimensions (1536).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: OPENAI_BASE_URL.into(),
            api_key: require_key(api_key.into())?,
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
            prefixes: DirectionPrefixes::none(),
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(key_from_env("OPENAI_API_KEY")?)
    }

    /// Point at another OpenAI-compatible service.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    ///
    /// Call [`with_dimensions`](Self::with_dimensions) too if the model's size differs.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    ///
    /// When set, the API returns embeddings truncated to this size.
    /// This also updates the value returned by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Frame texts per direction before sending them.
    pub fn with_prefixes(mut self, prefixes: DirectionPrefixes) -> Self {
        self.prefixes = prefixes;
        self
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str, direction: EmbedDirection) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text], direction).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::provider(PROVIDER, "API returned empty response"))
    }

    async fn embed_batch(
        &self,
        texts: &[&str],
        direction: EmbedDirection,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            ensure_not_blank(text, direction)?;
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            direction = direction.as_str(),
            "embedding batch"
        );

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts.iter().map(|t| self.prefixes.apply(t, direction)).collect(),
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::provider(PROVIDER, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::provider(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        if embedding_response.data.len() != texts.len() {
            return Err(RagError::provider(
                PROVIDER,
                format!(
                    "requested {} embeddings, received {}",
                    texts.len(),
                    embedding_response.data.len()
                ),
            ));
        }
        let vectors: Vec<Vec<f32>> =
            embedding_response.data.into_iter().map(|d| d.embedding).collect();
        for v in &vectors {
            check_dimensions(PROVIDER, self.dimensions, v)?;
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// An [`AnswerGenerator`] backed by an OpenAI-compatible `/chat/completions` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit::openai::{OpenAIChatGenerator, OPENROUTER_BASE_URL};
///
/// let generator = OpenAIChatGenerator::new(std::env::var("OPENROUTER_API_KEY")?)?
///     .with_base_url(OPENROUTER_BASE_URL)
///     .with_model("meta-llama/llama-3.1-8b-instruct");
/// ```
pub struct OpenAIChatGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    template: PromptTemplate,
}

impl OpenAIChatGenerator {
    /// Create a generator for the OpenAI API with the given key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: OPENAI_BASE_URL.into(),
            api_key: require_key(api_key.into())?,
            model: DEFAULT_CHAT_MODEL.into(),
            temperature: 0.1,
            template: PromptTemplate::default(),
        })
    }

    /// Create a generator from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::new(key_from_env("OPENAI_API_KEY")?)
    }

    /// Create an OpenRouter generator from `OPENROUTER_API_KEY`.
    pub fn openrouter_from_env() -> Result<Self> {
        Ok(Self::new(key_from_env("OPENROUTER_API_KEY")?)?.with_base_url(OPENROUTER_BASE_URL))
    }

    /// Point at another OpenAI-compatible service.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Replace the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }
}

#[async_trait]
impl AnswerGenerator for OpenAIChatGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            context_len = context.len(),
            "generating answer"
        );

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system".into(), content: self.template.system_message() },
                ChatMessage {
                    role: "user".into(),
                    content: self.template.user_message(question, context),
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::provider(PROVIDER, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::provider(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| RagError::provider(PROVIDER, "API returned no choices"))
    }
}
