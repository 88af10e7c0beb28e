//! Ollama embedding provider and chat generator.
//!
//! Talks to a local Ollama server (`http://localhost:11434` by default) over
//! its REST API. The embedding side defaults to `nomic-embed-text`, which
//! expects `search_document: ` / `search_query: ` framing.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{
    DirectionPrefixes, EmbedDirection, EmbeddingProvider, check_dimensions, ensure_not_blank,
};
use crate::error::{RagError, Result};
use crate::generator::{AnswerGenerator, PromptTemplate};

/// Default Ollama server address.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_DIMENSIONS: usize = 768;
const DEFAULT_CHAT_MODEL: &str = "llama3.2:3b";

const PROVIDER: &str = "Ollama";

fn url_from_env() -> String {
    std::env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string())
}

async fn send<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: String,
    body: &T,
) -> Result<reqwest::Response> {
    let response = client.post(url).json(body).send().await.map_err(|e| {
        error!(provider = PROVIDER, error = %e, "request failed");
        RagError::provider(PROVIDER, format!("request failed: {e}"))
    })?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(provider = PROVIDER, %status, "API error");
        return Err(RagError::provider(PROVIDER, format!("API returned {status}: {body}")));
    }
    Ok(response)
}

/// An [`EmbeddingProvider`] calling Ollama's `POST /api/embed`.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::from_env();
/// let v = provider.embed("Are dogs mammals?", EmbedDirection::Query).await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    dimensions: usize,
    prefixes: DirectionPrefixes,
}

impl Default for OllamaEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL)
    }
}

impl OllamaEmbeddingProvider {
    /// Create a provider for the server at `url` with `nomic-embed-text` (768 dims).
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            prefixes: DirectionPrefixes::nomic(),
        }
    }

    /// Use `OLLAMA_URL`, or the default address when unset.
    pub fn from_env() -> Self {
        Self::new(url_from_env())
    }

    /// Set the model and its output dimension.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Replace the per-direction framing.
    pub fn with_prefixes(mut self, prefixes: DirectionPrefixes) -> Self {
        self.prefixes = prefixes;
        self
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str, direction: EmbedDirection) -> Result<Vec<f32>> {
        self.embed_batch(&[text], direction)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::provider(PROVIDER, "API returned no embeddings"))
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
            model = %self.model,
            batch_size = texts.len(),
            direction = direction.as_str(),
            "embedding batch"
        );

        let body = EmbedRequest {
            model: &self.model,
            input: texts.iter().map(|t| self.prefixes.apply(t, direction)).collect(),
        };
        let response = send(&self.client, format!("{}/api/embed", self.url), &body).await?;
        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            RagError::provider(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        if parsed.embeddings.len() != texts.len() {
            return Err(RagError::provider(
                PROVIDER,
                format!(
                    "requested {} embeddings, received {}",
                    texts.len(),
                    parsed.embeddings.len()
                ),
            ));
        }
        for v in &parsed.embeddings {
            check_dimensions(PROVIDER, self.dimensions, v)?;
        }
        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// An [`AnswerGenerator`] calling Ollama's non-streaming `POST /api/chat`.
pub struct OllamaChatGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    template: PromptTemplate,
}

impl Default for OllamaChatGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL)
    }
}

impl OllamaChatGenerator {
    /// Create a generator for the server at `url` with `llama3.2:3b`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_CHAT_MODEL.into(),
            temperature: 0.1,
            template: PromptTemplate::default(),
        }
    }

    /// Use `OLLAMA_URL`, or the default address when unset.
    pub fn from_env() -> Self {
        Self::new(url_from_env())
    }

    /// Set the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Replace the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl AnswerGenerator for OllamaChatGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, "generating answer");
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system".into(), content: self.template.system_message() },
                ChatMessage {
                    role: "user".into(),
                    content: self.template.user_message(question, context),
                },
            ],
            stream: false,
            options: ChatOptions { temperature: self.temperature },
        };
        let response = send(&self.client, format!("{}/api/chat", self.url), &body).await?;
        let parsed: ChatResponse = response.json().await.map_err(|e| {
            RagError::provider(PROVIDER, format!("failed to parse response: {e}"))
        })?;
        Ok(parsed.message.content.trim().to_string())
    }
}
