//! Network embedding providers and provider selection.
//!
//! Implementations of [`easyserve_core::embedding::Embedder`]:
//! - **[`DisabledEmbedder`]**: fails every call; used when embeddings are not configured.
//! - **[`OpenAIEmbedder`]**: any OpenAI-compatible `POST {url}/embeddings` endpoint.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **[`GeminiEmbedder`]**: Google's `batchEmbedContents` endpoint.
//! - `hashing`: the offline [`HashingEmbedder`] from the core crate.
//!
//! Every `embed` call is exactly one HTTP request. Transport failures,
//! non-2xx statuses, malformed bodies, and responses with the wrong number
//! or width of vectors all become [`Error::EmbeddingService`]. Callers that
//! want retries own them.
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use easyserve::config::EmbeddingConfig;
//! # use easyserve::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use tracing::debug;

use easyserve_core::embedding::{check_batch, Embedder, HashingEmbedder};
use easyserve_core::{Error, Result};

use crate::config::EmbeddingConfig;
use crate::http::{self, api_key};

const OPENAI_URL: &str = "https://api.openai.com/v1";
const OLLAMA_URL: &str = "http://localhost:11434";
const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Build the embedder named by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    let provider: Arc<dyn Embedder> = match config.provider.as_str() {
        "disabled" => Arc::new(DisabledEmbedder),
        "hashing" => Arc::new(HashingEmbedder::new(config.dims.unwrap_or(256))),
        "openai" => Arc::new(OpenAIEmbedder::new(config)?),
        "ollama" => Arc::new(OllamaEmbedder::new(config)?),
        "gemini" => Arc::new(GeminiEmbedder::new(config)?),
        other => bail!("Unknown embedding provider: {}", other),
    };
    Ok(provider)
}

fn required_model(config: &EmbeddingConfig, provider: &str) -> anyhow::Result<(String, usize)> {
    let model = config
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("embedding.model required for {} provider", provider))?;
    let dims = config
        .dims
        .ok_or_else(|| anyhow::anyhow!("embedding.dims required for {} provider", provider))?;
    Ok((model, dims))
}

fn floats(value: &serde_json::Value, what: &str) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| Error::embedding(format!("Invalid response: {} is not an array", what)))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| Error::embedding(format!("Invalid response: non-numeric {}", what)))
        })
        .collect()
}

// ============ Disabled ============

/// Used when `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::embedding("Embedding provider is disabled"))
    }
}

// ============ OpenAI-compatible ============

pub struct OpenAIEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let (model, dims) = required_model(config, "OpenAI")?;
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| OPENAI_URL.to_string()),
            api_key: api_key(config.api_key_env.as_deref(), "OPENAI_API_KEY")?,
            model,
            dims,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, batch = texts.len(), "openai embed");
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = self
            .client
            .post(format!("{}/embeddings", self.url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body);
        let json = http::send_json("OpenAI", request, Error::embedding).await?;
        let vectors = parse_openai_response(&json)?;
        check_batch(texts.len(), self.dims, &vectors)?;
        Ok(vectors)
    }
}

/// Extract `data[].embedding`, ordered by `data[].index` when present.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::embedding("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| Error::embedding("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map_or(position, |i| i as usize);
        indexed.push((index, floats(embedding, "embedding")?));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let (model, dims) = required_model(config, "Ollama")?;
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string()),
            model,
            dims,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, batch = texts.len(), "ollama embed");
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = self
            .client
            .post(format!("{}/api/embed", self.url.trim_end_matches('/')))
            .json(&body);
        let json = http::send_json("Ollama", request, Error::embedding).await?;
        let vectors = parse_ollama_response(&json)?;
        check_batch(texts.len(), self.dims, &vectors)?;
        Ok(vectors)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::embedding("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(|e| floats(e, "embedding"))
        .collect()
}

// ============ Gemini ============

/// Google Gemini embeddings via `models/{model}:batchEmbedContents`.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let (model, dims) = required_model(config, "Gemini")?;
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| GEMINI_URL.to_string()),
            api_key: api_key(config.api_key_env.as_deref(), "GOOGLE_API_KEY")?,
            model,
            dims,
        })
    }

    fn request_body(&self, texts: &[String]) -> serde_json::Value {
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|t| {
                serde_json::json!({
                    "model": format!("models/{}", self.model),
                    "content": { "parts": [{ "text": t }] },
                    "outputDimensionality": self.dims,
                })
            })
            .collect();
        serde_json::json!({ "requests": requests })
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, batch = texts.len(), "gemini embed");
        let request = self
            .client
            .post(format!(
                "{}/models/{}:batchEmbedContents",
                self.url.trim_end_matches('/'),
                self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(texts));
        let json = http::send_json("Gemini", request, Error::embedding).await?;
        let vectors = parse_gemini_response(&json)?;
        check_batch(texts.len(), self.dims, &vectors)?;
        Ok(vectors)
    }
}

fn parse_gemini_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::embedding("Invalid Gemini response: missing embeddings array"))?
        .iter()
        .map(|item| {
            let values = item
                .get("values")
                .ok_or_else(|| Error::embedding("Invalid Gemini response: missing values"))?;
            floats(values, "values")
        })
        .collect()
}
