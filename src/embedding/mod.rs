//! Network-backed embedding providers.
//!
//! Implements [`EmbeddingProvider`] for:
//! - **[`GeminiProvider`]**: Google `batchEmbedContents`, with the document/query task type.
//! - **[`OpenAIProvider`]**: OpenAI `/v1/embeddings`.
//! - **[`OllamaProvider`]**: a local Ollama instance's `/api/embed`.
//! - **[`DisabledProvider`]**: always fails; used when embeddings are not configured.
//!
//! `provider = "hash"` maps to the offline [`HashEmbedder`] from
//! `docqa-core`.
//!
//! Each provider owns its HTTP client and API key, read once in its
//! constructor. Transient failures are retried by
//! [`send_json_with_retry`](crate::retry::send_json_with_retry).
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use docqa::config::EmbeddingConfig;
//! # use docqa::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use docqa_core::embedding::{EmbedMode, EmbeddingProvider, HashEmbedder};
use docqa_core::error::EmbedError;

use crate::config::EmbeddingConfig;
use crate::retry::{http_client, send_json_with_retry};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
pub(crate) const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

fn required_model(config: &EmbeddingConfig, provider: &str) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow!("embedding.model required for {} provider", provider))
}

fn required_dims(config: &EmbeddingConfig, provider: &str) -> Result<usize> {
    match config.dims {
        Some(d) if d > 0 => Ok(d),
        _ => bail!("embedding.dims required for {} provider", provider),
    }
}

pub(crate) fn api_key(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow!("{} environment variable not set", var))
}

fn service_error(e: anyhow::Error) -> EmbedError {
    EmbedError::Service(format!("{:#}", e))
}

/// Read a JSON array of numbers as a vector.
fn parse_vector(value: &Value, what: &str) -> Result<Vec<f32>, EmbedError> {
    let values = value
        .as_array()
        .ok_or_else(|| EmbedError::InvalidResponse(format!("{} is not an array", what)))?;
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| EmbedError::InvalidResponse(format!("{} has a non-numeric value", what)))
        })
        .collect()
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Disabled)
    }
}

// ============ Gemini Provider ============

/// Embedding provider using the Gemini API.
///
/// Requires `GEMINI_API_KEY`. Documents are embedded with task type
/// `RETRIEVAL_DOCUMENT` and questions with `RETRIEVAL_QUERY`; both land in
/// the same vector space.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl GeminiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: api_key("GEMINI_API_KEY")?,
            model: required_model(config, "Gemini")?,
            dims: required_dims(config, "Gemini")?,
            max_retries: config.max_retries,
        })
    }
}

fn gemini_task_type(mode: EmbedMode) -> &'static str {
    match mode {
        EmbedMode::Document => "RETRIEVAL_DOCUMENT",
        EmbedMode::Query => "RETRIEVAL_QUERY",
    }
}

fn gemini_request_body(model: &str, dims: usize, texts: &[String], mode: EmbedMode) -> Value {
    let requests: Vec<Value> = texts
        .iter()
        .map(|text| {
            json!({
                "model": format!("models/{}", model),
                "content": { "parts": [{ "text": text }] },
                "taskType": gemini_task_type(mode),
                "outputDimensionality": dims,
            })
        })
        .collect();
    json!({ "requests": requests })
}

/// Parse `{"embeddings": [{"values": [...]}, ...]}`.
fn parse_gemini_response(json: &Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            EmbedError::InvalidResponse("Gemini response missing embeddings array".to_string())
        })?;

    embeddings
        .iter()
        .map(|item| {
            let values = item.get("values").ok_or_else(|| {
                EmbedError::InvalidResponse("Gemini embedding missing values".to_string())
            })?;
            parse_vector(values, "Gemini embedding")
        })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], mode: EmbedMode) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!("{}/models/{}:batchEmbedContents", GEMINI_BASE_URL, self.model);
        let body = gemini_request_body(&self.model, self.dims, texts, mode);
        let json = send_json_with_retry("Gemini", self.max_retries, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await
        .map_err(service_error)?;
        parse_gemini_response(&json)
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API. Requires `OPENAI_API_KEY`.
///
/// OpenAI has no document/query distinction, so the mode is ignored.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: api_key("OPENAI_API_KEY")?,
            model: required_model(config, "OpenAI")?,
            dims: required_dims(config, "OpenAI")?,
            max_retries: config.max_retries,
        })
    }
}

/// Request body for `/v1/embeddings`. `dimensions` asks the
/// `text-embedding-3` models to shorten their output to the configured size.
fn openai_request_body(model: &str, texts: &[String], dims: usize) -> Value {
    json!({
        "model": model,
        "input": texts,
        "dimensions": dims,
    })
}

/// Parse `{"data": [{"index": i, "embedding": [...]}, ...]}`, ordering by
/// `index` so output lines up with input.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            EmbedError::InvalidResponse("OpenAI response missing data array".to_string())
        })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item.get("embedding").ok_or_else(|| {
            EmbedError::InvalidResponse("OpenAI response missing embedding".to_string())
        })?;
        indexed.push((index, parse_vector(embedding, "OpenAI embedding")?));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = openai_request_body(&self.model, texts, self.dims);
        let json = send_json_with_retry("OpenAI", self.max_retries, || {
            self.client
                .post(OPENAI_EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await
        .map_err(service_error)?;
        parse_openai_response(&json)
    }
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance (`POST /api/embed`).
pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: required_model(config, "Ollama")?,
            dims: required_dims(config, "Ollama")?,
            max_retries: config.max_retries,
        })
    }
}

/// Parse `{"embeddings": [[...], ...]}`.
fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            EmbedError::InvalidResponse("Ollama response missing embeddings array".to_string())
        })?;
    embeddings
        .iter()
        .map(|e| parse_vector(e, "Ollama embedding"))
        .collect()
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "input": texts,
        });
        let json = send_json_with_retry("Ollama", self.max_retries, || {
            self.client.post(&url).json(&body)
        })
        .await
        .map_err(service_error)?;
        parse_ollama_response(&json)
    }
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"gemini"` | [`GeminiProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"hash"` | [`HashEmbedder`] |
///
/// # Errors
///
/// Unknown provider names, missing model/dims, or a missing API key.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "gemini" => Ok(Arc::new(GeminiProvider::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        "hash" => Ok(Arc::new(HashEmbedder::new(required_dims(config, "hash")?))),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_task_type_follows_mode() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let body = gemini_request_body("gemini-embedding-001", 768, &texts, EmbedMode::Document);
        let requests = body["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(requests[0]["model"], "models/gemini-embedding-001");
        assert_eq!(requests[1]["content"]["parts"][0]["text"], "b");
        assert_eq!(requests[0]["outputDimensionality"], 768);

        let body = gemini_request_body("gemini-embedding-001", 768, &texts, EmbedMode::Query);
        assert_eq!(body["requests"][0]["taskType"], "RETRIEVAL_QUERY");
    }

    #[test]
    fn parse_gemini_embeddings() {
        let json = json!({
            "embeddings": [
                { "values": [0.1, 0.2] },
                { "values": [0.3, 0.4] }
            ]
        });
        let vectors = parse_gemini_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert!((vectors[1][0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn parse_gemini_missing_values_fails() {
        let json = json!({ "embeddings": [ { "nope": [] } ] });
        assert!(matches!(
            parse_gemini_response(&json),
            Err(EmbedError::InvalidResponse(_))
        ));
    }

    #[test]
    fn openai_requests_configured_dimensions() {
        let texts = vec!["a".to_string()];
        let body = openai_request_body("text-embedding-3-small", &texts, 512);
        assert_eq!(body["model"], "text-embedding-3-small");
        assert_eq!(body["dimensions"], 512);
        assert_eq!(body["input"][0], "a");
    }

    #[test]
    fn parse_openai_orders_by_index() {
        let json = json!({
            "data": [
                { "index": 1, "embedding": [2.0] },
                { "index": 0, "embedding": [1.0] }
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn parse_ollama_embeddings() {
        let json = json!({ "embeddings": [[1.0, 0.0], [0.0, 1.0]] });
        assert_eq!(parse_ollama_response(&json).unwrap().len(), 2);

        let bad = json!({ "embeddings": [["x"]] });
        assert!(parse_ollama_response(&bad).is_err());
    }

    #[test]
    fn create_hash_and_disabled_providers() {
        let config = EmbeddingConfig {
            provider: "hash".to_string(),
            dims: Some(64),
            ..EmbeddingConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "hash");
        assert_eq!(provider.dims(), 64);

        let provider = create_provider(&EmbeddingConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "disabled");
    }

    #[test]
    fn ollama_does_not_need_api_key() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            model: Some("nomic-embed-text".to_string()),
            dims: Some(768),
            ..EmbeddingConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "nomic-embed-text");
    }

    #[tokio::test]
    async fn disabled_provider_refuses_to_embed() {
        let err = DisabledProvider
            .embed(&["x".to_string()], EmbedMode::Query)
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::Disabled));
    }
}
