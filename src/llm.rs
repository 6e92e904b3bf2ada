//! Language-model providers behind the [`Generator`] trait.
//!
//! The model is a black box: one prompt in, one string out. Prompt layout
//! lives in `docqa_core::answer`; this module only moves bytes. Retry and
//! timeout behavior match the embedding providers.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use docqa_core::answer::Generator;
use docqa_core::error::GenerateError;

use crate::config::LlmConfig;
use crate::embedding::{api_key, DEFAULT_OLLAMA_URL};
use crate::retry::{http_client, send_json_with_retry};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

fn required_model(config: &LlmConfig) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow!("llm.model required for {} provider", config.provider))
}

fn service_error(e: anyhow::Error) -> GenerateError {
    GenerateError::Service(format!("{:#}", e))
}

fn invalid(what: &str) -> GenerateError {
    GenerateError::Service(format!("invalid response: {}", what))
}

/// Generator used when no language model is configured.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
        Err(GenerateError::Disabled)
    }
}

// ============ Gemini ============

/// `generateContent` on the Gemini API. Requires `GEMINI_API_KEY`.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl GeminiGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: api_key("GEMINI_API_KEY")?,
            model: required_model(config)?,
            max_retries: config.max_retries,
        })
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_response(json: &Value) -> Result<String, GenerateError> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| invalid("Gemini response has no candidate content"))?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    Ok(text)
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let url = format!("{}/models/{}:generateContent", GEMINI_BASE_URL, self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });
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

// ============ OpenAI ============

/// Chat completions on the OpenAI API. Requires `OPENAI_API_KEY`.
pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAIGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: api_key("OPENAI_API_KEY")?,
            model: required_model(config)?,
            max_retries: config.max_retries,
        })
    }
}

fn parse_openai_response(json: &Value) -> Result<String, GenerateError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| invalid("OpenAI response has no message content"))
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn name(&self) -> &str {
        "openai"
    }
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let json = send_json_with_retry("OpenAI", self.max_retries, || {
            self.client
                .post(OPENAI_CHAT_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await
        .map_err(service_error)?;
        parse_openai_response(&json)
    }
}

// ============ Ollama ============

/// Non-streaming `/api/generate` on a local Ollama instance.
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: required_model(config)?,
            max_retries: config.max_retries,
        })
    }
}

fn parse_ollama_response(json: &Value) -> Result<String, GenerateError> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| invalid("Ollama response missing 'response' field"))
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let url = format!("{}/api/generate", self.url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let json = send_json_with_retry("Ollama", self.max_retries, || {
            self.client.post(&url).json(&body)
        })
        .await
        .map_err(service_error)?;
        parse_ollama_response(&json)
    }
}

/// Create the [`Generator`] named by `config.provider`.
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
