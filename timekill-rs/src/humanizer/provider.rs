//! Rewrite and detector providers
//!
//! Both providers are black-box network calls: the rewriter is an Ollama
//! model prompted to rephrase text, the detector is Sapling's AI-content
//! endpoint. Lower detector score means more human-like, by the detector's
//! own convention.

use crate::error::{Result, TimekillError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Rewrites text to read more naturally
#[async_trait::async_trait]
pub trait RewriteProvider: Send + Sync {
    async fn rewrite(&self, text: &str) -> Result<String>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// Scores text for AI-detectability (lower = more human-like)
#[async_trait::async_trait]
pub trait DetectorProvider: Send + Sync {
    async fn detect_score(&self, text: &str) -> Result<f64>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

const REWRITE_PROMPT: &str = "Rewrite the following text so it reads like it was \
written by a person: vary sentence length, prefer plain words, drop filler. \
Keep the meaning identical and reply with only the rewritten text.\n\n";

/// Ollama-backed rewrite provider
pub struct OllamaRewriter {
    model_name: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaRewriter {
    pub fn new(model_name: String) -> Self {
        Self {
            model_name,
            base_url: "http://localhost:11434".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[async_trait::async_trait]
impl RewriteProvider for OllamaRewriter {
    async fn rewrite(&self, text: &str) -> Result<String> {
        debug!(
            "OllamaRewriter: rewriting {} chars with model {}",
            text.len(),
            self.model_name
        );

        let request = OllamaGenerateRequest {
            model: self.model_name.clone(),
            prompt: format!("{}{}", REWRITE_PROMPT, text),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| TimekillError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("OllamaRewriter: request failed with {}: {}", status, error_text);
            return Err(TimekillError::ProviderUnavailable(format!(
                "Ollama request failed: {} - {}",
                status, error_text
            )));
        }

        let body: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| TimekillError::ProviderUnavailable(e.to_string()))?;

        Ok(body.response.trim().to_string())
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// Sapling AI-content detector client.
///
/// Sapling reports a 0..1 AI probability; this client scales it to a 0..100
/// percentage so scores and targets share one unit throughout the system.
pub struct SaplingDetector {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl SaplingDetector {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.sapling.ai".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[derive(Debug, Serialize)]
struct SaplingRequest {
    key: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct SaplingResponse {
    score: f64,
}

#[async_trait::async_trait]
impl DetectorProvider for SaplingDetector {
    async fn detect_score(&self, text: &str) -> Result<f64> {
        debug!("SaplingDetector: scoring {} chars", text.len());

        let request = SaplingRequest {
            key: self.api_key.clone(),
            text: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/v1/aidetect", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| TimekillError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("SaplingDetector: request failed with {}: {}", status, error_text);
            return Err(TimekillError::ProviderUnavailable(format!(
                "Sapling request failed: {} - {}",
                status, error_text
            )));
        }

        let body: SaplingResponse = response
            .json()
            .await
            .map_err(|e| TimekillError::ProviderUnavailable(e.to_string()))?;

        Ok(body.score * 100.0)
    }

    fn name(&self) -> &str {
        "sapling"
    }
}
