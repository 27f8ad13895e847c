use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::dispatch::{ModelRequest, ModelResult, TextModel, is_valid_model_name};
use crate::error::ForgeError;

const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

const PROVIDER: &str = "gemini";

/// Gemini `generateContent` over plain HTTPS.
pub struct GeminiDispatch {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiDispatch {
    /// No request timeout is set: a slow upstream call waits as long as the
    /// server keeps the connection open. Only connecting is bounded.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ForgeError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl TextModel for GeminiDispatch {
    async fn generate(&self, req: &ModelRequest) -> Result<ModelResult, ForgeError> {
        let start = Instant::now();

        if !is_valid_model_name(&req.model) {
            return Err(ForgeError::Other(format!(
                "refusing to call upstream with model name {:?}",
                req.model
            )));
        }

        let body = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": req.instruction}]}]
        });

        let response = self
            .client
            .post(self.endpoint(&req.model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ForgeError::RateLimited {
                provider: PROVIDER.to_string(),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ForgeError::AuthFailed {
                provider: PROVIDER.to_string(),
                message: format!("{status}"),
            });
        }

        // Cap error body reads to MAX_RESPONSE_BYTES
        if !status.is_success() {
            let error_bytes = response.bytes().await.unwrap_or_default();
            let truncated = &error_bytes[..error_bytes.len().min(MAX_RESPONSE_BYTES)];
            let text = String::from_utf8_lossy(truncated);
            return Err(ForgeError::Upstream {
                provider: PROVIDER.to_string(),
                message: format!("{status}: {text}"),
                status: Some(status.as_u16()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| ForgeError::Upstream {
            provider: PROVIDER.to_string(),
            message: format!("failed to read response body: {e}"),
            status: None,
        })?;

        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(ForgeError::Upstream {
                provider: PROVIDER.to_string(),
                message: format!(
                    "response too large: {} bytes (max {})",
                    bytes.len(),
                    MAX_RESPONSE_BYTES
                ),
                status: None,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ForgeError::SchemaParse(format!("failed to parse response: {e}")))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ForgeError::Upstream {
                provider: PROVIDER.to_string(),
                message: "empty candidates or no text parts".to_string(),
                status: None,
            })?;

        let latency_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(model = %req.model, latency_ms, "gemini call completed");

        Ok(ModelResult {
            text,
            model: req.model.clone(),
            latency_ms,
        })
    }
}
