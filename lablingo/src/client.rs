use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::{
    error::{AnalysisError, Result},
    models::{AnalysisRequest, AnalysisResponse},
    prompt::{ATTACHMENT_DIRECTIVE, SYSTEM_INSTRUCTION, text_directive},
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Low temperature keeps the output structure stable between calls.
const TEMPERATURE: f64 = 0.2;

/// Anything that can turn a lab report into an [`AnalysisResponse`]
#[async_trait]
pub trait LabAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse>;
}

/// Connection settings for the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable read on every call, so a newly selected key is
    /// picked up without a restart.
    pub api_key_var: String,
    /// Fixed key; takes precedence over `api_key_var`.
    pub api_key: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_var: DEFAULT_API_KEY_VAR.to_string(),
            api_key: None,
        }
    }
}

/// [`LabAnalyzer`] backed by the Gemini `generateContent` endpoint
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn api_key(&self) -> Result<String> {
        if let Some(key) = &self.config.api_key {
            return Ok(key.clone());
        }
        std::env::var(&self.config.api_key_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AnalysisError::Credential(format!(
                    "{} environment variable not set",
                    self.config.api_key_var
                ))
            })
    }

    async fn call(&self, payload: &Value) -> Result<String> {
        let api_key = self.api_key()?;

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = service_error_message(&body);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    AnalysisError::Credential(format!("{}: {}", status, message))
                }
                _ => AnalysisError::Transport(format!(
                    "Gemini request failed: {}: {}",
                    status, message
                )),
            });
        }

        let response_json: Value = response.json().await?;
        extract_text(&response_json)
    }
}

#[async_trait]
impl LabAnalyzer for GeminiClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let payload = build_payload(request)?;

        info!(
            model = %self.config.model,
            has_file = request.file.is_some(),
            text_chars = request.free_text.len(),
            "Sending lab report for analysis"
        );

        let outcome = match self.call(&payload).await {
            Ok(text) => AnalysisResponse::from_model_text(&text),
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(response) => info!(tests = response.tests.len(), "Lab report analysis completed"),
            Err(e) => error!(error = %e, "Gemini analysis error"),
        }

        outcome
    }
}

/// Build the `generateContent` body for a submission.
///
/// Fails with [`AnalysisError::NoInput`] before any network activity when
/// the request carries neither text nor a file.
pub fn build_payload(request: &AnalysisRequest) -> Result<Value> {
    let mut parts = Vec::new();

    if let Some(file) = &request.file {
        parts.push(json!({
            "inlineData": {
                "mimeType": file.media_type.as_mime(),
                "data": file.payload(),
            }
        }));
        parts.push(json!({ "text": ATTACHMENT_DIRECTIVE }));
    }

    if request.has_text() {
        parts.push(json!({ "text": text_directive(&request.free_text) }));
    }

    if parts.is_empty() {
        return Err(AnalysisError::NoInput);
    }

    Ok(json!({
        "systemInstruction": {
            "parts": [{ "text": SYSTEM_INSTRUCTION }]
        },
        "contents": [{
            "role": "user",
            "parts": parts
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "temperature": TEMPERATURE
        }
    }))
}

fn extract_text(response_json: &Value) -> Result<String> {
    let text: String = response_json["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["text"].as_str())
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AnalysisError::MalformedResponse(
            "No response from AI".to_string(),
        ));
    }
    Ok(text)
}

fn service_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
