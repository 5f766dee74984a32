//! Generation capability: instructions in, draft text out.
//!
//! The loop only sees [`DraftGenerator`]. [`OpenAiCompatGenerator`] talks to
//! any OpenAI-compatible `/chat/completions` endpoint (vLLM, llama.cpp,
//! hosted APIs).

use async_trait::async_trait;
use gating::{InstructionSet, ScoringError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of an external collaborator (generator or verifier).
///
/// Any of these aborts the current section.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} unreachable: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {service}: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },

    #[error("Scoring failed: {0}")]
    Scoring(#[from] ScoringError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub instructions: String,
    pub max_output_tokens: u32,
}

impl GenerationRequest {
    pub fn new(instructions: &InstructionSet, max_output_tokens: u32) -> Self {
        Self {
            instructions: instructions.as_str().to_string(),
            max_output_tokens,
        }
    }
}

/// Outcome reported by the generation capability.
///
/// `success == false` is a capability-level refusal or failure; it aborts
/// the section just like a transport error, but carries the service's own
/// error text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub success: bool,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl GenerationResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait DraftGenerator: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, CollaboratorError>;
}

const SERVICE: &str = "generator";

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAiCompatGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            temperature: 0.7,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    /// Use a preconfigured client (timeouts, proxies, TLS).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl DraftGenerator for OpenAiCompatGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, CollaboratorError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": request.instructions}
            ],
            "max_tokens": request.max_output_tokens,
            "temperature": self.temperature
        });

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CollaboratorError::Transport {
                service: SERVICE,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Generation request rejected");
            return Ok(GenerationResponse::failed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let json: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| CollaboratorError::Malformed {
                    service: SERVICE,
                    message: e.to_string(),
                })?;

        parse_chat_completion(&json)
    }
}

/// Extract the first choice's message text from a chat completion body.
pub fn parse_chat_completion(
    json: &serde_json::Value,
) -> Result<GenerationResponse, CollaboratorError> {
    let text = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| CollaboratorError::Malformed {
            service: SERVICE,
            message: "missing choices[0].message.content".into(),
        })?;

    let mut response = GenerationResponse::ok(text.trim());
    response.metadata = serde_json::json!({
        "model": json.get("model").cloned().unwrap_or_default(),
        "finish_reason": json["choices"][0].get("finish_reason").cloned().unwrap_or_default(),
        "usage": json.get("usage").cloned().unwrap_or_default(),
    });
    Ok(response)
}
