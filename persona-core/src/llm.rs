//! Chat-completion collaborator contract, with an HTTP adapter for an
//! Ollama-shaped `/api/chat` endpoint.

use crate::error::LlmError;
use async_trait::async_trait;
use persona_protocol::ChatMessage;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Produce a single completion for `system` plus the prior `messages`.
    /// No retry inside; errors propagate to the caller, which is
    /// responsible for timeout/fallback policy.
    async fn chat(&self, system: &str, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

pub struct OllamaClient {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: i32,
    top_p: f32,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
}

fn role_str(role: persona_protocol::Role) -> &'static str {
    match role {
        persona_protocol::Role::User => "user",
        persona_protocol::Role::Assistant => "assistant",
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, system: &str, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let mut payload_messages = Vec::with_capacity(messages.len() + 1);
        payload_messages.push(OllamaMessage {
            role: "system".to_string(),
            content: system.to_string(),
        });
        payload_messages.extend(messages.iter().map(|m| OllamaMessage {
            role: role_str(m.role).to_string(),
            content: m.content.clone(),
        }));

        let request = OllamaRequest {
            model: self.model.clone(),
            messages: payload_messages,
            stream: false,
            options: OllamaOptions {
                temperature: 0.7,
                num_predict: 80,
                top_p: 0.9,
            },
        };

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Backend(e.to_string()))?;

        let response = response
            .error_for_status()
            .map_err(|e| LlmError::Backend(e.to_string()))?;

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Backend(e.to_string()))?;

        Ok(body.message.content)
    }
}
