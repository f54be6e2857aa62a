//! HTTP client for OpenAI-compatible chat-completion endpoints.
//!
//! Every configured provider speaks the same wire shape: POST
//! `{base_url}/chat/completions` with a bearer credential, read
//! `choices[0].message.content` plus token usage back. Non-2xx replies keep
//! their body verbatim in [`AiError::ApiStatus`] so the router can classify
//! quota signatures inside it.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AiError;
use crate::provider::Candidate;
use crate::router::GenerateRequest;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct TokenUsage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
}

/// One settled completion with its token accounting.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub text: String,
    pub tokens_in: i64,
    pub tokens_out: i64,
}

/// Thin reqwest wrapper shared by every provider in the pool.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
}

impl ChatClient {
    /// # Errors
    ///
    /// Returns [`AiError::Http`] if the underlying `reqwest::Client` cannot
    /// be constructed.
    pub fn new(timeout_secs: u64) -> Result<Self, AiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }

    /// Sends one chat-completion request to the candidate's endpoint.
    ///
    /// # Errors
    ///
    /// - [`AiError::ApiStatus`] on any non-2xx reply, body included.
    /// - [`AiError::Http`] on network failure.
    /// - [`AiError::Deserialize`] if the 2xx body is not the expected shape.
    /// - [`AiError::MissingContent`] if the reply has no choices.
    pub async fn chat(
        &self,
        candidate: &Candidate,
        request: &GenerateRequest,
    ) -> Result<ChatCompletion, AiError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &candidate.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/chat/completions", candidate.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&candidate.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::ApiStatus {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| AiError::Deserialize {
                context: format!("chat completion from {}", candidate.provider),
                source: e,
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AiError::MissingContent {
                model: candidate.model.clone(),
            })?;

        Ok(ChatCompletion {
            text: content,
            tokens_in: parsed.usage.prompt_tokens,
            tokens_out: parsed.usage.completion_tokens,
        })
    }
}
