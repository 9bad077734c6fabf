//! Chat-completion adapter.
//!
//! Speaks the OpenAI chat schema against a configurable gateway, with unary
//! and chunked-streaming calls. Upstream failures surface as a single error;
//! a partial stream terminates with an error item.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;
use crate::errors::ServiceError;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("deadline exceeded")]
    Timeout,
}

impl From<LlmError> for ServiceError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout => ServiceError::UpstreamTimeout,
            other => ServiceError::UpstreamUnavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// The generation seam: one unary call, one streaming call. Test doubles
/// implement this; production uses [`OpenAiChatClient`].
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
    async fn stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, LlmError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    frequency_penalty: f32,
    presence_penalty: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorResponse {
    error: UpstreamErrorDetail,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorDetail {
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat client for any OpenAI-schema gateway (OpenRouter by default).
pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    frequency_penalty: f32,
    presence_penalty: f32,
    timeout: Duration,
}

impl OpenAiChatClient {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to create HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            temperature: config.llm_temperature,
            top_p: config.llm_top_p,
            max_tokens: config.llm_max_tokens,
            frequency_penalty: config.llm_frequency_penalty,
            presence_penalty: config.llm_presence_penalty,
            timeout: Duration::from_secs(config.llm_timeout_seconds),
        })
    }

    fn request<'a>(&'a self, messages: &'a [ChatMessage], stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            stream,
        }
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request(messages, stream))
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<UpstreamErrorResponse>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(LlmError::Api { status: status.as_u16(), message });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let fut = async {
            let response = self.send(messages, false).await?;
            let body: ChatResponse = response
                .json()
                .await
                .map_err(|e| LlmError::Parse(e.to_string()))?;
            body.choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| LlmError::Parse("no response content".to_string()))
        };

        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| LlmError::Timeout)?
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, LlmError> {
        let response = tokio::time::timeout(self.timeout, self.send(messages, true))
            .await
            .map_err(|_| LlmError::Timeout)??;

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            // SSE lines can split across network chunks; buffer until newline.
            let mut buffer = String::new();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(LlmError::Network(format!("stream error: {e}")));
                        break 'outer;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim_end_matches('\r').to_string();
                    buffer.drain(..=pos);

                    let Some(payload) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if payload == "[DONE]" {
                        break 'outer;
                    }
                    if let Ok(parsed) = serde_json::from_str::<StreamResponse>(payload) {
                        if let Some(content) =
                            parsed.choices.first().and_then(|c| c.delta.content.clone())
                        {
                            if !content.is_empty() {
                                yield Ok(content);
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_openai_schema() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "test-model",
            messages: &messages,
            temperature: 0.8,
            top_p: 0.9,
            max_tokens: 3000,
            frequency_penalty: 0.3,
            presence_penalty: 0.3,
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "test-model");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        // stream=false is omitted entirely
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn stream_delta_parses_with_missing_content() {
        let parsed: StreamResponse =
            serde_json::from_str(r#"{"choices":[{"delta":{}}]}"#).unwrap();
        assert!(parsed.choices[0].delta.content.is_none());

        let parsed: StreamResponse =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"hel"}}]}"#).unwrap();
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("hel"));
    }

    #[test]
    fn llm_errors_map_to_service_errors() {
        assert_eq!(ServiceError::from(LlmError::Timeout).kind(), "UPSTREAM_TIMEOUT");
        assert_eq!(
            ServiceError::from(LlmError::Api { status: 500, message: "x".into() }).kind(),
            "UPSTREAM_UNAVAILABLE"
        );
    }
}
