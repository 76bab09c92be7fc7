//! Ollama adapter for chat completions.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::error::LlmError;
use super::types::{ChatRequest, ChatResponse, Message, Role};
use super::ChatGateway;

/// Default request timeout. Local models can be slow on first load.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Adapter for the Ollama chat API (`/api/chat`, non-streaming).
#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaAdapter {
    /// Create with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_config(base_url, DEFAULT_TIMEOUT)
    }

    /// Create with a custom request timeout.
    pub fn with_config(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

impl From<&Message> for ApiMessage {
    fn from(m: &Message) -> Self {
        Self {
            role: match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: m.content.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ChatApiResponse {
    message: Option<ApiResponseMessage>,
    error: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

// =============================================================================
// CHAT GATEWAY IMPL
// =============================================================================

#[async_trait]
impl ChatGateway for OllamaAdapter {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let start = Instant::now();

        let messages: Vec<ApiMessage> = req.messages.iter().map(ApiMessage::from).collect();
        let api_req = ChatApiRequest {
            model: &req.model,
            messages: &messages,
            stream: false,
        };

        let response = self
            .client
            .post(self.chat_url())
            .json(&api_req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Ollama reports failures as {"error": "..."}.
            let message = serde_json::from_str::<ChatApiResponse>(&body)
                .ok()
                .and_then(|p| p.error)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(LlmError::provider(message, Some(status.as_u16())));
        }

        let parsed: ChatApiResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("bad JSON: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(LlmError::provider(error, None));
        }

        let content = parsed
            .message
            .and_then(|m| m.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(ChatResponse {
            content,
            input_tokens: parsed.prompt_eval_count,
            output_tokens: parsed.eval_count,
            latency: start.elapsed(),
        })
    }
}
