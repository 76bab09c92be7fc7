//! Error types for the language-model gateway.

use thiserror::Error;

/// Errors that can occur when calling the language-model service.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Service-level error (model missing, generation failure, non-2xx status).
    #[error("ollama error: {message}")]
    Provider {
        message: String,
        http_status: Option<u16>,
    },

    /// Response arrived but carried no usable content.
    #[error("empty response from model")]
    EmptyResponse,

    /// Response body could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP/network error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error (bad base URL, client build failure).
    #[error("configuration error: {0}")]
    Config(String),
}

impl LlmError {
    pub fn provider(message: impl Into<String>, http_status: Option<u16>) -> Self {
        Self::Provider {
            message: message.into(),
            http_status,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "provider_error",
            Self::EmptyResponse => "empty_response",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
        }
    }
}
