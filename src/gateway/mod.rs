//! Gateway to the language-model service.
//!
//! The insight generator talks to the model through the [`ChatGateway`]
//! trait; [`ollama::OllamaAdapter`] is the concrete provider. No retries:
//! a failed call surfaces to the caller, which aborts the stage.

pub mod error;
pub mod ollama;
pub mod types;

pub use error::LlmError;
pub use ollama::OllamaAdapter;
pub use types::{ChatRequest, ChatResponse, Message, Role};

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError>;
}
