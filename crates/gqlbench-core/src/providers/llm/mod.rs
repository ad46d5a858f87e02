use crate::model::{ChatMessage, LlmResponse};
use async_trait::async_trait;

/// One session with a chat-completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<LlmResponse>;
    fn provider_name(&self) -> &'static str;
}

/// Opens independent client sessions, one per generation worker.
pub trait LlmProvider: Send + Sync {
    fn session(&self) -> anyhow::Result<Box<dyn LlmClient>>;
}

pub mod fake;
pub mod openai;
