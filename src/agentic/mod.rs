//! Agentic question answering
//!
//! Turns a store owner's question into data lookups and an answer, either
//! through the keyword dispatcher (no model) or through a function-calling
//! chat model.

pub mod answer;
pub mod dispatcher;
pub mod executor;
pub mod extractor;
pub mod llm_client;
pub mod openai_client;
pub mod orchestrator;
pub mod stream;
pub mod tools;

use std::sync::Arc;

use crate::config::LlmSettings;
use crate::error::Result;

pub use answer::compose_answer;
pub use dispatcher::classify_intent_and_get_tools;
pub use executor::ToolExecutor;
pub use extractor::{classify, Classification, EntityType, FilterSet, QueryType};
pub use llm_client::{ChatMessage, ChatModel, ChatRequest, Role, ToolDefinition};
pub use openai_client::OpenAiClient;
pub use orchestrator::{LlmOrchestrator, OrchestratedAnswer, OrchestrationState, StreamedAnswer};
pub use stream::{ChunkStream, StreamChunk};
pub use tools::{registry, ToolCall, ToolDescriptor, ToolName, ToolRequest, ToolResult};

/// Build the chat model client for the configured provider
pub fn create_chat_model(settings: &LlmSettings) -> Result<Arc<dyn ChatModel>> {
    let client = OpenAiClient::new(settings.clone())?;
    tracing::info!(
        provider = client.provider_name(),
        model = client.model_name(),
        base_url = %settings.base_url,
        "Chat model configured"
    );
    Ok(Arc::new(client))
}
