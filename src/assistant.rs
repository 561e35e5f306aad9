//! Store assistant
//!
//! Entry point tying the pieces together: validates the question, picks the
//! rule-based or model-backed path, and records the exchange in history.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;

use crate::agentic::stream::{relay, single_answer, ChunkStream, StreamChunk};
use crate::agentic::{
    classify_intent_and_get_tools, compose_answer, create_chat_model, ChatMessage, ChatModel,
    LlmOrchestrator, Role, ToolExecutor, ToolResult,
};
use crate::config::{AssistantBackend, AssistantConfig, HistorySettings};
use crate::error::{AssistantError, Result};
use crate::history::{HistoryEntry, HistoryStore, InMemoryHistoryStore};
use crate::store::{DataAccess, InMemoryStore, WooCommerceStore};

/// One answered question
#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub answer: String,
    pub backend: &'static str,
    /// Names of the tools that ran, in execution order
    pub tools_used: Vec<String>,
    pub tool_results: Vec<ToolResult>,
}

pub struct StoreAssistant {
    executor: Arc<ToolExecutor>,
    orchestrator: Option<LlmOrchestrator>,
    history: Arc<dyn HistoryStore>,
    history_settings: HistorySettings,
    deadline: Duration,
}

impl StoreAssistant {
    /// Keyword dispatch with deterministic answers
    pub fn rule_based(store: Arc<dyn DataAccess>) -> Self {
        let defaults = AssistantConfig::default();
        Self {
            executor: Arc::new(ToolExecutor::new(store)),
            orchestrator: None,
            history: Arc::new(InMemoryHistoryStore::new()),
            history_settings: defaults.history,
            deadline: defaults.request_deadline,
        }
    }

    /// Function-calling model answers
    pub fn with_model(store: Arc<dyn DataAccess>, model: Arc<dyn ChatModel>) -> Self {
        let mut assistant = Self::rule_based(store);
        assistant.orchestrator = Some(
            LlmOrchestrator::new(model, assistant.executor.clone())
                .with_deadline(assistant.deadline),
        );
        assistant
    }

    pub fn with_history(
        mut self,
        history: Arc<dyn HistoryStore>,
        settings: HistorySettings,
    ) -> Self {
        self.history = history;
        self.history_settings = settings;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self.orchestrator = self.orchestrator.map(|o| o.with_deadline(deadline));
        self
    }

    /// Build the store, model and history from configuration
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let store: Arc<dyn DataAccess> = match &config.woocommerce {
            Some(settings) => {
                tracing::info!(base_url = %settings.base_url, "Using WooCommerce store");
                Arc::new(WooCommerceStore::new(settings.clone())?)
            }
            None => {
                tracing::warn!("WC_BASE_URL not set, using the bundled demo store");
                Arc::new(InMemoryStore::sample())
            }
        };

        let assistant = match config.backend {
            AssistantBackend::Rule => Self::rule_based(store),
            AssistantBackend::Llm => {
                let model = create_chat_model(config.require_llm()?)?;
                Self::with_model(store, model)
            }
        };
        Ok(assistant
            .with_history(Arc::new(InMemoryHistoryStore::new()), config.history)
            .with_deadline(config.request_deadline))
    }

    pub fn backend(&self) -> AssistantBackend {
        if self.orchestrator.is_some() {
            AssistantBackend::Llm
        } else {
            AssistantBackend::Rule
        }
    }

    pub fn history_store(&self) -> Arc<dyn HistoryStore> {
        self.history.clone()
    }

    pub async fn ask(&self, question: &str, session_id: Option<&str>) -> Result<AssistantReply> {
        let question = validate(question)?;
        let history = self.load_history(session_id).await?;

        let reply = match &self.orchestrator {
            Some(orchestrator) => {
                let answer = orchestrator.answer(question, &history).await?;
                reply(self.backend(), answer.text, answer.tool_results)
            }
            None => {
                let results = tokio::time::timeout(self.deadline, self.run_rules(question))
                    .await
                    .map_err(|_| AssistantError::DeadlineExceeded(self.deadline))??;
                reply(self.backend(), compose_answer(&results), results)
            }
        };

        if let Some(session) = session_id {
            self.record(session, question, &reply.answer, &reply.tools_used)
                .await?;
        }
        Ok(reply)
    }

    /// Stream the answer. Failures before the first chunk are returned as
    /// `Err`; later ones arrive as a terminal `Error` chunk.
    pub async fn ask_stream(
        &self,
        question: &str,
        session_id: Option<&str>,
    ) -> Result<ChunkStream> {
        let question = validate(question)?;

        let (answer, tools_used) = match &self.orchestrator {
            Some(orchestrator) => {
                let history = self.load_history(session_id).await?;
                let streamed = orchestrator.answer_stream(question, &history).await?;
                let tools = streamed
                    .tool_results
                    .iter()
                    .map(|r| r.tool_name.clone())
                    .collect::<Vec<_>>();
                (streamed.stream, tools)
            }
            None => {
                let reply = self.ask(question, None).await?;
                (single_answer(reply.answer), reply.tools_used)
            }
        };

        match session_id {
            Some(session) => Ok(self.recording(answer, session, question, tools_used)),
            None => Ok(relay(answer)),
        }
    }

    async fn run_rules(&self, question: &str) -> Result<Vec<ToolResult>> {
        let calls = classify_intent_and_get_tools(question);
        self.executor.execute_all(&calls).await
    }

    async fn load_history(&self, session_id: Option<&str>) -> Result<Vec<ChatMessage>> {
        let Some(session) = session_id else {
            return Ok(Vec::new());
        };
        let entries = self
            .history
            .recent(
                session,
                self.history_settings.limit,
                self.history_settings.max_age_days,
            )
            .await?;
        Ok(entries.iter().filter_map(HistoryEntry::to_message).collect())
    }

    async fn record(
        &self,
        session: &str,
        question: &str,
        answer: &str,
        tools_used: &[String],
    ) -> Result<()> {
        record_exchange(
            self.history.as_ref(),
            self.backend(),
            session,
            question,
            answer,
            tools_used,
        )
        .await
    }

    /// Pass the stream through, saving the exchange once it completes
    fn recording(
        &self,
        source: ChunkStream,
        session: &str,
        question: &str,
        tools_used: Vec<String>,
    ) -> ChunkStream {
        struct Recorder {
            source: ChunkStream,
            answer: String,
            history: Arc<dyn HistoryStore>,
            backend: AssistantBackend,
            session: String,
            question: String,
            tools_used: Vec<String>,
        }

        let recorder = Recorder {
            source: relay(source),
            answer: String::new(),
            history: self.history.clone(),
            backend: self.backend(),
            session: session.to_string(),
            question: question.to_string(),
            tools_used,
        };

        Box::pin(stream::unfold(Some(recorder), |state| async move {
            let mut rec = state?;
            let chunk = rec.source.next().await?;
            match &chunk {
                StreamChunk::Text(text) => rec.answer.push_str(text),
                StreamChunk::Done => {
                    if let Err(err) = record_exchange(
                        rec.history.as_ref(),
                        rec.backend,
                        &rec.session,
                        &rec.question,
                        &rec.answer,
                        &rec.tools_used,
                    )
                    .await
                    {
                        tracing::warn!(
                            error = %err,
                            session = %rec.session,
                            "Failed to record history"
                        );
                    }
                    return Some((chunk, None));
                }
                StreamChunk::Error(_) => return Some((chunk, None)),
            }
            Some((chunk, Some(rec)))
        }))
    }
}

fn validate(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(AssistantError::EmptyQuestion);
    }
    Ok(trimmed)
}

fn reply(
    backend: AssistantBackend,
    answer: String,
    tool_results: Vec<ToolResult>,
) -> AssistantReply {
    AssistantReply {
        answer,
        backend: backend.name(),
        tools_used: tool_results.iter().map(|r| r.tool_name.clone()).collect(),
        tool_results,
    }
}

async fn record_exchange(
    history: &dyn HistoryStore,
    backend: AssistantBackend,
    session: &str,
    question: &str,
    answer: &str,
    tools_used: &[String],
) -> Result<()> {
    history.append(Role::User, question, session, None).await?;
    history
        .append(
            Role::Assistant,
            answer,
            session,
            Some(json!({ "backend": backend.name(), "tools": tools_used })),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assistant() -> StoreAssistant {
        StoreAssistant::rule_based(Arc::new(InMemoryStore::sample()))
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let err = assistant().ask("   ", None).await.unwrap_err();
        assert!(matches!(err, AssistantError::EmptyQuestion));
        assert!(assistant().ask_stream("", None).await.is_err());
    }

    #[tokio::test]
    async fn test_rule_based_answer() {
        let reply = assistant().ask("What are my top 3 products?", None).await.unwrap();
        assert_eq!(reply.backend, "rule");
        assert_eq!(reply.tools_used, vec!["get_top_products"]);
        assert!(reply.answer.contains("T-Shirt"));
        assert!(reply.answer.contains("Hoodie"));
        assert!(reply.answer.contains("Beanie"));
        assert!(!reply.answer.contains("Cap"));
    }

    #[tokio::test]
    async fn test_history_recorded_per_session() {
        let assistant = assistant();
        assistant.ask("How many customers?", Some("s1")).await.unwrap();
        let entries = assistant.history_store().recent("s1", 10, 7).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[1].metadata.as_ref().unwrap()["backend"], "rule");
    }

    #[tokio::test]
    async fn test_stream_records_history_on_done() {
        let assistant = assistant();
        let chunks: Vec<StreamChunk> = assistant
            .ask_stream("show me the inventory", Some("s2"))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.last(), Some(&StreamChunk::Done));
        let entries = assistant.history_store().recent("s2", 10, 7).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].content.starts_with("Inventory:"));
    }
}
