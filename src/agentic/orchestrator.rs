//! LLM Orchestrator
//!
//! Runs the tool-calling loop for one question:
//!
//! 1. Send the question and the tool catalog to the model
//! 2. Execute any requested tools, in order, feeding results back
//! 3. Ask for the final answer with tool calling disabled
//!
//! The whole exchange is bounded by a deadline.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use super::executor::ToolExecutor;
use super::llm_client::{ChatMessage, ChatModel, ChatRequest, Conversation, ToolChoice};
use super::stream::{relay, single_answer, with_deadline, ChunkStream};
use super::tools::{tool_definitions, ToolResult};
use crate::error::{AssistantError, Result};

const DEFAULT_DEADLINE: Duration = Duration::from_secs(90);

const SYSTEM_PROMPT: &str = r#"You are a data assistant for a WooCommerce store owner.
Use the provided tools to look up orders, sales, products, customers and stock before answering questions about store data.
Never guess figures: every number in your answer must come from a tool result.
A tool result containing "no_records_found": true means the query matched nothing; report that as zero.
Answer questions that need no store data directly, without calling tools.
Keep answers short and use plain lists for multiple records."#;

/// Exchange progress; `Answered`, `DirectAnswered` and `Failed` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationState {
    AwaitingToolDecision,
    ToolsRequested,
    AwaitingFinalAnswer,
    Answered,
    DirectAnswered,
    Failed,
}

impl OrchestrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestrationState::Answered
                | OrchestrationState::DirectAnswered
                | OrchestrationState::Failed
        )
    }
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestrationState::AwaitingToolDecision => "awaiting_tool_decision",
            OrchestrationState::ToolsRequested => "tools_requested",
            OrchestrationState::AwaitingFinalAnswer => "awaiting_final_answer",
            OrchestrationState::Answered => "answered",
            OrchestrationState::DirectAnswered => "direct_answered",
            OrchestrationState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Result of a completed exchange
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratedAnswer {
    pub text: String,
    pub state: OrchestrationState,
    pub tool_results: Vec<ToolResult>,
}

/// Result of a streamed exchange: tool results are known up front, the
/// answer text arrives through `stream`.
pub struct StreamedAnswer {
    pub state: OrchestrationState,
    pub tool_results: Vec<ToolResult>,
    pub stream: ChunkStream,
}

/// Where the exchange stands once tools have run
enum Prepared {
    Direct(String),
    Final {
        request: ChatRequest,
        tool_results: Vec<ToolResult>,
    },
}

/// Tracks and logs state transitions for one exchange
struct Exchange {
    id: uuid::Uuid,
    state: OrchestrationState,
}

impl Exchange {
    fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            state: OrchestrationState::AwaitingToolDecision,
        }
    }

    fn transition(&mut self, next: OrchestrationState) {
        tracing::debug!(
            exchange = %self.id,
            from = %self.state,
            to = %next,
            "Orchestration transition"
        );
        self.state = next;
    }

    fn fail(&mut self, err: AssistantError) -> AssistantError {
        self.transition(OrchestrationState::Failed);
        tracing::warn!(exchange = %self.id, error = %err, "Exchange failed");
        err
    }
}

pub struct LlmOrchestrator {
    model: Arc<dyn ChatModel>,
    executor: Arc<ToolExecutor>,
    deadline: Duration,
}

impl LlmOrchestrator {
    pub fn new(model: Arc<dyn ChatModel>, executor: Arc<ToolExecutor>) -> Self {
        Self {
            model,
            executor,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Answer `question`, with `history` placed between the system prompt
    /// and the question.
    pub async fn answer(
        &self,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<OrchestratedAnswer> {
        tokio::time::timeout(self.deadline, self.run(question, history))
            .await
            .map_err(|_| AssistantError::DeadlineExceeded(self.deadline))?
    }

    /// Like [`answer`](Self::answer), but the final answer is streamed.
    ///
    /// Tool execution happens before this returns; errors up to that point
    /// are returned directly, later ones arrive as an `Error` chunk.
    pub async fn answer_stream(
        &self,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<StreamedAnswer> {
        let started = tokio::time::Instant::now();
        let prepared = tokio::time::timeout(self.deadline, async {
            let mut exchange = Exchange::new();
            let prepared = self.prepare(&mut exchange, question, history).await?;
            let opened = match prepared {
                Prepared::Direct(text) => (
                    OrchestrationState::DirectAnswered,
                    vec![],
                    single_answer(text),
                ),
                Prepared::Final {
                    request,
                    tool_results,
                } => {
                    let stream = self
                        .model
                        .stream(&request)
                        .await
                        .map_err(|e| exchange.fail(e))?;
                    exchange.transition(OrchestrationState::Answered);
                    (OrchestrationState::Answered, tool_results, stream)
                }
            };
            Ok::<_, AssistantError>(opened)
        })
        .await
        .map_err(|_| AssistantError::DeadlineExceeded(self.deadline))??;

        let (state, tool_results, stream) = prepared;
        let remaining = self.deadline.saturating_sub(started.elapsed());
        Ok(StreamedAnswer {
            state,
            tool_results,
            stream: relay(with_deadline(stream, remaining)),
        })
    }

    async fn run(&self, question: &str, history: &[ChatMessage]) -> Result<OrchestratedAnswer> {
        let mut exchange = Exchange::new();
        match self.prepare(&mut exchange, question, history).await? {
            Prepared::Direct(text) => Ok(OrchestratedAnswer {
                text,
                state: OrchestrationState::DirectAnswered,
                tool_results: Vec::new(),
            }),
            Prepared::Final {
                request,
                tool_results,
            } => {
                let completion = self
                    .model
                    .complete(&request)
                    .await
                    .map_err(|e| exchange.fail(e))?;
                let text = completion
                    .text()
                    .map(str::to_string)
                    .ok_or_else(|| exchange.fail(AssistantError::EmptyModelResponse))?;
                exchange.transition(OrchestrationState::Answered);
                tracing::info!(
                    exchange = %exchange.id,
                    model = self.model.model_name(),
                    tools = tool_results.len(),
                    "Question answered"
                );
                Ok(OrchestratedAnswer {
                    text,
                    state: OrchestrationState::Answered,
                    tool_results,
                })
            }
        }
    }

    /// Everything up to (not including) the final-answer call
    async fn prepare(
        &self,
        exchange: &mut Exchange,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<Prepared> {
        let tools = tool_definitions();
        let mut conversation = Conversation::new();
        conversation.push(ChatMessage::system(format!(
            "{}\nToday's date is {}.",
            SYSTEM_PROMPT,
            Utc::now().format("%Y-%m-%d")
        )));
        conversation.extend(history.iter().cloned());
        conversation.push(ChatMessage::user(question));

        let request = ChatRequest::new(&conversation).with_tools(tools.clone());
        let decision = self
            .model
            .complete(&request)
            .await
            .map_err(|e| exchange.fail(e))?;

        if decision.tool_calls.is_empty() {
            return match decision.text() {
                Some(text) => {
                    exchange.transition(OrchestrationState::DirectAnswered);
                    Ok(Prepared::Direct(text.to_string()))
                }
                None => Err(exchange.fail(AssistantError::EmptyModelResponse)),
            };
        }

        exchange.transition(OrchestrationState::ToolsRequested);
        let calls = decision.tool_calls;
        conversation.push(ChatMessage::assistant_tool_calls(
            decision.content,
            calls.clone(),
        ));

        let mut tool_results = Vec::with_capacity(calls.len());
        for call in &calls {
            let result = self
                .executor
                .execute_call(call)
                .await
                .map_err(|e| exchange.fail(e))?;
            conversation.push(ChatMessage::tool(&result));
            tool_results.push(result);
        }

        exchange.transition(OrchestrationState::AwaitingFinalAnswer);
        conversation.push(ChatMessage::user(final_answer_instruction(question)));
        let request = ChatRequest::new(&conversation)
            .with_tools(tools)
            .with_tool_choice(ToolChoice::None);

        Ok(Prepared::Final {
            request,
            tool_results,
        })
    }
}

fn final_answer_instruction(question: &str) -> String {
    format!(
        "Using only the tool results above, answer my original question: \"{}\"\n\
         If a result says \"no_records_found\": true, say clearly that no records were found \
         and give the count as 0. Do not describe it vaguely and do not invent data.",
        question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agentic::llm_client::{ChatCompletion, Role};
    use crate::agentic::tools::ToolCall;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays canned completions and records every request
    struct ScriptedModel {
        replies: Mutex<Vec<ChatCompletion>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        fn new(mut replies: Vec<ChatCompletion>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or(AssistantError::EmptyModelResponse)
        }

        async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
            let completion = self.complete(request).await?;
            Ok(single_answer(completion.content.unwrap_or_default()))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    fn text(content: &str) -> ChatCompletion {
        ChatCompletion {
            content: Some(content.into()),
            tool_calls: vec![],
        }
    }

    fn calls(calls: Vec<(&str, &str, serde_json::Value)>) -> ChatCompletion {
        ChatCompletion {
            content: None,
            tool_calls: calls
                .into_iter()
                .map(|(id, name, arguments)| ToolCall {
                    id: id.into(),
                    name: name.into(),
                    arguments,
                })
                .collect(),
        }
    }

    fn orchestrator(model: Arc<ScriptedModel>) -> LlmOrchestrator {
        let executor = Arc::new(ToolExecutor::new(Arc::new(InMemoryStore::sample())));
        LlmOrchestrator::new(model, executor)
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let model = ScriptedModel::new(vec![text("Hello! How can I help?")]);
        let answer = orchestrator(model.clone()).answer("hi", &[]).await.unwrap();
        assert_eq!(answer.state, OrchestrationState::DirectAnswered);
        assert_eq!(answer.text, "Hello! How can I help?");
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_loop_preserves_call_order() {
        let model = ScriptedModel::new(vec![
            calls(vec![
                ("a", "get_customer_summary", json!({})),
                ("b", "get_top_products", json!({"limit": 2})),
            ]),
            text("Done"),
        ]);
        let answer = orchestrator(model.clone())
            .answer("customers and top products", &[])
            .await
            .unwrap();
        assert_eq!(answer.state, OrchestrationState::Answered);
        let ids: Vec<_> = answer.tool_results.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        let final_request = &requests[1];
        assert_eq!(final_request.tool_choice, ToolChoice::None);
        let tool_turns: Vec<_> = final_request
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(tool_turns, vec!["a", "b"]);
        let last = final_request.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(last.content.as_deref().unwrap().contains("no records were found"));
    }

    #[tokio::test]
    async fn test_history_sits_between_system_and_question() {
        let model = ScriptedModel::new(vec![text("ok")]);
        let history = vec![
            ChatMessage::user("earlier question"),
            ChatMessage::assistant("earlier answer"),
        ];
        orchestrator(model.clone())
            .answer("new question", &history)
            .await
            .unwrap();
        let messages = &model.requests()[0].messages;
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content.as_deref(), Some("earlier question"));
        assert_eq!(messages[3].content.as_deref(), Some("new question"));
    }

    #[tokio::test]
    async fn test_unknown_tool_fed_back() {
        let model = ScriptedModel::new(vec![
            calls(vec![("x", "drop_database", json!({}))]),
            text("I could not do that."),
        ]);
        let answer = orchestrator(model).answer("drop it", &[]).await.unwrap();
        assert_eq!(answer.state, OrchestrationState::Answered);
        assert!(!answer.tool_results[0].is_success());
    }

    #[tokio::test]
    async fn test_empty_reply_fails() {
        let model = ScriptedModel::new(vec![ChatCompletion::default()]);
        let err = orchestrator(model).answer("?", &[]).await.unwrap_err();
        assert!(matches!(err, AssistantError::EmptyModelResponse));
    }

    #[tokio::test]
    async fn test_stream_after_tools() {
        let model = ScriptedModel::new(vec![
            calls(vec![("a", "get_inventory_summary", json!({}))]),
            text("6 products"),
        ]);
        let streamed = orchestrator(model)
            .answer_stream("inventory?", &[])
            .await
            .unwrap();
        assert_eq!(streamed.state, OrchestrationState::Answered);
        assert_eq!(streamed.tool_results.len(), 1);
        let chunks: Vec<_> = streamed.stream.collect().await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        struct SlowModel;

        #[async_trait]
        impl ChatModel for SlowModel {
            async fn complete(&self, _request: &ChatRequest) -> Result<ChatCompletion> {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(ChatCompletion::default())
            }

            async fn stream(&self, _request: &ChatRequest) -> Result<ChunkStream> {
                Ok(single_answer(""))
            }

            fn model_name(&self) -> &str {
                "slow"
            }

            fn provider_name(&self) -> &str {
                "test"
            }
        }

        let executor = Arc::new(ToolExecutor::new(Arc::new(InMemoryStore::new())));
        let orchestrator = LlmOrchestrator::new(Arc::new(SlowModel), executor)
            .with_deadline(Duration::from_secs(5));
        let err = orchestrator.answer("slow?", &[]).await.unwrap_err();
        assert!(matches!(err, AssistantError::DeadlineExceeded(_)));
    }
}
