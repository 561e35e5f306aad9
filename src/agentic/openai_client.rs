//! OpenAI Client
//!
//! `ChatModel` over any OpenAI-compatible `/chat/completions` endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::llm_client::{ChatCompletion, ChatMessage, ChatModel, ChatRequest, Role, ToolChoice};
use super::stream::{sse_chunks, ChunkStream};
use super::tools::ToolCall;
use crate::config::LlmSettings;
use crate::error::{AssistantError, Result};

/// OpenAI-compatible API client
#[derive(Clone)]
pub struct OpenAiClient {
    settings: LlmSettings,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(AssistantError::Configuration(
                "LLM_API_KEY is empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.as_str().trim_end_matches('/')
        )
    }

    fn request_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": &self.settings.model,
            "messages": request.messages.iter().map(wire_message).collect::<Vec<_>>(),
            "temperature": self.settings.temperature,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(
                request
                    .tools
                    .iter()
                    .map(|t| t.to_openai_function())
                    .collect(),
            );
            body["tool_choice"] = json!(match request.tool_choice {
                ToolChoice::Auto => "auto",
                ToolChoice::None => "none",
            });
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status, body = %body, "Chat completion request failed");
            return Err(AssistantError::Upstream { status, body });
        }
        Ok(response)
    }
}

// ============================================================================
// Wire format
// ============================================================================

fn wire_message(message: &ChatMessage) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut wire = json!({ "role": role, "content": message.content });
    if !message.tool_calls.is_empty() {
        wire["tool_calls"] = Value::Array(
            message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": &call.id,
                        "type": "function",
                        "function": {
                            "name": &call.name,
                            "arguments": call.arguments.to_string(),
                        }
                    })
                })
                .collect(),
        );
    }
    if let Some(id) = &message.tool_call_id {
        wire["tool_call_id"] = json!(id);
    }
    wire
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    /// Usually a JSON-encoded string; some compatible servers send an object
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

/// Tool-call arguments as a JSON object; anything malformed becomes `{}`
pub(crate) fn parse_arguments(tool: &str, raw: &Value) -> Value {
    let parsed = match raw {
        Value::String(text) if text.trim().is_empty() => Some(json!({})),
        Value::String(text) => serde_json::from_str::<Value>(text).ok(),
        other => Some(other.clone()),
    };
    match parsed {
        Some(value @ Value::Object(_)) => value,
        _ => {
            tracing::warn!(tool, arguments = %raw, "Malformed tool arguments, using defaults");
            json!({})
        }
    }
}

fn completion_from_wire(response: WireResponse) -> Result<ChatCompletion> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or(AssistantError::EmptyModelResponse)?;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            arguments: parse_arguments(&call.function.name, &call.function.arguments),
            id: call.id,
            name: call.function.name,
        })
        .collect();

    Ok(ChatCompletion {
        content: message.content,
        tool_calls,
    })
}

/// Text delta from one streamed `chat.completion.chunk`
fn decode_stream_payload(payload: &str) -> std::result::Result<Option<String>, String> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| format!("Malformed stream payload: {}", e))?;
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(message);
    }
    Ok(value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map(str::to_string))
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let body = self.request_body(request, false);
        let response = self.send(&body).await?;
        let text = response.text().await?;
        tracing::debug!(
            "Chat completion raw response: {}",
            text.chars().take(1000).collect::<String>()
        );
        let wire: WireResponse = serde_json::from_str(&text)?;
        completion_from_wire(wire)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        let body = self.request_body(request, true);
        let response = self.send(&body).await?;
        Ok(sse_chunks(response.bytes_stream(), decode_stream_payload))
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
