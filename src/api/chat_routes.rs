//! Chat HTTP routes
//!
//! JSON and SSE endpoints over [`StoreAssistant`].

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::agentic::{registry, StreamChunk, ToolDefinition};
use crate::assistant::{AssistantReply, StoreAssistant};
use crate::error::AssistantError;
use crate::history::HistoryEntry;

/// History listing defaults when the query string omits them
const HISTORY_PAGE: usize = 50;
const ALL_TIME_DAYS: i64 = 36_500;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(alias = "message")]
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    #[serde(flatten)]
    pub reply: AssistantReply,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub max_age_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct ClearHistoryResponse {
    pub session_id: String,
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// `AssistantError` as an HTTP response
pub struct ApiError(AssistantError);

impl From<AssistantError> for ApiError {
    fn from(err: AssistantError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            AssistantError::EmptyQuestion => StatusCode::BAD_REQUEST,
            AssistantError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            AssistantError::Upstream { .. } | AssistantError::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
            AssistantError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.code(), "Chat request failed");
        }
        let body = ErrorResponse {
            error: self.0.user_message(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
pub struct ChatState {
    pub assistant: Arc<StoreAssistant>,
}

impl ChatState {
    pub fn new(assistant: Arc<StoreAssistant>) -> Self {
        Self { assistant }
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn create_chat_router(assistant: Arc<StoreAssistant>) -> Router {
    let state = ChatState::new(assistant);

    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
        .route(
            "/api/chat/history/:session_id",
            get(get_history).delete(clear_history),
        )
        .route("/api/tools", get(list_tools))
        .route("/api/health", get(health_check))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/chat - Answer a question
async fn chat(
    State(state): State<ChatState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let reply = state
        .assistant
        .ask(&req.question, req.session_id.as_deref())
        .await?;
    Ok(Json(ChatResponse {
        reply,
        session_id: req.session_id,
    }))
}

/// POST /api/chat/stream - Answer a question as server-sent events
async fn chat_stream(
    State(state): State<ChatState>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let chunks = state
        .assistant
        .ask_stream(&req.question, req.session_id.as_deref())
        .await?;

    let events = chunks.map(|chunk| {
        let event = match chunk {
            StreamChunk::Text(text) => Event::default().event("chunk").data(sse_data(&text)),
            StreamChunk::Done => Event::default().event("done").data(""),
            StreamChunk::Error(message) => {
                Event::default().event("error").data(sse_data(&message))
            }
        };
        Ok(event)
    });

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("ping"),
    ))
}

/// SSE field values may not contain carriage returns; line breaks become
/// plain `\n`, which axum writes as consecutive `data:` lines
fn sse_data(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// GET /api/chat/history/:session_id
async fn get_history(
    State(state): State<ChatState>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let entries = state
        .assistant
        .history_store()
        .recent(
            &session_id,
            query.limit.unwrap_or(HISTORY_PAGE),
            query.max_age_days.unwrap_or(ALL_TIME_DAYS),
        )
        .await?;
    Ok(Json(HistoryResponse {
        session_id,
        entries,
    }))
}

/// DELETE /api/chat/history/:session_id
async fn clear_history(
    State(state): State<ChatState>,
    Path(session_id): Path<String>,
) -> Result<Json<ClearHistoryResponse>, ApiError> {
    let cleared = state.assistant.history_store().clear(&session_id).await?;
    tracing::info!(session = %session_id, cleared, "History cleared");
    Ok(Json(ClearHistoryResponse {
        session_id,
        cleared,
    }))
}

/// GET /api/tools - Tool catalog as offered to the model
async fn list_tools() -> Json<Vec<ToolDefinition>> {
    Json(registry().iter().map(|d| d.definition()).collect())
}

/// GET /api/health
async fn health_check(State(state): State<ChatState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        backend: state.assistant.backend().name(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, Product, StockStatus};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn router() -> Router {
        let assistant = StoreAssistant::rule_based(Arc::new(InMemoryStore::sample()));
        create_chat_router(Arc::new(assistant))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_chat_answers() {
        let response = router()
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({"question": "What are my top 5 products?", "session_id": "abc"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["backend"], "rule");
        assert_eq!(body["session_id"], "abc");
        assert!(body["answer"].as_str().unwrap().contains("T-Shirt"));
    }

    #[tokio::test]
    async fn test_empty_question_is_bad_request() {
        let response = router()
            .oneshot(post_json("/api/chat", serde_json::json!({"message": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "empty_question");
    }

    #[tokio::test]
    async fn test_stream_emits_chunk_then_done() {
        let response = router()
            .oneshot(post_json(
                "/api/chat/stream",
                serde_json::json!({"question": "How many customers do I have?"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let chunk_at = text.find("event: chunk").unwrap();
        let done_at = text.find("event: done").unwrap();
        assert!(chunk_at < done_at);
        assert!(text.contains("3 customers"));
    }

    #[tokio::test]
    async fn test_stream_survives_carriage_returns() {
        let product = Product {
            id: 1,
            name: "Hoodie\r\nXL".into(),
            sku: "HD-XL".into(),
            price: 45.into(),
            stock_status: StockStatus::InStock,
            stock_quantity: Some(4),
            total_sales: 12,
            categories: vec![],
        };
        let store = InMemoryStore::new().with_products(vec![product]);
        let app = create_chat_router(Arc::new(StoreAssistant::rule_based(Arc::new(store))));

        let response = app
            .oneshot(post_json(
                "/api/chat/stream",
                serde_json::json!({"question": "What are my top 3 products?"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains('\r'));
        assert!(text.contains("data: XL"));
        assert!(text.contains("event: done"));
    }

    #[test]
    fn test_sse_data_normalizes_line_breaks() {
        assert_eq!(sse_data("a\r\nb\rc\nd"), "a\nb\nc\nd");
    }

    #[tokio::test]
    async fn test_tools_and_health() {
        let response = router()
            .oneshot(Request::get("/api/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 9);

        let response = router()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_history_round_trip() {
        let app = router();
        app.clone()
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({"question": "show me the inventory", "session_id": "h1"}),
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(Request::get("/api/chat/history/h1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["entries"].as_array().unwrap().len(), 2);

        let response = app
            .oneshot(
                Request::delete("/api/chat/history/h1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["cleared"], 2);
    }
}
