//! Store Assistant REST API Server
//!
//! ## Usage
//!
//! ```bash
//! # Rule-based answers over the bundled demo store
//! cargo run --bin assistant_server --features server
//!
//! # Model-backed answers over a live store
//! ASSISTANT_BACKEND=llm LLM_API_KEY=sk-... \
//!   WC_BASE_URL=https://shop.example.com WC_CONSUMER_KEY=ck_... WC_CONSUMER_SECRET=cs_... \
//!   cargo run --bin assistant_server --features server
//!
//! curl -X POST http://localhost:3000/api/chat \
//!   -H "Content-Type: application/json" \
//!   -d '{"question": "What are my top 5 products?", "session_id": "demo"}'
//!
//! curl -N -X POST http://localhost:3000/api/chat/stream \
//!   -H "Content-Type: application/json" \
//!   -d '{"question": "How did sales go this month?"}'
//! ```

use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use store_assistant::api::create_chat_router;
use store_assistant::{AssistantConfig, StoreAssistant};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AssistantConfig::from_env().context("loading configuration")?;
    let assistant = StoreAssistant::from_config(&config).context("building assistant")?;
    tracing::info!(backend = assistant.backend().name(), "Assistant ready");

    let app = create_chat_router(Arc::new(assistant))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
