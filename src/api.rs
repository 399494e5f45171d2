//! HTTP chat API in front of the agent.

use crate::agent::Agent;
use crate::dispatch::ToolDefinition;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    pub agent: Agent<Value>,
}

/// Build the router over an agent.
pub fn router(agent: Agent<Value>) -> Router {
    let state = Arc::new(AppState { agent });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/tools", get(tools))
        .route("/chat", post(chat))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    pub query: String,
    /// Session context handed to every tool call of this request.
    #[serde(default)]
    pub deps: Value,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

#[derive(Serialize)]
struct ToolsResponse {
    tools: Vec<ToolDefinition>,
    total: usize,
}

async fn root() -> impl IntoResponse {
    Json(json!({ "Hello": "World" }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "model": state.agent.model_name() }))
}

async fn tools(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tools = state.agent.dispatcher().registry().definitions();
    Json(ToolsResponse {
        total: tools.len(),
        tools,
    })
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    info!("Chat query: {}", req.query);

    match state.agent.run(&req.query, Arc::new(req.deps), &[]).await {
        Ok(response) => Json(ChatResponse {
            response: response.content,
        })
        .into_response(),
        Err(e) => {
            warn!("Chat failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    detail: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
