use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use neuragent_agent::AgentKind;
use neuragent_core::error::AgentError;
use neuragent_core::state::ErrorRecord;

use crate::state::AppState;

/// Failure surfaced as a 500 with a `detail` message.
pub struct ApiError {
    context: &'static str,
    source: AgentError,
}

impl ApiError {
    fn with_context(context: &'static str) -> impl FnOnce(AgentError) -> Self {
        move |source| Self { context, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!("{}: {}", self.context, self.source);
        error!(detail = %detail, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "detail": detail })),
        )
            .into_response()
    }
}

// GET /
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Welcome to the Neural Agent System" }))
}

// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_agent_type")]
    pub agent_type: String,
    #[serde(default)]
    pub context: Option<String>,
}

fn default_agent_type() -> String {
    "researcher".to_string()
}

#[derive(Serialize)]
pub struct QueryDetails {
    pub agent_type: AgentKind,
    pub node_outputs: serde_json::Map<String, serde_json::Value>,
    pub errors: Vec<ErrorRecord>,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub result: String,
    pub details: QueryDetails,
}

// POST /query
pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    const CONTEXT: &str = "Error processing query";
    info!(agent_type = %body.agent_type, "Processing query");

    let kind: AgentKind = body.agent_type.parse().map_err(ApiError::with_context(CONTEXT))?;
    let reply = state
        .factory
        .run(kind, &body.query, body.context.as_deref())
        .await
        .map_err(ApiError::with_context(CONTEXT))?;

    Ok(Json(QueryResponse {
        result: reply.result,
        details: QueryDetails {
            agent_type: reply.agent_type,
            node_outputs: reply.node_outputs,
            errors: reply.errors,
        },
    }))
}

#[derive(Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Serialize)]
pub struct ResearchResponse {
    pub result: String,
    pub detailed_findings: String,
}

// POST /research
pub async fn research(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>, ApiError> {
    info!("Processing research request");
    let reply = state
        .factory
        .research(&body.query, body.context.as_deref())
        .await
        .map_err(ApiError::with_context("Error processing research"))?;

    Ok(Json(ResearchResponse {
        result: reply.result,
        detailed_findings: reply.detailed_findings.unwrap_or_default(),
    }))
}

// GET /visualize/{agent_type}
pub async fn visualize(
    State(state): State<Arc<AppState>>,
    Path(agent_type): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let kind: AgentKind = agent_type
        .parse()
        .map_err(ApiError::with_context("Error visualizing agent"))?;
    let dot = state.factory.graph_dot(kind, &state.config.viz.graph_layout);
    Ok(Json(serde_json::json!({ "dot": dot })))
}
