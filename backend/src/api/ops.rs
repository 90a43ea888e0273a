//! Operations API handlers
//!
//! CLI and workspace pass-through: health, cron jobs, agent status, logs,
//! sessions, and memory notes.

use crate::error::AppError;
use crate::services::workspace::{MemoryContent, MemoryFile, SessionEntry};
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Log lines returned when the caller gives no limit
pub const DEFAULT_LOG_LIMIT: usize = 50;

/// Query of the logs endpoint
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// Number of entries (capped server-side)
    pub limit: Option<usize>,
}

/// Query of the memory endpoint
#[derive(Debug, Deserialize)]
pub struct MemoryQuery {
    /// Note to read; omitted lists the notes
    pub file: Option<String>,
}

/// Sessions list response
#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    /// Most recent sessions, newest first
    pub sessions: Vec<SessionEntry>,
}

/// Memory notes list response
#[derive(Debug, Serialize)]
pub struct MemoryFilesResponse {
    /// Available notes
    pub files: Vec<MemoryFile>,
}

/// GET /api/health - `health --json` from the CLI; failures become `{error}`
pub async fn cli_health(State(state): State<SharedState>) -> Json<Value> {
    let health = state
        .cli
        .health()
        .await
        .unwrap_or_else(|e| json!({ "error": e.to_string() }));
    Json(health)
}

/// GET /api/cron - `cron list` from the CLI
pub async fn list_crons(State(state): State<SharedState>) -> Result<Json<Value>, AppError> {
    Ok(Json(state.cli.cron_list().await?))
}

/// GET /api/agents/status - CLI health plus cron jobs
pub async fn agents_status(State(state): State<SharedState>) -> Json<Value> {
    Json(state.cli.agent_status().await)
}

/// GET /api/logs?limit= - Recent log entries
pub async fn logs(
    State(state): State<SharedState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<Value>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    Ok(Json(state.cli.logs(limit).await?))
}

/// GET /api/sessions - Session index
pub async fn sessions(State(state): State<SharedState>) -> Result<Json<SessionsResponse>, AppError> {
    let sessions = state.workspace.sessions().await?;
    Ok(Json(SessionsResponse { sessions }))
}

/// GET /api/memory[?file=] - List memory notes, or read one
pub async fn memory(
    State(state): State<SharedState>,
    Query(query): Query<MemoryQuery>,
) -> Result<Response, AppError> {
    match query.file {
        Some(file) => {
            let note: MemoryContent = state.workspace.read_memory_file(&file).await?;
            Ok(Json(note).into_response())
        }
        None => {
            let files = state.workspace.memory_files().await?;
            Ok(Json(MemoryFilesResponse { files }).into_response())
        }
    }
}
