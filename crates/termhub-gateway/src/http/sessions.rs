//! `/api/v1/terminal/sessions*` — session lifecycle endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::Result;
use crate::session::SessionView;

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub tool: String,
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionView>> {
    let view = state.orchestrator.create_session(&req.tool, req.name).await?;
    Ok(Json(view))
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionView>> {
    Json(state.orchestrator.list_sessions().await)
}

#[derive(Serialize)]
pub struct OutputResponse {
    pub output: String,
}

pub async fn get_output(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OutputResponse>> {
    let output = state.orchestrator.get_session_output(&id).await?;
    Ok(Json(OutputResponse { output }))
}

#[derive(Deserialize)]
pub struct InputRequest {
    pub input: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

const OK: SuccessResponse = SuccessResponse { success: true };

pub async fn send_input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<InputRequest>,
) -> Result<Json<SuccessResponse>> {
    state.orchestrator.send_input(&id, &req.input).await?;
    Ok(Json(OK))
}

pub async fn attach(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    state.orchestrator.attach(&id).await?;
    Ok(Json(OK))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    state.orchestrator.delete_session(&id).await?;
    Ok(Json(OK))
}
