//! `/api/v1/terminal/sessions/:id/messages*` — conversation log endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use termhub_store::{Message, Sender, SessionStatusRow};

use crate::app::AppState;
use crate::error::{GatewayError, Result};

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    200
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Message>>> {
    let messages = state.orchestrator.list_messages(&id, q.limit, q.offset).await?;
    Ok(Json(messages))
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Message>> {
    if let Some(kind) = &req.kind {
        if kind != "user" {
            return Err(GatewayError::Validation(
                "only type=user messages may be posted".to_string(),
            ));
        }
    }

    let message = state
        .orchestrator
        .send_message(&id, &req.content, Sender::User)
        .await?;
    Ok(Json(message))
}

pub async fn messages_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusRow>> {
    let status = state.orchestrator.messages_status(&id).await?;
    Ok(Json(status))
}
