use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use termhub_core::TermhubConfig;
use termhub_hub::BroadcastHub;
use termhub_mux::{MultiplexerGateway, TokioProcessRunner};
use termhub_store::ConversationStore;

use crate::orchestrator::SessionOrchestrator;

/// Central shared state, handed to every axum handler as `Arc<AppState>`.
pub struct AppState {
    pub orchestrator: SessionOrchestrator,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    pub fn new(config: TermhubConfig) -> anyhow::Result<Self> {
        let store = Arc::new(ConversationStore::open(&config.store.path)?);
        let hub = Arc::new(BroadcastHub::new(Arc::clone(&store)));
        let runner = Arc::new(TokioProcessRunner);
        let mux = Arc::new(MultiplexerGateway::new(config.mux.bin.clone(), runner));
        let orchestrator = SessionOrchestrator::new(mux, store, Arc::clone(&hub), Arc::new(config));

        Ok(Self { orchestrator, hub })
    }
}

/// Assemble the full axum router for the `/api/v1` surface.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/terminal/sessions", post(crate::http::sessions::create_session))
        .route("/api/v1/terminal/sessions", get(crate::http::sessions::list_sessions))
        .route(
            "/api/v1/terminal/sessions/{id}/output",
            get(crate::http::sessions::get_output),
        )
        .route(
            "/api/v1/terminal/sessions/{id}/input",
            post(crate::http::sessions::send_input),
        )
        .route(
            "/api/v1/terminal/sessions/{id}/attach",
            post(crate::http::sessions::attach),
        )
        .route(
            "/api/v1/terminal/sessions/{id}",
            delete(crate::http::sessions::delete_session),
        )
        .route(
            "/api/v1/terminal/sessions/{id}/messages",
            get(crate::http::messages::list_messages),
        )
        .route(
            "/api/v1/terminal/sessions/{id}/messages",
            post(crate::http::messages::send_message),
        )
        .route(
            "/api/v1/terminal/sessions/{id}/messages/status",
            get(crate::http::messages::messages_status),
        )
        .route("/api/v1/ws", get(crate::ws::connection::ws_handler))
        .with_state(state)
}
