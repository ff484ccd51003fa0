//! The gateway's top-level error type. Wraps every collaborator crate's
//! error, surfaces a short machine-readable `.code()` the way every other
//! crate in this workspace does, and implements `IntoResponse` so handlers
//! can just use `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Mux(#[from] termhub_mux::MuxError),

    #[error(transparent)]
    Store(#[from] termhub_store::StoreError),

    #[error(transparent)]
    Watch(#[from] termhub_watch::WatchError),

    #[error(transparent)]
    Core(#[from] termhub_core::CoreError),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "VALIDATION_ERROR",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::Mux(e) => e.code(),
            GatewayError::Store(e) => e.code(),
            GatewayError::Watch(e) => e.code(),
            GatewayError::Core(e) => e.code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Mux(termhub_mux::MuxError::NotFound(_)) => StatusCode::NOT_FOUND,
            GatewayError::Mux(termhub_mux::MuxError::AlreadyExists(_)) => StatusCode::BAD_REQUEST,
            GatewayError::Store(termhub_store::StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
