//! Narrata Server
//!
//! Exposes the book narration pipeline's HTTP surface: upload, status,
//! personas, voice-map, segment stream, and bundle download (§6).

pub mod auth;
pub mod bundle;
pub mod http;
pub mod ingest;
pub mod state;
pub mod telemetry;

pub use auth::auth_middleware;
pub use http::create_router;
pub use state::AppState;
pub use telemetry::init_metrics;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<narrata_core::Error> for ServerError {
    fn from(err: narrata_core::Error) -> Self {
        match err {
            narrata_core::Error::BookNotFound(id) => ServerError::NotFound(id),
            narrata_core::Error::NotRunning(id) => ServerError::NotFound(id),
            narrata_core::Error::AlreadyRunning(id) => ServerError::InvalidRequest(format!("pipeline already running for book {id}")),
            other => ServerError::Pipeline(other.to_string()),
        }
    }
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Pipeline(_) => StatusCode::CONFLICT,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);
        (status, self.to_string()).into_response()
    }
}
