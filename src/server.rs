//! HTTP surface: `POST /generation`.

use crate::app::App;
use crate::models::{GenerationRequest, PuzzleResult};
use crate::Error;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl Error {
    /// Status code and client-facing message. Upstream detail stays in logs.
    pub fn http_status(&self) -> (StatusCode, String) {
        match self {
            Error::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Error::EmptyContent => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "No content returned from model".to_string(),
            ),
            Error::InvalidPuzzle(_) | Error::Serialization(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Invalid response format from model".to_string(),
            ),
            Error::AiProvider(_) | Error::Http(_) => (
                StatusCode::BAD_GATEWAY,
                "Upstream generation failed".to_string(),
            ),
            Error::Timeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "Upstream generation timed out".to_string(),
            ),
            Error::Io(_) | Error::Image(_) | Error::Config(_) | Error::Invariant(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = self.http_status();
        if status.is_server_error() {
            error!("Generation failed ({}): {}", status, self);
        } else {
            warn!("Rejected request ({}): {}", status, self);
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/generation", post(generate))
        .with_state(app)
}

async fn generate(
    State(app): State<Arc<App>>,
    body: Bytes,
) -> Result<Json<PuzzleResult>, Error> {
    let request = GenerationRequest::from_body(&body);
    let result = app.generate(&request).await?;
    Ok(Json(result))
}
