use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::server::ServeError;

/// Fatal errors. These reach the top-level boundary in `main`, which logs
/// them and exits non-zero; nothing below that boundary terminates the
/// process itself.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("parsing config: {0}")]
    Config(ConfigError),
    #[error("validating config: {0}")]
    Validate(ConfigError),
    #[error("encoding config as json: {0}")]
    EncodeConfig(#[from] serde_json::Error),
    #[error("connecting to db: {0}")]
    ConnectDb(#[source] sqlx::Error),
    #[error("listening and serving: {0}")]
    Serve(#[from] ServeError),
}

/// Recoverable per-request errors: the request is answered with a status and
/// a small structured body, and the process keeps serving.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("listing products: {0}")]
    ListProducts(#[source] sqlx::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        // The underlying store error goes to the log stream only; clients get
        // a generic payload.
        tracing::error!(error = %self, "request failed");

        let msg = match self {
            RequestError::ListProducts(_) => "listing products",
        };

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: msg.to_string(),
            }),
        )
            .into_response()
    }
}
