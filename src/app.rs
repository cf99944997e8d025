use crate::{handlers, state::AppState};
use axum::{routing::any, Router};
use tower_http::trace::TraceLayer;
use tracing::Level;

pub fn build_router(state: AppState) -> Router {
    // Single resource, single route. The root is method-agnostic; additional
    // routes hang off this router once the service grows past "list".
    Router::new()
        .route("/", any(handlers::list_products))
        // HTTP request logging
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %req.method(),
                    uri = %req.uri(),
                )
            }),
        )
        .with_state(state)
}
