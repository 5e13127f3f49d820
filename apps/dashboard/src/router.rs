//! Shared application router builder, used by `main` and the tests.

use std::path::Path;

use axum::Router;
use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::routes;
use crate::state::AppState;

/// Build the full application [`Router`].
///
/// When `static_dir` is given, unmatched paths are served from it and fall
/// back to its `index.html`.
pub fn build_app_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .merge(routes::health::router())
        .nest("/api", routes::api_routes());

    if let Some(dir) = static_dir {
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).fallback(index));
    }

    app.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
    )
    .layer(build_cors_layer())
    .with_state(state)
}

/// The dashboard binds to localhost by default; any origin may call it.
fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
}
