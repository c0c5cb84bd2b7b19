// ABOUTME: Route definitions for the partshelf HTTP surface.
// ABOUTME: Assembles the web page, JSON API, download, and SSE routes into one Axum Router.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;
use crate::web;

/// Largest accepted request body; BOM exports can be sizeable.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(web::index).post(web::submit))
        .route("/health", get(health))
        .route("/api/convert", post(api::convert::convert))
        .route("/api/browse", get(api::browse::browse))
        .route(
            "/api/libraries",
            get(api::libraries::list_libraries).post(api::libraries::create_library),
        )
        .route("/download/{*path}", get(api::download::download))
        .route("/logs", get(api::stream::logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use crate::config::ServerConfig;
    use axum::body::Body;
    use http::Request;
    use partshelf_converter::testing::ScriptedConverter;
    use partshelf_core::LogBroadcaster;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        Arc::new(AppState::with_converter(
            ServerConfig::for_output_base(std::env::temp_dir().join("partshelf-test")),
            LogBroadcaster::default(),
            Arc::new(ScriptedConverter::default()),
        ))
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = create_router(test_state());
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = create_router(test_state());
        let resp = app
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }
}
