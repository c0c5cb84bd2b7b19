// ABOUTME: JSON directory browsing of the active library instance.
// ABOUTME: GET /api/browse?path= lists one directory; paths escaping the instance are refused with 403.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use partshelf_store::{ListingError, list_directory};

use crate::api::error_response;
use crate::app_state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    #[serde(default)]
    pub path: Option<String>,
}

/// Map a listing failure onto an HTTP status.
pub(crate) fn listing_status(err: &ListingError) -> StatusCode {
    match err {
        ListingError::Outside(_) | ListingError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        ListingError::NotFound(_) => StatusCode::NOT_FOUND,
        ListingError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// GET /api/browse - List a directory inside the active library.
pub async fn browse(State(state): State<SharedState>, Query(query): Query<BrowseQuery>) -> Response {
    let instance = match state.active_library() {
        Ok(instance) => instance,
        Err(e) => {
            tracing::error!("{}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let relative = query.path.unwrap_or_else(|| ".".to_string());
    match list_directory(&instance.root_path, &relative, &state.config.output_base) {
        Ok(listing) => Json(serde_json::json!({
            "library": instance.name,
            "listing": listing,
        }))
        .into_response(),
        Err(e) => {
            if matches!(e, ListingError::Outside(_)) {
                tracing::warn!("Attempted to access path outside library root: {}", relative);
            }
            error_response(listing_status(&e), e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::app_state::AppState;
    use crate::config::ServerConfig;
    use crate::routes::create_router;
    use axum::body::Body;
    use http::Request;
    use partshelf_converter::testing::ScriptedConverter;
    use partshelf_core::LogBroadcaster;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state(dir: &TempDir) -> Arc<AppState> {
        Arc::new(AppState::with_converter(
            ServerConfig::for_output_base(dir.path()),
            LogBroadcaster::default(),
            Arc::new(ScriptedConverter::default()),
        ))
    }

    async fn get(state: Arc<AppState>, uri: &str) -> (u16, serde_json::Value) {
        let resp = create_router(state)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status().as_u16();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn lists_the_active_library() {
        let dir = TempDir::new().unwrap();
        let lib = dir.path().join("library").join("easyeda_lib_default");
        std::fs::create_dir_all(lib.join("symbols")).unwrap();
        std::fs::write(lib.join("symbols").join("part.kicad_sym"), "x").unwrap();

        let (status, json) = get(state(&dir), "/api/browse?path=symbols").await;

        assert_eq!(status, 200);
        assert_eq!(json["library"], "easyeda_lib_default");
        assert_eq!(json["listing"]["entries"][0]["name"], "part.kicad_sym");
        assert_eq!(
            json["listing"]["entries"][0]["download_path"],
            "library/easyeda_lib_default/symbols/part.kicad_sym"
        );
    }

    #[tokio::test]
    async fn traversal_is_forbidden() {
        let dir = TempDir::new().unwrap();
        let (status, json) = get(state(&dir), "/api/browse?path=../../etc").await;

        assert_eq!(status, 403);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (status, _) = get(state(&dir), "/api/browse?path=nope").await;
        assert_eq!(status, 404);
    }
}
