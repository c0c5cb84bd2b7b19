// ABOUTME: Streams a file from inside the output root as an attachment.
// ABOUTME: GET /download/{*path}; escaping paths are refused with 403, missing files give 404.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use partshelf_store::resolve_within;

use crate::api::error_response;
use crate::app_state::SharedState;

/// GET /download/{*path} - Send one file as an attachment.
pub async fn download(State(state): State<SharedState>, Path(path): Path<String>) -> Response {
    let full = match resolve_within(&state.config.output_base, &path) {
        Ok(full) => full,
        Err(e) => {
            tracing::warn!("Attempted to download file outside output root: {}", path);
            return error_response(StatusCode::FORBIDDEN, e.to_string());
        }
    };

    if !full.is_file() {
        return error_response(StatusCode::NOT_FOUND, "file not found");
    }

    let file = match tokio::fs::File::open(&full).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!("failed to open {}: {}", full.display(), e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to open file");
        }
    };

    let name = full
        .file_name()
        .map(|n| n.to_string_lossy().replace('"', "_"))
        .unwrap_or_else(|| "download".to_string());

    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\"")),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
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

    fn state(output: &std::path::Path) -> Arc<AppState> {
        Arc::new(AppState::with_converter(
            ServerConfig::for_output_base(output),
            LogBroadcaster::default(),
            Arc::new(ScriptedConverter::default()),
        ))
    }

    async fn get(state: Arc<AppState>, uri: &str) -> http::Response<Body> {
        create_router(state)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn serves_file_as_attachment() {
        let dir = TempDir::new().unwrap();
        let symbols = dir.path().join("library").join("easyeda_lib_default").join("symbols");
        std::fs::create_dir_all(&symbols).unwrap();
        std::fs::write(symbols.join("part.kicad_sym"), "(kicad_symbol_lib)").unwrap();

        let resp = get(
            state(dir.path()),
            "/download/library/easyeda_lib_default/symbols/part.kicad_sym",
        )
        .await;

        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()["content-disposition"],
            "attachment; filename=\"part.kicad_sym\""
        );
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"(kicad_symbol_lib)");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let resp = get(state(dir.path()), "/download/library/nothing.step").await;
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn escaping_the_output_root_is_forbidden() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("output");
        std::fs::create_dir_all(&output).unwrap();
        std::fs::write(dir.path().join("secret.txt"), "nope").unwrap();

        let resp = get(state(&output), "/download/..%2Fsecret.txt").await;
        assert_eq!(resp.status(), 403);
    }
}
