// ABOUTME: End-to-end smoke test for the full partshelf conversion lifecycle.
// ABOUTME: Drives the router with a scripted converter: convert, resubmit, fail, browse, and download.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use http::Request;
use partshelf_converter::testing::{Script, ScriptedConverter};
use partshelf_core::LogBroadcaster;
use partshelf_server::{AppState, ServerConfig, create_router};
use tower::ServiceExt;

/// Helper to extract JSON body from a response.
async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn convert_request(body: serde_json::Value) -> Request<Body> {
    Request::post("/api/convert")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Count regular files below `dir`, recursively.
fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|e| {
            let path = e.path();
            if path.is_dir() { count_files(&path) } else { 1 }
        })
        .sum()
}

#[tokio::test]
async fn smoke_test_full_lifecycle() {
    // 1. State over a temp output root with a converter that fails for one part
    let dir = tempfile::TempDir::new().unwrap();
    let converter = Arc::new(
        ScriptedConverter::default().with_script("C999999", Script::failing(1)),
    );
    let state = Arc::new(AppState::with_converter(
        ServerConfig::for_output_base(dir.path()),
        LogBroadcaster::default(),
        converter.clone(),
    ));
    let mut logs = state.log.subscribe();
    let app = create_router(state.clone());

    let library = dir.path().join("library").join("easyeda_lib_default");
    let ledger = library.join(".processed_lcsc_ids.log");

    // 2. First conversion lands symbol, footprint, and model
    let resp = app
        .clone()
        .oneshot(convert_request(serde_json::json!({ "lcsc_id": "C123456" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let report = json_body(resp).await;
    assert_eq!(report["library"], "easyeda_lib_default");
    assert_eq!(report["processed"], serde_json::json!(["C123456"]));
    assert_eq!(count_files(&library.join("symbols")), 1);
    assert!(library.join("footprints/R0603.kicad_mod").is_file());
    assert!(library.join("3dshapes/R0603.step").is_file());
    assert_eq!(std::fs::read_to_string(&ledger).unwrap().trim(), "C123456");

    // 3. Resubmitting is a skip; the converter is not invoked again
    let resp = app
        .clone()
        .oneshot(convert_request(serde_json::json!({ "lcsc_id": "C123456" })))
        .await
        .unwrap();
    let report = json_body(resp).await;
    assert_eq!(report["skipped"], serde_json::json!(["C123456"]));
    assert_eq!(report["processed"], serde_json::json!([]));
    assert_eq!(converter.calls(), vec!["C123456".to_string()]);
    assert_eq!(count_files(&library), 4);

    // 4. A failing conversion is reported, not recorded, and leaves no scratch files
    let resp = app
        .clone()
        .oneshot(convert_request(serde_json::json!({ "lcsc_id": "C999999" })))
        .await
        .unwrap();
    let report = json_body(resp).await;
    assert_eq!(report["failed"], serde_json::json!(["C999999"]));
    assert_eq!(std::fs::read_to_string(&ledger).unwrap().trim(), "C123456");
    assert_eq!(count_files(&dir.path().join("temp")), 0);

    // 5. Progress went out on the log channel
    let lines: Vec<String> = logs.drain().into_iter().map(|e| e.text).collect();
    assert!(lines.iter().any(|l| l == "Converting C123456..."));
    assert!(lines.iter().any(|l| l == "[C123456] Fetching part data"));
    assert!(
        lines
            .iter()
            .any(|l| l == "[ERROR] Conversion failed for C999999 with exit code 1")
    );

    // 6. The library is browsable and its files downloadable
    let resp = app
        .clone()
        .oneshot(
            Request::get("/api/browse?path=footprints")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let browse = json_body(resp).await;
    assert_eq!(browse["listing"]["entries"][0]["name"], "R0603.kicad_mod");

    let resp = app
        .oneshot(
            Request::get("/download/library/easyeda_lib_default/3dshapes/R0603.step")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}
