// ABOUTME: Library instance endpoints: list every instance and start a new one.
// ABOUTME: A newly created instance is the most recently modified and therefore becomes active.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Local;
use serde::Serialize;

use partshelf_store::{LibraryInstance, SelectorError, create_instance, list_instances};

use crate::api::error_response;
use crate::app_state::SharedState;

#[derive(Debug, Serialize)]
pub struct LibrariesResponse {
    pub active: Option<String>,
    pub instances: Vec<LibraryInstance>,
}

/// GET /api/libraries - List all instances, newest (active) first.
pub async fn list_libraries(State(state): State<SharedState>) -> Response {
    match list_instances(&state.config.library_root(), &state.config.lib_prefix) {
        Ok(instances) => Json(LibrariesResponse {
            active: instances.first().map(|i| i.name.clone()),
            instances,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("failed to list library instances: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to list library instances")
        }
    }
}

/// POST /api/libraries - Create a new timestamped instance.
pub async fn create_library(State(state): State<SharedState>) -> Response {
    let tag = Local::now().format("%Y%m%d_%H%M%S").to_string();
    match create_instance(&state.config.library_root(), &state.config.lib_prefix, &tag) {
        Ok(instance) => {
            tracing::info!("New parts will go into library '{}'", instance.name);
            (StatusCode::CREATED, Json(instance)).into_response()
        }
        Err(e @ SelectorError::InvalidName(_)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            tracing::error!("{}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
