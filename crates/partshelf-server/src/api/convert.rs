// ABOUTME: JSON conversion endpoint accepting a single identifier and/or CSV text.
// ABOUTME: POST /api/convert runs the batch synchronously and returns the per-identifier report.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::api::error_response;
use crate::app_state::SharedState;
use crate::submission::{SubmissionInput, run_submission};

/// Request body for a conversion batch.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertRequest {
    #[serde(default)]
    pub lcsc_id: Option<String>,
    /// CSV file contents with an `LCSC` column.
    #[serde(default)]
    pub csv: Option<String>,
}

/// POST /api/convert - Convert the submitted identifiers into the active library.
pub async fn convert(
    State(state): State<SharedState>,
    Json(req): Json<ConvertRequest>,
) -> impl IntoResponse {
    let input = SubmissionInput {
        lcsc_id: req.lcsc_id,
        csv: req.csv.map(String::into_bytes),
    };

    match run_submission(&state, input).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => {
            tracing::error!("{}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
