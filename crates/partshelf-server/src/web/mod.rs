// ABOUTME: Web UI route handlers serving the single HTML page via an Askama template.
// ABOUTME: Renders the submission form, the batch report, the active library listing, and the live log panel.

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use chrono::Local;

use askama::Template;
use askama_derive_axum::IntoResponse as AskamaIntoResponse;

use partshelf_core::BatchReport;
use partshelf_store::{DirectoryListing, ListingError, list_directory};

use crate::api::browse::{BrowseQuery, listing_status};
use crate::app_state::SharedState;
use crate::submission::{SubmissionInput, run_submission};

/// One row of the directory listing, pre-formatted for display.
pub struct EntryView {
    pub name: String,
    pub is_dir: bool,
    pub rel_path: String,
    pub download_path: Option<String>,
    pub size: String,
    pub modified: String,
}

/// The whole page.
#[derive(Template, AskamaIntoResponse)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub library: String,
    pub current_path: String,
    pub parent: Option<String>,
    pub entries: Vec<EntryView>,
    pub listing_error: Option<String>,
    pub report: Option<BatchReport>,
}

impl IndexTemplate {
    fn new(library: String, relative: &str, listing: Result<DirectoryListing, ListingError>) -> Self {
        match listing {
            Ok(listing) => Self {
                library,
                current_path: listing.path,
                parent: listing.parent,
                entries: listing.entries.into_iter().map(entry_view).collect(),
                listing_error: None,
                report: None,
            },
            Err(e) => Self {
                library,
                current_path: relative.to_string(),
                parent: None,
                entries: Vec::new(),
                listing_error: Some(e.to_string()),
                report: None,
            },
        }
    }
}

fn entry_view(entry: partshelf_store::DirEntry) -> EntryView {
    EntryView {
        size: if entry.is_dir {
            format!("{:>8}", "<DIR>")
        } else {
            format!("{:>8}", entry.size)
        },
        modified: entry
            .modified
            .with_timezone(&Local)
            .format("%m/%d/%Y %I:%M %p")
            .to_string(),
        name: entry.name,
        is_dir: entry.is_dir,
        rel_path: entry.rel_path,
        download_path: entry.download_path,
    }
}

/// Build the page for the active library at `relative`, or the error
/// response for a structural or forbidden request.
fn render_page(state: &SharedState, relative: &str) -> Result<IndexTemplate, Response> {
    let instance = state.active_library().map_err(|e| {
        tracing::error!("{}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!("<p class=\"error-msg\">{e}</p>")),
        )
            .into_response()
    })?;

    let listing = list_directory(&instance.root_path, relative, &state.config.output_base);
    if let Err(e @ ListingError::Outside(_)) = &listing {
        tracing::warn!("Attempted to access path outside library root: {}", relative);
        return Err((listing_status(e), Html("<p class=\"error-msg\">Forbidden</p>")).into_response());
    }
    if let Err(e) = &listing {
        tracing::error!("Error listing directory {}: {}", relative, e);
    }

    Ok(IndexTemplate::new(instance.name, relative, listing))
}

/// GET / - Render the page, browsing `?path=` inside the active library.
pub async fn index(State(state): State<SharedState>, Query(query): Query<BrowseQuery>) -> Response {
    state.reload_settings();
    let relative = query.path.unwrap_or_else(|| ".".to_string());
    match render_page(&state, &relative) {
        Ok(page) => page.into_response(),
        Err(resp) => resp,
    }
}

/// POST / - Accept the multipart form (`lcsc_id`, `csv_file`), run the
/// batch, and render the page with its report.
pub async fn submit(
    State(state): State<SharedState>,
    Query(query): Query<BrowseQuery>,
    mut multipart: Multipart,
) -> Response {
    let mut input = SubmissionInput::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("malformed form submission: {}", e);
                return (StatusCode::BAD_REQUEST, Html(format!("<p class=\"error-msg\">{e}</p>")))
                    .into_response();
            }
        };

        match field.name() {
            Some("lcsc_id") => match field.text().await {
                Ok(text) => input.lcsc_id = Some(text),
                Err(e) => return e.into_response(),
            },
            Some("csv_file") => {
                let has_name = field.file_name().is_some_and(|n| !n.is_empty());
                match field.bytes().await {
                    Ok(bytes) if has_name => input.csv = Some(bytes.to_vec()),
                    Ok(_) => {}
                    Err(e) => return e.into_response(),
                }
            }
            _ => {}
        }
    }

    let outcome = match run_submission(&state, input).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("{}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("<p class=\"error-msg\">{e}</p>")),
            )
                .into_response();
        }
    };

    let relative = query.path.unwrap_or_else(|| ".".to_string());
    match render_page(&state, &relative) {
        Ok(mut page) => {
            page.report = Some(outcome.report);
            page.into_response()
        }
        Err(resp) => resp,
    }
}
