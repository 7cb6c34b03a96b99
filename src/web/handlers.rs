use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use serde_json::{json, Value};

use super::error::WebError;
use super::pages;
use super::upload::{allowed_file, secure_filename};
use super::SharedState;

// ============================================================================
// Health Check
// ============================================================================

pub async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

// ============================================================================
// Upload
// ============================================================================

pub async fn index() -> Html<&'static str> {
    Html(pages::INDEX_PAGE)
}

/// Re-present the form; validation failures carry no detail
fn back_to_form() -> Response {
    Redirect::to("/").into_response()
}

/// Accept an upload, colorize it and redirect to the result view.
///
/// Two records are written per successful request: the upload before the
/// pipeline runs and the output after it succeeds. If the pipeline fails,
/// the upload record and file are rolled back.
pub async fn upload(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, WebError> {
    // Expiry is request-driven: every upload attempt sweeps first
    let sweeper = state.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || sweeper.sweep_expired()).await {
        tracing::warn!("Expiry sweep task failed: {}", e);
    }

    let Ok(mut multipart) = multipart else {
        return Ok(back_to_form());
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let client_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        upload = Some((client_name, data));
        break;
    }

    let Some((client_name, data)) = upload else {
        tracing::debug!("Upload without a file field");
        return Ok(back_to_form());
    };

    if client_name.is_empty() || data.is_empty() || !allowed_file(&client_name) {
        tracing::debug!("Rejected upload {:?} ({} bytes)", client_name, data.len());
        return Ok(back_to_form());
    }

    let filename = secure_filename(&client_name);
    if !allowed_file(&filename) {
        tracing::debug!("Rejected upload {:?}: nothing left after sanitizing", client_name);
        return Ok(back_to_form());
    }

    let input = state.dirs.path_for(&filename, false);
    let output = state.dirs.path_for(&filename, true);

    tokio::fs::write(&input, &data).await?;
    let upload_id = state.library().record_upload(&filename)?;

    tracing::info!("📥 Received {} ({} bytes)", filename, data.len());

    match state.worker.colorize(input.clone(), output).await {
        Ok(_) => {
            state.library().record_output(&filename)?;
            Ok(Redirect::to(&format!("/result/{}", filename)).into_response())
        }
        Err(e) => {
            let rollback = state.library().delete_record(upload_id);
            if let Err(db_err) = rollback {
                tracing::warn!("Could not roll back upload record {}: {}", upload_id, db_err);
            }

            // An earlier upload under the same name still owns the file
            let still_referenced = state
                .library()
                .is_referenced(&filename, false)
                .unwrap_or(true);
            if !still_referenced {
                if let Err(fs_err) = tokio::fs::remove_file(&input).await {
                    tracing::debug!("Could not remove {}: {}", input.display(), fs_err);
                }
            }
            Err(e.into())
        }
    }
}

// ============================================================================
// Results
// ============================================================================

pub async fn result(Path(filename): Path<String>) -> Html<String> {
    Html(pages::result_page(&filename))
}

/// Serve a colorized file, but only if an output record names it.
/// A file sitting in the outputs directory without a record is not served.
pub async fn output_file(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<Response, WebError> {
    if secure_filename(&filename) != filename {
        return Err(WebError::NotFound);
    }

    let record = state.library().find_output_record(&filename)?;
    if record.is_none() {
        return Err(WebError::NotFound);
    }

    let path = state.dirs.path_for(&filename, true);
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Output record for {} has no file", filename);
            return Err(WebError::NotFound);
        }
        Err(e) => return Err(e.into()),
    };

    let headers = [
        (header::CONTENT_TYPE, content_type_for(&filename).to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];

    Ok((headers, data).into_response())
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}
