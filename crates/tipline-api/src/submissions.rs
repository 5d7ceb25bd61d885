//! Submission listings, retrieval, deletion, and downloads.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;

use tipline_db::Database;
use tipline_db::models::{SubmissionKind, SubmissionRow};
use tipline_types::api::{StatusMessage, SubmissionList, SubmissionResponse};

use crate::download::serve_encrypted_blob;
use crate::error::ApiError;
use crate::sources::fetch_source;
use crate::{AppState, blocking};

fn shape(row: &SubmissionRow, seen_by: Vec<String>) -> SubmissionResponse {
    SubmissionResponse {
        uuid: row.uuid.clone(),
        source_uuid: row.source_uuid.clone(),
        filename: row.filename.clone(),
        is_file: row.kind == SubmissionKind::File,
        is_message: row.kind == SubmissionKind::Message,
        size: row.size,
        seen_by,
    }
}

/// Attaches `seen_by` lists to a batch of rows with one receipt query.
fn shape_all(db: &Database, rows: Vec<SubmissionRow>) -> anyhow::Result<Vec<SubmissionResponse>> {
    let uuids: Vec<String> = rows.iter().map(|r| r.uuid.clone()).collect();
    let mut seen: HashMap<String, Vec<String>> = HashMap::new();
    for (item, journalist) in db.seen_by_for_submissions(&uuids)? {
        seen.entry(item).or_default().push(journalist);
    }
    Ok(rows
        .into_iter()
        .map(|row| {
            let seen_by = seen.remove(&row.uuid).unwrap_or_default();
            shape(&row, seen_by)
        })
        .collect())
}

pub async fn source_submissions(
    State(state): State<AppState>,
    Path(source_uuid): Path<String>,
) -> Result<Json<SubmissionList>, ApiError> {
    let source = fetch_source(&state, &source_uuid).await?;
    let list = blocking(move || {
        let rows = state.db.submissions_for_source(&source.uuid)?;
        Ok(SubmissionList {
            submissions: shape_all(&state.db, rows)?,
        })
    })
    .await?;
    Ok(Json(list))
}

/// `GET /submissions`: the global listing, orphans filtered.
pub async fn all_submissions(
    State(state): State<AppState>,
) -> Result<Json<SubmissionList>, ApiError> {
    let list = blocking(move || {
        let rows = state.db.all_submissions()?;
        Ok(SubmissionList {
            submissions: shape_all(&state.db, rows)?,
        })
    })
    .await?;
    Ok(Json(list))
}

pub async fn single_submission(
    State(state): State<AppState>,
    Path((source_uuid, submission_uuid)): Path<(String, String)>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    fetch_source(&state, &source_uuid).await?;
    let response = blocking(move || {
        let row = state
            .db
            .get_submission(&submission_uuid)?
            .ok_or_else(|| ApiError::NotFound("resource not found".to_string()))?;
        let mut shaped = shape_all(&state.db, vec![row])?;
        Ok(shaped.remove(0))
    })
    .await?;
    Ok(Json(response))
}

pub async fn delete_submission(
    State(state): State<AppState>,
    Path((source_uuid, submission_uuid)): Path<(String, String)>,
) -> Result<Json<StatusMessage>, ApiError> {
    fetch_source(&state, &source_uuid).await?;
    blocking(move || {
        let row = state
            .db
            .get_submission(&submission_uuid)?
            .ok_or_else(|| ApiError::NotFound("resource not found".to_string()))?;
        // The blob lives under the submission's own source directory.
        if let Some(filesystem_id) = state.db.source_filesystem_id(&row.source_uuid)? {
            state.storage.delete_blob(&filesystem_id, &row.filename)?;
        }
        state.db.delete_submission(&row.uuid)?;
        Ok(())
    })
    .await?;
    Ok(Json(StatusMessage::new("Submission deleted")))
}

pub async fn download_submission(
    State(state): State<AppState>,
    Path((source_uuid, submission_uuid)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    fetch_source(&state, &source_uuid).await?;
    let (filename, bytes) = blocking(move || {
        let row = state
            .db
            .get_submission(&submission_uuid)?
            .ok_or_else(|| ApiError::NotFound("resource not found".to_string()))?;
        let filesystem_id = state
            .db
            .source_filesystem_id(&row.source_uuid)?
            .ok_or_else(|| ApiError::NotFound("resource not found".to_string()))?;
        let bytes = state.storage.read(&filesystem_id, &row.filename)?;
        Ok((row.filename, bytes))
    })
    .await?;
    Ok(serve_encrypted_blob(&headers, &filename, bytes))
}
