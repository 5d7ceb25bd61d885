//! Source listing, retrieval, starring, and account deletion.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use tipline_db::Database;
use tipline_db::models::SourceRow;
use tipline_types::api::{SourceList, SourceResponse, StatusMessage};

use crate::error::ApiError;
use crate::{AppState, blocking};

/// Resolves a source path segment or fails with the uniform 404.
/// Sources marked deleted resolve the same as unknown ones.
pub(crate) async fn fetch_source(state: &AppState, uuid: &str) -> Result<SourceRow, ApiError> {
    let state = state.clone();
    let uuid = uuid.to_string();
    blocking(move || Ok(state.db.get_source(&uuid)?))
        .await?
        .ok_or_else(|| ApiError::NotFound("resource not found".to_string()))
}

fn shape(source: &SourceRow, counts: &HashMap<String, (i64, i64)>) -> SourceResponse {
    let (documents, messages) = counts.get(&source.uuid).copied().unwrap_or((0, 0));
    SourceResponse {
        uuid: source.uuid.clone(),
        journalist_designation: source.journalist_designation.clone(),
        is_starred: source.starred,
        last_updated: source.last_updated.clone(),
        interaction_count: source.interaction_count,
        number_of_documents: documents,
        number_of_messages: messages,
    }
}

fn count_map(db: &Database, sources: &[SourceRow]) -> anyhow::Result<HashMap<String, (i64, i64)>> {
    let uuids: Vec<String> = sources.iter().map(|s| s.uuid.clone()).collect();
    Ok(db
        .submission_counts(&uuids)?
        .into_iter()
        .map(|(uuid, files, messages)| (uuid, (files, messages)))
        .collect())
}

/// `GET /sources`: non-pending, non-deleted sources.
pub async fn all_sources(State(state): State<AppState>) -> Result<Json<SourceList>, ApiError> {
    let list = blocking(move || {
        let sources = state.db.active_sources()?;
        let counts = count_map(&state.db, &sources)?;
        Ok(SourceList {
            sources: sources.iter().map(|s| shape(s, &counts)).collect(),
        })
    })
    .await?;
    Ok(Json(list))
}

pub async fn single_source(
    State(state): State<AppState>,
    Path(source_uuid): Path<String>,
) -> Result<Json<SourceResponse>, ApiError> {
    let response = blocking(move || {
        let source = state
            .db
            .get_source(&source_uuid)?
            .ok_or_else(|| ApiError::NotFound("resource not found".to_string()))?;
        let counts = count_map(&state.db, std::slice::from_ref(&source))?;
        Ok(shape(&source, &counts))
    })
    .await?;
    Ok(Json(response))
}

/// `DELETE /sources/{uuid}`. The deletion marker goes down first so the
/// source disappears from every listing even if blob or row removal is
/// interrupted; the join filters keep any leftover rows invisible.
pub async fn delete_source(
    State(state): State<AppState>,
    Path(source_uuid): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    let source = fetch_source(&state, &source_uuid).await?;
    blocking(move || {
        state.db.mark_source_deleted(&source.uuid)?;
        state.storage.delete_collection(&source.filesystem_id)?;
        state.db.purge_source(&source.uuid)?;
        Ok(())
    })
    .await?;
    Ok(Json(StatusMessage::new("Source account deleted")))
}

pub async fn add_star(
    State(state): State<AppState>,
    Path(source_uuid): Path<String>,
) -> Result<(StatusCode, Json<StatusMessage>), ApiError> {
    let source = fetch_source(&state, &source_uuid).await?;
    blocking(move || Ok(state.db.set_source_starred(&source.uuid, true)?)).await?;
    Ok((StatusCode::CREATED, Json(StatusMessage::new("Star added"))))
}

pub async fn remove_star(
    State(state): State<AppState>,
    Path(source_uuid): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    let source = fetch_source(&state, &source_uuid).await?;
    blocking(move || Ok(state.db.set_source_starred(&source.uuid, false)?)).await?;
    Ok(Json(StatusMessage::new("Star removed")))
}
