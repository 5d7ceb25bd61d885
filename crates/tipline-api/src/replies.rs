//! Reply listings, the reply-creation transaction, deletion, and
//! downloads.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::{Extension, Json};
use axum::body::Bytes;
use tracing::warn;
use uuid::Uuid;

use tipline_db::Database;
use tipline_db::models::{JournalistRow, ReplyError, ReplyRow};
use tipline_store::{NotEncrypted, journalist_filename};
use tipline_types::api::{
    CreateReplyRequest, CreateReplyResponse, ReplyList, ReplyResponse, StatusMessage,
};

use crate::download::serve_encrypted_blob;
use crate::error::{ApiError, parse_json};
use crate::middleware::CurrentJournalist;
use crate::sources::fetch_source;
use crate::{AppState, blocking};

fn shape(row: &ReplyRow, author: Option<&JournalistRow>, seen_by: Vec<String>) -> ReplyResponse {
    ReplyResponse {
        uuid: row.uuid.clone(),
        source_uuid: row.source_uuid.clone(),
        journalist_uuid: row.journalist_uuid.clone(),
        journalist_username: author.map(|j| j.username.clone()).unwrap_or_default(),
        journalist_first_name: author.and_then(|j| j.first_name.clone()),
        journalist_last_name: author.and_then(|j| j.last_name.clone()),
        filename: row.filename.clone(),
        size: row.size,
        seen_by,
    }
}

fn shape_all(db: &Database, rows: Vec<ReplyRow>) -> anyhow::Result<Vec<ReplyResponse>> {
    let authors: HashMap<String, JournalistRow> = db
        .all_journalists()?
        .into_iter()
        .map(|j| (j.uuid.clone(), j))
        .collect();
    let uuids: Vec<String> = rows.iter().map(|r| r.uuid.clone()).collect();
    let mut seen: HashMap<String, Vec<String>> = HashMap::new();
    for (item, journalist) in db.seen_by_for_replies(&uuids)? {
        seen.entry(item).or_default().push(journalist);
    }
    Ok(rows
        .into_iter()
        .map(|row| {
            let seen_by = seen.remove(&row.uuid).unwrap_or_default();
            let author = authors.get(&row.journalist_uuid);
            shape(&row, author, seen_by)
        })
        .collect())
}

pub async fn source_replies(
    State(state): State<AppState>,
    Path(source_uuid): Path<String>,
) -> Result<Json<ReplyList>, ApiError> {
    let source = fetch_source(&state, &source_uuid).await?;
    let list = blocking(move || {
        let rows = state.db.replies_for_source(&source.uuid)?;
        Ok(ReplyList {
            replies: shape_all(&state.db, rows)?,
        })
    })
    .await?;
    Ok(Json(list))
}

/// `GET /replies`: the global listing, orphans filtered.
pub async fn all_replies(State(state): State<AppState>) -> Result<Json<ReplyList>, ApiError> {
    let list = blocking(move || {
        let rows = state.db.all_replies()?;
        Ok(ReplyList {
            replies: shape_all(&state.db, rows)?,
        })
    })
    .await?;
    Ok(Json(list))
}

/// `POST /sources/{uuid}/replies`: the reply-creation transaction.
///
/// Field and uuid-syntax checks run before anything touches the store,
/// so the blob write is attempted only for a request that can otherwise
/// succeed. The store serializes the sequence assignment; if the row
/// insert still fails the written blob is removed before the error goes
/// out.
pub async fn create_reply(
    State(state): State<AppState>,
    Path(source_uuid): Path<String>,
    Extension(CurrentJournalist(journalist)): Extension<CurrentJournalist>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateReplyResponse>), ApiError> {
    let source = fetch_source(&state, &source_uuid).await?;

    let request: CreateReplyRequest = parse_json(&body, "please send requests in valid JSON")?;
    let Some(reply_text) = request.reply else {
        return Err(ApiError::BadRequest(
            "reply not found in request body".to_string(),
        ));
    };
    if reply_text.is_empty() {
        return Err(ApiError::BadRequest("reply should not be empty".to_string()));
    }
    if let Some(supplied) = &request.uuid {
        if Uuid::parse_str(supplied).is_err() {
            return Err(ApiError::BadRequest(
                "'uuid' was not a valid UUID".to_string(),
            ));
        }
    }
    let supplied_uuid = request.uuid;
    let filename_stem = journalist_filename(&source.journalist_designation);

    let row = blocking(move || {
        let mut written: Option<String> = None;
        let outcome = state.db.create_reply(
            &source.uuid,
            &journalist.uuid,
            supplied_uuid.as_deref(),
            |sequence| {
                let path = state.storage.save_pre_encrypted_reply(
                    &source.filesystem_id,
                    sequence,
                    &filename_stem,
                    &reply_text,
                )?;
                let filename = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| anyhow::anyhow!("blob path has no filename"))?;
                written = Some(filename.clone());
                Ok((filename, reply_text.len() as i64))
            },
        );

        outcome.map_err(|err| {
            // A blob written for a transaction that did not commit must
            // not stay on disk.
            if let Some(filename) = &written {
                if let Err(cleanup) = state.storage.delete_blob(&source.filesystem_id, filename) {
                    warn!(error = ?cleanup, %filename, "orphaned reply blob not removed");
                }
            }
            match err {
                ReplyError::SourceNotFound => {
                    ApiError::NotFound("resource not found".to_string())
                }
                ReplyError::UuidInUse => {
                    ApiError::Conflict("That UUID is already in use.".to_string())
                }
                ReplyError::Store(cause) => {
                    if cause.downcast_ref::<NotEncrypted>().is_some() {
                        ApiError::Unencrypted
                    } else {
                        ApiError::Internal(cause)
                    }
                }
            }
        })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateReplyResponse {
            message: "Your reply has been stored".to_string(),
            uuid: row.uuid,
            filename: row.filename,
        }),
    ))
}

pub async fn single_reply(
    State(state): State<AppState>,
    Path((source_uuid, reply_uuid)): Path<(String, String)>,
) -> Result<Json<ReplyResponse>, ApiError> {
    fetch_source(&state, &source_uuid).await?;
    let response = blocking(move || {
        let row = state
            .db
            .get_reply(&reply_uuid)?
            .ok_or_else(|| ApiError::NotFound("resource not found".to_string()))?;
        let mut shaped = shape_all(&state.db, vec![row])?;
        Ok(shaped.remove(0))
    })
    .await?;
    Ok(Json(response))
}

pub async fn delete_reply(
    State(state): State<AppState>,
    Path((source_uuid, reply_uuid)): Path<(String, String)>,
) -> Result<Json<StatusMessage>, ApiError> {
    fetch_source(&state, &source_uuid).await?;
    blocking(move || {
        let row = state
            .db
            .get_reply(&reply_uuid)?
            .ok_or_else(|| ApiError::NotFound("resource not found".to_string()))?;
        if let Some(filesystem_id) = state.db.source_filesystem_id(&row.source_uuid)? {
            state.storage.delete_blob(&filesystem_id, &row.filename)?;
        }
        state.db.delete_reply(&row.uuid)?;
        Ok(())
    })
    .await?;
    Ok(Json(StatusMessage::new("Reply deleted")))
}

pub async fn download_reply(
    State(state): State<AppState>,
    Path((source_uuid, reply_uuid)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    fetch_source(&state, &source_uuid).await?;
    let (filename, bytes) = blocking(move || {
        let row = state
            .db
            .get_reply(&reply_uuid)?
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
