//! The seen-marking protocol.

use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};

use tipline_db::models::{SeenError, SeenKind, SeenRef};
use tipline_types::api::{SeenRequest, StatusMessage};

use crate::error::{ApiError, parse_json};
use crate::middleware::CurrentJournalist;
use crate::{AppState, blocking};

/// `POST /seen`. Builds one tagged batch out of the three uuid lists and
/// hands it to the store, which validates every reference before marking
/// anything.
pub async fn mark_seen(
    State(state): State<AppState>,
    Extension(CurrentJournalist(journalist)): Extension<CurrentJournalist>,
    body: Bytes,
) -> Result<Json<StatusMessage>, ApiError> {
    let request: SeenRequest = parse_json(&body, "Please send requests in valid JSON.")?;

    let files = request.files.unwrap_or_default();
    let messages = request.messages.unwrap_or_default();
    let replies = request.replies.unwrap_or_default();
    if files.is_empty() && messages.is_empty() && replies.is_empty() {
        return Err(ApiError::BadRequest(
            "Please specify the resources to mark seen.".to_string(),
        ));
    }

    let refs: Vec<SeenRef> = files
        .into_iter()
        .map(|uuid| SeenRef {
            kind: SeenKind::File,
            uuid,
        })
        .chain(messages.into_iter().map(|uuid| SeenRef {
            kind: SeenKind::Message,
            uuid,
        }))
        .chain(replies.into_iter().map(|uuid| SeenRef {
            kind: SeenKind::Reply,
            uuid,
        }))
        .collect();

    blocking(move || {
        state
            .db
            .mark_seen(&journalist.uuid, &refs)
            .map_err(|err| match err {
                SeenError::TargetNotFound(kind, uuid) => {
                    ApiError::NotFound(format!("{kind} not found: {uuid}"))
                }
                SeenError::Store(cause) => ApiError::Internal(cause),
            })
    })
    .await?;

    Ok(Json(StatusMessage::new("resources marked seen")))
}
