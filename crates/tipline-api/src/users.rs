//! Current-actor and redacted journalist listings.

use axum::extract::State;
use axum::{Extension, Json};

use tipline_types::api::{CurrentUserResponse, UserList, UserResponse};

use crate::error::ApiError;
use crate::middleware::CurrentJournalist;
use crate::{AppState, blocking};

pub async fn current_user(
    Extension(CurrentJournalist(journalist)): Extension<CurrentJournalist>,
) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        uuid: journalist.uuid,
        username: journalist.username,
        first_name: journalist.first_name,
        last_name: journalist.last_name,
        is_admin: journalist.is_admin,
        last_access: journalist.last_access,
        registered_for_messaging: journalist.identity_key.is_some(),
    })
}

/// `GET /users`: every journalist, stripped down to public identity.
pub async fn all_users(State(state): State<AppState>) -> Result<Json<UserList>, ApiError> {
    let users = blocking(move || Ok(state.db.all_journalists()?)).await?;
    Ok(Json(UserList {
        users: users
            .into_iter()
            .map(|j| UserResponse {
                uuid: j.uuid,
                username: j.username,
                first_name: j.first_name,
                last_name: j.last_name,
            })
            .collect(),
    }))
}
