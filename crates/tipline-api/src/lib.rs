//! HTTP layer: router assembly, middleware ordering, and one handler
//! module per resource.
//!
//! Requests pass through two fixed stages before any handler runs:
//! payload validation (shape only) and token authentication. Both apply
//! to matched routes; unknown paths fall through to the 404 fallback
//! without touching either stage.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::Json;
use axum::routing::{delete, get, post};
use serde_json::{Value, json};

use tipline_db::Database;
use tipline_store::Storage;

use crate::error::ApiError;

pub mod auth;
pub mod download;
pub mod error;
pub mod middleware;
pub mod registration;
pub mod replies;
pub mod seen;
pub mod sources;
pub mod submissions;
pub mod users;

/// Request bodies larger than this are rejected outright.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub struct AppStateInner {
    pub db: Database,
    pub storage: Storage,
}

pub type AppState = Arc<AppStateInner>;

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(endpoint_index))
        .route("/token", post(auth::get_token));

    let protected = Router::new()
        .route("/register", post(registration::register))
        .route("/sources", get(sources::all_sources))
        .route(
            "/sources/{source_uuid}",
            get(sources::single_source).delete(sources::delete_source),
        )
        .route("/sources/{source_uuid}/add_star", post(sources::add_star))
        .route(
            "/sources/{source_uuid}/remove_star",
            delete(sources::remove_star),
        )
        .route(
            "/sources/{source_uuid}/submissions",
            get(submissions::source_submissions),
        )
        .route(
            "/sources/{source_uuid}/submissions/{submission_uuid}",
            get(submissions::single_submission).delete(submissions::delete_submission),
        )
        .route(
            "/sources/{source_uuid}/submissions/{submission_uuid}/download",
            get(submissions::download_submission),
        )
        .route(
            "/sources/{source_uuid}/replies",
            get(replies::source_replies).post(replies::create_reply),
        )
        .route(
            "/sources/{source_uuid}/replies/{reply_uuid}",
            get(replies::single_reply).delete(replies::delete_reply),
        )
        .route(
            "/sources/{source_uuid}/replies/{reply_uuid}/download",
            get(replies::download_reply),
        )
        .route("/submissions", get(submissions::all_submissions))
        .route("/replies", get(replies::all_replies))
        .route("/seen", post(seen::mark_seen))
        .route("/user", get(users::current_user))
        .route("/users", get(users::all_users))
        .route("/logout", post(auth::logout))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_token));

    Router::new()
        .merge(public)
        .merge(protected)
        .route_layer(from_fn(middleware::validate_payload))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Directory of top-level endpoints, the one unauthenticated GET.
async fn endpoint_index() -> Json<Value> {
    Json(json!({
        "sources_url": "/sources",
        "current_user_url": "/user",
        "all_users_url": "/users",
        "submissions_url": "/submissions",
        "replies_url": "/replies",
        "seen_url": "/seen",
        "auth_token_url": "/token",
        "registration_url": "/register",
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("resource not found".to_string())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Runs store or blob work on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(err) => Err(ApiError::Internal(anyhow::anyhow!(
            "blocking task failed: {err}"
        ))),
    }
}
