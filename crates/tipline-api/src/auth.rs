//! Token issuance and revocation.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use chrono::{Duration, SecondsFormat, Utc};
use tracing::info;

use tipline_crypto::token::{mint_token, token_hash};
use tipline_db::models::LoginError;
use tipline_types::api::{StatusMessage, TokenRequest, TokenResponse};

use crate::error::{ApiError, parse_json};
use crate::{AppState, blocking};

const TOKEN_LIFETIME_HOURS: i64 = 8;

/// `POST /token`. Every verification failure, throttling included, folds
/// into one generic 403 so callers cannot probe for valid usernames.
pub async fn get_token(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TokenResponse>, ApiError> {
    let request: TokenRequest = parse_json(&body, "please send requests in valid JSON")?;
    let username = request
        .username
        .ok_or_else(|| ApiError::BadRequest("username field is missing".to_string()))?;
    let passphrase = request
        .passphrase
        .ok_or_else(|| ApiError::BadRequest("passphrase field is missing".to_string()))?;
    let one_time_code = request
        .one_time_code
        .ok_or_else(|| ApiError::BadRequest("one_time_code field is missing".to_string()))?;

    let issued_at = Utc::now();
    let expires_at = issued_at + Duration::hours(TOKEN_LIFETIME_HOURS);

    let response = blocking(move || {
        let journalist = state
            .db
            .login(&username, &passphrase, &one_time_code)
            .map_err(|err| match err {
                LoginError::Store(source) => ApiError::Internal(source),
                cause => {
                    info!(%username, %cause, "login rejected");
                    ApiError::Forbidden("Token authentication failed.".to_string())
                }
            })?;

        let token = mint_token();
        state
            .db
            .issue_token(&journalist.uuid, &token_hash(&token), issued_at, expires_at)?;

        Ok(TokenResponse {
            token,
            expiration: expires_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            journalist_uuid: journalist.uuid,
            journalist_first_name: journalist.first_name,
            journalist_last_name: journalist.last_name,
        })
    })
    .await?;

    Ok(Json(response))
}

/// `POST /logout`. Deletes the presented token; the authentication stage
/// has already established it was valid.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatusMessage>, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(' ').nth(1))
        .unwrap_or("");
    let hash = token_hash(token);

    blocking(move || Ok(state.db.revoke_token(&hash)?)).await?;
    Ok(Json(StatusMessage::new("Your token has been revoked.")))
}
