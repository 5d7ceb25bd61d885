//! The two request gates: payload validation and token authentication.

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{Method, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use tipline_db::models::JournalistRow;

use crate::error::ApiError;
use crate::{AppState, MAX_BODY_BYTES, blocking};

/// The journalist resolved from the presented token, attached to the
/// request for handlers downstream.
#[derive(Clone)]
pub struct CurrentJournalist(pub JournalistRow);

/// POST targets that legitimately carry no payload.
const DATALESS_SUFFIXES: [&str; 4] = ["/add_star", "/remove_star", "/flag", "/logout"];

/// Rejects state-changing requests whose body is empty (unless the target
/// is declared body-optional) or not well-formed JSON. Purely syntactic;
/// field-level validation belongs to the handlers.
pub async fn validate_payload(request: Request, next: Next) -> Result<Response, ApiError> {
    if request.method() != Method::POST {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::BadRequest("malformed request".to_string()))?;

    if bytes.is_empty() {
        if DATALESS_SUFFIXES
            .iter()
            .any(|suffix| parts.uri.path().ends_with(suffix))
        {
            return Ok(next.run(Request::from_parts(parts, Body::empty())).await);
        }
        return Err(ApiError::BadRequest("malformed request".to_string()));
    }

    if serde_json::from_slice::<serde_json::Value>(&bytes).is_err() {
        return Err(ApiError::BadRequest("malformed request".to_string()));
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// Resolves the `Authorization: Token <value>` header to a journalist.
/// Whatever the cause, token rejection never distinguishes a missing
/// token from an expired or revoked one beyond the three fixed messages.
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(header_value) = request.headers().get(header::AUTHORIZATION) else {
        return Err(ApiError::Forbidden(
            "API token not found in Authorization header.".to_string(),
        ));
    };
    let value = header_value
        .to_str()
        .map_err(|_| ApiError::Forbidden("Malformed authorization header.".to_string()))?;
    let token = parse_token_header(value)?.to_string();

    let token_hash = tipline_crypto::token::token_hash(&token);
    let journalist = blocking(move || Ok(state.db.authenticate(&token_hash, Utc::now())?))
        .await?
        .ok_or_else(|| ApiError::Forbidden("API token is invalid or expired.".to_string()))?;

    request.extensions_mut().insert(CurrentJournalist(journalist));
    Ok(next.run(request).await)
}

/// An empty header value flows through as an empty token, which then
/// fails store validation like any other invalid token.
fn parse_token_header(value: &str) -> Result<&str, ApiError> {
    if value.is_empty() {
        return Ok("");
    }
    let parts: Vec<&str> = value.split(' ').collect();
    if parts.len() != 2 || parts[0] != "Token" {
        return Err(ApiError::Forbidden(
            "Malformed authorization header.".to_string(),
        ));
    }
    Ok(parts[1])
}

#[cfg(test)]
mod tests {
    use super::parse_token_header;

    #[test]
    fn token_header_parsing() {
        assert_eq!(parse_token_header("Token abc123").unwrap(), "abc123");
        assert_eq!(parse_token_header("").unwrap(), "");
        assert!(parse_token_header("Bearer abc123").is_err());
        assert!(parse_token_header("Token").is_err());
        assert!(parse_token_header("Token a b").is_err());
    }
}
