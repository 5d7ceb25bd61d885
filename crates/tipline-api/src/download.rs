//! Conditional blob serving shared by submission and reply downloads.

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

/// Serves an encrypted blob with a strong content hash ETag. A request
/// whose `If-None-Match` carries the current ETag gets `304 Not Modified`
/// and no body.
pub(crate) fn serve_encrypted_blob(
    request_headers: &HeaderMap,
    filename: &str,
    bytes: Vec<u8>,
) -> Response {
    let etag = format!("\"sha256:{}\"", hex::encode(Sha256::digest(&bytes)));

    let presented = request_headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok());
    if presented == Some(etag.as_str()) {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
    }

    (
        StatusCode::OK,
        [
            (header::ETAG, etag),
            (
                header::CONTENT_TYPE,
                "application/pgp-encrypted".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}
