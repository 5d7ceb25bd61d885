//! The messaging-registration state machine: Unregistered to Registered,
//! no way back through this API.

use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};

use tipline_db::models::{RegistrationBundle, RegistrationError};
use tipline_types::api::{RegistrationRequest, StatusMessage};

use crate::error::{ApiError, parse_json};
use crate::middleware::CurrentJournalist;
use crate::{AppState, blocking};

/// `POST /register`. The already-registered check runs before field
/// validation; a registered caller gets the same answer whatever the
/// body holds. One-time prekeys are accepted in the payload but not
/// ingested yet.
pub async fn register(
    State(state): State<AppState>,
    Extension(CurrentJournalist(journalist)): Extension<CurrentJournalist>,
    body: Bytes,
) -> Result<Json<StatusMessage>, ApiError> {
    if journalist.is_registered_for_messaging() {
        return Err(ApiError::BadRequest(
            "your account is already registered".to_string(),
        ));
    }

    let request: RegistrationRequest = parse_json(&body, "please send requests in valid JSON")?;
    let identity_key = request
        .identity_key
        .ok_or_else(|| ApiError::BadRequest("identity_key field is missing".to_string()))?;
    let signed_prekey = request
        .signed_prekey
        .ok_or_else(|| ApiError::BadRequest("signed_prekey field is missing".to_string()))?;
    let signed_prekey_timestamp = request.signed_prekey_timestamp.ok_or_else(|| {
        ApiError::BadRequest("signed_prekey_timestamp field is missing".to_string())
    })?;
    let prekey_signature = request
        .prekey_signature
        .ok_or_else(|| ApiError::BadRequest("prekey_signature field is missing".to_string()))?;
    let registration_id = request
        .registration_id
        .ok_or_else(|| ApiError::BadRequest("registration_id field is missing".to_string()))?;

    let bundle = RegistrationBundle {
        identity_key,
        signed_prekey,
        signed_prekey_timestamp,
        prekey_signature,
        registration_id,
    };

    blocking(move || {
        state
            .db
            .register_messaging(&journalist.uuid, &bundle)
            .map_err(|err| match err {
                RegistrationError::AlreadyRegistered => {
                    ApiError::BadRequest("your account is already registered".to_string())
                }
                RegistrationError::RegistrationIdInUse => {
                    ApiError::BadRequest("registration_id is in use".to_string())
                }
                RegistrationError::StalePrekeyTimestamp => ApiError::BadRequest(
                    "signed prekey timestamp should be fresher than what is on the server"
                        .to_string(),
                ),
                RegistrationError::Store(cause) => ApiError::Internal(cause),
            })
    })
    .await?;

    Ok(Json(StatusMessage::new(
        "your account is now registered for messaging",
    )))
}
