use serde::{Deserialize, Serialize};

// Required request fields are Option so handlers can reject with a message
// naming the first missing field, matching the wire behavior clients expect.

// -- Token issuance --

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: Option<String>,
    pub passphrase: Option<String>,
    pub one_time_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    /// Absolute expiry, RFC 3339 UTC with an explicit `Z` suffix.
    pub expiration: String,
    pub journalist_uuid: String,
    pub journalist_first_name: Option<String>,
    pub journalist_last_name: Option<String>,
}

// -- Messaging registration --

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    pub identity_key: Option<String>,
    pub signed_prekey: Option<String>,
    pub signed_prekey_timestamp: Option<i64>,
    pub prekey_signature: Option<String>,
    pub registration_id: Option<i64>,
    // Clients may also send a one_time_prekeys list; ingestion is not
    // implemented yet and the field is deliberately not modeled.
}

// -- Sources --

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceResponse {
    pub uuid: String,
    pub journalist_designation: String,
    pub is_starred: bool,
    pub last_updated: String,
    pub interaction_count: i64,
    pub number_of_documents: i64,
    pub number_of_messages: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceList {
    pub sources: Vec<SourceResponse>,
}

// -- Submissions --

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub uuid: String,
    pub source_uuid: String,
    pub filename: String,
    pub is_file: bool,
    pub is_message: bool,
    pub size: i64,
    /// Uuids of the journalists who have seen this item.
    pub seen_by: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionList {
    pub submissions: Vec<SubmissionResponse>,
}

// -- Replies --

#[derive(Debug, Deserialize)]
pub struct CreateReplyRequest {
    pub reply: Option<String>,
    pub uuid: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateReplyResponse {
    pub message: String,
    pub uuid: String,
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyResponse {
    pub uuid: String,
    pub source_uuid: String,
    pub journalist_uuid: String,
    pub journalist_username: String,
    pub journalist_first_name: Option<String>,
    pub journalist_last_name: Option<String>,
    pub filename: String,
    pub size: i64,
    pub seen_by: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyList {
    pub replies: Vec<ReplyResponse>,
}

// -- Seen marking --

#[derive(Debug, Deserialize)]
pub struct SeenRequest {
    pub files: Option<Vec<String>>,
    pub messages: Option<Vec<String>>,
    pub replies: Option<Vec<String>>,
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentUserResponse {
    pub uuid: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub last_access: Option<String>,
    pub registered_for_messaging: bool,
}

/// Redacted listing entry for `/users`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub uuid: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserList {
    pub users: Vec<UserResponse>,
}

// -- Acks --

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
