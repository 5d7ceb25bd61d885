//! Row types and store-level errors.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use thiserror::Error;

/// A journalist account, including the optional messaging key bundle.
#[derive(Debug, Clone)]
pub struct JournalistRow {
    pub uuid: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub passphrase_hash: String,
    pub otp_secret: String,
    pub is_admin: bool,
    pub last_access: Option<String>,
    pub identity_key: Option<String>,
    pub signed_prekey: Option<String>,
    pub signed_prekey_timestamp: Option<i64>,
    pub prekey_signature: Option<String>,
    pub registration_id: Option<i64>,
    pub created_at: String,
}

impl JournalistRow {
    /// A journalist is registered for messaging once a key bundle is on file.
    pub fn is_registered_for_messaging(&self) -> bool {
        self.identity_key.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SourceRow {
    pub uuid: String,
    pub filesystem_id: String,
    pub journalist_designation: String,
    pub pending: bool,
    pub starred: bool,
    pub interaction_count: i64,
    pub last_updated: String,
    pub deleted_at: Option<String>,
    pub created_at: String,
}

/// Whether a submission arrived as an uploaded document or a typed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    File,
    Message,
}

impl SubmissionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionKind::File => "file",
            SubmissionKind::Message => "message",
        }
    }
}

impl ToSql for SubmissionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SubmissionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "file" => Ok(SubmissionKind::File),
            "message" => Ok(SubmissionKind::Message),
            other => Err(FromSqlError::Other(
                format!("unknown submission kind: {other}").into(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionRow {
    pub uuid: String,
    pub source_uuid: String,
    pub filename: String,
    pub kind: SubmissionKind,
    pub size: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ReplyRow {
    pub uuid: String,
    pub source_uuid: String,
    pub journalist_uuid: String,
    pub filename: String,
    pub size: i64,
    pub created_at: String,
}

/// Key bundle supplied when a journalist registers for end-to-end messaging.
#[derive(Debug, Clone)]
pub struct RegistrationBundle {
    pub identity_key: String,
    pub signed_prekey: String,
    pub signed_prekey_timestamp: i64,
    pub prekey_signature: String,
    pub registration_id: i64,
}

/// The kind of conversation item a seen receipt refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeenKind {
    File,
    Message,
    Reply,
}

impl std::fmt::Display for SeenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SeenKind::File => "file",
            SeenKind::Message => "message",
            SeenKind::Reply => "reply",
        };
        f.write_str(name)
    }
}

/// One item a journalist asks to mark seen, tagged with the list it came from.
#[derive(Debug, Clone)]
pub struct SeenRef {
    pub kind: SeenKind,
    pub uuid: String,
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("too many recent login attempts")]
    Throttled,
    #[error("unknown username")]
    UnknownUsername,
    #[error("wrong passphrase")]
    WrongPassphrase,
    #[error("invalid one-time code")]
    BadOneTimeCode,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for LoginError {
    fn from(err: rusqlite::Error) -> Self {
        LoginError::Store(err.into())
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("journalist is already registered for messaging")]
    AlreadyRegistered,
    #[error("registration id is already in use")]
    RegistrationIdInUse,
    #[error("signed prekey timestamp is not newer than the stored one")]
    StalePrekeyTimestamp,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for RegistrationError {
    fn from(err: rusqlite::Error) -> Self {
        RegistrationError::Store(err.into())
    }
}

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("source not found")]
    SourceNotFound,
    #[error("reply UUID is already in use")]
    UuidInUse,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for ReplyError {
    fn from(err: rusqlite::Error) -> Self {
        ReplyError::Store(err.into())
    }
}

#[derive(Debug, Error)]
pub enum SeenError {
    #[error("{0} not found: {1}")]
    TargetNotFound(SeenKind, String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for SeenError {
    fn from(err: rusqlite::Error) -> Self {
        SeenError::Store(err.into())
    }
}
