//! Journalist accounts: provisioning, login, API tokens, and messaging
//! registration.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;
use uuid::Uuid;

use crate::models::{JournalistRow, LoginError, RegistrationBundle, RegistrationError};
use crate::{Database, format_timestamp, now_timestamp, parse_timestamp};

const LOGIN_WINDOW_SECS: i64 = 60;
const MAX_LOGIN_ATTEMPTS_PER_WINDOW: i64 = 5;

impl Database {
    pub fn create_journalist(
        &self,
        username: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
        passphrase: &str,
        is_admin: bool,
    ) -> Result<JournalistRow> {
        let uuid = Uuid::new_v4().to_string();
        let passphrase_hash = tipline_crypto::passphrase::hash_passphrase(passphrase)?;
        let otp_secret = tipline_crypto::otp::generate_otp_secret();
        let created_at = now_timestamp();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO journalists
                     (uuid, username, first_name, last_name, passphrase_hash,
                      otp_secret, is_admin, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    uuid,
                    username,
                    first_name,
                    last_name,
                    passphrase_hash,
                    otp_secret,
                    is_admin,
                    created_at
                ],
            )?;
            Ok(())
        })?;

        info!(%username, %uuid, "journalist account created");
        Ok(JournalistRow {
            uuid,
            username: username.to_string(),
            first_name: first_name.map(str::to_string),
            last_name: last_name.map(str::to_string),
            passphrase_hash,
            otp_secret,
            is_admin,
            last_access: None,
            identity_key: None,
            signed_prekey: None,
            signed_prekey_timestamp: None,
            prekey_signature: None,
            registration_id: None,
            created_at,
        })
    }

    pub fn get_journalist(&self, uuid: &str) -> Result<Option<JournalistRow>> {
        self.with_conn(|conn| Ok(find_journalist_by_uuid(conn, uuid)?))
    }

    pub fn all_journalists(&self) -> Result<Vec<JournalistRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOURNALIST_COLUMNS} FROM journalists ORDER BY created_at, uuid"
            ))?;
            let rows = stmt
                .query_map([], journalist_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Verifies a passphrase and one-time code against a journalist account.
    ///
    /// The attempt is recorded in autocommit mode before credentials are
    /// checked, so failed verifications still count toward the throttle.
    /// Holding the connection lock for the whole exchange keeps the
    /// check-then-record sequence race free.
    pub fn login(
        &self,
        username: &str,
        passphrase: &str,
        one_time_code: &str,
    ) -> Result<JournalistRow, LoginError> {
        let now = Utc::now();
        let conn = self.lock()?;

        let mut journalist =
            find_journalist_by_username(&conn, username)?.ok_or(LoginError::UnknownUsername)?;

        let cutoff = format_timestamp(now - Duration::seconds(LOGIN_WINDOW_SECS));
        let recent: i64 = conn.query_row(
            "SELECT COUNT(*) FROM login_attempts
             WHERE journalist_uuid = ?1 AND attempted_at > ?2",
            params![journalist.uuid, cutoff],
            |row| row.get(0),
        )?;
        if recent >= MAX_LOGIN_ATTEMPTS_PER_WINDOW {
            return Err(LoginError::Throttled);
        }

        conn.execute(
            "DELETE FROM login_attempts WHERE journalist_uuid = ?1 AND attempted_at <= ?2",
            params![journalist.uuid, cutoff],
        )?;
        conn.execute(
            "INSERT INTO login_attempts (journalist_uuid, attempted_at) VALUES (?1, ?2)",
            params![journalist.uuid, format_timestamp(now)],
        )?;

        if !tipline_crypto::passphrase::verify_passphrase(&journalist.passphrase_hash, passphrase)?
        {
            return Err(LoginError::WrongPassphrase);
        }
        if !tipline_crypto::otp::verify_totp(&journalist.otp_secret, one_time_code, now.timestamp())?
        {
            return Err(LoginError::BadOneTimeCode);
        }

        let last_access = format_timestamp(now);
        conn.execute(
            "UPDATE journalists SET last_access = ?1 WHERE uuid = ?2",
            params![last_access, journalist.uuid],
        )?;
        journalist.last_access = Some(last_access);
        Ok(journalist)
    }

    pub fn issue_token(
        &self,
        journalist_uuid: &str,
        token_hash: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO api_tokens (token_hash, journalist_uuid, issued_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    token_hash,
                    journalist_uuid,
                    format_timestamp(issued_at),
                    format_timestamp(expires_at)
                ],
            )?;
            Ok(())
        })
    }

    /// Resolves a token hash to its journalist, refreshing `last_access`.
    /// Expired tokens are deleted on sight and resolve to `None`.
    pub fn authenticate(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<JournalistRow>> {
        self.with_tx(|tx| {
            let token: Option<(String, String)> = tx
                .query_row(
                    "SELECT journalist_uuid, expires_at FROM api_tokens WHERE token_hash = ?1",
                    [token_hash],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((journalist_uuid, expires_at)) = token else {
                return Ok(None);
            };

            if parse_timestamp(&expires_at)? <= now {
                tx.execute("DELETE FROM api_tokens WHERE token_hash = ?1", [token_hash])?;
                return Ok(None);
            }

            tx.execute(
                "UPDATE journalists SET last_access = ?1 WHERE uuid = ?2",
                params![format_timestamp(now), journalist_uuid],
            )?;
            Ok(find_journalist_by_uuid(tx, &journalist_uuid)?)
        })
    }

    pub fn revoke_token(&self, token_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM api_tokens WHERE token_hash = ?1", [token_hash])?;
            Ok(())
        })
    }

    /// Stores a messaging key bundle, enforcing the one-shot registration
    /// rules inside a single transaction.
    pub fn register_messaging(
        &self,
        journalist_uuid: &str,
        bundle: &RegistrationBundle,
    ) -> Result<(), RegistrationError> {
        self.with_tx(|tx| {
            let journalist = find_journalist_by_uuid(tx, journalist_uuid)?
                .ok_or_else(|| anyhow!("journalist {journalist_uuid} not found"))
                .map_err(RegistrationError::Store)?;

            if journalist.is_registered_for_messaging() {
                return Err(RegistrationError::AlreadyRegistered);
            }

            let holders: i64 = tx.query_row(
                "SELECT COUNT(*) FROM journalists WHERE registration_id = ?1",
                [bundle.registration_id],
                |row| row.get(0),
            )?;
            if holders > 0 {
                return Err(RegistrationError::RegistrationIdInUse);
            }

            if let Some(stored) = journalist.signed_prekey_timestamp {
                if bundle.signed_prekey_timestamp <= stored {
                    return Err(RegistrationError::StalePrekeyTimestamp);
                }
            }

            tx.execute(
                "UPDATE journalists
                 SET identity_key = ?1, signed_prekey = ?2, signed_prekey_timestamp = ?3,
                     prekey_signature = ?4, registration_id = ?5
                 WHERE uuid = ?6",
                params![
                    bundle.identity_key,
                    bundle.signed_prekey,
                    bundle.signed_prekey_timestamp,
                    bundle.prekey_signature,
                    bundle.registration_id,
                    journalist_uuid
                ],
            )?;
            Ok(())
        })
    }
}

const JOURNALIST_COLUMNS: &str = "uuid, username, first_name, last_name, passphrase_hash, \
     otp_secret, is_admin, last_access, identity_key, signed_prekey, \
     signed_prekey_timestamp, prekey_signature, registration_id, created_at";

fn journalist_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalistRow> {
    Ok(JournalistRow {
        uuid: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        passphrase_hash: row.get(4)?,
        otp_secret: row.get(5)?,
        is_admin: row.get(6)?,
        last_access: row.get(7)?,
        identity_key: row.get(8)?,
        signed_prekey: row.get(9)?,
        signed_prekey_timestamp: row.get(10)?,
        prekey_signature: row.get(11)?,
        registration_id: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn find_journalist_by_username(
    conn: &Connection,
    username: &str,
) -> rusqlite::Result<Option<JournalistRow>> {
    conn.query_row(
        &format!("SELECT {JOURNALIST_COLUMNS} FROM journalists WHERE username = ?1"),
        [username],
        journalist_from_row,
    )
    .optional()
}

pub(crate) fn find_journalist_by_uuid(
    conn: &Connection,
    uuid: &str,
) -> rusqlite::Result<Option<JournalistRow>> {
    conn.query_row(
        &format!("SELECT {JOURNALIST_COLUMNS} FROM journalists WHERE uuid = ?1"),
        [uuid],
        journalist_from_row,
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tipline_crypto::otp::totp_at;

    fn test_db() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("tipline.db")).unwrap();
        (dir, db)
    }

    fn current_code(secret: &str) -> String {
        totp_at(secret, Utc::now().timestamp()).unwrap()
    }

    /// Picks a six-digit code outside the accepted skew window, so the
    /// test never passes by coincidence.
    fn wrong_code(secret: &str) -> String {
        let now = Utc::now().timestamp();
        let valid: Vec<String> = [now - 30, now, now + 30]
            .iter()
            .map(|t| totp_at(secret, *t).unwrap())
            .collect();
        (0..=999_999u32)
            .map(|n| format!("{n:06}"))
            .find(|code| !valid.contains(code))
            .unwrap()
    }

    fn bundle(registration_id: i64, timestamp: i64) -> RegistrationBundle {
        RegistrationBundle {
            identity_key: "identity-key-material".into(),
            signed_prekey: "signed-prekey-material".into(),
            signed_prekey_timestamp: timestamp,
            prekey_signature: "prekey-signature".into(),
            registration_id,
        }
    }

    #[test]
    fn login_succeeds_and_updates_last_access() {
        let (_dir, db) = test_db();
        let row = db
            .create_journalist("ada", Some("Ada"), None, "correct horse", false)
            .unwrap();
        assert!(row.last_access.is_none());

        let logged_in = db
            .login("ada", "correct horse", &current_code(&row.otp_secret))
            .unwrap();
        assert_eq!(logged_in.uuid, row.uuid);
        assert!(logged_in.last_access.is_some());
    }

    #[test]
    fn login_rejects_bad_credentials() {
        let (_dir, db) = test_db();
        let row = db
            .create_journalist("ada", None, None, "correct horse", false)
            .unwrap();

        let err = db
            .login("nobody", "correct horse", &current_code(&row.otp_secret))
            .unwrap_err();
        assert!(matches!(err, LoginError::UnknownUsername));

        let err = db
            .login("ada", "wrong horse", &current_code(&row.otp_secret))
            .unwrap_err();
        assert!(matches!(err, LoginError::WrongPassphrase));

        let err = db
            .login("ada", "correct horse", &wrong_code(&row.otp_secret))
            .unwrap_err();
        assert!(matches!(err, LoginError::BadOneTimeCode));
    }

    #[test]
    fn login_throttles_after_five_attempts_in_window() {
        let (_dir, db) = test_db();
        let row = db
            .create_journalist("ada", None, None, "correct horse", false)
            .unwrap();

        for _ in 0..5 {
            let err = db
                .login("ada", "wrong horse", &current_code(&row.otp_secret))
                .unwrap_err();
            assert!(matches!(err, LoginError::WrongPassphrase));
        }

        // Correct credentials no longer help once the window is full.
        let err = db
            .login("ada", "correct horse", &current_code(&row.otp_secret))
            .unwrap_err();
        assert!(matches!(err, LoginError::Throttled));
    }

    #[test]
    fn token_lifecycle() {
        let (_dir, db) = test_db();
        let row = db
            .create_journalist("ada", None, None, "correct horse", false)
            .unwrap();
        let now = Utc::now();

        db.issue_token(&row.uuid, "hash-1", now, now + Duration::hours(8))
            .unwrap();
        let found = db.authenticate("hash-1", now).unwrap();
        assert_eq!(found.unwrap().uuid, row.uuid);

        assert!(db.authenticate("no-such-hash", now).unwrap().is_none());

        db.revoke_token("hash-1").unwrap();
        assert!(db.authenticate("hash-1", now).unwrap().is_none());
    }

    #[test]
    fn expired_tokens_are_pruned() {
        let (_dir, db) = test_db();
        let row = db
            .create_journalist("ada", None, None, "correct horse", false)
            .unwrap();
        let now = Utc::now();

        db.issue_token(&row.uuid, "hash-2", now - Duration::hours(9), now - Duration::hours(1))
            .unwrap();
        assert!(db.authenticate("hash-2", now).unwrap().is_none());

        let remaining: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM api_tokens", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn authenticate_refreshes_last_access() {
        let (_dir, db) = test_db();
        let row = db
            .create_journalist("ada", None, None, "correct horse", false)
            .unwrap();
        let now = Utc::now();
        db.issue_token(&row.uuid, "hash-3", now, now + Duration::hours(8))
            .unwrap();

        let later = now + Duration::minutes(10);
        let found = db.authenticate("hash-3", later).unwrap().unwrap();
        assert_eq!(found.last_access, Some(format_timestamp(later)));
    }

    #[test]
    fn registration_is_one_shot() {
        let (_dir, db) = test_db();
        let row = db
            .create_journalist("ada", None, None, "correct horse", false)
            .unwrap();

        db.register_messaging(&row.uuid, &bundle(17, 1000)).unwrap();
        let stored = db.get_journalist(&row.uuid).unwrap().unwrap();
        assert!(stored.is_registered_for_messaging());
        assert_eq!(stored.registration_id, Some(17));

        let err = db
            .register_messaging(&row.uuid, &bundle(18, 2000))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AlreadyRegistered));
    }

    #[test]
    fn registration_id_cannot_be_reused() {
        let (_dir, db) = test_db();
        let first = db
            .create_journalist("ada", None, None, "correct horse", false)
            .unwrap();
        let second = db
            .create_journalist("grace", None, None, "battery staple", false)
            .unwrap();

        db.register_messaging(&first.uuid, &bundle(42, 1000))
            .unwrap();
        let err = db
            .register_messaging(&second.uuid, &bundle(42, 2000))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::RegistrationIdInUse));
    }

    #[test]
    fn stale_prekey_timestamp_is_rejected() {
        let (_dir, db) = test_db();
        let row = db
            .create_journalist("ada", None, None, "correct horse", false)
            .unwrap();

        // Simulate a leftover timestamp from an interrupted registration.
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE journalists SET signed_prekey_timestamp = 5000 WHERE uuid = ?1",
                [&row.uuid],
            )?;
            Ok(())
        })
        .unwrap();

        let err = db
            .register_messaging(&row.uuid, &bundle(7, 5000))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::StalePrekeyTimestamp));

        let err = db
            .register_messaging(&row.uuid, &bundle(7, 4000))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::StalePrekeyTimestamp));

        db.register_messaging(&row.uuid, &bundle(7, 5001)).unwrap();
        let stored = db.get_journalist(&row.uuid).unwrap().unwrap();
        assert_eq!(stored.signed_prekey_timestamp, Some(5001));
    }
}
