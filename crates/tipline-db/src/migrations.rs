//! Schema migrations, applied in order on startup.

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Creates the schema if needed and brings older databases up to date.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })?;

    if version < 1 {
        info!("applying schema migration 1");
        conn.execute_batch(
            r#"
            BEGIN;

            CREATE TABLE journalists (
                uuid                    TEXT PRIMARY KEY,
                username                TEXT NOT NULL UNIQUE,
                first_name              TEXT,
                last_name               TEXT,
                passphrase_hash         TEXT NOT NULL,
                otp_secret              TEXT NOT NULL,
                is_admin                INTEGER NOT NULL DEFAULT 0,
                last_access             TEXT,
                identity_key            TEXT,
                signed_prekey           TEXT,
                signed_prekey_timestamp INTEGER,
                prekey_signature        TEXT,
                registration_id         INTEGER UNIQUE,
                created_at              TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE api_tokens (
                token_hash      TEXT PRIMARY KEY,
                journalist_uuid TEXT NOT NULL REFERENCES journalists(uuid) ON DELETE CASCADE,
                issued_at       TEXT NOT NULL,
                expires_at      TEXT NOT NULL
            );

            CREATE TABLE login_attempts (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                journalist_uuid TEXT NOT NULL REFERENCES journalists(uuid) ON DELETE CASCADE,
                attempted_at    TEXT NOT NULL
            );

            CREATE INDEX idx_login_attempts_journalist
                ON login_attempts(journalist_uuid, attempted_at);

            CREATE TABLE sources (
                uuid                   TEXT PRIMARY KEY,
                filesystem_id          TEXT NOT NULL UNIQUE,
                journalist_designation TEXT NOT NULL,
                pending                INTEGER NOT NULL DEFAULT 1,
                starred                INTEGER NOT NULL DEFAULT 0,
                interaction_count      INTEGER NOT NULL DEFAULT 0,
                last_updated           TEXT NOT NULL,
                deleted_at             TEXT,
                created_at             TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE submissions (
                uuid        TEXT PRIMARY KEY,
                source_uuid TEXT NOT NULL REFERENCES sources(uuid) ON DELETE CASCADE,
                filename    TEXT NOT NULL,
                kind        TEXT NOT NULL CHECK (kind IN ('file', 'message')),
                size        INTEGER NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_submissions_source ON submissions(source_uuid, created_at);

            CREATE TABLE replies (
                uuid            TEXT PRIMARY KEY,
                source_uuid     TEXT NOT NULL REFERENCES sources(uuid) ON DELETE CASCADE,
                journalist_uuid TEXT NOT NULL REFERENCES journalists(uuid),
                filename        TEXT NOT NULL,
                size            INTEGER NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_replies_source ON replies(source_uuid, created_at);

            CREATE TABLE seen_receipts (
                id              TEXT PRIMARY KEY,
                submission_uuid TEXT REFERENCES submissions(uuid) ON DELETE CASCADE,
                reply_uuid      TEXT REFERENCES replies(uuid) ON DELETE CASCADE,
                journalist_uuid TEXT NOT NULL REFERENCES journalists(uuid),
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK ((submission_uuid IS NULL) != (reply_uuid IS NULL)),
                UNIQUE (submission_uuid, journalist_uuid),
                UNIQUE (reply_uuid, journalist_uuid)
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            "#,
        )?;
    }

    Ok(())
}
