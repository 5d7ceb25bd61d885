//! Sources and their conversation items: submissions, replies, and seen
//! receipts.

use std::collections::HashSet;

use anyhow::Result;
use rusqlite::{OptionalExtension, params, params_from_iter};
use uuid::Uuid;

use crate::models::{
    ReplyError, ReplyRow, SeenError, SeenKind, SeenRef, SourceRow, SubmissionKind, SubmissionRow,
};
use crate::{Database, is_unique_violation, now_timestamp};

impl Database {
    /// Creates a source record. Sources start out pending and stay hidden
    /// from listings until their first submission arrives.
    pub fn create_source(
        &self,
        filesystem_id: &str,
        journalist_designation: &str,
    ) -> Result<SourceRow> {
        let uuid = Uuid::new_v4().to_string();
        let created_at = now_timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sources
                     (uuid, filesystem_id, journalist_designation, last_updated, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![uuid, filesystem_id, journalist_designation, created_at],
            )?;
            Ok(())
        })?;
        Ok(SourceRow {
            uuid,
            filesystem_id: filesystem_id.to_string(),
            journalist_designation: journalist_designation.to_string(),
            pending: true,
            starred: false,
            interaction_count: 0,
            last_updated: created_at.clone(),
            deleted_at: None,
            created_at,
        })
    }

    /// Looks a source up by uuid. Sources marked deleted are absent, the
    /// same as if their rows were already purged.
    pub fn get_source(&self, uuid: &str) -> Result<Option<SourceRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {SOURCE_COLUMNS} FROM sources
                         WHERE uuid = ?1 AND deleted_at IS NULL"
                    ),
                    [uuid],
                    source_from_row,
                )
                .optional()?)
        })
    }

    pub fn active_sources(&self) -> Result<Vec<SourceRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SOURCE_COLUMNS} FROM sources
                 WHERE pending = 0 AND deleted_at IS NULL
                 ORDER BY created_at, uuid"
            ))?;
            let rows = stmt
                .query_map([], source_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn set_source_starred(&self, uuid: &str, starred: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE sources SET starred = ?1 WHERE uuid = ?2",
                params![starred, uuid],
            )?;
            Ok(())
        })
    }

    /// Flips the deletion marker, taking the source (and, via listing
    /// filters, its items) out of view before the rows are purged.
    pub fn mark_source_deleted(&self, uuid: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE sources SET deleted_at = ?1 WHERE uuid = ?2 AND deleted_at IS NULL",
                params![now_timestamp(), uuid],
            )?;
            Ok(())
        })
    }

    /// Hard-deletes the source row; submissions, replies, and receipts go
    /// with it through the cascading foreign keys.
    pub fn purge_source(&self, uuid: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sources WHERE uuid = ?1", [uuid])?;
            Ok(())
        })
    }

    /// Resolves a source uuid to its blob-store directory key. Unlike
    /// [`Database::get_source`] this sees sources already marked deleted,
    /// so blob cleanup can still find their files.
    pub fn source_filesystem_id(&self, uuid: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT filesystem_id FROM sources WHERE uuid = ?1",
                    [uuid],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    /// Records an inbound item and unpends its source.
    pub fn create_submission(
        &self,
        source_uuid: &str,
        filename: &str,
        kind: SubmissionKind,
        size: i64,
    ) -> Result<SubmissionRow> {
        let uuid = Uuid::new_v4().to_string();
        let created_at = now_timestamp();
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO submissions (uuid, source_uuid, filename, kind, size, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![uuid, source_uuid, filename, kind, size, created_at],
            )?;
            tx.execute(
                "UPDATE sources SET pending = 0, last_updated = ?1 WHERE uuid = ?2",
                params![created_at, source_uuid],
            )?;
            Ok::<_, anyhow::Error>(())
        })?;
        Ok(SubmissionRow {
            uuid,
            source_uuid: source_uuid.to_string(),
            filename: filename.to_string(),
            kind,
            size,
            created_at,
        })
    }

    pub fn get_submission(&self, uuid: &str) -> Result<Option<SubmissionRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE uuid = ?1"),
                    [uuid],
                    submission_from_row,
                )
                .optional()?)
        })
    }

    pub fn submissions_for_source(&self, source_uuid: &str) -> Result<Vec<SubmissionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUBMISSION_COLUMNS} FROM submissions
                 WHERE source_uuid = ?1 ORDER BY created_at, uuid"
            ))?;
            let rows = stmt
                .query_map([source_uuid], submission_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Global listing. Items whose source is gone or marked deleted are
    /// filtered out even when their rows still exist.
    pub fn all_submissions(&self) -> Result<Vec<SubmissionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT i.uuid, i.source_uuid, i.filename, i.kind, i.size, i.created_at
                 FROM submissions i
                 JOIN sources s ON s.uuid = i.source_uuid
                 WHERE s.deleted_at IS NULL
                 ORDER BY i.created_at, i.uuid",
            )?;
            let rows = stmt
                .query_map([], submission_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn delete_submission(&self, uuid: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM submissions WHERE uuid = ?1", [uuid])?;
            Ok(())
        })
    }

    /// The reply-creation transaction.
    ///
    /// `write_blob` receives the sequence number this reply will occupy and
    /// must persist the payload, returning the stored filename and size.
    /// The fresh `interaction_count` read, the blob write, the reply row,
    /// the author's seen receipt, and the counter update all happen under
    /// one transaction on the single writer connection, so concurrent
    /// replies to one source can never share a sequence number and a
    /// failure at any step leaves the store untouched.
    pub fn create_reply<F>(
        &self,
        source_uuid: &str,
        journalist_uuid: &str,
        reply_uuid: Option<&str>,
        write_blob: F,
    ) -> Result<ReplyRow, ReplyError>
    where
        F: FnOnce(i64) -> Result<(String, i64)>,
    {
        self.with_tx(|tx| {
            let count: Option<i64> = tx
                .query_row(
                    "SELECT interaction_count FROM sources
                     WHERE uuid = ?1 AND deleted_at IS NULL",
                    [source_uuid],
                    |row| row.get(0),
                )
                .optional()?;
            let sequence = count.ok_or(ReplyError::SourceNotFound)? + 1;

            let (filename, size) = write_blob(sequence).map_err(ReplyError::Store)?;

            let uuid = match reply_uuid {
                Some(supplied) => supplied.to_string(),
                None => Uuid::new_v4().to_string(),
            };
            let created_at = now_timestamp();

            if let Err(err) = tx.execute(
                "INSERT INTO replies (uuid, source_uuid, journalist_uuid, filename, size, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![uuid, source_uuid, journalist_uuid, filename, size, created_at],
            ) {
                if is_unique_violation(&err, "replies.uuid") {
                    return Err(ReplyError::UuidInUse);
                }
                return Err(err.into());
            }

            // The author has seen their own reply.
            tx.execute(
                "INSERT OR IGNORE INTO seen_receipts (id, reply_uuid, journalist_uuid, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![Uuid::new_v4().to_string(), uuid, journalist_uuid, created_at],
            )?;
            tx.execute(
                "UPDATE sources SET interaction_count = ?1, last_updated = ?2 WHERE uuid = ?3",
                params![sequence, created_at, source_uuid],
            )?;

            Ok(ReplyRow {
                uuid,
                source_uuid: source_uuid.to_string(),
                journalist_uuid: journalist_uuid.to_string(),
                filename,
                size,
                created_at,
            })
        })
    }

    pub fn get_reply(&self, uuid: &str) -> Result<Option<ReplyRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {REPLY_COLUMNS} FROM replies WHERE uuid = ?1"),
                    [uuid],
                    reply_from_row,
                )
                .optional()?)
        })
    }

    pub fn replies_for_source(&self, source_uuid: &str) -> Result<Vec<ReplyRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REPLY_COLUMNS} FROM replies
                 WHERE source_uuid = ?1 ORDER BY created_at, uuid"
            ))?;
            let rows = stmt
                .query_map([source_uuid], reply_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn all_replies(&self) -> Result<Vec<ReplyRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.uuid, r.source_uuid, r.journalist_uuid, r.filename, r.size, r.created_at
                 FROM replies r
                 JOIN sources s ON s.uuid = r.source_uuid
                 WHERE s.deleted_at IS NULL
                 ORDER BY r.created_at, r.uuid",
            )?;
            let rows = stmt
                .query_map([], reply_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn delete_reply(&self, uuid: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM replies WHERE uuid = ?1", [uuid])?;
            Ok(())
        })
    }

    /// Marks a batch of conversation items seen by one journalist.
    ///
    /// Every reference must resolve to an existing item of the declared
    /// kind before anything is written; the first failure aborts the whole
    /// batch. References naming the same item twice collapse to one
    /// receipt, and receipts that already exist are left alone.
    pub fn mark_seen(&self, journalist_uuid: &str, refs: &[SeenRef]) -> Result<(), SeenError> {
        self.with_tx(|tx| {
            let mut targets: HashSet<SeenTarget> = HashSet::with_capacity(refs.len());
            for r in refs {
                let resolved = match r.kind {
                    SeenKind::File | SeenKind::Message => {
                        let kind = if r.kind == SeenKind::File {
                            SubmissionKind::File
                        } else {
                            SubmissionKind::Message
                        };
                        tx.query_row(
                            "SELECT uuid FROM submissions WHERE uuid = ?1 AND kind = ?2",
                            params![r.uuid, kind],
                            |row| row.get::<_, String>(0),
                        )
                        .optional()?
                        .map(SeenTarget::Submission)
                    }
                    SeenKind::Reply => tx
                        .query_row(
                            "SELECT uuid FROM replies WHERE uuid = ?1",
                            [&r.uuid],
                            |row| row.get::<_, String>(0),
                        )
                        .optional()?
                        .map(SeenTarget::Reply),
                };
                match resolved {
                    Some(target) => {
                        targets.insert(target);
                    }
                    None => return Err(SeenError::TargetNotFound(r.kind, r.uuid.clone())),
                }
            }

            let created_at = now_timestamp();
            for target in targets {
                let (column, item_uuid) = match &target {
                    SeenTarget::Submission(uuid) => ("submission_uuid", uuid),
                    SeenTarget::Reply(uuid) => ("reply_uuid", uuid),
                };
                tx.execute(
                    &format!(
                        "INSERT OR IGNORE INTO seen_receipts (id, {column}, journalist_uuid, created_at)
                         VALUES (?1, ?2, ?3, ?4)"
                    ),
                    params![Uuid::new_v4().to_string(), item_uuid, journalist_uuid, created_at],
                )?;
            }
            Ok(())
        })
    }

    /// Returns `(submission_uuid, journalist_uuid)` pairs for the given
    /// submissions, for building `seen_by` lists in one query.
    pub fn seen_by_for_submissions(&self, uuids: &[String]) -> Result<Vec<(String, String)>> {
        self.seen_by("submission_uuid", uuids)
    }

    pub fn seen_by_for_replies(&self, uuids: &[String]) -> Result<Vec<(String, String)>> {
        self.seen_by("reply_uuid", uuids)
    }

    fn seen_by(&self, column: &str, uuids: &[String]) -> Result<Vec<(String, String)>> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let placeholders = (1..=uuids.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {column}, journalist_uuid FROM seen_receipts
                 WHERE {column} IN ({placeholders})
                 ORDER BY created_at, id"
            ))?;
            let rows = stmt
                .query_map(params_from_iter(uuids.iter()), |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Per-source `(uuid, files, messages)` counts for the given sources.
    pub fn submission_counts(&self, source_uuids: &[String]) -> Result<Vec<(String, i64, i64)>> {
        if source_uuids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let placeholders = (1..=source_uuids.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT source_uuid,
                        SUM(CASE WHEN kind = 'file' THEN 1 ELSE 0 END),
                        SUM(CASE WHEN kind = 'message' THEN 1 ELSE 0 END)
                 FROM submissions
                 WHERE source_uuid IN ({placeholders})
                 GROUP BY source_uuid"
            ))?;
            let rows = stmt
                .query_map(params_from_iter(source_uuids.iter()), |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum SeenTarget {
    Submission(String),
    Reply(String),
}

const SOURCE_COLUMNS: &str = "uuid, filesystem_id, journalist_designation, pending, starred, \
     interaction_count, last_updated, deleted_at, created_at";

fn source_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SourceRow> {
    Ok(SourceRow {
        uuid: row.get(0)?,
        filesystem_id: row.get(1)?,
        journalist_designation: row.get(2)?,
        pending: row.get(3)?,
        starred: row.get(4)?,
        interaction_count: row.get(5)?,
        last_updated: row.get(6)?,
        deleted_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const SUBMISSION_COLUMNS: &str = "uuid, source_uuid, filename, kind, size, created_at";

fn submission_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubmissionRow> {
    Ok(SubmissionRow {
        uuid: row.get(0)?,
        source_uuid: row.get(1)?,
        filename: row.get(2)?,
        kind: row.get(3)?,
        size: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const REPLY_COLUMNS: &str = "uuid, source_uuid, journalist_uuid, filename, size, created_at";

fn reply_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReplyRow> {
    Ok(ReplyRow {
        uuid: row.get(0)?,
        source_uuid: row.get(1)?,
        journalist_uuid: row.get(2)?,
        filename: row.get(3)?,
        size: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JournalistRow;
    use anyhow::anyhow;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_db() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("tipline.db")).unwrap();
        (dir, db)
    }

    fn journalist(db: &Database, username: &str) -> JournalistRow {
        db.create_journalist(username, None, None, "a strong passphrase", false)
            .unwrap()
    }

    fn blob(seq: i64) -> Result<(String, i64)> {
        Ok((format!("{seq}-test_source-reply.gpg"), 64))
    }

    #[test]
    fn listings_track_pending_and_deletion() {
        let (_dir, db) = test_db();
        let source = db.create_source("fs-1", "dreamy hydrogen").unwrap();

        // Pending until the first submission lands.
        assert!(db.active_sources().unwrap().is_empty());
        db.create_submission(&source.uuid, "1-msg.gpg", SubmissionKind::Message, 12)
            .unwrap();
        let listed = db.active_sources().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].pending);

        db.mark_source_deleted(&source.uuid).unwrap();
        assert!(db.active_sources().unwrap().is_empty());
        assert!(db.get_source(&source.uuid).unwrap().is_none());
        // The submission row still exists but no longer surfaces globally.
        assert!(db.all_submissions().unwrap().is_empty());
        let raw_rows: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM submissions", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(raw_rows, 1);
    }

    #[test]
    fn purge_cascades_to_items_and_receipts() {
        let (_dir, db) = test_db();
        let ada = journalist(&db, "ada");
        let source = db.create_source("fs-2", "quixotic cobalt").unwrap();
        let sub = db
            .create_submission(&source.uuid, "1-doc.gz.gpg", SubmissionKind::File, 100)
            .unwrap();
        db.create_reply(&source.uuid, &ada.uuid, None, blob).unwrap();
        db.mark_seen(
            &ada.uuid,
            &[SeenRef {
                kind: SeenKind::File,
                uuid: sub.uuid.clone(),
            }],
        )
        .unwrap();

        db.purge_source(&source.uuid).unwrap();
        db.with_conn(|conn| {
            for table in ["submissions", "replies", "seen_receipts"] {
                let count: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
                assert_eq!(count, 0, "{table} not emptied");
            }
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn replies_get_consecutive_sequence_numbers() {
        let (_dir, db) = test_db();
        let ada = journalist(&db, "ada");
        let source = db.create_source("fs-3", "brave iridium").unwrap();

        let first = db.create_reply(&source.uuid, &ada.uuid, None, blob).unwrap();
        let second = db.create_reply(&source.uuid, &ada.uuid, None, blob).unwrap();
        assert!(first.filename.starts_with("1-"));
        assert!(second.filename.starts_with("2-"));

        let stored = db.get_source(&source.uuid).unwrap().unwrap();
        assert_eq!(stored.interaction_count, 2);

        // Authoring a reply marks it seen for the author.
        let seen = db
            .seen_by_for_replies(&[first.uuid.clone(), second.uuid.clone()])
            .unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(_, j)| j == &ada.uuid));
    }

    #[test]
    fn failed_blob_write_leaves_store_untouched() {
        let (_dir, db) = test_db();
        let ada = journalist(&db, "ada");
        let source = db.create_source("fs-4", "plucky neon").unwrap();

        let err = db
            .create_reply(&source.uuid, &ada.uuid, None, |_| Err(anyhow!("disk full")))
            .unwrap_err();
        assert!(matches!(err, ReplyError::Store(_)));

        let stored = db.get_source(&source.uuid).unwrap().unwrap();
        assert_eq!(stored.interaction_count, 0);
        assert!(db.replies_for_source(&source.uuid).unwrap().is_empty());
        let receipts: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM seen_receipts", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(receipts, 0);
    }

    #[test]
    fn reply_to_missing_source_is_not_found() {
        let (_dir, db) = test_db();
        let ada = journalist(&db, "ada");
        let err = db
            .create_reply("no-such-source", &ada.uuid, None, blob)
            .unwrap_err();
        assert!(matches!(err, ReplyError::SourceNotFound));
    }

    #[test]
    fn concurrent_replies_never_share_a_sequence() {
        let (_dir, db) = test_db();
        let db = Arc::new(db);
        let ada = journalist(&db, "ada");
        let source = db.create_source("fs-5", "stoic argon").unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = Arc::clone(&db);
            let source_uuid = source.uuid.clone();
            let journalist_uuid = ada.uuid.clone();
            handles.push(std::thread::spawn(move || {
                db.create_reply(&source_uuid, &journalist_uuid, None, blob)
                    .unwrap()
                    .filename
            }));
        }

        let mut sequences: Vec<i64> = handles
            .into_iter()
            .map(|h| {
                let filename = h.join().unwrap();
                filename.split('-').next().unwrap().parse().unwrap()
            })
            .collect();
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=8).collect::<Vec<i64>>());

        let stored = db.get_source(&source.uuid).unwrap().unwrap();
        assert_eq!(stored.interaction_count, 8);
    }

    #[test]
    fn client_supplied_uuid_conflict_rolls_back() {
        let (_dir, db) = test_db();
        let ada = journalist(&db, "ada");
        let source = db.create_source("fs-6", "gentle xenon").unwrap();
        let supplied = "11111111-1111-1111-1111-111111111111";

        let reply = db
            .create_reply(&source.uuid, &ada.uuid, Some(supplied), blob)
            .unwrap();
        assert_eq!(reply.uuid, supplied);

        let err = db
            .create_reply(&source.uuid, &ada.uuid, Some(supplied), blob)
            .unwrap_err();
        assert!(matches!(err, ReplyError::UuidInUse));

        // The conflicting attempt advanced nothing.
        let stored = db.get_source(&source.uuid).unwrap().unwrap();
        assert_eq!(stored.interaction_count, 1);
        assert_eq!(db.replies_for_source(&source.uuid).unwrap().len(), 1);
    }

    #[test]
    fn marking_seen_is_idempotent_and_deduplicated() {
        let (_dir, db) = test_db();
        let ada = journalist(&db, "ada");
        let source = db.create_source("fs-7", "wry osmium").unwrap();
        let sub = db
            .create_submission(&source.uuid, "1-doc.gz.gpg", SubmissionKind::File, 10)
            .unwrap();

        let batch = [
            SeenRef {
                kind: SeenKind::File,
                uuid: sub.uuid.clone(),
            },
            SeenRef {
                kind: SeenKind::File,
                uuid: sub.uuid.clone(),
            },
        ];
        db.mark_seen(&ada.uuid, &batch).unwrap();
        db.mark_seen(&ada.uuid, &batch).unwrap();

        let seen = db.seen_by_for_submissions(&[sub.uuid.clone()]).unwrap();
        assert_eq!(seen, vec![(sub.uuid.clone(), ada.uuid.clone())]);
    }

    #[test]
    fn seen_batch_with_one_bad_reference_writes_nothing() {
        let (_dir, db) = test_db();
        let ada = journalist(&db, "ada");
        let grace = journalist(&db, "grace");
        let source = db.create_source("fs-8", "mellow radon").unwrap();
        let file = db
            .create_submission(&source.uuid, "1-doc.gz.gpg", SubmissionKind::File, 10)
            .unwrap();
        let message = db
            .create_submission(&source.uuid, "2-msg.gpg", SubmissionKind::Message, 5)
            .unwrap();
        let reply = db.create_reply(&source.uuid, &ada.uuid, None, blob).unwrap();

        let batch = [
            SeenRef {
                kind: SeenKind::File,
                uuid: file.uuid.clone(),
            },
            SeenRef {
                kind: SeenKind::Message,
                uuid: message.uuid.clone(),
            },
            SeenRef {
                kind: SeenKind::Reply,
                uuid: reply.uuid.clone(),
            },
            SeenRef {
                kind: SeenKind::Reply,
                uuid: "bogus".into(),
            },
        ];
        let err = db.mark_seen(&grace.uuid, &batch).unwrap_err();
        match err {
            SeenError::TargetNotFound(kind, uuid) => {
                assert_eq!(kind, SeenKind::Reply);
                assert_eq!(uuid, "bogus");
            }
            other => panic!("unexpected error: {other}"),
        }

        // Nothing was marked for grace; only ada's author receipt exists.
        let seen = db
            .seen_by_for_submissions(&[file.uuid.clone(), message.uuid.clone()])
            .unwrap();
        assert!(seen.is_empty());
        let seen = db.seen_by_for_replies(&[reply.uuid.clone()]).unwrap();
        assert_eq!(seen, vec![(reply.uuid.clone(), ada.uuid.clone())]);
    }

    #[test]
    fn seen_reference_of_wrong_kind_is_not_found() {
        let (_dir, db) = test_db();
        let ada = journalist(&db, "ada");
        let source = db.create_source("fs-9", "tidy cesium").unwrap();
        let file = db
            .create_submission(&source.uuid, "1-doc.gz.gpg", SubmissionKind::File, 10)
            .unwrap();

        let err = db
            .mark_seen(
                &ada.uuid,
                &[SeenRef {
                    kind: SeenKind::Message,
                    uuid: file.uuid.clone(),
                }],
            )
            .unwrap_err();
        assert!(matches!(err, SeenError::TargetNotFound(SeenKind::Message, _)));
    }

    #[test]
    fn submission_counts_split_files_and_messages() {
        let (_dir, db) = test_db();
        let source = db.create_source("fs-10", "lucid boron").unwrap();
        db.create_submission(&source.uuid, "1-doc.gz.gpg", SubmissionKind::File, 10)
            .unwrap();
        db.create_submission(&source.uuid, "2-doc.gz.gpg", SubmissionKind::File, 11)
            .unwrap();
        db.create_submission(&source.uuid, "3-msg.gpg", SubmissionKind::Message, 5)
            .unwrap();

        let counts = db.submission_counts(&[source.uuid.clone()]).unwrap();
        assert_eq!(counts, vec![(source.uuid.clone(), 2, 1)]);
    }
}
