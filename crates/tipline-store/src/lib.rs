//! On-disk store for pre-encrypted payloads.
//!
//! Each source owns one subdirectory keyed by its internal filesystem id;
//! submissions and replies live inside it as flat files. Payloads are opaque
//! to the server; the only inspection performed is the armor-header check
//! that rejects plaintext replies.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use thiserror::Error;
use tracing::{info, warn};

/// First line every acceptable reply payload must carry.
const ARMOR_HEADER: &str = "-----BEGIN PGP MESSAGE-----";

/// A reply payload that was not encrypted client side.
#[derive(Debug, Error)]
#[error("reply payload is not encrypted")]
pub struct NotEncrypted;

/// Blob store rooted at a single directory, one subdirectory per source.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!("Blob store rooted at {}", root.display());
        Ok(Self { root })
    }

    /// Directory holding every blob for one source.
    pub fn collection_path(&self, filesystem_id: &str) -> Result<PathBuf> {
        check_component(filesystem_id)?;
        Ok(self.root.join(filesystem_id))
    }

    /// Path of a single blob inside a source's collection.
    pub fn path(&self, filesystem_id: &str, filename: &str) -> Result<PathBuf> {
        check_component(filename)?;
        Ok(self.collection_path(filesystem_id)?.join(filename))
    }

    /// Persist a client-encrypted reply as
    /// `<count>-<journalist_filename>-reply.gpg` and return its full path.
    ///
    /// Fails with [`NotEncrypted`] (downcastable from the returned error)
    /// when the payload's first line lacks the ASCII-armor header.
    pub fn save_pre_encrypted_reply(
        &self,
        filesystem_id: &str,
        count: i64,
        journalist_filename: &str,
        content: &str,
    ) -> Result<PathBuf> {
        if !content.lines().next().unwrap_or("").contains(ARMOR_HEADER) {
            return Err(NotEncrypted.into());
        }

        let filename = format!("{}-{}-reply.gpg", count, journalist_filename);
        let dir = self.collection_path(filesystem_id)?;
        fs::create_dir_all(&dir)?;

        let path = dir.join(filename);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Read a stored blob in full.
    pub fn read(&self, filesystem_id: &str, filename: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path(filesystem_id, filename)?)?)
    }

    /// Delete a single blob. A file that is already gone is logged, not an
    /// error; deletion must stay idempotent for retried requests.
    pub fn delete_blob(&self, filesystem_id: &str, filename: &str) -> Result<()> {
        let path = self.path(filesystem_id, filename)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Blob {} already gone", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a source's entire collection.
    pub fn delete_collection(&self, filesystem_id: &str) -> Result<()> {
        let dir = self.collection_path(filesystem_id)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!("Deleted collection {}", filesystem_id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Collection {} already gone", filesystem_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Storage components come from the database, but never trust them to be
/// free of path separators.
fn check_component(component: &str) -> Result<()> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', '\\'])
    {
        bail!("invalid storage path component: {:?}", component);
    }
    Ok(())
}

/// Blob-store form of a source's designation: lowercase, underscores for
/// spaces, restricted to `[a-z0-9_]`.
pub fn journalist_filename(designation: &str) -> String {
    designation
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ENCRYPTED: &str = "-----BEGIN PGP MESSAGE-----\n\nhQIMA7P\n-----END PGP MESSAGE-----\n";

    fn storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("store")).unwrap();
        (dir, storage)
    }

    #[test]
    fn save_names_blob_by_count_and_designation() {
        let (_dir, storage) = storage();
        let path = storage
            .save_pre_encrypted_reply("fsid01", 3, "dreamy_hydrogen", ENCRYPTED)
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "3-dreamy_hydrogen-reply.gpg"
        );
        assert_eq!(storage.read("fsid01", "3-dreamy_hydrogen-reply.gpg").unwrap(), ENCRYPTED.as_bytes());
    }

    #[test]
    fn plaintext_reply_is_rejected_before_any_write() {
        let (_dir, storage) = storage();
        let err = storage
            .save_pre_encrypted_reply("fsid01", 1, "dreamy_hydrogen", "hello source")
            .unwrap_err();
        assert!(err.downcast_ref::<NotEncrypted>().is_some());
        assert!(storage.collection_path("fsid01").unwrap().read_dir().is_err());
    }

    #[test]
    fn delete_blob_tolerates_missing_files() {
        let (_dir, storage) = storage();
        storage.delete_blob("fsid01", "1-x-reply.gpg").unwrap();
        storage.delete_collection("fsid01").unwrap();
    }

    #[test]
    fn delete_collection_removes_everything() {
        let (_dir, storage) = storage();
        storage
            .save_pre_encrypted_reply("fsid01", 1, "brave_ion", ENCRYPTED)
            .unwrap();
        storage.delete_collection("fsid01").unwrap();
        assert!(storage.read("fsid01", "1-brave_ion-reply.gpg").is_err());
    }

    #[test]
    fn path_components_with_separators_are_rejected() {
        let (_dir, storage) = storage();
        assert!(storage.path("../escape", "file").is_err());
        assert!(storage.path("fsid01", "a/b").is_err());
        assert!(storage.path("", "file").is_err());
    }

    #[test]
    fn designation_becomes_safe_filename() {
        assert_eq!(journalist_filename("Dreamy Hydrogen"), "dreamy_hydrogen");
        assert_eq!(journalist_filename("Böse Straße 9"), "bse_strae_9");
        assert_eq!(journalist_filename("plain"), "plain");
    }
}
