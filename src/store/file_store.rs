//! Directory-backed object store
//!
//! One file per identifier inside the objects directory. Writes go to a
//! hidden temporary file in the same directory which is then renamed over the
//! target, so readers in other processes see either the previous payload or
//! the new one.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use log::{debug, trace, warn};

use crate::identifier;
use crate::location::{ensure_dir, temp_file_in, SharedLocation};
use crate::store::error::{StoreError, StoreResult};

/// Default extension of stored object files
pub const DEFAULT_EXTENSION: &str = "archive";

/// Persists byte payloads keyed by identifier
#[derive(Debug, Clone)]
pub struct ObjectStore {
    directory: PathBuf,
    extension: String,
}

impl ObjectStore {
    /// Store rooted at the objects directory of a shared location
    pub fn new(location: &SharedLocation) -> Self {
        Self::with_directory(location.objects_dir(), DEFAULT_EXTENSION)
    }

    /// Store rooted at an explicit directory
    pub fn with_directory(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path of the file holding an identifier's payload
    pub fn path_for(&self, identifier: &str) -> StoreResult<PathBuf> {
        if !identifier::is_valid(identifier) {
            return Err(StoreError::InvalidIdentifier);
        }
        Ok(self.directory.join(identifier::file_name(identifier, &self.extension)))
    }

    fn ensure_directory(&self) -> StoreResult<()> {
        ensure_dir(&self.directory).map_err(|e| StoreError::io(&self.directory, e))
    }

    /// Replace the payload stored for an identifier
    pub fn put(&self, identifier: &str, payload: &[u8]) -> StoreResult<()> {
        let path = self.path_for(identifier)?;
        self.ensure_directory()?;

        let temp_path = temp_file_in(&self.directory);

        if let Err(e) = fs::write(&temp_path, payload) {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::io(&temp_path, e));
        }

        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::io(&path, e));
        }

        trace!("Stored {} bytes for '{}' at {}", payload.len(), identifier, path.display());
        Ok(())
    }

    /// Read the payload stored for an identifier; `None` if nothing is stored
    pub fn get(&self, identifier: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(identifier)?;
        self.ensure_directory()?;

        match fs::read(&path) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Whether a payload is stored for an identifier
    pub fn contains(&self, identifier: &str) -> StoreResult<bool> {
        let path = self.path_for(identifier)?;
        Ok(path.is_file())
    }

    /// Remove the payload for an identifier; absent identifiers are not an error
    pub fn delete(&self, identifier: &str) -> StoreResult<()> {
        let path = self.path_for(identifier)?;
        self.ensure_directory()?;

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted stored object '{}'", identifier);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Remove every file in the objects directory.
    ///
    /// Failures on individual files are logged and skipped. Returns the number
    /// of files removed.
    pub fn delete_all(&self) -> StoreResult<usize> {
        self.ensure_directory()?;

        let entries = fs::read_dir(&self.directory)
            .map_err(|e| StoreError::io(&self.directory, e))?;

        let mut removed = 0;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.directory.display(), e);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
            }
        }

        debug!("Deleted {} files from {}", removed, self.directory.display());
        Ok(removed)
    }

    /// Identifiers currently stored, sorted
    pub fn identifiers(&self) -> StoreResult<Vec<String>> {
        self.ensure_directory()?;

        let entries = fs::read_dir(&self.directory)
            .map_err(|e| StoreError::io(&self.directory, e))?;

        let mut identifiers: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| {
                let name = entry.file_name();
                identifier::from_file_name(name.to_str()?, &self.extension)
            })
            .collect();

        identifiers.sort();
        Ok(identifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_store() -> (TempDir, ObjectStore) {
        let temp_dir = TempDir::new().unwrap();
        let location = SharedLocation::new(temp_dir.path(), "group.test", "objects");
        let store = ObjectStore::new(&location);
        (temp_dir, store)
    }

    #[test]
    fn test_put_then_get() {
        let (_temp_dir, store) = create_store();

        store.put("greeting", b"hello").unwrap();
        assert_eq!(store.get("greeting").unwrap(), Some(b"hello".to_vec()));
        assert!(store.contains("greeting").unwrap());
    }

    #[test]
    fn test_long_identifier_round_trips() {
        let (_temp_dir, store) = create_store();
        // 248-byte file name, just under the usual 255-byte limit
        let identifier = "a".repeat(240);

        store.put(&identifier, b"long").unwrap();
        assert_eq!(store.get(&identifier).unwrap(), Some(b"long".to_vec()));
        assert_eq!(store.identifiers().unwrap(), vec![identifier]);
        assert_eq!(fs::read_dir(store.directory()).unwrap().count(), 1);
    }

    #[test]
    fn test_put_replaces_payload() {
        let (_temp_dir, store) = create_store();

        store.put("greeting", b"hello").unwrap();
        store.put("greeting", b"bye").unwrap();
        assert_eq!(store.get("greeting").unwrap(), Some(b"bye".to_vec()));
    }

    #[test]
    fn test_file_naming() {
        let (_temp_dir, store) = create_store();

        store.put("greeting", b"hello").unwrap();
        assert!(store.directory().join("greeting.archive").is_file());

        // No temporary files left behind
        let count = fs::read_dir(store.directory()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_get_missing_is_none() {
        let (_temp_dir, store) = create_store();
        assert_eq!(store.get("missing").unwrap(), None);
        assert!(!store.contains("missing").unwrap());
    }

    #[test]
    fn test_directory_created_lazily() {
        let (_temp_dir, store) = create_store();
        assert!(!store.directory().exists());

        store.get("anything").unwrap();
        assert!(store.directory().is_dir());
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let (_temp_dir, store) = create_store();

        assert!(matches!(store.put("", b"x"), Err(StoreError::InvalidIdentifier)));
        assert!(matches!(store.get(""), Err(StoreError::InvalidIdentifier)));
        assert!(matches!(store.delete(""), Err(StoreError::InvalidIdentifier)));
        assert!(matches!(store.contains(""), Err(StoreError::InvalidIdentifier)));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_temp_dir, store) = create_store();

        store.put("greeting", b"hello").unwrap();
        store.delete("greeting").unwrap();
        assert_eq!(store.get("greeting").unwrap(), None);

        store.delete("greeting").unwrap();
        store.delete("never-written").unwrap();
    }

    #[test]
    fn test_delete_all_removes_every_file() {
        let (_temp_dir, store) = create_store();

        store.put("a", b"1").unwrap();
        store.put("b", b"2").unwrap();
        store.put("c/d", b"3").unwrap();
        fs::write(store.directory().join("foreign.txt"), b"x").unwrap();

        assert_eq!(store.delete_all().unwrap(), 4);
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("c/d").unwrap(), None);
        assert_eq!(fs::read_dir(store.directory()).unwrap().count(), 0);
    }

    #[test]
    fn test_delete_all_leaves_subdirectories() {
        let (_temp_dir, store) = create_store();

        store.put("a", b"1").unwrap();
        fs::create_dir(store.directory().join("nested")).unwrap();

        assert_eq!(store.delete_all().unwrap(), 1);
        assert!(store.directory().join("nested").is_dir());
    }

    #[test]
    fn test_identifiers_listing() {
        let (_temp_dir, store) = create_store();

        store.put("zeta", b"1").unwrap();
        store.put("alpha.beta", b"2").unwrap();
        store.put("path/like", b"3").unwrap();
        fs::write(store.directory().join("foreign.txt"), b"x").unwrap();

        assert_eq!(
            store.identifiers().unwrap(),
            vec!["alpha.beta".to_string(), "path/like".to_string(), "zeta".to_string()]
        );
    }

    #[test]
    fn test_custom_extension() {
        let temp_dir = TempDir::new().unwrap();
        let store = ObjectStore::with_directory(temp_dir.path().join("objs"), "bin");

        store.put("key", b"v").unwrap();
        assert!(temp_dir.path().join("objs").join("key.bin").is_file());
        assert_eq!(store.identifiers().unwrap(), vec!["key".to_string()]);
    }
}
