//! Session persistence.
//!
//! `load` never fails: a missing or unreadable record is an empty session.
//! `save` replaces the whole record at once, so a reader never sees a new
//! access credential next to an old (or missing) user.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use super::Session;

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),
}

pub trait SessionStore: Send + Sync {
    /// Persisted session, or an empty one if absent or corrupt.
    fn load(&self) -> Session;

    /// Overwrite the persisted session. Saving an empty session clears it.
    fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Remove every persisted field. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Parse a stored record, treating anything unusable as "no session".
pub(crate) fn parse_record(contents: &str, source: &str) -> Session {
    match serde_json::from_str(contents) {
        Ok(session) => session,
        Err(e) => {
            warn!(source = source, error = %e, "Discarding unreadable session record");
            Session::empty()
        }
    }
}

/// JSON file store. Writes go to a sibling temp file that is then renamed
/// over the real one.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Each write gets its own uniquely named temp file (created 0600), so
    /// concurrent writers never share a half-written file.
    fn write_atomic(&self, contents: &[u8]) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(contents)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Session {
        match fs::read_to_string(&self.path) {
            Ok(contents) => parse_record(&contents, "file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Session::empty(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read session file");
                Session::empty()
            }
        }
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        if !session.is_authenticated() {
            return self.clear();
        }
        let contents = serde_json::to_vec_pretty(session)?;
        self.write_atomic(&contents)?;
        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store for tests and embedders that manage persistence themselves.
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Session {
        self.session.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = session.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Session::empty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::alice_session;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        assert_eq!(store.load(), Session::empty());
        // Clearing nothing is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(&dir.path().join("nested"));
        let session = alice_session("A1", Some("R1"));

        store.save(&session).unwrap();
        assert_eq!(store.load(), session);
        // Only the session file is left behind
        let entries = fs::read_dir(dir.path().join("nested")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_save_of_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.save(&alice_session("A1", Some("R1"))).unwrap();

        let before = fs::read(store.path()).unwrap();
        store.save(&store.load()).unwrap();
        let after = fs::read(store.path()).unwrap();
        assert_eq!(before, after);

        // Same for an empty store: nothing gets created
        store.clear().unwrap();
        store.save(&store.load()).unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        fs::write(store.path(), "{ not json").unwrap();
        assert_eq!(store.load(), Session::empty());

        // Torn record: credential without a user
        fs::write(store.path(), r#"{"access_token": "A1", "refresh_token": "R1"}"#).unwrap();
        assert!(!store.load().is_authenticated());
    }

    #[test]
    fn test_clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.save(&alice_session("A1", Some("R1"))).unwrap();

        store.clear().unwrap();
        let session = store.load();
        assert_eq!(session.access_token(), None);
        assert_eq!(session.refresh_token(), None);
        assert_eq!(session.user(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.save(&alice_session("A1", None)).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn test_concurrent_saves_never_expose_torn_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileSessionStore::new(dir.path()));

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let access = format!("A{}-{}", writer, i);
                        store.save(&alice_session(&access, Some("R1"))).unwrap();
                        let contents = fs::read_to_string(store.path()).unwrap();
                        let session: Session = serde_json::from_str(&contents).unwrap();
                        assert!(session.is_authenticated());
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert!(store.load().is_authenticated());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert!(!store.load().is_authenticated());
        store.save(&alice_session("A1", None)).unwrap();
        assert_eq!(store.load().access_token(), Some("A1"));
        store.clear().unwrap();
        assert_eq!(store.load(), Session::empty());
    }
}
