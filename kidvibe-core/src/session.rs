//! Session holder, the client-side proof of authentication.
//!
//! A session is persisted as two independent string entries, mirroring the
//! browser-local storage layout of the web client:
//! - `token`: the opaque bearer token
//! - `user`: a JSON-encoded `{"email": "..."}` object
//!
//! The two entries are written one after the other with no transaction; a
//! missing token always means "logged out", whatever the `user` entry says.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Refusing to store an empty token")]
    EmptyToken,

    #[error("Session storage unavailable: no data directory")]
    NoStorageDir,

    #[error("Session storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode user entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// An authenticated session: bearer token plus the minimal user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: String,
    /// May be absent if the `user` entry was removed or tampered with.
    pub email: Option<String>,
}

impl Session {
    pub fn bearer(&self) -> &str {
        &self.token
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredUser {
    email: String,
}

// ============================================================================
// SessionStorage trait
// ============================================================================

/// Persistent string key/value store, the stand-in for browser-local storage.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// In-process storage; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// One file per key inside a private directory (0700 dir, 0600 files on unix).
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn ensure_dir(&self) -> Result<(), SessionError> {
        fs::create_dir_all(&self.dir).map_err(|e| storage_err(&self.dir, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700)) {
                tracing::warn!(dir = %self.dir.display(), error = %e, "failed to chmod session dir");
            }
        }
        Ok(())
    }
}

fn storage_err(path: &Path, source: io::Error) -> SessionError {
    SessionError::Storage {
        path: path.display().to_string(),
        source,
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err(&path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.ensure_dir()?;
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|e| storage_err(&path, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
                .map_err(|e| storage_err(&path, e))?;
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(&path, e)),
        }
    }
}

// ============================================================================
// SessionHolder
// ============================================================================

/// Reads and writes the session entries of a [`SessionStorage`].
pub struct SessionHolder<S: SessionStorage> {
    storage: S,
}

impl<S: SessionStorage> SessionHolder<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Store token, then user. A failure between the two writes leaves a
    /// token without a user entry, which reads back as a session with no email.
    pub fn login(&self, token: &str, email: &str) -> Result<Session, SessionError> {
        if token.is_empty() {
            return Err(SessionError::EmptyToken);
        }
        let user = serde_json::to_string(&StoredUser {
            email: email.to_string(),
        })?;
        self.storage.set(TOKEN_KEY, token)?;
        self.storage.set(USER_KEY, &user)?;
        tracing::debug!(email, "session stored");
        Ok(Session {
            token: token.to_string(),
            email: Some(email.to_string()),
        })
    }

    pub fn logout(&self) -> Result<(), SessionError> {
        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(USER_KEY)?;
        tracing::debug!("session cleared");
        Ok(())
    }

    /// `None` when the token entry is missing or empty. Storage read errors are logged and
    /// treated as logged out.
    pub fn current_session(&self) -> Option<Session> {
        let token = match self.storage.get(TOKEN_KEY) {
            Ok(Some(t)) if !t.is_empty() => t,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read session token");
                return None;
            }
        };

        let email = match self.storage.get(USER_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<StoredUser>(&raw)
                .map(|u| u.email)
                .map_err(|e| tracing::warn!(error = %e, "ignoring malformed user entry"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read user entry");
                None
            }
        };

        Some(Session { token, email })
    }

    /// Typed accessor for protected controllers.
    pub fn require_session(&self) -> Result<Session, SessionError> {
        self.current_session().ok_or(SessionError::NotLoggedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_holder() -> SessionHolder<MemoryStorage> {
        SessionHolder::new(MemoryStorage::new())
    }

    #[test]
    fn login_then_current_session_returns_both_fields() {
        let holder = memory_holder();
        holder.login("tok-123", "admin@kidvibe.com").unwrap();

        let session = holder.current_session().expect("session present");
        assert_eq!(session.token, "tok-123");
        assert_eq!(session.email.as_deref(), Some("admin@kidvibe.com"));
    }

    #[test]
    fn any_stored_token_round_trips() {
        let holder = memory_holder();
        let stored = holder.login("  ", "a@b.c").unwrap();
        assert_eq!(holder.current_session(), Some(stored));
    }

    #[test]
    fn empty_token_is_rejected() {
        let holder = memory_holder();
        assert!(matches!(
            holder.login("", "a@b.c"),
            Err(SessionError::EmptyToken)
        ));
        assert!(holder.storage().get(TOKEN_KEY).unwrap().is_none());
        assert!(holder.storage().get(USER_KEY).unwrap().is_none());
    }

    #[test]
    fn empty_token_entry_is_logged_out() {
        let holder = memory_holder();
        holder.storage().set(TOKEN_KEY, "").unwrap();
        assert!(holder.current_session().is_none());
    }

    #[test]
    fn logout_then_current_session_is_none() {
        let holder = memory_holder();
        holder.login("tok-123", "admin@kidvibe.com").unwrap();
        holder.logout().unwrap();

        assert!(holder.current_session().is_none());
        assert!(holder.storage().get(USER_KEY).unwrap().is_none());
    }

    #[test]
    fn user_entry_without_token_is_logged_out() {
        let holder = memory_holder();
        holder
            .storage()
            .set(USER_KEY, r#"{"email":"ghost@kidvibe.com"}"#)
            .unwrap();

        assert!(holder.current_session().is_none());
        assert!(matches!(
            holder.require_session(),
            Err(SessionError::NotLoggedIn)
        ));
    }

    #[test]
    fn token_without_user_has_no_email() {
        let holder = memory_holder();
        holder.storage().set(TOKEN_KEY, "tok").unwrap();

        let session = holder.current_session().unwrap();
        assert_eq!(session.token, "tok");
        assert!(session.email.is_none());
    }

    #[test]
    fn tampered_user_entry_is_ignored() {
        let holder = memory_holder();
        holder.storage().set(TOKEN_KEY, "tok").unwrap();
        holder.storage().set(USER_KEY, "not json").unwrap();

        let session = holder.current_session().unwrap();
        assert!(session.email.is_none());
    }

    #[test]
    fn user_entry_is_json_encoded() {
        let holder = memory_holder();
        holder.login("tok", "a@b.c").unwrap();

        let raw = holder.storage().get(USER_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({ "email": "a@b.c" }));
    }

    #[test]
    fn file_storage_persists_across_holders() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let dir = tmp.path().join("kidvibe");

        SessionHolder::new(FileStorage::new(&dir))
            .login("persisted", "kid@kidvibe.com")
            .unwrap();

        let reopened = SessionHolder::new(FileStorage::new(&dir));
        let session = reopened.current_session().unwrap();
        assert_eq!(session.token, "persisted");
        assert_eq!(session.email.as_deref(), Some("kid@kidvibe.com"));

        reopened.logout().unwrap();
        assert!(!dir.join(TOKEN_KEY).exists());
        assert!(!dir.join(USER_KEY).exists());
    }

    #[test]
    fn file_storage_remove_missing_key_is_ok() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let storage = FileStorage::new(tmp.path());
        assert!(storage.remove(TOKEN_KEY).is_ok());
        assert!(storage.get(TOKEN_KEY).unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_storage_token_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let storage = FileStorage::new(tmp.path().join("s"));
        storage.set(TOKEN_KEY, "secret").unwrap();

        let mode = fs::metadata(storage.dir().join(TOKEN_KEY))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }
}
