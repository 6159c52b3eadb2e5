//! Session credentials and their persistence.
//!
//! The session token is a bearer credential: it is never logged, and its
//! `Debug` output is redacted. A persisted session holds the token plus the
//! user id it belongs to, so a later run can resume without asking the
//! server who it is.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use parley_chat_types::UserId;
use serde::{Deserialize, Serialize};

use crate::ChatError;

/// Bearer token for the chat server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the Authorization header and the channel URL.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionToken([{} chars REDACTED])", self.0.len())
    }
}

/// A persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    /// Bearer token.
    pub token: SessionToken,
    /// The user the token belongs to.
    pub user_id: UserId,
    /// The user's name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Persistence for the current session.
pub trait TokenStore: Send + Sync + 'static {
    /// Load the persisted session, if any.
    fn load(&self) -> Result<Option<StoredSession>, ChatError>;

    /// Persist a session, replacing any previous one.
    fn save(&self, session: &StoredSession) -> Result<(), ChatError>;

    /// Remove the persisted session. Succeeds if there was none.
    fn clear(&self) -> Result<(), ChatError>;
}

/// In-memory token store. Clones share state.
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
    session: Arc<Mutex<Option<StoredSession>>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `session`.
    pub fn with_session(session: StoredSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(Some(session))),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<StoredSession>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredSession>, ChatError> {
        Ok(self.slot().clone())
    }

    fn save(&self, session: &StoredSession) -> Result<(), ChatError> {
        *self.slot() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ChatError> {
        *self.slot() = None;
        Ok(())
    }
}

/// Token store backed by a JSON file readable only by its owner.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// File name used inside a data directory.
    pub const FILE_NAME: &'static str = "session.json";

    /// Store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data_dir>/session.json`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(Self::FILE_NAME))
    }

    /// Path of the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredSession>, ChatError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ChatError::Storage(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| ChatError::Storage(format!("invalid session file {}: {e}", self.path.display())))
    }

    fn save(&self, session: &StoredSession) -> Result<(), ChatError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ChatError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let contents = serde_json::to_string_pretty(session)
            .map_err(|e| ChatError::Storage(e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(|e| {
            ChatError::Storage(format!("failed to write {}: {e}", self.path.display()))
        })?;
        set_file_permissions_0600(&self.path)
    }

    fn clear(&self) -> Result<(), ChatError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ChatError::Storage(format!(
                "failed to remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
fn set_file_permissions_0600(path: &Path) -> Result<(), ChatError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
            ChatError::Storage(format!("failed to set permissions on {}: {e}", path.display()))
        })?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
