//! Session Id Persistence
//!
//! The session id outlives the process so a conversation can be resumed on
//! the backend. Only the id is persisted; messages are not.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::messages::SessionId;

/// Application directory name under the XDG base directories
pub const APP_DIR: &str = "retail-insights";

/// File name of the persisted session id
pub const SESSION_FILE_NAME: &str = "session_id";

/// Errors from reading or writing the persisted session id
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// No data directory could be determined for this user
    #[error("no data directory available")]
    NoDataDir,

    /// Filesystem error
    #[error("session file {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Loads and saves the current session id
#[async_trait]
pub trait SessionIdStore: Send + Sync {
    /// The persisted id, if any
    async fn load(&self) -> Result<Option<SessionId>, PersistenceError>;

    /// Persist `id`, replacing any previous one
    async fn save(&self, id: &SessionId) -> Result<(), PersistenceError>;
}

/// Session id stored in a plain text file
#[derive(Clone, Debug)]
pub struct FileSessionIdStore {
    path: PathBuf,
}

impl FileSessionIdStore {
    /// Store at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$XDG_DATA_HOME/retail-insights/session_id`
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::NoDataDir` when the platform has no data
    /// directory for this user.
    pub fn default_location() -> Result<Self, PersistenceError> {
        let dir = dirs::data_dir().ok_or(PersistenceError::NoDataDir)?;
        Ok(Self::new(dir.join(APP_DIR).join(SESSION_FILE_NAME)))
    }

    /// Where the id is stored
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl SessionIdStore for FileSessionIdStore {
    async fn load(&self) -> Result<Option<SessionId>, PersistenceError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let id = contents.trim();
                Ok((!id.is_empty()).then(|| SessionId(id.to_string())))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn save(&self, id: &SessionId) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        tokio::fs::write(&self.path, id.as_str())
            .await
            .map_err(|e| self.io_error(e))
    }
}

/// Session id kept in memory only
#[derive(Debug, Default)]
pub struct MemorySessionIdStore {
    id: Mutex<Option<SessionId>>,
}

impl MemorySessionIdStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds `id`
    #[must_use]
    pub fn with_id(id: SessionId) -> Self {
        Self {
            id: Mutex::new(Some(id)),
        }
    }
}

#[async_trait]
impl SessionIdStore for MemorySessionIdStore {
    async fn load(&self) -> Result<Option<SessionId>, PersistenceError> {
        Ok(self.id.lock().await.clone())
    }

    async fn save(&self, id: &SessionId) -> Result<(), PersistenceError> {
        *self.id.lock().await = Some(id.clone());
        Ok(())
    }
}
