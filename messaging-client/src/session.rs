use serde::{Deserialize, Serialize};
use starwatch_core::{CoreError, MessagingError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Opaque credential handed out by the gateway after login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub session: String,
    pub phone_number: String,
}

/// File-backed store for the messaging session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<StoredSession, CoreError> {
        if !self.exists() {
            return Err(MessagingError::SessionMissing {
                path: self.path.display().to_string(),
            }
            .into());
        }

        let raw = std::fs::read_to_string(&self.path)?;
        let session: StoredSession = serde_json::from_str(&raw)?;
        debug!("Loaded messaging session from {}", self.path.display());
        Ok(session)
    }

    pub fn save(&self, session: &StoredSession) -> Result<(), CoreError> {
        std::fs::write(&self.path, serde_json::to_string_pretty(session)?)?;
        info!("Messaging session stored at {}", self.path.display());
        Ok(())
    }
}
