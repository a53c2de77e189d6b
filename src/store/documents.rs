use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

pub const USERS_DOC: &str = "users.json";
pub const USER_RECORDS_DOC: &str = "userRecords.json";
pub const USER_HISTORY_DOC: &str = "userHistory.json";
pub const ADMIN_ACCOUNT_DOC: &str = "adminAccount.json";
pub const SYSTEM_SETTINGS_DOC: &str = "systemSettings.json";

/// Every document the store manages, in backup copy order.
pub const ALL_DOCS: [&str; 5] = [
    USERS_DOC,
    USER_RECORDS_DOC,
    USER_HISTORY_DOC,
    ADMIN_ACCOUNT_DOC,
    SYSTEM_SETTINGS_DOC,
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {name} is not valid JSON")]
    Corrupt {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("i/o failure on document {name}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    fn io(name: &str, source: std::io::Error) -> Self {
        Self::Io {
            name: name.to_string(),
            source,
        }
    }
}

/// Whole-file JSON document store. Each document is one file and one unit of
/// consistency; writes replace the file atomically so readers never observe a
/// partial document.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// `Ok(None)` when the document file does not exist yet.
    pub fn read_opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_of(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(name, e)),
        };
        let value = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            name: name.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    pub fn read_or_default<T: DeserializeOwned + Default>(
        &self,
        name: &str,
    ) -> Result<T, StoreError> {
        Ok(self.read_opt(name)?.unwrap_or_default())
    }

    /// Serialize into a temp file in the same directory, fsync, then rename
    /// over the target. A failure at any step leaves the previous content
    /// intact and the temp artifact removed.
    pub fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path_of(name);
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Corrupt {
            name: name.to_string(),
            source,
        })?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::io(name, e))?;
        tmp.write_all(&bytes).map_err(|e| StoreError::io(name, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io(name, e))?;
        // persist consumes the temp file; on error the returned handle is
        // dropped, which unlinks the temp artifact.
        tmp.persist(&path)
            .map_err(|e| StoreError::io(name, e.error))?;
        debug!(document = name, bytes = bytes.len(), "document written");
        Ok(())
    }
}
