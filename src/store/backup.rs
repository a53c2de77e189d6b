use std::fs;
use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::documents::{DocumentStore, StoreError, ALL_DOCS};

const BACKUP_TS: &[FormatItem<'_>] =
    format_description!("[year][month][day]T[hour][minute][second]");

lazy_static! {
    static ref BACKUP_ID_RE: Regex = Regex::new(r"^backup_\d{8}T\d{6}$").unwrap();
}

/// Copies the live JSON documents into timestamped directories under
/// `<data_dir>/backups`. Restore is an out-of-band operator tool and is not
/// atomic across the document set.
#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
}

impl BackupManager {
    pub fn new(store: &DocumentStore) -> Self {
        Self {
            root: store.dir().join("backups"),
        }
    }

    fn io(source: std::io::Error) -> StoreError {
        StoreError::Io {
            name: "backups".to_string(),
            source,
        }
    }

    /// Copy every present document into a new `backup_<timestamp>` directory
    /// and return the backup id.
    pub fn create_backup(&self, store: &DocumentStore) -> Result<String, StoreError> {
        let stamp = OffsetDateTime::now_utc()
            .format(BACKUP_TS)
            .map_err(|e| Self::io(std::io::Error::other(e)))?;
        let id = format!("backup_{stamp}");
        let dir = self.root.join(&id);
        fs::create_dir_all(&dir).map_err(Self::io)?;

        for name in ALL_DOCS {
            let src = store.path_of(name);
            if src.exists() {
                fs::copy(&src, dir.join(name)).map_err(Self::io)?;
            }
        }
        info!(backup = %id, "backup created");
        Ok(id)
    }

    /// Copy the named backup's documents back over the live files.
    pub fn restore_backup(&self, store: &DocumentStore, id: &str) -> Result<(), StoreError> {
        if !BACKUP_ID_RE.is_match(id) {
            return Err(Self::io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid backup id",
            )));
        }
        let dir = self.root.join(id);
        if !dir.is_dir() {
            return Err(Self::io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "backup not found",
            )));
        }
        for name in ALL_DOCS {
            let src = dir.join(name);
            if src.exists() {
                fs::copy(&src, store.path_of(name)).map_err(Self::io)?;
            }
        }
        info!(backup = %id, "backup restored");
        Ok(())
    }

    /// Backup ids present on disk, newest first. The timestamp embedded in
    /// the id makes lexical order chronological.
    pub fn list_backups(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io(e)),
        };
        let mut ids: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| BACKUP_ID_RE.is_match(n))
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        Ok(ids)
    }

    /// Delete every backup beyond the newest `max_kept`.
    pub fn prune_backups(&self, max_kept: usize) -> Result<(), StoreError> {
        for id in self.list_backups()?.into_iter().skip(max_kept) {
            if let Err(e) = fs::remove_dir_all(self.root.join(&id)) {
                warn!(backup = %id, error = %e, "failed to prune backup");
            } else {
                info!(backup = %id, "backup pruned");
            }
        }
        Ok(())
    }
}
