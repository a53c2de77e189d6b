use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use tracing::{info, warn};

use crate::admin::repo::{AdminAccount, SystemSettings};
use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::export::SpreadsheetEncoder;
use crate::history::HistoryEntry;
use crate::ids::{IdGenerator, UuidGenerator};
use crate::records::Record;
use crate::store::documents::{
    ADMIN_ACCOUNT_DOC, SYSTEM_SETTINGS_DOC, USERS_DOC, USER_HISTORY_DOC, USER_RECORDS_DOC,
};
use crate::store::{BackupManager, DocumentStore};
use crate::users::password::hash_password;
use crate::users::User;

/// In-memory mirror of every persisted document. Loaded once at startup;
/// after that, reads never touch disk and every mutation writes the affected
/// document back before the mirror change is committed.
#[derive(Debug, Default)]
pub struct AppData {
    pub users: Vec<User>,
    pub records: BTreeMap<String, Vec<Record>>,
    pub history: BTreeMap<String, Vec<HistoryEntry>>,
    pub admin: AdminAccount,
    pub settings: SystemSettings,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<DocumentStore>,
    /// Single mutation lock: the read-modify-write-persist sequence for a
    /// shard is not atomic on its own, so concurrent callers are serialized
    /// here.
    pub data: Arc<Mutex<AppData>>,
    pub ids: Arc<dyn IdGenerator>,
    pub encoder: Arc<dyn SpreadsheetEncoder>,
    pub backups: Arc<BackupManager>,
}

impl AppState {
    /// Load all documents, seed the admin account on first run, take the
    /// startup backup and prune old ones.
    pub fn init(config: AppConfig, encoder: Arc<dyn SpreadsheetEncoder>) -> anyhow::Result<Self> {
        Self::from_parts(config, encoder, Arc::new(UuidGenerator))
    }

    pub fn from_parts(
        config: AppConfig,
        encoder: Arc<dyn SpreadsheetEncoder>,
        ids: Arc<dyn IdGenerator>,
    ) -> anyhow::Result<Self> {
        let store = DocumentStore::new(&config.data_dir).context("create data directory")?;

        let users: Vec<User> = store.read_or_default(USERS_DOC)?;
        let records: BTreeMap<String, Vec<Record>> = store.read_or_default(USER_RECORDS_DOC)?;
        let history: BTreeMap<String, Vec<HistoryEntry>> =
            store.read_or_default(USER_HISTORY_DOC)?;
        let settings: SystemSettings = store
            .read_opt(SYSTEM_SETTINGS_DOC)?
            .unwrap_or_default();

        let admin: AdminAccount = match store.read_opt(ADMIN_ACCOUNT_DOC)? {
            Some(admin) => admin,
            None => {
                let admin = AdminAccount {
                    username: config.default_admin_username.clone(),
                    password_hash: hash_password(&config.default_admin_password)?,
                };
                store.write(ADMIN_ACCOUNT_DOC, &admin)?;
                info!(username = %admin.username, "admin account seeded");
                admin
            }
        };

        let backups = BackupManager::new(&store);
        match backups.create_backup(&store) {
            Ok(id) => info!(backup = %id, "startup backup taken"),
            Err(e) => warn!(error = %e, "startup backup failed; continuing"),
        }
        // Pruning runs even when the backup attempt failed, so a recurring
        // backup error cannot let old snapshots pile up.
        if let Err(e) = backups.prune_backups(config.max_backups) {
            warn!(error = %e, "backup pruning failed; continuing");
        }

        info!(
            users = users.len(),
            record_shards = records.len(),
            history_shards = history.len(),
            "documents loaded"
        );

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            data: Arc::new(Mutex::new(AppData {
                users,
                records,
                history,
                admin,
                settings,
            })),
            ids,
            encoder,
            backups: Arc::new(backups),
        })
    }

    pub(crate) fn lock_data(&self) -> Result<MutexGuard<'_, AppData>, ServiceError> {
        self.data
            .lock()
            .map_err(|_| ServiceError::Internal("state lock poisoned".into()))
    }

    #[cfg(test)]
    pub(crate) fn for_tests(dir: &std::path::Path) -> Self {
        Self::from_parts(
            AppConfig::with_data_dir(dir),
            Arc::new(crate::export::testing::TsvEncoder),
            Arc::new(crate::ids::testing::SequentialIds::default()),
        )
        .expect("test state init")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::dto::RecordInput;
    use crate::records::services::add_record;

    fn input() -> RecordInput {
        RecordInput {
            part: "Slab".into(),
            kind: "Floor".into(),
            number: "F-1".into(),
            height: 1.0,
            thick: 0.5,
            length: 2.0,
            count: 1.0,
            created_at: None,
        }
    }

    #[test]
    fn init_seeds_admin_and_takes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path());

        let data = state.lock_data().unwrap();
        assert_eq!(data.admin.username, "admin");
        assert!(!data.admin.password_hash.is_empty());
        assert!(data.settings.allow_registration);
        drop(data);

        assert!(dir.path().join("adminAccount.json").exists());
        assert_eq!(state.backups.list_backups().unwrap().len(), 1);
    }

    #[test]
    fn mirror_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let state = AppState::for_tests(dir.path());
            add_record(&state, "alice", input()).unwrap();
        }
        let reopened = AppState::for_tests(dir.path());
        let data = reopened.lock_data().unwrap();
        let shard = crate::records::repo::shard(&data, "alice");
        assert_eq!(shard.len(), 1);
        assert_eq!(shard[0].part, "Slab");
        assert_eq!(shard[0].created_by, "alice");
    }

    #[test]
    fn startup_prunes_stale_backups_beyond_retention() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("backups");
        for stamp in ["20200101T000000", "20200102T000000", "20200103T000000"] {
            std::fs::create_dir_all(root.join(format!("backup_{stamp}"))).unwrap();
        }

        let mut config = AppConfig::with_data_dir(dir.path());
        config.max_backups = 2;
        let state = AppState::from_parts(
            config,
            Arc::new(crate::export::testing::TsvEncoder),
            Arc::new(crate::ids::testing::SequentialIds::default()),
        )
        .unwrap();

        // The fresh startup backup plus the newest stale one survive.
        let kept = state.backups.list_backups().unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1], "backup_20200103T000000");
    }

    #[test]
    fn startup_survives_unusable_backup_root() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the backup root should be makes both the backup and
        // the prune fail; startup still completes.
        std::fs::write(dir.path().join("backups"), b"x").unwrap();
        let state = AppState::for_tests(dir.path());
        assert_eq!(state.lock_data().unwrap().admin.username, "admin");
    }

    #[test]
    fn reseed_does_not_overwrite_existing_admin() {
        let dir = tempfile::tempdir().unwrap();
        let first = AppState::for_tests(dir.path());
        let original_hash = first.lock_data().unwrap().admin.password_hash.clone();
        drop(first);

        let second = AppState::for_tests(dir.path());
        let hash = second.lock_data().unwrap().admin.password_hash.clone();
        assert_eq!(hash, original_hash);
    }
}
