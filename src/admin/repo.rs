use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::state::AppData;
use crate::store::documents::{DocumentStore, ADMIN_ACCOUNT_DOC, SYSTEM_SETTINGS_DOC};

/// Singleton operator account, seeded from config defaults on first run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAccount {
    pub username: String,
    pub password_hash: String,
}

/// Singleton runtime policy, admin-mutable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettings {
    pub allow_registration: bool,
    pub max_records_per_user: usize,
    pub max_history_per_user: usize,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            allow_registration: true,
            max_records_per_user: 1000,
            max_history_per_user: 100,
        }
    }
}

pub fn save_admin(
    data: &mut AppData,
    store: &DocumentStore,
    next: AdminAccount,
) -> Result<(), ServiceError> {
    let prev = std::mem::replace(&mut data.admin, next);
    if let Err(e) = store.write(ADMIN_ACCOUNT_DOC, &data.admin) {
        data.admin = prev;
        return Err(e.into());
    }
    Ok(())
}

pub fn save_settings(
    data: &mut AppData,
    store: &DocumentStore,
    next: SystemSettings,
) -> Result<(), ServiceError> {
    let prev = std::mem::replace(&mut data.settings, next);
    if let Err(e) = store.write(SYSTEM_SETTINGS_DOC, &data.settings) {
        data.settings = prev;
        return Err(e.into());
    }
    Ok(())
}
