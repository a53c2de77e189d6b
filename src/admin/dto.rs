use serde::{Deserialize, Serialize};

use crate::admin::repo::SystemSettings;

/// Full replacement payload for system settings.
#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    pub allow_registration: bool,
    pub max_records_per_user: usize,
    pub max_history_per_user: usize,
}

impl From<SettingsUpdate> for SystemSettings {
    fn from(u: SettingsUpdate) -> Self {
        Self {
            allow_registration: u.allow_registration,
            max_records_per_user: u.max_records_per_user,
            max_history_per_user: u.max_history_per_user,
        }
    }
}

/// Admin self-service update; either field may be omitted to keep the
/// current value.
#[derive(Debug, Deserialize)]
pub struct AdminAccountUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Public view of the admin account.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdminView {
    pub username: String,
}
