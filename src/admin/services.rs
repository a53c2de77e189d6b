use tracing::{info, instrument, warn};

use crate::admin::dto::{AdminAccountUpdate, AdminView, SettingsUpdate};
use crate::admin::repo::{self, AdminAccount, SystemSettings};
use crate::error::ServiceError;
use crate::history;
use crate::records;
use crate::state::AppState;
use crate::users;
use crate::users::dto::PublicUser;
use crate::users::password::{hash_password, verify_password};
use crate::validate::{validate_password, validate_username};

#[instrument(skip(state, password))]
pub fn authenticate_admin(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<AdminView, ServiceError> {
    let (admin_username, stored_hash) = {
        let data = state.lock_data()?;
        (data.admin.username.clone(), data.admin.password_hash.clone())
    };
    if username != admin_username {
        warn!(username, "admin login with unknown username");
        return Err(ServiceError::Unauthorized);
    }
    let ok = verify_password(password, &stored_hash)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    if !ok {
        warn!(username, "admin login with wrong password");
        return Err(ServiceError::Unauthorized);
    }
    info!(username, "admin authenticated");
    Ok(AdminView {
        username: admin_username,
    })
}

#[instrument(skip(state))]
pub fn list_users(state: &AppState) -> Result<Vec<PublicUser>, ServiceError> {
    let data = state.lock_data()?;
    Ok(data.users.iter().map(PublicUser::from).collect())
}

#[instrument(skip(state, new_password))]
pub fn set_password_for_user(
    state: &AppState,
    username: &str,
    new_password: &str,
) -> Result<(), ServiceError> {
    validate_password(new_password)?;
    let new_hash =
        hash_password(new_password).map_err(|e| ServiceError::Internal(e.to_string()))?;

    let mut data = state.lock_data()?;
    users::repo::update_password(&mut data, &state.store, username, new_hash)?;
    info!(username, "password reset by admin");
    Ok(())
}

/// Remove the account and cascade to its record and history shards. Each
/// document is its own consistency unit; the user row goes first so a
/// failure mid-cascade never leaves an account with orphan visibility.
#[instrument(skip(state))]
pub fn delete_user(state: &AppState, username: &str) -> Result<(), ServiceError> {
    let mut data = state.lock_data()?;
    users::repo::remove(&mut data, &state.store, username)?;
    records::repo::remove_shard(&mut data, &state.store, username)?;
    history::repo::remove_shard(&mut data, &state.store, username)?;
    info!(username, "user deleted with shards");
    Ok(())
}

#[instrument(skip(state))]
pub fn get_settings(state: &AppState) -> Result<SystemSettings, ServiceError> {
    let data = state.lock_data()?;
    Ok(data.settings.clone())
}

#[instrument(skip(state))]
pub fn set_settings(
    state: &AppState,
    update: SettingsUpdate,
) -> Result<SystemSettings, ServiceError> {
    if update.max_records_per_user == 0 || update.max_records_per_user > 1000 {
        return Err(ServiceError::validation(
            "maxRecordsPerUser must be between 1 and 1000",
        ));
    }
    if update.max_history_per_user == 0 || update.max_history_per_user > 100 {
        return Err(ServiceError::validation(
            "maxHistoryPerUser must be between 1 and 100",
        ));
    }

    let mut data = state.lock_data()?;
    repo::save_settings(&mut data, &state.store, update.into())?;
    info!(
        allow_registration = data.settings.allow_registration,
        max_records = data.settings.max_records_per_user,
        max_history = data.settings.max_history_per_user,
        "settings updated"
    );
    Ok(data.settings.clone())
}

#[instrument(skip(state))]
pub fn get_admin_account(state: &AppState) -> Result<AdminView, ServiceError> {
    let data = state.lock_data()?;
    Ok(AdminView {
        username: data.admin.username.clone(),
    })
}

#[instrument(skip(state, update))]
pub fn update_admin_account(
    state: &AppState,
    update: AdminAccountUpdate,
) -> Result<AdminView, ServiceError> {
    let username = match update.username {
        Some(name) => {
            let name = name.trim().to_string();
            validate_username(&name)?;
            Some(name)
        }
        None => None,
    };
    let password_hash = match update.password {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(&password).map_err(|e| ServiceError::Internal(e.to_string()))?)
        }
        None => None,
    };

    let mut data = state.lock_data()?;
    let next = AdminAccount {
        username: username.unwrap_or_else(|| data.admin.username.clone()),
        password_hash: password_hash.unwrap_or_else(|| data.admin.password_hash.clone()),
    };
    repo::save_admin(&mut data, &state.store, next)?;

    info!(username = %data.admin.username, "admin account updated");
    Ok(AdminView {
        username: data.admin.username.clone(),
    })
}
