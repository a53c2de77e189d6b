use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::error::ServiceError;
use crate::state::AppState;
use crate::users::dto::{ChangePasswordRequest, CredentialsRequest, PublicUser};
use crate::users::password::{hash_password, verify_password};
use crate::users::repo::{self, User};
use crate::validate::{validate_password, validate_username};

#[instrument(skip(state, payload))]
pub fn register_user(
    state: &AppState,
    mut payload: CredentialsRequest,
) -> Result<PublicUser, ServiceError> {
    payload.username = payload.username.trim().to_string();
    validate_username(&payload.username)?;
    validate_password(&payload.password)?;

    // Hashing is slow; keep it outside the mutation lock.
    let password_hash =
        hash_password(&payload.password).map_err(|e| ServiceError::Internal(e.to_string()))?;

    let mut data = state.lock_data()?;
    if !data.settings.allow_registration {
        warn!(username = %payload.username, "registration attempt while disabled");
        return Err(ServiceError::validation("registration is disabled"));
    }
    if repo::find(&data, &payload.username).is_some() {
        warn!(username = %payload.username, "username already taken");
        return Err(ServiceError::validation("username already taken"));
    }

    let user = User {
        username: payload.username,
        password_hash,
        created_at: OffsetDateTime::now_utc(),
    };
    let public = PublicUser::from(&user);
    repo::insert(&mut data, &state.store, user)?;

    info!(username = %public.username, "user registered");
    Ok(public)
}

/// Verify credentials against the stored hash. Unknown usernames and wrong
/// passwords are indistinguishable to the caller.
#[instrument(skip(state, password))]
pub fn authenticate_user(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<PublicUser, ServiceError> {
    let (public, stored_hash) = {
        let data = state.lock_data()?;
        let user = repo::find(&data, username).ok_or_else(|| {
            warn!(username, "login with unknown username");
            ServiceError::Unauthorized
        })?;
        (PublicUser::from(user), user.password_hash.clone())
    };

    let ok = verify_password(password, &stored_hash)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    if !ok {
        warn!(username, "login with wrong password");
        return Err(ServiceError::Unauthorized);
    }

    info!(username, "user authenticated");
    Ok(public)
}

/// Self-service password change; requires the current password.
#[instrument(skip(state, payload))]
pub fn change_password(
    state: &AppState,
    caller: &str,
    payload: ChangePasswordRequest,
) -> Result<(), ServiceError> {
    validate_password(&payload.new_password)?;

    let stored_hash = {
        let data = state.lock_data()?;
        repo::find(&data, caller)
            .ok_or(ServiceError::NotFound)?
            .password_hash
            .clone()
    };
    let ok = verify_password(&payload.current_password, &stored_hash)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    if !ok {
        warn!(username = caller, "password change with wrong current password");
        return Err(ServiceError::Unauthorized);
    }

    let new_hash =
        hash_password(&payload.new_password).map_err(|e| ServiceError::Internal(e.to_string()))?;
    let mut data = state.lock_data()?;
    repo::update_password(&mut data, &state.store, caller, new_hash)?;

    info!(username = caller, "password changed");
    Ok(())
}
