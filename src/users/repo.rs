use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ServiceError;
use crate::state::AppData;
use crate::store::documents::{DocumentStore, USERS_DOC};

/// Registered account as persisted in `users.json`. The hash stays internal;
/// anything returned to a caller goes through `PublicUser`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub password_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub fn find<'a>(data: &'a AppData, username: &str) -> Option<&'a User> {
    data.users.iter().find(|u| u.username == username)
}

/// Append a new user and persist. Rolls the mirror back on write failure.
pub fn insert(data: &mut AppData, store: &DocumentStore, user: User) -> Result<(), ServiceError> {
    data.users.push(user);
    if let Err(e) = store.write(USERS_DOC, &data.users) {
        data.users.pop();
        return Err(e.into());
    }
    Ok(())
}

pub fn update_password(
    data: &mut AppData,
    store: &DocumentStore,
    username: &str,
    password_hash: String,
) -> Result<(), ServiceError> {
    let pos = data
        .users
        .iter()
        .position(|u| u.username == username)
        .ok_or(ServiceError::NotFound)?;
    let prev = std::mem::replace(&mut data.users[pos].password_hash, password_hash);
    if let Err(e) = store.write(USERS_DOC, &data.users) {
        data.users[pos].password_hash = prev;
        return Err(e.into());
    }
    Ok(())
}

/// Remove the user row itself. Shard cascade is handled by the caller.
pub fn remove(
    data: &mut AppData,
    store: &DocumentStore,
    username: &str,
) -> Result<(), ServiceError> {
    let pos = data
        .users
        .iter()
        .position(|u| u.username == username)
        .ok_or(ServiceError::NotFound)?;
    let removed = data.users.remove(pos);
    if let Err(e) = store.write(USERS_DOC, &data.users) {
        data.users.insert(pos, removed);
        return Err(e.into());
    }
    Ok(())
}
