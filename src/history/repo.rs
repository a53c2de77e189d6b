use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ServiceError;
use crate::records::Record;
use crate::state::AppData;
use crate::store::documents::{DocumentStore, USER_HISTORY_DOC};

/// A named snapshot of a user's record set at a point in time. Addressed by
/// its stable generator-assigned id, unlike active records which keep the
/// position-indexed API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub name: String,
    pub records: Vec<Record>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub fn shard<'a>(data: &'a AppData, username: &str) -> &'a [HistoryEntry] {
    data.history.get(username).map(Vec::as_slice).unwrap_or(&[])
}

pub fn replace_shard(
    data: &mut AppData,
    store: &DocumentStore,
    username: &str,
    next: Vec<HistoryEntry>,
) -> Result<(), ServiceError> {
    let prev = data.history.insert(username.to_string(), next);
    if let Err(e) = store.write(USER_HISTORY_DOC, &data.history) {
        match prev {
            Some(prev) => {
                data.history.insert(username.to_string(), prev);
            }
            None => {
                data.history.remove(username);
            }
        }
        return Err(e.into());
    }
    Ok(())
}

pub fn remove_shard(
    data: &mut AppData,
    store: &DocumentStore,
    username: &str,
) -> Result<(), ServiceError> {
    let prev = data.history.remove(username);
    if let Err(e) = store.write(USER_HISTORY_DOC, &data.history) {
        if let Some(prev) = prev {
            data.history.insert(username.to_string(), prev);
        }
        return Err(e.into());
    }
    Ok(())
}
