use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ServiceError;
use crate::records::dto::RecordDraft;
use crate::state::AppData;
use crate::store::documents::{DocumentStore, USER_RECORDS_DOC};

/// One measurement line item. Lives inside its owner's shard of
/// `userRecords.json`; every record in a shard has `created_by` equal to the
/// shard's username.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub part: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
    pub height: f64,
    pub thick: f64,
    pub length: f64,
    pub count: f64,
    pub volume: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_by: String,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
}

impl Record {
    pub fn from_draft(draft: RecordDraft, id: String, created_by: &str) -> Self {
        let created_at = draft.created_at.unwrap_or_else(OffsetDateTime::now_utc);
        Self {
            id,
            part: draft.part,
            kind: draft.kind,
            number: draft.number,
            height: draft.height,
            thick: draft.thick,
            length: draft.length,
            count: draft.count,
            volume: draft.volume,
            created_at,
            created_by: created_by.to_string(),
            updated_at: None,
        }
    }

    /// Full field replacement except identity (`id`, `created_at`,
    /// `created_by`); stamps `updated_at`.
    pub fn apply_draft(&mut self, draft: RecordDraft) {
        self.part = draft.part;
        self.kind = draft.kind;
        self.number = draft.number;
        self.height = draft.height;
        self.thick = draft.thick;
        self.length = draft.length;
        self.count = draft.count;
        self.volume = draft.volume;
        self.updated_at = Some(OffsetDateTime::now_utc());
    }
}

/// The caller's shard, or an empty slice when the username has no shard yet.
/// Reading never materializes (or persists) an empty shard.
pub fn shard<'a>(data: &'a AppData, username: &str) -> &'a [Record] {
    data.records.get(username).map(Vec::as_slice).unwrap_or(&[])
}

/// Replace one username's shard and persist the whole document. The mirror
/// change is rolled back if the write fails, so memory never runs ahead of
/// disk.
pub fn replace_shard(
    data: &mut AppData,
    store: &DocumentStore,
    username: &str,
    next: Vec<Record>,
) -> Result<(), ServiceError> {
    let prev = data.records.insert(username.to_string(), next);
    if let Err(e) = store.write(USER_RECORDS_DOC, &data.records) {
        match prev {
            Some(prev) => {
                data.records.insert(username.to_string(), prev);
            }
            None => {
                data.records.remove(username);
            }
        }
        return Err(e.into());
    }
    Ok(())
}

/// Drop one username's shard entirely (user deletion cascade).
pub fn remove_shard(
    data: &mut AppData,
    store: &DocumentStore,
    username: &str,
) -> Result<(), ServiceError> {
    let prev = data.records.remove(username);
    if let Err(e) = store.write(USER_RECORDS_DOC, &data.records) {
        if let Some(prev) = prev {
            data.records.insert(username.to_string(), prev);
        }
        return Err(e.into());
    }
    Ok(())
}
