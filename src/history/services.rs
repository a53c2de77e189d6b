use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::error::ServiceError;
use crate::history::repo::{self, HistoryEntry};
use crate::records::dto::{RecordDraft, RecordInput};
use crate::records::Record;
use crate::state::AppState;
use crate::validate::{validate_history_name, validate_record};

#[instrument(skip(state))]
pub fn list_history(state: &AppState, username: &str) -> Result<Vec<HistoryEntry>, ServiceError> {
    let data = state.lock_data()?;
    Ok(repo::shard(&data, username).to_vec())
}

/// Validate the whole batch before anything is persisted (all-or-nothing).
fn validate_batch(records: &[RecordInput]) -> Result<Vec<RecordDraft>, ServiceError> {
    if records.is_empty() {
        return Err(ServiceError::validation("records must not be empty"));
    }
    records.iter().map(validate_record).collect()
}

fn materialize(state: &AppState, caller: &str, drafts: Vec<RecordDraft>) -> Vec<Record> {
    drafts
        .into_iter()
        .map(|draft| Record::from_draft(draft, state.ids.next_id(), caller))
        .collect()
}

/// Save the submitted batch as a named snapshot owned by the caller.
#[instrument(skip(state, records))]
pub fn save_history(
    state: &AppState,
    caller: &str,
    name: &str,
    records: Vec<RecordInput>,
) -> Result<HistoryEntry, ServiceError> {
    let name = validate_history_name(name)?;
    let drafts = validate_batch(&records)?;

    let mut data = state.lock_data()?;
    if drafts.len() > data.settings.max_records_per_user {
        return Err(ServiceError::validation("too many records in one snapshot"));
    }
    let shard = repo::shard(&data, caller);
    if shard.len() >= data.settings.max_history_per_user {
        warn!(username = caller, len = shard.len(), "history capacity reached");
        return Err(ServiceError::CapacityExceeded);
    }

    let now = OffsetDateTime::now_utc();
    let entry = HistoryEntry {
        id: state.ids.next_id(),
        name,
        records: materialize(state, caller, drafts),
        created_at: now,
        updated_at: now,
    };

    let mut next = shard.to_vec();
    next.push(entry.clone());
    repo::replace_shard(&mut data, &state.store, caller, next)?;

    info!(username = caller, id = %entry.id, rows = entry.records.len(), "history saved");
    Ok(entry)
}

/// Replace name and records of an existing snapshot, refreshing
/// `updated_at` and keeping `id`/`created_at`.
#[instrument(skip(state, records))]
pub fn update_history(
    state: &AppState,
    caller: &str,
    id: &str,
    name: &str,
    records: Vec<RecordInput>,
) -> Result<HistoryEntry, ServiceError> {
    let name = validate_history_name(name)?;
    let drafts = validate_batch(&records)?;

    let mut data = state.lock_data()?;
    if drafts.len() > data.settings.max_records_per_user {
        return Err(ServiceError::validation("too many records in one snapshot"));
    }
    let shard = repo::shard(&data, caller);
    let pos = shard
        .iter()
        .position(|e| e.id == id)
        .ok_or(ServiceError::NotFound)?;

    let mut next = shard.to_vec();
    next[pos].name = name;
    next[pos].records = materialize(state, caller, drafts);
    next[pos].updated_at = OffsetDateTime::now_utc();
    let updated = next[pos].clone();
    repo::replace_shard(&mut data, &state.store, caller, next)?;

    info!(username = caller, id, rows = updated.records.len(), "history updated");
    Ok(updated)
}

#[instrument(skip(state))]
pub fn delete_history(state: &AppState, caller: &str, id: &str) -> Result<(), ServiceError> {
    let mut data = state.lock_data()?;
    let shard = repo::shard(&data, caller);
    let pos = shard
        .iter()
        .position(|e| e.id == id)
        .ok_or(ServiceError::NotFound)?;

    let mut next = shard.to_vec();
    next.remove(pos);
    repo::replace_shard(&mut data, &state.store, caller, next)?;

    info!(username = caller, id, "history deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    fn input(number: &str) -> RecordInput {
        RecordInput {
            part: "Beam".into(),
            kind: "Girder".into(),
            number: number.into(),
            height: 1.0,
            thick: 1.0,
            length: 2.0,
            count: 1.0,
            created_at: None,
        }
    }

    #[test]
    fn save_and_list_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let entry = save_history(&state, "alice", "week 1", vec![input("B-1"), input("B-2")])
            .unwrap();
        assert_eq!(entry.records.len(), 2);
        assert_eq!(entry.records[0].created_by, "alice");
        assert_eq!(entry.records[0].volume, 2.0);
        assert_eq!(entry.created_at, entry.updated_at);

        let listed = list_history(&state, "alice").unwrap();
        assert_eq!(listed, vec![entry]);
    }

    #[test]
    fn name_is_sanitized_not_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let entry = save_history(&state, "alice", " week <1> ", vec![input("B-1")]).unwrap();
        assert_eq!(entry.name, "week 1");
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let mut bad = input("B-2");
        bad.height = -1.0;
        let err = save_history(&state, "alice", "week 1", vec![input("B-1"), bad]).unwrap_err();
        assert_eq!(err.category(), "validation_error");
        assert!(list_history(&state, "alice").unwrap().is_empty());
    }

    #[test]
    fn empty_batch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let err = save_history(&state, "alice", "week 1", Vec::new()).unwrap_err();
        assert_eq!(err.category(), "validation_error");
    }

    #[test]
    fn update_replaces_content_and_keeps_identity() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let saved = save_history(&state, "alice", "week 1", vec![input("B-1")]).unwrap();

        let updated = update_history(
            &state,
            "alice",
            &saved.id,
            "week 1 revised",
            vec![input("B-9"), input("B-10")],
        )
        .unwrap();

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.created_at, saved.created_at);
        assert_eq!(updated.name, "week 1 revised");
        assert_eq!(updated.records.len(), 2);
        assert!(updated.updated_at >= saved.updated_at);
    }

    #[test]
    fn update_of_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let err =
            update_history(&state, "alice", "missing", "name", vec![input("B-1")]).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }

    #[test]
    fn delete_removes_only_the_addressed_entry() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let first = save_history(&state, "alice", "one", vec![input("B-1")]).unwrap();
        let second = save_history(&state, "alice", "two", vec![input("B-2")]).unwrap();

        delete_history(&state, "alice", &first.id).unwrap();
        let left = list_history(&state, "alice").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, second.id);

        let err = delete_history(&state, "alice", &first.id).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }

    #[test]
    fn history_is_owner_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let entry = save_history(&state, "alice", "week 1", vec![input("B-1")]).unwrap();

        assert!(list_history(&state, "bob").unwrap().is_empty());
        let err = delete_history(&state, "bob", &entry.id).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
        assert_eq!(list_history(&state, "alice").unwrap().len(), 1);
    }

    #[test]
    fn mirror_rolls_back_when_document_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let entry = save_history(&state, "alice", "week 1", vec![input("B-1")]).unwrap();

        let doc = dir.path().join("userHistory.json");
        std::fs::remove_file(&doc).unwrap();
        std::fs::create_dir(&doc).unwrap();
        std::fs::write(doc.join("occupied"), b"x").unwrap();

        let err = delete_history(&state, "alice", &entry.id).unwrap_err();
        assert!(matches!(err, ServiceError::Io(_)));

        let left = list_history(&state, "alice").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, entry.id);
    }

    #[test]
    fn history_capacity_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        state.lock_data().unwrap().settings.max_history_per_user = 2;

        save_history(&state, "alice", "one", vec![input("B-1")]).unwrap();
        save_history(&state, "alice", "two", vec![input("B-2")]).unwrap();
        let err = save_history(&state, "alice", "three", vec![input("B-3")]).unwrap_err();
        assert!(matches!(err, ServiceError::CapacityExceeded));
        assert_eq!(list_history(&state, "alice").unwrap().len(), 2);
    }
}
