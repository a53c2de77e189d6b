use tracing::{info, instrument, warn};

use crate::error::ServiceError;
use crate::records::dto::RecordInput;
use crate::records::repo::{self, Record};
use crate::state::AppState;
use crate::validate::{checked_index, validate_record};

#[instrument(skip(state))]
pub fn list_records(state: &AppState, username: &str) -> Result<Vec<Record>, ServiceError> {
    let data = state.lock_data()?;
    Ok(repo::shard(&data, username).to_vec())
}

/// Validate, sanitize, derive volume, stamp ownership, enforce capacity,
/// then persist the caller's shard.
#[instrument(skip(state, payload))]
pub fn add_record(
    state: &AppState,
    caller: &str,
    payload: RecordInput,
) -> Result<Record, ServiceError> {
    let draft = validate_record(&payload)?;
    let mut data = state.lock_data()?;

    let shard = repo::shard(&data, caller);
    if shard.len() >= data.settings.max_records_per_user {
        warn!(username = caller, len = shard.len(), "record capacity reached");
        return Err(ServiceError::CapacityExceeded);
    }

    let record = Record::from_draft(draft, state.ids.next_id(), caller);
    let mut next = shard.to_vec();
    next.push(record.clone());
    repo::replace_shard(&mut data, &state.store, caller, next)?;

    info!(username = caller, id = %record.id, volume = record.volume, "record added");
    Ok(record)
}

/// Replace every value field of the record at `index`, keeping identity
/// fields and refreshing `updated_at`.
#[instrument(skip(state, payload))]
pub fn update_record(
    state: &AppState,
    caller: &str,
    index: i64,
    payload: RecordInput,
) -> Result<Record, ServiceError> {
    let draft = validate_record(&payload)?;
    let mut data = state.lock_data()?;

    let shard = repo::shard(&data, caller);
    let idx = checked_index(index, shard.len())?;
    if shard[idx].created_by != caller {
        warn!(username = caller, index, "update on record owned by someone else");
        return Err(ServiceError::Ownership);
    }

    let mut next = shard.to_vec();
    next[idx].apply_draft(draft);
    let updated = next[idx].clone();
    repo::replace_shard(&mut data, &state.store, caller, next)?;

    info!(username = caller, id = %updated.id, index, "record updated");
    Ok(updated)
}

#[instrument(skip(state))]
pub fn delete_record(state: &AppState, caller: &str, index: i64) -> Result<(), ServiceError> {
    let mut data = state.lock_data()?;

    let shard = repo::shard(&data, caller);
    let idx = checked_index(index, shard.len())?;
    if shard[idx].created_by != caller {
        warn!(username = caller, index, "delete on record owned by someone else");
        return Err(ServiceError::Ownership);
    }

    let mut next = shard.to_vec();
    let removed = next.remove(idx);
    repo::replace_shard(&mut data, &state.store, caller, next)?;

    info!(username = caller, id = %removed.id, index, "record deleted");
    Ok(())
}

#[instrument(skip(state))]
pub fn clear_records(state: &AppState, caller: &str) -> Result<(), ServiceError> {
    let mut data = state.lock_data()?;
    let count = repo::shard(&data, caller).len();
    repo::replace_shard(&mut data, &state.store, caller, Vec::new())?;
    info!(username = caller, cleared = count, "records cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    fn input(number: &str) -> RecordInput {
        RecordInput {
            part: "Wall A".into(),
            kind: "Column".into(),
            number: number.into(),
            height: 3.0,
            thick: 0.2,
            length: 5.0,
            count: 2.0,
            created_at: None,
        }
    }

    fn state(dir: &tempfile::TempDir) -> AppState {
        AppState::for_tests(dir.path())
    }

    #[test]
    fn add_derives_volume_and_stamps_owner() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let record = add_record(&state, "alice", input("C-1")).unwrap();
        assert_eq!(record.volume, 6.0);
        assert_eq!(record.created_by, "alice");
        assert_eq!(record.id, "id-1");
        assert!(record.updated_at.is_none());
    }

    #[test]
    fn list_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        add_record(&state, "alice", input("C-1")).unwrap();
        let first = list_records(&state, "alice").unwrap();
        let second = list_records(&state, "alice").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn listing_unknown_user_is_empty_and_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        assert!(list_records(&state, "ghost").unwrap().is_empty());
        assert!(!dir.path().join("userRecords.json").exists());
    }

    #[test]
    fn update_replaces_fields_and_keeps_identity() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let created = add_record(&state, "alice", input("C-1")).unwrap();

        let mut changed = input("C-2");
        changed.height = 1.0;
        let updated = update_record(&state, "alice", 0, changed).unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.created_by, "alice");
        assert_eq!(updated.number, "C-2");
        assert_eq!(updated.volume, 2.0);
        assert!(updated.updated_at.is_some());
    }

    #[test]
    fn delete_shifts_later_indices_down() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        for n in ["C-1", "C-2", "C-3"] {
            add_record(&state, "alice", input(n)).unwrap();
        }
        delete_record(&state, "alice", 1).unwrap();
        let left = list_records(&state, "alice").unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(left[0].number, "C-1");
        assert_eq!(left[1].number, "C-3");
    }

    #[test]
    fn out_of_range_delete_is_not_found_and_leaves_shard_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        add_record(&state, "alice", input("C-1")).unwrap();

        let err = delete_record(&state, "alice", 5).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
        let err = delete_record(&state, "alice", -1).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));

        assert_eq!(list_records(&state, "alice").unwrap().len(), 1);
    }

    #[test]
    fn capacity_is_enforced_at_the_cap() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        state.lock_data().unwrap().settings.max_records_per_user = 3;

        for n in ["C-1", "C-2", "C-3"] {
            add_record(&state, "alice", input(n)).unwrap();
        }
        let err = add_record(&state, "alice", input("C-4")).unwrap_err();
        assert!(matches!(err, ServiceError::CapacityExceeded));
        assert_eq!(list_records(&state, "alice").unwrap().len(), 3);
    }

    #[test]
    fn users_are_isolated_from_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        add_record(&state, "alice", input("C-1")).unwrap();

        assert!(list_records(&state, "bob").unwrap().is_empty());
        let err = delete_record(&state, "bob", 0).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
        let err = update_record(&state, "bob", 0, input("C-9")).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
        assert_eq!(list_records(&state, "alice").unwrap().len(), 1);
    }

    #[test]
    fn invalid_payload_is_rejected_before_any_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let mut bad = input("C-1");
        bad.part = "Wall<script>".into();
        let err = add_record(&state, "alice", bad).unwrap_err();
        assert_eq!(err.category(), "validation_error");
        assert!(list_records(&state, "alice").unwrap().is_empty());
    }

    #[test]
    fn mirror_rolls_back_when_document_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        add_record(&state, "alice", input("C-1")).unwrap();

        // Make the rename target unusable: a non-empty directory at the
        // document path makes the atomic replace fail.
        let doc = dir.path().join("userRecords.json");
        std::fs::remove_file(&doc).unwrap();
        std::fs::create_dir(&doc).unwrap();
        std::fs::write(doc.join("occupied"), b"x").unwrap();

        let err = add_record(&state, "alice", input("C-2")).unwrap_err();
        assert!(matches!(err, ServiceError::Io(_)));

        // The mirror still shows the pre-call state.
        let left = list_records(&state, "alice").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].number, "C-1");

        let err = delete_record(&state, "alice", 0).unwrap_err();
        assert!(matches!(err, ServiceError::Io(_)));
        assert_eq!(list_records(&state, "alice").unwrap().len(), 1);
    }

    #[test]
    fn register_login_add_then_bad_delete_scenario() {
        use crate::users::dto::CredentialsRequest;
        use crate::users::services::{authenticate_user, register_user};

        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        register_user(
            &state,
            CredentialsRequest {
                username: "alice".into(),
                password: "secret1".into(),
            },
        )
        .unwrap();
        authenticate_user(&state, "alice", "secret1").unwrap();

        let record = add_record(&state, "alice", input("C-1")).unwrap();
        assert_eq!(record.volume, 6.0);

        let err = delete_record(&state, "alice", 5).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
        assert_eq!(list_records(&state, "alice").unwrap().len(), 1);
    }

    #[test]
    fn clear_empties_the_shard() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        add_record(&state, "alice", input("C-1")).unwrap();
        add_record(&state, "alice", input("C-2")).unwrap();
        clear_records(&state, "alice").unwrap();
        assert!(list_records(&state, "alice").unwrap().is_empty());
    }
}
