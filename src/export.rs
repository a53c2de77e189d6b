//! Tabular export assembly. Builds the column projection and filename; the
//! actual spreadsheet byte format belongs to the [`SpreadsheetEncoder`]
//! collaborator supplied by the embedding process.

use lazy_static::lazy_static;
use regex::Regex;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::error::ServiceError;
use crate::records::Record;
use crate::state::AppState;

pub const EXPORT_HEADER: [&str; 11] = [
    "No.", "Part", "Type", "Number", "Height", "Thick", "Length", "Count", "Volume",
    "Created At", "Created By",
];

const ROW_TS: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const FILE_TS: &[FormatItem<'_>] =
    format_description!("[year][month][day]T[hour][minute][second]");

const MAX_FILENAME_BASE: usize = 40;

lazy_static! {
    static ref UNSAFE_FILENAME_RE: Regex = Regex::new(r#"[^A-Za-z0-9_\-]"#).unwrap();
}

/// External codec turning tabular rows into spreadsheet file bytes.
pub trait SpreadsheetEncoder: Send + Sync {
    fn extension(&self) -> &'static str;
    fn encode(&self, header: &[&str], rows: &[Vec<String>]) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Formatting a valid `OffsetDateTime` should never fail; if it ever does, a
/// blank cell or filename stamp would go unnoticed, so the failure is
/// surfaced instead.
fn format_timestamp(
    ts: OffsetDateTime,
    items: &[FormatItem<'_>],
) -> Result<String, ServiceError> {
    ts.format(items)
        .map_err(|e| ServiceError::Internal(format!("timestamp formatting failed: {e}")))
}

/// Replace filesystem-unsafe characters, truncate the base, and append a
/// sortable timestamp plus the extension. Pure so tests can pin the clock.
pub fn spreadsheet_filename(
    base: &str,
    now: OffsetDateTime,
    extension: &str,
) -> Result<String, ServiceError> {
    let safe = UNSAFE_FILENAME_RE.replace_all(base, "_");
    let truncated: String = safe.chars().take(MAX_FILENAME_BASE).collect();
    let stamp = format_timestamp(now, FILE_TS)?;
    Ok(format!("{truncated}_{stamp}.{extension}"))
}

fn row_of(seq: usize, record: &Record) -> Result<Vec<String>, ServiceError> {
    Ok(vec![
        seq.to_string(),
        record.part.clone(),
        record.kind.clone(),
        record.number.clone(),
        record.height.to_string(),
        record.thick.to_string(),
        record.length.to_string(),
        record.count.to_string(),
        format!("{:.3}", record.volume),
        format_timestamp(record.created_at, ROW_TS)?,
        record.created_by.clone(),
    ])
}

fn rows_of(records: &[Record]) -> Result<Vec<Vec<String>>, ServiceError> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| row_of(i + 1, r))
        .collect()
}

fn encode(state: &AppState, base: &str, records: &[Record]) -> Result<ExportFile, ServiceError> {
    let rows = rows_of(records)?;
    let bytes = state
        .encoder
        .encode(&EXPORT_HEADER, &rows)
        .map_err(|e| ServiceError::Internal(format!("spreadsheet encoding failed: {e}")))?;
    let filename =
        spreadsheet_filename(base, OffsetDateTime::now_utc(), state.encoder.extension())?;
    Ok(ExportFile { filename, bytes })
}

/// Export the caller's active records. An empty shard yields a header-only
/// file.
#[instrument(skip(state))]
pub fn export_records(state: &AppState, username: &str) -> Result<ExportFile, ServiceError> {
    let data = state.lock_data()?;
    let shard = crate::records::repo::shard(&data, username);
    let file = encode(state, &format!("{username}_records"), shard)?;
    info!(username, rows = shard.len(), filename = %file.filename, "records exported");
    Ok(file)
}

/// Export one of the caller's history snapshots, addressed by entry id.
#[instrument(skip(state))]
pub fn export_history(
    state: &AppState,
    username: &str,
    id: &str,
) -> Result<ExportFile, ServiceError> {
    let data = state.lock_data()?;
    let entry = crate::history::repo::shard(&data, username)
        .iter()
        .find(|e| e.id == id)
        .ok_or(ServiceError::NotFound)?;
    let file = encode(state, &entry.name, &entry.records)?;
    info!(username, id, rows = entry.records.len(), filename = %file.filename, "history exported");
    Ok(file)
}

#[cfg(test)]
pub mod testing {
    use super::SpreadsheetEncoder;

    /// Tab-separated fake so tests can assert on cell content.
    #[derive(Debug, Clone)]
    pub struct TsvEncoder;

    impl SpreadsheetEncoder for TsvEncoder {
        fn extension(&self) -> &'static str {
            "tsv"
        }

        fn encode(&self, header: &[&str], rows: &[Vec<String>]) -> anyhow::Result<Vec<u8>> {
            let mut out = header.join("\t");
            for row in rows {
                out.push('\n');
                out.push_str(&row.join("\t"));
            }
            Ok(out.into_bytes())
        }
    }
}
