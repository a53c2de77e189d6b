use serde::Deserialize;
use time::OffsetDateTime;

/// Client-submitted record payload, before validation. `volume` is never
/// accepted from the client; it is always recomputed.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordInput {
    pub part: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
    pub height: f64,
    pub thick: f64,
    pub length: f64,
    pub count: f64,
    /// Present when re-submitting existing rows (history snapshots); absent
    /// rows are stamped with the current time.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// A record that passed validation: sanitized text, checked numbers, derived
/// volume. Identity fields are stamped by the service layer.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub part: String,
    pub kind: String,
    pub number: String,
    pub height: f64,
    pub thick: f64,
    pub length: f64,
    pub count: f64,
    pub volume: f64,
    pub created_at: Option<OffsetDateTime>,
}
