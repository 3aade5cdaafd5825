//! Wire payload accessors.
//!
//! Broadcast frames look like:
//!
//! ```json
//! {
//!   "table": "tasks",
//!   "type": "insert" | "update" | "delete",
//!   "record": { ... entity fields ..., "_origin_user_id"?, "_event_version"? },
//!   "old_record": { "id": ... }   // delete only
//! }
//! ```
//!
//! Every accessor is lenient: a missing or mistyped key yields `None`,
//! never an error.

use serde_json::Value;
use uuid::Uuid;

/// The three broadcast change types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastEventType {
    Insert,
    Update,
    Delete,
}

impl BroadcastEventType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

pub(crate) fn event_table(payload: &Value) -> Option<&str> {
    payload.get("table")?.as_str()
}

pub(crate) fn event_type(payload: &Value) -> Option<BroadcastEventType> {
    BroadcastEventType::parse(payload.get("type")?.as_str()?)
}

pub(crate) fn record(payload: &Value) -> Option<&Value> {
    payload.get("record").filter(|v| v.is_object())
}

pub(crate) fn old_record(payload: &Value) -> Option<&Value> {
    payload.get("old_record").filter(|v| v.is_object())
}

/// Extract a record's id, failing closed.
///
/// A missing `id` key, a non-string value, or a malformed UUID all yield
/// `None` - never a zero identifier and never a panic.
pub fn extract_record_id(record: &Value) -> Option<Uuid> {
    Uuid::parse_str(record.get("id")?.as_str()?).ok()
}

/// The actor that produced the change, when the record carries one.
/// System-originated changes have no origin.
pub(crate) fn origin_user_id(record: &Value) -> Option<Uuid> {
    Uuid::parse_str(record.get("_origin_user_id")?.as_str()?).ok()
}

/// The event schema version tag, when present.
pub(crate) fn event_version(record: &Value) -> Option<i64> {
    record.get("_event_version")?.as_i64()
}
