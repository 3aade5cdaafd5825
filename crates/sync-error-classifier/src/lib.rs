//! Normalizes transport and storage failures into one sync error taxonomy.
//!
//! Everything the push path can trip over - socket failures, HTTP statuses,
//! JSON mapping, storage faults - collapses into [`SyncError`], which knows
//! whether automatic retry is appropriate and what to show a person. The
//! classification functions are pure: the result depends only on the
//! observable shape of the raw error, never on ambient state.

use hearth_core::EntityTable;
use hearth_store::StoreError;
use thiserror::Error;

/// A classified synchronization failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// No route to the remote at all.
    #[error("no internet connection")]
    NoInternet,

    /// The connection dropped mid-exchange.
    #[error("connection lost")]
    ConnectionLost,

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// Some other transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The server rejected the request for lack of rights.
    #[error("permission denied{}", table_suffix(.table))]
    PermissionDenied { table: Option<String> },

    /// A local row could not be serialized for the wire.
    #[error("encoding failed for {table}")]
    EncodingFailed { table: EntityTable },

    /// A remote payload could not be decoded.
    #[error("decoding failed for {table}")]
    DecodingFailed { table: EntityTable },

    /// The payload was structurally unusable.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The server answered with a non-success status.
    #[error("server error (status {status})")]
    Server { status: u16 },

    /// The server asked us to slow down.
    #[error("rate limited")]
    RateLimited,

    /// Anything we could not recognize.
    #[error("unknown sync error: {0}")]
    Unknown(String),
}

fn table_suffix(table: &Option<String>) -> String {
    match table {
        Some(t) => format!(" on {}", t),
        None => String::new(),
    }
}

impl SyncError {
    /// Whether an automatic retry is appropriate.
    ///
    /// Transport-shaped failures and throttling are transient; permission,
    /// mapping, and unrecognized failures are not and must surface instead
    /// of looping.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NoInternet | Self::ConnectionLost | Self::Timeout | Self::Network(_) => true,
            Self::RateLimited => true,
            Self::Server { status } => *status >= 500 || *status == 429,
            Self::PermissionDenied { .. }
            | Self::EncodingFailed { .. }
            | Self::DecodingFailed { .. }
            | Self::InvalidData(_)
            | Self::Unknown(_) => false,
        }
    }

    /// Message suitable for per-row display in the app.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoInternet => "You appear to be offline.".to_string(),
            Self::ConnectionLost => "The connection was interrupted.".to_string(),
            Self::Timeout => "The server took too long to respond.".to_string(),
            Self::Network(_) => "A network problem stopped the sync.".to_string(),
            Self::PermissionDenied { .. } => {
                "You don't have permission to make this change.".to_string()
            }
            Self::EncodingFailed { .. } | Self::DecodingFailed { .. } | Self::InvalidData(_) => {
                "This item couldn't be synced because its data is invalid.".to_string()
            }
            Self::Server { status } => format!("The server reported a problem ({}).", status),
            Self::RateLimited => "Syncing is paused briefly; too many requests.".to_string(),
            Self::Unknown(_) => "Something went wrong while syncing.".to_string(),
        }
    }
}

/// Classify a reqwest transport error.
pub fn classify_transport(err: &reqwest::Error) -> SyncError {
    if err.is_timeout() {
        return SyncError::Timeout;
    }
    if err.is_connect() {
        return SyncError::NoInternet;
    }
    if let Some(status) = err.status() {
        return classify_status(status.as_u16(), None);
    }
    if err.is_body() || err.is_decode() {
        return SyncError::ConnectionLost;
    }
    SyncError::Network(err.to_string())
}

/// Classify a non-success HTTP status from the remote endpoint.
pub fn classify_status(status: u16, table: Option<&str>) -> SyncError {
    match status {
        401 | 403 => SyncError::PermissionDenied {
            table: table.map(|t| t.to_string()),
        },
        429 => SyncError::RateLimited,
        other => SyncError::Server { status: other },
    }
}

/// Classify a failure to serialize a local row for the wire.
pub fn classify_encode(_err: &serde_json::Error, table: EntityTable) -> SyncError {
    SyncError::EncodingFailed { table }
}

/// Classify a failure to decode a remote payload.
pub fn classify_decode(_err: &serde_json::Error, table: EntityTable) -> SyncError {
    SyncError::DecodingFailed { table }
}

/// Classify a storage-layer fault observed on the push path.
pub fn classify_store(err: &StoreError, table: EntityTable) -> SyncError {
    match err {
        StoreError::Json(_) => SyncError::EncodingFailed { table },
        StoreError::InvalidData(reason) => SyncError::InvalidData(reason.clone()),
        other => SyncError::Unknown(other.to_string()),
    }
}

/// Fallback for error shapes nothing above recognized.
pub fn classify(err: &dyn std::error::Error) -> SyncError {
    SyncError::Unknown(err.to_string())
}
