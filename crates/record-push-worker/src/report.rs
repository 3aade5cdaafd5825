//! Aggregated push results.

use hearth_core::EntityTable;
use sync_error_classifier::SyncError;
use uuid::Uuid;

/// One row that failed to push, with its classified error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushFailure {
    pub id: Uuid,
    pub error: SyncError,
}

impl PushFailure {
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Outcome of one push sweep for one table.
///
/// `success_count + failure_count == attempted` always holds; failures keep
/// push order.
#[derive(Debug, Clone)]
pub struct PushReport {
    pub table: EntityTable,
    pub attempted: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub failures: Vec<PushFailure>,
    /// Whether the bulk call failed and the per-row fallback ran.
    pub used_fallback: bool,
}

impl PushReport {
    /// A sweep that found nothing to push.
    pub fn empty(table: EntityTable) -> Self {
        Self {
            table,
            attempted: 0,
            success_count: 0,
            failure_count: 0,
            failures: Vec::new(),
            used_fallback: false,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }

    /// Failures worth scheduling an automatic retry for.
    pub fn retryable_failures(&self) -> Vec<&PushFailure> {
        self.failures.iter().filter(|f| f.is_retryable()).collect()
    }

    /// Failures that must surface to the user instead of retrying.
    pub fn fatal_failures(&self) -> Vec<&PushFailure> {
        self.failures.iter().filter(|f| !f.is_retryable()).collect()
    }

    /// Whether any failure justifies a backoff-scheduled retry.
    pub fn should_retry(&self) -> bool {
        !self.retryable_failures().is_empty()
    }
}
