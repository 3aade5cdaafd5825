//! Conflict policy: whole-entity, state-based, local-authoritative.

use hearth_core::SyncState;

/// What to do with an inbound update for an existing row.
///
/// The decision is a pure function of the local row's sync state. A dirty
/// row (pending or failed) wins the whole entity; there is no field-level
/// merge and no timestamp tie-breaking. An in-progress local edit can never
/// be silently overwritten by a racing remote update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Replace every mapped field from the remote DTO.
    ApplyRemote,
    /// Ignore the inbound update entirely.
    KeepLocal,
}

impl ConflictDecision {
    pub fn for_state(state: SyncState) -> Self {
        if state.is_dirty() {
            Self::KeepLocal
        } else {
            Self::ApplyRemote
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_states_keep_local() {
        assert_eq!(
            ConflictDecision::for_state(SyncState::Pending),
            ConflictDecision::KeepLocal
        );
        assert_eq!(
            ConflictDecision::for_state(SyncState::Failed),
            ConflictDecision::KeepLocal
        );
    }

    #[test]
    fn synced_state_applies_remote() {
        assert_eq!(
            ConflictDecision::for_state(SyncState::Synced),
            ConflictDecision::ApplyRemote
        );
    }
}
