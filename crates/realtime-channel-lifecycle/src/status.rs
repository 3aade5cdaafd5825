//! Connection-state to sync-status mapping.

use serde::{Deserialize, Serialize};

/// State of the underlying broadcast channel, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelConnectionState {
    Subscribed,
    Subscribing,
    Unsubscribing,
    Unsubscribed,
    /// The transport's event stream failed.
    StreamError,
}

/// Simplified status the rest of the app consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Ok,
    Syncing,
    Idle,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Syncing => "syncing",
            Self::Idle => "idle",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a channel connection state to the app-facing sync status.
///
/// Pure and total: the same input always yields the same output.
pub fn map_connection_state(state: ChannelConnectionState) -> SyncStatus {
    match state {
        ChannelConnectionState::Subscribed => SyncStatus::Ok,
        ChannelConnectionState::Subscribing | ChannelConnectionState::Unsubscribing => {
            SyncStatus::Syncing
        }
        ChannelConnectionState::Unsubscribed => SyncStatus::Idle,
        ChannelConnectionState::StreamError => SyncStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_matches_the_status_table() {
        assert_eq!(map_connection_state(ChannelConnectionState::Subscribed), SyncStatus::Ok);
        assert_eq!(
            map_connection_state(ChannelConnectionState::Subscribing),
            SyncStatus::Syncing
        );
        assert_eq!(
            map_connection_state(ChannelConnectionState::Unsubscribing),
            SyncStatus::Syncing
        );
        assert_eq!(
            map_connection_state(ChannelConnectionState::Unsubscribed),
            SyncStatus::Idle
        );
        assert_eq!(
            map_connection_state(ChannelConnectionState::StreamError),
            SyncStatus::Error
        );
    }

    #[test]
    fn mapping_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(map_connection_state(ChannelConnectionState::Subscribed), SyncStatus::Ok);
            assert_eq!(
                map_connection_state(ChannelConnectionState::Subscribing),
                SyncStatus::Syncing
            );
        }
    }

    #[test]
    fn sync_status_strings() {
        assert_eq!(SyncStatus::Ok.as_str(), "ok");
        assert_eq!(SyncStatus::Syncing.as_str(), "syncing");
        assert_eq!(SyncStatus::Idle.as_str(), "idle");
        assert_eq!(SyncStatus::Error.to_string(), "error");
    }
}
