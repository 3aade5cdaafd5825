//! Broadcast transport contract.

use crate::status::ChannelConnectionState;
use hearth_core::EntityTable;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

/// The realtime channel library, as consumed by the lifecycle manager.
///
/// Implementations own the socket; the manager only sees ordered per-table
/// event streams and a connection-status feed. Events for one table arrive
/// in server order on that table's receiver; no ordering holds across
/// tables.
pub trait BroadcastTransport: Send + Sync {
    /// Open (or reopen) the event stream for one table.
    fn subscribe(&self, table: EntityTable) -> mpsc::Receiver<Value>;

    /// Stop delivering events for one table.
    fn unsubscribe(&self, table: EntityTable);

    /// Observe connection status changes.
    fn status_stream(&self) -> broadcast::Receiver<ChannelConnectionState>;
}
