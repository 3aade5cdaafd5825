//! Collaborator contracts supplied by the host application.

use uuid::Uuid;

/// Source of the current actor's identity.
///
/// Implemented by the auth/session component. The broadcast parser uses this
/// to drop self-echoes; the push worker stamps outbound rows with it.
pub trait IdentityProvider: Send + Sync {
    /// Returns the signed-in user's id, or `None` when signed out.
    fn current_user_id(&self) -> Option<Uuid>;
}

/// Fixed identity, for hosts with a single resolved session and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticIdentity(pub Option<Uuid>);

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<Uuid> {
        self.0
    }
}

/// How the process is being executed.
///
/// Under `Test` and `Preview` the channel manager reports a deterministic
/// idle status instead of opening real subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Production,
    Test,
    Preview,
}

impl ExecutionMode {
    /// Whether real network subscriptions should be opened.
    pub fn subscribes_to_realtime(&self) -> bool {
        matches!(self, Self::Production)
    }
}
