//! Entity records stored in the local database.
//!
//! Every synchronizable entity carries the same bookkeeping columns on top
//! of its own fields: audit timestamps, an optional soft-delete marker, and
//! the sync state that drives the local-authoritative conflict policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-row synchronization state.
///
/// `Pending` marks a local edit the server has not confirmed; `Failed` marks
/// a push that errored. Rows in either state are owned by the local device
/// and are never overwritten by inbound remote data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Synced,
    Pending,
    Failed,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::Synced
    }
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => Self::Pending,
            "failed" => Self::Failed,
            _ => Self::Synced,
        }
    }

    /// A dirty row has unconfirmed local content and wins every conflict.
    pub fn is_dirty(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

/// The synchronized tables, in wire naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityTable {
    Tasks,
    Activities,
    Listings,
    Properties,
    Users,
    Notes,
}

impl EntityTable {
    /// All synchronized tables, in subscription order.
    pub const ALL: [EntityTable; 6] = [
        EntityTable::Tasks,
        EntityTable::Activities,
        EntityTable::Listings,
        EntityTable::Properties,
        EntityTable::Users,
        EntityTable::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Activities => "activities",
            Self::Listings => "listings",
            Self::Properties => "properties",
            Self::Users => "users",
            Self::Notes => "notes",
        }
    }

    /// Parses a wire table name. Unknown names yield `None` rather than a
    /// fallback so malformed events are dropped, not misrouted.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tasks" => Some(Self::Tasks),
            "activities" => Some(Self::Activities),
            "listings" => Some(Self::Listings),
            "properties" => Some(Self::Properties),
            "users" => Some(Self::Users),
            "notes" => Some(Self::Notes),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Listing lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    UnderOffer,
    Closed,
}

impl Default for ListingStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::UnderOffer => "under_offer",
            Self::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "under_offer" => Self::UnderOffer,
            "closed" => Self::Closed,
            _ => Self::Active,
        }
    }
}

/// Kind of a logged activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Call,
    Email,
    Showing,
    FollowUp,
}

impl Default for ActivityKind {
    fn default() -> Self {
        Self::FollowUp
    }
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Email => "email",
            Self::Showing => "showing",
            Self::FollowUp => "follow_up",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "call" => Self::Call,
            "email" => Self::Email,
            "showing" => Self::Showing,
            _ => Self::FollowUp,
        }
    }
}

/// A property record - a physical address a listing can point at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub id: Uuid,
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    #[serde(skip_serializing)]
    pub sync_state: SyncState,
    #[serde(skip_serializing)]
    pub last_sync_error: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A listing record. `property_id` is nullified (never cascaded) when the
/// referenced property is hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub status: ListingStatus,
    pub price_cents: Option<i64>,
    pub property_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub sync_state: SyncState,
    #[serde(skip_serializing)]
    pub last_sync_error: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub details: String,
    pub due_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub listing_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub sync_state: SyncState,
    #[serde(skip_serializing)]
    pub last_sync_error: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An activity record - a scheduled or logged touchpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub subject: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub listing_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub sync_state: SyncState,
    #[serde(skip_serializing)]
    pub last_sync_error: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user record - a household member or collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing)]
    pub sync_state: SyncState,
    #[serde(skip_serializing)]
    pub last_sync_error: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A note record, optionally attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: Uuid,
    pub body: String,
    pub pinned: bool,
    pub task_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub sync_state: SyncState,
    #[serde(skip_serializing)]
    pub last_sync_error: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task from a local user action. Locally created rows start
    /// `pending` until the push worker confirms them.
    pub fn new_local(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            details: String::new(),
            due_at: None,
            completed_at: None,
            listing_id: None,
            assignee_id: None,
            sync_state: SyncState::Pending,
            last_sync_error: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Property {
    /// Creates a property from a local user action (starts `pending`).
    pub fn new_local(address_line1: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            address_line1: address_line1.into(),
            address_line2: String::new(),
            city: String::new(),
            postal_code: String::new(),
            country: crate::dto::DEFAULT_COUNTRY.to_string(),
            sync_state: SyncState::Pending,
            last_sync_error: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
