//! Core types for the Hearth sync engine.
//!
//! This crate holds the entity records and wire DTOs shared by the sync
//! crates, the sync-state machine, the in-flight registry used to suppress
//! echoes of outbound pushes, and the collaborator contracts (identity,
//! execution mode) the engine consumes but does not implement.

pub mod config;
pub mod dto;
pub mod entities;
pub mod identity;
pub mod inflight;
pub mod logging;
pub mod work_item;

pub use config::Config;
pub use dto::{
    ActivityDto, ListingDto, NoteDto, PropertyDto, TaskDto, UserDto, DEFAULT_COUNTRY,
    EVENT_VERSION,
};
pub use entities::{
    Activity, ActivityKind, EntityTable, Listing, ListingStatus, Note, Property, SyncState, Task,
    User,
};
pub use identity::{ExecutionMode, IdentityProvider, StaticIdentity};
pub use inflight::{InFlightGuard, InFlightRegistry};
pub use work_item::{ActivitySnapshot, TaskSnapshot, WorkItem};
