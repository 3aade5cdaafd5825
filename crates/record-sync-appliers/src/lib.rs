//! Inbound record appliers.
//!
//! One applier per entity kind, all with the same contract: given a remote
//! DTO and the store connection, insert the row as `synced` when it is new,
//! replace it wholesale when the local copy is `synced`, and leave it
//! completely untouched when the local copy is dirty. Soft deletes and
//! resurrections ride the same path - `deleted_at` is just another mapped
//! field, so the dirty guard covers it uniformly.
//!
//! Appliers run inside the store's serialized confinement and never touch
//! the network. Storage faults propagate raw; classification happens on the
//! outbound path.

mod apply;
mod conflict;

pub use apply::{
    apply_activity, apply_delete, apply_listing, apply_note, apply_property, apply_task,
    apply_user, ApplyOutcome,
};
pub use conflict::ConflictDecision;
