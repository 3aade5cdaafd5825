//! Local persistent store for the Hearth sync engine.
//!
//! SQLite behind a dedicated executor thread. Every read and write goes
//! through [`Store::call`], which serializes all store access on one
//! background thread - the single confinement the sync engine's
//! local-authoritative guard depends on.

mod error;
mod executor;
pub mod migrations;
pub mod queries;

pub use error::{StoreError, StoreResult};
pub use executor::Store;
pub use queries::{PendingRow, PushCursor};
