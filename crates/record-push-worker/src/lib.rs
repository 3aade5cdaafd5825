//! Outbound push worker.
//!
//! Drives the local-to-remote direction of sync, one entity table at a
//! time: collect the locally pending rows, attempt one bulk upsert, and on
//! bulk failure fall back to strictly sequential per-row pushes. Row
//! outcomes land on the rows themselves (`synced`, or `failed` with a
//! user-facing message from the error classifier) and are aggregated into a
//! [`PushReport`] so a caller can decide whether a retry is worth
//! scheduling. Ids are parked in the shared in-flight registry around each
//! network attempt so the broadcast parser suppresses our own echoes.

mod remote;
mod report;
mod worker;

pub use remote::{RemoteError, RemoteTableWriter, RestTableClient};
pub use report::{PushFailure, PushReport};
pub use worker::{classify_remote, PushWorker, PushWorkerConfig};
