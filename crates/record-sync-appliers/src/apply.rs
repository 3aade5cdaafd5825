//! The per-entity upsert appliers.

use crate::conflict::ConflictDecision;
use chrono::{DateTime, Utc};
use hearth_core::{
    Activity, ActivityDto, EntityTable, Listing, ListingDto, Note, NoteDto, Property, PropertyDto,
    SyncState, Task, TaskDto, User, UserDto,
};
use hearth_store::{queries, StoreResult};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

/// What an applier did with an inbound DTO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// No local row existed; inserted as `synced`.
    Inserted,
    /// A synced local row was fully replaced.
    Replaced,
    /// The local row is pending/failed and was left untouched.
    SkippedDirty,
}

fn audit_times(
    dto_created: Option<DateTime<Utc>>,
    dto_updated: Option<DateTime<Utc>>,
    existing_created: Option<DateTime<Utc>>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    let created = dto_created.or(existing_created).unwrap_or(now);
    let updated = dto_updated.unwrap_or(now);
    (created, updated)
}

/// Apply an inbound property DTO.
pub fn apply_property(conn: &Connection, dto: &PropertyDto) -> StoreResult<ApplyOutcome> {
    let existing = queries::get_property(conn, dto.id)?;
    match decide(EntityTable::Properties, dto.id, existing.as_ref().map(|r| r.sync_state)) {
        Some(ConflictDecision::KeepLocal) => Ok(ApplyOutcome::SkippedDirty),
        decision => {
            let (created_at, updated_at) = audit_times(
                dto.created_at,
                dto.updated_at,
                existing.as_ref().map(|r| r.created_at),
            );
            let record = Property {
                id: dto.id,
                address_line1: dto.address_line1.clone(),
                address_line2: dto.address_line2.clone(),
                city: dto.city.clone(),
                postal_code: dto.postal_code.clone(),
                country: dto.country.clone(),
                sync_state: SyncState::Synced,
                last_sync_error: None,
                deleted_at: dto.deleted_at,
                created_at,
                updated_at,
            };
            queries::upsert_property(conn, &record)?;
            Ok(outcome(decision))
        }
    }
}

/// Apply an inbound listing DTO.
pub fn apply_listing(conn: &Connection, dto: &ListingDto) -> StoreResult<ApplyOutcome> {
    let existing = queries::get_listing(conn, dto.id)?;
    match decide(EntityTable::Listings, dto.id, existing.as_ref().map(|r| r.sync_state)) {
        Some(ConflictDecision::KeepLocal) => Ok(ApplyOutcome::SkippedDirty),
        decision => {
            let (created_at, updated_at) = audit_times(
                dto.created_at,
                dto.updated_at,
                existing.as_ref().map(|r| r.created_at),
            );
            let record = Listing {
                id: dto.id,
                title: dto.title.clone(),
                status: dto.status,
                price_cents: dto.price_cents,
                property_id: dto.property_id,
                sync_state: SyncState::Synced,
                last_sync_error: None,
                deleted_at: dto.deleted_at,
                created_at,
                updated_at,
            };
            queries::upsert_listing(conn, &record)?;
            Ok(outcome(decision))
        }
    }
}

/// Apply an inbound task DTO.
pub fn apply_task(conn: &Connection, dto: &TaskDto) -> StoreResult<ApplyOutcome> {
    let existing = queries::get_task(conn, dto.id)?;
    match decide(EntityTable::Tasks, dto.id, existing.as_ref().map(|r| r.sync_state)) {
        Some(ConflictDecision::KeepLocal) => Ok(ApplyOutcome::SkippedDirty),
        decision => {
            let (created_at, updated_at) = audit_times(
                dto.created_at,
                dto.updated_at,
                existing.as_ref().map(|r| r.created_at),
            );
            let record = Task {
                id: dto.id,
                title: dto.title.clone(),
                details: dto.details.clone(),
                due_at: dto.due_at,
                completed_at: dto.completed_at,
                listing_id: dto.listing_id,
                assignee_id: dto.assignee_id,
                sync_state: SyncState::Synced,
                last_sync_error: None,
                deleted_at: dto.deleted_at,
                created_at,
                updated_at,
            };
            queries::upsert_task(conn, &record)?;
            Ok(outcome(decision))
        }
    }
}

/// Apply an inbound activity DTO.
pub fn apply_activity(conn: &Connection, dto: &ActivityDto) -> StoreResult<ApplyOutcome> {
    let existing = queries::get_activity(conn, dto.id)?;
    match decide(EntityTable::Activities, dto.id, existing.as_ref().map(|r| r.sync_state)) {
        Some(ConflictDecision::KeepLocal) => Ok(ApplyOutcome::SkippedDirty),
        decision => {
            let (created_at, updated_at) = audit_times(
                dto.created_at,
                dto.updated_at,
                existing.as_ref().map(|r| r.created_at),
            );
            let record = Activity {
                id: dto.id,
                kind: dto.kind,
                subject: dto.subject.clone(),
                scheduled_at: dto.scheduled_at,
                listing_id: dto.listing_id,
                sync_state: SyncState::Synced,
                last_sync_error: None,
                deleted_at: dto.deleted_at,
                created_at,
                updated_at,
            };
            queries::upsert_activity(conn, &record)?;
            Ok(outcome(decision))
        }
    }
}

/// Apply an inbound user DTO.
pub fn apply_user(conn: &Connection, dto: &UserDto) -> StoreResult<ApplyOutcome> {
    let existing = queries::get_user(conn, dto.id)?;
    match decide(EntityTable::Users, dto.id, existing.as_ref().map(|r| r.sync_state)) {
        Some(ConflictDecision::KeepLocal) => Ok(ApplyOutcome::SkippedDirty),
        decision => {
            let (created_at, updated_at) = audit_times(
                dto.created_at,
                dto.updated_at,
                existing.as_ref().map(|r| r.created_at),
            );
            let record = User {
                id: dto.id,
                display_name: dto.display_name.clone(),
                email: dto.email.clone(),
                avatar_url: dto.avatar_url.clone(),
                sync_state: SyncState::Synced,
                last_sync_error: None,
                deleted_at: dto.deleted_at,
                created_at,
                updated_at,
            };
            queries::upsert_user(conn, &record)?;
            Ok(outcome(decision))
        }
    }
}

/// Apply an inbound note DTO.
pub fn apply_note(conn: &Connection, dto: &NoteDto) -> StoreResult<ApplyOutcome> {
    let existing = queries::get_note(conn, dto.id)?;
    match decide(EntityTable::Notes, dto.id, existing.as_ref().map(|r| r.sync_state)) {
        Some(ConflictDecision::KeepLocal) => Ok(ApplyOutcome::SkippedDirty),
        decision => {
            let (created_at, updated_at) = audit_times(
                dto.created_at,
                dto.updated_at,
                existing.as_ref().map(|r| r.created_at),
            );
            let record = Note {
                id: dto.id,
                body: dto.body.clone(),
                pinned: dto.pinned,
                task_id: dto.task_id,
                sync_state: SyncState::Synced,
                last_sync_error: None,
                deleted_at: dto.deleted_at,
                created_at,
                updated_at,
            };
            queries::upsert_note(conn, &record)?;
            Ok(outcome(decision))
        }
    }
}

/// Apply an inbound hard delete.
///
/// Nullifies relationship columns on dependents and removes the row. A
/// delete carries no field content, only identity, so there is nothing for
/// the dirty guard to protect.
pub fn apply_delete(conn: &Connection, table: EntityTable, id: Uuid) -> StoreResult<bool> {
    queries::hard_delete(conn, table, id)
}

/// Resolve the conflict decision for an inbound upsert, logging skips.
/// `None` means no local row exists (plain insert).
fn decide(
    table: EntityTable,
    id: Uuid,
    existing_state: Option<SyncState>,
) -> Option<ConflictDecision> {
    let state = existing_state?;
    let decision = ConflictDecision::for_state(state);
    if decision == ConflictDecision::KeepLocal {
        debug!(
            table = %table,
            id = %id,
            sync_state = state.as_str(),
            "Inbound update ignored (local row is dirty)"
        );
    }
    Some(decision)
}

fn outcome(decision: Option<ConflictDecision>) -> ApplyOutcome {
    match decision {
        None => ApplyOutcome::Inserted,
        Some(_) => ApplyOutcome::Replaced,
    }
}
