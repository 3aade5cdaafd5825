//! Standalone query functions that work with any Connection.
//!
//! Each function takes a `&Connection` as its first parameter and is meant
//! to run inside [`crate::Store::call`], on the store's executor thread.

use crate::StoreResult;
use chrono::{DateTime, Utc};
use hearth_core::{
    Activity, ActivityKind, EntityTable, Listing, ListingStatus, Note, Property, SyncState, Task,
    User,
};
use rusqlite::{params, Connection, Row};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// A locally pending row projected to its wire payload.
///
/// The payload is the serialized record without the local-only bookkeeping
/// columns, ready for the remote upsert endpoint.
#[derive(Debug, Clone)]
pub struct PendingRow {
    pub id: Uuid,
    pub payload: Value,
}

/// Outbound retry bookkeeping for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushCursor {
    pub table: EntityTable,
    pub retry_count: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

// ==========================================
// Properties
// ==========================================

/// Insert or fully replace a property row.
pub fn upsert_property(conn: &Connection, property: &Property) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO properties (id, address_line1, address_line2, city, postal_code, country,
                                 sync_state, last_sync_error, deleted_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
             address_line1 = excluded.address_line1,
             address_line2 = excluded.address_line2,
             city = excluded.city,
             postal_code = excluded.postal_code,
             country = excluded.country,
             sync_state = excluded.sync_state,
             last_sync_error = excluded.last_sync_error,
             deleted_at = excluded.deleted_at,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            property.id.to_string(),
            property.address_line1,
            property.address_line2,
            property.city,
            property.postal_code,
            property.country,
            property.sync_state.as_str(),
            property.last_sync_error,
            property.deleted_at.map(|t| t.to_rfc3339()),
            property.created_at.to_rfc3339(),
            property.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Get a property by ID.
pub fn get_property(conn: &Connection, id: Uuid) -> StoreResult<Option<Property>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, address_line1, address_line2, city, postal_code, country,
                sync_state, last_sync_error, deleted_at, created_at, updated_at
         FROM properties WHERE id = ?1",
    )?;
    let result = stmt.query_row(params![id.to_string()], map_property_row);
    optional(result)
}

fn map_property_row(row: &Row<'_>) -> rusqlite::Result<Property> {
    Ok(Property {
        id: parse_uuid(0, row.get(0)?)?,
        address_line1: row.get(1)?,
        address_line2: row.get(2)?,
        city: row.get(3)?,
        postal_code: row.get(4)?,
        country: row.get(5)?,
        sync_state: SyncState::from_str(&row.get::<_, String>(6)?),
        last_sync_error: row.get(7)?,
        deleted_at: parse_datetime_opt(row.get(8)?),
        created_at: parse_datetime(row.get::<_, String>(9)?),
        updated_at: parse_datetime(row.get::<_, String>(10)?),
    })
}

// ==========================================
// Listings
// ==========================================

/// Insert or fully replace a listing row.
pub fn upsert_listing(conn: &Connection, listing: &Listing) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO listings (id, title, status, price_cents, property_id,
                               sync_state, last_sync_error, deleted_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             status = excluded.status,
             price_cents = excluded.price_cents,
             property_id = excluded.property_id,
             sync_state = excluded.sync_state,
             last_sync_error = excluded.last_sync_error,
             deleted_at = excluded.deleted_at,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            listing.id.to_string(),
            listing.title,
            listing.status.as_str(),
            listing.price_cents,
            listing.property_id.map(|id| id.to_string()),
            listing.sync_state.as_str(),
            listing.last_sync_error,
            listing.deleted_at.map(|t| t.to_rfc3339()),
            listing.created_at.to_rfc3339(),
            listing.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Get a listing by ID.
pub fn get_listing(conn: &Connection, id: Uuid) -> StoreResult<Option<Listing>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, title, status, price_cents, property_id,
                sync_state, last_sync_error, deleted_at, created_at, updated_at
         FROM listings WHERE id = ?1",
    )?;
    let result = stmt.query_row(params![id.to_string()], map_listing_row);
    optional(result)
}

fn map_listing_row(row: &Row<'_>) -> rusqlite::Result<Listing> {
    Ok(Listing {
        id: parse_uuid(0, row.get(0)?)?,
        title: row.get(1)?,
        status: ListingStatus::from_str(&row.get::<_, String>(2)?),
        price_cents: row.get(3)?,
        property_id: parse_uuid_opt(4, row.get(4)?)?,
        sync_state: SyncState::from_str(&row.get::<_, String>(5)?),
        last_sync_error: row.get(6)?,
        deleted_at: parse_datetime_opt(row.get(7)?),
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

// ==========================================
// Tasks
// ==========================================

/// Insert or fully replace a task row.
pub fn upsert_task(conn: &Connection, task: &Task) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO tasks (id, title, details, due_at, completed_at, listing_id, assignee_id,
                            sync_state, last_sync_error, deleted_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             details = excluded.details,
             due_at = excluded.due_at,
             completed_at = excluded.completed_at,
             listing_id = excluded.listing_id,
             assignee_id = excluded.assignee_id,
             sync_state = excluded.sync_state,
             last_sync_error = excluded.last_sync_error,
             deleted_at = excluded.deleted_at,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            task.id.to_string(),
            task.title,
            task.details,
            task.due_at.map(|t| t.to_rfc3339()),
            task.completed_at.map(|t| t.to_rfc3339()),
            task.listing_id.map(|id| id.to_string()),
            task.assignee_id.map(|id| id.to_string()),
            task.sync_state.as_str(),
            task.last_sync_error,
            task.deleted_at.map(|t| t.to_rfc3339()),
            task.created_at.to_rfc3339(),
            task.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Get a task by ID.
pub fn get_task(conn: &Connection, id: Uuid) -> StoreResult<Option<Task>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, title, details, due_at, completed_at, listing_id, assignee_id,
                sync_state, last_sync_error, deleted_at, created_at, updated_at
         FROM tasks WHERE id = ?1",
    )?;
    let result = stmt.query_row(params![id.to_string()], map_task_row);
    optional(result)
}

fn map_task_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: parse_uuid(0, row.get(0)?)?,
        title: row.get(1)?,
        details: row.get(2)?,
        due_at: parse_datetime_opt(row.get(3)?),
        completed_at: parse_datetime_opt(row.get(4)?),
        listing_id: parse_uuid_opt(5, row.get(5)?)?,
        assignee_id: parse_uuid_opt(6, row.get(6)?)?,
        sync_state: SyncState::from_str(&row.get::<_, String>(7)?),
        last_sync_error: row.get(8)?,
        deleted_at: parse_datetime_opt(row.get(9)?),
        created_at: parse_datetime(row.get::<_, String>(10)?),
        updated_at: parse_datetime(row.get::<_, String>(11)?),
    })
}

// ==========================================
// Activities
// ==========================================

/// Insert or fully replace an activity row.
pub fn upsert_activity(conn: &Connection, activity: &Activity) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO activities (id, kind, subject, scheduled_at, listing_id,
                                 sync_state, last_sync_error, deleted_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
             kind = excluded.kind,
             subject = excluded.subject,
             scheduled_at = excluded.scheduled_at,
             listing_id = excluded.listing_id,
             sync_state = excluded.sync_state,
             last_sync_error = excluded.last_sync_error,
             deleted_at = excluded.deleted_at,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            activity.id.to_string(),
            activity.kind.as_str(),
            activity.subject,
            activity.scheduled_at.map(|t| t.to_rfc3339()),
            activity.listing_id.map(|id| id.to_string()),
            activity.sync_state.as_str(),
            activity.last_sync_error,
            activity.deleted_at.map(|t| t.to_rfc3339()),
            activity.created_at.to_rfc3339(),
            activity.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Get an activity by ID.
pub fn get_activity(conn: &Connection, id: Uuid) -> StoreResult<Option<Activity>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, kind, subject, scheduled_at, listing_id,
                sync_state, last_sync_error, deleted_at, created_at, updated_at
         FROM activities WHERE id = ?1",
    )?;
    let result = stmt.query_row(params![id.to_string()], map_activity_row);
    optional(result)
}

fn map_activity_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: parse_uuid(0, row.get(0)?)?,
        kind: ActivityKind::from_str(&row.get::<_, String>(1)?),
        subject: row.get(2)?,
        scheduled_at: parse_datetime_opt(row.get(3)?),
        listing_id: parse_uuid_opt(4, row.get(4)?)?,
        sync_state: SyncState::from_str(&row.get::<_, String>(5)?),
        last_sync_error: row.get(6)?,
        deleted_at: parse_datetime_opt(row.get(7)?),
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

// ==========================================
// Users
// ==========================================

/// Insert or fully replace a user row.
pub fn upsert_user(conn: &Connection, user: &User) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO users (id, display_name, email, avatar_url,
                            sync_state, last_sync_error, deleted_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
             display_name = excluded.display_name,
             email = excluded.email,
             avatar_url = excluded.avatar_url,
             sync_state = excluded.sync_state,
             last_sync_error = excluded.last_sync_error,
             deleted_at = excluded.deleted_at,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            user.id.to_string(),
            user.display_name,
            user.email,
            user.avatar_url,
            user.sync_state.as_str(),
            user.last_sync_error,
            user.deleted_at.map(|t| t.to_rfc3339()),
            user.created_at.to_rfc3339(),
            user.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Get a user by ID.
pub fn get_user(conn: &Connection, id: Uuid) -> StoreResult<Option<User>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, display_name, email, avatar_url,
                sync_state, last_sync_error, deleted_at, created_at, updated_at
         FROM users WHERE id = ?1",
    )?;
    let result = stmt.query_row(params![id.to_string()], map_user_row);
    optional(result)
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(0, row.get(0)?)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        avatar_url: row.get(3)?,
        sync_state: SyncState::from_str(&row.get::<_, String>(4)?),
        last_sync_error: row.get(5)?,
        deleted_at: parse_datetime_opt(row.get(6)?),
        created_at: parse_datetime(row.get::<_, String>(7)?),
        updated_at: parse_datetime(row.get::<_, String>(8)?),
    })
}

// ==========================================
// Notes
// ==========================================

/// Insert or fully replace a note row.
pub fn upsert_note(conn: &Connection, note: &Note) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO notes (id, body, pinned, task_id,
                            sync_state, last_sync_error, deleted_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
             body = excluded.body,
             pinned = excluded.pinned,
             task_id = excluded.task_id,
             sync_state = excluded.sync_state,
             last_sync_error = excluded.last_sync_error,
             deleted_at = excluded.deleted_at,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            note.id.to_string(),
            note.body,
            note.pinned,
            note.task_id.map(|id| id.to_string()),
            note.sync_state.as_str(),
            note.last_sync_error,
            note.deleted_at.map(|t| t.to_rfc3339()),
            note.created_at.to_rfc3339(),
            note.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Get a note by ID.
pub fn get_note(conn: &Connection, id: Uuid) -> StoreResult<Option<Note>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, body, pinned, task_id,
                sync_state, last_sync_error, deleted_at, created_at, updated_at
         FROM notes WHERE id = ?1",
    )?;
    let result = stmt.query_row(params![id.to_string()], map_note_row);
    optional(result)
}

fn map_note_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: parse_uuid(0, row.get(0)?)?,
        body: row.get(1)?,
        pinned: row.get(2)?,
        task_id: parse_uuid_opt(3, row.get(3)?)?,
        sync_state: SyncState::from_str(&row.get::<_, String>(4)?),
        last_sync_error: row.get(5)?,
        deleted_at: parse_datetime_opt(row.get(6)?),
        created_at: parse_datetime(row.get::<_, String>(7)?),
        updated_at: parse_datetime(row.get::<_, String>(8)?),
    })
}

// ==========================================
// Cross-table sync bookkeeping
// ==========================================

/// Collect locally pending rows for one table, oldest edit first, projected
/// to their wire payloads.
pub fn collect_pending(
    conn: &Connection,
    table: EntityTable,
    limit: usize,
) -> StoreResult<Vec<PendingRow>> {
    fn project<T: serde::Serialize>(id: Uuid, record: &T) -> StoreResult<PendingRow> {
        Ok(PendingRow {
            id,
            payload: serde_json::to_value(record)?,
        })
    }

    let sql = format!(
        "SELECT id FROM {} WHERE sync_state = 'pending' ORDER BY updated_at ASC LIMIT ?1",
        table.as_str()
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids: Vec<Uuid> = stmt
        .query_map(params![limit as i64], |row| {
            parse_uuid(0, row.get::<_, String>(0)?)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let pending = match table {
            EntityTable::Tasks => get_task(conn, id)?.map(|r| project(id, &r)),
            EntityTable::Activities => get_activity(conn, id)?.map(|r| project(id, &r)),
            EntityTable::Listings => get_listing(conn, id)?.map(|r| project(id, &r)),
            EntityTable::Properties => get_property(conn, id)?.map(|r| project(id, &r)),
            EntityTable::Users => get_user(conn, id)?.map(|r| project(id, &r)),
            EntityTable::Notes => get_note(conn, id)?.map(|r| project(id, &r)),
        };
        if let Some(row) = pending {
            rows.push(row?);
        }
    }

    debug!(table = %table, count = rows.len(), "Collected pending rows");
    Ok(rows)
}

/// Mark a row confirmed by the server.
pub fn mark_row_synced(conn: &Connection, table: EntityTable, id: Uuid) -> StoreResult<bool> {
    let sql = format!(
        "UPDATE {} SET sync_state = 'synced', last_sync_error = NULL WHERE id = ?1",
        table.as_str()
    );
    let count = conn.execute(&sql, params![id.to_string()])?;
    Ok(count > 0)
}

/// Mark a row locally edited and awaiting push.
pub fn mark_row_pending(conn: &Connection, table: EntityTable, id: Uuid) -> StoreResult<bool> {
    let sql = format!(
        "UPDATE {} SET sync_state = 'pending', last_sync_error = NULL, updated_at = ?2 WHERE id = ?1",
        table.as_str()
    );
    let count = conn.execute(&sql, params![id.to_string(), Utc::now().to_rfc3339()])?;
    Ok(count > 0)
}

/// Record a failed push on a row, with the user-facing error message.
pub fn mark_row_failed(
    conn: &Connection,
    table: EntityTable,
    id: Uuid,
    message: &str,
) -> StoreResult<bool> {
    let sql = format!(
        "UPDATE {} SET sync_state = 'failed', last_sync_error = ?2 WHERE id = ?1",
        table.as_str()
    );
    let count = conn.execute(&sql, params![id.to_string(), message])?;
    Ok(count > 0)
}

/// Hard-delete a row, nullifying relationship columns on dependents.
///
/// Dependents survive the delete: a listing whose property goes away keeps
/// everything except its property reference, and so on down the map.
pub fn hard_delete(conn: &Connection, table: EntityTable, id: Uuid) -> StoreResult<bool> {
    let id_text = id.to_string();

    match table {
        EntityTable::Properties => {
            conn.execute(
                "UPDATE listings SET property_id = NULL WHERE property_id = ?1",
                params![id_text],
            )?;
        }
        EntityTable::Listings => {
            conn.execute(
                "UPDATE tasks SET listing_id = NULL WHERE listing_id = ?1",
                params![id_text],
            )?;
            conn.execute(
                "UPDATE activities SET listing_id = NULL WHERE listing_id = ?1",
                params![id_text],
            )?;
        }
        EntityTable::Tasks => {
            conn.execute(
                "UPDATE notes SET task_id = NULL WHERE task_id = ?1",
                params![id_text],
            )?;
        }
        EntityTable::Users => {
            conn.execute(
                "UPDATE tasks SET assignee_id = NULL WHERE assignee_id = ?1",
                params![id_text],
            )?;
        }
        EntityTable::Activities | EntityTable::Notes => {}
    }

    let sql = format!("DELETE FROM {} WHERE id = ?1", table.as_str());
    let count = conn.execute(&sql, params![id_text])?;
    debug!(table = %table, id = %id, deleted = count > 0, "Hard delete");
    Ok(count > 0)
}

// ==========================================
// Push cursors
// ==========================================

/// Get the push cursor for a table, if any attempt has been recorded.
pub fn get_push_cursor(conn: &Connection, table: EntityTable) -> StoreResult<Option<PushCursor>> {
    let mut stmt = conn.prepare_cached(
        "SELECT retry_count, last_attempt_at, last_error FROM push_cursors WHERE table_name = ?1",
    )?;
    let result = stmt.query_row(params![table.as_str()], |row| {
        Ok(PushCursor {
            table,
            retry_count: row.get(0)?,
            last_attempt_at: parse_datetime_opt(row.get(1)?),
            last_error: row.get(2)?,
        })
    });
    optional(result)
}

/// Record a successful push sweep for a table (resets retry state).
pub fn record_push_success(conn: &Connection, table: EntityTable) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO push_cursors (table_name, retry_count, last_attempt_at, last_error)
         VALUES (?1, 0, ?2, NULL)
         ON CONFLICT(table_name) DO UPDATE SET
             retry_count = 0,
             last_attempt_at = excluded.last_attempt_at,
             last_error = NULL",
        params![table.as_str(), Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Record a failed push sweep for a table (increments retry count).
pub fn record_push_failure(conn: &Connection, table: EntityTable, error: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO push_cursors (table_name, retry_count, last_attempt_at, last_error)
         VALUES (?1, 1, ?2, ?3)
         ON CONFLICT(table_name) DO UPDATE SET
             retry_count = push_cursors.retry_count + 1,
             last_attempt_at = excluded.last_attempt_at,
             last_error = excluded.last_error",
        params![table.as_str(), Utc::now().to_rfc3339(), error],
    )?;
    Ok(())
}

// ==========================================
// Row mapping helpers
// ==========================================

fn optional<T>(result: Result<T, rusqlite::Error>) -> StoreResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_uuid(idx: usize, s: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_uuid_opt(idx: usize, s: Option<String>) -> rusqlite::Result<Option<Uuid>> {
    s.map(|s| parse_uuid(idx, s)).transpose()
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(parse_datetime)
}

/// Count rows in a table (test and diagnostics helper).
pub fn count_rows(conn: &Connection, table: EntityTable) -> StoreResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
    let count = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        conn
    }

    fn sample_property() -> Property {
        let now = Utc::now();
        Property {
            id: Uuid::new_v4(),
            address_line1: "123 Main St".to_string(),
            address_line2: String::new(),
            city: "Portland".to_string(),
            postal_code: "97201".to_string(),
            country: "US".to_string(),
            sync_state: SyncState::Synced,
            last_sync_error: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_listing(property_id: Option<Uuid>) -> Listing {
        let now = Utc::now();
        Listing {
            id: Uuid::new_v4(),
            title: "Craftsman with porch".to_string(),
            status: ListingStatus::Active,
            price_cents: Some(55_000_000),
            property_id,
            sync_state: SyncState::Synced,
            last_sync_error: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_task() -> Task {
        Task::new_local("Call the inspector")
    }

    // =========================================================================
    // Upsert / get round trips
    // =========================================================================

    #[test]
    fn property_upsert_and_get_round_trip() {
        let conn = test_conn();
        let property = sample_property();

        upsert_property(&conn, &property).unwrap();
        let loaded = get_property(&conn, property.id).unwrap().unwrap();

        assert_eq!(loaded.id, property.id);
        assert_eq!(loaded.address_line1, "123 Main St");
        assert_eq!(loaded.sync_state, SyncState::Synced);
        assert!(loaded.deleted_at.is_none());
    }

    #[test]
    fn get_returns_none_for_missing_row() {
        let conn = test_conn();
        assert!(get_task(&conn, Uuid::new_v4()).unwrap().is_none());
        assert!(get_note(&conn, Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_every_column() {
        let conn = test_conn();
        let mut listing = sample_listing(None);
        upsert_listing(&conn, &listing).unwrap();

        listing.title = "Updated title".to_string();
        listing.status = ListingStatus::Closed;
        listing.price_cents = None;
        upsert_listing(&conn, &listing).unwrap();

        let loaded = get_listing(&conn, listing.id).unwrap().unwrap();
        assert_eq!(loaded.title, "Updated title");
        assert_eq!(loaded.status, ListingStatus::Closed);
        assert_eq!(loaded.price_cents, None);
        assert_eq!(count_rows(&conn, EntityTable::Listings).unwrap(), 1);
    }

    #[test]
    fn task_round_trip_preserves_relationships() {
        let conn = test_conn();
        let mut task = sample_task();
        task.listing_id = Some(Uuid::new_v4());
        task.assignee_id = Some(Uuid::new_v4());
        upsert_task(&conn, &task).unwrap();

        let loaded = get_task(&conn, task.id).unwrap().unwrap();
        assert_eq!(loaded.listing_id, task.listing_id);
        assert_eq!(loaded.assignee_id, task.assignee_id);
        assert_eq!(loaded.sync_state, SyncState::Pending);
    }

    // =========================================================================
    // Sync bookkeeping
    // =========================================================================

    #[test]
    fn collect_pending_only_returns_pending_rows() {
        let conn = test_conn();

        let pending = sample_task();
        upsert_task(&conn, &pending).unwrap();

        let mut synced = sample_task();
        synced.sync_state = SyncState::Synced;
        upsert_task(&conn, &synced).unwrap();

        let mut failed = sample_task();
        failed.sync_state = SyncState::Failed;
        upsert_task(&conn, &failed).unwrap();

        let rows = collect_pending(&conn, EntityTable::Tasks, 50).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, pending.id);

        // Wire payload excludes the local bookkeeping columns.
        assert!(rows[0].payload.get("sync_state").is_none());
        assert!(rows[0].payload.get("last_sync_error").is_none());
        assert_eq!(rows[0].payload["title"], "Call the inspector");
    }

    #[test]
    fn collect_pending_respects_limit() {
        let conn = test_conn();
        for _ in 0..5 {
            upsert_task(&conn, &sample_task()).unwrap();
        }
        let rows = collect_pending(&conn, EntityTable::Tasks, 3).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn mark_row_transitions() {
        let conn = test_conn();
        let task = sample_task();
        upsert_task(&conn, &task).unwrap();

        assert!(mark_row_failed(&conn, EntityTable::Tasks, task.id, "Connection lost").unwrap());
        let loaded = get_task(&conn, task.id).unwrap().unwrap();
        assert_eq!(loaded.sync_state, SyncState::Failed);
        assert_eq!(loaded.last_sync_error.as_deref(), Some("Connection lost"));

        assert!(mark_row_synced(&conn, EntityTable::Tasks, task.id).unwrap());
        let loaded = get_task(&conn, task.id).unwrap().unwrap();
        assert_eq!(loaded.sync_state, SyncState::Synced);
        assert!(loaded.last_sync_error.is_none());

        assert!(mark_row_pending(&conn, EntityTable::Tasks, task.id).unwrap());
        let loaded = get_task(&conn, task.id).unwrap().unwrap();
        assert_eq!(loaded.sync_state, SyncState::Pending);
    }

    #[test]
    fn mark_row_on_missing_id_returns_false() {
        let conn = test_conn();
        assert!(!mark_row_synced(&conn, EntityTable::Notes, Uuid::new_v4()).unwrap());
    }

    // =========================================================================
    // Hard delete with nullification
    // =========================================================================

    #[test]
    fn deleting_property_nullifies_listing_reference() {
        let conn = test_conn();
        let property = sample_property();
        upsert_property(&conn, &property).unwrap();
        let listing = sample_listing(Some(property.id));
        upsert_listing(&conn, &listing).unwrap();

        assert!(hard_delete(&conn, EntityTable::Properties, property.id).unwrap());

        // The listing survives; only its reference is gone.
        let loaded = get_listing(&conn, listing.id).unwrap().unwrap();
        assert_eq!(loaded.property_id, None);
        assert_eq!(loaded.title, listing.title);
        assert!(get_property(&conn, property.id).unwrap().is_none());
    }

    #[test]
    fn deleting_listing_nullifies_task_and_activity_references() {
        let conn = test_conn();
        let listing = sample_listing(None);
        upsert_listing(&conn, &listing).unwrap();

        let mut task = sample_task();
        task.listing_id = Some(listing.id);
        upsert_task(&conn, &task).unwrap();

        let now = Utc::now();
        let activity = Activity {
            id: Uuid::new_v4(),
            kind: ActivityKind::Showing,
            subject: "Second viewing".to_string(),
            scheduled_at: None,
            listing_id: Some(listing.id),
            sync_state: SyncState::Synced,
            last_sync_error: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        upsert_activity(&conn, &activity).unwrap();

        assert!(hard_delete(&conn, EntityTable::Listings, listing.id).unwrap());
        assert_eq!(get_task(&conn, task.id).unwrap().unwrap().listing_id, None);
        assert_eq!(
            get_activity(&conn, activity.id).unwrap().unwrap().listing_id,
            None
        );
    }

    #[test]
    fn deleting_user_nullifies_task_assignee() {
        let conn = test_conn();
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            display_name: "Dana".to_string(),
            email: "dana@example.com".to_string(),
            avatar_url: None,
            sync_state: SyncState::Synced,
            last_sync_error: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        upsert_user(&conn, &user).unwrap();

        let mut task = sample_task();
        task.assignee_id = Some(user.id);
        upsert_task(&conn, &task).unwrap();

        assert!(hard_delete(&conn, EntityTable::Users, user.id).unwrap());
        assert_eq!(get_task(&conn, task.id).unwrap().unwrap().assignee_id, None);
    }

    #[test]
    fn hard_delete_missing_row_returns_false() {
        let conn = test_conn();
        assert!(!hard_delete(&conn, EntityTable::Tasks, Uuid::new_v4()).unwrap());
    }

    // =========================================================================
    // Push cursors
    // =========================================================================

    #[test]
    fn push_cursor_failure_then_success_resets_retry() {
        let conn = test_conn();

        assert!(get_push_cursor(&conn, EntityTable::Tasks).unwrap().is_none());

        record_push_failure(&conn, EntityTable::Tasks, "err1").unwrap();
        record_push_failure(&conn, EntityTable::Tasks, "err2").unwrap();

        let cursor = get_push_cursor(&conn, EntityTable::Tasks).unwrap().unwrap();
        assert_eq!(cursor.retry_count, 2);
        assert_eq!(cursor.last_error.as_deref(), Some("err2"));
        assert!(cursor.last_attempt_at.is_some());

        record_push_success(&conn, EntityTable::Tasks).unwrap();
        let cursor = get_push_cursor(&conn, EntityTable::Tasks).unwrap().unwrap();
        assert_eq!(cursor.retry_count, 0);
        assert!(cursor.last_error.is_none());
    }

    #[test]
    fn push_cursors_are_per_table() {
        let conn = test_conn();
        record_push_failure(&conn, EntityTable::Tasks, "boom").unwrap();

        assert!(get_push_cursor(&conn, EntityTable::Notes).unwrap().is_none());
        assert_eq!(
            get_push_cursor(&conn, EntityTable::Tasks)
                .unwrap()
                .unwrap()
                .retry_count,
            1
        );
    }
}
