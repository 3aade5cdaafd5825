//! Store migrations.
//!
//! Migrations are run in order and tracked in the `migrations` table.

use crate::StoreResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_entity_tables(conn)?;
    }
    if current_version < 2 {
        migrate_v2_push_cursors(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: the six synchronized entity tables.
///
/// Relationship columns carry no SQL foreign keys on purpose: hard deletes
/// nullify dependents explicitly in the delete queries, and inbound events
/// may reference rows that have not arrived yet on this device.
fn migrate_v1_entity_tables(conn: &Connection) -> StoreResult<()> {
    info!("Applying migration v1: entity tables");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS properties (
            id TEXT PRIMARY KEY,
            address_line1 TEXT NOT NULL DEFAULT '',
            address_line2 TEXT NOT NULL DEFAULT '',
            city TEXT NOT NULL DEFAULT '',
            postal_code TEXT NOT NULL DEFAULT '',
            country TEXT NOT NULL DEFAULT 'US',
            sync_state TEXT NOT NULL DEFAULT 'synced',
            last_sync_error TEXT,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS listings (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'active',
            price_cents INTEGER,
            property_id TEXT,
            sync_state TEXT NOT NULL DEFAULT 'synced',
            last_sync_error TEXT,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            details TEXT NOT NULL DEFAULT '',
            due_at TEXT,
            completed_at TEXT,
            listing_id TEXT,
            assignee_id TEXT,
            sync_state TEXT NOT NULL DEFAULT 'synced',
            last_sync_error TEXT,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS activities (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL DEFAULT 'follow_up',
            subject TEXT NOT NULL DEFAULT '',
            scheduled_at TEXT,
            listing_id TEXT,
            sync_state TEXT NOT NULL DEFAULT 'synced',
            last_sync_error TEXT,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            avatar_url TEXT,
            sync_state TEXT NOT NULL DEFAULT 'synced',
            last_sync_error TEXT,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL DEFAULT '',
            pinned INTEGER NOT NULL DEFAULT 0,
            task_id TEXT,
            sync_state TEXT NOT NULL DEFAULT 'synced',
            last_sync_error TEXT,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_properties_sync_state ON properties(sync_state);
        CREATE INDEX IF NOT EXISTS idx_listings_sync_state ON listings(sync_state);
        CREATE INDEX IF NOT EXISTS idx_listings_property_id ON listings(property_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_sync_state ON tasks(sync_state);
        CREATE INDEX IF NOT EXISTS idx_tasks_listing_id ON tasks(listing_id);
        CREATE INDEX IF NOT EXISTS idx_activities_sync_state ON activities(sync_state);
        CREATE INDEX IF NOT EXISTS idx_activities_listing_id ON activities(listing_id);
        CREATE INDEX IF NOT EXISTS idx_users_sync_state ON users(sync_state);
        CREATE INDEX IF NOT EXISTS idx_notes_sync_state ON notes(sync_state);
        CREATE INDEX IF NOT EXISTS idx_notes_task_id ON notes(task_id);
        ",
    )?;

    record_migration(conn, 1, "entity_tables")
}

/// V2: per-table push cursor for outbound retry bookkeeping.
fn migrate_v2_push_cursors(conn: &Connection) -> StoreResult<()> {
    info!("Applying migration v2: push cursors");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS push_cursors (
            table_name TEXT PRIMARY KEY,
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_attempt_at TEXT,
            last_error TEXT
        );
        ",
    )?;

    record_migration(conn, 2, "push_cursors")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn migrations_run_from_scratch() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, CURRENT_VERSION);
    }

    #[test]
    fn v1_creates_all_entity_tables() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        for table in ["properties", "listings", "tasks", "activities", "users", "notes"] {
            let count: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }
}
