// Database schema — table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version` table
// tracks which migrations have run, and each migration is a function that
// executes SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent — safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS creators (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            optimal_attribution_window_hours INTEGER NOT NULL DEFAULT 48,
            status TEXT NOT NULL DEFAULT 'active'
        );

        -- Posts carry their latest cumulative counters so status/report
        -- queries don't need to re-derive them from snapshots.
        CREATE TABLE IF NOT EXISTS social_posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            creator_id INTEGER NOT NULL REFERENCES creators(id),
            platform TEXT NOT NULL,
            external_post_id TEXT NOT NULL,
            posted_at TEXT NOT NULL,
            views INTEGER NOT NULL DEFAULT 0,
            likes INTEGER NOT NULL DEFAULT 0,
            comments INTEGER NOT NULL DEFAULT 0,
            shares INTEGER NOT NULL DEFAULT 0,
            saves INTEGER NOT NULL DEFAULT 0,
            category TEXT NOT NULL DEFAULT 'other',
            label_source TEXT NOT NULL DEFAULT 'ml_suggested',
            last_snapshot_at TEXT,
            UNIQUE(creator_id, platform, external_post_id)
        );

        -- Append-only point-in-time observations of a post's cumulative
        -- counters. Never mutated or deleted.
        CREATE TABLE IF NOT EXISTS post_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES social_posts(id),
            creator_id INTEGER NOT NULL REFERENCES creators(id),
            snapshot_at TEXT NOT NULL,
            views INTEGER NOT NULL,
            likes INTEGER NOT NULL,
            comments INTEGER NOT NULL,
            shares INTEGER NOT NULL,
            saves INTEGER NOT NULL,
            import_ref TEXT,
            UNIQUE(post_id, snapshot_at)
        );

        CREATE TABLE IF NOT EXISTS fans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            creator_id INTEGER NOT NULL REFERENCES creators(id),
            acquired_at TEXT NOT NULL,
            external_id_hash TEXT NOT NULL,
            referral_link_category_hint TEXT,
            attributed_category TEXT,
            attribution_method TEXT NOT NULL DEFAULT 'none',
            confidence REAL NOT NULL DEFAULT 0.0,
            weights_json TEXT
        );

        CREATE TABLE IF NOT EXISTS revenue_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            creator_id INTEGER NOT NULL REFERENCES creators(id),
            fan_id INTEGER NOT NULL REFERENCES fans(id),
            event_type TEXT NOT NULL,
            amount REAL NOT NULL,
            currency TEXT NOT NULL DEFAULT 'USD',
            event_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS confounder_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            creator_id INTEGER NOT NULL REFERENCES creators(id),
            event_type TEXT NOT NULL,
            start_at TEXT NOT NULL,
            end_at TEXT,
            impact TEXT NOT NULL DEFAULT 'low',
            description TEXT NOT NULL DEFAULT ''
        );

        -- Index for the two delta queries: per-post and per-category, both
        -- scanning snapshots for a creator within [t0, t1).
        CREATE INDEX IF NOT EXISTS idx_snapshots_post_time
            ON post_snapshots(post_id, snapshot_at);

        CREATE INDEX IF NOT EXISTS idx_snapshots_creator_time
            ON post_snapshots(creator_id, snapshot_at);

        CREATE INDEX IF NOT EXISTS idx_fans_creator_acquired
            ON fans(creator_id, acquired_at);

        CREATE INDEX IF NOT EXISTS idx_posts_creator_category
            ON social_posts(creator_id, category);

        CREATE INDEX IF NOT EXISTS idx_confounders_creator_time
            ON confounder_events(creator_id, start_at);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
#[allow(dead_code)]
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let count = table_count(&conn).unwrap();
        // schema_version, creators, social_posts, post_snapshots, fans,
        // revenue_events, confounder_events = 7 tables
        assert_eq!(count, 7i64);
    }
}
