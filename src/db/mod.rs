// Database layer — SQLite storage for creators, posts, snapshots, fans,
// revenue, and confounder events.
//
// We use rusqlite with the "bundled" feature so there's no system SQLite
// dependency. The database file lives wherever the agency's config points
// (defaults to ./creator_lift.db).

pub mod models;
pub mod queries;
pub mod schema;
pub mod sqlite;
pub mod traits;

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

pub use sqlite::SqliteDatabase;
pub use traits::Database;

/// Open (or create) the database and run migrations.
///
/// This is the main entry point — called by `creator-lift init` and by any
/// command that needs database access.
pub fn initialize(db_path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {}", db_path))?;
        }
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Open an existing database (fails if it doesn't exist yet).
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        anyhow::bail!(
            "Database not found at {}. Run `creator-lift init` first.",
            db_path
        );
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;

    Ok(conn)
}
