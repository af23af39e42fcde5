// System status display — shows DB stats, creator counts, and recent activity.

use std::path::Path;

use anyhow::Result;

use crate::db;

/// Display system status to the terminal.
pub fn show(config: &impl HasDbPath) -> Result<()> {
    let db_path = config.db_path();

    if !Path::new(db_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `creator-lift init` to set up the database.");
        return Ok(());
    }

    let conn = db::open(db_path)?;

    let file_size = std::fs::metadata(db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_path, file_size);

    let creator_count = db::queries::creator_count(&conn)?;
    println!("Creators: {creator_count}");

    let post_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM social_posts", [], |row| row.get(0))?;
    let snapshot_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM post_snapshots", [], |row| row.get(0))?;
    println!("Posts: {post_count} ({snapshot_count} snapshots)");

    let fan_count: i64 = conn.query_row("SELECT COUNT(*) FROM fans", [], |row| row.get(0))?;
    let unattributed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM fans WHERE attributed_category IS NULL",
        [],
        |row| row.get(0),
    )?;
    println!("Fans: {fan_count} ({unattributed} unattributed)");

    let confounder_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM confounder_events",
        [],
        |row| row.get(0),
    )?;
    if confounder_count > 0 {
        println!("Confounder events: {confounder_count}");
    } else {
        println!("Confounder events: none declared");
    }

    let last_snapshot: Option<String> = conn
        .query_row(
            "SELECT MAX(snapshot_at) FROM post_snapshots",
            [],
            |row| row.get(0),
        )
        .unwrap_or(None);
    match last_snapshot {
        Some(ts) => println!("Last snapshot: {ts}"),
        None => println!("Last snapshot: none yet"),
    }

    Ok(())
}

/// Trait so both the binary's Config and tests can call show().
pub trait HasDbPath {
    fn db_path(&self) -> &str;
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
