//! Database schema migrations
//!
//! Migration Strategy:
//! - Each migration is a one-way operation
//! - Version is tracked in metadata table
//! - Migrations run synchronously inside a transaction

use log::info;
use rusqlite::Connection;

use super::records::rebuild_fts;
use crate::error::Result;

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Get current schema version from database
pub fn get_schema_version(conn: &Connection) -> u32 {
    conn.query_row(
        "SELECT value FROM metadata WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0),
    )
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(1) // Base tables only
}

/// Set schema version in database
pub fn set_schema_version(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [version.to_string()],
    )?;
    Ok(())
}

/// Run all pending migrations, returning whether anything was done
pub fn run_migrations(conn: &Connection) -> Result<bool> {
    let current_version = get_schema_version(conn);

    if current_version >= CURRENT_SCHEMA_VERSION {
        log::debug!("[Migration] Schema up to date (v{})", current_version);
        return Ok(false);
    }

    info!(
        "[Migration] Upgrading schema from v{} to v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 2 {
        migrate_v1_to_v2(conn)?;
    }

    set_schema_version(conn, CURRENT_SCHEMA_VERSION)?;
    info!("[Migration] Complete! Now at schema v{}", CURRENT_SCHEMA_VERSION);

    Ok(true)
}

/// Migration v1 -> v2: free-text table for the relational backend
///
/// The tokenizer strips accents from Latin letters, as the search index's
/// analyzer does.
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    let start = std::time::Instant::now();

    let tx = conn.unchecked_transaction()?;
    tx.execute("DROP TABLE IF EXISTS videos_fts", [])?;
    tx.execute(
        "CREATE VIRTUAL TABLE videos_fts USING fts5(
            text,
            tokenize='unicode61 remove_diacritics 2'
        )",
        [],
    )?;
    let indexed = rebuild_fts(&tx)?;
    tx.commit()?;

    info!(
        "[Migration] v1->v2: Indexed {} videos in {:?}",
        indexed,
        start.elapsed()
    );

    Ok(())
}
