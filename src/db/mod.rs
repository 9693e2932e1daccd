//! Relational store
//!
//! SQLite holds the canonical video catalogue. The relational search backend
//! queries it directly (with an FTS5 table for free-text terms) and the
//! search index is built from it.

pub mod lookup;
pub mod migrations;
pub mod records;
pub mod store;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

pub use lookup::{KeywordResolver, Related};
pub use migrations::run_migrations;
pub use records::{load_index_documents, load_videos, rebuild_fts, refresh_search_text, IndexDocument};

/// Initialize SQLite database schema
pub fn init_database(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS feeds (
            id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS saved_searches (
            id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL,
            query_string TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            slug TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS videos (
            id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL,
            status INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            feed_id INTEGER REFERENCES feeds(id),
            search_id INTEGER REFERENCES saved_searches(id),
            user_id INTEGER REFERENCES users(id),
            video_service_user TEXT NOT NULL DEFAULT '',
            when_submitted TEXT NOT NULL,
            when_approved TEXT,
            when_published TEXT,
            last_featured TEXT,
            thumbnail_path TEXT
        );

        CREATE TABLE IF NOT EXISTS video_tags (
            video_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (video_id, tag_id)
        );

        CREATE TABLE IF NOT EXISTS video_categories (
            video_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            PRIMARY KEY (video_id, category_id)
        );

        CREATE TABLE IF NOT EXISTS video_authors (
            video_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            PRIMARY KEY (video_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS playlists (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            name TEXT NOT NULL,
            slug TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS playlist_items (
            playlist_id INTEGER NOT NULL,
            video_id INTEGER NOT NULL,
            PRIMARY KEY (playlist_id, video_id)
        );

        CREATE TABLE IF NOT EXISTS watches (
            id INTEGER PRIMARY KEY,
            video_id INTEGER NOT NULL,
            timestamp TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS thumbnail_renditions (
            video_id INTEGER NOT NULL,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            url TEXT NOT NULL,
            PRIMARY KEY (video_id, width, height)
        );

        -- Metadata table for site settings/migrations
        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_videos_site_status ON videos(site_id, status);
        CREATE INDEX IF NOT EXISTS idx_watches_video ON watches(video_id);",
    )
}

/// Open (or create) a database and bring its schema up to date
pub fn open(path: &std::path::Path) -> crate::error::Result<Connection> {
    let conn = Connection::open(path)?;
    prepare(&conn)?;
    Ok(conn)
}

/// In-memory database with the full schema
pub fn open_in_memory() -> crate::error::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    prepare(&conn)?;
    Ok(conn)
}

fn prepare(conn: &Connection) -> crate::error::Result<()> {
    init_database(conn)?;
    run_migrations(conn)?;
    Ok(())
}

/// Fixed-width timestamps so that text comparison orders chronologically
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc))
}
