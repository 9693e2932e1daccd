//! Write helpers for the catalogue
//!
//! Importers and tests use these to populate the store. Anything that
//! changes a video's searchable text refreshes its FTS row.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_timestamp, refresh_search_text};
use crate::error::Result;
use crate::models::VideoStatus;

/// Fields for a new video row
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub site_id: i64,
    pub status: VideoStatus,
    pub name: String,
    pub description: String,
    pub feed_id: Option<i64>,
    pub search_id: Option<i64>,
    pub user_id: Option<i64>,
    pub video_service_user: String,
    pub when_submitted: DateTime<Utc>,
    pub when_approved: Option<DateTime<Utc>>,
    pub when_published: Option<DateTime<Utc>>,
    pub last_featured: Option<DateTime<Utc>>,
    pub thumbnail_path: Option<String>,
}

impl NewVideo {
    pub fn new(name: &str) -> Self {
        Self {
            site_id: 1,
            status: VideoStatus::Active,
            name: name.to_string(),
            description: String::new(),
            feed_id: None,
            search_id: None,
            user_id: None,
            video_service_user: String::new(),
            when_submitted: Utc::now(),
            when_approved: None,
            when_published: None,
            last_featured: None,
            thumbnail_path: None,
        }
    }
}

pub fn insert_video(conn: &Connection, video: &NewVideo) -> Result<i64> {
    conn.execute(
        "INSERT INTO videos (site_id, status, name, description, feed_id, search_id, user_id,
            video_service_user, when_submitted, when_approved, when_published, last_featured,
            thumbnail_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            video.site_id,
            video.status.as_i64(),
            video.name,
            video.description,
            video.feed_id,
            video.search_id,
            video.user_id,
            video.video_service_user,
            format_timestamp(&video.when_submitted),
            video.when_approved.as_ref().map(format_timestamp),
            video.when_published.as_ref().map(format_timestamp),
            video.last_featured.as_ref().map(format_timestamp),
            video.thumbnail_path,
        ],
    )?;
    let id = conn.last_insert_rowid();
    refresh_search_text(conn, id)?;
    Ok(id)
}

pub fn set_status(conn: &Connection, video_id: i64, status: VideoStatus) -> Result<()> {
    conn.execute(
        "UPDATE videos SET status = ?1 WHERE id = ?2",
        params![status.as_i64(), video_id],
    )?;
    Ok(())
}

pub fn delete_video(conn: &Connection, video_id: i64) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for table in ["video_tags", "video_categories", "video_authors", "playlist_items", "watches", "thumbnail_renditions"] {
        tx.execute(&format!("DELETE FROM {} WHERE video_id = ?1", table), params![video_id])?;
    }
    tx.execute("DELETE FROM videos WHERE id = ?1", params![video_id])?;
    tx.execute("DELETE FROM videos_fts WHERE rowid = ?1", params![video_id])?;
    tx.commit()?;
    Ok(())
}

pub fn create_user(conn: &Connection, username: &str, first_name: &str, last_name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, first_name, last_name) VALUES (?1, ?2, ?3)",
        params![username, first_name, last_name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn create_feed(conn: &Connection, site_id: i64, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO feeds (site_id, name) VALUES (?1, ?2)",
        params![site_id, name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn create_saved_search(conn: &Connection, site_id: i64, query_string: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO saved_searches (site_id, query_string) VALUES (?1, ?2)",
        params![site_id, query_string],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn create_category(conn: &Connection, site_id: i64, name: &str, slug: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO categories (site_id, name, slug) VALUES (?1, ?2, ?3)",
        params![site_id, name, slug],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn create_playlist(conn: &Connection, user_id: i64, name: &str, slug: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO playlists (user_id, name, slug) VALUES (?1, ?2, ?3)",
        params![user_id, name, slug],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get or create a tag by name
pub fn tag_id(conn: &Connection, name: &str) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| row.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute("INSERT INTO tags (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

/// Replace the tags of a video
pub fn set_tags(conn: &Connection, video_id: i64, names: &[&str]) -> Result<Vec<i64>> {
    conn.execute("DELETE FROM video_tags WHERE video_id = ?1", params![video_id])?;
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let id = tag_id(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO video_tags (video_id, tag_id) VALUES (?1, ?2)",
            params![video_id, id],
        )?;
        ids.push(id);
    }
    refresh_search_text(conn, video_id)?;
    Ok(ids)
}

pub fn set_categories(conn: &Connection, video_id: i64, category_ids: &[i64]) -> Result<()> {
    conn.execute("DELETE FROM video_categories WHERE video_id = ?1", params![video_id])?;
    for id in category_ids {
        conn.execute(
            "INSERT OR IGNORE INTO video_categories (video_id, category_id) VALUES (?1, ?2)",
            params![video_id, id],
        )?;
    }
    refresh_search_text(conn, video_id)
}

pub fn set_authors(conn: &Connection, video_id: i64, user_ids: &[i64]) -> Result<()> {
    conn.execute("DELETE FROM video_authors WHERE video_id = ?1", params![video_id])?;
    for id in user_ids {
        conn.execute(
            "INSERT OR IGNORE INTO video_authors (video_id, user_id) VALUES (?1, ?2)",
            params![video_id, id],
        )?;
    }
    refresh_search_text(conn, video_id)
}

pub fn add_to_playlist(conn: &Connection, playlist_id: i64, video_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO playlist_items (playlist_id, video_id) VALUES (?1, ?2)",
        params![playlist_id, video_id],
    )?;
    Ok(())
}

pub fn record_watch(conn: &Connection, video_id: i64, timestamp: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO watches (video_id, timestamp) VALUES (?1, ?2)",
        params![video_id, format_timestamp(&timestamp)],
    )?;
    Ok(())
}

pub fn set_thumbnail_rendition(
    conn: &Connection,
    video_id: i64,
    size: (u32, u32),
    url: &str,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO thumbnail_renditions (video_id, width, height, url)
         VALUES (?1, ?2, ?3, ?4)",
        params![video_id, size.0, size.1, url],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{load_videos, open_in_memory};

    #[test]
    fn test_insert_and_load() {
        let conn = open_in_memory().unwrap();
        let mut new = NewVideo::new("Blender render");
        new.description = "<p>An <b>open</b> movie</p>".to_string();
        let id = insert_video(&conn, &new).unwrap();

        let loaded = load_videos(&conn, &[id, id + 100]).unwrap();
        assert_eq!(loaded.len(), 1);
        let video = &loaded[&id];
        assert_eq!(video.name, "Blender render");
        assert_eq!(video.status, VideoStatus::Active);
        assert_eq!(video.when_approved, None);
    }

    #[test]
    fn test_search_text_tracks_relations() {
        let conn = open_in_memory().unwrap();
        let id = insert_video(&conn, &NewVideo::new("plain")).unwrap();
        set_tags(&conn, id, &["tag1", "tag2"]).unwrap();

        let text: String = conn
            .query_row("SELECT text FROM videos_fts WHERE rowid = ?1", params![id], |row| row.get(0))
            .unwrap();
        assert!(text.contains("tag1 tag2"));

        delete_video(&conn, id).unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM videos_fts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_tag_get_or_create() {
        let conn = open_in_memory().unwrap();
        let first = tag_id(&conn, "music").unwrap();
        assert_eq!(tag_id(&conn, "music").unwrap(), first);
        assert_ne!(tag_id(&conn, "film").unwrap(), first);
    }
}
