//! Loading videos and composing their searchable text

use regex::Regex;
use rusqlite::types::{FromSqlError, Type};
use rusqlite::{params, params_from_iter, Connection, Row};
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

use super::parse_timestamp;
use crate::error::Result;
use crate::models::{Video, VideoStatus};

/// Columns selected for a [`Video`], in the order `video_from_row` reads them
pub const VIDEO_COLUMNS: &str = "v.id, v.site_id, v.status, v.name, v.description, \
     v.feed_id, v.search_id, v.user_id, v.video_service_user, v.when_submitted, \
     v.when_approved, v.when_published, v.last_featured, v.thumbnail_path";

/// Upper bound on bound parameters per statement
pub const MAX_BATCH: usize = 500;

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<Option<chrono::DateTime<chrono::Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| {
        parse_timestamp(&value)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub fn video_from_row(row: &Row) -> rusqlite::Result<Video> {
    let status_raw: i64 = row.get(2)?;
    let status = VideoStatus::from_i64(status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Integer,
            Box::new(FromSqlError::OutOfRange(status_raw)),
        )
    })?;
    let when_submitted = timestamp_column(row, 9)?
        .ok_or(rusqlite::Error::InvalidColumnType(9, "when_submitted".to_string(), Type::Null))?;

    Ok(Video {
        id: row.get(0)?,
        site_id: row.get(1)?,
        status,
        name: row.get(3)?,
        description: row.get(4)?,
        feed_id: row.get(5)?,
        search_id: row.get(6)?,
        user_id: row.get(7)?,
        video_service_user: row.get(8)?,
        when_submitted,
        when_approved: timestamp_column(row, 10)?,
        when_published: timestamp_column(row, 11)?,
        last_featured: timestamp_column(row, 12)?,
        thumbnail_path: row.get(13)?,
    })
}

/// Load videos by id in as few statements as possible
///
/// Ids that no longer exist are simply absent from the returned map.
pub fn load_videos(conn: &Connection, ids: &[i64]) -> Result<FxHashMap<i64, Video>> {
    let mut videos = FxHashMap::default();
    for chunk in ids.chunks(MAX_BATCH) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM videos v WHERE v.id IN ({})",
            VIDEO_COLUMNS, placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), video_from_row)?;
        for row in rows {
            let video = row?;
            videos.insert(video.id, video);
        }
    }
    Ok(videos)
}

fn html_tags() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("static pattern"))
}

/// Build the free-text document for a video
///
/// Covers the name, description (HTML stripped), tags, categories,
/// submitter and author names, feed name, video service user and the saved
/// search the video came from.
pub fn search_text(conn: &Connection, video_id: i64) -> Result<Option<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT v.name, v.description, v.video_service_user,
            COALESCE((SELECT group_concat(t.name, ' ') FROM video_tags vt
                      JOIN tags t ON t.id = vt.tag_id WHERE vt.video_id = v.id), ''),
            COALESCE((SELECT group_concat(c.name, ' ') FROM video_categories vc
                      JOIN categories c ON c.id = vc.category_id WHERE vc.video_id = v.id), ''),
            COALESCE((SELECT group_concat(u.username || ' ' || u.first_name || ' ' || u.last_name, ' ')
                      FROM users u
                      WHERE u.id = v.user_id
                         OR u.id IN (SELECT user_id FROM video_authors WHERE video_id = v.id)), ''),
            COALESCE((SELECT f.name FROM feeds f WHERE f.id = v.feed_id), ''),
            COALESCE((SELECT s.query_string FROM saved_searches s WHERE s.id = v.search_id), '')
         FROM videos v WHERE v.id = ?1",
    )?;
    let mut rows = stmt.query(params![video_id])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let mut parts: Vec<String> = Vec::with_capacity(8);
    for idx in 0..8 {
        let part: String = row.get(idx)?;
        let part = if idx == 1 {
            html_tags().replace_all(&part, " ").into_owned()
        } else {
            part
        };
        if !part.trim().is_empty() {
            parts.push(part);
        }
    }
    Ok(Some(parts.join("\n")))
}

/// Rewrite the FTS row for one video
pub fn refresh_search_text(conn: &Connection, video_id: i64) -> Result<()> {
    conn.execute("DELETE FROM videos_fts WHERE rowid = ?1", params![video_id])?;
    if let Some(text) = search_text(conn, video_id)? {
        conn.execute(
            "INSERT INTO videos_fts (rowid, text) VALUES (?1, ?2)",
            params![video_id, text],
        )?;
    }
    Ok(())
}

/// Rebuild the FTS table from the videos table, returning the row count
pub fn rebuild_fts(conn: &Connection) -> Result<usize> {
    conn.execute("DELETE FROM videos_fts", [])?;

    let ids: Vec<i64> = {
        let mut stmt = conn.prepare("SELECT id FROM videos ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let ids = rows.collect::<rusqlite::Result<Vec<i64>>>()?;
        ids
    };
    for id in &ids {
        refresh_search_text(conn, *id)?;
    }
    Ok(ids.len())
}

/// Everything the search index stores about one video
#[derive(Debug, Clone)]
pub struct IndexDocument {
    pub video: Video,
    pub text: String,
    pub tags: Vec<i64>,
    pub categories: Vec<i64>,
    pub authors: Vec<i64>,
    pub playlists: Vec<i64>,
    pub watch_count: i64,
}

fn relation_map(conn: &Connection, sql: &str) -> Result<FxHashMap<i64, Vec<i64>>> {
    let mut map: FxHashMap<i64, Vec<i64>> = FxHashMap::default();
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (video_id, related_id) = row?;
        map.entry(video_id).or_default().push(related_id);
    }
    Ok(map)
}

/// Collect index documents for active videos
///
/// `only` restricts the load to the given ids (used for incremental updates).
pub fn load_index_documents(conn: &Connection, only: Option<&[i64]>) -> Result<Vec<IndexDocument>> {
    let mut tags = relation_map(conn, "SELECT video_id, tag_id FROM video_tags ORDER BY tag_id")?;
    let mut categories = relation_map(
        conn,
        "SELECT video_id, category_id FROM video_categories ORDER BY category_id",
    )?;
    let mut authors = relation_map(conn, "SELECT video_id, user_id FROM video_authors ORDER BY user_id")?;
    let mut playlists = relation_map(
        conn,
        "SELECT video_id, playlist_id FROM playlist_items ORDER BY playlist_id",
    )?;

    let mut watch_counts: FxHashMap<i64, i64> = FxHashMap::default();
    {
        let mut stmt = conn.prepare("SELECT video_id, COUNT(*) FROM watches GROUP BY video_id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (video_id, count) = row?;
            watch_counts.insert(video_id, count);
        }
    }

    let videos: Vec<Video> = match only {
        Some(ids) => {
            let mut loaded: Vec<Video> = load_videos(conn, ids)?.into_values().collect();
            loaded.sort_by_key(|v| v.id);
            loaded
        }
        None => {
            let sql = format!("SELECT {} FROM videos v ORDER BY v.id", VIDEO_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], video_from_row)?;
            let loaded = rows.collect::<rusqlite::Result<Vec<Video>>>()?;
            loaded
        }
    };

    let mut documents = Vec::with_capacity(videos.len());
    for video in videos {
        if video.status != VideoStatus::Active {
            continue;
        }
        let id = video.id;
        documents.push(IndexDocument {
            text: search_text(conn, id)?.unwrap_or_default(),
            tags: tags.remove(&id).unwrap_or_default(),
            categories: categories.remove(&id).unwrap_or_default(),
            authors: authors.remove(&id).unwrap_or_default(),
            playlists: playlists.remove(&id).unwrap_or_default(),
            watch_count: watch_counts.get(&id).copied().unwrap_or(0),
            video,
        });
    }
    Ok(documents)
}
