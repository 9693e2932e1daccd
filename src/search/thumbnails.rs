//! Thumbnail variants for a page of results
//!
//! A page needs every video's thumbnail at every configured size. Lookups
//! go to the store once per size for the whole page, never once per video.

use std::cell::Cell;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::db::records::MAX_BATCH;
use crate::error::Result;
use crate::models::Video;

pub type ThumbnailSize = (u32, u32);

/// A video's source thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRef {
    pub video_id: i64,
    pub path: String,
}

/// Resolves resized thumbnails
pub trait ThumbnailStore {
    /// URLs of `refs` at `size`, keyed by video id
    fn resize_batch(&self, size: ThumbnailSize, refs: &[ThumbnailRef]) -> Result<FxHashMap<i64, String>>;
}

/// Video id → size → URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjustedThumbnails {
    urls: FxHashMap<i64, FxHashMap<ThumbnailSize, String>>,
}

impl AdjustedThumbnails {
    pub fn get(&self, video_id: i64, size: ThumbnailSize) -> Option<&str> {
        self.urls.get(&video_id)?.get(&size).map(String::as_str)
    }

    pub fn for_video(&self, video_id: i64) -> Option<&FxHashMap<ThumbnailSize, String>> {
        self.urls.get(&video_id)
    }

    /// Number of (video, size) entries
    pub fn len(&self) -> usize {
        self.urls.values().map(|sizes| sizes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute every size for a page of videos, one store call per size
pub fn bulk_adjust<S: ThumbnailStore + ?Sized>(
    videos: &[Video],
    sizes: &[ThumbnailSize],
    store: &S,
) -> Result<AdjustedThumbnails> {
    let refs: Vec<ThumbnailRef> = videos
        .iter()
        .filter_map(|video| {
            let path = video.thumbnail_path.as_ref().filter(|p| !p.is_empty())?;
            Some(ThumbnailRef { video_id: video.id, path: path.clone() })
        })
        .collect();

    let mut adjusted = AdjustedThumbnails::default();
    if refs.is_empty() {
        return Ok(adjusted);
    }
    let mut seen = FxHashSet::default();
    for &size in sizes.iter().filter(|&&size| seen.insert(size)) {
        for (video_id, url) in store.resize_batch(size, &refs)? {
            adjusted.urls.entry(video_id).or_default().insert(size, url);
        }
    }
    Ok(adjusted)
}

/// Renditions recorded in `thumbnail_renditions`, falling back to the
/// conventional storage path for sizes that were never recorded
pub struct SqliteThumbnailStore<'a> {
    conn: &'a Connection,
    media_url: String,
    lookups: Cell<usize>,
}

impl<'a> SqliteThumbnailStore<'a> {
    pub fn new(conn: &'a Connection, media_url: &str) -> Self {
        Self { conn, media_url: media_url.to_string(), lookups: Cell::new(0) }
    }

    /// Batches served so far
    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }

    fn storage_url(&self, video_id: i64, size: ThumbnailSize) -> String {
        format!(
            "{}localtv/video_thumbs/{}/{}x{}.png",
            self.media_url, video_id, size.0, size.1
        )
    }
}

impl ThumbnailStore for SqliteThumbnailStore<'_> {
    fn resize_batch(&self, size: ThumbnailSize, refs: &[ThumbnailRef]) -> Result<FxHashMap<i64, String>> {
        self.lookups.set(self.lookups.get() + 1);

        let mut urls: FxHashMap<i64, String> = FxHashMap::default();
        for chunk in refs.chunks(MAX_BATCH) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT video_id, url FROM thumbnail_renditions
                 WHERE width = ? AND height = ? AND video_id IN ({})",
                placeholders
            );
            let mut params = vec![Value::Integer(size.0.into()), Value::Integer(size.1.into())];
            params.extend(chunk.iter().map(|r| Value::Integer(r.video_id)));

            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (video_id, url) = row?;
                urls.insert(video_id, url);
            }
        }

        for r in refs {
            urls.entry(r.video_id)
                .or_insert_with(|| self.storage_url(r.video_id, size));
        }
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, store};

    #[test]
    fn test_videos_without_thumbnail_are_skipped() {
        let conn = open_in_memory().unwrap();
        let mut with = store::NewVideo::new("with");
        with.thumbnail_path = Some("localtv/video_thumbs/orig.png".to_string());
        let with = store::insert_video(&conn, &with).unwrap();
        let without = store::insert_video(&conn, &store::NewVideo::new("without")).unwrap();
        store::set_thumbnail_rendition(&conn, with, (375, 295), "/cdn/with-375.png").unwrap();

        let videos: Vec<Video> = crate::db::load_videos(&conn, &[with, without])
            .unwrap()
            .into_values()
            .collect();
        let thumbs = SqliteThumbnailStore::new(&conn, "/media/");
        let adjusted = bulk_adjust(&videos, &[(375, 295), (140, 110)], &thumbs).unwrap();

        assert_eq!(thumbs.lookups(), 2);
        assert_eq!(adjusted.len(), 2);
        assert_eq!(adjusted.get(with, (375, 295)), Some("/cdn/with-375.png"));
        assert_eq!(
            adjusted.get(with, (140, 110)),
            Some(format!("/media/localtv/video_thumbs/{}/140x110.png", with).as_str())
        );
        assert!(adjusted.for_video(without).is_none());
    }

    #[test]
    fn test_repeated_sizes_looked_up_once() {
        let conn = open_in_memory().unwrap();
        let mut video = store::NewVideo::new("with");
        video.thumbnail_path = Some("localtv/video_thumbs/orig.png".to_string());
        let id = store::insert_video(&conn, &video).unwrap();
        let videos: Vec<Video> = crate::db::load_videos(&conn, &[id]).unwrap().into_values().collect();

        let thumbs = SqliteThumbnailStore::new(&conn, "/media/");
        let sizes = [(375, 295), (140, 110), (375, 295), (140, 110)];
        let adjusted = bulk_adjust(&videos, &sizes, &thumbs).unwrap();
        assert_eq!(thumbs.lookups(), 2);
        assert_eq!(adjusted.len(), 2);
    }

    #[test]
    fn test_no_thumbnails_no_lookups() {
        let conn = open_in_memory().unwrap();
        let thumbs = SqliteThumbnailStore::new(&conn, "/media/");
        let adjusted = bulk_adjust(&[], &[(375, 295)], &thumbs).unwrap();
        assert!(adjusted.is_empty());
        assert_eq!(thumbs.lookups(), 0);
    }
}
