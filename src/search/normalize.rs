//! One sequence type over both backends
//!
//! Callers index, slice and iterate search results without knowing which
//! engine produced them, and always get `Video` records back. Index hits are
//! hydrated from the relational store one slice at a time; hits whose video
//! is gone or no longer active are dropped from that slice.

use std::collections::VecDeque;

use log::warn;
use rusqlite::Connection;

use super::backend::BackendQuery;
use super::fts5_search::SqlQuery;
use super::tantivy_search::IndexQuery;
use crate::db::load_videos;
use crate::error::Result;
use crate::models::{Video, VideoStatus};

/// Records fetched per round-trip when iterating
pub const ITER_BATCH_SIZE: usize = 100;

pub enum NormalizedVideoList<'a> {
    Relational {
        query: SqlQuery<'a>,
        total: usize,
    },
    Index {
        query: IndexQuery<'a>,
        conn: &'a Connection,
        total: usize,
    },
}

impl<'a> NormalizedVideoList<'a> {
    /// Wrap a finished query; the total is counted up front
    pub fn new(query: BackendQuery<'a>, conn: &'a Connection) -> Result<Self> {
        Ok(match query {
            BackendQuery::Relational(query) => {
                let total = query.count()?;
                NormalizedVideoList::Relational { query, total }
            }
            BackendQuery::Index(query) => {
                let total = query.count()?;
                NormalizedVideoList::Index { query, conn, total }
            }
        })
    }

    /// Number of matches; for index results this counts hits, stale or not
    pub fn len(&self) -> usize {
        match self {
            NormalizedVideoList::Relational { total, .. } => *total,
            NormalizedVideoList::Index { total, .. } => *total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, position: usize) -> Result<Option<Video>> {
        Ok(self.slice(position, position + 1)?.into_iter().next())
    }

    /// Videos at positions `start..end`, clamped to the result length
    pub fn slice(&self, start: usize, end: usize) -> Result<Vec<Video>> {
        let end = end.min(self.len());
        if start >= end {
            return Ok(Vec::new());
        }
        match self {
            NormalizedVideoList::Relational { query, .. } => query.fetch(start, end - start),
            NormalizedVideoList::Index { query, conn, .. } => {
                let ids = query.fetch_ids(start, end - start)?;
                hydrate(conn, &ids)
            }
        }
    }

    /// Lazy iteration in batches of [`ITER_BATCH_SIZE`]
    pub fn iter(&self) -> VideoIter<'_, 'a> {
        VideoIter {
            list: self,
            next_start: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }
}

/// Load videos for index hits, keeping hit order
fn hydrate(conn: &Connection, ids: &[i64]) -> Result<Vec<Video>> {
    let mut loaded = load_videos(conn, ids)?;
    let mut videos = Vec::with_capacity(ids.len());
    for id in ids {
        match loaded.remove(id) {
            Some(video) if video.status == VideoStatus::Active => videos.push(video),
            Some(video) => warn!("[Normalize] Dropping hit {}: video is {:?}", id, video.status),
            None => warn!("[Normalize] Dropping stale hit {}", id),
        }
    }
    Ok(videos)
}

impl std::fmt::Debug for NormalizedVideoList<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizedVideoList::Relational { query, total } => f
                .debug_struct("Relational")
                .field("query", query)
                .field("total", total)
                .finish(),
            NormalizedVideoList::Index { query, total, .. } => f
                .debug_struct("Index")
                .field("query", query)
                .field("total", total)
                .finish(),
        }
    }
}

pub struct VideoIter<'l, 'a> {
    list: &'l NormalizedVideoList<'a>,
    next_start: usize,
    buffer: VecDeque<Video>,
    done: bool,
}

impl Iterator for VideoIter<'_, '_> {
    type Item = Result<Video>;

    fn next(&mut self) -> Option<Self::Item> {
        // A batch of stale hits can hydrate to nothing, so keep going
        while self.buffer.is_empty() {
            if self.done || self.next_start >= self.list.len() {
                return None;
            }
            let start = self.next_start;
            self.next_start += ITER_BATCH_SIZE;
            match self.list.slice(start, start + ITER_BATCH_SIZE) {
                Ok(batch) => self.buffer.extend(batch),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, store};
    use crate::search::backend::QueryBackend;
    use crate::search::fts5_search::SqlBackend;

    #[test]
    fn test_relational_passthrough() {
        let conn = open_in_memory().unwrap();
        let ids: Vec<i64> = (0..5)
            .map(|i| store::insert_video(&conn, &store::NewVideo::new(&format!("video {}", i))).unwrap())
            .collect();
        let backend = SqlBackend::new(&conn);
        let list = NormalizedVideoList::new(backend.finish(backend.match_all()), &conn).unwrap();

        assert_eq!(list.len(), 5);
        assert_eq!(list.get(2).unwrap().unwrap().id, ids[2]);
        assert!(list.get(5).unwrap().is_none());
        let window: Vec<i64> = list.slice(3, 10).unwrap().iter().map(|v| v.id).collect();
        assert_eq!(window, vec![ids[3], ids[4]]);
        assert!(list.slice(4, 2).unwrap().is_empty());
    }

    #[test]
    fn test_iter_crosses_batches() {
        let conn = open_in_memory().unwrap();
        for i in 0..(ITER_BATCH_SIZE + 7) {
            store::insert_video(&conn, &store::NewVideo::new(&format!("video {}", i))).unwrap();
        }
        let backend = SqlBackend::new(&conn);
        let list = NormalizedVideoList::new(backend.finish(backend.match_all()), &conn).unwrap();
        let videos = list.iter().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(videos.len(), ITER_BATCH_SIZE + 7);
    }

    #[test]
    fn test_hydrate_drops_missing_and_inactive() {
        let conn = open_in_memory().unwrap();
        let kept = store::insert_video(&conn, &store::NewVideo::new("kept")).unwrap();
        let rejected = store::insert_video(&conn, &store::NewVideo::new("rejected")).unwrap();
        store::set_status(&conn, rejected, VideoStatus::Rejected).unwrap();

        let videos = hydrate(&conn, &[kept + 100, rejected, kept]).unwrap();
        assert_eq!(videos.iter().map(|v| v.id).collect::<Vec<_>>(), vec![kept]);
    }
}
