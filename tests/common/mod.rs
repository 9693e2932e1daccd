//! Shared catalogue for the integration tests

#![allow(dead_code)]

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use video_search::db::{open_in_memory, store};
use video_search::search::BackendKind;
use video_search::{FilterValue, SearchConfig, SiteSettings, VideoIndex, VideoSearch, VideoStatus};

pub fn day(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2012, month, day, 12, 0, 0).unwrap()
}

/// Four searchable videos on site 1, plus one unapproved and one on site 2
pub struct Catalogue {
    pub conn: Connection,
    pub blender: i64,
    pub miro: i64,
    pub kernel: i64,
    pub spain: i64,
    pub unapproved: i64,
    pub other_site: i64,
    pub alice: i64,
    pub bob: i64,
    pub feed: i64,
    pub linux: i64,
}

impl Catalogue {
    pub fn new() -> Self {
        let conn = open_in_memory().unwrap();
        let alice = store::create_user(&conn, "alice", "Alice", "Liddell").unwrap();
        let bob = store::create_user(&conn, "bob", "Bob", "Builder").unwrap();
        let feed = store::create_feed(&conn, 1, "Miro Blog").unwrap();
        let linux = store::create_category(&conn, 1, "Linux", "linux").unwrap();
        let miro_category = store::create_category(&conn, 1, "Miro", "miro").unwrap();

        let mut video = store::NewVideo::new("Blender Open Movie");
        video.description = "<p>An <b>open</b> movie made with Blender</p>".to_string();
        video.user_id = Some(alice);
        video.when_submitted = day(1, 8);
        video.when_approved = Some(day(1, 10));
        video.when_published = Some(Utc.with_ymd_and_hms(2010, 5, 1, 0, 0, 0).unwrap());
        video.last_featured = Some(day(3, 1));
        video.thumbnail_path = Some("localtv/video_thumbs/blender/orig.png".to_string());
        let blender = store::insert_video(&conn, &video).unwrap();
        store::set_tags(&conn, blender, &["blender", "film"]).unwrap();
        store::set_categories(&conn, blender, &[linux]).unwrap();

        let mut video = store::NewVideo::new("Miro Player Tour");
        video.feed_id = Some(feed);
        video.video_service_user = "pculture".to_string();
        video.when_submitted = day(1, 15);
        video.when_approved = Some(day(1, 20));
        let miro = store::insert_video(&conn, &video).unwrap();
        store::set_tags(&conn, miro, &["miro"]).unwrap();
        store::set_categories(&conn, miro, &[miro_category]).unwrap();

        let mut video = store::NewVideo::new("Linux Kernel Talk");
        video.when_submitted = day(1, 5);
        video.last_featured = Some(day(2, 15));
        let kernel = store::insert_video(&conn, &video).unwrap();
        store::set_tags(&conn, kernel, &["linux", "film"]).unwrap();
        store::set_categories(&conn, kernel, &[linux]).unwrap();
        store::set_authors(&conn, kernel, &[bob]).unwrap();

        let mut video = store::NewVideo::new("Espa\u{f1}a en v\u{ed}deo");
        video.when_submitted = day(1, 1);
        video.when_published = Some(day(2, 1));
        let spain = store::insert_video(&conn, &video).unwrap();

        let mut video = store::NewVideo::new("Blender Unapproved");
        video.status = VideoStatus::Unapproved;
        video.when_submitted = day(1, 2);
        let unapproved = store::insert_video(&conn, &video).unwrap();

        let mut video = store::NewVideo::new("Blender Elsewhere");
        video.site_id = 2;
        video.when_submitted = day(1, 3);
        let other_site = store::insert_video(&conn, &video).unwrap();

        for _ in 0..3 {
            store::record_watch(&conn, miro, day(4, 1)).unwrap();
        }
        store::record_watch(&conn, blender, day(4, 2)).unwrap();

        Self {
            conn,
            blender,
            miro,
            kernel,
            spain,
            unapproved,
            other_site,
            alice,
            bob,
            feed,
            linux,
        }
    }

    pub fn index(&self) -> VideoIndex {
        VideoIndex::build(&self.conn, &SearchConfig::default()).unwrap()
    }

    pub fn searchable(&self) -> Vec<i64> {
        let mut ids = vec![self.blender, self.miro, self.kernel, self.spain];
        ids.sort();
        ids
    }
}

pub fn filters(pairs: &[(&str, FilterValue)]) -> HashMap<String, FilterValue> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

pub fn service<'a>(
    catalogue: &'a Catalogue,
    index: &'a VideoIndex,
    config: &'a SearchConfig,
    use_original_date: bool,
) -> VideoSearch<'a> {
    let settings = SiteSettings { site_id: 1, use_original_date };
    VideoSearch::new(&catalogue.conn, Some(index), config, settings)
}

/// Ids in result order
pub fn ordered_ids(
    search: &VideoSearch<'_>,
    kind: BackendKind,
    query: &str,
    filters: &HashMap<String, FilterValue>,
    sort: Option<&str>,
) -> Vec<i64> {
    let outcome = search.search_on(kind, query, filters, sort).unwrap();
    outcome
        .videos
        .iter()
        .map(|video| video.unwrap().id)
        .collect()
}

/// Ids sorted, for set comparisons
pub fn id_set(
    search: &VideoSearch<'_>,
    kind: BackendKind,
    query: &str,
    filters: &HashMap<String, FilterValue>,
) -> Vec<i64> {
    let mut ids = ordered_ids(search, kind, query, filters, None);
    ids.sort();
    ids
}
