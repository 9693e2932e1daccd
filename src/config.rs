//! Search configuration
//!
//! `SearchConfig` holds the per-deployment knobs (which backend to query,
//! default sort, feed length, thumbnail sizes) and is read from JSON.
//! `SiteSettings` holds the per-site switches that live in the database's
//! `metadata` table, most importantly `use_original_date`.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SearchError};

/// Default number of items in a feed page
pub const DEFAULT_FEED_LENGTH: usize = 30;
/// Largest page a caller may request
pub const DEFAULT_MAX_COUNT: usize = 100;

/// Which engine answers search calls
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    #[default]
    Relational,
    Index,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub backend: BackendChoice,
    pub site_id: i64,
    /// Sort used when the request names none or an unknown one
    pub default_sort: String,
    pub feed_length: usize,
    pub max_count: Option<usize>,
    pub thumbnail_sizes: Vec<(u32, u32)>,
    /// Prefix prepended to thumbnail storage paths
    pub media_url: String,
    pub index_writer_heap: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Relational,
            site_id: 1,
            default_sort: "-date".to_string(),
            feed_length: DEFAULT_FEED_LENGTH,
            max_count: Some(DEFAULT_MAX_COUNT),
            thumbnail_sizes: vec![(375, 295)],
            media_url: "/media/".to_string(),
            index_writer_heap: 50_000_000, // 50MB buffer
        }
    }
}

impl SearchConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SearchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.feed_length == 0 {
            return Err(SearchError::Config("feed_length must be positive".to_string()));
        }
        if let Some(max) = self.max_count {
            if max < self.feed_length {
                return Err(SearchError::Config(format!(
                    "max_count ({}) is smaller than feed_length ({})",
                    max, self.feed_length
                )));
            }
        }
        // tantivy refuses writer heaps below 15MB
        if self.index_writer_heap < 15_000_000 {
            return Err(SearchError::Config(
                "index_writer_heap must be at least 15MB".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-site settings stored in the `metadata` table
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SiteSettings {
    pub site_id: i64,
    /// Prefer the externally sourced publish date when ordering by date
    pub use_original_date: bool,
}

impl SiteSettings {
    pub fn new(site_id: i64) -> Self {
        Self {
            site_id,
            use_original_date: true,
        }
    }

    fn key(site_id: i64) -> String {
        format!("site:{}:use_original_date", site_id)
    }

    /// Load settings for a site, defaulting when nothing has been saved
    pub fn load(conn: &Connection, site_id: i64) -> Result<Self> {
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [Self::key(site_id)],
                |row| row.get(0),
            )
            .optional()?;

        let mut settings = Self::new(site_id);
        if let Some(value) = stored {
            settings.use_original_date = value == "1";
        }
        Ok(settings)
    }

    pub fn save(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![
                Self::key(self.site_id),
                if self.use_original_date { "1" } else { "0" }
            ],
        )?;
        Ok(())
    }
}
