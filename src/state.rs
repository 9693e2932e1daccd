//! Search state
//!
//! Owns everything a search needs:
//! - SQLite connection (catalogue and FTS5 table)
//! - tantivy index, when the index backend is configured
//! - Configuration and per-site settings

use log::info;
use rusqlite::Connection;
use std::path::Path;

use crate::config::{BackendChoice, SearchConfig, SiteSettings};
use crate::db;
use crate::error::Result;
use crate::search::{VideoIndex, VideoSearch};

pub struct SearchState {
    pub conn: Connection,
    pub index: Option<VideoIndex>,
    pub config: SearchConfig,
    pub settings: SiteSettings,
}

impl SearchState {
    /// Open a database file and, for the index backend, build the index
    pub fn open(db_path: &Path, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        Self::with_connection(db::open(db_path)?, config)
    }

    pub fn open_in_memory(config: SearchConfig) -> Result<Self> {
        config.validate()?;
        Self::with_connection(db::open_in_memory()?, config)
    }

    /// Read the config from a JSON file, then [`SearchState::open`]
    pub fn from_config_file(db_path: &Path, config_path: &Path) -> Result<Self> {
        Self::open(db_path, SearchConfig::from_json_file(config_path)?)
    }

    fn with_connection(conn: Connection, config: SearchConfig) -> Result<Self> {
        let settings = SiteSettings::load(&conn, config.site_id)?;
        let mut state = Self { conn, index: None, config, settings };
        if state.config.backend == BackendChoice::Index {
            state.rebuild_index()?;
        }
        Ok(state)
    }

    /// Build the index from scratch, creating it if needed
    pub fn rebuild_index(&mut self) -> Result<usize> {
        if let Some(index) = &self.index {
            return index.rebuild(&self.conn);
        }
        let index = VideoIndex::build(&self.conn, &self.config)?;
        let count = index.num_docs() as usize;
        self.index = Some(index);
        Ok(count)
    }

    /// Pick up changes to one video; call [`SearchState::commit_index`] after
    pub fn reindex_video(&self, video_id: i64) -> Result<()> {
        match &self.index {
            Some(index) => index.index_video(&self.conn, video_id),
            None => Ok(()),
        }
    }

    pub fn commit_index(&self) -> Result<()> {
        match &self.index {
            Some(index) => index.commit(),
            None => Ok(()),
        }
    }

    /// Change the date preference and persist it
    pub fn set_use_original_date(&mut self, enabled: bool) -> Result<()> {
        self.settings.use_original_date = enabled;
        self.settings.save(&self.conn)?;
        info!(
            "[State] use_original_date = {} for site {}",
            enabled, self.settings.site_id
        );
        Ok(())
    }

    pub fn search_service(&self) -> VideoSearch<'_> {
        VideoSearch::new(&self.conn, self.index.as_ref(), &self.config, self.settings)
    }
}
