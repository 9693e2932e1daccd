//! The search entry point used by listing and feed views
//!
//! One call tokenizes the raw query, applies structured filters, compiles
//! everything for the configured backend, sorts, and wraps the result in a
//! [`NormalizedVideoList`].

use std::collections::HashMap;

use log::debug;
use rusqlite::Connection;

use super::backend::{BackendKind, BackendQuery, QueryBackend};
use super::builder::QueryBuilder;
use super::filters::filter_predicate;
use super::fts5_search::SqlBackend;
use super::normalize::NormalizedVideoList;
use super::opensearch::{window, OpenSearchMetadata, Page, WindowDefaults};
use super::sort::{SortRegistry, SortSpec};
use super::tantivy_search::{IndexBackend, VideoIndex};
use super::thumbnails::{bulk_adjust, AdjustedThumbnails, SqliteThumbnailStore};
use super::tokenizer::{tokenize, Node};
use crate::config::{BackendChoice, SearchConfig, SiteSettings};
use crate::db::KeywordResolver;
use crate::error::{Result, SearchError};
use crate::models::{FilterValue, Video};

/// Matches plus the sort that was actually applied
#[derive(Debug)]
pub struct SearchOutcome<'a> {
    pub videos: NormalizedVideoList<'a>,
    pub effective_sort: SortSpec,
}

pub struct VideoSearch<'a> {
    conn: &'a Connection,
    index: Option<&'a VideoIndex>,
    config: &'a SearchConfig,
    settings: SiteSettings,
    sorts: SortRegistry,
}

impl<'a> VideoSearch<'a> {
    pub fn new(
        conn: &'a Connection,
        index: Option<&'a VideoIndex>,
        config: &'a SearchConfig,
        settings: SiteSettings,
    ) -> Self {
        Self {
            conn,
            index,
            config,
            sorts: SortRegistry::new(&settings, &config.default_sort),
            settings,
        }
    }

    pub fn sorts(&self) -> &SortRegistry {
        &self.sorts
    }

    fn configured_backend(&self) -> BackendKind {
        match self.config.backend {
            BackendChoice::Relational => BackendKind::Relational,
            BackendChoice::Index => BackendKind::Index,
        }
    }

    /// Search with the configured backend
    pub fn search(
        &self,
        raw_query: &str,
        filters: &HashMap<String, FilterValue>,
        sort_name: Option<&str>,
    ) -> Result<SearchOutcome<'a>> {
        self.search_on(self.configured_backend(), raw_query, filters, sort_name)
    }

    /// Search with an explicit backend
    pub fn search_on(
        &self,
        kind: BackendKind,
        raw_query: &str,
        filters: &HashMap<String, FilterValue>,
        sort_name: Option<&str>,
    ) -> Result<SearchOutcome<'a>> {
        let nodes = tokenize(raw_query);
        debug!("[Search] {:?} -> {:?}", raw_query, nodes);
        let builder = QueryBuilder::new(KeywordResolver::new(self.conn, self.settings.site_id));

        let query = match kind {
            BackendKind::Relational => {
                self.compile(&builder, &nodes, filters, &SqlBackend::new(self.conn))?
            }
            BackendKind::Index => {
                let index = self.index.ok_or(SearchError::IndexUnavailable)?;
                self.compile(&builder, &nodes, filters, &IndexBackend::new(index))?
            }
        };

        let (effective_sort, sort) = self.sorts.resolve(sort_name);
        let query = sort.sort(query, effective_sort.descending)?;
        let videos = NormalizedVideoList::new(query, self.conn)?;
        Ok(SearchOutcome { videos, effective_sort })
    }

    fn compile<B: QueryBackend<'a>>(
        &self,
        builder: &QueryBuilder<'_>,
        nodes: &[Node],
        filters: &HashMap<String, FilterValue>,
        backend: &B,
    ) -> Result<BackendQuery<'a>> {
        let mut scope = vec![backend.scope(self.settings.site_id)?];
        if let Some(predicate) = filter_predicate(builder.resolver(), filters, backend)? {
            scope.push(predicate);
        }
        builder.build(nodes, backend.and(scope), backend)
    }

    /// One OpenSearch page of a search, with thumbnails for the page
    pub fn page(
        &self,
        raw_query: &str,
        filters: &HashMap<String, FilterValue>,
        sort_name: Option<&str>,
        params: &HashMap<String, String>,
    ) -> Result<Page> {
        let outcome = self.search(raw_query, filters, sort_name)?;
        let window = window(params, WindowDefaults::from(self.config));
        let videos = outcome.videos.slice(window.start, window.end())?;
        let thumbnails = self.thumbnails(&videos)?;
        // Reported only once the slice has been taken
        let metadata = OpenSearchMetadata::new(window, outcome.videos.len());
        Ok(Page { window, videos, metadata, thumbnails, effective_sort: outcome.effective_sort })
    }

    /// Configured thumbnail sizes for a page of videos
    pub fn thumbnails(&self, videos: &[Video]) -> Result<AdjustedThumbnails> {
        let store = SqliteThumbnailStore::new(self.conn, &self.config.media_url);
        bulk_adjust(videos, &self.config.thumbnail_sizes, &store)
    }
}
