//! Video search
//!
//! This module provides:
//! - Query tokenizing (terms, phrases, negation, keywords, OR groups)
//! - Query building against SQLite FTS5 or a tantivy index
//! - Structured filters and named sorts
//! - A result list that always yields `Video` records
//! - OpenSearch paging and batched thumbnail lookups

pub mod backend;
pub mod builder;
pub mod filters;
pub mod fts5_search;
pub mod normalize;
pub mod opensearch;
pub mod service;
pub mod sort;
pub mod tantivy_search;
pub mod thumbnails;
pub mod tokenizer;

pub use backend::{BackendKind, BackendQuery, FieldValue, OrderBy, QueryBackend};
pub use builder::QueryBuilder;
pub use filters::{filter_predicate, FilterTarget};
pub use fts5_search::{SqlBackend, SqlExpr, SqlQuery};
pub use normalize::{NormalizedVideoList, VideoIter};
pub use opensearch::{window, OpenSearchMetadata, OpenSearchWindow, Page, WindowDefaults, OPENSEARCH_NAMESPACE};
pub use service::{SearchOutcome, VideoSearch};
pub use sort::{
    approved_sort, featured_sort, BestDateSort, DummySort, FieldSort, PopularSort, SortRegistry, SortSpec,
    SortStrategy,
};
pub use tantivy_search::{IndexBackend, IndexQuery, VideoIndex};
pub use thumbnails::{bulk_adjust, AdjustedThumbnails, SqliteThumbnailStore, ThumbnailRef, ThumbnailStore};
pub use tokenizer::{tokenize, Node};

/// Whether `text` has anything a word tokenizer would keep
pub fn has_searchable_text(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}
