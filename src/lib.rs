//! Video catalogue search
//!
//! Free-text queries with keywords and OR groups, compiled for either SQLite
//! (FTS5) or a tantivy index, filtered, sorted, and returned as one uniform
//! list of videos with OpenSearch paging on top.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod search;
pub mod state;

pub use config::{BackendChoice, SearchConfig, SiteSettings};
pub use error::{Result, SearchError};
pub use models::{FilterValue, Video, VideoStatus};
pub use search::{
    tokenize, Node, NormalizedVideoList, OpenSearchMetadata, OpenSearchWindow, Page, SearchOutcome,
    SortSpec, VideoIndex, VideoSearch,
};
pub use state::SearchState;
