//! Error types for the search core
//!
//! User input never produces an error here: malformed queries, unknown
//! keywords, bad pagination parameters and stale index entries all degrade
//! gracefully. What remains are store failures and query expressions that
//! the backend cannot represent.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("search index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    #[error("search index is not available")]
    IndexUnavailable,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SearchError {
    /// True for the "backend unavailable / invalid query" class, the only
    /// failures a search call surfaces as fatal.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            SearchError::Database(_)
                | SearchError::Index(_)
                | SearchError::IndexUnavailable
                | SearchError::InvalidQuery(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
