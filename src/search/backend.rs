//! The seam between query building and the two query engines
//!
//! Node walking, keyword resolution and sorting are shared; each backend only
//! supplies the leaf predicates (free text, exact match, membership) and the
//! boolean connectives.

use std::fmt;

use super::fts5_search::SqlQuery;
use super::tantivy_search::IndexQuery;
use crate::error::Result;

/// Which engine a query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Relational,
    Index,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Relational => write!(f, "relational"),
            BackendKind::Index => write!(f, "index"),
        }
    }
}

/// Right-hand side of an exact-match test
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
    /// Matches records where the field has no value
    Null,
}

/// Leaf predicate construction for one engine
pub trait QueryBackend<'a> {
    type Predicate;

    fn kind(&self) -> BackendKind;

    /// Matches every record in scope
    fn match_all(&self) -> Self::Predicate;

    /// Active videos of one site
    fn scope(&self, site_id: i64) -> Result<Self::Predicate>;

    /// Free-text containment over the default searchable text; `None` when
    /// the text has nothing searchable in it
    fn text(&self, text: &str) -> Result<Option<Self::Predicate>>;

    fn exact(&self, field: &str, value: &FieldValue) -> Result<Self::Predicate>;

    /// Field equals any of `values`
    fn membership(&self, field: &str, values: &[i64]) -> Result<Self::Predicate>;

    fn and(&self, predicates: Vec<Self::Predicate>) -> Self::Predicate;

    fn or(&self, predicates: Vec<Self::Predicate>) -> Self::Predicate;

    fn not(&self, predicate: Self::Predicate) -> Self::Predicate;

    /// Wrap a finished predicate into a sortable, pageable query
    fn finish(&self, predicate: Self::Predicate) -> BackendQuery<'a>;
}

/// A compiled query tagged with the engine it runs on
pub enum BackendQuery<'a> {
    Relational(SqlQuery<'a>),
    Index(IndexQuery<'a>),
}

impl BackendQuery<'_> {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendQuery::Relational(_) => BackendKind::Relational,
            BackendQuery::Index(_) => BackendKind::Index,
        }
    }

    /// Drop records whose `field` equals `value`
    pub fn exclude(self, field: &str, value: &FieldValue) -> Result<Self> {
        Ok(match self {
            BackendQuery::Relational(q) => BackendQuery::Relational(q.exclude(field, value)?),
            BackendQuery::Index(q) => BackendQuery::Index(q.exclude(field, value)?),
        })
    }

    /// Order by a lookup string: `field` ascending, `-field` descending
    pub fn order_by(self, lookup: &str) -> Result<Self> {
        let order = OrderBy::parse(lookup);
        Ok(match self {
            BackendQuery::Relational(q) => BackendQuery::Relational(q.order_by(order)?),
            BackendQuery::Index(q) => BackendQuery::Index(q.order_by(order)?),
        })
    }
}

impl fmt::Debug for BackendQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendQuery::Relational(q) => f.debug_tuple("Relational").field(q).finish(),
            BackendQuery::Index(q) => f.debug_tuple("Index").field(q).finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn parse(lookup: &str) -> Self {
        match lookup.strip_prefix('-') {
            Some(field) => OrderBy { field: field.to_string(), descending: true },
            None => OrderBy { field: lookup.to_string(), descending: false },
        }
    }

    pub fn lookup(field: &str, descending: bool) -> String {
        if descending {
            format!("-{}", field)
        } else {
            field.to_string()
        }
    }
}
