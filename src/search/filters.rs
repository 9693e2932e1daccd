//! Structured filters from listing views
//!
//! Filters arrive as a name → value map (`tag=music`, `author=[3, 7]`) and
//! narrow a search the same way keywords do. Values are cleaned to primary
//! keys first; a single key becomes an exact match and several keys a
//! membership test.

use std::collections::HashMap;

use log::warn;

use super::backend::{FieldValue, QueryBackend};
use crate::db::{KeywordResolver, Related};
use crate::error::Result;
use crate::models::FilterValue;

/// What a filter or keyword constrains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    /// One field of the video
    Field { related: Related, field: &'static str },
    /// Submitter or any of the credited authors
    UserOrAuthor,
}

impl FilterTarget {
    pub fn related(self) -> Related {
        match self {
            FilterTarget::Field { related, .. } => related,
            FilterTarget::UserOrAuthor => Related::User,
        }
    }

    /// Filter names accepted in the filter map
    pub fn for_filter(name: &str) -> Option<Self> {
        let target = match name {
            "tag" => FilterTarget::Field { related: Related::Tag, field: "tags" },
            "category" => FilterTarget::Field { related: Related::Category, field: "categories" },
            "author" | "user" => FilterTarget::UserOrAuthor,
            "playlist" => FilterTarget::Field { related: Related::Playlist, field: "playlists" },
            "feed" => FilterTarget::Field { related: Related::Feed, field: "feed" },
            _ => return None,
        };
        Some(target)
    }

    /// Keys accepted in `key:value` query tokens
    pub fn for_keyword(key: &str) -> Option<Self> {
        let target = match key.to_lowercase().as_str() {
            "tag" => FilterTarget::Field { related: Related::Tag, field: "tags" },
            "category" => FilterTarget::Field { related: Related::Category, field: "categories" },
            "user" => FilterTarget::UserOrAuthor,
            "feed" => FilterTarget::Field { related: Related::Feed, field: "feed" },
            "search" => FilterTarget::Field { related: Related::SavedSearch, field: "search" },
            "playlist" => FilterTarget::Field { related: Related::Playlist, field: "playlists" },
            _ => return None,
        };
        Some(target)
    }

    /// Predicate matching any of `ids`
    pub fn predicate<'b, B: QueryBackend<'b>>(self, backend: &B, ids: &[i64]) -> Result<B::Predicate> {
        let on = |field: &str| -> Result<B::Predicate> {
            match ids {
                [single] => backend.exact(field, &FieldValue::Int(*single)),
                many => backend.membership(field, many),
            }
        };
        match self {
            FilterTarget::Field { field, .. } => on(field),
            FilterTarget::UserOrAuthor => Ok(backend.or(vec![on("user")?, on("authors")?])),
        }
    }
}

fn resolve_value(resolver: &KeywordResolver<'_>, related: Related, value: &FilterValue) -> Result<Option<i64>> {
    match value {
        FilterValue::Int(pk) => resolver.resolve_pk(related, *pk),
        FilterValue::Text(token) => resolver.resolve(related, token.trim()),
        FilterValue::List(_) => Ok(None),
    }
}

/// Clean filter values to primary keys, dropping what does not resolve
pub fn clean_values(
    resolver: &KeywordResolver<'_>,
    related: Related,
    value: &FilterValue,
) -> Result<Vec<i64>> {
    let mut ids = Vec::new();
    for item in value.flatten() {
        match resolve_value(resolver, related, item)? {
            Some(id) if !ids.contains(&id) => ids.push(id),
            Some(_) => {}
            None => warn!("[Filters] No {:?} matches {:?}", related, item),
        }
    }
    Ok(ids)
}

/// AND of all recognised filters, or `None` when none constrain anything
pub fn filter_predicate<'b, B: QueryBackend<'b>>(
    resolver: &KeywordResolver<'_>,
    filters: &HashMap<String, FilterValue>,
    backend: &B,
) -> Result<Option<B::Predicate>> {
    let mut names: Vec<&String> = filters.keys().collect();
    names.sort();

    let mut clauses = Vec::new();
    for name in names {
        let Some(target) = FilterTarget::for_filter(name) else {
            warn!("[Filters] Ignoring unknown filter '{}'", name);
            continue;
        };
        let ids = clean_values(resolver, target.related(), &filters[name])?;
        if ids.is_empty() {
            continue;
        }
        clauses.push(target.predicate(backend, &ids)?);
    }

    if clauses.is_empty() {
        Ok(None)
    } else {
        Ok(Some(backend.and(clauses)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, store};
    use crate::search::fts5_search::SqlBackend;

    #[test]
    fn test_single_value_is_exact() {
        let conn = open_in_memory().unwrap();
        let video = store::insert_video(&conn, &store::NewVideo::new("v")).unwrap();
        let tag = store::set_tags(&conn, video, &["music"]).unwrap()[0];
        let resolver = KeywordResolver::new(&conn, 1);
        let backend = SqlBackend::new(&conn);

        let mut filters = HashMap::new();
        filters.insert("tag".to_string(), FilterValue::from("music"));
        let expr = filter_predicate(&resolver, &filters, &backend).unwrap().unwrap();
        assert_eq!(expr, backend.exact("tags", &FieldValue::Int(tag)).unwrap());
    }

    #[test]
    fn test_many_values_are_membership() {
        let conn = open_in_memory().unwrap();
        let video = store::insert_video(&conn, &store::NewVideo::new("v")).unwrap();
        let tags = store::set_tags(&conn, video, &["a", "b"]).unwrap();
        let resolver = KeywordResolver::new(&conn, 1);
        let backend = SqlBackend::new(&conn);

        let mut filters = HashMap::new();
        filters.insert(
            "tag".to_string(),
            FilterValue::List(vec![
                FilterValue::from("a"),
                FilterValue::Int(tags[1]),
                FilterValue::from("A"),
                FilterValue::from("missing"),
            ]),
        );
        let expr = filter_predicate(&resolver, &filters, &backend).unwrap().unwrap();
        assert_eq!(expr, backend.membership("tags", &tags).unwrap());
    }

    #[test]
    fn test_unknown_and_unresolved_filters_add_nothing() {
        let conn = open_in_memory().unwrap();
        let resolver = KeywordResolver::new(&conn, 1);
        let backend = SqlBackend::new(&conn);

        let mut filters = HashMap::new();
        filters.insert("colour".to_string(), FilterValue::from("red"));
        filters.insert("category".to_string(), FilterValue::from("nope"));
        assert!(filter_predicate(&resolver, &filters, &backend).unwrap().is_none());
    }

    #[test]
    fn test_keyword_keys_are_case_insensitive() {
        assert_eq!(
            FilterTarget::for_keyword("TAG"),
            FilterTarget::for_keyword("tag")
        );
        assert!(FilterTarget::for_keyword("colour").is_none());
        // Saved searches are only reachable as keywords
        assert!(FilterTarget::for_filter("search").is_none());
    }
}
