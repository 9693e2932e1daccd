//! Resolving keyword and filter values to primary keys
//!
//! A value such as `category:linux` or `user:SuperUser` names a related
//! object by one of its human identifiers or by its numeric pk. Each
//! identifier field is tried with an exact match first and then a
//! case-insensitive one; the pk is tried last.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// Objects a video can be filtered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Related {
    Category,
    Feed,
    SavedSearch,
    Tag,
    User,
    Playlist,
}

impl Related {
    fn table(self) -> &'static str {
        match self {
            Related::Category => "categories",
            Related::Feed => "feeds",
            Related::SavedSearch => "saved_searches",
            Related::Tag => "tags",
            Related::User => "users",
            Related::Playlist => "playlists",
        }
    }

    /// Identifier columns in the order they are tried
    fn identifier_fields(self) -> &'static [&'static str] {
        match self {
            Related::Category => &["name", "slug"],
            Related::Feed => &["name"],
            Related::SavedSearch => &["query_string"],
            Related::Tag => &["name"],
            Related::User => &["username"],
            Related::Playlist => &[],
        }
    }

    fn is_site_scoped(self) -> bool {
        matches!(self, Related::Category | Related::Feed | Related::SavedSearch)
    }
}

/// Looks related objects up in the relational store for one site
pub struct KeywordResolver<'a> {
    conn: &'a Connection,
    site_id: i64,
}

impl<'a> KeywordResolver<'a> {
    pub fn new(conn: &'a Connection, site_id: i64) -> Self {
        Self { conn, site_id }
    }

    fn lookup(&self, related: Related, condition: &str, value: &dyn rusqlite::ToSql) -> Result<Option<i64>> {
        let mut sql = format!(
            "SELECT id FROM {} WHERE {}",
            related.table(),
            condition
        );
        if related.is_site_scoped() {
            sql.push_str(" AND site_id = ?2");
        }
        // Several matches are possible with case-insensitive lookups; pick
        // the oldest so that resolution is stable.
        sql.push_str(" ORDER BY id LIMIT 1");

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let found = if related.is_site_scoped() {
            stmt.query_row(params![value, self.site_id], |row| row.get(0)).optional()?
        } else {
            stmt.query_row(params![value], |row| row.get(0)).optional()?
        };
        Ok(found)
    }

    /// Resolve a pk, checking that the object exists for this site
    pub fn resolve_pk(&self, related: Related, pk: i64) -> Result<Option<i64>> {
        self.lookup(related, "id = ?1", &pk)
    }

    /// Resolve a human identifier or a numeric pk
    pub fn resolve(&self, related: Related, token: &str) -> Result<Option<i64>> {
        if token.is_empty() {
            return Ok(None);
        }

        for field in related.identifier_fields() {
            let exact = format!("{} = ?1", field);
            if let Some(id) = self.lookup(related, &exact, &token)? {
                return Ok(Some(id));
            }
            let iexact = format!("{} = ?1 COLLATE NOCASE", field);
            if let Some(id) = self.lookup(related, &iexact, &token)? {
                return Ok(Some(id));
            }
        }

        if let Ok(pk) = token.parse::<i64>() {
            if let Some(id) = self.resolve_pk(related, pk)? {
                return Ok(Some(id));
            }
        }

        if related == Related::Playlist {
            return self.resolve_playlist_path(token);
        }

        Ok(None)
    }

    /// `username/slug` form for playlists
    fn resolve_playlist_path(&self, token: &str) -> Result<Option<i64>> {
        let Some((username, slug)) = token.split_once('/') else {
            return Ok(None);
        };
        let found = self
            .conn
            .query_row(
                "SELECT p.id FROM playlists p JOIN users u ON u.id = p.user_id
                 WHERE u.username = ?1 AND p.slug = ?2
                 ORDER BY p.id LIMIT 1",
                params![username, slug],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found)
    }
}
