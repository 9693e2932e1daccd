//! Relational backend: SQLite rows plus FTS5 for free text
//!
//! Predicates compile to SQL fragments with positional parameters. Free-text
//! terms go through the `videos_fts` table, whose unicode61 tokenizer handles
//! every script; structured fields are plain column or join-table tests.

use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::fmt;

use super::backend::{BackendKind, BackendQuery, FieldValue, OrderBy, QueryBackend};
use super::has_searchable_text;
use crate::db::records::{video_from_row, VIDEO_COLUMNS};
use crate::error::{Result, SearchError};
use crate::models::{Video, VideoStatus};

/// A SQL boolean expression with its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlExpr {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlExpr {
    fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self { sql: sql.into(), params }
    }

    fn constant(truth: bool) -> Self {
        Self::new(if truth { "1" } else { "0" }, Vec::new())
    }

    fn join(exprs: Vec<SqlExpr>, connective: &str, empty: bool) -> SqlExpr {
        match exprs.len() {
            0 => SqlExpr::constant(empty),
            1 => exprs.into_iter().next().unwrap_or_else(|| SqlExpr::constant(empty)),
            _ => {
                let mut params = Vec::new();
                let parts: Vec<String> = exprs
                    .into_iter()
                    .map(|e| {
                        params.extend(e.params);
                        format!("({})", e.sql)
                    })
                    .collect();
                SqlExpr::new(parts.join(connective), params)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Text,
    Timestamp,
}

/// Where a logical field lives in the schema
#[derive(Debug, Clone, Copy)]
enum SqlField {
    Column { column: &'static str, kind: ColumnKind },
    /// Many-to-many through a join table keyed on `video_id`
    Relation { table: &'static str, column: &'static str },
}

fn sql_field(name: &str) -> Result<SqlField> {
    use ColumnKind::*;
    let column = |column, kind| SqlField::Column { column, kind };
    let field = match name {
        "id" => column("v.id", Int),
        "site" => column("v.site_id", Int),
        "status" => column("v.status", Int),
        "feed" => column("v.feed_id", Int),
        "user" => column("v.user_id", Int),
        "search" => column("v.search_id", Int),
        "name" => column("v.name", Text),
        "video_service_user" => column("v.video_service_user", Text),
        "when_submitted" => column("v.when_submitted", Timestamp),
        "when_approved" => column("v.when_approved", Timestamp),
        "when_published" => column("v.when_published", Timestamp),
        "last_featured" => column("v.last_featured", Timestamp),
        "tags" => SqlField::Relation { table: "video_tags", column: "tag_id" },
        "categories" => SqlField::Relation { table: "video_categories", column: "category_id" },
        "authors" => SqlField::Relation { table: "video_authors", column: "user_id" },
        "playlists" => SqlField::Relation { table: "playlist_items", column: "playlist_id" },
        other => {
            return Err(SearchError::InvalidQuery(format!(
                "unknown relational field '{}'",
                other
            )))
        }
    };
    Ok(field)
}

fn bind(field: &str, kind: ColumnKind, value: &FieldValue) -> Result<Value> {
    match (kind, value) {
        (ColumnKind::Int, FieldValue::Int(v)) => Ok(Value::Integer(*v)),
        (ColumnKind::Text | ColumnKind::Timestamp, FieldValue::Text(v)) => Ok(Value::Text(v.clone())),
        _ => Err(SearchError::InvalidQuery(format!(
            "value {:?} has the wrong type for field '{}'",
            value, field
        ))),
    }
}

/// Quote text as a single FTS5 phrase so query syntax in user input is inert
pub fn fts_phrase(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Predicate construction against the SQLite store
pub struct SqlBackend<'a> {
    conn: &'a Connection,
}

impl<'a> SqlBackend<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl<'a> QueryBackend<'a> for SqlBackend<'a> {
    type Predicate = SqlExpr;

    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn match_all(&self) -> SqlExpr {
        SqlExpr::constant(true)
    }

    fn scope(&self, site_id: i64) -> Result<SqlExpr> {
        Ok(self.and(vec![
            self.exact("site", &FieldValue::Int(site_id))?,
            self.exact("status", &FieldValue::Int(VideoStatus::Active.as_i64()))?,
        ]))
    }

    fn text(&self, text: &str) -> Result<Option<SqlExpr>> {
        if !has_searchable_text(text) {
            return Ok(None);
        }
        Ok(Some(SqlExpr::new(
            "v.id IN (SELECT rowid FROM videos_fts WHERE videos_fts MATCH ?)",
            vec![Value::Text(fts_phrase(text))],
        )))
    }

    fn exact(&self, field: &str, value: &FieldValue) -> Result<SqlExpr> {
        let expr = match (sql_field(field)?, value) {
            (SqlField::Column { column, .. }, FieldValue::Null) => {
                SqlExpr::new(format!("{} IS NULL", column), Vec::new())
            }
            // `IS` never yields NULL, so a negated test still matches NULL rows
            (SqlField::Column { column, kind }, value) => {
                SqlExpr::new(format!("{} IS ?", column), vec![bind(field, kind, value)?])
            }
            (SqlField::Relation { table, .. }, FieldValue::Null) => SqlExpr::new(
                format!("NOT EXISTS (SELECT 1 FROM {} r WHERE r.video_id = v.id)", table),
                Vec::new(),
            ),
            (SqlField::Relation { table, column }, value) => SqlExpr::new(
                format!("v.id IN (SELECT video_id FROM {} WHERE {} = ?)", table, column),
                vec![bind(field, ColumnKind::Int, value)?],
            ),
        };
        Ok(expr)
    }

    fn membership(&self, field: &str, values: &[i64]) -> Result<SqlExpr> {
        if values.is_empty() {
            return Ok(SqlExpr::constant(false));
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        let params: Vec<Value> = values.iter().map(|v| Value::Integer(*v)).collect();
        let expr = match sql_field(field)? {
            SqlField::Column { column, kind: ColumnKind::Int } => {
                SqlExpr::new(format!("COALESCE({} IN ({}), 0)", column, placeholders), params)
            }
            SqlField::Column { .. } => {
                return Err(SearchError::InvalidQuery(format!(
                    "membership tests need an integer field, '{}' is not",
                    field
                )))
            }
            SqlField::Relation { table, column } => SqlExpr::new(
                format!(
                    "v.id IN (SELECT video_id FROM {} WHERE {} IN ({}))",
                    table, column, placeholders
                ),
                params,
            ),
        };
        Ok(expr)
    }

    fn and(&self, predicates: Vec<SqlExpr>) -> SqlExpr {
        SqlExpr::join(predicates, " AND ", true)
    }

    fn or(&self, predicates: Vec<SqlExpr>) -> SqlExpr {
        SqlExpr::join(predicates, " OR ", false)
    }

    fn not(&self, predicate: SqlExpr) -> SqlExpr {
        SqlExpr::new(format!("NOT ({})", predicate.sql), predicate.params)
    }

    fn finish(&self, predicate: SqlExpr) -> BackendQuery<'a> {
        BackendQuery::Relational(SqlQuery::new(self.conn, predicate))
    }
}

/// A filtered, optionally annotated and ordered selection of videos
pub struct SqlQuery<'a> {
    conn: &'a Connection,
    predicate: SqlExpr,
    exclusions: Vec<SqlExpr>,
    /// Computed select expressions, by alias
    annotations: Vec<(String, String)>,
    order: Option<OrderBy>,
}

impl<'a> SqlQuery<'a> {
    pub fn new(conn: &'a Connection, predicate: SqlExpr) -> Self {
        Self {
            conn,
            predicate,
            exclusions: Vec::new(),
            annotations: Vec::new(),
            order: None,
        }
    }

    pub fn predicate(&self) -> &SqlExpr {
        &self.predicate
    }

    pub fn ordering(&self) -> Option<&OrderBy> {
        self.order.as_ref()
    }

    pub fn exclude(mut self, field: &str, value: &FieldValue) -> Result<Self> {
        let expr = SqlBackend::new(self.conn).exact(field, value)?;
        self.exclusions.push(expr);
        Ok(self)
    }

    /// Attach a computed value that can be ordered on by `alias`
    pub fn annotate(mut self, alias: &str, expression: &str) -> Self {
        self.annotations.retain(|(existing, _)| existing != alias);
        self.annotations.push((alias.to_string(), expression.to_string()));
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Result<Self> {
        let annotated = self.annotations.iter().any(|(alias, _)| *alias == order.field);
        if !annotated {
            match sql_field(&order.field)? {
                SqlField::Column { .. } => {}
                SqlField::Relation { .. } => {
                    return Err(SearchError::InvalidQuery(format!(
                        "cannot order by multi-valued field '{}'",
                        order.field
                    )))
                }
            }
        }
        self.order = Some(order);
        Ok(self)
    }

    fn where_clause(&self) -> SqlExpr {
        let backend = SqlBackend::new(self.conn);
        let mut parts = vec![self.predicate.clone()];
        parts.extend(self.exclusions.iter().cloned().map(|e| backend.not(e)));
        backend.and(parts)
    }

    fn order_clause(&self) -> String {
        let Some(order) = &self.order else {
            return "v.id".to_string();
        };
        let key = if self.annotations.iter().any(|(alias, _)| *alias == order.field) {
            order.field.clone()
        } else {
            match sql_field(&order.field) {
                Ok(SqlField::Column { column, .. }) => column.to_string(),
                _ => "v.id".to_string(),
            }
        };
        // Ties fall back to the primary key so repeated sorts agree
        format!("{} {}, v.id", key, if order.descending { "DESC" } else { "ASC" })
    }

    pub fn count(&self) -> Result<usize> {
        let filter = self.where_clause();
        let sql = format!("SELECT COUNT(*) FROM videos v WHERE {}", filter.sql);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(filter.params.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Fetch one window of the ordered result
    pub fn fetch(&self, offset: usize, limit: usize) -> Result<Vec<Video>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let filter = self.where_clause();
        let annotations: String = self
            .annotations
            .iter()
            .map(|(alias, expr)| format!(", {} AS {}", expr, alias))
            .collect();
        let sql = format!(
            "SELECT {}{} FROM videos v WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            VIDEO_COLUMNS,
            annotations,
            filter.sql,
            self.order_clause()
        );
        debug!("[SQL] {}", sql);

        let mut params = filter.params;
        params.push(Value::Integer(limit as i64));
        params.push(Value::Integer(offset as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), video_from_row)?;
        let videos = rows.collect::<rusqlite::Result<Vec<Video>>>()?;
        Ok(videos)
    }
}

impl fmt::Debug for SqlQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlQuery")
            .field("where", &self.where_clause().sql)
            .field("annotations", &self.annotations)
            .field("order", &self.order_clause())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn test_fts_phrase_escapes_quotes() {
        assert_eq!(fts_phrase("foo bar"), "\"foo bar\"");
        assert_eq!(fts_phrase("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_exact_null_is_null_test() {
        let conn = open_in_memory().unwrap();
        let backend = SqlBackend::new(&conn);
        let expr = backend.exact("last_featured", &FieldValue::Null).unwrap();
        assert_eq!(expr.sql, "v.last_featured IS NULL");
        assert!(expr.params.is_empty());
    }

    #[test]
    fn test_membership_uses_native_in() {
        let conn = open_in_memory().unwrap();
        let backend = SqlBackend::new(&conn);
        let expr = backend.membership("tags", &[3, 4]).unwrap();
        assert_eq!(
            expr.sql,
            "v.id IN (SELECT video_id FROM video_tags WHERE tag_id IN (?, ?))"
        );
        assert_eq!(expr.params, vec![Value::Integer(3), Value::Integer(4)]);
    }

    #[test]
    fn test_negated_exact_matches_null_rows() {
        let conn = open_in_memory().unwrap();
        let feed = crate::db::store::create_feed(&conn, 1, "Feed").unwrap();
        let mut fed = crate::db::store::NewVideo::new("fed");
        fed.feed_id = Some(feed);
        crate::db::store::insert_video(&conn, &fed).unwrap();
        let orphan = crate::db::store::insert_video(&conn, &crate::db::store::NewVideo::new("orphan")).unwrap();

        let backend = SqlBackend::new(&conn);
        for predicate in [
            backend.not(backend.exact("feed", &FieldValue::Int(feed)).unwrap()),
            backend.not(backend.membership("feed", &[feed, feed + 1]).unwrap()),
        ] {
            let BackendQuery::Relational(query) = backend.finish(predicate) else {
                panic!("relational query expected")
            };
            let ids: Vec<i64> = query.fetch(0, 10).unwrap().iter().map(|v| v.id).collect();
            assert_eq!(ids, vec![orphan]);
        }
    }

    #[test]
    fn test_wrong_value_type_is_invalid() {
        let conn = open_in_memory().unwrap();
        let backend = SqlBackend::new(&conn);
        let err = backend
            .exact("feed", &FieldValue::Text("miropcf".to_string()))
            .unwrap_err();
        assert!(err.is_backend_failure());
        assert!(backend.exact("no_such_field", &FieldValue::Int(1)).is_err());
    }

    #[test]
    fn test_unsearchable_text_adds_nothing() {
        let conn = open_in_memory().unwrap();
        let backend = SqlBackend::new(&conn);
        assert!(backend.text("--- !!").unwrap().is_none());
        assert!(backend.text("blender").unwrap().is_some());
    }

    #[test]
    fn test_order_by_relation_rejected() {
        let conn = open_in_memory().unwrap();
        let query = SqlQuery::new(&conn, SqlExpr::constant(true));
        assert!(query.order_by(OrderBy::parse("-tags")).is_err());
    }
}
