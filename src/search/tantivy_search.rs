//! Search-index backend built on tantivy
//!
//! The index is a denormalized copy of the active videos in the relational
//! store. Structured fields are indexed as u64/i64 terms, the searchable
//! document as one tokenized `text` field. Tantivy has no notion of a
//! missing value, so every null field is recorded by name in `null_fields`.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::Connection;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, EmptyQuery, Occur, PhraseQuery, Query, TermQuery};
use tantivy::schema::*;
use tantivy::tokenizer::{
    LowerCaser, SimpleTokenizer, TextAnalyzer, Token, TokenFilter, TokenStream, Tokenizer,
};
use tantivy::{DocAddress, Index, IndexReader, IndexWriter, Order, ReloadPolicy, Term};
use unicode_normalization::char::decompose_canonical;

use super::backend::{BackendKind, BackendQuery, FieldValue, OrderBy, QueryBackend};
use super::has_searchable_text;
use crate::config::SearchConfig;
use crate::db::{load_index_documents, parse_timestamp, IndexDocument};
use crate::error::{Result, SearchError};

/// Tokenizer for the searchable document: unicode-aware word split,
/// lowercased, accents stripped from Latin letters. Folds exactly what the
/// FTS5 `unicode61 remove_diacritics 2` tokenizer folds, so `ø` and `ß`
/// stay as they are.
pub const TEXT_TOKENIZER: &str = "video_text";

/// Sort placeholder for a missing timestamp; the matching `null_fields`
/// marker is what queries test
const MISSING_DATE: i64 = i64::MAX;

/// Fields with a `null_fields` marker when empty
const NULLABLE: &[&str] = &[
    "feed",
    "user",
    "search",
    "last_featured",
    "when_approved",
    "tags",
    "categories",
    "authors",
    "playlists",
];

#[derive(Clone, Copy)]
struct IndexFields {
    id: Field,
    site: Field,
    feed: Field,
    user: Field,
    search: Field,
    tags: Field,
    categories: Field,
    authors: Field,
    playlists: Field,
    text: Field,
    name: Field,
    name_raw: Field,
    video_service_user: Field,
    video_service_user_raw: Field,
    null_fields: Field,
    best_date: Field,
    best_date_with_published: Field,
    last_featured: Field,
    when_approved: Field,
    when_submitted: Field,
    watch_count: Field,
}

fn build_schema() -> (Schema, IndexFields) {
    let mut builder = Schema::builder();

    let id = builder.add_u64_field("id", INDEXED | STORED | FAST);
    let site = builder.add_u64_field("site", INDEXED);
    let feed = builder.add_u64_field("feed", INDEXED);
    let user = builder.add_u64_field("user", INDEXED);
    let search = builder.add_u64_field("search", INDEXED);
    let tags = builder.add_u64_field("tags", INDEXED);
    let categories = builder.add_u64_field("categories", INDEXED);
    let authors = builder.add_u64_field("authors", INDEXED);
    let playlists = builder.add_u64_field("playlists", INDEXED);

    let text_options = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(TEXT_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );
    let text = builder.add_text_field("text", text_options);
    let name = builder.add_text_field("name", TEXT);
    let name_raw = builder.add_text_field("name_raw", STRING);
    let video_service_user = builder.add_text_field("video_service_user", TEXT);
    let video_service_user_raw = builder.add_text_field("video_service_user_raw", STRING);
    let null_fields = builder.add_text_field("null_fields", STRING);

    let best_date = builder.add_i64_field("best_date", INDEXED | STORED | FAST);
    let best_date_with_published = builder.add_i64_field("best_date_with_published", INDEXED | STORED | FAST);
    let last_featured = builder.add_i64_field("last_featured", INDEXED | STORED | FAST);
    let when_approved = builder.add_i64_field("when_approved", INDEXED | STORED | FAST);
    let when_submitted = builder.add_i64_field("when_submitted", INDEXED | STORED | FAST);
    let watch_count = builder.add_i64_field("watch_count", INDEXED | STORED | FAST);

    let fields = IndexFields {
        id,
        site,
        feed,
        user,
        search,
        tags,
        categories,
        authors,
        playlists,
        text,
        name,
        name_raw,
        video_service_user,
        video_service_user_raw,
        null_fields,
        best_date,
        best_date_with_published,
        last_featured,
        when_approved,
        when_submitted,
        watch_count,
    };
    (builder.build(), fields)
}

fn text_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(LatinAccentFilter)
        .build()
}

fn is_latin_letter(c: char) -> bool {
    matches!(c, '\u{00c0}'..='\u{024f}' | '\u{1e00}'..='\u{1eff}')
}

fn is_combining_accent(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036f}')
}

/// `crème` → `creme`; letters without a canonical decomposition are kept
fn strip_latin_accents(word: &str) -> String {
    let mut folded = String::with_capacity(word.len());
    for c in word.chars() {
        if is_latin_letter(c) {
            decompose_canonical(c, |part| {
                if !is_combining_accent(part) {
                    folded.push(part);
                }
            });
        } else {
            folded.push(c);
        }
    }
    folded
}

/// Token filter applying [`strip_latin_accents`]
#[derive(Clone)]
pub struct LatinAccentFilter;

impl TokenFilter for LatinAccentFilter {
    type Tokenizer<T: Tokenizer> = LatinAccentTokenizer<T>;

    fn transform<T: Tokenizer>(self, tokenizer: T) -> Self::Tokenizer<T> {
        LatinAccentTokenizer { inner: tokenizer }
    }
}

#[derive(Clone)]
pub struct LatinAccentTokenizer<T> {
    inner: T,
}

impl<T: Tokenizer> Tokenizer for LatinAccentTokenizer<T> {
    type TokenStream<'a> = LatinAccentTokenStream<T::TokenStream<'a>>;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        LatinAccentTokenStream { tail: self.inner.token_stream(text) }
    }
}

pub struct LatinAccentTokenStream<S> {
    tail: S,
}

impl<S: TokenStream> TokenStream for LatinAccentTokenStream<S> {
    fn advance(&mut self) -> bool {
        while self.tail.advance() {
            let token = self.tail.token_mut();
            if token.text.chars().any(is_latin_letter) {
                token.text = strip_latin_accents(&token.text);
            }
            if !token.text.is_empty() {
                return true;
            }
        }
        false
    }

    fn token(&self) -> &Token {
        self.tail.token()
    }

    fn token_mut(&mut self) -> &mut Token {
        self.tail.token_mut()
    }
}

fn micros(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

/// In-RAM tantivy index of the active videos
pub struct VideoIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: IndexFields,
}

impl VideoIndex {
    /// Create an empty index
    pub fn create(config: &SearchConfig) -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        index.tokenizers().register(TEXT_TOKENIZER, text_analyzer());

        let writer = index.writer(config.index_writer_heap)?;
        // Searches only see what `commit` has published
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self { index, reader, writer: Mutex::new(writer), fields })
    }

    /// Create and fill an index from the relational store
    pub fn build(conn: &Connection, config: &SearchConfig) -> Result<Self> {
        let index = Self::create(config)?;
        index.rebuild(conn)?;
        Ok(index)
    }

    pub fn schema(&self) -> Schema {
        self.index.schema()
    }

    fn writer(&self) -> Result<std::sync::MutexGuard<'_, IndexWriter>> {
        self.writer.lock().map_err(|_| SearchError::IndexUnavailable)
    }

    fn to_document(&self, source: &IndexDocument) -> TantivyDocument {
        let f = &self.fields;
        let video = &source.video;
        let mut doc = TantivyDocument::default();
        let mut nulls: Vec<&str> = Vec::new();

        doc.add_u64(f.id, video.id as u64);
        doc.add_u64(f.site, video.site_id as u64);
        for (field, name, value) in [
            (f.feed, "feed", video.feed_id),
            (f.user, "user", video.user_id),
            (f.search, "search", video.search_id),
        ] {
            match value {
                Some(v) => doc.add_u64(field, v as u64),
                None => nulls.push(name),
            }
        }
        for (field, name, values) in [
            (f.tags, "tags", &source.tags),
            (f.categories, "categories", &source.categories),
            (f.authors, "authors", &source.authors),
            (f.playlists, "playlists", &source.playlists),
        ] {
            if values.is_empty() {
                nulls.push(name);
            }
            for v in values {
                doc.add_u64(field, *v as u64);
            }
        }

        doc.add_text(f.text, &source.text);
        doc.add_text(f.name, &video.name);
        doc.add_text(f.name_raw, &video.name);
        doc.add_text(f.video_service_user, &video.video_service_user);
        doc.add_text(f.video_service_user_raw, &video.video_service_user);

        doc.add_i64(f.best_date, micros(&video.best_date()));
        doc.add_i64(f.best_date_with_published, micros(&video.best_date_with_published()));
        doc.add_i64(f.when_submitted, micros(&video.when_submitted));
        for (field, name, value) in [
            (f.last_featured, "last_featured", video.last_featured),
            (f.when_approved, "when_approved", video.when_approved),
        ] {
            match value {
                Some(ts) => doc.add_i64(field, micros(&ts)),
                None => {
                    doc.add_i64(field, MISSING_DATE);
                    nulls.push(name);
                }
            }
        }
        doc.add_i64(f.watch_count, source.watch_count);

        for name in nulls {
            doc.add_text(f.null_fields, name);
        }
        doc
    }

    /// Replace the whole index with the active videos of the store
    pub fn rebuild(&self, conn: &Connection) -> Result<usize> {
        let documents = load_index_documents(conn, None)?;
        {
            let writer = self.writer()?;
            writer.delete_all_documents()?;
            for source in &documents {
                writer.add_document(self.to_document(source))?;
            }
        }
        self.commit()?;
        info!("[Tantivy] Indexed {} videos", documents.len());
        Ok(documents.len())
    }

    /// Re-read one video from the store; inactive or missing videos end up
    /// removed. Visible after [`VideoIndex::commit`].
    pub fn index_video(&self, conn: &Connection, video_id: i64) -> Result<()> {
        let documents = load_index_documents(conn, Some(&[video_id]))?;
        let writer = self.writer()?;
        writer.delete_term(Term::from_field_u64(self.fields.id, video_id as u64));
        for source in &documents {
            writer.add_document(self.to_document(source))?;
        }
        Ok(())
    }

    pub fn remove_video(&self, video_id: i64) -> Result<()> {
        let writer = self.writer()?;
        writer.delete_term(Term::from_field_u64(self.fields.id, video_id as u64));
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        self.writer()?.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    fn field(&self, name: &str) -> Result<Field> {
        self.index
            .schema()
            .get_field(name)
            .map_err(|_| SearchError::InvalidQuery(format!("unknown index field '{}'", name)))
    }

    /// Terms the text analyzer produces for `text`
    fn analyze(&self, text: &str) -> Result<Vec<Term>> {
        let mut analyzer = self.index.tokenizer_for_field(self.fields.text)?;
        let mut stream = analyzer.token_stream(text);
        let mut terms = Vec::new();
        while let Some(token) = stream.next() {
            terms.push(Term::from_field_text(self.fields.text, &token.text));
        }
        Ok(terms)
    }
}

impl fmt::Debug for VideoIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoIndex").field("num_docs", &self.num_docs()).finish()
    }
}

fn term_query(term: Term) -> Box<dyn Query> {
    Box::new(TermQuery::new(term, IndexRecordOption::Basic))
}

/// Predicate construction against a [`VideoIndex`]
pub struct IndexBackend<'a> {
    index: &'a VideoIndex,
}

impl<'a> IndexBackend<'a> {
    pub fn new(index: &'a VideoIndex) -> Self {
        Self { index }
    }

    /// Exact-match term for one value of `field`
    fn exact_term(&self, name: &str, field: Field, value: &FieldValue) -> Result<Option<Term>> {
        let schema = self.index.index.schema();
        let entry = schema.get_field_entry(field);
        let wrong_type = || {
            SearchError::InvalidQuery(format!(
                "value {:?} has the wrong type for field '{}'",
                value, name
            ))
        };

        let term = match (entry.field_type(), value) {
            (FieldType::U64(_), FieldValue::Int(v)) => match u64::try_from(*v) {
                Ok(v) => Some(Term::from_field_u64(field, v)),
                // No stored id is negative
                Err(_) => None,
            },
            (FieldType::I64(_), FieldValue::Int(v)) => Some(Term::from_field_i64(field, *v)),
            (FieldType::I64(_), FieldValue::Text(v)) => {
                let ts = parse_timestamp(v).map_err(|_| wrong_type())?;
                Some(Term::from_field_i64(field, micros(&ts)))
            }
            (FieldType::Str(options), FieldValue::Text(v)) => {
                let tokenized = options
                    .get_indexing_options()
                    .map(|indexing| indexing.tokenizer() != "raw")
                    .unwrap_or(false);
                if tokenized {
                    // Tokenized fields cannot hold a whole value as one
                    // term; their untokenized twin can
                    let raw = self.index.field(&format!("{}_raw", name))?;
                    Some(Term::from_field_text(raw, v))
                } else {
                    Some(Term::from_field_text(field, v))
                }
            }
            _ => return Err(wrong_type()),
        };
        Ok(term)
    }
}

impl<'a> QueryBackend<'a> for IndexBackend<'a> {
    type Predicate = Box<dyn Query>;

    fn kind(&self) -> BackendKind {
        BackendKind::Index
    }

    fn match_all(&self) -> Box<dyn Query> {
        Box::new(AllQuery)
    }

    fn scope(&self, site_id: i64) -> Result<Box<dyn Query>> {
        // Only active videos are ever indexed
        self.exact("site", &FieldValue::Int(site_id))
    }

    fn text(&self, text: &str) -> Result<Option<Box<dyn Query>>> {
        if !has_searchable_text(text) {
            return Ok(None);
        }
        let mut terms = self.index.analyze(text)?;
        let query: Box<dyn Query> = match terms.len() {
            // Searchable but nothing survived analysis: it can match nothing
            0 => Box::new(EmptyQuery),
            1 => term_query(terms.remove(0)),
            _ => Box::new(PhraseQuery::new(terms)),
        };
        Ok(Some(query))
    }

    fn exact(&self, name: &str, value: &FieldValue) -> Result<Box<dyn Query>> {
        let field = self.index.field(name)?;
        if *value == FieldValue::Null {
            if !NULLABLE.contains(&name) {
                return Ok(Box::new(EmptyQuery));
            }
            return Ok(term_query(Term::from_field_text(self.index.fields.null_fields, name)));
        }
        match self.exact_term(name, field, value)? {
            Some(term) => Ok(term_query(term)),
            None => Ok(Box::new(EmptyQuery)),
        }
    }

    fn membership(&self, name: &str, values: &[i64]) -> Result<Box<dyn Query>> {
        // No native "in" query: OR of exact matches
        let clauses = values
            .iter()
            .map(|v| self.exact(name, &FieldValue::Int(*v)))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.or(clauses))
    }

    fn and(&self, predicates: Vec<Box<dyn Query>>) -> Box<dyn Query> {
        if predicates.is_empty() {
            return self.match_all();
        }
        let clauses = predicates.into_iter().map(|q| (Occur::Must, q)).collect();
        Box::new(BooleanQuery::new(clauses))
    }

    fn or(&self, predicates: Vec<Box<dyn Query>>) -> Box<dyn Query> {
        if predicates.is_empty() {
            return Box::new(EmptyQuery);
        }
        let clauses = predicates.into_iter().map(|q| (Occur::Should, q)).collect();
        Box::new(BooleanQuery::new(clauses))
    }

    fn not(&self, predicate: Box<dyn Query>) -> Box<dyn Query> {
        // A boolean query of only MustNot clauses matches nothing
        Box::new(BooleanQuery::new(vec![
            (Occur::Must, self.match_all()),
            (Occur::MustNot, predicate),
        ]))
    }

    fn finish(&self, predicate: Box<dyn Query>) -> BackendQuery<'a> {
        BackendQuery::Index(IndexQuery::new(self.index, predicate))
    }
}

/// A compiled index query with an optional fast-field order
pub struct IndexQuery<'a> {
    index: &'a VideoIndex,
    query: Box<dyn Query>,
    order: Option<OrderBy>,
}

impl<'a> IndexQuery<'a> {
    pub fn new(index: &'a VideoIndex, query: Box<dyn Query>) -> Self {
        Self { index, query, order: None }
    }

    pub fn ordering(&self) -> Option<&OrderBy> {
        self.order.as_ref()
    }

    pub fn exclude(mut self, field: &str, value: &FieldValue) -> Result<Self> {
        let predicate = IndexBackend::new(self.index).exact(field, value)?;
        self.query = Box::new(BooleanQuery::new(vec![
            (Occur::Must, self.query),
            (Occur::MustNot, predicate),
        ]));
        Ok(self)
    }

    pub fn order_by(mut self, order: OrderBy) -> Result<Self> {
        let field = self.index.field(&order.field)?;
        let schema = self.index.index.schema();
        let entry = schema.get_field_entry(field);
        if !entry.is_fast() || !matches!(entry.field_type(), FieldType::I64(_)) {
            return Err(SearchError::InvalidQuery(format!(
                "cannot order by index field '{}'",
                order.field
            )));
        }
        self.order = Some(order);
        Ok(self)
    }

    pub fn count(&self) -> Result<usize> {
        let searcher = self.index.reader.searcher();
        Ok(searcher.search(&self.query, &Count)?)
    }

    /// Video ids of one window of hits, in hit order
    pub fn fetch_ids(&self, offset: usize, limit: usize) -> Result<Vec<i64>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let searcher = self.index.reader.searcher();
        let query = &self.query;
        debug!("[Tantivy] {:?}", query);

        let addresses: Vec<DocAddress> = match &self.order {
            Some(order) => {
                let direction = if order.descending { Order::Desc } else { Order::Asc };
                let collector = TopDocs::with_limit(limit)
                    .and_offset(offset)
                    .order_by_fast_field::<i64>(order.field.clone(), direction);
                searcher
                    .search(query, &collector)?
                    .into_iter()
                    .map(|(_, address)| address)
                    .collect()
            }
            None => searcher
                .search(query, &TopDocs::with_limit(limit).and_offset(offset))?
                .into_iter()
                .map(|(_, address)| address)
                .collect(),
        };

        let mut ids = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            if let Some(id) = doc.get_first(self.index.fields.id).and_then(|v| v.as_u64()) {
                ids.push(id as i64);
            }
        }
        Ok(ids)
    }
}

impl fmt::Debug for IndexQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexQuery")
            .field("query", &self.query)
            .field("order", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, store};
    use crate::models::VideoStatus;

    fn indexed(conn: &Connection) -> VideoIndex {
        VideoIndex::build(conn, &SearchConfig::default()).unwrap()
    }

    #[test]
    fn test_rebuild_skips_inactive() {
        let conn = open_in_memory().unwrap();
        store::insert_video(&conn, &store::NewVideo::new("one")).unwrap();
        let mut hidden = store::NewVideo::new("two");
        hidden.status = VideoStatus::Unapproved;
        store::insert_video(&conn, &hidden).unwrap();

        let index = indexed(&conn);
        assert_eq!(index.num_docs(), 1);
    }

    #[test]
    fn test_text_analysis() {
        let conn = open_in_memory().unwrap();
        let index = indexed(&conn);
        let backend = IndexBackend::new(&index);
        assert!(backend.text("!!! ---").unwrap().is_none());
        assert!(backend.text("Espa\u{f1}a").unwrap().is_some());
        assert_eq!(index.analyze("Crème Brûlée").unwrap().len(), 2);
    }

    #[test]
    fn test_only_latin_accents_are_stripped() {
        let conn = open_in_memory().unwrap();
        let index = indexed(&conn);
        let words = |text: &str| -> Vec<String> {
            index
                .analyze(text)
                .unwrap()
                .iter()
                .map(|term| term.value().as_str().unwrap().to_string())
                .collect()
        };
        assert_eq!(words("Crème BRÛLÉE Ångström"), vec!["creme", "brulee", "angstrom"]);
        assert_eq!(words("Søren Straße \u{1ea1}\u{1ec7}"), vec!["søren", "straße", "ae"]);
        // Accents on other scripts are part of the word
        assert_eq!(words("\u{3ac}\u{3bb}\u{3c6}\u{3b1}"), vec!["\u{3ac}\u{3bb}\u{3c6}\u{3b1}"]);
    }

    #[test]
    fn test_long_words_are_kept() {
        let conn = open_in_memory().unwrap();
        let long = "pneumonoultramicroscopicsilicovolcanoconiosis";
        let id = store::insert_video(&conn, &store::NewVideo::new(&format!("About {}", long))).unwrap();
        store::insert_video(&conn, &store::NewVideo::new("About nothing")).unwrap();
        let index = indexed(&conn);
        let backend = IndexBackend::new(&index);

        let cjk = "\u{6f22}".repeat(20);
        assert_eq!(index.analyze(&cjk).unwrap().len(), 1);

        let query = backend.finish(backend.text(long).unwrap().unwrap());
        let BackendQuery::Index(query) = query else { panic!("index query expected") };
        assert_eq!(query.fetch_ids(0, 10).unwrap(), vec![id]);
    }

    #[test]
    fn test_exact_on_tokenized_field_uses_raw_twin() {
        let conn = open_in_memory().unwrap();
        let id = store::insert_video(&conn, &store::NewVideo::new("Blender Open Movie")).unwrap();
        store::insert_video(&conn, &store::NewVideo::new("Blender")).unwrap();
        let index = indexed(&conn);
        let backend = IndexBackend::new(&index);

        let query = backend
            .finish(backend.exact("name", &FieldValue::Text("Blender Open Movie".to_string())).unwrap());
        let BackendQuery::Index(query) = query else { panic!("index query expected") };
        assert_eq!(query.fetch_ids(0, 10).unwrap(), vec![id]);
    }

    #[test]
    fn test_null_marker_and_membership() {
        let conn = open_in_memory().unwrap();
        let feed = store::create_feed(&conn, 1, "Feed").unwrap();
        let mut with_feed = store::NewVideo::new("fed");
        with_feed.feed_id = Some(feed);
        let fed = store::insert_video(&conn, &with_feed).unwrap();
        let orphan = store::insert_video(&conn, &store::NewVideo::new("orphan")).unwrap();
        let tagged = store::insert_video(&conn, &store::NewVideo::new("tagged")).unwrap();
        let tags = store::set_tags(&conn, tagged, &["a", "b"]).unwrap();
        let index = indexed(&conn);
        let backend = IndexBackend::new(&index);

        let run = |predicate: Box<dyn Query>| match backend.finish(predicate) {
            BackendQuery::Index(q) => {
                let mut ids = q.fetch_ids(0, 10).unwrap();
                ids.sort();
                ids
            }
            BackendQuery::Relational(_) => unreachable!(),
        };
        assert_eq!(run(backend.exact("feed", &FieldValue::Null).unwrap()), vec![orphan, tagged]);
        assert_eq!(run(backend.exact("feed", &FieldValue::Int(feed)).unwrap()), vec![fed]);
        assert_eq!(run(backend.membership("tags", &tags).unwrap()), vec![tagged]);
        assert_eq!(run(backend.membership("tags", &[]).unwrap()), Vec::<i64>::new());
    }

    #[test]
    fn test_order_needs_fast_i64_field() {
        let conn = open_in_memory().unwrap();
        let index = indexed(&conn);
        let query = IndexQuery::new(&index, Box::new(AllQuery));
        assert!(query.order_by(OrderBy::parse("-tags")).is_err());
        let query = IndexQuery::new(&index, Box::new(AllQuery));
        assert!(query.order_by(OrderBy::parse("-best_date")).is_ok());
    }

    #[test]
    fn test_stale_until_commit() {
        let conn = open_in_memory().unwrap();
        let index = indexed(&conn);
        let id = store::insert_video(&conn, &store::NewVideo::new("late")).unwrap();
        index.index_video(&conn, id).unwrap();
        assert_eq!(index.num_docs(), 0);
        index.commit().unwrap();
        assert_eq!(index.num_docs(), 1);
        index.remove_video(id).unwrap();
        index.commit().unwrap();
        assert_eq!(index.num_docs(), 0);
    }
}
