//! OpenSearch 1.1 paging for feed views
//!
//! Feed clients page with `count`, `startIndex` (legacy `start-index`) and
//! `startPage`. Bad values never fail a request; they fall back to the
//! defaults. Offsets are zero-based.

use std::collections::HashMap;
use std::io::Write;

use serde::{Deserialize, Serialize};
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

use super::sort::SortSpec;
use super::thumbnails::AdjustedThumbnails;
use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::models::Video;

pub const OPENSEARCH_NAMESPACE: &str = "http://a9.com/-/spec/opensearch/1.1/";
pub const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDefaults {
    pub count: usize,
    /// Hard cap on `count`, if any
    pub max_count: Option<usize>,
}

impl From<&SearchConfig> for WindowDefaults {
    fn from(config: &SearchConfig) -> Self {
        Self { count: config.feed_length, max_count: config.max_count }
    }
}

/// The effective slice of a result a request asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSearchWindow {
    pub start: usize,
    pub count: usize,
}

impl OpenSearchWindow {
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.count)
    }
}

/// Non-negative integer parameter; anything else counts as absent
fn param(params: &HashMap<String, String>, name: &str) -> Option<usize> {
    let value: i64 = params.get(name)?.trim().parse().ok()?;
    usize::try_from(value).ok()
}

/// Work out the window a request asks for
pub fn window(params: &HashMap<String, String>, defaults: WindowDefaults) -> OpenSearchWindow {
    let mut count = param(params, "count").unwrap_or(defaults.count);
    if let Some(max) = defaults.max_count {
        count = count.min(max);
    }

    let start = param(params, "startIndex")
        .or_else(|| param(params, "start-index"))
        .unwrap_or_else(|| {
            let page = param(params, "startPage").unwrap_or(0);
            page.saturating_mul(count)
        });

    OpenSearchWindow { start, count }
}

/// Paging metadata echoed back to feed clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSearchMetadata {
    #[serde(rename = "startIndex")]
    pub start_index: usize,
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: usize,
    #[serde(rename = "totalResults")]
    pub total_results: usize,
}

fn render_error(err: xml::writer::Error) -> SearchError {
    SearchError::Render(err.to_string())
}

impl OpenSearchMetadata {
    pub fn new(window: OpenSearchWindow, total_results: usize) -> Self {
        Self { start_index: window.start, items_per_page: window.count, total_results }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write the `opensearch:*` elements; the caller binds the prefix
    pub fn write_xml_elements<W: Write>(&self, writer: &mut EventWriter<W>) -> Result<()> {
        for (name, value) in [
            ("opensearch:totalResults", self.total_results),
            ("opensearch:startIndex", self.start_index),
            ("opensearch:itemsPerPage", self.items_per_page),
        ] {
            writer.write(XmlEvent::start_element(name)).map_err(render_error)?;
            writer
                .write(XmlEvent::characters(&value.to_string()))
                .map_err(render_error)?;
            writer.write(XmlEvent::end_element()).map_err(render_error)?;
        }
        Ok(())
    }

    /// An Atom `<feed>` carrying only the paging metadata, for feed headers
    pub fn to_atom_xml(&self) -> Result<String> {
        let mut out = Vec::new();
        {
            let mut writer = EmitterConfig::new()
                .write_document_declaration(false)
                .create_writer(&mut out);
            writer
                .write(
                    XmlEvent::start_element("feed")
                        .default_ns(ATOM_NAMESPACE)
                        .ns("opensearch", OPENSEARCH_NAMESPACE),
                )
                .map_err(render_error)?;
            self.write_xml_elements(&mut writer)?;
            writer.write(XmlEvent::end_element()).map_err(render_error)?;
        }
        String::from_utf8(out).map_err(|e| SearchError::Render(e.to_string()))
    }
}

/// One page of a search, ready for a feed
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub window: OpenSearchWindow,
    pub videos: Vec<Video>,
    pub metadata: OpenSearchMetadata,
    #[serde(skip)]
    pub thumbnails: AdjustedThumbnails,
    pub effective_sort: SortSpec,
}

#[cfg(test)]
mod tests {
    use super::*;
    use xml::reader::{EventReader, XmlEvent as ReadEvent};

    const DEFAULTS: WindowDefaults = WindowDefaults { count: 30, max_count: Some(100) };

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_negative_count_uses_default() {
        let w = window(&params(&[("count", "-5")]), DEFAULTS);
        assert_eq!(w, OpenSearchWindow { start: 0, count: 30 });
        let w = window(&params(&[("count", "ten")]), DEFAULTS);
        assert_eq!(w.count, 30);
    }

    #[test]
    fn test_bad_start_index_falls_back_to_pages() {
        let w = window(&params(&[("startIndex", "abc"), ("startPage", "2"), ("count", "10")]), DEFAULTS);
        assert_eq!(w, OpenSearchWindow { start: 20, count: 10 });
        let w = window(&params(&[("startIndex", "abc")]), DEFAULTS);
        assert_eq!(w.start, 0);
        let w = window(&params(&[("startPage", "-1"), ("count", "10")]), DEFAULTS);
        assert_eq!(w.start, 0);
    }

    #[test]
    fn test_start_index_precedence() {
        let w = window(&params(&[("startIndex", "5"), ("start-index", "9"), ("startPage", "3")]), DEFAULTS);
        assert_eq!(w.start, 5);
        let w = window(&params(&[("start-index", "2"), ("count", "2")]), DEFAULTS);
        assert_eq!(w, OpenSearchWindow { start: 2, count: 2 });
    }

    #[test]
    fn test_count_is_capped() {
        let w = window(&params(&[("count", "5000")]), DEFAULTS);
        assert_eq!(w.count, 100);
        let uncapped = WindowDefaults { count: 30, max_count: None };
        assert_eq!(window(&params(&[("count", "5000")]), uncapped).count, 5000);
    }

    #[test]
    fn test_metadata_json_names() {
        let meta = OpenSearchMetadata::new(OpenSearchWindow { start: 10, count: 5 }, 42);
        let value: serde_json::Value = serde_json::from_str(&meta.to_json().unwrap()).unwrap();
        assert_eq!(value["startIndex"], 10);
        assert_eq!(value["itemsPerPage"], 5);
        assert_eq!(value["totalResults"], 42);
    }

    #[test]
    fn test_metadata_xml() {
        let meta = OpenSearchMetadata::new(OpenSearchWindow { start: 0, count: 2 }, 3);
        let xml = meta.to_atom_xml().unwrap();

        let mut found = Vec::new();
        let mut current = None;
        for event in EventReader::new(xml.as_bytes()) {
            match event.unwrap() {
                ReadEvent::StartElement { name, .. } => {
                    if name.namespace.as_deref() == Some(OPENSEARCH_NAMESPACE) {
                        current = Some(name.local_name);
                    }
                }
                ReadEvent::Characters(text) => {
                    if let Some(name) = current.take() {
                        found.push((name, text));
                    }
                }
                _ => {}
            }
        }
        assert_eq!(
            found,
            vec![
                ("totalResults".to_string(), "3".to_string()),
                ("startIndex".to_string(), "0".to_string()),
                ("itemsPerPage".to_string(), "2".to_string()),
            ]
        );
    }
}
