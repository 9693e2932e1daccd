//! Sort strategies
//!
//! Sorting runs on the backend query, before any slicing. Each strategy
//! names the field it orders on for a backend, may attach a computed value
//! first, and may declare an "empty" value whose records are dropped rather
//! than sorted to one end.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use super::backend::{BackendKind, BackendQuery, FieldValue, OrderBy};
use crate::config::SiteSettings;
use crate::error::Result;

pub trait SortStrategy: Send + Sync {
    fn verbose_name(&self) -> &str;

    /// Field ordered on; `None` leaves the query unordered
    fn field(&self, kind: BackendKind) -> Option<String>;

    /// Records whose field equals this value are excluded
    fn empty_value(&self, _kind: BackendKind) -> Option<FieldValue> {
        None
    }

    /// Attach whatever the ordering needs that is not stored on the record
    fn prepare<'a>(&self, query: BackendQuery<'a>) -> Result<BackendQuery<'a>> {
        Ok(query)
    }

    fn sort<'a>(&self, query: BackendQuery<'a>, descending: bool) -> Result<BackendQuery<'a>> {
        let kind = query.kind();
        let Some(field) = self.field(kind) else {
            return Ok(query);
        };
        let mut query = self.prepare(query)?;
        if let Some(empty) = self.empty_value(kind) {
            query = query.exclude(&field, &empty)?;
        }
        query.order_by(&OrderBy::lookup(&field, descending))
    }
}

/// Leaves the query as it is
#[derive(Debug, Default)]
pub struct DummySort;

impl SortStrategy for DummySort {
    fn verbose_name(&self) -> &str {
        "Unsorted"
    }

    fn field(&self, _kind: BackendKind) -> Option<String> {
        None
    }
}

/// Orders on a stored field, the same name on both backends
#[derive(Debug)]
pub struct FieldSort {
    pub verbose_name: String,
    pub field: String,
    pub empty_value: Option<FieldValue>,
}

impl FieldSort {
    pub fn new(verbose_name: &str, field: &str) -> Self {
        Self { verbose_name: verbose_name.to_string(), field: field.to_string(), empty_value: None }
    }

    /// Also drop records whose field equals `value`
    pub fn excluding(mut self, value: FieldValue) -> Self {
        self.empty_value = Some(value);
        self
    }
}

impl SortStrategy for FieldSort {
    fn verbose_name(&self) -> &str {
        &self.verbose_name
    }

    fn field(&self, _kind: BackendKind) -> Option<String> {
        Some(self.field.clone())
    }

    fn empty_value(&self, _kind: BackendKind) -> Option<FieldValue> {
        self.empty_value.clone()
    }
}

/// First non-null of publish (when the site trusts it), approval and
/// submission dates
#[derive(Debug)]
pub struct BestDateSort {
    pub use_original_date: bool,
}

impl SortStrategy for BestDateSort {
    fn verbose_name(&self) -> &str {
        "Date"
    }

    fn field(&self, kind: BackendKind) -> Option<String> {
        let field = match kind {
            BackendKind::Index if self.use_original_date => "best_date_with_published",
            _ => "best_date",
        };
        Some(field.to_string())
    }

    fn prepare<'a>(&self, query: BackendQuery<'a>) -> Result<BackendQuery<'a>> {
        Ok(match query {
            BackendQuery::Relational(q) => {
                let expression = if self.use_original_date {
                    "COALESCE(v.when_published, v.when_approved, v.when_submitted)"
                } else {
                    "COALESCE(v.when_approved, v.when_submitted)"
                };
                BackendQuery::Relational(q.annotate("best_date", expression))
            }
            index => index,
        })
    }
}

/// Orders on the number of recorded watches
#[derive(Debug, Default)]
pub struct PopularSort;

impl SortStrategy for PopularSort {
    fn verbose_name(&self) -> &str {
        "Popular"
    }

    fn field(&self, _kind: BackendKind) -> Option<String> {
        Some("watch_count".to_string())
    }

    fn prepare<'a>(&self, query: BackendQuery<'a>) -> Result<BackendQuery<'a>> {
        Ok(match query {
            BackendQuery::Relational(q) => BackendQuery::Relational(q.annotate(
                "watch_count",
                "(SELECT COUNT(*) FROM watches w WHERE w.video_id = v.id)",
            )),
            index => index,
        })
    }
}

fn nullable_date_sort(verbose_name: &str, field: &str) -> FieldSort {
    FieldSort::new(verbose_name, field).excluding(FieldValue::Null)
}

/// Most recently featured first; never-featured videos are left out
pub fn featured_sort() -> FieldSort {
    nullable_date_sort("Featured", "last_featured")
}

/// Most recently approved first; unapproved dates are left out
pub fn approved_sort() -> FieldSort {
    nullable_date_sort("Approved", "when_approved")
}

/// The sort a request ended up with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub name: String,
    pub descending: bool,
    pub verbose_name: String,
}

impl SortSpec {
    /// `-date` style lookup for the sort
    pub fn lookup(&self) -> String {
        OrderBy::lookup(&self.name, self.descending)
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lookup())
    }
}

/// Named sorts available to listing views
pub struct SortRegistry {
    sorts: Vec<(&'static str, Box<dyn SortStrategy>)>,
    default_sort: String,
}

impl SortRegistry {
    pub fn new(settings: &SiteSettings, default_sort: &str) -> Self {
        let best_date = || BestDateSort { use_original_date: settings.use_original_date };
        let sorts: Vec<(&'static str, Box<dyn SortStrategy>)> = vec![
            ("date", Box::new(best_date())),
            ("featured", Box::new(featured_sort())),
            ("popular", Box::new(PopularSort)),
            ("approved", Box::new(approved_sort())),
            // Deprecated name for `date`
            ("latest", Box::new(best_date())),
        ];
        Self { sorts, default_sort: default_sort.to_string() }
    }

    pub fn get(&self, name: &str) -> Option<&dyn SortStrategy> {
        self.sorts
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, sort)| sort.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sorts.iter().map(|(name, _)| *name)
    }

    fn lookup(&self, requested: &str) -> Option<(SortSpec, &dyn SortStrategy)> {
        let order = OrderBy::parse(requested);
        let sort = self.get(&order.field)?;
        let spec = SortSpec {
            verbose_name: sort.verbose_name().to_string(),
            name: order.field,
            descending: order.descending,
        };
        Some((spec, sort))
    }

    /// Pick the sort for a request; unknown names fall back to the default
    pub fn resolve(&self, requested: Option<&str>) -> (SortSpec, &dyn SortStrategy) {
        let requested = requested.map(str::trim).filter(|name| !name.is_empty());
        if let Some(name) = requested {
            if let Some(found) = self.lookup(name) {
                return found;
            }
            warn!("[Sort] Unknown sort '{}', using '{}'", name, self.default_sort);
        }
        if let Some(found) = self.lookup(&self.default_sort) {
            return found;
        }
        warn!("[Sort] Default sort '{}' is not registered", self.default_sort);
        (
            SortSpec { name: String::new(), descending: false, verbose_name: DummySort.verbose_name().to_string() },
            &DummySort,
        )
    }
}

impl fmt::Debug for SortRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortRegistry")
            .field("sorts", &self.names().collect::<Vec<_>>())
            .field("default_sort", &self.default_sort)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SortRegistry {
        SortRegistry::new(&SiteSettings::new(1), "-date")
    }

    #[test]
    fn test_resolve_known_and_descending() {
        let registry = registry();
        let (spec, _) = registry.resolve(Some("-popular"));
        assert_eq!(spec.name, "popular");
        assert!(spec.descending);
        assert_eq!(spec.lookup(), "-popular");

        let (spec, _) = registry.resolve(Some("latest"));
        assert_eq!(spec.name, "latest");
        assert!(!spec.descending);
    }

    #[test]
    fn test_unknown_sort_falls_back() {
        let registry = registry();
        let (spec, _) = registry.resolve(Some("-nonsense"));
        assert_eq!(spec.to_string(), "-date");
        let (spec, _) = registry.resolve(None);
        assert_eq!(spec.to_string(), "-date");
    }

    #[test]
    fn test_broken_default_is_unsorted() {
        let registry = SortRegistry::new(&SiteSettings::new(1), "-nothing");
        let (spec, sort) = registry.resolve(Some("nope"));
        assert_eq!(spec.name, "");
        assert!(sort.field(BackendKind::Relational).is_none());
    }

    #[test]
    fn test_best_date_field_per_backend() {
        let with_published = BestDateSort { use_original_date: true };
        let without = BestDateSort { use_original_date: false };
        assert_eq!(with_published.field(BackendKind::Index).unwrap(), "best_date_with_published");
        assert_eq!(without.field(BackendKind::Index).unwrap(), "best_date");
        assert_eq!(with_published.field(BackendKind::Relational).unwrap(), "best_date");
    }

    #[test]
    fn test_exclusions() {
        assert_eq!(featured_sort().empty_value(BackendKind::Index), Some(FieldValue::Null));
        assert_eq!(approved_sort().empty_value(BackendKind::Relational), Some(FieldValue::Null));
        assert_eq!(PopularSort.empty_value(BackendKind::Relational), None);
    }
}
