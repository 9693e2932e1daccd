use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moderation status of a video. Only active videos are searchable.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Unapproved,
    Active,
    Rejected,
    Pending,
}

impl VideoStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            VideoStatus::Unapproved => 0,
            VideoStatus::Active => 1,
            VideoStatus::Rejected => 2,
            VideoStatus::Pending => 3,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(VideoStatus::Unapproved),
            1 => Some(VideoStatus::Active),
            2 => Some(VideoStatus::Rejected),
            3 => Some(VideoStatus::Pending),
            _ => None,
        }
    }
}

/// Core video record, resolved from either backend
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Video {
    pub id: i64,
    pub site_id: i64,
    pub status: VideoStatus,
    pub name: String,
    pub description: String,
    pub feed_id: Option<i64>,
    pub search_id: Option<i64>,
    pub user_id: Option<i64>,
    pub video_service_user: String,
    pub when_submitted: DateTime<Utc>,
    pub when_approved: Option<DateTime<Utc>>,
    pub when_published: Option<DateTime<Utc>>,
    pub last_featured: Option<DateTime<Utc>>,
    pub thumbnail_path: Option<String>,
}

impl Video {
    /// Approval date, falling back to the submission date
    pub fn best_date(&self) -> DateTime<Utc> {
        self.when_approved.unwrap_or(self.when_submitted)
    }

    /// Original publish date when known, otherwise [`Video::best_date`]
    pub fn best_date_with_published(&self) -> DateTime<Utc> {
        self.when_published.unwrap_or_else(|| self.best_date())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    pub id: i64,
    pub site_id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Feed {
    pub id: i64,
    pub site_id: i64,
    pub name: String,
}

/// A stored search that imports matching videos
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SavedSearch {
    pub id: i64,
    pub site_id: i64,
    pub query_string: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Playlist {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
}

/// Structured filter value as it arrives from a request or a caller
///
/// Accepts a pk, an identifier (slug, name, username) or a list of either.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    Int(i64),
    Text(String),
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Flattens nested lists into individual scalar values
    pub fn flatten(&self) -> Vec<&FilterValue> {
        match self {
            FilterValue::List(values) => values.iter().flat_map(|v| v.flatten()).collect(),
            scalar => vec![scalar],
        }
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_best_dates() {
        let submitted = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();
        let approved = Utc.with_ymd_and_hms(2012, 2, 1, 0, 0, 0).unwrap();
        let published = Utc.with_ymd_and_hms(2011, 6, 1, 0, 0, 0).unwrap();
        let mut video = Video {
            id: 1,
            site_id: 1,
            status: VideoStatus::Active,
            name: "video".to_string(),
            description: String::new(),
            feed_id: None,
            search_id: None,
            user_id: None,
            video_service_user: String::new(),
            when_submitted: submitted,
            when_approved: None,
            when_published: None,
            last_featured: None,
            thumbnail_path: None,
        };
        assert_eq!(video.best_date(), submitted);
        assert_eq!(video.best_date_with_published(), submitted);

        video.when_approved = Some(approved);
        video.when_published = Some(published);
        assert_eq!(video.best_date(), approved);
        assert_eq!(video.best_date_with_published(), published);
    }

    #[test]
    fn test_filter_value_from_json() {
        let value: FilterValue = serde_json::from_str(r#"[1, "miro", [2]]"#).unwrap();
        let flat = value.flatten();
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0], &FilterValue::Int(1));
        assert_eq!(flat[1], &FilterValue::Text("miro".to_string()));
        assert_eq!(flat[2], &FilterValue::Int(2));
    }
}
