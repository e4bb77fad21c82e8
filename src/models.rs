use serde::{Deserialize, Serialize};
use std::fmt;

/// Site indexing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteStatus {
    Indexing,
    Indexed,
    Failed,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Indexing => "INDEXING",
            SiteStatus::Indexed => "INDEXED",
            SiteStatus::Failed => "FAILED",
        }
    }
}

impl From<&str> for SiteStatus {
    fn from(s: &str) -> Self {
        match s {
            "INDEXING" => SiteStatus::Indexing,
            "INDEXED" => SiteStatus::Indexed,
            _ => SiteStatus::Failed,
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Site {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: String,
    pub status_time: String,
    pub last_error: Option<String>,
}

impl Site {
    pub fn status(&self) -> SiteStatus {
        SiteStatus::from(self.status.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Page {
    pub id: i64,
    pub site_id: i64,
    /// Site-relative path, always starting with `/`
    pub path: String,
    pub code: i64,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lemma {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    /// Number of distinct pages of the site containing the lemma
    pub frequency: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IndexEntry {
    pub id: i64,
    pub page_id: i64,
    pub lemma_id: i64,
    /// Occurrences of the lemma in the page at indexing time
    pub rank: f64,
}

/// A page together with its owning site, as needed to render a search hit
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PageWithSite {
    pub id: i64,
    pub path: String,
    pub content: String,
    pub site_url: String,
    pub site_name: String,
}
