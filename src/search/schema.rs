//! Search request / result types

use serde::{Deserialize, Serialize};

/// One ranked page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub site: String,
    pub site_name: String,
    pub uri: String,
    pub title: String,
    /// Text window with `<b>` around matched words
    pub snippet: String,
    /// Normalized score in (0, 1]
    pub relevance: f64,
}

/// Ranked page slice plus the total number of matches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub count: usize,
    pub data: Vec<SearchHit>,
}

/// Search query options / 搜索查询选项
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Query text / 查询文本
    pub query: String,
    /// Limit search to one site root URL (None means all sites)
    pub site: Option<String>,
    /// Offset (for pagination) / 偏移量(用于分页)
    pub offset: usize,
    /// Page size; 0 means the configured default
    pub limit: usize,
}

impl SearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        let site = site.into();
        self.site = if site.trim().is_empty() { None } else { Some(site) };
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}
