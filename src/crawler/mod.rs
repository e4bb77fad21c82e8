//! Crawler module - fetches every reachable page of one site / 爬虫模块
//!
//! Architecture principles:
//! - Page access goes through the [`PageFetcher`] trait (HTTP in production, static maps in tests)
//! - One [`SiteCrawler`] per site crawl, owning the shared visited set and cancellation token
//! - The crawler only fetches; saving and indexing pages is the indexer's job

pub mod fetcher;
pub mod site;

use async_trait::async_trait;
use thiserror::Error;

pub use fetcher::HttpFetcher;
pub use site::{CrawlSettings, SiteCrawler};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("host unreachable: {0}")]
    Unreachable(String),
}

/// Raw fetch result
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// Fetches a single URL without following redirects
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// One page produced by a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub path: String,
    /// HTTP status; 0 when the fetch itself failed
    pub code: u16,
    pub content: String,
}

impl FetchedPage {
    /// Failed fetches and 4xx/5xx answers are recorded but never descended or indexed
    pub fn is_available(&self) -> bool {
        self.code != 0 && self.code < 400
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use url::Url;

    /// `/новости` and its percent-encoded spelling hit the same entry
    fn key(url: &str) -> String {
        Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string())
    }

    /// In-memory site map; unknown URLs answer 404
    #[derive(Default)]
    pub struct StaticFetcher {
        pages: HashMap<String, FetchResponse>,
        unreachable: Vec<String>,
        requests: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(mut self, url: &str, status: u16, body: &str) -> Self {
            self.pages.insert(
                key(url),
                FetchResponse {
                    status,
                    body: body.to_string(),
                },
            );
            self
        }

        pub fn unreachable(mut self, url: &str) -> Self {
            self.unreachable.push(key(url));
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
            self.requests.lock().push(url.to_string());
            let url = key(url);
            if self.unreachable.contains(&url) {
                return Err(FetchError::Unreachable(url));
            }
            Ok(self.pages.get(&url).cloned().unwrap_or(FetchResponse {
                status: 404,
                body: String::new(),
            }))
        }
    }
}
