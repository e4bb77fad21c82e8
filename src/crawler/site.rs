//! Fork/join crawl of a single site
//!
//! Every accepted link becomes its own tokio task; a parent waits for all of
//! its children before returning their pages together with its own. The
//! visited set is shared by the whole site crawl, and the cancellation token is
//! checked before each delay, during the delay and around each fetch.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::{FetchedPage, PageFetcher};
use crate::config::CrawlerConfig;
use crate::utils::crawlable_path;

/// Per-crawl tuning
#[derive(Debug, Clone, Copy)]
pub struct CrawlSettings {
    /// Pause applied by every link task before its fetch
    pub politeness_delay: Duration,
    /// Fetches allowed in flight at once for this site
    pub max_concurrent_fetches: usize,
}

impl From<&CrawlerConfig> for CrawlSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            politeness_delay: config.politeness_delay(),
            max_concurrent_fetches: config.max_concurrent_fetches.max(1),
        }
    }
}

pub struct SiteCrawler {
    fetcher: Arc<dyn PageFetcher>,
    site_url: String,
    visited: Mutex<HashSet<String>>,
    permits: Semaphore,
    delay: Duration,
    token: CancellationToken,
}

impl SiteCrawler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        site_url: &str,
        settings: CrawlSettings,
        token: CancellationToken,
    ) -> Arc<Self> {
        let mut visited = HashSet::new();
        visited.insert("/".to_string());

        Arc::new(Self {
            fetcher,
            site_url: site_url.trim_end_matches('/').to_string(),
            visited: Mutex::new(visited),
            permits: Semaphore::new(settings.max_concurrent_fetches.max(1)),
            delay: settings.politeness_delay,
            token,
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fetch one path immediately. Network failures are folded into code 0,
    /// error answers keep their code with an empty body.
    pub async fn fetch_page(&self, path: &str) -> FetchedPage {
        let url = format!("{}{}", self.site_url, path);
        match self.fetcher.fetch(&url).await {
            Ok(res) => {
                tracing::debug!("Fetched {} ({})", url, res.status);
                let content = if res.status >= 400 { String::new() } else { res.body };
                FetchedPage {
                    path: path.to_string(),
                    code: res.status,
                    content,
                }
            }
            Err(e) => {
                tracing::warn!("Fetch failed for {}: {}", url, e);
                FetchedPage {
                    path: path.to_string(),
                    code: 0,
                    content: String::new(),
                }
            }
        }
    }

    /// Fetch the root and crawl everything reachable from it
    pub async fn crawl_site(self: &Arc<Self>) -> Vec<FetchedPage> {
        if self.is_cancelled() {
            return Vec::new();
        }
        let root = self.fetch_page("/").await;
        self.crawl_from(root).await
    }

    /// Crawl everything reachable from an already fetched root page.
    /// The result contains the root itself followed by all descendants.
    pub async fn crawl_from(self: &Arc<Self>, root: FetchedPage) -> Vec<FetchedPage> {
        let pages = self.clone().visit(root).await;
        tracing::info!("Crawl of {} finished: {} pages", self.site_url, pages.len());
        pages
    }

    fn visit(self: Arc<Self>, page: FetchedPage) -> BoxFuture<'static, Vec<FetchedPage>> {
        Box::pin(async move {
            let children = if page.is_available() && !self.is_cancelled() {
                self.accept_links(&page.content)
            } else {
                Vec::new()
            };

            let mut pages = vec![page];
            let mut tasks = JoinSet::new();
            for path in children {
                if self.is_cancelled() {
                    break;
                }
                let crawler = self.clone();
                tasks.spawn(async move {
                    match crawler.delayed_fetch(&path).await {
                        Some(child) => crawler.visit(child).await,
                        None => Vec::new(),
                    }
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(mut sub) => pages.append(&mut sub),
                    Err(e) => tracing::error!("Crawl task of {} failed: {}", self.site_url, e),
                }
            }
            pages
        })
    }

    /// Politeness delay then fetch; `None` once cancellation is observed
    async fn delayed_fetch(&self, path: &str) -> Option<FetchedPage> {
        tokio::select! {
            _ = self.token.cancelled() => return None,
            _ = tokio::time::sleep(self.delay) => {}
        }

        let _permit = tokio::select! {
            _ = self.token.cancelled() => return None,
            permit = self.permits.acquire() => permit.ok()?,
        };

        tokio::select! {
            _ = self.token.cancelled() => None,
            page = self.fetch_page(path) => Some(page),
        }
    }

    /// Anchors of a page that pass the link filter and were not seen before
    fn accept_links(&self, html: &str) -> Vec<String> {
        let hrefs = extract_hrefs(html);
        let mut visited = self.visited.lock();
        let mut accepted = Vec::new();

        for href in hrefs {
            let Some(path) = crawlable_path(&self.site_url, &href) else {
                continue;
            };
            if visited.insert(path.clone()) {
                tracing::debug!("Link accepted: {}{}", self.site_url, path);
                accepted.push(path);
            }
        }
        accepted
    }
}

/// Raw `href` values of every anchor in document order
pub fn extract_hrefs(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    doc.select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect()
}
