//! Indexing orchestrator - per-site crawl + index lifecycles / 索引编排器
//!
//! Architecture principles:
//! - Every configured site gets its own tokio task and cancellation token
//! - The task registry is owned here and guarded by one async mutex shared by
//!   start, stop and status queries
//! - Work already committed by a cancelled task is kept; the site ends FAILED

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::maintainer::IndexMaintainer;
use crate::config::SiteConfig;
use crate::crawler::{CrawlSettings, FetchedPage, PageFetcher, SiteCrawler};
use crate::models::{Site, SiteStatus};
use crate::repository::Repository;
use crate::utils::split_page_url;

pub const STOPPED_BY_USER: &str = "Indexing stopped by user";
pub const ROOT_UNAVAILABLE: &str = "Indexing error: site root page is unavailable";

#[derive(Debug, Error)]
pub enum IndexingError {
    #[error("Indexing is already running")]
    AlreadyRunning,
    #[error("Indexing is not running")]
    NotRunning,
    #[error("This page is outside the sites listed in the configuration file")]
    OutOfScope,
    #[error("Invalid page address: {0}")]
    InvalidUrl(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

struct SiteTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Everything a site task needs, cloned into each spawned task
#[derive(Clone)]
struct Worker {
    repo: Repository,
    maintainer: Arc<IndexMaintainer>,
    fetcher: Arc<dyn PageFetcher>,
    settings: CrawlSettings,
}

pub struct IndexingService {
    worker: Worker,
    sites: Vec<SiteConfig>,
    tasks: Mutex<HashMap<String, SiteTask>>,
}

impl IndexingService {
    pub fn new(
        repo: Repository,
        maintainer: Arc<IndexMaintainer>,
        fetcher: Arc<dyn PageFetcher>,
        sites: Vec<SiteConfig>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            worker: Worker {
                repo,
                maintainer,
                fetcher,
                settings,
            },
            sites,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// True while any site task is still running
    pub async fn is_indexing(&self) -> bool {
        self.tasks.lock().await.values().any(|t| !t.handle.is_finished())
    }

    /// Launch one crawl + index task per configured site
    pub async fn start_indexing(&self) -> Result<(), IndexingError> {
        let mut tasks = self.tasks.lock().await;
        if tasks.values().any(|t| !t.handle.is_finished()) {
            return Err(IndexingError::AlreadyRunning);
        }
        tasks.clear();

        self.remove_unconfigured_sites().await?;

        for site in &self.sites {
            let token = CancellationToken::new();
            let worker = self.worker.clone();
            let site_cfg = site.clone();
            let task_token = token.clone();
            let handle = tokio::spawn(async move {
                worker.run_site(site_cfg, task_token).await;
            });
            tasks.insert(site.url.clone(), SiteTask { token, handle });
        }

        tracing::info!("Indexing started for {} sites", self.sites.len());
        Ok(())
    }

    /// Cancel every running site task and fail the sites still INDEXING
    pub async fn stop_indexing(&self) -> Result<(), IndexingError> {
        let tasks = self.tasks.lock().await;
        let active: Vec<&String> = tasks
            .iter()
            .filter(|(_, t)| !t.handle.is_finished())
            .map(|(url, _)| url)
            .collect();
        if active.is_empty() {
            return Err(IndexingError::NotRunning);
        }

        for task in tasks.values() {
            task.token.cancel();
        }
        let failed = self.worker.repo.fail_indexing_sites(STOPPED_BY_USER).await?;
        tracing::info!("Indexing stopped: {} tasks cancelled, {} sites failed", active.len(), failed);
        Ok(())
    }

    /// Wait until every launched site task has finished
    pub async fn wait_idle(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().await;
            tasks.drain().map(|(_, t)| t.handle).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Site task panicked: {}", e);
            }
        }
    }

    /// Fetch and (re)index a single page of a configured site
    pub async fn index_single_page(&self, url: &str) -> Result<(), IndexingError> {
        let (site_url, path) =
            split_page_url(url).ok_or_else(|| IndexingError::InvalidUrl(url.to_string()))?;
        let site_cfg = self
            .sites
            .iter()
            .find(|s| s.url == site_url)
            .ok_or(IndexingError::OutOfScope)?;

        let repo = &self.worker.repo;
        let site = match repo.find_site_by_url(&site_cfg.url).await? {
            Some(site) => site,
            None => {
                repo.create_site(&site_cfg.url, &site_cfg.name, SiteStatus::Indexing, None)
                    .await?
            }
        };

        self.worker.maintainer.deindex_page(site.id, &path).await?;

        let crawler = SiteCrawler::new(
            self.worker.fetcher.clone(),
            &site.url,
            self.worker.settings,
            CancellationToken::new(),
        );
        let page = crawler.fetch_page(&path).await;
        self.worker.store_page(&site, page).await?;

        repo.set_site_status(site.id, SiteStatus::Indexed, None).await?;
        tracing::info!("Indexed single page {}{}", site.url, path);
        Ok(())
    }

    async fn remove_unconfigured_sites(&self) -> Result<(), IndexingError> {
        for site in self.worker.repo.list_sites().await? {
            if !self.sites.iter().any(|s| s.url == site.url) {
                tracing::info!("Removing site no longer configured: {}", site.url);
                self.worker.repo.delete_site(site.id).await?;
                self.worker.maintainer.forget_site(site.id);
            }
        }
        Ok(())
    }
}

fn before_site(e: sqlx::Error) -> (Option<i64>, IndexingError) {
    (None, IndexingError::from(e))
}

impl Worker {
    async fn run_site(&self, site_cfg: SiteConfig, token: CancellationToken) {
        let Err((site_id, e)) = self.index_site(&site_cfg, &token).await else {
            return;
        };
        tracing::error!("Indexing of {} failed: {}", site_cfg.url, e);

        if let Some(id) = site_id {
            let error = e.to_string();
            if let Err(e) = self.repo.set_site_status(id, SiteStatus::Failed, Some(&error)).await {
                tracing::error!("Could not mark {} as failed: {}", site_cfg.url, e);
            }
        }
    }

    /// Crawl and index one site. On error, returns the site row id (if created) with the cause.
    async fn index_site(
        &self,
        site_cfg: &SiteConfig,
        token: &CancellationToken,
    ) -> Result<(), (Option<i64>, IndexingError)> {
        for old in self.repo.find_sites_by_url(&site_cfg.url).await.map_err(before_site)? {
            self.repo.delete_site(old.id).await.map_err(before_site)?;
            self.maintainer.forget_site(old.id);
        }

        let site = self
            .repo
            .create_site(&site_cfg.url, &site_cfg.name, SiteStatus::Indexing, None)
            .await
            .map_err(before_site)?;
        let site_id = site.id;
        let fail = move |e: sqlx::Error| (Some(site_id), IndexingError::from(e));

        tracing::info!("Indexing site {} ({})", site.url, site.name);
        let crawler = SiteCrawler::new(self.fetcher.clone(), &site.url, self.settings, token.clone());

        let root = crawler.fetch_page("/").await;
        if token.is_cancelled() {
            return self.mark_stopped(&site).await.map_err(fail);
        }
        if !root.is_available() {
            tracing::warn!("Root page of {} is unavailable (code {})", site.url, root.code);
            self.repo
                .set_site_status(site.id, SiteStatus::Failed, Some(ROOT_UNAVAILABLE))
                .await
                .map_err(fail)?;
            return Ok(());
        }

        let pages = crawler.crawl_from(root).await;

        let mut stored = 0usize;
        for page in pages {
            if token.is_cancelled() {
                break;
            }
            self.store_page(&site, page).await.map_err(fail)?;
            self.repo.touch_site(site.id).await.map_err(fail)?;
            stored += 1;
        }

        if token.is_cancelled() {
            tracing::info!("Indexing of {} stopped after {} pages", site.url, stored);
            return self.mark_stopped(&site).await.map_err(fail);
        }

        self.repo
            .set_site_status(site.id, SiteStatus::Indexed, None)
            .await
            .map_err(fail)?;
        tracing::info!("Site {} indexed: {} pages", site.url, stored);
        Ok(())
    }

    async fn mark_stopped(&self, site: &Site) -> Result<(), sqlx::Error> {
        self.repo
            .set_site_status(site.id, SiteStatus::Failed, Some(STOPPED_BY_USER))
            .await
    }

    /// Save a fetched page and index it when it answered below 400
    async fn store_page(&self, site: &Site, page: FetchedPage) -> Result<(), sqlx::Error> {
        let available = page.is_available();
        let stored = self
            .repo
            .save_page(site.id, &page.path, page.code as i64, &page.content)
            .await?;
        if available {
            self.maintainer.index_page(&stored).await?;
        }
        Ok(())
    }
}
