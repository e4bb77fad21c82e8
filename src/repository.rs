//! Repository - every lookup the crawl/index/search core needs
//!
//! Architecture principles:
//! - Only plain reads and single-row writes live here
//! - Multi-statement updates that must be atomic (lemma frequency bookkeeping)
//!   are owned by the index maintainer and run inside its own transaction

use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{IndexEntry, Lemma, Page, PageWithSite, Site, SiteStatus};

#[derive(Clone)]
pub struct Repository {
    db: SqlitePool,
}

/// Row counts for one site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteCounts {
    pub pages: i64,
    pub lemmas: i64,
}

impl Repository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    pub async fn list_sites(&self) -> Result<Vec<Site>, sqlx::Error> {
        sqlx::query_as::<_, Site>(
            "SELECT id, url, name, status, status_time, last_error FROM sites ORDER BY id",
        )
        .fetch_all(&self.db)
        .await
    }

    pub async fn find_sites_by_url(&self, url: &str) -> Result<Vec<Site>, sqlx::Error> {
        sqlx::query_as::<_, Site>(
            "SELECT id, url, name, status, status_time, last_error FROM sites WHERE url = ? ORDER BY id",
        )
        .bind(url)
        .fetch_all(&self.db)
        .await
    }

    pub async fn find_site_by_url(&self, url: &str) -> Result<Option<Site>, sqlx::Error> {
        Ok(self.find_sites_by_url(url).await?.into_iter().next())
    }

    pub async fn create_site(
        &self,
        url: &str,
        name: &str,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<Site, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO sites (url, name, status, status_time, last_error) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(url)
        .bind(name)
        .bind(status.as_str())
        .bind(&now)
        .bind(last_error)
        .execute(&self.db)
        .await?;

        Ok(Site {
            id: result.last_insert_rowid(),
            url: url.to_string(),
            name: name.to_string(),
            status: status.as_str().to_string(),
            status_time: now,
            last_error: last_error.map(str::to_string),
        })
    }

    /// Set status and error, refreshing the status time
    pub async fn set_site_status(
        &self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sites SET status = ?, last_error = ?, status_time = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(last_error)
            .bind(Utc::now().to_rfc3339())
            .bind(site_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Refresh the status time only
    pub async fn touch_site(&self, site_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sites SET status_time = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(site_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Mark every site still INDEXING as FAILED with the given error
    pub async fn fail_indexing_sites(&self, error: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sites SET status = ?, last_error = ?, status_time = ? WHERE status = ?",
        )
        .bind(SiteStatus::Failed.as_str())
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(SiteStatus::Indexing.as_str())
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Remove a site with its pages, lemmas and index entries
    pub async fn delete_site(&self, site_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "DELETE FROM index_entries WHERE page_id IN (SELECT id FROM pages WHERE site_id = ?)",
        )
        .bind(site_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM lemmas WHERE site_id = ?")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM pages WHERE site_id = ?")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sites WHERE id = ?")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }

    pub async fn find_page(&self, site_id: i64, path: &str) -> Result<Option<Page>, sqlx::Error> {
        sqlx::query_as::<_, Page>(
            "SELECT id, site_id, path, code, content FROM pages WHERE site_id = ? AND path = ?",
        )
        .bind(site_id)
        .bind(path)
        .fetch_optional(&self.db)
        .await
    }

    /// Store a fetched page, replacing any row already at (site, path)
    pub async fn save_page(
        &self,
        site_id: i64,
        path: &str,
        code: i64,
        content: &str,
    ) -> Result<Page, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO pages (site_id, path, code, content) VALUES (?, ?, ?, ?)
            ON CONFLICT(site_id, path) DO UPDATE SET
                code = excluded.code,
                content = excluded.content
            "#,
        )
        .bind(site_id)
        .bind(path)
        .bind(code)
        .bind(content)
        .execute(&self.db)
        .await?;

        self.find_page(site_id, path)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_lemma(&self, site_id: i64, lemma: &str) -> Result<Option<Lemma>, sqlx::Error> {
        sqlx::query_as::<_, Lemma>(
            "SELECT id, site_id, lemma, frequency FROM lemmas WHERE site_id = ? AND lemma = ?",
        )
        .bind(site_id)
        .bind(lemma)
        .fetch_optional(&self.db)
        .await
    }

    /// Lemma rows for one lemma text across all sites (or one site), rarest first
    pub async fn find_lemmas_ordered_by_frequency(
        &self,
        lemma: &str,
        site_id: Option<i64>,
    ) -> Result<Vec<Lemma>, sqlx::Error> {
        sqlx::query_as::<_, Lemma>(
            r#"
            SELECT id, site_id, lemma, frequency FROM lemmas
            WHERE lemma = ? AND (? IS NULL OR site_id = ?)
            ORDER BY frequency ASC, id ASC
            "#,
        )
        .bind(lemma)
        .bind(site_id)
        .bind(site_id)
        .fetch_all(&self.db)
        .await
    }

    pub async fn find_lemmas_by_frequency(&self, frequency: i64) -> Result<Vec<Lemma>, sqlx::Error> {
        sqlx::query_as::<_, Lemma>(
            "SELECT id, site_id, lemma, frequency FROM lemmas WHERE frequency <= ? ORDER BY id",
        )
        .bind(frequency)
        .fetch_all(&self.db)
        .await
    }

    /// (page_id, rank) for every index entry of a lemma row
    pub async fn find_entries_by_lemma(&self, lemma_id: i64) -> Result<Vec<(i64, f64)>, sqlx::Error> {
        sqlx::query_as::<_, (i64, f64)>(
            "SELECT page_id, rank FROM index_entries WHERE lemma_id = ? ORDER BY page_id",
        )
        .bind(lemma_id)
        .fetch_all(&self.db)
        .await
    }

    pub async fn find_entries_by_page(&self, page_id: i64) -> Result<Vec<IndexEntry>, sqlx::Error> {
        sqlx::query_as::<_, IndexEntry>(
            "SELECT id, page_id, lemma_id, rank FROM index_entries WHERE page_id = ? ORDER BY id",
        )
        .bind(page_id)
        .fetch_all(&self.db)
        .await
    }

    pub async fn find_page_with_site(&self, page_id: i64) -> Result<Option<PageWithSite>, sqlx::Error> {
        sqlx::query_as::<_, PageWithSite>(
            r#"
            SELECT p.id AS id, p.path AS path, p.content AS content,
                   s.url AS site_url, s.name AS site_name
            FROM pages p
            INNER JOIN sites s ON s.id = p.site_id
            WHERE p.id = ?
            "#,
        )
        .bind(page_id)
        .fetch_optional(&self.db)
        .await
    }

    pub async fn site_counts(&self, site_id: i64) -> Result<SiteCounts, sqlx::Error> {
        let pages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.db)
            .await?;
        let lemmas: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lemmas WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.db)
            .await?;
        Ok(SiteCounts { pages, lemmas })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn repo() -> Repository {
        Repository::new(db::connect_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_site_lifecycle() {
        let repo = repo().await;
        let site = repo
            .create_site("https://example.ru", "Example", SiteStatus::Indexing, None)
            .await
            .unwrap();

        assert_eq!(site.status(), SiteStatus::Indexing);

        let failed = repo.fail_indexing_sites("stopped").await.unwrap();
        assert_eq!(failed, 1);

        let stored = repo.find_site_by_url("https://example.ru").await.unwrap().unwrap();
        assert_eq!(stored.status(), SiteStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("stopped"));

        repo.delete_site(site.id).await.unwrap();
        assert!(repo.list_sites().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_page_replaces_existing_row() {
        let repo = repo().await;
        let site = repo
            .create_site("https://example.ru", "Example", SiteStatus::Indexing, None)
            .await
            .unwrap();

        let first = repo.save_page(site.id, "/a", 200, "old").await.unwrap();
        let second = repo.save_page(site.id, "/a", 404, "").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.code, 404);
        assert_eq!(repo.site_counts(site.id).await.unwrap().pages, 1);
    }
}
