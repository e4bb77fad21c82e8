//! Index maintainer - keeps lemma frequencies and index entries in step with stored pages
//! 索引维护 - 词元频率与索引条目随页面同步更新
//!
//! Frequency writes for one site go through a per-site async lock, and each
//! page is written in a single transaction. SQLite lock contention from other
//! writers is retried a few times before giving up.

use parking_lot::Mutex;
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::models::Page;
use crate::repository::Repository;
use crate::search::lemma::{LemmaCounts, LemmaExtractor};

const MAX_RETRIES: u32 = 3;

pub struct IndexMaintainer {
    repo: Repository,
    extractor: LemmaExtractor,
    site_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

fn is_busy(e: &sqlx::Error) -> bool {
    let msg = e.to_string();
    msg.contains("database is locked") || msg.contains("SQLITE_BUSY")
}

impl IndexMaintainer {
    pub fn new(repo: Repository, extractor: LemmaExtractor) -> Self {
        Self {
            repo,
            extractor,
            site_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn extractor(&self) -> &LemmaExtractor {
        &self.extractor
    }

    fn site_lock(&self, site_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        self.site_locks
            .lock()
            .entry(site_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the write lock of a site whose rows were deleted
    pub fn forget_site(&self, site_id: i64) {
        self.site_locks.lock().remove(&site_id);
    }

    /// Add a stored page's lemmas to the index. Returns the number of distinct lemmas.
    pub async fn index_page(&self, page: &Page) -> Result<usize, sqlx::Error> {
        let counts = self.extractor.extract(&page.content);
        if counts.is_empty() {
            return Ok(0);
        }

        let lock = self.site_lock(page.site_id);
        let _guard = lock.lock().await;

        let mut attempt = 0;
        loop {
            match self.write_page_lemmas(page, &counts).await {
                Ok(()) => break,
                Err(e) if is_busy(&e) && attempt + 1 < MAX_RETRIES => {
                    attempt += 1;
                    let delay = 100 * attempt as u64;
                    tracing::debug!(
                        "Database locked, retrying in {}ms (attempt {}/{})",
                        delay,
                        attempt,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!("Indexed page {} ({} lemmas)", page.path, counts.len());
        Ok(counts.len())
    }

    async fn write_page_lemmas(&self, page: &Page, counts: &LemmaCounts) -> Result<(), sqlx::Error> {
        let mut tx = self.repo.pool().begin().await?;
        for (lemma, count) in counts {
            upsert_lemma_entry(&mut tx, page, lemma, *count).await?;
        }
        tx.commit().await
    }

    /// Remove the page at (site, path) together with its contribution to lemma frequencies.
    /// Returns false when no such page was stored.
    pub async fn deindex_page(&self, site_id: i64, path: &str) -> Result<bool, sqlx::Error> {
        let Some(page) = self.repo.find_page(site_id, path).await? else {
            return Ok(false);
        };

        let lock = self.site_lock(site_id);
        let _guard = lock.lock().await;

        let mut tx = self.repo.pool().begin().await?;

        sqlx::query(
            r#"
            UPDATE lemmas SET frequency = frequency - 1
            WHERE id IN (SELECT lemma_id FROM index_entries WHERE page_id = ?)
            "#,
        )
        .bind(page.id)
        .execute(&mut *tx)
        .await?;

        let removed = sqlx::query("DELETE FROM lemmas WHERE site_id = ? AND frequency <= 0")
            .bind(site_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM index_entries WHERE page_id = ?")
            .bind(page.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(page.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!("Deindexed page {} of site {} ({} lemmas dropped)", path, site_id, removed);
        Ok(true)
    }
}

/// Lemma row upsert plus index entry; frequency grows only on the first entry of this page
async fn upsert_lemma_entry(
    tx: &mut Transaction<'_, Sqlite>,
    page: &Page,
    lemma: &str,
    count: u32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO lemmas (site_id, lemma, frequency) VALUES (?, ?, 0) ON CONFLICT(site_id, lemma) DO NOTHING",
    )
    .bind(page.site_id)
    .bind(lemma)
    .execute(&mut **tx)
    .await?;

    let lemma_id: i64 = sqlx::query_scalar("SELECT id FROM lemmas WHERE site_id = ? AND lemma = ?")
        .bind(page.site_id)
        .bind(lemma)
        .fetch_one(&mut **tx)
        .await?;

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM index_entries WHERE page_id = ? AND lemma_id = ?")
            .bind(page.id)
            .bind(lemma_id)
            .fetch_optional(&mut **tx)
            .await?;

    if existing.is_none() {
        sqlx::query("UPDATE lemmas SET frequency = frequency + 1 WHERE id = ?")
            .bind(lemma_id)
            .execute(&mut **tx)
            .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO index_entries (page_id, lemma_id, rank) VALUES (?, ?, ?)
        ON CONFLICT(page_id, lemma_id) DO UPDATE SET rank = excluded.rank
        "#,
    )
    .bind(page.id)
    .bind(lemma_id)
    .bind(count as f64)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::SiteStatus;
    use crate::morphology::testing::DictionaryMorphology;
    use futures::future::join_all;

    async fn setup() -> (Repository, IndexMaintainer, i64) {
        let repo = Repository::new(db::connect_memory().await.unwrap());
        let morph = DictionaryMorphology::new()
            .word("кота", &["кот"])
            .word("коты", &["кот"])
            .word("собаки", &["собака"])
            .word("стали", &["сталь", "стать"]);
        let maintainer = IndexMaintainer::new(repo.clone(), LemmaExtractor::new(Arc::new(morph)));
        let site = repo
            .create_site("https://site.ru", "Site", SiteStatus::Indexing, None)
            .await
            .unwrap();
        (repo, maintainer, site.id)
    }

    async fn frequencies(repo: &Repository) -> Vec<(String, i64)> {
        sqlx::query_as::<_, (String, i64)>("SELECT lemma, frequency FROM lemmas ORDER BY lemma")
            .fetch_all(repo.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_frequency_counts_pages() {
        let (repo, maintainer, site_id) = setup().await;
        let a = repo.save_page(site_id, "/a", 200, "<p>кот кота коты</p>").await.unwrap();
        let b = repo.save_page(site_id, "/b", 200, "<p>кот и собаки</p>").await.unwrap();
        maintainer.index_page(&a).await.unwrap();
        maintainer.index_page(&b).await.unwrap();

        assert_eq!(
            frequencies(&repo).await,
            vec![("кот".to_string(), 2), ("собака".to_string(), 1)]
        );

        let kot = repo.find_lemma(site_id, "кот").await.unwrap().unwrap();
        let entries = repo.find_entries_by_lemma(kot.id).await.unwrap();
        assert_eq!(entries, vec![(a.id, 3.0), (b.id, 1.0)]);
    }

    #[tokio::test]
    async fn test_reindex_same_page_does_not_double_count() {
        let (repo, maintainer, site_id) = setup().await;
        let a = repo.save_page(site_id, "/a", 200, "кот кот").await.unwrap();
        maintainer.index_page(&a).await.unwrap();
        maintainer.index_page(&a).await.unwrap();

        assert_eq!(frequencies(&repo).await, vec![("кот".to_string(), 1)]);
        let entries = repo.find_entries_by_page(a.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rank, 2.0);
    }

    #[tokio::test]
    async fn test_deindex_then_reindex_keeps_frequencies() {
        let (repo, maintainer, site_id) = setup().await;
        let content = "<p>кот стали собаки</p>";
        let a = repo.save_page(site_id, "/a", 200, content).await.unwrap();
        let b = repo.save_page(site_id, "/b", 200, "кот").await.unwrap();
        maintainer.index_page(&a).await.unwrap();
        maintainer.index_page(&b).await.unwrap();
        let before = frequencies(&repo).await;

        assert!(maintainer.deindex_page(site_id, "/a").await.unwrap());
        assert_eq!(frequencies(&repo).await, vec![("кот".to_string(), 1)]);

        let a = repo.save_page(site_id, "/a", 200, content).await.unwrap();
        maintainer.index_page(&a).await.unwrap();
        assert_eq!(frequencies(&repo).await, before);
    }

    #[tokio::test]
    async fn test_rank_sum_matches_extractor_total() {
        let (repo, maintainer, site_id) = setup().await;
        let content = "<html><title>Коты</title><body>кот и кота, стали на собаки</body></html>";
        let page = repo.save_page(site_id, "/", 200, content).await.unwrap();
        maintainer.index_page(&page).await.unwrap();

        let expected: u32 = maintainer.extractor().extract(content).values().sum();
        let total: f64 = repo
            .find_entries_by_page(page.id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.rank)
            .sum();
        assert_eq!(total, expected as f64);
    }

    #[tokio::test]
    async fn test_no_zero_frequency_rows_remain() {
        let (repo, maintainer, site_id) = setup().await;
        for (path, content) in [("/a", "кот собаки"), ("/b", "кот"), ("/c", "стали")] {
            let page = repo.save_page(site_id, path, 200, content).await.unwrap();
            maintainer.index_page(&page).await.unwrap();
        }
        for path in ["/a", "/c", "/b"] {
            maintainer.deindex_page(site_id, path).await.unwrap();
            assert!(repo.find_lemmas_by_frequency(0).await.unwrap().is_empty());
        }
        assert!(frequencies(&repo).await.is_empty());
        assert!(!maintainer.deindex_page(site_id, "/a").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_pages_keep_every_frequency_update() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("index.db").display());
        let pool = db::connect(&url).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let repo = Repository::new(pool);
        let maintainer = Arc::new(IndexMaintainer::new(
            repo.clone(),
            LemmaExtractor::new(Arc::new(DictionaryMorphology::new().word("кота", &["кот"]))),
        ));
        let site = repo
            .create_site("https://site.ru", "Site", SiteStatus::Indexing, None)
            .await
            .unwrap();

        let mut pages = Vec::new();
        for i in 0..20 {
            let content = format!("кот кота страница{}", "а".repeat(i + 1));
            pages.push(repo.save_page(site.id, &format!("/{}", i), 200, &content).await.unwrap());
        }

        let tasks = pages.into_iter().map(|page| {
            let maintainer = maintainer.clone();
            tokio::spawn(async move { maintainer.index_page(&page).await })
        });
        for result in join_all(tasks).await {
            assert_eq!(result.unwrap().unwrap(), 2);
        }

        let kot = repo.find_lemma(site.id, "кот").await.unwrap().unwrap();
        assert_eq!(kot.frequency, 20);
        let entries = repo.find_entries_by_lemma(kot.id).await.unwrap();
        assert_eq!(entries.len(), 20);
        assert!(entries.iter().all(|(_, rank)| *rank == 2.0));
    }

    #[tokio::test]
    async fn test_forget_site_drops_lock() {
        let (repo, maintainer, site_id) = setup().await;
        let page = repo.save_page(site_id, "/a", 200, "кот").await.unwrap();
        maintainer.index_page(&page).await.unwrap();
        assert_eq!(maintainer.site_locks.lock().len(), 1);

        maintainer.forget_site(site_id);
        assert!(maintainer.site_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_page_adds_nothing() {
        let (repo, maintainer, site_id) = setup().await;
        let page = repo.save_page(site_id, "/empty", 200, "<div>123 hello</div>").await.unwrap();
        assert_eq!(maintainer.index_page(&page).await.unwrap(), 0);
        assert!(frequencies(&repo).await.is_empty());
    }
}
