//! Search engine - ranked lemma search over the persisted index / 搜索引擎
//!
//! Flow for one query:
//! - query text → distinct lemmas (same extractor as indexing)
//! - each lemma → its per-site rows, rarest first
//! - candidate pages from the rarest lemma, intersected with every other lemma
//! - score = Σ rank, relevance = score / max score
//! - count taken before the offset/limit slice; titles and snippets only for the slice

use std::collections::HashMap;
use thiserror::Error;

use super::lemma::LemmaExtractor;
use super::schema::{SearchHit, SearchOptions, SearchResults};
use super::snippet::{page_title, SnippetSelector};
use crate::config::normalize_site_url;
use crate::models::Lemma;
use crate::repository::Repository;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Empty search query")]
    EmptyQuery,
    #[error("Site not found: {0}")]
    SiteNotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Rows of one query lemma across the selected sites
struct LemmaGroup {
    lemma: String,
    rows: Vec<Lemma>,
}

impl LemmaGroup {
    fn total_frequency(&self) -> i64 {
        self.rows.iter().map(|r| r.frequency).sum()
    }
}

pub struct SearchEngine {
    repo: Repository,
    extractor: LemmaExtractor,
    snippets: SnippetSelector,
    default_limit: usize,
}

impl SearchEngine {
    pub fn new(repo: Repository, extractor: LemmaExtractor, snippets: SnippetSelector, default_limit: usize) -> Self {
        Self {
            repo,
            extractor,
            snippets,
            default_limit: default_limit.max(1),
        }
    }

    pub async fn search(&self, options: &SearchOptions) -> Result<SearchResults, SearchError> {
        if options.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let site_id = match &options.site {
            Some(url) => {
                let url = normalize_site_url(url);
                let site = self
                    .repo
                    .find_site_by_url(&url)
                    .await?
                    .ok_or(SearchError::SiteNotFound(url))?;
                Some(site.id)
            }
            None => None,
        };

        let lemmas = self.extractor.distinct_lemmas(&options.query);
        if lemmas.is_empty() {
            return Ok(SearchResults::default());
        }

        let Some(groups) = self.resolve_lemmas(&lemmas, site_id).await? else {
            tracing::debug!("Query '{}' has a lemma absent from the index", options.query);
            return Ok(SearchResults::default());
        };

        let ranked = self.rank_pages(&groups).await?;
        let count = ranked.len();

        let limit = if options.limit == 0 { self.default_limit } else { options.limit };
        let end = options.offset.saturating_add(limit).min(count);
        let slice = ranked.get(options.offset..end).unwrap_or_default();

        let query_lemmas: Vec<String> = groups.into_iter().map(|g| g.lemma).collect();
        let mut data = Vec::with_capacity(slice.len());
        for &(page_id, relevance) in slice {
            let Some(page) = self.repo.find_page_with_site(page_id).await? else {
                continue;
            };
            data.push(SearchHit {
                site: page.site_url,
                site_name: page.site_name,
                uri: page.path,
                title: page_title(&page.content),
                snippet: self.snippets.snippet(&page.content, &query_lemmas),
                relevance,
            });
        }

        tracing::debug!("Query '{}': {} matches, {} returned", options.query, count, data.len());
        Ok(SearchResults { count, data })
    }

    /// Lemma rows per query lemma, rarest lemma first; `None` if any lemma is unknown
    async fn resolve_lemmas(
        &self,
        lemmas: &[String],
        site_id: Option<i64>,
    ) -> Result<Option<Vec<LemmaGroup>>, sqlx::Error> {
        let mut groups = Vec::with_capacity(lemmas.len());
        for lemma in lemmas {
            let rows = self.repo.find_lemmas_ordered_by_frequency(lemma, site_id).await?;
            if rows.is_empty() {
                return Ok(None);
            }
            groups.push(LemmaGroup {
                lemma: lemma.clone(),
                rows,
            });
        }
        groups.sort_by_key(LemmaGroup::total_frequency);
        Ok(Some(groups))
    }

    /// (page id, relevance) of every page holding all lemmas, best first
    async fn rank_pages(&self, groups: &[LemmaGroup]) -> Result<Vec<(i64, f64)>, sqlx::Error> {
        let Some((rarest, rest)) = groups.split_first() else {
            return Ok(Vec::new());
        };

        let mut scores = self.page_ranks(rarest).await?;
        for group in rest {
            if scores.is_empty() {
                break;
            }
            let ranks = self.page_ranks(group).await?;
            scores.retain(|page_id, _| ranks.contains_key(page_id));
            for (page_id, score) in scores.iter_mut() {
                *score += ranks[page_id];
            }
        }

        let max = scores.values().copied().fold(0.0_f64, f64::max);
        if max <= 0.0 {
            return Ok(Vec::new());
        }

        let mut ranked: Vec<(i64, f64)> = scores.into_iter().map(|(id, s)| (id, s / max)).collect();
        ranked.sort_by_key(|(id, _)| *id);
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked)
    }

    /// page id → rank for every index entry of a lemma group
    async fn page_ranks(&self, group: &LemmaGroup) -> Result<HashMap<i64, f64>, sqlx::Error> {
        let mut ranks = HashMap::new();
        for row in &group.rows {
            for (page_id, rank) in self.repo.find_entries_by_lemma(row.id).await? {
                *ranks.entry(page_id).or_insert(0.0) += rank;
            }
        }
        Ok(ranks)
    }
}
