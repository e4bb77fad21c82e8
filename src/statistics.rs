//! Statistics service / 统计服务
//! Aggregates site / page / lemma counts for the dashboard

use serde::Serialize;

use crate::repository::Repository;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TotalStatistics {
    pub sites: usize,
    pub pages: i64,
    pub lemmas: i64,
    pub indexing: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedStatistics {
    pub url: String,
    pub name: String,
    pub status: String,
    /// Unix timestamp (seconds) of the last status change
    pub status_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub pages: i64,
    pub lemmas: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub total: TotalStatistics,
    pub detailed: Vec<DetailedStatistics>,
}

/// Totals plus per-site detail; `indexing` comes from the live task registry
pub async fn collect(repo: &Repository, indexing: bool) -> Result<Statistics, sqlx::Error> {
    let sites = repo.list_sites().await?;
    let mut stats = Statistics {
        total: TotalStatistics {
            sites: sites.len(),
            indexing,
            ..Default::default()
        },
        detailed: Vec::with_capacity(sites.len()),
    };

    for site in sites {
        let counts = repo.site_counts(site.id).await?;
        stats.total.pages += counts.pages;
        stats.total.lemmas += counts.lemmas;

        let status_time = chrono::DateTime::parse_from_rfc3339(&site.status_time)
            .map(|t| t.timestamp())
            .unwrap_or(0);

        stats.detailed.push(DetailedStatistics {
            url: site.url,
            name: site.name,
            status: site.status,
            status_time,
            error: site.last_error,
            pages: counts.pages,
            lemmas: counts.lemmas,
        });
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::SiteStatus;

    #[tokio::test]
    async fn test_collect() {
        let repo = Repository::new(db::connect_memory().await.unwrap());
        let a = repo
            .create_site("https://a.ru", "A", SiteStatus::Indexed, None)
            .await
            .unwrap();
        repo.create_site("https://b.ru", "B", SiteStatus::Failed, Some("boom"))
            .await
            .unwrap();
        repo.save_page(a.id, "/", 200, "x").await.unwrap();
        repo.save_page(a.id, "/x", 404, "").await.unwrap();

        let stats = collect(&repo, true).await.unwrap();
        assert_eq!(stats.total.sites, 2);
        assert_eq!(stats.total.pages, 2);
        assert!(stats.total.indexing);
        assert_eq!(stats.detailed[0].status, "INDEXED");
        assert!(stats.detailed[0].status_time > 0);
        assert_eq!(stats.detailed[1].error.as_deref(), Some("boom"));

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["detailed"][0]["statusTime"], stats.detailed[0].status_time);
    }
}
