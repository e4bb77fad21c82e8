use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client};

use super::{FetchError, FetchResponse, PageFetcher};
use crate::config::CrawlerConfig;

/// reqwest-backed fetcher: no redirects, bounded timeout, fixed UA and referrer
#[derive(Clone)]
pub struct HttpFetcher {
    http: Client,
    referrer: String,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(Policy::none())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            referrer: config.referrer.clone(),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let url = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;

        let res = self
            .http
            .get(url)
            .header(header::REFERER, self.referrer.as_str())
            .send()
            .await?;
        let status = res.status().as_u16();
        let body = res.text().await?;

        Ok(FetchResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_invalid_url() {
        let fetcher = HttpFetcher::new(&CrawlerConfig::default()).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
