//! URL processing utility functions / URL处理工具函数

use url::Url;

/// Path of a parsed URL in its stored spelling: percent-encoded, never empty,
/// query string kept. Crawled links and single-page requests both go through
/// here so one page always maps to one row.
pub fn page_path(url: &Url) -> String {
    let mut path = url.path().to_string();
    if path.is_empty() {
        path.push('/');
    }
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    path
}

/// Split an absolute page URL into its site root and site-relative path.
///
/// The site root is `scheme://host[:port]` without a trailing slash; the path
/// is spelled by [`page_path`]. Returns `None` when the URL cannot be parsed or
/// is not http(s).
pub fn split_page_url(raw: &str) -> Option<(String, String)> {
    let url = Url::parse(raw.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    let host = url.host_str()?;

    let site = match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    };

    Some((site, page_path(&url)))
}

/// Trim whitespace and drop a `#fragment`
pub fn normalize_link(href: &str) -> String {
    let href = href.trim();
    match href.find('#') {
        Some(pos) => href[..pos].to_string(),
        None => href.to_string(),
    }
}

/// Site-relative path for a crawlable anchor, or `None` when the link must be skipped.
///
/// Rejected: empty, `/`, the site root itself, anything not starting with a
/// single `/` (absolute and protocol-relative links) and links with a query string.
/// Accepted links are resolved against the site root, so `/новости` and
/// `/%D0%BD%D0%BE%D0%B2%D0%BE%D1%81%D1%82%D0%B8` yield the same path.
pub fn crawlable_path(site_url: &str, href: &str) -> Option<String> {
    let link = normalize_link(href);
    if link.is_empty() || link == "/" {
        return None;
    }
    let root = site_url.trim_end_matches('/');
    if link == root || link.trim_end_matches('/') == root {
        return None;
    }
    if !link.starts_with('/') || link.starts_with("//") {
        return None;
    }
    if link.contains('?') {
        return None;
    }

    let base = Url::parse(root).ok()?;
    let url = base.join(&link).ok()?;
    let path = page_path(&url);
    if path == "/" {
        return None;
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_page_url() {
        assert_eq!(
            split_page_url("https://lenta.ru/news/1"),
            Some(("https://lenta.ru".to_string(), "/news/1".to_string()))
        );
        assert_eq!(
            split_page_url("http://localhost:8080"),
            Some(("http://localhost:8080".to_string(), "/".to_string()))
        );
        assert_eq!(
            split_page_url("https://lenta.ru/search?q=1"),
            Some(("https://lenta.ru".to_string(), "/search?q=1".to_string()))
        );
        assert_eq!(split_page_url("not a url"), None);
        assert_eq!(split_page_url("ftp://lenta.ru/file"), None);
    }

    #[test]
    fn test_crawlable_path() {
        let site = "https://lenta.ru";
        assert_eq!(crawlable_path(site, "/a"), Some("/a".to_string()));
        assert_eq!(crawlable_path(site, " /a#top "), Some("/a".to_string()));
        assert_eq!(crawlable_path(site, "/"), None);
        assert_eq!(crawlable_path(site, "#top"), None);
        assert_eq!(crawlable_path(site, "https://lenta.ru"), None);
        assert_eq!(crawlable_path(site, "https://lenta.ru/"), None);
        assert_eq!(crawlable_path(site, "https://lenta.ru/a"), None);
        assert_eq!(crawlable_path(site, "//cdn.lenta.ru/a"), None);
        assert_eq!(crawlable_path(site, "mailto:x@lenta.ru"), None);
        assert_eq!(crawlable_path(site, "/b?x=1"), None);
        assert_eq!(crawlable_path(site, "/a/../"), None);
        assert_eq!(crawlable_path(site, "/a/./b"), Some("/a/b".to_string()));
    }

    #[test]
    fn test_cyrillic_paths_share_one_spelling() {
        let encoded = "/%D0%BD%D0%BE%D0%B2%D0%BE%D1%81%D1%82%D0%B8";
        let site = "https://lenta.ru";
        assert_eq!(crawlable_path(site, "/новости"), Some(encoded.to_string()));
        assert_eq!(crawlable_path(site, encoded), Some(encoded.to_string()));
        assert_eq!(
            split_page_url("https://lenta.ru/новости"),
            Some((site.to_string(), encoded.to_string()))
        );
    }
}
