//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json.
//! Creates a default config file on first run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Crawler configuration
    #[serde(default)]
    pub crawler: CrawlerConfig,
    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,
    /// Morphology configuration
    #[serde(default)]
    pub morphology: MorphologyConfig,
    /// Sites to crawl and index
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Data directory path
    pub data_dir: String,
    /// Database file path (relative to data_dir)
    pub db_file: String,
}

/// Crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header sent with every request
    pub user_agent: String,
    /// Referer header sent with every request
    pub referrer: String,
    /// Delay before each page fetch (milliseconds) / 每次抓取前的延迟(毫秒)
    pub politeness_delay_ms: u64,
    /// Request timeout (seconds) / 请求超时(秒)
    pub request_timeout_secs: u64,
    /// Maximum number of in-flight fetches per site
    pub max_concurrent_fetches: usize,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Page size used when the caller passes limit = 0
    pub default_limit: usize,
    /// Words kept on each side of the snippet window
    pub snippet_context_words: usize,
}

/// Morphology configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorphologyConfig {
    /// OpenCorpora dictionary (`dict.opcorpora.txt`) / 词典文件路径
    pub dictionary_path: String,
}

/// One configured site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub url: String,
    pub name: String,
}

impl SiteConfig {
    pub fn new(url: &str, name: &str) -> Self {
        Self {
            url: normalize_site_url(url),
            name: name.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            db_file: "search.db".to_string(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows; U; WindowsNT 5.1; en-US; rv1.8.1.6) Gecko/20070725 Firefox/2.0.0.6".to_string(),
            referrer: "http://www.google.com".to_string(),
            politeness_delay_ms: 5000,
            request_timeout_secs: 20,
            max_concurrent_fetches: 8,
        }
    }
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            dictionary_path: "data/dict.opcorpora.txt".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            snippet_context_words: 5,
        }
    }
}

impl CrawlerConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    /// Get the full database URL
    pub fn get_database_url(&self) -> String {
        let db_path = Path::new(&self.database.data_dir).join(&self.database.db_file);
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
    }

    /// Get the full data directory path
    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.database.data_dir)
    }

    /// Get the server bind address
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Trim trailing slashes from every configured site URL
    pub fn normalize(mut self) -> Self {
        for site in &mut self.sites {
            site.url = normalize_site_url(&site.url);
        }
        self
    }
}

/// Site roots are stored without a trailing slash so that `root + path` is a valid URL
pub fn normalize_site_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Get the config file path
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists
pub fn load_config() -> Result<AppConfig, String> {
    let config_path = get_config_path();

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?} ({} sites)", config_path, config.sites.len());
        Ok(config.normalize())
    } else {
        let config = AppConfig::default();
        save_config(&config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file
pub fn save_config(config: &AppConfig) -> Result<(), String> {
    let config_path = get_config_path();

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(&config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}
