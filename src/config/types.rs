use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Forum-Mirror
///
/// Built once at startup and shared read-only (behind an `Arc`) by every component.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub crawler: CrawlerConfig,
    pub throttle: ThrottleConfig,
    pub scheduler: SchedulerConfig,
    pub filters: FilterConfig,
    pub assets: AssetConfig,
    pub paths: PathConfig,
}

impl Config {
    /// Creates a default configuration for the given forum and backup folder
    pub fn for_forum(base_url: impl Into<String>, backup_root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.site.base_url = base_url.into();
        config.site.backup_root = backup_root.into();
        config
    }
}

/// Target forum and local output folder
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Root URL of the forum, e.g. `https://example.forumeiros.com`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Folder receiving the mirror and the persisted state files
    #[serde(rename = "backup-root")]
    pub backup_root: PathBuf,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            backup_root: PathBuf::from("."),
            user_agent: "ForumMirror/1.0".to_string(),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of concurrent workers per phase
    pub workers: usize,

    /// Failed attempts after which a URL is marked failed
    #[serde(rename = "retry-limit")]
    pub retry_limit: u32,

    /// Total timeout of a single request (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Maximum concurrent connections to a single host
    #[serde(rename = "per-host-connections")]
    pub per_host_connections: usize,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Total connection budget shared by all workers
    pub fn total_connections(&self) -> usize {
        self.workers * 2
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            retry_limit: 3,
            request_timeout_secs: 30,
            per_host_connections: 4,
        }
    }
}

/// Adaptive pacing configuration (all delays in seconds)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    #[serde(rename = "base-delay")]
    pub base_delay: f64,

    #[serde(rename = "min-delay")]
    pub min_delay: f64,

    #[serde(rename = "max-delay")]
    pub max_delay: f64,

    /// Amount subtracted from the delay after a full success window
    #[serde(rename = "delay-step")]
    pub delay_step: f64,

    /// Consecutive 2xx responses needed before speeding up
    #[serde(rename = "success-window")]
    pub success_window: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            base_delay: 0.5,
            min_delay: 0.1,
            max_delay: 10.0,
            delay_step: 0.1,
            success_window: 30,
        }
    }
}

/// Worker pool timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Sleep between two empty reservation attempts (milliseconds)
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Consecutive empty polls after which a discovery worker exits
    #[serde(rename = "max-idle-polls")]
    pub max_idle_polls: u32,

    /// Interval between discovery pool growth checks (milliseconds)
    #[serde(rename = "grow-interval-ms")]
    pub grow_interval_ms: u64,

    /// Pending backlog required before another discovery worker is started
    #[serde(rename = "grow-backlog")]
    pub grow_backlog: usize,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grow_interval(&self) -> Duration {
        Duration::from_millis(self.grow_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_idle_polls: 15,
            grow_interval_ms: 1000,
            grow_backlog: 20,
        }
    }
}

/// Link filters applied during discovery
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Paths starting with any of these prefixes are never crawled
    #[serde(rename = "ignored-prefixes")]
    pub ignored_prefixes: Vec<String>,

    /// Links carrying any of these query parameter keys are never crawled
    #[serde(rename = "blacklist-params")]
    pub blacklist_params: Vec<String>,
}

/// Asset download configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Assets larger than this (KiB) are left remote
    #[serde(rename = "max-asset-kb")]
    pub max_asset_kb: Option<u64>,

    /// Host patterns never fetched (`host` or `*.domain`)
    #[serde(rename = "ad-hosts")]
    pub ad_hosts: Vec<String>,

    /// Remote hosts files merged into the ad-host list
    #[serde(rename = "ad-sources")]
    pub ad_sources: Vec<AdSource>,
}

impl AssetConfig {
    pub fn max_asset_bytes(&self) -> Option<usize> {
        self.max_asset_kb.map(|kb| {
            usize::try_from(kb)
                .ok()
                .and_then(|kb| kb.checked_mul(1024))
                .unwrap_or(usize::MAX)
        })
    }
}

/// A hosts-format blocklist location
#[derive(Debug, Clone, Deserialize)]
pub struct AdSource {
    pub url: String,

    /// Days a cached copy stays fresh
    #[serde(rename = "cache-days", default = "default_cache_days")]
    pub cache_days: u64,
}

fn default_cache_days() -> u64 {
    7
}

/// Local file layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// First character of the first path segment -> output folder
    #[serde(rename = "folder-mapping")]
    pub folder_mapping: BTreeMap<String, String>,

    /// Maximum length of a slugified path segment
    #[serde(rename = "slug-max-len")]
    pub slug_max_len: usize,
}

impl Default for PathConfig {
    fn default() -> Self {
        let folder_mapping = [
            ("c", "categories"),
            ("f", "forums"),
            ("t", "topics"),
            ("u", "members"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            folder_mapping,
            slug_max_len: 120,
        }
    }
}
