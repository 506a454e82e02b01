//! Ad and tracker host blocking
//!
//! The blocklist combines the host patterns of `assets.ad-hosts` with hosts files downloaded
//! from `assets.ad-sources`. Blocked hosts are never fetched by the asset manager, and the
//! rewriter drops `<link>`/`<script>` elements pointing at them.

mod cache;
mod hosts;

pub use cache::{cache_file_name, load_or_fetch, CachedHostsFile};
pub use hosts::parse_hosts_file;

use crate::config::AssetConfig;
use crate::url::extract_domain;
use std::collections::HashSet;
use std::path::Path;
use url::Url;

/// Set of blocked hosts
///
/// Entries are either exact hostnames or `*.domain` wildcards, which match the domain itself
/// and every subdomain.
#[derive(Debug, Clone, Default)]
pub struct AdBlocklist {
    exact: HashSet<String>,
    wildcards: Vec<String>,
}

impl AdBlocklist {
    /// Builds a blocklist from host patterns
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        list.extend(patterns);
        list
    }

    /// Adds host patterns to the list
    pub fn extend<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref().trim().to_lowercase();
            if pattern.is_empty() {
                continue;
            }
            match pattern.strip_prefix("*.") {
                Some(base) if !base.is_empty() => self.wildcards.push(base.to_string()),
                _ => {
                    self.exact.insert(pattern);
                }
            }
        }
    }

    /// Loads the configured patterns plus every configured hosts-file source
    ///
    /// A source that can be neither downloaded nor read from cache is skipped with a warning;
    /// it never prevents the crawl from starting.
    pub async fn load(config: &AssetConfig, client: &reqwest::Client, root: &Path) -> Self {
        let mut list = Self::from_patterns(&config.ad_hosts);

        for source in &config.ad_sources {
            match load_or_fetch(client, root, source).await {
                Ok(text) => {
                    let hosts = parse_hosts_file(&text);
                    tracing::info!("Loaded {} ad hosts from {}", hosts.len(), source.url);
                    list.extend(hosts);
                }
                Err(e) => {
                    tracing::warn!("Skipping ad source {}: {}", source.url, e);
                }
            }
        }

        list
    }

    /// Returns true if `host` matches an exact entry or a wildcard
    pub fn is_blocked_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_lowercase();
        self.exact.contains(&host)
            || self
                .wildcards
                .iter()
                .any(|base| matches_wildcard(base, &host))
    }

    /// Returns true if the host of `url` is blocked
    pub fn is_blocked_url(&self, url: &Url) -> bool {
        extract_domain(url).is_some_and(|host| self.is_blocked_host(&host))
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Checks whether `candidate` is `base` or one of its subdomains
fn matches_wildcard(base: &str, candidate: &str) -> bool {
    candidate == base
        || candidate
            .strip_suffix(base)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let list = AdBlocklist::from_patterns(["ads.example.net"]);
        assert!(list.is_blocked_host("ads.example.net"));
        assert!(list.is_blocked_host("ADS.example.net."));
        assert!(!list.is_blocked_host("cdn.ads.example.net"));
        assert!(!list.is_blocked_host("example.net"));
    }

    #[test]
    fn test_wildcard_matches_domain_and_subdomains() {
        let list = AdBlocklist::from_patterns(["*.doubleclick.net"]);
        assert!(list.is_blocked_host("doubleclick.net"));
        assert!(list.is_blocked_host("ad.doubleclick.net"));
        assert!(list.is_blocked_host("a.b.doubleclick.net"));
        assert!(!list.is_blocked_host("notdoubleclick.net"));
        assert!(!list.is_blocked_host("doubleclick.net.evil.com"));
    }

    #[test]
    fn test_blocked_url() {
        let list = AdBlocklist::from_patterns(["ads.example.net"]);
        let blocked = Url::parse("https://ads.example.net/banner.js").unwrap();
        let allowed = Url::parse("https://forum.example.com/logo.png").unwrap();
        assert!(list.is_blocked_url(&blocked));
        assert!(!list.is_blocked_url(&allowed));
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn test_load_merges_sources() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("0.0.0.0 tracker.example.org\n"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let config = AssetConfig {
            ad_hosts: vec!["*.ads.example.net".to_string()],
            ad_sources: vec![
                crate::config::AdSource {
                    url: format!("{}/hosts.txt", server.uri()),
                    cache_days: 7,
                },
                crate::config::AdSource {
                    url: "http://127.0.0.1:1/unreachable.txt".to_string(),
                    cache_days: 7,
                },
            ],
            ..AssetConfig::default()
        };

        let list = AdBlocklist::load(&config, &reqwest::Client::new(), dir.path()).await;
        assert!(list.is_blocked_host("tracker.example.org"));
        assert!(list.is_blocked_host("x.ads.example.net"));
        assert_eq!(list.len(), 2);
    }
}
