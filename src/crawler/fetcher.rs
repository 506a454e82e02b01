//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent, timeout and session cookies
//! - Bounding total and per-host concurrent connections
//! - Pacing every request through the [`ThrottleController`]
//! - Collapsing transport failures into a uniform status 500

use crate::config::Config;
use crate::state::ThrottleController;
use crate::url::extract_authority;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Status reported for any transport-level failure (timeout, DNS, connection reset)
pub const TRANSPORT_FAILURE_STATUS: u16 = 500;

/// Maximum redirect hops followed when redirects are allowed
const MAX_FOLLOWED_REDIRECTS: usize = 10;

/// Result of a page fetch
#[derive(Debug, Clone)]
pub struct FetchedText {
    pub status: u16,

    /// Response body; `None` for redirects, transport failures and empty responses
    pub body: Option<String>,

    /// URL the response came from; for an unfollowed 3xx, the `Location` target
    pub final_url: Url,
}

/// Result of an asset fetch
#[derive(Debug, Clone)]
pub struct FetchedBytes {
    pub status: u16,
    pub body: Option<Vec<u8>>,

    /// Content-Type header value, if any
    pub content_type: Option<String>,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The mirror configuration (user agent, timeout, connection limits)
/// * `cookies` - Session cookies sent with every request
/// * `follow_redirects` - Whether 3xx responses are followed automatically
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    config: &Config,
    cookies: &BTreeMap<String, String>,
    follow_redirects: bool,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = cookie_header(cookies) {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => tracing::warn!("Ignoring cookies: value is not a valid header"),
        }
    }

    let policy = if follow_redirects {
        Policy::limited(MAX_FOLLOWED_REDIRECTS)
    } else {
        Policy::none()
    };

    Client::builder()
        .user_agent(config.site.user_agent.clone())
        .default_headers(headers)
        .timeout(config.crawler.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(config.crawler.per_host_connections)
        .redirect(policy)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Formats cookies as a `Cookie` header value (`a=1; b=2`)
pub fn cookie_header(cookies: &BTreeMap<String, String>) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Connection-pooled, throttled HTTP access to the forum
///
/// Every call waits the throttle delay, holds one global and one per-host connection slot for
/// the duration of the request, and reports the resulting status back to the throttle, whether
/// the request succeeded or not.
#[derive(Debug)]
pub struct Fetcher {
    following: Client,
    not_following: Client,
    throttle: Arc<ThrottleController>,
    connections: Arc<Semaphore>,
    per_host_limit: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Fetcher {
    /// Creates a fetcher with its own clients
    pub fn new(
        config: &Config,
        cookies: &BTreeMap<String, String>,
        throttle: Arc<ThrottleController>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            following: build_http_client(config, cookies, true)?,
            not_following: build_http_client(config, cookies, false)?,
            throttle,
            connections: Arc::new(Semaphore::new(config.crawler.total_connections().max(1))),
            per_host_limit: config.crawler.per_host_connections.max(1),
            hosts: Mutex::new(HashMap::new()),
        })
    }

    pub fn throttle(&self) -> &Arc<ThrottleController> {
        &self.throttle
    }

    /// Fetches a page as text
    ///
    /// With `allow_redirects = false` a 3xx response is returned as-is with `final_url` set to
    /// the absolute `Location` target, so the caller can record the redirect.
    pub async fn fetch_text(&self, url: &Url, allow_redirects: bool) -> FetchedText {
        self.throttle.before_request().await;
        let _permits = self.acquire(url).await;

        let fetched = match self.get_text(url, allow_redirects).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::debug!("Fetch failed for {}: {}", url, e);
                FetchedText {
                    status: TRANSPORT_FAILURE_STATUS,
                    body: None,
                    final_url: url.clone(),
                }
            }
        };

        self.throttle.after_response(fetched.status);
        fetched
    }

    /// Fetches an asset as raw bytes, following redirects
    pub async fn fetch_bytes(&self, url: &Url) -> FetchedBytes {
        self.throttle.before_request().await;
        let _permits = self.acquire(url).await;

        let fetched = match self.get_bytes(url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::debug!("Asset fetch failed for {}: {}", url, e);
                FetchedBytes {
                    status: TRANSPORT_FAILURE_STATUS,
                    body: None,
                    content_type: None,
                }
            }
        };

        self.throttle.after_response(fetched.status);
        fetched
    }

    async fn get_text(&self, url: &Url, allow_redirects: bool) -> Result<FetchedText, reqwest::Error> {
        let client = if allow_redirects {
            &self.following
        } else {
            &self.not_following
        };

        let response = client.get(url.clone()).send().await?;
        let status = response.status();

        if !allow_redirects && status.is_redirection() {
            let final_url = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| url.join(location).ok())
                .unwrap_or_else(|| url.clone());
            return Ok(FetchedText {
                status: status.as_u16(),
                body: None,
                final_url,
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await?;
        Ok(FetchedText {
            status: status.as_u16(),
            body: Some(body).filter(|b| !b.is_empty()),
            final_url,
        })
    }

    async fn get_bytes(&self, url: &Url) -> Result<FetchedBytes, reqwest::Error> {
        let response = self.following.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(FetchedBytes {
            status,
            body: Some(body.to_vec()).filter(|b| !b.is_empty()),
            content_type,
        })
    }

    /// Waits for a global and a per-host connection slot
    async fn acquire(&self, url: &Url) -> (Option<OwnedSemaphorePermit>, Option<OwnedSemaphorePermit>) {
        let host = {
            let authority = extract_authority(url).unwrap_or_default();
            let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                hosts
                    .entry(authority)
                    .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit))),
            )
        };

        let global = Arc::clone(&self.connections).acquire_owned().await.ok();
        let per_host = host.acquire_owned().await.ok();
        (global, per_host)
    }
}
