//! Cookie-based forum sessions
//!
//! Members-only boards are mirrored by reusing the cookies of a browser session. The cookies
//! are read from a JSON object (`{"name": "value", ...}`), checked once against the forum
//! index, and then sent by every request of the run.

use crate::config::Config;
use crate::crawler::{build_http_client, extract_hrefs};
use crate::Result;
use reqwest::Client;
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;

/// Default cookie file name inside the backup root
pub const COOKIES_FILE: &str = "cookies.json";

/// Session cookies and whether they authenticate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub cookies: BTreeMap<String, String>,
    pub logged_in: bool,
}

impl Credentials {
    /// Loads cookies from `path` and checks them against the forum index
    ///
    /// A failed check is not an error: the crawl then proceeds as an anonymous visitor.
    pub async fn establish(config: &Config, path: &Path) -> Result<Self> {
        let cookies = load_cookies(path)?;
        if cookies.is_empty() {
            tracing::info!("No cookies in {}, crawling anonymously", path.display());
            return Ok(Self::default());
        }

        let client = build_http_client(config, &cookies, true)?;
        let forum_url = Url::parse(&config.site.base_url)?;
        let logged_in = check_logged_in(&client, &forum_url).await;

        if logged_in {
            tracing::info!("Logged in with {} cookies", cookies.len());
        } else {
            tracing::warn!("Cookies from {} do not authenticate, continuing anonymously", path.display());
        }
        Ok(Self { cookies, logged_in })
    }
}

/// Reads a JSON object of cookie name -> value
///
/// # Returns
///
/// * `Ok(cookies)` - Parsed cookies; empty when the file does not exist
/// * `Err(MirrorError)` - The file exists but is unreadable or not a JSON string map
pub fn load_cookies(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&text)?)
}

/// Fetches the forum index and reports whether it shows a link to a profile page
///
/// Forums only link `/profile…` pages for the member currently logged in. Any request
/// failure counts as "not logged in".
pub async fn check_logged_in(client: &Client, forum_url: &Url) -> bool {
    let html = match client.get(forum_url.clone()).send().await {
        Ok(response) => match response.text().await {
            Ok(html) => html,
            Err(e) => {
                tracing::debug!("Login check could not read {}: {}", forum_url, e);
                return false;
            }
        },
        Err(e) => {
            tracing::debug!("Login check could not fetch {}: {}", forum_url, e);
            return false;
        }
    };

    extract_hrefs(&html)
        .iter()
        .filter_map(|href| forum_url.join(href).ok())
        .any(|url| url.path().to_ascii_lowercase().starts_with("/profile"))
}
