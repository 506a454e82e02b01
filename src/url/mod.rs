//! URL handling module for Forum-Mirror
//!
//! This module decides which links belong to the mirrored forum, turns URLs into the
//! path+query keys used by the stores, and maps those keys to local file names.

mod domain;
mod filter;
mod path_mapper;

use crate::{UrlError, UrlResult};
use url::Url;

// Re-export main functions
pub use domain::{extract_authority, extract_domain};
pub use filter::LinkFilter;
pub use path_mapper::{PathMapper, SlugPathMapper};

/// The forum being mirrored
///
/// "Same domain" means same host and port; the scheme is ignored so that `http` links on an
/// `https` forum are still followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    base: Url,
    authority: String,
}

impl Site {
    /// Parses the forum root URL
    ///
    /// # Examples
    ///
    /// ```
    /// use forum_mirror::url::Site;
    ///
    /// let site = Site::parse("https://forum.example.com").unwrap();
    /// assert_eq!(site.authority(), "forum.example.com");
    /// assert_eq!(site.url_for_path("/t5-hello?start=10").as_str(),
    ///            "https://forum.example.com/t5-hello?start=10");
    /// ```
    pub fn parse(base_url: &str) -> UrlResult<Self> {
        let base = Url::parse(base_url).map_err(|e| UrlError::Parse(e.to_string()))?;

        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                base.scheme()
            )));
        }

        let authority = extract_authority(&base).ok_or(UrlError::MissingHost)?;
        Ok(Self { base, authority })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `host[:port]` of the forum, lowercased
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Returns true if `url` is served by the forum itself
    pub fn is_same_domain(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
            && extract_authority(url).as_deref() == Some(self.authority.as_str())
    }

    /// Absolute URL for a store key (path+query)
    ///
    /// The key only ever replaces the path and query of the forum root, so a key such as
    /// `//other.example/x` can never move the request to another host.
    pub fn url_for_path(&self, key: &str) -> Url {
        let (path, query) = match key.split_once('?') {
            Some((path, query)) => (path, Some(query).filter(|q| !q.is_empty())),
            None => (key, None),
        };

        let mut url = self.base.clone();
        url.set_path(&collapse_leading_slashes(path));
        url.set_query(query);
        url.set_fragment(None);
        url
    }
}

/// Store key of a URL: its path followed by `?query` when present
///
/// # Examples
///
/// ```
/// use url::Url;
/// use forum_mirror::url::path_plus_query;
///
/// let url = Url::parse("https://forum.example.com/t5-hello?start=10#p20").unwrap();
/// assert_eq!(path_plus_query(&url), "/t5-hello?start=10");
/// ```
///
/// Repeated leading slashes collapse to one: `https://forum.example.com//t5-hello` has the key
/// `/t5-hello`.
pub fn path_plus_query(url: &Url) -> String {
    let path = collapse_leading_slashes(url.path());
    match url.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", path, query),
        _ => path,
    }
}

fn collapse_leading_slashes(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}
