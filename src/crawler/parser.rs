//! HTML parser for extracting links
//!
//! Discovery only follows `<a href>` anchors; stylesheets, scripts and images are handled by
//! the rewrite pipeline during the download phase.

use crate::url::LinkFilter;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Returns the raw `href` of every anchor in the document, in document order
pub fn extract_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Extracts the crawlable same-domain links of a page as store keys
///
/// # Arguments
///
/// * `html` - The page content
/// * `page_url` - URL the page was served from; relative links resolve against it
/// * `filter` - Domain, prefix and query-parameter rules
///
/// # Returns
///
/// Distinct path+query keys in document order
///
/// # Example
///
/// ```
/// use forum_mirror::config::FilterConfig;
/// use forum_mirror::crawler::extract_links;
/// use forum_mirror::url::{LinkFilter, Site};
/// use url::Url;
///
/// let filter = LinkFilter::new(Site::parse("https://forum.example.com").unwrap(), &FilterConfig::default());
/// let page = Url::parse("https://forum.example.com/").unwrap();
/// let html = r#"<a href="/f17-something">Forum</a><a href="https://other.example/">Out</a>"#;
/// assert_eq!(extract_links(html, &page, &filter), vec!["/f17-something".to_string()]);
/// ```
pub fn extract_links(html: &str, page_url: &Url, filter: &LinkFilter) -> Vec<String> {
    let mut seen = HashSet::new();
    extract_hrefs(html)
        .iter()
        .filter_map(|href| filter.link_key(page_url, href))
        .filter(|key| seen.insert(key.clone()))
        .collect()
}
