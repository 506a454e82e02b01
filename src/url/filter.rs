use crate::config::FilterConfig;
use crate::url::{path_plus_query, Site};
use url::Url;

/// Decides which anchors found on a page are crawlable forum pages
#[derive(Debug, Clone)]
pub struct LinkFilter {
    site: Site,
    ignored_prefixes: Vec<String>,
    blacklist_params: Vec<String>,
}

impl LinkFilter {
    pub fn new(site: Site, filters: &FilterConfig) -> Self {
        Self {
            site,
            ignored_prefixes: filters.ignored_prefixes.clone(),
            blacklist_params: filters.blacklist_params.clone(),
        }
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    /// Resolves `href` against the page it appears on and returns its store key
    ///
    /// # Arguments
    ///
    /// * `page_url` - URL of the page containing the link
    /// * `href` - Raw attribute value
    ///
    /// # Returns
    ///
    /// * `Some(key)` - path+query of a same-domain page that should be crawled
    /// * `None` - mail/script/fragment-only links, external hosts, ignored prefixes, or a
    ///   blacklisted query parameter
    pub fn link_key(&self, page_url: &Url, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || is_non_page_href(href) {
            return None;
        }

        let mut url = page_url.join(href).ok()?;
        url.set_fragment(None);
        self.key_for(&url)
    }

    /// Store key for an absolute URL, if it passes every filter
    pub fn key_for(&self, url: &Url) -> Option<String> {
        if !self.site.is_same_domain(url) {
            return None;
        }

        let key = path_plus_query(url);
        let path = key.split('?').next().unwrap_or_default();
        if self
            .ignored_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return None;
        }

        if !self.blacklist_params.is_empty()
            && url
                .query_pairs()
                .any(|(key, _)| self.blacklist_params.iter().any(|b| *b == key))
        {
            return None;
        }

        Some(key)
    }
}

fn is_non_page_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    href.starts_with('#')
        || lower.starts_with("mailto:")
        || lower.starts_with("javascript:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_filter() -> LinkFilter {
        let site = Site::parse("https://forum.example.com").unwrap();
        let filters = FilterConfig {
            ignored_prefixes: vec!["/login".to_string(), "/search".to_string()],
            blacklist_params: vec!["sid".to_string(), "mode".to_string()],
        };
        LinkFilter::new(site, &filters)
    }

    fn page() -> Url {
        Url::parse("https://forum.example.com/f17-something").unwrap()
    }

    #[test]
    fn test_internal_links_keep_query_and_drop_fragment() {
        let filter = create_test_filter();
        assert_eq!(
            filter.link_key(&page(), "/t5-hello?start=10#p20").as_deref(),
            Some("/t5-hello?start=10")
        );
        assert_eq!(
            filter
                .link_key(&page(), "https://forum.example.com/u3")
                .as_deref(),
            Some("/u3")
        );
    }

    #[test]
    fn test_relative_links_resolve_against_page() {
        let filter = create_test_filter();
        let page = Url::parse("https://forum.example.com/forum/f17-something").unwrap();
        assert_eq!(
            filter.link_key(&page, "t5-hello").as_deref(),
            Some("/forum/t5-hello")
        );
    }

    #[test]
    fn test_rejects_non_page_links() {
        let filter = create_test_filter();
        for href in ["mailto:a@b.c", "javascript:void(0)", "#top", "", "  "] {
            assert_eq!(filter.link_key(&page(), href), None, "{}", href);
        }
    }

    #[test]
    fn test_leading_double_slash_is_collapsed() {
        let filter = create_test_filter();
        assert_eq!(
            filter
                .link_key(&page(), "https://forum.example.com//viewtopic.php?t=1")
                .as_deref(),
            Some("/viewtopic.php?t=1")
        );
        assert_eq!(
            filter.link_key(&page(), "/.//evil.example/x").as_deref(),
            Some("/evil.example/x")
        );
        assert_eq!(filter.link_key(&page(), "https://forum.example.com//login"), None);
    }

    #[test]
    fn test_rejects_external_and_filtered() {
        let filter = create_test_filter();
        assert_eq!(filter.link_key(&page(), "https://other.example/t1"), None);
        assert_eq!(filter.link_key(&page(), "/login?redirect=/"), None);
        assert_eq!(filter.link_key(&page(), "/searchresults"), None);
        assert_eq!(filter.link_key(&page(), "/t5-hello?sid=abc"), None);
        assert_eq!(filter.link_key(&page(), "/t5-hello?x=1&mode=reply"), None);
        assert!(filter.link_key(&page(), "/t5-hello?sidebar=1").is_some());
    }
}
