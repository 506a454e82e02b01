use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
///
/// # Arguments
///
/// * `url` - The URL to extract the domain from
///
/// # Returns
///
/// * `Some(String)` - The lowercase domain/host
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use forum_mirror::url::extract_domain;
///
/// let url = Url::parse("https://FORUM.example.com/f1-news").unwrap();
/// assert_eq!(extract_domain(&url), Some("forum.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts `host[:port]` from a URL, lowercased
///
/// The port is only included when it differs from the scheme's default, so
/// `https://a.com:443/` and `https://a.com/` share the authority `a.com`.
pub fn extract_authority(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
