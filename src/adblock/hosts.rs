//! Hosts-file parsing
//!
//! Blocklists are distributed in the `/etc/hosts` format: one `<ip> <host>` pair per line,
//! `#` starting a comment.

/// Hostnames that appear in every hosts file and must never be treated as ad hosts
const LOCAL_NAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "0.0.0.0",
];

/// Extracts the blocked hostnames from hosts-file text
///
/// Only the first name after the address is taken, lowercased. Lines whose first field is not
/// an IP address are ignored.
///
/// # Examples
///
/// ```
/// use forum_mirror::adblock::parse_hosts_file;
///
/// let hosts = parse_hosts_file("# list\n0.0.0.0 ads.example.net\n127.0.0.1 localhost\n");
/// assert_eq!(hosts, vec!["ads.example.net".to_string()]);
/// ```
pub fn parse_hosts_file(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.split('#').next().unwrap_or_default().trim();
            let mut fields = line.split_whitespace();
            let address = fields.next()?;
            let host = fields.next()?;

            if address.parse::<std::net::IpAddr>().is_err() {
                return None;
            }

            let host = host.trim_end_matches('.').to_lowercase();
            if host.is_empty() || LOCAL_NAMES.contains(&host.as_str()) {
                return None;
            }
            Some(host)
        })
        .collect()
}
