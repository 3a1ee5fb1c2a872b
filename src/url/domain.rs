use std::net::IpAddr;
use url::Url;

/// Second-level labels under which institutions register their names,
/// as in `nust.edu.pk` or `ox.ac.uk`
const SECOND_LEVEL_LABELS: &[&str] = &["ac", "co", "com", "edu", "gov", "net", "org", "sch"];

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use campus_harvest::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.EDU/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.edu".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Reduces a host to the name its owner registered
///
/// `admissions.nust.edu.pk` and `nust.edu.pk` both yield `nust.edu.pk`;
/// `www.example.edu` yields `example.edu`. IP addresses and single-label
/// hosts are returned unchanged.
///
/// # Examples
///
/// ```
/// use campus_harvest::url::registrable_domain;
///
/// assert_eq!(registrable_domain("ugadmissions.nust.edu.pk"), "nust.edu.pk");
/// assert_eq!(registrable_domain("www.example.edu"), "example.edu");
/// assert_eq!(registrable_domain("127.0.0.1"), "127.0.0.1");
/// ```
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();

    if host.parse::<IpAddr>().is_ok() || !host.contains('.') {
        return host;
    }

    let labels: Vec<&str> = host.split('.').collect();
    let n = labels.len();

    let keep = if n >= 3 && labels[n - 1].len() == 2 && SECOND_LEVEL_LABELS.contains(&labels[n - 2])
    {
        3
    } else {
        2
    };

    labels[n.saturating_sub(keep)..].join(".")
}

/// Returns true if both hosts belong to the same registrable domain
pub fn same_registrable_domain(a: &str, b: &str) -> bool {
    registrable_domain(a) == registrable_domain(b)
}
