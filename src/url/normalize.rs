use crate::UrlError;
use url::Url;

/// Query parameters that only track the visitor
/// (any `utm_*` key is dropped as well)
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "source"];

/// Canonicalises a URL so that the visited set compares like with like
///
/// Only HTTP(S) URLs are accepted. The host is lowercased, the path loses
/// dot segments, empty segments and its trailing slash, the fragment is
/// dropped, and tracking parameters are removed from the query, which is
/// then sorted by key.
///
/// The scheme and any `www.` prefix are preserved.
///
/// # Examples
///
/// ```
/// use campus_harvest::url::normalize_url;
///
/// let url = normalize_url("https://WWW.EXAMPLE.EDU/admissions/?utm_source=x#apply").unwrap();
/// assert_eq!(url.as_str(), "https://www.example.edu/admissions");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingDomain)?;
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let path = normalize_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    let params = retained_query_params(&url);
    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params);
    }

    Ok(url)
}

/// Canonical string form of a URL, or None when it cannot be normalised
pub fn canonical_url(url_str: &str) -> Option<String> {
    normalize_url(url_str).ok().map(String::from)
}

/// Resolves dot segments, drops empty segments and any trailing slash
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Non-tracking query parameters, sorted by key
fn retained_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.starts_with("utm_") && !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    params
}
