//! Page content and link extraction
//!
//! This module turns fetched HTML into:
//! - the page title and plain text used for extraction
//! - cleaned markup with script-like elements removed
//! - the candidate links worth following on a university site

use crate::url::{canonical_url, same_registrable_domain};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Keywords used when a university entry configures none
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "program",
    "admission",
    "faculty",
    "department",
    "degree",
    "undergraduate",
    "graduate",
    "bs",
    "ms",
    "phd",
    "mbbs",
    "bds",
];

/// Elements whose content never counts as page text
const STRIPPED_ELEMENTS: &str = "script, style, noscript, template";

/// Title, text and cleaned markup of a page
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub title: String,
    pub text: String,
    pub markup: String,
}

/// Returns the keyword set for a site, falling back to the defaults
pub fn effective_keywords(configured: &[String]) -> Vec<String> {
    if configured.is_empty() {
        DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
    } else {
        configured.iter().map(|k| k.trim().to_lowercase()).collect()
    }
}

/// Extracts the title, plain text and cleaned markup from an HTML document
///
/// # Example
///
/// ```
/// use campus_harvest::crawler::extract_page_content;
///
/// let html = r#"<html><head><title>Admissions</title><script>var x;</script></head>
///     <body><h1>BS   Computer Science</h1></body></html>"#;
/// let content = extract_page_content(html);
/// assert_eq!(content.title, "Admissions");
/// assert_eq!(content.text, "BS Computer Science");
/// assert!(!content.markup.contains("var x"));
/// ```
pub fn extract_page_content(html: &str) -> PageContent {
    let mut document = Html::parse_document(html);
    let title = extract_title(&document);

    if let Ok(selector) = Selector::parse(STRIPPED_ELEMENTS) {
        let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    let text = match Selector::parse("body") {
        Ok(body) => match document.select(&body).next() {
            Some(element) => collapse_whitespace(element.text()),
            None => collapse_whitespace(document.root_element().text()),
        },
        Err(_) => collapse_whitespace(document.root_element().text()),
    };

    PageContent {
        title,
        text,
        markup: document.html(),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .map(|element| collapse_whitespace(element.text()))
        })
        .unwrap_or_default()
}

fn collapse_whitespace<'a>(fragments: impl Iterator<Item = &'a str>) -> String {
    fragments
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns `scheme://host[:port]/` for a URL
pub fn origin_root(url: &Url) -> Option<Url> {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    if root.cannot_be_a_base() {
        return None;
    }
    Some(root)
}

/// Extracts the links worth following from a page
///
/// A candidate link:
/// - resolves against the page's origin root (not the page path)
/// - uses http or https
/// - stays on `site_domain`'s registrable domain
/// - contains at least one keyword, case-insensitively
///
/// Fragment-only, `mailto:`, `tel:`, `javascript:` and `data:` links are
/// skipped. Results are canonical and deduplicated, in first-discovery order.
///
/// # Arguments
///
/// * `markup` - The page HTML
/// * `page_url` - The URL the page was served from
/// * `site_domain` - The university's registrable domain
/// * `keywords` - Lowercase topical keywords
pub fn extract_candidate_links(
    markup: &str,
    page_url: &Url,
    site_domain: &str,
    keywords: &[String],
) -> Vec<String> {
    let Some(root) = origin_root(page_url) else {
        return Vec::new();
    };

    let document = Html::parse_document(markup);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(resolved) = resolve_link(href, &root) else {
            continue;
        };

        let on_site = resolved
            .host_str()
            .map(|host| same_registrable_domain(host, site_domain))
            .unwrap_or(false);
        if !on_site {
            continue;
        }

        let Some(canonical) = canonical_url(resolved.as_str()) else {
            continue;
        };

        let lowered = canonical.to_lowercase();
        if !keywords.iter().any(|k| lowered.contains(k.as_str())) {
            continue;
        }

        if seen.insert(canonical.clone()) {
            links.push(canonical);
        }
    }

    links
}

/// Resolves a link href against the origin root
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only anchors
/// - non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, root: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let absolute = root.join(href).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute)
    } else {
        None
    }
}
