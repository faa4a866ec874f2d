//! Listing link discovery on catalog pages

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts listing addresses from a rendered catalog page
///
/// # Link Extraction Rules
///
/// - Only elements matching `selector` are considered; their `href` is
///   resolved against `base_url`
/// - `javascript:`, `mailto:`, `tel:`, `data:` and fragment-only links are dropped
/// - Non-HTTP(S) results are dropped
/// - Document order is kept, repeated addresses appear once
///
/// A page where nothing matches yields an empty list; that is a catalog page
/// with zero results, not a failure.
///
/// # Example
///
/// ```
/// use catalog_harvester::extract::extract_child_links;
/// use scraper::Selector;
/// use url::Url;
///
/// let html = r#"<a class="ad" href="/item-1">One</a><a href="/about">About</a>"#;
/// let base = Url::parse("https://example.com/cars?page=1").unwrap();
/// let selector = Selector::parse("a.ad").unwrap();
/// let links = extract_child_links(html, &base, &selector);
/// assert_eq!(links, vec!["https://example.com/item-1".to_string()]);
/// ```
pub fn extract_child_links(html: &str, base_url: &Url, selector: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if let Some(absolute) = resolve_link(href, base_url) {
            if seen.insert(absolute.clone()) {
                links.push(absolute);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute http(s) URL
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute.to_string())
    } else {
        None
    }
}
