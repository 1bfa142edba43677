//! Markup extraction for listing and detail pages
//!
//! This module turns fetched HTML into pipeline inputs:
//! - `pages`: the pagination control on the root page → [`PageSet`](crate::PageSet)
//! - `listing`: item elements on a listing page → detail URLs
//! - `record`: one detail page → [`Record`](crate::Record)
//!
//! All selectors come from the configured [`SiteProfile`](crate::config::SiteProfile).
//! Parsed documents are never held across an `.await`; every function here is
//! synchronous and returns owned data.

mod listing;
mod pages;
mod record;

pub use listing::extract_detail_links;
pub use pages::{discover_pages, parse_pages};
pub use record::extract_record;

use crate::ExtractionError;
use scraper::{ElementRef, Selector};
use url::Url;

/// Parses a configured selector
pub(crate) fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::InvalidSelector {
        selector: css.to_string(),
        message: format!("{:?}", e),
    })
}

/// Collects an element's text content with surrounding whitespace removed
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Resolves an href against the page it was found on
///
/// Returns None if the link should be ignored:
/// - empty or fragment-only hrefs
/// - javascript:, mailto:, tel:, data: schemes
/// - anything that does not resolve to HTTP(S)
pub(crate) fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
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

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url)
        }
        _ => None,
    }
}
