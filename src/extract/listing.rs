use crate::config::SiteProfile;
use crate::extract::{resolve_link, selector};
use crate::ExtractionError;
use scraper::Html;
use url::Url;

/// Extracts the detail-page URL of every item on a listing page
///
/// Items are returned in document order. An item without a usable link is
/// logged and skipped; a page with no items yields an empty list. Only an
/// unparsable configured selector is an error.
pub fn extract_detail_links(
    html: &str,
    page_url: &Url,
    profile: &SiteProfile,
) -> Result<Vec<Url>, ExtractionError> {
    let document = Html::parse_document(html);
    let item_selector = selector(&profile.item)?;
    let link_selector = selector(&profile.item_link)?;

    let mut links: Vec<Url> = Vec::new();
    for (index, item) in document.select(&item_selector).enumerate() {
        let resolved = item
            .select(&link_selector)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| resolve_link(href, page_url));

        match resolved {
            Some(link) => {
                if !links.contains(&link) {
                    links.push(link);
                }
            }
            None => {
                tracing::warn!("Item {} on {} has no detail link, skipping", index + 1, page_url);
            }
        }
    }

    tracing::debug!("Found {} detail links on {}", links.len(), page_url);
    Ok(links)
}
