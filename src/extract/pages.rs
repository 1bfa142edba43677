//! Pagination discovery
//!
//! The root listing page carries a pagination control linking every other
//! listing page. Without it the number of pages cannot be bounded, so a
//! missing control is fatal for the run.

use crate::config::SiteProfile;
use crate::crawler::Fetcher;
use crate::extract::{resolve_link, selector};
use crate::model::PageSet;
use crate::{ExtractionError, HarvestError};
use scraper::Html;
use url::Url;

/// Fetches the root page and builds the full page set from its pagination control
///
/// # Returns
///
/// * `Ok(PageSet)` - Root first, then every linked page in presentation order
/// * `Err(HarvestError::Transport)` - The root page could not be fetched
/// * `Err(HarvestError::Extraction)` - No pagination control on the root page
pub async fn discover_pages(
    fetcher: &Fetcher,
    root: &Url,
    profile: &SiteProfile,
) -> Result<PageSet, HarvestError> {
    tracing::info!("Discovering listing pages from {}", root);
    let body = fetcher.fetch(root.as_str()).await?;
    let pages = parse_pages(&body, root, profile)?;
    tracing::info!("Discovered {} listing pages", pages.len());
    Ok(pages)
}

/// Reads the pagination control out of the root page's markup
///
/// Every link inside the first paginator element is resolved against `root`.
/// Identical resolved URLs are kept once, in first-seen order, and the root
/// itself is never repeated.
pub fn parse_pages(
    html: &str,
    root: &Url,
    profile: &SiteProfile,
) -> Result<PageSet, ExtractionError> {
    let document = Html::parse_document(html);
    let paginator_selector = selector(&profile.paginator)?;
    let link_selector = selector(&profile.pagination_link)?;

    let paginator = document.select(&paginator_selector).next().ok_or_else(|| {
        ExtractionError::MissingElement {
            element: "pagination control",
            url: root.to_string(),
        }
    })?;

    let mut pages = PageSet::new(root.clone());
    for link in paginator.select(&link_selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        match resolve_link(href, root) {
            Some(page) => {
                if pages.push(page) {
                    tracing::trace!("Listing page: {}", href);
                }
            }
            None => tracing::debug!("Ignoring pagination link '{}'", href),
        }
    }

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Url {
        Url::parse("https://movie.douban.com/top250").unwrap()
    }

    /// Pagination control listing pages 1-10, as the source renders it:
    /// the current page is a span, the rest are links, plus prev/next links.
    fn ten_page_listing() -> String {
        let mut links = String::new();
        for page in 2..=10 {
            links.push_str(&format!(
                r#"<a href="?start={}&amp;filter=">{}</a>"#,
                (page - 1) * 25,
                page
            ));
        }
        format!(
            r#"<html><body>
            <ol class="grid_view"></ol>
            <div class="paginator">
                <span class="prev">&lt;前页</span>
                <span class="thispage">1</span>
                {}
                <span class="next">
                    <link rel="next" href="?start=25&amp;filter="/>
                    <a href="?start=25&amp;filter=">后页&gt;</a>
                </span>
                <span class="count">(共250条)</span>
            </div>
            </body></html>"#,
            links
        )
    }

    #[test]
    fn test_ten_pages_root_first_ascending() {
        let pages = parse_pages(&ten_page_listing(), &root(), &SiteProfile::default()).unwrap();

        assert_eq!(pages.len(), 10);
        assert_eq!(pages.root(), &root());

        let urls: Vec<String> = pages.iter().map(|u| u.to_string()).collect();
        assert_eq!(urls[0], "https://movie.douban.com/top250");
        for (index, url) in urls.iter().enumerate().skip(1) {
            assert_eq!(
                url,
                &format!(
                    "https://movie.douban.com/top250?start={}&filter=",
                    index * 25
                )
            );
        }
    }

    #[test]
    fn test_duplicate_links_kept_once() {
        let html = r#"<div class="paginator">
            <a href="?start=25">2</a>
            <a href="?start=25">2</a>
            <a href="https://movie.douban.com/top250?start=25">2 again</a>
        </div>"#;

        let pages = parse_pages(html, &root(), &SiteProfile::default()).unwrap();
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn test_link_back_to_root_not_repeated() {
        let html = r#"<div class="paginator">
            <a href="top250">1</a>
            <a href="?start=25">2</a>
        </div>"#;

        let pages = parse_pages(html, &root(), &SiteProfile::default()).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages.root(), &root());
    }

    #[test]
    fn test_single_page_paginator() {
        let html = r#"<div class="paginator"><span class="thispage">1</span></div>"#;
        let pages = parse_pages(html, &root(), &SiteProfile::default()).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_missing_paginator_is_error() {
        let html = r#"<html><body><ol class="grid_view"><li>item</li></ol></body></html>"#;
        let err = parse_pages(html, &root(), &SiteProfile::default()).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::MissingElement {
                element: "pagination control",
                ..
            }
        ));
    }

    #[test]
    fn test_custom_paginator_selector() {
        let mut profile = SiteProfile::default();
        profile.paginator = "nav.pages".to_string();

        let html = r#"<nav class="pages"><a href="/list?page=2">2</a></nav>"#;
        let pages = parse_pages(html, &root(), &profile).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(
            pages.iter().nth(1).unwrap().as_str(),
            "https://movie.douban.com/list?page=2"
        );
    }
}
