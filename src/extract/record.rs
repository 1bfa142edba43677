//! Detail page → [`Record`]
//!
//! Only rank and name are required. Every other field degrades to an empty
//! value when the page does not carry it, so one sparse page never aborts a
//! record that is otherwise usable.

use crate::config::SiteProfile;
use crate::extract::{element_text, resolve_link, selector};
use crate::model::{Record, TAG_SEPARATOR};
use crate::ExtractionError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Whatever follows a label in the info block, up to the next line break
enum Adjacent<'a> {
    Text(String),
    Element(ElementRef<'a>),
}

/// Extracts one record from a detail page
///
/// # Arguments
///
/// * `html` - Raw markup of the detail page
/// * `page_url` - URL the markup was fetched from; relative image links resolve against it
/// * `profile` - Site selectors and field labels
///
/// # Errors
///
/// * `MissingField` - No rank or name element, or the name is blank
/// * `InvalidField` - The rank has no positive integer in it
/// * `InvalidSelector` - A configured selector does not parse
pub fn extract_record(
    html: &str,
    page_url: &Url,
    profile: &SiteProfile,
) -> Result<Record, ExtractionError> {
    let document = Html::parse_document(html);
    let url = page_url.as_str();

    let rank = extract_rank(&document, &profile.rank, url)?;

    let name = first_text(&document, &profile.name)?
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ExtractionError::MissingField {
            field: "name",
            url: url.to_string(),
        })?;

    let info_selector = selector(&profile.info)?;
    let label_selector = selector(&profile.label)?;
    let anchor_selector = selector("a")?;
    let info = document
        .select(&info_selector)
        .next()
        .unwrap_or_else(|| document.root_element());

    let labelled = |label: &str| {
        find_label(info, &label_selector, label)
            .and_then(adjacent_value)
            .map(|value| labelled_values(value, &anchor_selector))
            .unwrap_or_default()
    };
    let directors = labelled(&profile.directors_label);
    let writers = labelled(&profile.writers_label);
    let actors = labelled(&profile.actors_label);

    let country = find_label(info, &label_selector, &profile.country_label)
        .and_then(adjacent_value)
        .map(|value| match value {
            Adjacent::Text(text) => text,
            Adjacent::Element(element) => element_text(element),
        })
        .unwrap_or_default();

    let genre = all_texts(&document, &profile.genre)?;
    let release_date = all_texts(&document, &profile.release_date)?.join(TAG_SEPARATOR);
    let rating = first_text(&document, &profile.rating)?.unwrap_or_default();

    let image_selector = selector(&profile.image)?;
    let asset_url = document
        .select(&image_selector)
        .filter_map(|img| img.value().attr("src"))
        .find_map(|src| resolve_link(src, page_url))
        .map(|u| u.to_string());

    if asset_url.is_none() {
        tracing::debug!("No cover image on {}", url);
    }

    Ok(Record {
        rank,
        name,
        directors,
        writers,
        actors,
        genre,
        country,
        release_date,
        rating,
        asset_url,
    })
}

/// Reads the ordinal out of text like "No.1"
fn extract_rank(document: &Html, css: &str, url: &str) -> Result<u32, ExtractionError> {
    let text = first_text(document, css)?.ok_or_else(|| ExtractionError::MissingField {
        field: "rank",
        url: url.to_string(),
    })?;

    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u32>() {
        Ok(rank) if rank > 0 => Ok(rank),
        _ => Err(ExtractionError::InvalidField {
            field: "rank",
            value: text,
            url: url.to_string(),
        }),
    }
}

fn first_text(document: &Html, css: &str) -> Result<Option<String>, ExtractionError> {
    let sel = selector(css)?;
    Ok(document.select(&sel).next().map(element_text))
}

fn all_texts(document: &Html, css: &str) -> Result<Vec<String>, ExtractionError> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect())
}

/// Label text without surrounding whitespace or a trailing colon
fn normalize_label(label: &str) -> &str {
    label
        .trim()
        .trim_end_matches(|c: char| c == ':' || c == '：')
        .trim_end()
}

fn find_label<'a>(
    scope: ElementRef<'a>,
    label_selector: &Selector,
    label: &str,
) -> Option<ElementRef<'a>> {
    let wanted = normalize_label(label);
    scope
        .select(label_selector)
        .find(|candidate| normalize_label(&element_text(*candidate)) == wanted)
}

fn adjacent_value(label: ElementRef<'_>) -> Option<Adjacent<'_>> {
    for sibling in label.next_siblings() {
        if let Some(element) = ElementRef::wrap(sibling) {
            if element.value().name() == "br" {
                return None;
            }
            return Some(Adjacent::Element(element));
        }

        if let Some(text) = sibling.value().as_text() {
            let cleaned = text
                .trim()
                .trim_start_matches(|c: char| c == ':' || c == '：')
                .trim();
            if !cleaned.is_empty() {
                return Some(Adjacent::Text(cleaned.to_string()));
            }
        }
    }
    None
}

/// Link texts when the value is a list of anchors, otherwise the text split on '/'
fn labelled_values(value: Adjacent<'_>, anchor_selector: &Selector) -> Vec<String> {
    match value {
        Adjacent::Text(text) => split_tags(&text),
        Adjacent::Element(element) => {
            let anchors: Vec<String> = element
                .select(anchor_selector)
                .map(element_text)
                .filter(|text| !text.is_empty())
                .collect();
            if anchors.is_empty() {
                split_tags(&element_text(element))
            } else {
                anchors
            }
        }
    }
}

fn split_tags(text: &str) -> Vec<String> {
    text.split('/')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}
