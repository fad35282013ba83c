//! Listing extraction
//!
//! Extraction is a thin, swappable step: the monitor core only depends on
//! the [`Extractor`] trait. The default [`HtmlExtractor`] pulls listing
//! anchors out of a search-result page with a CSS selector and applies the
//! positive/negative keyword filter.

use scraper::{Html, Selector};
use url::Url;

/// A listing extracted from a search-result page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Listing title as shown on the result page
    pub title: String,

    /// Absolute URL of the listing
    pub url: String,
}

/// Extraction seam consumed by the monitor
///
/// A listing qualifies if its title contains at least one positive keyword
/// (case-insensitive substring) and no negative keyword.
pub trait Extractor: Send + Sync {
    /// Extracts qualifying listings from a page body
    fn extract(&self, body: &str, positive: &[String], negative: &[String]) -> Vec<Listing>;
}

/// Default extractor: CSS-selector anchor extraction over `scraper`
pub struct HtmlExtractor {
    selector: String,
    base_url: Url,
}

impl HtmlExtractor {
    /// Creates an extractor pulling anchors matching `selector`, resolving
    /// relative hrefs against `base_url`
    pub fn new(selector: &str, base_url: Url) -> Self {
        Self {
            selector: selector.to_string(),
            base_url,
        }
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, body: &str, positive: &[String], negative: &[String]) -> Vec<Listing> {
        let document = Html::parse_document(body);

        let selector = match Selector::parse(&self.selector) {
            Ok(s) => s,
            Err(_) => {
                tracing::error!("Invalid listing selector: {}", self.selector);
                return Vec::new();
            }
        };

        let mut listings = Vec::new();
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };

            let title = element.text().collect::<String>().trim().to_string();
            if title.is_empty() {
                continue;
            }

            let Ok(url) = self.base_url.join(href) else {
                tracing::debug!("Skipping unresolvable href: {}", href);
                continue;
            };

            if title_qualifies(&title, positive, negative) {
                listings.push(Listing {
                    title,
                    url: url.to_string(),
                });
            }
        }

        listings
    }
}

/// Applies the keyword filter to a listing title
///
/// At least one positive keyword must appear (case-insensitive substring)
/// and no negative keyword may appear.
pub fn title_qualifies(title: &str, positive: &[String], negative: &[String]) -> bool {
    let lower = title.to_lowercase();

    let has_positive = positive
        .iter()
        .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()));
    if !has_positive {
        return false;
    }

    let has_negative = negative
        .iter()
        .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()));

    !has_negative
}
