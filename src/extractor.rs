use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::selectors::{FieldSelectors, SearchProfile};

static RATING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)").unwrap());

// ============================================================================
// Data Structures
// ============================================================================

/// One listing from a search results page. Only `title` is guaranteed.
#[derive(Debug, Serialize, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// Rating text as shown on the page, e.g. "4,5 de 5 estrelas".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    /// Leading number of `rating`, e.g. 4.5.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_value: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub request_id: Uuid,
    pub url: String,
    pub page_length: usize,
    /// Container selector that matched, absent when none did.
    pub container_selector: Option<String>,
    pub selectors_tried: Vec<String>,
    pub containers_found: usize,
    pub products_extracted: usize,
    pub fetched_at: DateTime<Utc>,
}

/// Canonical success envelope.
#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct ExtractionResult {
    pub products: Vec<Product>,
    pub debug: Diagnostics,
}

/// Where the HTML came from.
#[derive(Debug, Clone)]
pub struct PageInfo {
    pub request_id: Uuid,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
}

// ============================================================================
// Extraction
// ============================================================================

/// Runs the container fallback, then the per-field fallback inside every
/// matched container. Never fails: unmatched markup yields an empty list
/// with diagnostics.
pub fn extract_products(
    html: &str,
    profile: &SearchProfile,
    origin: &Url,
    page: PageInfo,
) -> ExtractionResult {
    let document = Html::parse_document(html);

    let mut selectors_tried = Vec::new();
    let matched = profile.container.iter().find_map(|candidate| {
        selectors_tried.push(candidate.raw.clone());
        let nodes: Vec<ElementRef<'_>> = document.select(candidate.selector()).collect();
        (!nodes.is_empty()).then(|| (candidate.raw.clone(), nodes))
    });

    let Some((container_selector, nodes)) = matched else {
        warn!(
            "No product containers on {} ({} bytes); tried {:?}",
            page.url,
            html.len(),
            selectors_tried
        );
        return ExtractionResult {
            products: Vec::new(),
            debug: Diagnostics {
                request_id: page.request_id,
                url: page.url,
                page_length: html.len(),
                container_selector: None,
                selectors_tried,
                containers_found: 0,
                products_extracted: 0,
                fetched_at: page.fetched_at,
            },
        };
    };

    let products: Vec<Product> = nodes
        .iter()
        .filter_map(|node| product_from_container(*node, profile, origin))
        .collect();

    info!(
        "Selector {:?} matched {} containers, {} products extracted",
        container_selector,
        nodes.len(),
        products.len()
    );

    ExtractionResult {
        debug: Diagnostics {
            request_id: page.request_id,
            url: page.url,
            page_length: html.len(),
            container_selector: Some(container_selector),
            selectors_tried,
            containers_found: nodes.len(),
            products_extracted: products.len(),
            fetched_at: page.fetched_at,
        },
        products,
    }
}

fn product_from_container(
    container: ElementRef<'_>,
    profile: &SearchProfile,
    origin: &Url,
) -> Option<Product> {
    let title = profile.title.resolve(container)?;
    let rating = profile.rating.resolve(container);

    Some(Product {
        title,
        price: profile.price.resolve(container),
        rating_value: rating.as_deref().and_then(parse_rating),
        rating,
        review_count: profile.review_count.resolve(container),
        image: profile.image.resolve(container).map(|v| absolutize(origin, &v)),
        link: profile.link.resolve(container).map(|v| absolutize(origin, &v)),
    })
}

/// Single-field fallback against the whole document.
pub fn extract_single(html: &str, field: &FieldSelectors) -> Option<String> {
    let document = Html::parse_document(html);
    field.resolve(document.root_element())
}

/// Resolves `value` against the site origin; unparsable values are kept.
pub fn absolutize(origin: &Url, value: &str) -> String {
    origin
        .join(value)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| value.to_string())
}

/// First number in a rating label, accepting `,` as decimal separator.
pub fn parse_rating(text: &str) -> Option<f32> {
    let caps = RATING_NUMBER.captures(text)?;
    caps[1].replace(',', ".").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SITE_ORIGIN;
    use crate::selectors::{PRODUCT_PRICE, SEARCH_RESULTS};

    fn profile() -> SearchProfile {
        SearchProfile::compile(&SEARCH_RESULTS).unwrap()
    }

    fn origin() -> Url {
        Url::parse(SITE_ORIGIN).unwrap()
    }

    fn page(url: &str) -> PageInfo {
        PageInfo {
            request_id: Uuid::new_v4(),
            url: url.to_string(),
            fetched_at: Utc::now(),
        }
    }

    const SEARCH_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<div class="s-main-slot">
  <div data-component-type="s-search-result" data-asin="B0A">
    <h2><a class="a-link-normal" href="/Apple-iPhone-14/dp/B0A?ref=sr_1_1"><span>iPhone 14</span></a></h2>
    <span class="a-price"><span class="a-offscreen">R$ 3.999</span></span>
    <i class="a-icon-star-small"><span class="a-icon-alt">4,5 de 5 estrelas</span></i>
    <span class="a-size-base s-underline-text">1.234</span>
    <img class="s-image" src="https://m.media-amazon.com/images/I/iphone.jpg">
  </div>
  <div data-component-type="s-search-result" data-asin="">
    <h2><a href="/sponsored"><span>   </span></a></h2>
    <span class="a-price"><span class="a-offscreen">R$ 1,00</span></span>
  </div>
  <div data-component-type="s-search-result" data-asin="B0C">
    <h2><span class="a-text-normal">Capa   de
        silicone</span></h2>
    <img src="/images/capa.png">
  </div>
</div>
</body></html>"#;

    #[test]
    fn extracts_products_in_document_order() {
        let result = extract_products(SEARCH_PAGE, &profile(), &origin(), page("https://x/s?k=iPhone"));

        assert_eq!(result.products.len(), 2);
        let first = &result.products[0];
        assert_eq!(first.title, "iPhone 14");
        assert_eq!(first.price.as_deref(), Some("R$ 3.999"));
        assert_eq!(first.rating.as_deref(), Some("4,5 de 5 estrelas"));
        assert_eq!(first.rating_value, Some(4.5));
        assert_eq!(first.review_count.as_deref(), Some("1.234"));
        assert_eq!(
            first.image.as_deref(),
            Some("https://m.media-amazon.com/images/I/iphone.jpg")
        );
        assert_eq!(
            first.link.as_deref(),
            Some("https://www.amazon.com.br/Apple-iPhone-14/dp/B0A?ref=sr_1_1")
        );

        let second = &result.products[1];
        assert_eq!(second.title, "Capa de silicone");
        assert_eq!(second.price, None);
        assert_eq!(second.rating, None);
        assert_eq!(second.rating_value, None);
        assert_eq!(second.link, None);
        assert_eq!(
            second.image.as_deref(),
            Some("https://www.amazon.com.br/images/capa.png")
        );
    }

    #[test]
    fn diagnostics_describe_the_match() {
        let result = extract_products(SEARCH_PAGE, &profile(), &origin(), page("https://x/s?k=iPhone"));
        let debug = &result.debug;

        assert_eq!(debug.url, "https://x/s?k=iPhone");
        assert_eq!(debug.page_length, SEARCH_PAGE.len());
        assert_eq!(
            debug.container_selector.as_deref(),
            Some("[data-component-type='s-search-result']")
        );
        assert_eq!(debug.selectors_tried, vec!["[data-component-type='s-search-result']"]);
        assert_eq!(debug.containers_found, 3);
        assert_eq!(debug.products_extracted, 2);
    }

    #[test]
    fn falls_back_to_later_container_selectors() {
        let html = r#"<div class="s-main-slot">
            <div class="s-result-item"><h2>Teclado mecânico</h2></div>
            <div class="s-result-item"><h2>Mouse sem fio</h2></div>
        </div>"#;
        let result = extract_products(html, &profile(), &origin(), page("u"));

        let titles: Vec<_> = result.products.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["Teclado mecânico", "Mouse sem fio"]);
        assert_eq!(
            result.debug.container_selector.as_deref(),
            Some(".s-main-slot .s-result-item")
        );
        assert_eq!(result.debug.selectors_tried.len(), 2);
    }

    #[test]
    fn no_containers_is_an_empty_result_not_an_error() {
        let html = "<html><body><p>Robot check</p></body></html>";
        let result = extract_products(html, &profile(), &origin(), page("https://x/s?k=a"));

        assert!(result.products.is_empty());
        assert_eq!(result.debug.container_selector, None);
        assert_eq!(result.debug.selectors_tried, SEARCH_RESULTS.container.to_vec());
        assert_eq!(result.debug.containers_found, 0);
        assert_eq!(result.debug.page_length, html.len());
    }

    #[test]
    fn malformed_html_is_tolerated() {
        let html = r#"<div data-component-type="s-search-result"><h2><span>Cabo USB<div><img class="s-image" src="//cdn.example.com/c.jpg"#;
        let result = extract_products(html, &profile(), &origin(), page("u"));

        assert_eq!(result.products.len(), 1);
        assert!(result.products[0].title.starts_with("Cabo USB"));
    }

    #[test]
    fn relative_and_protocol_relative_urls_are_absolutized() {
        let origin = origin();
        assert_eq!(absolutize(&origin, "/dp/X"), "https://www.amazon.com.br/dp/X");
        assert_eq!(absolutize(&origin, "dp/X"), "https://www.amazon.com.br/dp/X");
        assert_eq!(absolutize(&origin, "//cdn.example.com/a.jpg"), "https://cdn.example.com/a.jpg");
        assert_eq!(absolutize(&origin, "https://other.example/p"), "https://other.example/p");
    }

    #[test]
    fn rating_numbers_accept_both_decimal_separators() {
        assert_eq!(parse_rating("4,5 de 5 estrelas"), Some(4.5));
        assert_eq!(parse_rating("4.0 out of 5 stars"), Some(4.0));
        assert_eq!(parse_rating("5 estrelas"), Some(5.0));
        assert_eq!(parse_rating("sem avaliações"), None);
    }

    #[test]
    fn single_field_lookup_uses_the_whole_document() {
        let price = FieldSelectors::compile("price", PRODUCT_PRICE).unwrap();
        let html = r#"<div id="corePrice_feature_div"><span class="a-offscreen"> R$ 249,90 </span></div>"#;
        assert_eq!(extract_single(html, &price).as_deref(), Some("R$ 249,90"));
        assert_eq!(extract_single("<p>indisponível</p>", &price), None);
    }
}
