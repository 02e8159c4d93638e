//! Declarative selector profiles.
//!
//! Each field carries an ordered list of candidates, tried until one yields a
//! non-empty value. A candidate is a CSS selector, optionally suffixed with
//! `@attr` to read an attribute of the matched element instead of its text.
//! Update the lists here when the site markup changes.

use scraper::{ElementRef, Selector};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid selector {selector:?} for field `{field}`: {message}")]
pub struct SelectorError {
    pub field: String,
    pub selector: String,
    pub message: String,
}

/// Uncompiled profile, as written in source.
pub struct ProfileDef {
    pub name: &'static str,
    pub container: &'static [&'static str],
    pub title: &'static [&'static str],
    pub price: &'static [&'static str],
    pub rating: &'static [&'static str],
    pub review_count: &'static [&'static str],
    pub image: &'static [&'static str],
    pub link: &'static [&'static str],
}

/// Search results page of the configured site.
pub static SEARCH_RESULTS: ProfileDef = ProfileDef {
    name: "search",
    container: &[
        "[data-component-type='s-search-result']",
        ".s-main-slot .s-result-item",
        "div.s-result-item[data-asin]",
    ],
    title: &["h2 a span", "h2 span.a-text-normal", "h2 span", "h2"],
    price: &[".a-price .a-offscreen", ".a-price-whole"],
    rating: &[
        "i.a-icon-star-small span.a-icon-alt",
        "span.a-icon-alt",
        "[aria-label*='estrelas']@aria-label",
    ],
    review_count: &[
        "span.a-size-base.s-underline-text",
        "a[href*='customerReviews'] span",
        "[aria-label$='avaliações']@aria-label",
    ],
    image: &["img.s-image@src", "img@src"],
    link: &[
        "h2 a@href",
        "a.a-link-normal.s-no-outline@href",
        "a.a-link-normal@href",
    ],
};

/// Price on a single product page.
pub static PRODUCT_PRICE: &[&str] = &[
    ".a-price .a-offscreen",
    "#priceblock_ourprice",
    "#corePrice_feature_div .a-offscreen",
    ".a-price-whole",
];

#[derive(Debug, Clone)]
pub struct Candidate {
    pub raw: String,
    selector: Selector,
    attr: Option<String>,
}

impl Candidate {
    pub fn parse(field: &str, raw: &str) -> Result<Self, SelectorError> {
        let (css, attr) = split_attr(raw);
        let selector = Selector::parse(css).map_err(|e| SelectorError {
            field: field.to_string(),
            selector: raw.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            raw: raw.to_string(),
            selector,
            attr: attr.map(str::to_string),
        })
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// First non-empty value among the elements this candidate matches
    /// inside `scope`.
    pub fn resolve(&self, scope: ElementRef<'_>) -> Option<String> {
        scope.select(&self.selector).find_map(|el| {
            let value = match &self.attr {
                Some(name) => el.value().attr(name).map(collapse_whitespace),
                None => Some(collapse_whitespace(&el.text().collect::<String>())),
            };
            value.filter(|v| !v.is_empty())
        })
    }
}

/// `"img.s-image@src"` -> (`"img.s-image"`, `Some("src")`). A trailing
/// `@word` only counts as an attribute when `word` is a plain name.
fn split_attr(raw: &str) -> (&str, Option<&str>) {
    match raw.rsplit_once('@') {
        Some((css, attr))
            if !css.trim().is_empty()
                && !attr.is_empty()
                && attr
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':') =>
        {
            (css.trim(), Some(attr))
        }
        _ => (raw.trim(), None),
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ordered fallback list for one field.
#[derive(Debug, Clone)]
pub struct FieldSelectors {
    candidates: Vec<Candidate>,
}

impl FieldSelectors {
    pub fn compile(field: &str, raws: &[&str]) -> Result<Self, SelectorError> {
        let candidates = raws
            .iter()
            .map(|raw| Candidate::parse(field, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { candidates })
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn resolve(&self, scope: ElementRef<'_>) -> Option<String> {
        self.candidates.iter().find_map(|c| c.resolve(scope))
    }
}

/// Compiled form of a [`ProfileDef`], built once at startup.
#[derive(Debug, Clone)]
pub struct SearchProfile {
    pub name: String,
    pub container: Vec<Candidate>,
    pub title: FieldSelectors,
    pub price: FieldSelectors,
    pub rating: FieldSelectors,
    pub review_count: FieldSelectors,
    pub image: FieldSelectors,
    pub link: FieldSelectors,
}

impl SearchProfile {
    pub fn compile(def: &ProfileDef) -> Result<Self, SelectorError> {
        Ok(Self {
            name: def.name.to_string(),
            container: def
                .container
                .iter()
                .map(|s| Candidate::parse("container", s))
                .collect::<Result<Vec<_>, _>>()?,
            title: FieldSelectors::compile("title", def.title)?,
            price: FieldSelectors::compile("price", def.price)?,
            rating: FieldSelectors::compile("rating", def.rating)?,
            review_count: FieldSelectors::compile("review_count", def.review_count)?,
            image: FieldSelectors::compile("image", def.image)?,
            link: FieldSelectors::compile("link", def.link)?,
        })
    }

    pub fn summary(&self) -> ProfileSummary {
        let raw = |f: &FieldSelectors| f.candidates().iter().map(|c| c.raw.clone()).collect();
        ProfileSummary {
            name: self.name.clone(),
            container: self.container.iter().map(|c| c.raw.clone()).collect(),
            title: raw(&self.title),
            price: raw(&self.price),
            rating: raw(&self.rating),
            review_count: raw(&self.review_count),
            image: raw(&self.image),
            link: raw(&self.link),
        }
    }
}

/// Selector lists as plain strings, for the endpoint index.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub name: String,
    pub container: Vec<String>,
    pub title: Vec<String>,
    pub price: Vec<String>,
    pub rating: Vec<String>,
    pub review_count: Vec<String>,
    pub image: Vec<String>,
    pub link: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn builtin_profiles_compile() {
        let profile = SearchProfile::compile(&SEARCH_RESULTS).unwrap();
        assert_eq!(profile.container.len(), SEARCH_RESULTS.container.len());
        assert_eq!(profile.image.candidates().len(), 2);
        FieldSelectors::compile("price", PRODUCT_PRICE).unwrap();
    }

    #[test]
    fn attribute_suffix_is_split_off() {
        assert_eq!(split_attr("img.s-image@src"), ("img.s-image", Some("src")));
        assert_eq!(split_attr("h2 a @ href"), ("h2 a @ href", None));
        assert_eq!(split_attr("h2 a span"), ("h2 a span", None));
        assert_eq!(
            split_attr("[aria-label*='estrelas']@aria-label"),
            ("[aria-label*='estrelas']", Some("aria-label"))
        );
    }

    #[test]
    fn invalid_selector_names_field_and_selector() {
        let err = FieldSelectors::compile("title", &["h2", "div[[broken"]).unwrap_err();
        assert_eq!(err.field, "title");
        assert_eq!(err.selector, "div[[broken");
        assert!(err.to_string().contains("div[[broken"));
    }

    #[test]
    fn fallback_skips_candidates_without_a_value() {
        let html = Html::parse_fragment(
            r#"<div><h2 class="empty">   </h2><span class="name">  Caneca
                 azul </span><img src="/i.jpg"></div>"#,
        );
        let root = html.root_element();
        let title = FieldSelectors::compile("title", &["h3", "h2.empty", "span.name"]).unwrap();
        assert_eq!(title.resolve(root).as_deref(), Some("Caneca azul"));

        let image = FieldSelectors::compile("image", &["img@data-src", "img@src"]).unwrap();
        assert_eq!(image.resolve(root).as_deref(), Some("/i.jpg"));

        let missing = FieldSelectors::compile("rating", &[".stars"]).unwrap();
        assert_eq!(missing.resolve(root), None);
    }
}
