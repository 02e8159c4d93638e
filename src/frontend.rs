use anyhow::{bail, Context, Result};
use scraper::{Html, Selector};
use std::path::Path;
use tracing::info;

/// Element ids `static/app.js` looks up on load.
pub const REQUIRED_ELEMENTS: &[&str] = &[
    "scrape-form",
    "keyword",
    "submit-btn",
    "raw-toggle",
    "loading",
    "error",
    "no-products",
    "products-grid",
    "raw-output",
    "debug-info",
];

/// Ids from [`REQUIRED_ELEMENTS`] that `html` does not define.
pub fn missing_elements(html: &str) -> Vec<&'static str> {
    let document = Html::parse_document(html);
    REQUIRED_ELEMENTS
        .iter()
        .copied()
        .filter(|id| match Selector::parse(&format!("#{}", id)) {
            Ok(selector) => document.select(&selector).next().is_none(),
            Err(_) => true,
        })
        .collect()
}

/// Fails startup when the frontend page is absent or incomplete.
pub fn verify_static_dir(dir: &Path) -> Result<()> {
    let index = dir.join("index.html");
    let html = std::fs::read_to_string(&index)
        .with_context(|| format!("frontend page {} is not readable", index.display()))?;

    let missing = missing_elements(&html);
    if !missing.is_empty() {
        bail!(
            "frontend page {} is missing required elements: {}",
            index.display(),
            missing.iter().map(|id| format!("#{}", id)).collect::<Vec<_>>().join(", ")
        );
    }

    info!("✅ Frontend page {} verified", index.display());
    Ok(())
}
