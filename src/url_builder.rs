/// Turns user input into the page to fetch.
///
/// Literal `http://` / `https://` URLs pass through untouched; anything else
/// is treated as a search keyword and percent-encoded into `template` at the
/// `{keyword}` placeholder. Blank input yields `None`.
pub fn build_target_url(input: &str, template: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if is_http_url(input) {
        return Some(input.to_string());
    }
    Some(template.replace("{keyword}", &urlencoding::encode(input)))
}

pub fn is_http_url(input: &str) -> bool {
    let lower = input.get(..8).unwrap_or(input).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
