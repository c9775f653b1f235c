use scraper::Html;

/// Convert an HTML-ish fragment to plain text: every text node in document
/// order, concatenated, with surrounding whitespace trimmed.
pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.trim().to_string()
}
