//! Text normalization: markup stripping and whitespace collapsing.

use scraper::{ElementRef, Html, Node};

use crate::document::TextFormat;
use crate::error::{RagError, Result};

/// Elements whose contents never reach the normalized text.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that break words apart when their text is concatenated.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Normalize raw document text.
///
/// Markup (per `format`, or a leading `<` under [`TextFormat::Auto`]) is
/// parsed and reduced to its visible text. Runs of whitespace collapse to a
/// single space and the ends are trimmed.
///
/// # Errors
///
/// Returns [`RagError::EmptyInput`] if nothing is left after normalization.
pub fn normalize(raw: &str, format: TextFormat) -> Result<String> {
    let text = if is_markup(raw, format) { strip_markup(raw) } else { raw.to_string() };
    let collapsed = collapse_whitespace(&text);
    if collapsed.is_empty() {
        return Err(RagError::empty("document content"));
    }
    Ok(collapsed)
}

/// Whether `raw` should be treated as markup.
pub fn is_markup(raw: &str, format: TextFormat) -> bool {
    match format {
        TextFormat::Markup => true,
        TextFormat::Plain => false,
        TextFormat::Auto => raw.trim_start().starts_with('<'),
    }
}

/// Collapse every whitespace run into one space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_markup(raw: &str) -> String {
    let html = Html::parse_document(raw);
    let mut out = String::with_capacity(raw.len() / 2);
    collect_text(html.root_element(), &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }
    let block = BLOCK_ELEMENTS.contains(&name);
    if block {
        out.push(' ');
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
    if block {
        out.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_scripts_and_styles() {
        let html = "<html><head><style>p { color: red }</style></head><body>\
                    <h1>Title</h1><p>First   line.</p><script>alert('x')</script>\
                    <p>Second <b>bold</b> line.</p></body></html>";
        let text = normalize(html, TextFormat::Auto).unwrap();
        assert_eq!(text, "Title First line. Second bold line.");
    }

    #[test]
    fn plain_text_only_collapses_whitespace() {
        let text = normalize("  a\n\n b\t c  ", TextFormat::Auto).unwrap();
        assert_eq!(text, "a b c");
    }

    #[test]
    fn explicit_plain_keeps_angle_brackets() {
        let text = normalize("<not markup>", TextFormat::Plain).unwrap();
        assert_eq!(text, "<not markup>");
    }

    #[test]
    fn blank_and_tag_only_inputs_are_empty() {
        assert!(matches!(normalize("   \n", TextFormat::Auto), Err(RagError::EmptyInput { .. })));
        assert!(matches!(
            normalize("<div><script>x()</script></div>", TextFormat::Auto),
            Err(RagError::EmptyInput { .. })
        ));
    }
}
