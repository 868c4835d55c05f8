//! Converts HTML fragments to GitHub Flavored Markdown.
//!
//! The input is parsed as a body fragment (no implicit `<html>`/`<body>`
//! wrapping), mapped into an owned [`HtmlNode`] tree and stringified with a
//! fixed policy: `-` bullets, `**` strong, `_` emphasis, fenced code blocks,
//! `---` thematic breaks and GFM tables, strikethrough, autolinks and task
//! list items. Conversion is deterministic; the same input always yields the
//! same bytes.

pub mod converter;
pub mod error;
pub mod node;
pub mod options;
pub mod parser;

pub use error::HtmlToMarkdownError;
pub use node::{HtmlElement, HtmlNode};
pub use options::ConversionOptions;
pub use parser::parse_fragment;

use crate::pattern::find_match;

/// Converts `html_input` to Markdown, trimmed of surrounding whitespace.
///
/// If `options.extract_pattern` matches an element, that element is unwrapped
/// and only its children are converted. No match converts the whole fragment.
pub fn convert_html_to_markdown(
    html_input: &str,
    options: ConversionOptions<'_>,
) -> Result<String, HtmlToMarkdownError> {
    if html_input.trim().is_empty() {
        return Ok(String::new());
    }

    let nodes = parser::parse_fragment(html_input)?;
    let nodes_for_markdown_conversion = match options
        .extract_pattern
        .and_then(|pattern| find_match(&nodes, pattern, options.skip_tags))
    {
        Some(container) => {
            tracing::trace!(tag = %container.tag_name, "unwrapping extraction container");
            container.children.as_slice()
        }
        None => nodes.as_slice(),
    };

    let markdown = converter::convert_nodes_to_markdown(nodes_for_markdown_conversion)?;
    Ok(markdown.trim().to_string())
}
