use super::error::HtmlToMarkdownError;
use super::node::{HtmlElement, HtmlNode};
use ego_tree::NodeRef;
use rustc_hash::FxHashMap;
use scraper::{ElementRef, Html, Node};

/// Deepest element nesting accepted before the input is rejected.
pub const MAX_NESTING_DEPTH: usize = 512;

/// Parses `html` as a body fragment and returns its top-level nodes.
pub fn parse_fragment(html: &str) -> Result<Vec<HtmlNode>, HtmlToMarkdownError> {
    let fragment = Html::parse_fragment(html);

    // html5ever wraps fragment content in a synthetic <html> element.
    let root = fragment
        .tree
        .root()
        .children()
        .find_map(ElementRef::wrap)
        .ok_or_else(|| HtmlToMarkdownError::ParseError {
            message: "fragment has no root element".to_string(),
        })?;

    map_scraper_nodes_to_html_nodes(root.children(), 0)
}

fn map_scraper_nodes_to_html_nodes<'a>(
    nodes: impl Iterator<Item = NodeRef<'a, Node>>,
    depth: usize,
) -> Result<Vec<HtmlNode>, HtmlToMarkdownError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(HtmlToMarkdownError::NestingTooDeep {
            limit: MAX_NESTING_DEPTH,
        });
    }

    let mut html_nodes = Vec::new();
    for node in nodes {
        if let Some(html_node) = map_node_to_html_node(node, depth)? {
            html_nodes.push(html_node);
        }
    }
    Ok(html_nodes)
}

fn map_node_to_html_node(
    node: NodeRef<'_, Node>,
    depth: usize,
) -> Result<Option<HtmlNode>, HtmlToMarkdownError> {
    match node.value() {
        Node::Text(text) => Ok(Some(HtmlNode::Text(String::from(&**text)))),
        Node::Element(element) => {
            // Attribute names are normalized here so matching only ever sees raw lowercase names.
            let attributes: FxHashMap<String, String> = element
                .attrs()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                .collect();
            let children = map_scraper_nodes_to_html_nodes(node.children(), depth + 1)?;

            Ok(Some(HtmlNode::Element(HtmlElement::new(
                element.name(),
                attributes,
                children,
            ))))
        }
        Node::Comment(comment) => Ok(Some(HtmlNode::Comment(String::from(&**comment)))),
        Node::Document | Node::Fragment | Node::Doctype(_) | Node::ProcessingInstruction(_) => {
            Ok(None)
        }
    }
}
