use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum HtmlNode {
    Text(String),
    Element(HtmlElement),
    Comment(String),
}

/// An element with a lowercased tag name and raw, lowercased attribute names.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlElement {
    pub tag_name: String,
    pub attributes: FxHashMap<String, String>,
    pub children: Vec<HtmlNode>,
}

impl HtmlElement {
    pub fn new(tag_name: &str, attributes: FxHashMap<String, String>, children: Vec<HtmlNode>) -> Self {
        HtmlElement {
            tag_name: tag_name.to_lowercase(),
            attributes,
            children,
        }
    }

    /// Looks up an attribute by its raw name, ignoring ASCII case.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .or_else(|| self.attributes.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    pub fn is(&self, tag_name: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag_name)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &HtmlElement> {
        self.children.iter().filter_map(|node| match node {
            HtmlNode::Element(el) => Some(el),
            _ => None,
        })
    }
}
