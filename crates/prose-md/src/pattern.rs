//! Structural patterns over parsed HTML.
//!
//! A [`ValidationPattern`] names an element by tag, one of its attributes and a
//! [`Pattern`] that the attribute value must satisfy. [`find_match`] walks a
//! parsed tree depth-first (pre-order) and returns the first element that
//! satisfies the pattern, never descending into elements listed in `skip_tags`.

use crate::html::{HtmlElement, HtmlNode};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an attribute value is tested.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawPattern", into = "RawPattern")]
pub enum Pattern {
    /// Substring containment.
    Literal(String),
    /// Unanchored regular expression search.
    Regex(Regex),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawPattern {
    Literal(String),
    Regex { regex: String },
}

impl TryFrom<RawPattern> for Pattern {
    type Error = regex_lite::Error;

    fn try_from(raw: RawPattern) -> Result<Self, Self::Error> {
        match raw {
            RawPattern::Literal(s) => Ok(Pattern::Literal(s)),
            RawPattern::Regex { regex } => Regex::new(&regex).map(Pattern::Regex),
        }
    }
}

impl From<Pattern> for RawPattern {
    fn from(pattern: Pattern) -> Self {
        match pattern {
            Pattern::Literal(s) => RawPattern::Literal(s),
            Pattern::Regex(re) => RawPattern::Regex {
                regex: re.as_str().to_string(),
            },
        }
    }
}

impl Pattern {
    pub fn regex(expr: &str) -> Result<Self, regex_lite::Error> {
        Regex::new(expr).map(Pattern::Regex)
    }

    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Pattern::Literal(needle) => value.contains(needle.as_str()),
            Pattern::Regex(re) => re.is_match(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Pattern::Literal(s) => s.is_empty(),
            Pattern::Regex(re) => re.as_str().is_empty(),
        }
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::Literal(String::new())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Pattern::Literal(a), Pattern::Literal(b)) => a == b,
            (Pattern::Regex(a), Pattern::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::Literal(s.to_string())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(s) => write!(f, "{}", s),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// A structural rule: an element with tag `tag` whose `attribute` satisfies `pattern`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPattern {
    pub tag: String,
    pub attribute: String,
    pub pattern: Pattern,
}

impl ValidationPattern {
    pub fn new(tag: &str, attribute: &str, pattern: impl Into<Pattern>) -> Self {
        Self {
            tag: tag.to_string(),
            attribute: attribute.to_string(),
            pattern: pattern.into(),
        }
    }

    /// `tag[attribute]`
    pub fn label(&self) -> String {
        format!("{}[{}]", self.tag, self.attribute)
    }

    /// `tag[attribute] ~ pattern`
    pub fn describe(&self) -> String {
        format!("{} ~ {}", self.label(), self.pattern)
    }

    fn matches_element(&self, element: &HtmlElement) -> bool {
        element.is(&self.tag)
            && self
                .pattern
                .is_match(element.attr(&self.attribute).unwrap_or_default())
    }
}

/// Returns the first element, in pre-order, that satisfies `pattern`.
pub fn find_match<'a>(
    nodes: &'a [HtmlNode],
    pattern: &ValidationPattern,
    skip_tags: &[String],
) -> Option<&'a HtmlElement> {
    for node in nodes {
        let HtmlNode::Element(element) = node else {
            continue;
        };

        if is_skipped(element, skip_tags) {
            continue;
        }

        if pattern.matches_element(element) {
            return Some(element);
        }

        if let Some(found) = find_match(&element.children, pattern, skip_tags) {
            return Some(found);
        }
    }
    None
}

pub fn has_match(nodes: &[HtmlNode], pattern: &ValidationPattern, skip_tags: &[String]) -> bool {
    find_match(nodes, pattern, skip_tags).is_some()
}

fn is_skipped(element: &HtmlElement, skip_tags: &[String]) -> bool {
    skip_tags.iter().any(|tag| element.is(tag))
}
