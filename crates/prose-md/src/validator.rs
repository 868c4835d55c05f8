//! Gatekeeping for documents, HTML payloads and output file names.

use crate::html::parse_fragment;
use crate::pattern::{ValidationPattern, has_match};
use itertools::Itertools;
use regex_lite::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
pub const MAX_FILENAME_LEN: usize = 255;

/// Outcome of checking one HTML payload against the configured patterns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
    /// `tag[attribute]` labels of the patterns that matched.
    pub matched_patterns: Vec<String>,
}

impl ValidationResult {
    fn rejected(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            matched_patterns: Vec::new(),
        }
    }
}

/// Checks that `html` contains the structures described by `patterns`.
///
/// In strict mode every pattern must match; otherwise one is enough.
pub fn validate_content(
    html: &str,
    patterns: &[ValidationPattern],
    strict: bool,
    skip_tags: &[String],
) -> ValidationResult {
    if html.trim().is_empty() {
        return ValidationResult::rejected("HTML content is empty");
    }
    if !HTML_TAG.is_match(html) {
        return ValidationResult::rejected("Content does not contain any HTML tags");
    }

    let nodes = match parse_fragment(html) {
        Ok(nodes) => nodes,
        Err(e) => return ValidationResult::rejected(format!("Failed to parse HTML: {}", e)),
    };

    let (matched, unmatched): (Vec<&ValidationPattern>, Vec<&ValidationPattern>) = patterns
        .iter()
        .partition(|pattern| has_match(&nodes, pattern, skip_tags));

    let is_valid = if strict {
        unmatched.is_empty()
    } else {
        !matched.is_empty()
    };

    ValidationResult {
        is_valid,
        error: (!is_valid).then(|| {
            format!(
                "Content does not match required patterns: {}",
                unmatched.iter().map(|p| p.describe()).join(", ")
            )
        }),
        matched_patterns: matched.iter().map(|p| p.label()).collect(),
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ShapeError {
    #[error("document must be a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` must be a string")]
    NotAString(&'static str),
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),
}

/// A prose document is an object whose `title` and `content` are non-empty strings.
pub fn validate_json_source(data: &Value) -> Result<(), ShapeError> {
    let object = data.as_object().ok_or(ShapeError::NotAnObject)?;
    for field in ["title", "content"] {
        match object.get(field) {
            None | Some(Value::Null) => return Err(ShapeError::MissingField(field)),
            Some(Value::String(s)) if s.is_empty() => {
                return Err(ShapeError::EmptyField(field));
            }
            Some(Value::String(_)) => {}
            Some(_) => return Err(ShapeError::NotAString(field)),
        }
    }
    Ok(())
}

fn is_forbidden_filename_char(c: char) -> bool {
    INVALID_FILENAME_CHARS.contains(&c) || (c as u32) < 0x20
}

pub fn is_valid_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().all(|c| c == '.')
        && name.chars().count() <= MAX_FILENAME_LEN
        && !name.chars().any(is_forbidden_filename_char)
}

/// Strips forbidden characters, hyphenates whitespace runs, lowercases and
/// trims hyphens, keeping at most [`MAX_FILENAME_LEN`] characters.
pub fn sanitize_filename(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !is_forbidden_filename_char(*c))
        .collect();
    stripped
        .split_whitespace()
        .join("-")
        .to_lowercase()
        .trim_matches('-')
        .chars()
        .take(MAX_FILENAME_LEN)
        .collect()
}
