use crate::validator::{ShapeError, validate_json_source};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

const KNOWN_FIELDS: &[&str] = &["title", "content", "excerpt", "categories", "tags", "author"];
const FRONTMATTER_DELIMITER: &str = "---";

/// A validated prose document.
///
/// Fields outside the known set are kept verbatim in `extra`, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProseDocument {
    pub title: String,
    pub content: String,
    pub excerpt: Option<Value>,
    pub categories: Option<Value>,
    pub tags: Option<Value>,
    pub author: Option<Value>,
    pub extra: Map<String, Value>,
}

impl ProseDocument {
    pub fn from_value(value: &Value) -> Result<Self, ShapeError> {
        validate_json_source(value)?;
        let object = value.as_object().ok_or(ShapeError::NotAnObject)?;

        let string_field = |key: &'static str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(ShapeError::NotAString(key))
        };
        let optional_field = |key: &str| object.get(key).filter(|v| !v.is_null()).cloned();

        Ok(Self {
            title: string_field("title")?,
            content: string_field("content")?,
            excerpt: optional_field("excerpt"),
            categories: optional_field("categories"),
            tags: optional_field("tags"),
            author: optional_field("author"),
            extra: object
                .iter()
                .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        })
    }

    /// Frontmatter fields: title, generation timestamp, then whichever known metadata is present.
    pub fn frontmatter(&self, generated_at: DateTime<Utc>, include_extra: bool) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("title".to_string(), Value::String(self.title.clone()));
        fields.insert(
            "generatedAt".to_string(),
            Value::String(generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        for (key, value) in [
            ("excerpt", &self.excerpt),
            ("categories", &self.categories),
            ("tags", &self.tags),
            ("author", &self.author),
        ] {
            if let Some(value) = value {
                fields.insert(key.to_string(), value.clone());
            }
        }
        if include_extra {
            for (key, value) in &self.extra {
                fields
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        fields
    }

    /// Final file content: the Markdown body, optionally preceded by a JSON frontmatter block.
    pub fn render(
        &self,
        markdown: &str,
        frontmatter: Option<Map<String, Value>>,
    ) -> Result<String, serde_json::Error> {
        match frontmatter {
            Some(fields) => Ok(format!(
                "{FRONTMATTER_DELIMITER}\n{}\n{FRONTMATTER_DELIMITER}\n\n{}\n",
                serde_json::to_string_pretty(&Value::Object(fields))?,
                markdown
            )),
            None => Ok(format!("{}\n", markdown)),
        }
    }
}
