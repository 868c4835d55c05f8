//! Discovery of prose documents nested anywhere inside a JSON value.

use serde_json::Value;

/// A prose document found inside a larger JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument<'a> {
    /// Path of the document inside its source value, e.g. `categories[2].body`.
    /// Empty when the source value itself is the document.
    pub id: String,
    pub document: &'a Value,
}

fn non_empty_string(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

/// Returns true for objects with non-empty string `title` and `content` fields.
pub fn is_prose_document(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| non_empty_string(object.get("title")) && non_empty_string(object.get("content")))
}

/// Walks `value` depth-first and collects every prose document, in traversal order.
///
/// Documents are leaves: nothing is extracted from inside a document.
pub fn extract_documents<'a>(value: &'a Value, path_prefix: &str) -> Vec<ExtractedDocument<'a>> {
    let mut documents = Vec::new();
    collect(value, path_prefix.to_string(), &mut documents);
    documents
}

fn collect<'a>(value: &'a Value, path: String, documents: &mut Vec<ExtractedDocument<'a>>) {
    if is_prose_document(value) {
        documents.push(ExtractedDocument {
            id: path,
            document: value,
        });
        return;
    }

    match value {
        Value::Object(object) => {
            for (key, child) in object {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                collect(child, child_path, documents);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect(child, format!("{}[{}]", path, index), documents);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn ids(value: &Value) -> Vec<String> {
        extract_documents(value, "").into_iter().map(|d| d.id).collect()
    }

    #[test]
    fn test_nested_documents_are_found_in_order() {
        let value = json!({
            "a": {"b": [{"title": "T1", "content": "<p>x</p>"}, "skip-me"]},
            "c": {"title": "T2", "content": "<p>y</p>"}
        });
        assert_eq!(ids(&value), vec!["a.b[0]", "c"]);
    }

    #[test]
    fn test_root_document_has_empty_id() {
        let value = json!({"title": "T", "content": "<p>x</p>"});
        assert_eq!(ids(&value), vec![""]);
    }

    #[test]
    fn test_whitespace_title_still_counts() {
        let value = json!({"items": [{"title": "  ", "content": "<p>x</p>"}]});
        assert_eq!(ids(&value), vec!["items[0]"]);
    }

    #[test]
    fn test_documents_are_leaves() {
        let value = json!({
            "title": "Outer",
            "content": "<p>outer</p>",
            "children": [{"title": "Inner", "content": "<p>inner</p>"}]
        });
        let documents = extract_documents(&value, "");
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].document["title"], "Outer");
    }

    #[test]
    fn test_root_array_and_prefix() {
        let value = json!([
            {"title": "T1", "content": "<p>1</p>"},
            {"posts": [{"title": "T2", "content": "<p>2</p>"}]}
        ]);
        let documents: Vec<String> = extract_documents(&value, "data")
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(documents, vec!["data[0]", "data[1].posts[0]"]);
    }

    #[rstest]
    #[case(json!({"title": "", "content": "<p>x</p>"}))]
    #[case(json!({"title": "T", "content": 1}))]
    #[case(json!({"title": "T"}))]
    #[case(json!(null))]
    #[case(json!(42))]
    #[case(json!("<p>x</p>"))]
    fn test_non_documents_yield_nothing(#[case] value: Value) {
        assert!(ids(&value).is_empty());
    }
}
