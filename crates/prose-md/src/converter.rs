use crate::config::ConversionConfig;
use crate::document::ProseDocument;
use crate::error::{ConvertError, Error};
use crate::extractor::extract_documents;
use crate::html::{ConversionOptions, convert_html_to_markdown};
use crate::report::{ConversionReport, ConversionResult};
use crate::validator::{is_valid_filename, sanitize_filename, validate_content};
use chrono::Utc;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

const FALLBACK_NAME: &str = "untitled";

type Observer = Box<dyn FnMut(&ConversionResult)>;

/// Converts prose documents into Markdown files under `outputDir`.
///
/// Output names are unique for the lifetime of the converter: a second
/// document titled "Hello World" is written to `hello-world-1.md`.
pub struct Converter {
    config: ConversionConfig,
    used_names: FxHashSet<String>,
    observer: Option<Observer>,
}

impl Converter {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config,
            used_names: FxHashSet::default(),
            observer: None,
        }
    }

    /// Registers a callback that sees every result as it is produced.
    pub fn with_observer(mut self, observer: impl FnMut(&ConversionResult) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Converts one document. Failures are recorded on the result, never raised.
    pub fn convert_file(&mut self, document: &Value, source_label: &str) -> ConversionResult {
        let title = document
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let result = match self.write_document(document, source_label) {
            Ok(destination) => {
                tracing::debug!("Converted {} to {:?}", source_label, destination);
                ConversionResult::succeeded(source_label, destination, title)
            }
            Err(e) => {
                tracing::error!("Failed to convert {}: {}", source_label, e);
                ConversionResult::failed(source_label, title, e)
            }
        };
        self.notify(&result);
        result
    }

    /// Converts every prose document found in JSON files under `sourceDir`.
    pub fn convert_directory(&mut self) -> Result<ConversionReport, Error> {
        let start_time = Utc::now();
        let started = Instant::now();
        tracing::info!(
            "Converting {:?} into {:?}",
            self.config.source_dir,
            self.config.output_dir
        );

        let files = collect_json_files(&self.config.source_dir, &self.config.output_dir)?;
        if files.is_empty() {
            tracing::warn!("No JSON files found in {:?}", self.config.source_dir);
        }

        let mut results = Vec::new();
        for path in &files {
            results.extend(self.convert_source_file(path));
        }

        let report = ConversionReport::new(
            results,
            files.len(),
            start_time,
            Utc::now(),
            started.elapsed(),
        );
        tracing::info!(
            "Finished: {} succeeded, {} failed",
            report.successful_conversions,
            report.failed_conversions
        );
        Ok(report)
    }

    fn convert_source_file(&mut self, path: &Path) -> Vec<ConversionResult> {
        let relative = path
            .strip_prefix(&self.config.source_dir)
            .unwrap_or(path)
            .display()
            .to_string();
        let stem = path
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
            .to_string();
        tracing::debug!("Processing {}", relative);

        let value = match read_json(path) {
            Ok(value) => value,
            Err(e) => return vec![self.fail_source(&relative, &stem, e)],
        };

        let documents = extract_documents(&value, "");
        if documents.is_empty() {
            return vec![self.fail_source(&relative, &stem, "No valid prose documents found")];
        }

        documents
            .iter()
            .map(|extracted| {
                let label = if extracted.id.is_empty() {
                    relative.clone()
                } else {
                    format!("{}:{}", relative, extracted.id)
                };
                self.convert_file(extracted.document, &label)
            })
            .collect()
    }

    fn fail_source(&mut self, label: &str, title: &str, error: impl std::fmt::Display) -> ConversionResult {
        tracing::error!("Failed to process {}: {}", label, error);
        let result = ConversionResult::failed(label, title, error);
        self.notify(&result);
        result
    }

    fn write_document(&mut self, value: &Value, source_label: &str) -> Result<PathBuf, ConvertError> {
        let document = ProseDocument::from_value(value)?;

        let validation = &self.config.validation;
        if validation.enabled {
            let outcome = validate_content(
                &document.content,
                &validation.patterns,
                validation.strict,
                &validation.skip_tags,
            );
            if !outcome.is_valid {
                return Err(ConvertError::Content(outcome.error.unwrap_or_default()));
            }
            tracing::debug!("{} matched {:?}", source_label, outcome.matched_patterns);
        }

        let markdown = convert_html_to_markdown(
            &document.content,
            ConversionOptions {
                extract_pattern: self.config.extract_pattern(),
                skip_tags: &validation.skip_tags,
            },
        )?;

        let conversion = &self.config.conversion;
        let frontmatter = conversion
            .include_metadata
            .then(|| document.frontmatter(Utc::now(), conversion.preserve_frontmatter));
        let content = document.render(&markdown, frontmatter)?;

        let base_name = self.base_name(&document, source_label)?;
        let file_name = self.claim_name(base_name);

        let output_dir = &self.config.output_dir;
        fs::create_dir_all(output_dir).map_err(|source| ConvertError::Io {
            path: output_dir.clone(),
            source,
        })?;
        let destination = output_dir.join(format!("{}.md", file_name));
        fs::write(&destination, content).map_err(|source| ConvertError::Io {
            path: destination.clone(),
            source,
        })?;
        Ok(destination)
    }

    fn base_name(&self, document: &ProseDocument, source_label: &str) -> Result<String, ConvertError> {
        let naming = &self.config.naming;
        let raw = if naming.use_title {
            document.title.clone()
        } else {
            label_words(source_label)
        };

        let name = if naming.sanitize {
            sanitize_filename(&raw)
        } else {
            raw.trim().to_string()
        };
        if is_valid_filename(&name) {
            return Ok(name);
        }

        let sanitized = sanitize_filename(&name);
        if is_valid_filename(&sanitized) {
            return Ok(sanitized);
        }

        if !naming.use_fallback {
            return Err(ConvertError::Naming(raw));
        }
        let fallback = sanitize_filename(&label_words(source_label));
        if is_valid_filename(&fallback) {
            Ok(fallback)
        } else {
            Ok(FALLBACK_NAME.to_string())
        }
    }

    fn claim_name(&mut self, base_name: String) -> String {
        let mut candidate = base_name.clone();
        let mut counter = 1;
        while self.used_names.contains(&candidate) {
            candidate = format!("{}-{}", base_name, counter);
            counter += 1;
        }
        self.used_names.insert(candidate.clone());
        candidate
    }

    fn notify(&mut self, result: &ConversionResult) {
        if let Some(observer) = self.observer.as_mut() {
            observer(result);
        }
    }
}

/// `posts/a.json:items[2]` becomes `posts a json items 2`.
fn label_words(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect()
}

fn read_json(path: &Path) -> Result<Value, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read file: {}", e))?;
    serde_json::from_str(&text).map_err(|e| format!("Failed to parse JSON: {}", e))
}

fn collect_json_files(source_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let entries = sorted_entries(source_dir).map_err(|source| Error::ReadSourceDir {
        path: source_dir.to_path_buf(),
        source,
    })?;
    let mut files = Vec::new();
    walk(entries, output_dir, &mut files);
    Ok(files)
}

fn walk(entries: Vec<PathBuf>, output_dir: &Path, files: &mut Vec<PathBuf>) {
    for path in entries {
        if path.is_dir() {
            if is_symlink(&path) {
                tracing::debug!("Skipping symlinked directory {:?}", path);
                continue;
            }
            // Matched by path equality; the subtree goes with it.
            if same_path(&path, output_dir) {
                tracing::debug!("Skipping output directory {:?}", path);
                continue;
            }
            match sorted_entries(&path) {
                Ok(children) => walk(children, output_dir, files),
                Err(e) => tracing::warn!("Skipping unreadable directory {:?}: {}", path, e),
            }
        } else if is_json_file(&path) {
            files.push(path);
        }
    }
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|metadata| metadata.file_type().is_symlink())
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn converter(output: &Path) -> Converter {
        let mut config = ConversionConfig::default();
        config.output_dir = output.to_path_buf();
        Converter::new(config)
    }

    fn prose(title: &str) -> Value {
        json!({"title": title, "content": "<div class=\"prose\"><p>Body</p></div>"})
    }

    #[test]
    fn test_convert_file_writes_markdown() {
        let dir = TempDir::new().unwrap();
        let mut converter = converter(dir.path());

        let result = converter.convert_file(&prose("Hello World"), "post.json");
        assert!(result.success, "{:?}", result);
        let destination = result.destination_path.unwrap();
        assert_eq!(destination, dir.path().join("hello-world.md"));

        let written = fs::read_to_string(destination).unwrap();
        assert!(written.starts_with("---\n{\n  \"title\": \"Hello World\""));
        assert!(written.ends_with("---\n\nBody\n"));
    }

    #[test]
    fn test_duplicate_titles_get_suffixes() {
        let dir = TempDir::new().unwrap();
        let mut converter = converter(dir.path());

        let names: Vec<String> = (0..3)
            .map(|_| converter.convert_file(&prose("Hello World"), "post.json"))
            .map(|r| {
                r.destination_path
                    .unwrap()
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["hello-world.md", "hello-world-1.md", "hello-world-2.md"]);
    }

    #[test]
    fn test_validation_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let mut converter = converter(&out);

        let result = converter.convert_file(&json!({"title": "T", "content": "<p>plain</p>"}), "x.json");
        assert!(!result.success);
        assert!(result.error.unwrap().contains("div[class] ~ prose"));
        assert!(!out.exists());
    }

    #[test]
    fn test_shape_failure_names_field() {
        let dir = TempDir::new().unwrap();
        let mut converter = converter(dir.path());
        let result = converter.convert_file(&json!({"title": "T", "content": 5}), "x.json");
        assert!(!result.success);
        assert!(result.error.unwrap().contains("content"));
    }

    #[rstest]
    #[case::fallback_to_label(true, true, Some("notes-json-items-0.md"))]
    #[case::no_fallback(true, false, None)]
    #[case::unsanitized_title(false, true, Some("notes-json-items-0.md"))]
    fn test_unusable_title(#[case] sanitize: bool, #[case] use_fallback: bool, #[case] expected: Option<&str>) {
        let dir = TempDir::new().unwrap();
        let mut config = ConversionConfig::default();
        config.output_dir = dir.path().to_path_buf();
        config.naming.sanitize = sanitize;
        config.naming.use_fallback = use_fallback;
        let mut converter = Converter::new(config);

        let result = converter.convert_file(&prose("???"), "notes.json:items[0]");
        let name = result
            .destination_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string());
        assert_eq!(name.as_deref(), expected, "{:?}", result);
    }

    #[test]
    fn test_use_title_false_names_from_label() {
        let dir = TempDir::new().unwrap();
        let mut config = ConversionConfig::default();
        config.output_dir = dir.path().to_path_buf();
        config.naming.use_title = false;
        let mut converter = Converter::new(config);

        let result = converter.convert_file(&prose("Ignored"), "blog/posts.json:posts[1]");
        assert_eq!(
            result.destination_path,
            Some(dir.path().join("blog-posts-json-posts-1.md"))
        );
    }

    #[test]
    fn test_without_metadata() {
        let dir = TempDir::new().unwrap();
        let mut config = ConversionConfig::default();
        config.output_dir = dir.path().to_path_buf();
        config.conversion.include_metadata = false;
        let mut converter = Converter::new(config);

        let result = converter.convert_file(&prose("Plain"), "p.json");
        let written = fs::read_to_string(result.destination_path.unwrap()).unwrap();
        assert_eq!(written, "Body\n");
    }

    #[test]
    fn test_observer_sees_every_result() {
        let dir = TempDir::new().unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut converter =
            converter(dir.path()).with_observer(move |r| sink.borrow_mut().push(r.success));

        converter.convert_file(&prose("A"), "a.json");
        converter.convert_file(&json!({"title": "B"}), "b.json");
        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn test_collect_json_files_sorted_and_skips_output() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::create_dir_all(root.join("out")).unwrap();
        fs::write(root.join("b/two.json"), "{}").unwrap();
        fs::write(root.join("a.JSON"), "{}").unwrap();
        fs::write(root.join("c.txt"), "").unwrap();
        fs::write(root.join("out/skipped.json"), "{}").unwrap();

        let files = collect_json_files(root, &root.join("out")).unwrap();
        assert_eq!(files, vec![root.join("a.JSON"), root.join("b/two.json")]);
    }

    #[rstest]
    #[case::output_dir_itself("out", vec!["keep/x.json"])]
    #[case::output_dir_nested("out/sub", vec!["keep/x.json", "out/y.json"])]
    fn test_collect_json_files_output_subtree(#[case] output: &str, #[case] expected: Vec<&str>) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("keep")).unwrap();
        fs::create_dir_all(root.join("out/sub/deeper")).unwrap();
        fs::write(root.join("keep/x.json"), "{}").unwrap();
        fs::write(root.join("out/y.json"), "{}").unwrap();
        fs::write(root.join("out/sub/z.json"), "{}").unwrap();
        fs::write(root.join("out/sub/deeper/w.json"), "{}").unwrap();

        let files = collect_json_files(root, &root.join(output)).unwrap();
        let expected: Vec<PathBuf> = expected.into_iter().map(|p| root.join(p)).collect();
        assert_eq!(files, expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_json_files_ignores_directory_symlinks() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("post.json"), "{}").unwrap();
        std::os::unix::fs::symlink(root, root.join("loop")).unwrap();

        let files = collect_json_files(root, &root.join("out")).unwrap();
        assert_eq!(files, vec![root.join("post.json")]);
    }

    #[test]
    fn test_overlong_title_fails_on_write() {
        let dir = TempDir::new().unwrap();
        let mut converter = converter(dir.path());

        let result = converter.convert_file(&prose(&"a".repeat(300)), "long.json");
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Failed to write"));
    }

    #[test]
    fn test_missing_source_dir_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = ConversionConfig::default();
        config.source_dir = dir.path().join("missing");
        config.output_dir = dir.path().join("out");
        let err = Converter::new(config).convert_directory().unwrap_err();
        assert!(matches!(err, Error::ReadSourceDir { .. }));
    }
}
