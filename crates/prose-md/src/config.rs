//! Run configuration.
//!
//! # Loading Priority
//!
//! 1. Built-in defaults
//! 2. `PROSE_*` environment variables, only when no explicit config path is given
//! 3. The config file: the explicit path, or [`DEFAULT_CONFIG_PATH`] when it exists
//! 4. CLI `--source` / `--output` overrides, applied by the caller
//!
//! [`ConversionConfig::validate`] runs last and reports every problem at once.

use crate::pattern::ValidationPattern;
use itertools::Itertools;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "prose-md.config.json";

pub const ENV_SOURCE_DIR: &str = "PROSE_SOURCE_DIR";
pub const ENV_OUTPUT_DIR: &str = "PROSE_OUTPUT_DIR";
pub const ENV_VALIDATION_ENABLED: &str = "PROSE_VALIDATION_ENABLED";
pub const ENV_CLEAN_HTML: &str = "PROSE_CLEAN_HTML";
pub const ENV_INCLUDE_METADATA: &str = "PROSE_INCLUDE_METADATA";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Failed to read config file {}", path.display())]
    #[diagnostic(code(prose_md::config::read), help("Pass an existing file with --config."))]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config file {}: {source}", path.display())]
    #[diagnostic(code(prose_md::config::parse))]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid configuration:\n{}", problems.iter().map(|p| format!("  - {p}")).join("\n"))]
    #[diagnostic(
        code(prose_md::config::invalid),
        help("Run `prose-md --init` to see a complete configuration.")
    )]
    Invalid { problems: Vec<String> },
    #[error("Failed to write config file {}", path.display())]
    #[diagnostic(code(prose_md::config::write))]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to serialize configuration: {0}")]
    #[diagnostic(code(prose_md::config::serialize))]
    Serialize(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub validation: ValidationConfig,
    pub conversion: ConversionSettings,
    pub naming: NamingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    pub enabled: bool,
    /// The first pattern doubles as the extraction target when `conversion.cleanHtml` is on.
    pub patterns: Vec<ValidationPattern>,
    /// Every pattern must match instead of at least one.
    pub strict: bool,
    /// Subtrees rooted at these tags are ignored by matching and extraction.
    pub skip_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSettings {
    /// Copy unrecognized document fields into the frontmatter.
    pub preserve_frontmatter: bool,
    pub include_metadata: bool,
    pub clean_html: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamingConfig {
    pub use_title: bool,
    pub use_fallback: bool,
    pub sanitize: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("./content"),
            output_dir: PathBuf::from("./markdown"),
            validation: ValidationConfig::default(),
            conversion: ConversionSettings::default(),
            naming: NamingConfig::default(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            patterns: vec![ValidationPattern::new("div", "class", "prose")],
            strict: false,
            skip_tags: vec!["script".to_string(), "style".to_string()],
        }
    }
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            preserve_frontmatter: true,
            include_metadata: true,
            clean_html: true,
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            use_title: true,
            use_fallback: true,
            sanitize: true,
        }
    }
}

impl ConversionConfig {
    /// Loads configuration from defaults, environment and file.
    ///
    /// An explicit `config_path` must exist. Without one, [`DEFAULT_CONFIG_PATH`]
    /// is used only when present.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(config_path, Path::new(DEFAULT_CONFIG_PATH), |key| {
            std::env::var(key).ok()
        })
    }

    pub fn load_with<F>(
        config_path: Option<&Path>,
        default_path: &Path,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let (config, file) = match config_path {
            Some(path) => (defaults, Some(path)),
            None => (
                defaults.apply_env_with(lookup),
                default_path.is_file().then_some(default_path),
            ),
        };

        match file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config file");
                config.merge_file(path)
            }
            None => Ok(config),
        }
    }

    /// Applies `PROSE_*` overrides. Booleans are true only for the exact value `true`.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_SOURCE_DIR) {
            self.source_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        let flag = |key| lookup(key).map(|value| value == "true");
        if let Some(enabled) = flag(ENV_VALIDATION_ENABLED) {
            self.validation.enabled = enabled;
        }
        if let Some(clean) = flag(ENV_CLEAN_HTML) {
            self.conversion.clean_html = clean;
        }
        if let Some(include) = flag(ENV_INCLUDE_METADATA) {
            self.conversion.include_metadata = include;
        }
        self
    }

    pub fn merge_file(self, path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let overlay: Value = serde_json::from_str(&text).map_err(parse_error)?;
        self.merge(overlay).map_err(parse_error)
    }

    /// Overlays a partial JSON config. Keys absent from `overlay` keep their current value.
    pub fn merge(self, overlay: Value) -> Result<Self, serde_json::Error> {
        let mut base = serde_json::to_value(self)?;
        merge_values(&mut base, overlay);
        serde_json::from_value(base)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.source_dir.as_os_str().is_empty() {
            problems.push("sourceDir must not be empty".to_string());
        }
        if self.output_dir.as_os_str().is_empty() {
            problems.push("outputDir must not be empty".to_string());
        }
        if self.validation.patterns.is_empty() {
            problems.push("validation.patterns must contain at least one pattern".to_string());
        }
        for (index, pattern) in self.validation.patterns.iter().enumerate() {
            if pattern.tag.trim().is_empty() {
                problems.push(format!("validation.patterns[{index}].tag is required"));
            }
            if pattern.attribute.trim().is_empty() {
                problems.push(format!("validation.patterns[{index}].attribute is required"));
            }
            if pattern.pattern.is_empty() {
                problems.push(format!("validation.patterns[{index}].pattern is required"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Writes the built-in defaults to `path` as pretty JSON.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let json = Self::default().to_json_pretty()?;
        fs::write(path, format!("{json}\n")).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The pattern whose match is extracted before conversion, if any.
    pub fn extract_pattern(&self) -> Option<&ValidationPattern> {
        self.conversion
            .clean_html
            .then(|| self.validation.patterns.first())
            .flatten()
            .filter(|pattern| !pattern.pattern.is_empty())
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ConversionConfig::default();
        assert_eq!(config.source_dir, PathBuf::from("./content"));
        assert_eq!(config.output_dir, PathBuf::from("./markdown"));
        assert!(config.validation.enabled);
        assert!(!config.validation.strict);
        assert_eq!(config.validation.skip_tags, vec!["script", "style"]);
        assert_eq!(
            config.validation.patterns,
            vec![ValidationPattern::new("div", "class", "prose")]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_env() {
        let config = ConversionConfig::default().apply_env_with(env(&[
            (ENV_SOURCE_DIR, "in"),
            (ENV_OUTPUT_DIR, "out"),
            (ENV_VALIDATION_ENABLED, "false"),
            (ENV_CLEAN_HTML, "TRUE"),
            (ENV_INCLUDE_METADATA, "true"),
        ]));
        assert_eq!(config.source_dir, PathBuf::from("in"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert!(!config.validation.enabled);
        assert!(!config.conversion.clean_html);
        assert!(config.conversion.include_metadata);
    }

    #[test]
    fn test_merge_keeps_absent_keys() {
        let config = ConversionConfig::default()
            .merge(json!({
                "outputDir": "docs",
                "validation": {
                    "strict": true,
                    "patterns": [{"tag": "article", "attribute": "id", "pattern": {"regex": "^post-\\d+$"}}]
                },
                "naming": {"sanitize": false}
            }))
            .unwrap();

        assert_eq!(config.source_dir, PathBuf::from("./content"));
        assert_eq!(config.output_dir, PathBuf::from("docs"));
        assert!(config.validation.strict);
        assert!(config.validation.enabled);
        assert_eq!(config.validation.skip_tags, vec!["script", "style"]);
        assert_eq!(config.validation.patterns.len(), 1);
        assert!(config.validation.patterns[0].pattern.is_match("post-12"));
        assert!(!config.naming.sanitize);
        assert!(config.naming.use_title);
    }

    #[test]
    fn test_merge_rejects_bad_regex() {
        let result = ConversionConfig::default().merge(json!({
            "validation": {"patterns": [{"tag": "div", "attribute": "class", "pattern": {"regex": "("}}]}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_env_is_ignored_with_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(&path, r#"{"sourceDir": "from-file"}"#).unwrap();

        let lookup = env(&[(ENV_OUTPUT_DIR, "from-env")]);
        let config =
            ConversionConfig::load_with(Some(&path), &dir.path().join("absent.json"), lookup)
                .unwrap();
        assert_eq!(config.source_dir, PathBuf::from("from-file"));
        assert_eq!(config.output_dir, PathBuf::from("./markdown"));
    }

    #[test]
    fn test_load_default_file_overrides_env() {
        let dir = TempDir::new().unwrap();
        let default_path = dir.path().join(DEFAULT_CONFIG_PATH);
        fs::write(&default_path, r#"{"sourceDir": "from-file"}"#).unwrap();

        let lookup = env(&[(ENV_SOURCE_DIR, "env-src"), (ENV_OUTPUT_DIR, "env-out")]);
        let config = ConversionConfig::load_with(None, &default_path, lookup).unwrap();
        assert_eq!(config.source_dir, PathBuf::from("from-file"));
        assert_eq!(config.output_dir, PathBuf::from("env-out"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        let err = ConversionConfig::load_with(Some(&missing), &missing, env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_unparsable_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        let err = ConversionConfig::load_with(Some(&path), &path, env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[rstest]
    #[case::empty_source(json!({"sourceDir": ""}), "sourceDir must not be empty")]
    #[case::no_patterns(json!({"validation": {"patterns": []}}), "validation.patterns must contain at least one pattern")]
    #[case::empty_tag(
        json!({"validation": {"patterns": [{"tag": "", "attribute": "class", "pattern": "x"}]}}),
        "validation.patterns[0].tag is required"
    )]
    #[case::missing_pattern(
        json!({"validation": {"patterns": [{"tag": "div", "attribute": "class"}]}}),
        "validation.patterns[0].pattern is required"
    )]
    fn test_validate_reports_problem(#[case] overlay: Value, #[case] problem: &str) {
        let config = ConversionConfig::default().merge(overlay).unwrap();
        match config.validate() {
            Err(ConfigError::Invalid { problems }) => {
                assert!(problems.iter().any(|p| p == problem), "{:?}", problems)
            }
            other => panic!("expected invalid config, got {:?}", other),
        }
    }

    #[test]
    fn test_write_default_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_PATH);
        ConversionConfig::write_default(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"sourceDir\": \"./content\""));
        assert!(text.contains("\"skipTags\""));
        let loaded = ConversionConfig::load_with(Some(&path), &path, env(&[])).unwrap();
        assert_eq!(loaded, ConversionConfig::default());
    }

    #[rstest]
    #[case(true, Some("div[class]"))]
    #[case(false, None)]
    fn test_extract_pattern_follows_clean_html(#[case] clean: bool, #[case] expected: Option<&str>) {
        let mut config = ConversionConfig::default();
        config.conversion.clean_html = clean;
        assert_eq!(config.extract_pattern().map(|p| p.label()).as_deref(), expected);
    }
}
