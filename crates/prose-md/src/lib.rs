//! # prose-md: batch conversion of prose JSON documents to Markdown
//!
//! A *prose document* is a JSON object with non-empty string `title` and
//! `content` fields, where `content` holds an HTML fragment. Documents may sit
//! anywhere inside a JSON file: at the root, in arrays or nested objects.
//!
//! For each document the [`Converter`]:
//!
//! 1. checks its shape and validates the HTML against structural
//!    [`ValidationPattern`]s,
//! 2. optionally extracts the first matching container,
//! 3. converts the HTML to GitHub Flavored Markdown,
//! 4. prepends a JSON frontmatter block and writes a uniquely named `.md` file.
//!
//! Every attempt produces a [`ConversionResult`]; a directory run collects them
//! into a [`ConversionReport`].
//!
//! ## Quick Start
//!
//! ```rust
//! use prose_md::html::{ConversionOptions, convert_html_to_markdown};
//!
//! let markdown = convert_html_to_markdown(
//!     "<h1>Hi</h1><p>Body <strong>text</strong></p>",
//!     ConversionOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(markdown, "# Hi\n\nBody **text**");
//! ```
//!
//! ```rust,no_run
//! use prose_md::{ConversionConfig, Converter};
//!
//! let config = ConversionConfig::load(None).unwrap();
//! let report = Converter::new(config).convert_directory().unwrap();
//! println!("{} converted", report.successful_conversions);
//! ```

pub mod config;
pub mod converter;
pub mod document;
pub mod error;
pub mod extractor;
pub mod html;
pub mod pattern;
pub mod report;
pub mod validator;

pub use config::{ConfigError, ConversionConfig};
pub use converter::Converter;
pub use document::ProseDocument;
pub use error::{ConvertError, Error};
pub use extractor::{ExtractedDocument, extract_documents, is_prose_document};
pub use pattern::{Pattern, ValidationPattern};
pub use report::{ConversionReport, ConversionResult};
pub use validator::{ValidationResult, validate_content, validate_json_source};
