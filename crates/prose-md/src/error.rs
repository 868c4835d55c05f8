use crate::config::ConfigError;
use crate::html::HtmlToMarkdownError;
use crate::validator::ShapeError;
use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole run.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Failed to read source directory {}", path.display())]
    #[diagnostic(
        code(prose_md::read_source_dir),
        help("Check that sourceDir exists and is readable.")
    )]
    ReadSourceDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Why a single document could not be converted. Recorded on its result, never fatal.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Invalid document: {0}")]
    Shape(#[from] ShapeError),
    #[error("Content validation failed: {0}")]
    Content(String),
    #[error("Conversion failed: {0}")]
    Conversion(#[from] HtmlToMarkdownError),
    #[error("Could not derive a valid file name from \"{0}\"")]
    Naming(String),
    #[error("Failed to build frontmatter: {0}")]
    Frontmatter(#[from] serde_json::Error),
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
