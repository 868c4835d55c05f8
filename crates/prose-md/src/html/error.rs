use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HtmlToMarkdownError {
    #[error("HTML parsing error: {message}")]
    #[diagnostic(
        code(prose_md::html::parsing),
        help("The input HTML could not be parsed into a document tree.")
    )]
    ParseError { message: String },

    #[error("Invalid HTML structure: elements are nested deeper than {limit} levels")]
    #[diagnostic(
        code(prose_md::html::nesting_depth),
        help("Flatten the markup or split the content into several documents.")
    )]
    NestingTooDeep { limit: usize },
}
