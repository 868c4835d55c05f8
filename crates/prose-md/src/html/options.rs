use crate::pattern::ValidationPattern;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionOptions<'a> {
    /// When set, only the children of the first matching element are converted.
    pub extract_pattern: Option<&'a ValidationPattern>,
    /// Elements whose subtrees are invisible when searching for `extract_pattern`.
    pub skip_tags: &'a [String],
}
