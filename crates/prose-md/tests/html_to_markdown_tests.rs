use prose_md::html::{ConversionOptions, HtmlToMarkdownError, convert_html_to_markdown};
use prose_md::{Pattern, ValidationPattern};
use rstest::rstest;

fn assert_conversion_with_options(html: &str, expected_markdown: &str, options: ConversionOptions<'_>) {
    match convert_html_to_markdown(html, options) {
        Ok(markdown) => assert_eq!(markdown, expected_markdown),
        Err(e) => panic!("Conversion failed for HTML '{}': {:?}", html, e),
    }
}

fn assert_conversion(html: &str, expected_markdown: &str) {
    assert_conversion_with_options(html, expected_markdown, ConversionOptions::default());
}

#[test]
fn test_article_with_mixed_blocks() {
    let html = concat!(
        "<h2>Intro</h2>",
        "<p>Read the <a href=\"https://example.com/docs\" title=\"Docs\">docs</a>.</p>",
        "<ul><li>one</li><li>two</li></ul>",
        "<blockquote><p>quoted</p></blockquote>",
        "<hr>",
        "<pre><code class=\"language-rust\">let x = 1;</code></pre>"
    );
    let expected = concat!(
        "## Intro\n\n",
        "Read the [docs](https://example.com/docs \"Docs\").\n\n",
        "- one\n- two\n\n",
        "> quoted\n\n",
        "---\n\n",
        "```rust\nlet x = 1;\n```"
    );
    assert_conversion(html, expected);
}

#[test]
fn test_task_list_and_strikethrough() {
    assert_conversion(
        "<ul><li><input type=\"checkbox\" checked> <del>old</del></li><li><input type=\"checkbox\"> new</li></ul>",
        "- [x] ~~old~~\n- [ ] new",
    );
}

#[test]
fn test_dropped_elements() {
    assert_conversion(
        "<style>p { color: red }</style><p>visible</p><noscript>hidden</noscript><template><p>t</p></template>",
        "visible",
    );
}

#[rstest]
#[case::literal(ValidationPattern::new("section", "class", "body"))]
#[case::regex(ValidationPattern::new(
    "section",
    "class",
    Pattern::regex(r"^post-body\b").unwrap()
))]
fn test_extraction_by_pattern(#[case] pattern: ValidationPattern) {
    let html = concat!(
        "<header><p>Site header</p></header>",
        "<section class=\"post-body wide\"><p>Kept</p></section>",
        "<footer><p>Footer</p></footer>"
    );
    assert_conversion_with_options(
        html,
        "Kept",
        ConversionOptions {
            extract_pattern: Some(&pattern),
            skip_tags: &[],
        },
    );
}

#[test]
fn test_extraction_takes_first_match_in_document_order() {
    let pattern = ValidationPattern::new("div", "class", "prose");
    let html = concat!(
        "<div class=\"prose outer\"><p>outer</p><div class=\"prose inner\"><p>inner</p></div></div>",
        "<div class=\"prose\"><p>later</p></div>"
    );
    assert_conversion_with_options(
        html,
        "outer\n\ninner",
        ConversionOptions {
            extract_pattern: Some(&pattern),
            skip_tags: &[],
        },
    );
}

#[test]
fn test_excessive_nesting_is_an_error() {
    let depth = 600;
    let html = format!("{}x{}", "<div>".repeat(depth), "</div>".repeat(depth));
    match convert_html_to_markdown(&html, ConversionOptions::default()) {
        Err(HtmlToMarkdownError::NestingTooDeep { .. }) => {}
        other => panic!("expected nesting error, got {:?}", other),
    }
}
