use itertools::Itertools;

use super::error::HtmlToMarkdownError;
use super::node::{HtmlElement, HtmlNode};

type Result<T> = std::result::Result<T, HtmlToMarkdownError>;

const BULLET: &str = "-";
const STRONG_DELIMITER: &str = "**";
const EMPHASIS_DELIMITER: &str = "_";
const STRIKETHROUGH_DELIMITER: &str = "~~";
const THEMATIC_BREAK: &str = "---";
const MIN_FENCE_LEN: usize = 3;
const MIN_TABLE_COLUMN_WIDTH: usize = 3;

const CONTAINER_TAGS: &[&str] = &[
    "html", "body", "div", "section", "article", "main", "header", "footer", "nav", "aside",
    "figure", "hgroup", "details", "center", "form", "fieldset",
];
const PARAGRAPH_TAGS: &[&str] = &["p", "figcaption", "summary", "address", "caption"];
const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];
const EMBED_TAGS: &[&str] = &["iframe", "video", "audio", "embed", "object"];
const OTHER_BLOCK_TAGS: &[&str] = &["ul", "ol", "pre", "blockquote", "table", "hr", "dl"];
const DROPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "title", "meta", "link", "button",
    "select", "textarea",
];

fn is_block_tag(tag_name: &str) -> bool {
    CONTAINER_TAGS.contains(&tag_name)
        || PARAGRAPH_TAGS.contains(&tag_name)
        || HEADING_TAGS.contains(&tag_name)
        || EMBED_TAGS.contains(&tag_name)
        || OTHER_BLOCK_TAGS.contains(&tag_name)
}

fn is_dropped(element: &HtmlElement) -> bool {
    DROPPED_TAGS.contains(&element.tag_name.as_str())
}

/// An inline element wrapping block content (`<a><div>..</div></a>`) is laid out as a container.
fn contains_block(element: &HtmlElement) -> bool {
    element
        .child_elements()
        .any(|child| is_block_tag(&child.tag_name))
}

fn extract_text_from_pre_children(nodes: &[HtmlNode]) -> String {
    let mut text_content = String::new();
    for node in nodes {
        match node {
            HtmlNode::Text(text) => text_content.push_str(text),
            HtmlNode::Element(el) if el.tag_name == "br" => text_content.push('\n'),
            HtmlNode::Element(el) => {
                text_content.push_str(&extract_text_from_pre_children(&el.children));
            }
            HtmlNode::Comment(_) => {}
        }
    }
    text_content
}

fn longest_run(text: &str, needle: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == needle {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn collapse_whitespace(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut in_whitespace = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_whitespace {
                collapsed.push(' ');
            }
            in_whitespace = true;
        } else {
            collapsed.push(c);
            in_whitespace = false;
        }
    }
    collapsed
}

fn escape_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut escaped = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let prev = i.checked_sub(1).and_then(|p| chars.get(p));
        let next = chars.get(i + 1);
        let needs_escape = match c {
            '\\' | '`' | '*' | '[' | ']' => true,
            // Intraword underscores never open emphasis in GFM.
            '_' => !(prev.is_some_and(|p| p.is_alphanumeric())
                && next.is_some_and(|n| n.is_alphanumeric())),
            '<' => next.is_some_and(|n| n.is_ascii_alphabetic() || *n == '/' || *n == '!'),
            // GFM strikethrough opens on a single tilde.
            '~' => true,
            '&' => starts_entity_reference(&chars[i + 1..]),
            _ => false,
        };
        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// True when `rest` (the text after an `&`) reads as `name;`, `#123;` or `#x1F;`.
fn starts_entity_reference(rest: &[char]) -> bool {
    let Some(end) = rest.iter().position(|c| *c == ';') else {
        return false;
    };
    let body = &rest[..end];
    match body {
        ['#', 'x' | 'X', digits @ ..] => {
            !digits.is_empty() && digits.iter().all(char::is_ascii_hexdigit)
        }
        ['#', digits @ ..] => !digits.is_empty() && digits.iter().all(char::is_ascii_digit),
        [first, tail @ ..] => {
            first.is_ascii_alphabetic() && tail.iter().all(char::is_ascii_alphanumeric)
        }
        [] => false,
    }
}

/// Escapes a leading character that would otherwise start a block construct.
///
/// Continuation lines (after a hard break) also guard against setext underlines.
fn escape_line_start(line: &str, continuation: bool) -> String {
    if line.starts_with('#') || line.starts_with('>') {
        return format!("\\{}", line);
    }
    if line == "-" || line == "+" || line.starts_with("- ") || line.starts_with("+ ") {
        return format!("\\{}", line);
    }
    let underline = line.chars().all(|c| c == '-') || line.chars().all(|c| c == '=');
    if underline && (continuation || line.len() >= 3) {
        return format!("\\{}", line);
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if (1..=9).contains(&digits) {
        let rest = &line[digits..];
        if rest == "." || rest.starts_with(". ") || rest == ")" || rest.starts_with(") ") {
            return format!("{}\\{}", &line[..digits], rest);
        }
    }
    line.to_string()
}

/// Normalizes collected inline output into lines joined by hard breaks.
///
/// Inline output only contains `\n` where a `<br>` was seen.
fn finish_inline(raw: &str, escape_block_starts: bool) -> String {
    raw.split('\n')
        .map(|line| {
            line.split(' ')
                .filter(|word| !word.is_empty())
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            if escape_block_starts {
                escape_line_start(&line, index > 0)
            } else {
                line
            }
        })
        .join("\\\n")
}

fn flatten_hard_breaks(text: &str) -> String {
    text.replace("\\\n", " ")
}

fn wrap_delimited(content: &str, delimiter: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return content.to_string();
    }
    let leading = &content[..content.len() - content.trim_start().len()];
    let trailing = &content[content.trim_end().len()..];
    format!("{leading}{delimiter}{trimmed}{delimiter}{trailing}")
}

fn process_url_for_markdown(url: &str) -> String {
    let processed_url = url.replace(' ', "%20");
    let needs_angle_brackets = url.is_empty()
        || url.contains(' ')
        || processed_url.contains('(')
        || processed_url.contains(')');
    if needs_angle_brackets {
        format!("<{}>", processed_url)
    } else {
        processed_url
    }
}

fn title_part(element: &HtmlElement) -> String {
    element
        .attr("title")
        .filter(|title| !title.is_empty())
        .map(|title| format!(" \"{}\"", title.replace('"', "\\\"")))
        .unwrap_or_default()
}

fn is_autolink(href: &str, text: &str) -> bool {
    let has_scheme = href.contains("://") || href.starts_with("mailto:");
    let text_matches = text == href || href.strip_prefix("mailto:") == Some(text);
    has_scheme
        && text_matches
        && !href.chars().any(|c| c.is_whitespace() || c == '<' || c == '>')
}

fn convert_link(element: &HtmlElement) -> Result<String> {
    let content = convert_inline(&element.children)?;
    let Some(href) = element.attr("href") else {
        return Ok(content);
    };

    let plain_text = collapse_whitespace(&extract_text_from_pre_children(&element.children));
    if is_autolink(href, plain_text.trim()) {
        return Ok(format!("<{}>", href));
    }

    let leading = &content[..content.len() - content.trim_start().len()];
    let trailing = &content[content.trim_end().len()..];
    Ok(format!(
        "{}[{}]({}{}){}",
        leading,
        content.trim(),
        process_url_for_markdown(href),
        title_part(element),
        trailing
    ))
}

fn convert_image(element: &HtmlElement) -> String {
    match element.attr("src") {
        Some(src) if !src.is_empty() => {
            let alt_text = escape_text(&collapse_whitespace(element.attr("alt").unwrap_or("")));
            format!(
                "![{}]({}{})",
                alt_text.trim(),
                process_url_for_markdown(src),
                title_part(element)
            )
        }
        _ => String::new(),
    }
}

fn convert_inline_code(text: &str) -> String {
    let text = text.replace('\n', " ");
    if text.is_empty() {
        return String::new();
    }
    let fence = "`".repeat(longest_run(&text, '`') + 1);
    if text.starts_with('`') || text.ends_with('`') {
        format!("{fence} {text} {fence}")
    } else {
        format!("{fence}{text}{fence}")
    }
}

fn convert_input(element: &HtmlElement) -> String {
    match element.attr("type").map(str::to_lowercase).as_deref() {
        Some("checkbox") | Some("radio") => {
            if element.attr("checked").is_some() {
                "[x] ".to_string()
            } else {
                "[ ] ".to_string()
            }
        }
        Some("text") | Some("number") | Some("url") | Some("email") => element
            .attr("value")
            .map(escape_text)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn convert_inline_element(element: &HtmlElement) -> Result<String> {
    let tag_name = element.tag_name.as_str();
    let markdown = match tag_name {
        "strong" | "b" => wrap_delimited(&convert_inline(&element.children)?, STRONG_DELIMITER),
        "em" | "i" => wrap_delimited(&convert_inline(&element.children)?, EMPHASIS_DELIMITER),
        "s" | "strike" | "del" => wrap_delimited(
            &convert_inline(&element.children)?,
            STRIKETHROUGH_DELIMITER,
        ),
        "code" | "tt" | "samp" => {
            convert_inline_code(&extract_text_from_pre_children(&element.children))
        }
        "a" => convert_link(element)?,
        "img" => convert_image(element),
        "br" => "\n".to_string(),
        "wbr" => String::new(),
        "input" => convert_input(element),
        "kbd" | "u" | "sub" | "sup" | "mark" => format!(
            "<{0}>{1}</{0}>",
            tag_name,
            convert_inline(&element.children)?.trim()
        ),
        _ if is_dropped(element) => String::new(),
        // Block content reached from an inline context (table cells) becomes its own line.
        _ if is_block_tag(tag_name) => format!("\n{}\n", convert_inline(&element.children)?),
        _ => convert_inline(&element.children)?,
    };
    Ok(markdown)
}

fn convert_inline<'a>(nodes: impl IntoIterator<Item = &'a HtmlNode>) -> Result<String> {
    let mut markdown = String::new();
    for node in nodes {
        match node {
            HtmlNode::Text(text) => markdown.push_str(&escape_text(&collapse_whitespace(text))),
            HtmlNode::Element(element) => markdown.push_str(&convert_inline_element(element)?),
            HtmlNode::Comment(_) => {}
        }
    }
    Ok(markdown)
}

fn handle_heading_element(element: &HtmlElement) -> Result<Option<String>> {
    let content = flatten_hard_breaks(&finish_inline(&convert_inline(&element.children)?, false));
    if content.is_empty() {
        return Ok(None);
    }
    let marker_level = element.tag_name[1..].parse().unwrap_or(1);
    Ok(Some(format!("{} {}", "#".repeat(marker_level), content)))
}

fn handle_pre_element(element: &HtmlElement) -> String {
    let mut lang_specifier = "";
    let mut content_nodes = &element.children;
    let first_element = element.children.iter().find(|node| match node {
        HtmlNode::Text(text) => !text.trim().is_empty(),
        HtmlNode::Comment(_) => false,
        HtmlNode::Element(_) => true,
    });
    if let Some(HtmlNode::Element(code_element)) = first_element {
        if code_element.tag_name == "code" {
            content_nodes = &code_element.children;
            if let Some(class_attr) = code_element.attr("class") {
                lang_specifier = class_attr
                    .split_whitespace()
                    .find_map(|class_name| {
                        class_name
                            .strip_prefix("language-")
                            .or_else(|| class_name.strip_prefix("lang-"))
                    })
                    .unwrap_or_default();
            }
        }
    }

    let text_content = extract_text_from_pre_children(content_nodes);
    let text_content = text_content.strip_prefix('\n').unwrap_or(&text_content);
    let text_content = text_content.trim_end_matches('\n');
    let fence = "`".repeat((longest_run(text_content, '`') + 1).max(MIN_FENCE_LEN));
    if text_content.is_empty() {
        format!("{fence}{lang_specifier}\n{fence}")
    } else {
        format!("{fence}{lang_specifier}\n{text_content}\n{fence}")
    }
}

fn handle_list_element(list_element: &HtmlElement) -> Result<Option<String>> {
    let ordered = list_element.is("ol");
    let mut current_list_number = list_element
        .attr("start")
        .and_then(|start| start.trim().parse::<usize>().ok())
        .unwrap_or(1);

    let items: Vec<&HtmlElement> = list_element
        .child_elements()
        .filter(|el| el.is("li"))
        .collect();
    let loose = items
        .iter()
        .any(|li| li.child_elements().any(|child| child.is("p")));
    let separator = if loose { "\n\n" } else { "\n" };

    let mut markdown_items = Vec::with_capacity(items.len());
    for li_element in items {
        let marker_prefix = if ordered {
            let marker = format!("{}. ", current_list_number);
            current_list_number += 1;
            marker
        } else {
            format!("{} ", BULLET)
        };
        let continuation_indent = " ".repeat(marker_prefix.len());

        let li_content_markdown = convert_blocks(&li_element.children)?.join(separator);
        let mut lines = li_content_markdown.lines();
        let mut item = format!("{}{}", marker_prefix, lines.next().unwrap_or_default())
            .trim_end()
            .to_string();
        for line in lines {
            item.push('\n');
            if !line.is_empty() {
                item.push_str(&continuation_indent);
                item.push_str(line);
            }
        }
        markdown_items.push(item);
    }

    if markdown_items.is_empty() {
        Ok(None)
    } else {
        Ok(Some(markdown_items.join(separator)))
    }
}

fn handle_blockquote_element(element: &HtmlElement) -> Result<String> {
    let inner_markdown = convert_blocks(&element.children)?.join("\n\n");
    if inner_markdown.is_empty() {
        return Ok(">".to_string());
    }
    Ok(inner_markdown
        .lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {}", line)
            }
        })
        .join("\n"))
}

#[derive(PartialEq, Debug, Clone, Copy)]
enum Alignment {
    Left,
    Center,
    Right,
    Default,
}

fn get_cell_alignment(element: &HtmlElement) -> Alignment {
    let from_keyword = |value: &str| match value.trim().to_lowercase().as_str() {
        "left" => Some(Alignment::Left),
        "center" => Some(Alignment::Center),
        "right" => Some(Alignment::Right),
        _ => None,
    };

    if let Some(style_attr) = element.attr("style") {
        for part in style_attr.split(';') {
            if let Some((property, value)) = part.split_once(':') {
                if property.trim() == "text-align" {
                    if let Some(alignment) = from_keyword(value) {
                        return alignment;
                    }
                }
            }
        }
    }
    element
        .attr("align")
        .and_then(from_keyword)
        .unwrap_or(Alignment::Default)
}

fn convert_table_cell(cell: &HtmlElement) -> Result<String> {
    let content = convert_inline(&cell.children)?;
    Ok(flatten_hard_breaks(&finish_inline(&content, false)).replace('|', "\\|"))
}

fn collect_table_rows(table_element: &HtmlElement) -> (Option<&HtmlElement>, Vec<&HtmlElement>) {
    let mut header_row = None;
    let mut rows = Vec::new();
    for section in table_element.child_elements() {
        match section.tag_name.as_str() {
            "thead" => {
                for tr in section.child_elements().filter(|el| el.is("tr")) {
                    if header_row.is_none() {
                        header_row = Some(tr);
                    } else {
                        rows.push(tr);
                    }
                }
            }
            "tbody" | "tfoot" => rows.extend(section.child_elements().filter(|el| el.is("tr"))),
            "tr" => rows.push(section),
            _ => {}
        }
    }
    if header_row.is_none() && !rows.is_empty() {
        header_row = Some(rows.remove(0));
    }
    (header_row, rows)
}

fn row_cells(row: &HtmlElement) -> impl Iterator<Item = &HtmlElement> {
    row.child_elements().filter(|el| el.is("td") || el.is("th"))
}

fn pad_cell(content: &str, width: usize, alignment: Alignment) -> String {
    let gap = width.saturating_sub(content.chars().count());
    match alignment {
        Alignment::Right => format!("{}{}", " ".repeat(gap), content),
        Alignment::Center => {
            let left = gap / 2;
            format!("{}{}{}", " ".repeat(left), content, " ".repeat(gap - left))
        }
        Alignment::Left | Alignment::Default => format!("{}{}", content, " ".repeat(gap)),
    }
}

fn handle_table_element(table_element: &HtmlElement) -> Result<Option<String>> {
    let (Some(header_row), body_rows) = collect_table_rows(table_element) else {
        return Ok(None);
    };

    let header_alignments: Vec<Alignment> = row_cells(header_row).map(get_cell_alignment).collect();
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(body_rows.len() + 1);
    for row in std::iter::once(header_row).chain(body_rows) {
        rows.push(row_cells(row).map(convert_table_cell).collect::<Result<_>>()?);
    }

    let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    if column_count == 0 {
        return Ok(None);
    }

    let widths: Vec<usize> = (0..column_count)
        .map(|i| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                .max(MIN_TABLE_COLUMN_WIDTH)
        })
        .collect();
    let alignment_at =
        |i: usize| header_alignments.get(i).copied().unwrap_or(Alignment::Default);

    let render_row = |row: &Vec<String>| {
        let cells = (0..column_count)
            .map(|i| {
                pad_cell(
                    row.get(i).map(String::as_str).unwrap_or(""),
                    widths[i],
                    alignment_at(i),
                )
            })
            .join(" | ");
        format!("| {} |", cells)
    };

    let delimiter_row = (0..column_count)
        .map(|i| {
            let width = widths[i];
            match alignment_at(i) {
                Alignment::Left => format!(":{}", "-".repeat(width - 1)),
                Alignment::Center => format!(":{}:", "-".repeat(width - 2)),
                Alignment::Right => format!("{}:", "-".repeat(width - 1)),
                Alignment::Default => "-".repeat(width),
            }
        })
        .join(" | ");

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_row(&rows[0]));
    lines.push(format!("| {} |", delimiter_row));
    lines.extend(rows[1..].iter().map(render_row));
    Ok(Some(lines.join("\n")))
}

fn handle_dl_element(element: &HtmlElement) -> Result<Option<String>> {
    let mut dl_content_parts = Vec::new();
    for child in element.child_elements() {
        match child.tag_name.as_str() {
            "dt" => {
                let term = flatten_hard_breaks(&finish_inline(&convert_inline(&child.children)?, false));
                if !term.is_empty() {
                    dl_content_parts.push(format!("{STRONG_DELIMITER}{term}{STRONG_DELIMITER}"));
                }
            }
            "dd" => {
                let definition = convert_blocks(&child.children)?.join("\n\n");
                if !definition.is_empty() {
                    dl_content_parts.push(format!(": {}", definition));
                }
            }
            _ => dl_content_parts.extend(convert_block_element(child)?),
        }
    }
    if dl_content_parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(dl_content_parts.join("\n\n")))
    }
}

fn handle_embedded_content_element(element: &HtmlElement) -> Option<String> {
    let tag_name = element.tag_name.as_str();
    let mut additional_info = String::new();
    let src_url = match tag_name {
        "iframe" | "embed" => element.attr("src"),
        "video" | "audio" => {
            if tag_name == "video" {
                if let Some(poster_url) = element.attr("poster").filter(|p| !p.is_empty()) {
                    additional_info = format!(" (Poster: {})", poster_url);
                }
            }
            element.attr("src").or_else(|| {
                element
                    .child_elements()
                    .filter(|el| el.is("source"))
                    .find_map(|source| source.attr("src"))
            })
        }
        "object" => element.attr("data"),
        _ => None,
    };

    let url = src_url.filter(|url| !url.is_empty())?;
    let description = match element.attr("title").filter(|t| !t.is_empty()) {
        Some(title) => title.to_string(),
        None => match tag_name {
            "iframe" => "Embedded Iframe".to_string(),
            "video" => "Video".to_string(),
            "audio" => "Audio".to_string(),
            "embed" => "Embedded Content".to_string(),
            _ => "Embedded Object".to_string(),
        },
    };
    Some(format!(
        "[{}]({}{}){}",
        description,
        process_url_for_markdown(url),
        title_part(element),
        additional_info
    ))
}

fn convert_block_element(element: &HtmlElement) -> Result<Vec<String>> {
    let tag_name = element.tag_name.as_str();
    let block = match tag_name {
        _ if CONTAINER_TAGS.contains(&tag_name) => return convert_blocks(&element.children),
        _ if PARAGRAPH_TAGS.contains(&tag_name) => {
            Some(finish_inline(&convert_inline(&element.children)?, true))
        }
        _ if HEADING_TAGS.contains(&tag_name) => handle_heading_element(element)?,
        _ if EMBED_TAGS.contains(&tag_name) => handle_embedded_content_element(element),
        "hr" => Some(THEMATIC_BREAK.to_string()),
        "ul" | "ol" => handle_list_element(element)?,
        "blockquote" => Some(handle_blockquote_element(element)?),
        "pre" => Some(handle_pre_element(element)),
        "table" => handle_table_element(element)?,
        "dl" => handle_dl_element(element)?,
        // Unknown elements holding block children behave like containers.
        _ => return convert_blocks(&element.children),
    };
    Ok(block.into_iter().filter(|b| !b.is_empty()).collect())
}

fn flush_inline_run(inline_run: &mut Vec<&HtmlNode>, blocks: &mut Vec<String>) -> Result<()> {
    if inline_run.is_empty() {
        return Ok(());
    }
    let paragraph = finish_inline(&convert_inline(inline_run.iter().copied())?, true);
    if !paragraph.is_empty() {
        blocks.push(paragraph);
    }
    inline_run.clear();
    Ok(())
}

/// Converts a node sequence into Markdown blocks, in document order.
///
/// Consecutive inline nodes form one paragraph.
pub fn convert_blocks(nodes: &[HtmlNode]) -> Result<Vec<String>> {
    let mut markdown_blocks = Vec::new();
    let mut inline_run: Vec<&HtmlNode> = Vec::new();

    for node in nodes {
        match node {
            HtmlNode::Element(element) if is_dropped(element) => {}
            HtmlNode::Element(element)
                if is_block_tag(&element.tag_name) || contains_block(element) =>
            {
                flush_inline_run(&mut inline_run, &mut markdown_blocks)?;
                markdown_blocks.extend(convert_block_element(element)?);
            }
            HtmlNode::Comment(_) => {}
            _ => inline_run.push(node),
        }
    }
    flush_inline_run(&mut inline_run, &mut markdown_blocks)?;

    Ok(markdown_blocks)
}

pub fn convert_nodes_to_markdown(nodes: &[HtmlNode]) -> Result<String> {
    Ok(convert_blocks(nodes)?.join("\n\n"))
}
