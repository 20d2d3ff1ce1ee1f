//! HTML to markdown conversion for directly fetched pages.
//!
//! Strips `<script>` and `<style>` blocks, picks the main content area, and
//! emits a simple markdown rendering grouped by element kind: the title,
//! then headings, paragraphs, list items, and finally links.

use scraper::{ElementRef, Html, Selector};

/// Markdown rendering of an HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownPage {
    /// Contents of `<title>`, if present and non-blank.
    pub title: Option<String>,
    pub markdown: String,
}

/// Convert an HTML document to markdown.
///
/// Output sections appear in this order, each block separated by a blank
/// line:
///
/// 1. `# title`
/// 2. headings as `#`..`######` according to their level
/// 3. paragraph text
/// 4. list items as `- item`
/// 5. links as `[text](href)`
///
/// Only the main content area is converted: the first `<main>`, else the
/// first `<article>`, else the first `<div>` whose class mentions
/// `content`, `main` or `article`, else `<body>`. When none of those kinds
/// of element carry text, the content area's plain text is used instead.
pub fn html_to_markdown(html: &str) -> MarkdownPage {
    let cleaned = strip_tag(&strip_tag(html, "script"), "style");
    let document = Html::parse_document(&cleaned);

    let title = extract_title(&document);
    let mut blocks: Vec<String> = Vec::new();
    if let Some(ref t) = title {
        blocks.push(format!("# {t}"));
    }

    let root = content_root(&document);
    let before = blocks.len();

    if let Some(root) = root {
        for heading in select_all(root, "h1, h2, h3, h4, h5, h6") {
            let text = element_text(heading);
            if text.is_empty() {
                continue;
            }
            let level = heading_level(heading.value().name());
            blocks.push(format!("{} {text}", "#".repeat(level)));
        }

        for p in select_all(root, "p") {
            let text = element_text(p);
            if !text.is_empty() {
                blocks.push(text);
            }
        }

        for li in select_all(root, "ul li") {
            let text = element_text(li);
            if !text.is_empty() {
                blocks.push(format!("- {text}"));
            }
        }

        for a in select_all(root, "a[href]") {
            let text = element_text(a);
            let href = a.value().attr("href").unwrap_or_default().trim();
            if !text.is_empty() && !href.is_empty() {
                blocks.push(format!("[{text}]({href})"));
            }
        }
    }

    if blocks.len() == before {
        let fallback = match root {
            Some(root) => root.text().collect::<Vec<_>>().join(" "),
            None => document.root_element().text().collect::<Vec<_>>().join(" "),
        };
        let fallback = normalise_whitespace(&fallback);
        if !fallback.is_empty() {
            blocks.push(fallback);
        }
    }

    MarkdownPage {
        title,
        markdown: blocks.join("\n\n"),
    }
}

/// True when a `Content-Type` header value denotes HTML.
pub fn is_html_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
}

/// Extract the page title from the `<title>` element.
fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let text = document
        .select(&selector)
        .next()
        .map(|el| collapse_spaces(&el.text().collect::<String>()))?;
    (!text.is_empty()).then_some(text)
}

/// Pick the element whose descendants are converted.
fn content_root(document: &Html) -> Option<ElementRef<'_>> {
    for tag in ["main", "article"] {
        if let Ok(selector) = Selector::parse(tag) {
            if let Some(el) = document.select(&selector).next() {
                return Some(el);
            }
        }
    }

    if let Ok(selector) = Selector::parse("div[class]") {
        let content_div = document.select(&selector).find(|el| {
            el.value().attr("class").is_some_and(|class| {
                let class = class.to_ascii_lowercase();
                ["content", "main", "article"]
                    .iter()
                    .any(|needle| class.contains(needle))
            })
        });
        if content_div.is_some() {
            return content_div;
        }
    }

    let selector = Selector::parse("body").ok()?;
    document.select(&selector).next()
}

fn select_all<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => root.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_spaces(&el.text().collect::<String>())
}

fn heading_level(name: &str) -> usize {
    name.strip_prefix('h')
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| (1..=6).contains(n))
        .unwrap_or(1)
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove all instances of a specific HTML tag and its content.
fn strip_tag(html: &str, tag: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let lower = html.to_ascii_lowercase();
    let open_tag = format!("<{tag}");
    let close_tag = format!("</{tag}>");

    let mut pos = 0;
    loop {
        let start = match lower[pos..].find(&open_tag) {
            Some(offset) => pos + offset,
            None => {
                result.push_str(&html[pos..]);
                break;
            }
        };

        // Must be the tag itself, not e.g. <scripted> for <script>.
        let after_tag = start + open_tag.len();
        if after_tag < lower.len() {
            let next_byte = lower.as_bytes()[after_tag];
            if !matches!(next_byte, b' ' | b'>' | b'/' | b'\n' | b'\r' | b'\t') {
                result.push_str(&html[pos..after_tag]);
                pos = after_tag;
                continue;
            }
        }

        result.push_str(&html[pos..start]);

        let end = match lower[start..].find(&close_tag) {
            Some(offset) => start + offset + close_tag.len(),
            None => match lower[start..].find('>') {
                Some(offset) => start + offset + 1,
                None => html.len(),
            },
        };

        pos = end;
    }

    result
}

/// Collapse excess whitespace: runs of spaces become one, 3+ newlines become 2.
fn normalise_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_space = false;
    let mut newline_count: u32 = 0;

    for ch in text.chars() {
        if ch == '\n' || ch == '\r' {
            newline_count += 1;
            prev_was_space = false;
            if newline_count <= 2 {
                result.push('\n');
            }
        } else if ch.is_whitespace() {
            newline_count = 0;
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            newline_count = 0;
            prev_was_space = false;
            result.push(ch);
        }
    }

    result
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_owned()
}
