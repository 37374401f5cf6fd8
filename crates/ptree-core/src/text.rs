//! Text helpers for product keys and TeX output.
//!
//! Product keys read from the modeling tool are free text; the tree uses a
//! sanitized form of them as node keys and TikZ node names. Display strings
//! are escaped for TeX separately, and comment bodies arrive as HTML which is
//! converted to LaTeX markup.

use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\s*(/?)\s*([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").expect("tag pattern is valid")
});

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href\s*=\s*["']([^"']*)["']"#).expect("href pattern is valid")
});

static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#x?[0-9a-fA-F]+|[a-zA-Z]+);").expect("entity pattern is valid"));

/// Produce a tree key from free text.
///
/// Whitespace and the characters `( ) " _ . &` are removed. The operation is
/// idempotent, so keys read back from a CSV snapshot map to themselves.
///
/// # Examples
///
/// ```
/// # use ptree_core::text::sanitize_id;
/// assert_eq!(sanitize_id("DM Science (pipelines)"), "DMSciencepipelines");
/// assert_eq!(sanitize_id("a_b.c&d"), "abcd");
/// ```
pub fn sanitize_id(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | '_' | '.' | '&'))
        .collect()
}

/// Escape a display string for TeX.
///
/// Underscores and ampersands are escaped, and slashes gain a trailing space
/// so long paths can break inside narrow node boxes.
pub fn sanitize_tex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '_' => out.push_str("\\_"),
            '/' => out.push_str("/ "),
            '&' => out.push_str("\\& "),
            _ => out.push(c),
        }
    }
    out
}

/// Split an explicit ordering prefix off a source element name.
///
/// Source names such as `"02. Data Facility"` carry their sibling order as a
/// numeric prefix. Returns the parsed leading integer (if any) and the name
/// with every leading digit, `.`, `-` and space removed.
pub fn split_numeric_prefix(name: &str) -> (Option<u32>, &str) {
    let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    let index = digits.parse().ok();
    let rest = name.trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | '-' | ' '));
    (index, rest)
}

/// Convert an HTML comment body to LaTeX markup.
///
/// Paragraphs, line breaks, bold/italic spans, lists and links are mapped to
/// their LaTeX counterparts; any other tag is dropped. Text content is
/// entity-decoded, TeX-escaped and whitespace-collapsed.
pub fn html_to_latex(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut open = Vec::new();
    let mut last = 0;

    for caps in TAG.captures_iter(html) {
        let whole = caps.get(0).expect("group 0 always matches");
        push_text(&mut out, &html[last..whole.start()]);
        last = whole.end();

        let closing = !caps[1].is_empty();
        let name = caps[2].to_ascii_lowercase();
        let attrs = &caps[3];
        push_tag(&mut out, &mut open, &name, closing, attrs);
    }
    push_text(&mut out, &html[last..]);
    close_spans(&mut out, &mut open, 0);

    tidy_blank_lines(&out)
}

/// Tags that open a TeX group and must be closed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    Bold,
    Italic,
    Link,
}

impl Span {
    fn from_tag(name: &str) -> Option<Self> {
        match name {
            "b" | "strong" => Some(Self::Bold),
            "i" | "em" => Some(Self::Italic),
            "a" => Some(Self::Link),
            _ => None,
        }
    }
}

fn push_tag(out: &mut String, open: &mut Vec<Span>, name: &str, closing: bool, attrs: &str) {
    if let Some(span) = Span::from_tag(name) {
        if closing {
            // Unmatched closers are dropped; crossed spans close up to their opener.
            if let Some(at) = open.iter().rposition(|&o| o == span) {
                close_spans(out, open, at);
            }
            return;
        }
        match span {
            Span::Bold => out.push_str("\\textbf{"),
            Span::Italic => out.push_str("\\textit{"),
            Span::Link => {
                let href = HREF
                    .captures(attrs)
                    .map(|c| c[1].to_string())
                    .unwrap_or_default();
                out.push_str("\\href{");
                out.push_str(&href);
                out.push_str("}{");
            }
        }
        open.push(span);
        return;
    }

    if closing && matches!(name, "p" | "div" | "li" | "ul" | "ol") {
        close_spans(out, open, 0);
    }
    match (name, closing) {
        ("p" | "div", false) => {}
        ("p" | "div", true) => out.push_str("\n\n"),
        ("br", _) => out.push_str("\\\\\n"),
        ("ul", false) => out.push_str("\n\\begin{itemize}\n"),
        ("ul", true) => out.push_str("\\end{itemize}\n"),
        ("ol", false) => out.push_str("\n\\begin{enumerate}\n"),
        ("ol", true) => out.push_str("\\end{enumerate}\n"),
        ("li", false) => out.push_str("\\item "),
        ("li", true) => out.push('\n'),
        _ => {}
    }
}

fn close_spans(out: &mut String, open: &mut Vec<Span>, from: usize) {
    for _ in open.drain(from..) {
        out.push('}');
    }
}

fn push_text(out: &mut String, raw: &str) {
    if raw.is_empty() {
        return;
    }
    let decoded = decode_entities(raw);
    let mut pending_space = false;
    for c in decoded.chars() {
        if c.is_whitespace() && c != '\u{a0}' {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() && !out.ends_with(['\n', ' ', '{']) {
            out.push(' ');
        }
        pending_space = false;
        push_escaped(out, c);
    }
    if pending_space && !out.is_empty() && !out.ends_with(['\n', ' ', '{']) {
        out.push(' ');
    }
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '\\' => out.push_str("\\textbackslash{}"),
        '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
            out.push('\\');
            out.push(c);
        }
        '~' => out.push_str("\\textasciitilde{}"),
        '^' => out.push_str("\\textasciicircum{}"),
        '\u{a0}' => out.push('~'),
        _ => out.push(c),
    }
}

fn decode_entities(raw: &str) -> String {
    ENTITY
        .replace_all(raw, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => {
                    entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                }
                _ => None,
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Trim trailing spaces on every line and collapse runs of blank lines.
fn tidy_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.trim().lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    out
}
