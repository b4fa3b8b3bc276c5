//! HTML-to-text and token normalization.
//!
//! Everything here is lossy on purpose: tokens are only used as matching keys,
//! never for display.

use dupscan_core::config::TokenizerConfig;
use html_scraper::{ElementRef, Html};
use std::collections::HashSet;

/// Subtrees that never contribute visible text.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "title", "svg", "iframe",
];

/// Elements that end a line of text (used for sentence extraction).
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "td", "th", "tr", "ul",
];

#[derive(Debug, Clone)]
pub struct Tokenizer {
    min_chars: usize,
    stopwords: HashSet<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TokenizerConfig::default())
    }
}

impl Tokenizer {
    pub fn new(cfg: &TokenizerConfig) -> Self {
        Self {
            min_chars: cfg.min_token_chars,
            stopwords: cfg
                .stopwords
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Tokenize raw HTML or plain text.
    pub fn tokenize(&self, input: &str) -> Vec<String> {
        self.tokenize_text(&visible_text(input))
    }

    /// Tokenize text that is already free of markup (snippets, sentences).
    pub fn tokenize_text(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let cleaned: String = lower
            .chars()
            .map(|c| if is_token_char(c) { c } else { ' ' })
            .collect();
        cleaned
            .split_whitespace()
            .map(|t| t.trim_matches('-'))
            .filter(|t| t.chars().count() >= self.min_chars && !self.stopwords.contains(*t))
            .map(str::to_string)
            .collect()
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_lowercase()
        || c.is_ascii_digit()
        || c == '-'
        || (('\u{00C0}'..='\u{024F}').contains(&c) && c != '×' && c != '÷')
}

/// Visible text of an HTML body (or plain text), one line per block element.
///
/// Whitespace inside a line is collapsed; empty lines are dropped.
pub fn visible_text(input: &str) -> String {
    let raw = if input.contains('<') {
        let doc = Html::parse_document(input);
        let mut out = String::with_capacity(input.len() / 2);
        collect_text(doc.root_element(), &mut out);
        out
    } else {
        decode_entities(input)
    };

    let mut lines = Vec::new();
    for line in raw.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            lines.push(collapsed);
        }
    }
    lines.join("\n")
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(t) = child.value().as_text() {
            out.push_str(t);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if SKIP_TAGS.contains(&name) {
                continue;
            }
            // Element boundaries separate words: blocks end a line, inline tags add a space.
            let sep = if BLOCK_TAGS.contains(&name) { '\n' } else { ' ' };
            out.push(sep);
            collect_text(child_el, out);
            out.push(sep);
        }
    }
}

/// Decode the handful of entities that show up in plain-text exports and search snippets.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let Some(end) = tail.find(';').filter(|&e| e <= 10) else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };
        let name = &tail[1..end];
        let decoded = match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" | "#39" => Some('\''),
            "nbsp" => Some(' '),
            _ => name
                .strip_prefix("#x")
                .or_else(|| name.strip_prefix("#X"))
                .and_then(|h| u32::from_str_radix(h, 16).ok())
                .or_else(|| name.strip_prefix('#').and_then(|d| d.parse::<u32>().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
