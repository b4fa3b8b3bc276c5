//! Picks the search queries used to look for copies of a page on the web.

use crate::profile::PageProfile;
use crate::tokenize::Tokenizer;
use dupscan_core::config::ExternalConfig;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOrigin {
    Sentence,
    TokenWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedQuery {
    /// Human-readable query (the sentence, or the joined token window).
    pub text: String,
    /// Normalized tokens of `text`, used for scoring results.
    pub tokens: Vec<String>,
    pub origin: QueryOrigin,
}

impl ExtractedQuery {
    /// The string sent to the provider.
    pub fn search_text(&self, quote: bool) -> String {
        if quote && self.origin == QueryOrigin::Sentence {
            format!("\"{}\"", self.text.replace('"', ""))
        } else {
            self.text.clone()
        }
    }

    fn unique_tokens(&self) -> usize {
        self.tokens.iter().collect::<HashSet<_>>().len()
    }
}

/// Split visible text into sentences at `.`/`!`/`?` followed by whitespace, and at line breaks.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\n' {
            push_sentence(&mut out, &mut cur);
            continue;
        }
        cur.push(ch);
        if matches!(ch, '.' | '!' | '?') && chars.peek().map_or(true, |c| c.is_whitespace()) {
            push_sentence(&mut out, &mut cur);
        }
    }
    push_sentence(&mut out, &mut cur);
    out
}

fn push_sentence(out: &mut Vec<String>, cur: &mut String) {
    let s = cur.trim();
    if !s.is_empty() {
        out.push(s.to_string());
    }
    cur.clear();
}

/// Up to `cfg.queries_per_page` distinctive queries for one page.
///
/// Sentences of the configured length with enough tokens come first, ranked by
/// distinct-token count; token windows fill the remaining slots.
///
/// Fallback windows advance by their full width (`fallback_window_tokens`) rather than
/// sliding one token at a time, so the fallback queries never overlap.
pub fn extract_queries(
    profile: &PageProfile,
    tokenizer: &Tokenizer,
    cfg: &ExternalConfig,
) -> Vec<ExtractedQuery> {
    let want = cfg.queries_per_page;
    if want == 0 {
        return Vec::new();
    }

    let mut sentences: Vec<ExtractedQuery> = split_sentences(&profile.text)
        .into_iter()
        .filter(|s| {
            let n = s.chars().count();
            n >= cfg.sentence_min_chars && n <= cfg.sentence_max_chars
        })
        .map(|s| ExtractedQuery {
            tokens: tokenizer.tokenize_text(&s),
            text: s,
            origin: QueryOrigin::Sentence,
        })
        .filter(|q| q.tokens.len() >= cfg.sentence_min_tokens)
        .collect();
    // Stable sort keeps document order among equally distinctive sentences.
    sentences.sort_by_key(|q| std::cmp::Reverse(q.unique_tokens()));

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for q in sentences {
        if out.len() >= want {
            break;
        }
        if seen.insert(q.tokens.join(" ")) {
            out.push(q);
        }
    }
    if out.len() >= want {
        return out;
    }

    let w = cfg.fallback_window_tokens.max(1);
    let toks = &profile.tokens;
    let mut windows: Vec<ExtractedQuery> = if toks.len() < w {
        if toks.is_empty() {
            Vec::new()
        } else {
            vec![window_query(toks)]
        }
    } else {
        (0..=toks.len() - w)
            .step_by(w)
            .map(|start| window_query(&toks[start..start + w]))
            .collect()
    };
    windows.sort_by_key(|q| std::cmp::Reverse(q.unique_tokens()));
    for q in windows {
        if out.len() >= want {
            break;
        }
        if seen.insert(q.tokens.join(" ")) {
            out.push(q);
        }
    }
    out
}

fn window_query(tokens: &[String]) -> ExtractedQuery {
    ExtractedQuery {
        text: tokens.join(" "),
        tokens: tokens.to_vec(),
        origin: QueryOrigin::TokenWindow,
    }
}
