use crate::shingle::build_shingles;
use crate::tokenize::{visible_text, Tokenizer};
use dupscan_core::config::ShingleConfig;
use dupscan_core::{PageId, PageRecord};
use std::collections::HashSet;
use std::sync::Arc;

/// Per-page working set for one scan: built once, then shared read-only.
#[derive(Debug, Clone)]
pub struct PageProfile {
    pub id: PageId,
    pub title: String,
    pub url: String,
    /// Visible text, one line per block element (input for sentence extraction).
    pub text: String,
    pub tokens: Vec<String>,
    pub shingles: HashSet<String>,
}

impl PageProfile {
    pub fn build(page: &PageRecord, tokenizer: &Tokenizer, cfg: &ShingleConfig) -> Self {
        let text = visible_text(&page.html_body);
        let tokens = tokenizer.tokenize_text(&text);
        let shingles = build_shingles(&tokens, cfg.size, cfg.max_shingles);
        Self {
            id: page.id.clone(),
            title: page.title.trim().to_string(),
            url: page.url.trim().to_string(),
            text,
            tokens,
            shingles,
        }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

pub fn build_profiles(
    pages: &[PageRecord],
    tokenizer: &Tokenizer,
    cfg: &ShingleConfig,
) -> Vec<Arc<PageProfile>> {
    pages
        .iter()
        .map(|p| Arc::new(PageProfile::build(p, tokenizer, cfg)))
        .collect()
}
