use crate::shingle::build_shingles;
use crate::tokenize::Tokenizer;
use dupscan_core::config::ShingleConfig;
use dupscan_core::SimilarityResult;
use std::collections::HashSet;

/// Best-effort canonical form of a result URL for deduplication:
/// - normalize scheme/host casing
/// - drop fragments
/// - preserve query (it can select a different document)
pub fn canonicalize_url_for_compare(url: &str) -> String {
    if let Ok(mut u) = url::Url::parse(url.trim()) {
        u.set_fragment(None);
        return u.to_string();
    }
    url.trim().to_string()
}

/// `|a ∩ b|`, probing the larger set with the members of the smaller one.
pub fn intersection_count(a: &HashSet<String>, b: &HashSet<String>) -> usize {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().filter(|s| large.contains(*s)).count()
}

/// `round(max(jaccard, containment) * 100)`, clamped to `0..=100`.
pub fn score_of(jaccard: f64, containment: f64) -> u8 {
    let m = jaccard.max(containment);
    if !m.is_finite() || m <= 0.0 {
        return 0;
    }
    (m * 100.0).round().min(100.0) as u8
}

pub fn similarity(a: &HashSet<String>, b: &HashSet<String>) -> SimilarityResult {
    if a.is_empty() || b.is_empty() {
        return SimilarityResult::ZERO;
    }
    let inter = intersection_count(a, b);
    if inter == 0 {
        return SimilarityResult::ZERO;
    }
    let inter_f = inter as f64;
    let union = (a.len() + b.len() - inter) as f64;
    let jaccard = inter_f / union;
    let containment = inter_f / a.len().min(b.len()) as f64;
    SimilarityResult {
        jaccard,
        containment,
        score: score_of(jaccard, containment),
    }
}

/// Tokenize, shingle and score two raw texts (HTML or plain).
pub fn text_similarity(
    a: &str,
    b: &str,
    tokenizer: &Tokenizer,
    cfg: &ShingleConfig,
) -> SimilarityResult {
    let sa = build_shingles(&tokenizer.tokenize(a), cfg.size, cfg.max_shingles);
    let sb = build_shingles(&tokenizer.tokenize(b), cfg.size, cfg.max_shingles);
    similarity(&sa, &sb)
}
