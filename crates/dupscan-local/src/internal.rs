//! Cross-page duplicate detection inside one site corpus.
//!
//! All pairs are compared (`O(n²)`); corpora are one site's pages, so this stays cheap.

use crate::profile::PageProfile;
use crate::similarity::similarity;
use dupscan_core::config::InternalConfig;
use dupscan_core::{InternalMatch, PageId};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type InternalMatches = BTreeMap<PageId, Vec<InternalMatch>>;

/// Rank: risk desc, containment desc, jaccard desc, then page id for a stable order.
fn rank(a: &InternalMatch, b: &InternalMatch) -> Ordering {
    b.risk_score
        .cmp(&a.risk_score)
        .then_with(|| b.containment.total_cmp(&a.containment))
        .then_with(|| b.jaccard.total_cmp(&a.jaccard))
        .then_with(|| a.other_page_id.cmp(&b.other_page_id))
}

fn match_for(other: &PageProfile, risk_score: u8, jaccard: f64, containment: f64) -> InternalMatch {
    InternalMatch {
        other_page_id: other.id.clone(),
        other_title: other.title.clone(),
        other_url: other.url.clone(),
        risk_score,
        jaccard,
        containment,
    }
}

/// Every page id of the corpus is present in the result (possibly with no matches).
pub fn detect_internal_duplicates(
    profiles: &[Arc<PageProfile>],
    cfg: &InternalConfig,
) -> InternalMatches {
    let mut out: InternalMatches = profiles
        .iter()
        .map(|p| (p.id.clone(), Vec::new()))
        .collect();

    let eligible: Vec<&PageProfile> = profiles
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| p.token_count() >= cfg.min_tokens && !p.shingles.is_empty())
        .collect();

    let mut compared = 0usize;
    for (i, a) in eligible.iter().enumerate() {
        for b in &eligible[i + 1..] {
            // Records sharing an id report into one entry; a page never matches itself.
            if a.id == b.id {
                continue;
            }
            compared += 1;
            let r = similarity(&a.shingles, &b.shingles);
            if r.jaccard < cfg.min_jaccard && r.containment < cfg.min_containment {
                continue;
            }
            if r.score < cfg.min_risk_score {
                continue;
            }
            if let Some(v) = out.get_mut(&a.id) {
                v.push(match_for(b, r.score, r.jaccard, r.containment));
            }
            if let Some(v) = out.get_mut(&b.id) {
                v.push(match_for(a, r.score, r.jaccard, r.containment));
            }
        }
    }

    for v in out.values_mut() {
        v.sort_by(rank);
        v.truncate(cfg.max_matches);
    }

    tracing::debug!(
        pages = profiles.len(),
        eligible = eligible.len(),
        pairs = compared,
        "internal duplicate pass done"
    );
    out
}
