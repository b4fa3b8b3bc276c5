//! Site scan: profiles, internal duplicates, optional web search, per-page issues.

use crate::external::{detect_external_plagiarism, ExternalStats};
use crate::internal::detect_internal_duplicates;
use crate::profile::{build_profiles, PageProfile};
use crate::tokenize::Tokenizer;
use dupscan_core::config::SeverityConfig;
use dupscan_core::{
    ExternalMatch, InternalMatch, Issue, IssueKind, PageId, PageRecord, ScanConfig,
    SearchProvider, Severity,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Instant;

#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub page_id: PageId,
    pub url: String,
    pub title: String,
    pub token_count: usize,
    pub internal_matches: Vec<InternalMatch>,
    pub external_matches: Vec<ExternalMatch>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub pages: usize,
    pub internal_eligible: usize,
    pub pages_with_issues: usize,
    /// Name of the search provider, `None` when the web check did not run.
    pub provider: Option<String>,
    pub external: Option<ExternalStats>,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Same order as the input pages.
    pub pages: Vec<PageReport>,
    pub stats: ScanStats,
}

fn severity_for(score: u8, cfg: &SeverityConfig) -> Severity {
    if score >= cfg.critical_score {
        Severity::Critical
    } else {
        Severity::Warning
    }
}

fn label(title: &str, url: &str, id: &PageId) -> String {
    if !title.is_empty() {
        title.to_string()
    } else if !url.is_empty() {
        url.to_string()
    } else {
        format!("page {id}")
    }
}

/// Turn one page's match lists into issues. Lists are expected ranked best-first.
pub fn analyze_page(
    profile: &PageProfile,
    internal: &[InternalMatch],
    external: &[ExternalMatch],
    cfg: &SeverityConfig,
) -> Vec<Issue> {
    let mut issues = Vec::new();

    if let Some(top) = internal.first() {
        let others = internal
            .iter()
            .map(|m| label(&m.other_title, &m.other_url, &m.other_page_id))
            .collect::<Vec<_>>()
            .join(", ");
        issues.push(Issue {
            kind: IssueKind::DuplicateContent,
            severity: severity_for(top.risk_score, cfg),
            title: format!(
                "Duplicate content with {}",
                label(&top.other_title, &top.other_url, &top.other_page_id)
            ),
            description: format!(
                "{} overlaps with {} other page(s) on this site: {others}. Highest overlap {}% (containment {:.2}, jaccard {:.2}).",
                label(&profile.title, &profile.url, &profile.id),
                internal.len(),
                top.risk_score,
                top.containment,
                top.jaccard
            ),
            score: top.risk_score,
        });
    }

    if let Some(top) = external.first() {
        issues.push(Issue {
            kind: IssueKind::ExternalPlagiarism,
            severity: severity_for(top.score, cfg),
            title: format!("Text found on {}", top.source_url),
            description: format!(
                "{} external source(s) contain text from {}. Best match {}% via {} for query \"{}\".",
                external.len(),
                label(&profile.title, &profile.url, &profile.id),
                top.score,
                top.provider,
                top.query
            ),
            score: top.score,
        });
    }

    issues
}

/// Scan a site corpus. Never fails; a missing provider or `external.enabled = false`
/// skips the web check.
pub async fn scan_site(
    pages: &[PageRecord],
    provider: Option<&dyn SearchProvider>,
    cfg: &ScanConfig,
) -> ScanReport {
    let t0 = Instant::now();
    let tokenizer = Tokenizer::new(&cfg.tokenizer);
    let profiles = build_profiles(pages, &tokenizer, &cfg.shingles);

    let internal = detect_internal_duplicates(&profiles, &cfg.internal);

    let site_hosts: Vec<String> = pages
        .iter()
        .filter_map(PageRecord::host)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut stats = ScanStats {
        pages: pages.len(),
        internal_eligible: profiles
            .iter()
            .filter(|p| p.token_count() >= cfg.internal.min_tokens)
            .count(),
        ..ScanStats::default()
    };

    let external = match provider {
        Some(p) if cfg.external.enabled => {
            let outcome =
                detect_external_plagiarism(&profiles, &site_hosts, p, &tokenizer, &cfg.external)
                    .await;
            stats.provider = Some(p.name().to_string());
            stats.external = Some(outcome.stats);
            outcome.matches
        }
        _ => {
            tracing::debug!("external plagiarism check skipped");
            Default::default()
        }
    };

    let reports: Vec<PageReport> = profiles
        .iter()
        .map(|profile| {
            let internal_matches = internal.get(&profile.id).cloned().unwrap_or_default();
            let external_matches = external.get(&profile.id).cloned().unwrap_or_default();
            let issues = analyze_page(
                profile,
                &internal_matches,
                &external_matches,
                &cfg.severity,
            );
            PageReport {
                page_id: profile.id.clone(),
                url: profile.url.clone(),
                title: profile.title.clone(),
                token_count: profile.token_count(),
                internal_matches,
                external_matches,
                issues,
            }
        })
        .collect();

    stats.pages_with_issues = reports.iter().filter(|r| !r.issues.is_empty()).count();
    stats.elapsed_ms = t0.elapsed().as_millis();
    tracing::info!(
        pages = stats.pages,
        with_issues = stats.pages_with_issues,
        elapsed_ms = stats.elapsed_ms as u64,
        "scan done"
    );

    ScanReport {
        pages: reports,
        stats,
    }
}
