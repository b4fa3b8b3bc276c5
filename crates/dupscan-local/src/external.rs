//! Web-plagiarism detection: search distinctive passages of a page and score the hits.
//!
//! The pipeline never fails. A provider error or timeout only means that one
//! (page, query) task contributes no results.

use crate::profile::PageProfile;
use crate::queries::{extract_queries, ExtractedQuery};
use crate::similarity::canonicalize_url_for_compare;
use crate::tokenize::{visible_text, Tokenizer};
use dupscan_core::config::ExternalConfig;
use dupscan_core::{
    host_matches, host_of, ExternalMatch, PageId, SearchProvider, SearchQuery, SearchResponse,
};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Score floor when the whole normalized query occurs literally in the hit.
pub const EXACT_SUBSTRING_FLOOR: u8 = 88;
/// Score floor for a contiguous 7-token query phrase in the hit.
pub const PHRASE7_FLOOR: u8 = 68;
/// Score floor for a contiguous 6-token query phrase in the hit.
pub const PHRASE6_FLOOR: u8 = 56;

pub type ExternalMatches = BTreeMap<PageId, Vec<ExternalMatch>>;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExternalStats {
    pub pages_checked: usize,
    pub queries_sent: usize,
    pub failed_queries: usize,
    pub results_seen: usize,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Default)]
pub struct ExternalOutcome {
    /// One entry per searched page (possibly empty).
    pub matches: ExternalMatches,
    pub stats: ExternalStats,
}

/// Pages worth searching: long enough, longest first, at most `cfg.max_pages`.
pub fn select_candidates<'a>(
    profiles: &'a [Arc<PageProfile>],
    cfg: &ExternalConfig,
) -> Vec<&'a Arc<PageProfile>> {
    let mut v: Vec<&Arc<PageProfile>> = profiles
        .iter()
        .filter(|p| p.token_count() >= cfg.min_tokens)
        .collect();
    v.sort_by_key(|p| Reverse(p.token_count()));
    v.truncate(cfg.max_pages);
    v
}

fn contains_phrase(query: &[String], candidate: &[String], n: usize) -> bool {
    if n == 0 || query.len() < n || candidate.len() < n {
        return false;
    }
    let windows: HashSet<&[String]> = candidate.windows(n).collect();
    query.windows(n).any(|w| windows.contains(w))
}

/// Token-overlap score of a search hit against a query, boosted by exact-phrase evidence.
pub fn score_candidate(query: &[String], candidate: &[String], exact_min_chars: usize) -> u8 {
    if query.is_empty() || candidate.is_empty() {
        return 0;
    }
    let q: HashSet<&str> = query.iter().map(String::as_str).collect();
    let r: HashSet<&str> = candidate.iter().map(String::as_str).collect();
    let overlap = q.iter().filter(|t| r.contains(*t)).count();
    let mut score = ((overlap as f64 / q.len() as f64) * 100.0).round() as u8;

    let q_norm = query.join(" ");
    let r_norm = format!(" {} ", candidate.join(" "));
    if q_norm.chars().count() >= exact_min_chars && r_norm.contains(&format!(" {q_norm} ")) {
        score = score.max(EXACT_SUBSTRING_FLOOR);
    } else if contains_phrase(query, candidate, 7) {
        score = score.max(PHRASE7_FLOOR);
    } else if contains_phrase(query, candidate, 6) {
        score = score.max(PHRASE6_FLOOR);
    }
    score.min(100)
}

/// True for hits on the site itself, on the search engine's own hosts, or without a usable host.
pub fn is_excluded(url: &str, site_hosts: &[String], provider_hosts: &[&str]) -> bool {
    let Some(host) = host_of(url) else {
        return true;
    };
    site_hosts.iter().any(|h| host_matches(&host, h))
        || provider_hosts.iter().any(|h| host_matches(&host, h))
}

fn clean_snippet(s: &str) -> String {
    visible_text(s).replace('\n', " ")
}

async fn run_search(
    provider: &dyn SearchProvider,
    q: &SearchQuery,
    timeout: Duration,
) -> Option<SearchResponse> {
    match tokio::time::timeout(timeout, provider.search(q)).await {
        Ok(Ok(resp)) => Some(resp),
        Ok(Err(e)) => {
            tracing::warn!(provider = provider.name(), error = %e, "search failed, no results for this query");
            None
        }
        Err(_) => {
            tracing::warn!(
                provider = provider.name(),
                timeout_ms = timeout.as_millis() as u64,
                "search timed out, no results for this query"
            );
            None
        }
    }
}

pub async fn detect_external_plagiarism(
    profiles: &[Arc<PageProfile>],
    site_hosts: &[String],
    provider: &dyn SearchProvider,
    tokenizer: &Tokenizer,
    cfg: &ExternalConfig,
) -> ExternalOutcome {
    let t0 = Instant::now();
    let mut outcome = ExternalOutcome::default();

    let candidates = select_candidates(profiles, cfg);
    let mut tasks: Vec<(&PageProfile, ExtractedQuery)> = Vec::new();
    for &p in &candidates {
        let page: &PageProfile = p;
        outcome.matches.insert(page.id.clone(), Vec::new());
        for q in extract_queries(page, tokenizer, cfg) {
            tasks.push((page, q));
        }
    }
    outcome.stats.pages_checked = candidates.len();
    outcome.stats.queries_sent = tasks.len();

    let timeout = Duration::from_millis(cfg.timeout_ms);
    let responses: Vec<(&PageProfile, ExtractedQuery, Option<SearchResponse>)> =
        stream::iter(tasks)
            .map(|(page, query)| async move {
                let sq = SearchQuery {
                    query: query.search_text(cfg.quote_queries),
                    max_results: Some(cfg.max_results),
                    exclude_hosts: site_hosts.to_vec(),
                    language: None,
                    country: None,
                    timeout_ms: Some(cfg.timeout_ms),
                };
                tracing::debug!(page = %page.id, query = %sq.query, "external search");
                let resp = run_search(provider, &sq, timeout).await;
                (page, query, resp)
            })
            .buffer_unordered(cfg.concurrency.max(1))
            .collect()
            .await;

    let provider_hosts = provider.own_hosts();
    let mut best: BTreeMap<PageId, BTreeMap<String, ExternalMatch>> = BTreeMap::new();
    for (page, query, resp) in responses {
        let Some(resp) = resp else {
            outcome.stats.failed_queries += 1;
            continue;
        };
        for r in resp.results.into_iter().take(cfg.max_results) {
            outcome.stats.results_seen += 1;
            if is_excluded(&r.url, site_hosts, provider_hosts) {
                continue;
            }
            let title = clean_snippet(r.title.as_deref().unwrap_or(""));
            let snippet = clean_snippet(r.snippet.as_deref().unwrap_or(""));
            let cand = tokenizer.tokenize_text(&format!("{title} {snippet}"));
            let score = score_candidate(&query.tokens, &cand, cfg.exact_min_chars);
            if score < cfg.min_score {
                continue;
            }

            // Canonical form is only the dedup key; the report keeps the URL as returned.
            let key = canonicalize_url_for_compare(&r.url);
            let m = ExternalMatch {
                source_url: r.url.trim().to_string(),
                source_title: title,
                source_snippet: snippet,
                provider: if r.source.is_empty() {
                    resp.provider.clone()
                } else {
                    r.source
                },
                query: query.text.clone(),
                score,
            };
            let by_url = best.entry(page.id.clone()).or_default();
            // Completion order is arbitrary; break score ties on the query text.
            let keep_prev = by_url
                .get(&key)
                .is_some_and(|prev| (prev.score, Reverse(&prev.query)) >= (m.score, Reverse(&m.query)));
            if !keep_prev {
                by_url.insert(key, m);
            }
        }
    }

    for (id, by_url) in best {
        let mut v: Vec<ExternalMatch> = by_url.into_values().collect();
        v.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.source_url.cmp(&b.source_url))
        });
        v.truncate(cfg.max_matches);
        outcome.matches.insert(id, v);
    }

    outcome.stats.elapsed_ms = t0.elapsed().as_millis();
    tracing::info!(
        provider = provider.name(),
        pages = outcome.stats.pages_checked,
        queries = outcome.stats.queries_sent,
        failed = outcome.stats.failed_queries,
        "external plagiarism pass done"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::build_profiles;
    use dupscan_core::config::ShingleConfig;
    use dupscan_core::{Error, PageRecord, Result, SearchResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Responder = fn(&SearchQuery) -> Result<Vec<SearchResult>>;

    struct FakeProvider {
        respond: Responder,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeProvider {
        fn new(respond: Responder, delay_ms: u64) -> Self {
            Self {
                respond,
                delay: Duration::from_millis(delay_ms),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl SearchProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn own_hosts(&self) -> &'static [&'static str] {
            &["search.fake"]
        }

        async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let cur = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(cur, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(SearchResponse {
                results: (self.respond)(q)?,
                provider: "fake".to_string(),
                timings_ms: BTreeMap::new(),
            })
        }
    }

    fn hit(url: &str, snippet: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: Some("Overgenomen artikel".to_string()),
            snippet: Some(snippet.to_string()),
            source: "fake".to_string(),
        }
    }

    /// `sentences` sentences of 12 unique words each; every sentence qualifies as a query.
    fn long_page(id: &str, sentences: usize) -> PageRecord {
        let body: Vec<String> = (0..sentences)
            .map(|s| {
                let words: Vec<String> =
                    (0..12).map(|w| format!("{id}zin{s}woord{w}")).collect();
                format!("<p>{}.</p>", words.join(" "))
            })
            .collect();
        PageRecord {
            id: PageId::from(id),
            url: format!("https://voorbeeld.nl/{id}"),
            title: id.to_string(),
            html_body: body.concat(),
        }
    }

    fn short_page(id: &str) -> PageRecord {
        PageRecord {
            html_body: "<p>Korte pagina over tuinhuisjes en schuttingen.</p>".to_string(),
            ..long_page(id, 0)
        }
    }

    fn profiles(pages: &[PageRecord]) -> Vec<Arc<PageProfile>> {
        build_profiles(pages, &Tokenizer::default(), &ShingleConfig::default())
    }

    fn site() -> Vec<String> {
        vec!["voorbeeld.nl".to_string()]
    }

    fn echo_copies(q: &SearchQuery) -> Result<Vec<SearchResult>> {
        Ok(vec![
            hit("https://kopie-a.example/artikel#reacties", &q.query),
            hit("https://kopie-b.example/artikel", &q.query),
            hit("https://voorbeeld.nl/eigen-pagina", &q.query),
            hit("https://www.search.fake/redirect", &q.query),
            hit("https://kopie-c.example/artikel", &q.query),
            hit("https://kopie-d.example/artikel", &q.query),
        ])
    }

    #[test]
    fn exact_substring_gets_the_high_floor() {
        let t = Tokenizer::default();
        let q = t.tokenize_text("zonnepanelen leveren duurzame stroom voor boerderijen");
        let mut r = t.tokenize_text("tips over");
        r.extend(q.iter().cloned());
        r.extend(t.tokenize_text("en meer nieuws over energietransitie"));
        assert_eq!(score_candidate(&q, &r, 45), 100);

        // Substring evidence alone lifts a weak overlap to the floor.
        let long_q: Vec<String> = (0..20).map(|i| format!("begrip{i}")).collect();
        let snippet: Vec<String> = long_q[..7].to_vec();
        let s = score_candidate(&long_q, &snippet, 45);
        assert_eq!(s, PHRASE7_FLOOR);
        let six: Vec<String> = long_q[..6].to_vec();
        assert_eq!(score_candidate(&long_q, &six, 45), PHRASE6_FLOOR);
    }

    #[test]
    fn scattered_overlap_scores_low() {
        let q: Vec<String> = (0..20).map(|i| format!("begrip{i}")).collect();
        let r: Vec<String> = q.iter().step_by(3).cloned().collect();
        // 7 of 20 tokens, never 6 in a row.
        assert_eq!(score_candidate(&q, &r, 45), 35);
        assert!(score_candidate(&q, &r, 45) < ExternalConfig::default().min_score);
        assert_eq!(score_candidate(&[], &r, 45), 0);
    }

    #[test]
    fn excludes_site_and_provider_hosts() {
        let site = site();
        assert!(is_excluded("https://blog.voorbeeld.nl/x", &site, &[]));
        assert!(is_excluded("https://duckduckgo.com/y.js?ad=1", &site, &["duckduckgo.com"]));
        assert!(is_excluded("not a url", &site, &[]));
        assert!(!is_excluded("https://andere-site.nl/x", &site, &["duckduckgo.com"]));
    }

    #[test]
    fn candidates_are_long_pages_longest_first_and_capped() {
        let pages = vec![
            long_page("a", 12),
            short_page("kort"),
            long_page("b", 20),
            long_page("c", 15),
        ];
        let ps = profiles(&pages);
        let cfg = ExternalConfig {
            max_pages: 2,
            ..ExternalConfig::default()
        };
        let ids: Vec<&str> = select_candidates(&ps, &cfg)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn copies_are_found_filtered_deduped_and_capped() {
        let ps = profiles(&[long_page("a", 15), short_page("kort")]);
        let provider = FakeProvider::new(echo_copies, 0);
        let out = detect_external_plagiarism(
            &ps,
            &site(),
            &provider,
            &Tokenizer::default(),
            &ExternalConfig::default(),
        )
        .await;

        assert_eq!(out.stats.pages_checked, 1);
        assert_eq!(out.stats.queries_sent, 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(!out.matches.contains_key(&PageId::from("kort")));

        let ms = &out.matches[&PageId::from("a")];
        let urls: Vec<&str> = ms.iter().map(|m| m.source_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://kopie-a.example/artikel#reacties",
                "https://kopie-b.example/artikel",
                "https://kopie-c.example/artikel",
            ]
        );
        assert!(ms.iter().all(|m| m.score == 100 && m.provider == "fake"));
        // Both queries hit the same URLs; the tie keeps the smaller query text.
        assert!(ms[0].query.starts_with("azin0woord0 "));
    }

    #[tokio::test]
    async fn fragment_variants_collapse_but_keep_the_returned_url() {
        fn fragments(q: &SearchQuery) -> Result<Vec<SearchResult>> {
            Ok(vec![
                hit("https://kopie.example/artikel#inleiding", &q.query),
                hit("https://KOPIE.example/artikel#slot", &q.query),
            ])
        }
        let ps = profiles(&[long_page("a", 15)]);
        let provider = FakeProvider::new(fragments, 0);
        let out = detect_external_plagiarism(
            &ps,
            &site(),
            &provider,
            &Tokenizer::default(),
            &ExternalConfig::default(),
        )
        .await;

        let ms = &out.matches[&PageId::from("a")];
        assert_eq!(ms.len(), 1);
        assert_eq!(ms[0].source_url, "https://kopie.example/artikel#inleiding");
    }

    #[tokio::test]
    async fn failing_provider_yields_empty_lists() {
        fn fail(_: &SearchQuery) -> Result<Vec<SearchResult>> {
            Err(Error::Search("HTTP 500".to_string()))
        }
        let ps = profiles(&[long_page("a", 15), long_page("b", 15)]);
        let provider = FakeProvider::new(fail, 0);
        let out = detect_external_plagiarism(
            &ps,
            &site(),
            &provider,
            &Tokenizer::default(),
            &ExternalConfig::default(),
        )
        .await;
        assert_eq!(out.matches.len(), 2);
        assert!(out.matches.values().all(|v| v.is_empty()));
        assert_eq!(out.stats.failed_queries, 4);
    }

    #[tokio::test]
    async fn slow_provider_times_out_per_request() {
        let ps = profiles(&[long_page("a", 15)]);
        let provider = FakeProvider::new(echo_copies, 5_000);
        let cfg = ExternalConfig {
            timeout_ms: 50,
            ..ExternalConfig::default()
        };
        let t0 = Instant::now();
        let out =
            detect_external_plagiarism(&ps, &site(), &provider, &Tokenizer::default(), &cfg).await;
        assert!(t0.elapsed() < Duration::from_secs(3));
        assert!(out.matches[&PageId::from("a")].is_empty());
        assert_eq!(out.stats.failed_queries, 2);
    }

    #[tokio::test]
    async fn in_flight_searches_are_bounded() {
        let pages: Vec<PageRecord> = (0..6).map(|i| long_page(&format!("p{i}"), 15)).collect();
        let ps = profiles(&pages);
        let provider = FakeProvider::new(echo_copies, 40);
        let out = detect_external_plagiarism(
            &ps,
            &site(),
            &provider,
            &Tokenizer::default(),
            &ExternalConfig::default(),
        )
        .await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 12);
        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(out.matches.len(), 6);
        assert!(out.matches.values().all(|v| v.len() == 3));
    }
}
