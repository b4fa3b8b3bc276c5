use dupscan_core::{Error, Result, SearchProvider, SearchQuery, SearchResponse, SearchResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// `-site:` operators appended per query; longer queries get rejected or truncated upstream.
const MAX_SITE_EXCLUSIONS: usize = 3;

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Provider requests can hang indefinitely without an explicit timeout.
    q.timeout_ms.unwrap_or(10_000).clamp(100, 60_000)
}

fn max_results_from_query(q: &SearchQuery) -> usize {
    q.max_results.unwrap_or(5).clamp(1, 20)
}

fn brave_api_key_from_env() -> Option<String> {
    std::env::var("DUPSCAN_BRAVE_API_KEY")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            std::env::var("BRAVE_SEARCH_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
        })
}

/// Endpoint override from `key`; unset or empty means the default endpoint.
fn endpoint_from_env(key: &str) -> Result<Option<String>> {
    let Some(raw) = std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    else {
        return Ok(None);
    };
    match url::Url::parse(&raw) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(Some(raw)),
        _ => Err(Error::InvalidUrl(format!("{key}={raw}"))),
    }
}

fn non_empty_query(q: &SearchQuery) -> Result<()> {
    if q.query.trim().is_empty() {
        return Err(Error::Input("empty search query".to_string()));
    }
    Ok(())
}

/// `query -site:a -site:b`, skipping hosts that would not survive as an operator.
pub fn query_with_site_exclusions(q: &SearchQuery) -> String {
    let mut out = q.query.trim().to_string();
    for h in q
        .exclude_hosts
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty() && !h.contains(char::is_whitespace))
        .take(MAX_SITE_EXCLUSIONS)
    {
        out.push_str(" -site:");
        out.push_str(h);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Brave when a key is configured, else DuckDuckGo.
    Auto,
    Brave,
    DuckDuckGo,
    /// External detection disabled.
    None,
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "brave" => Ok(Self::Brave),
            "duckduckgo" | "ddg" => Ok(Self::DuckDuckGo),
            "none" | "off" => Ok(Self::None),
            other => Err(Error::Config(format!(
                "unknown provider {other:?} (allowed: auto, brave, duckduckgo, none)"
            ))),
        }
    }
}

pub fn brave_configured() -> bool {
    brave_api_key_from_env().is_some()
}

/// Pick the search backend once, at startup. `Ok(None)` means external detection is off.
pub fn provider_from_env(
    kind: ProviderKind,
    client: reqwest::Client,
) -> Result<Option<Arc<dyn SearchProvider>>> {
    let p: Arc<dyn SearchProvider> = match kind {
        ProviderKind::None => return Ok(None),
        ProviderKind::Brave => Arc::new(BraveSearchProvider::from_env(client)?),
        ProviderKind::DuckDuckGo => Arc::new(DuckDuckGoHtmlProvider::from_env(client)?),
        ProviderKind::Auto => {
            if brave_configured() {
                Arc::new(BraveSearchProvider::from_env(client)?)
            } else {
                Arc::new(DuckDuckGoHtmlProvider::from_env(client)?)
            }
        }
    };
    tracing::info!(provider = p.name(), "search provider selected");
    Ok(Some(p))
}

#[derive(Debug, Clone)]
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl BraveSearchProvider {
    const DEFAULT_ENDPOINT: &'static str = "https://api.search.brave.com/res/v1/web/search";

    pub fn new(client: reqwest::Client, api_key: String, endpoint: Option<String>) -> Self {
        Self {
            client,
            api_key,
            endpoint: endpoint.unwrap_or_else(|| Self::DEFAULT_ENDPOINT.to_string()),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = brave_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing DUPSCAN_BRAVE_API_KEY (or BRAVE_SEARCH_API_KEY)".to_string(),
            )
        })?;
        Ok(Self::new(
            client,
            api_key,
            endpoint_from_env("DUPSCAN_BRAVE_ENDPOINT")?,
        ))
    }
}

#[derive(Debug, Deserialize)]
struct BraveWebSearchResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Option<Vec<BraveWebResult>>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    url: String,
    title: Option<String>,
    #[serde(rename = "description")]
    description: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        non_empty_query(q)?;
        let t0 = Instant::now();
        let timeout_ms = timeout_ms_from_query(q);
        let max_results = max_results_from_query(q);

        let mut req = self
            .client
            .get(&self.endpoint)
            .header("X-Subscription-Token", &self.api_key)
            .query(&[
                ("q", query_with_site_exclusions(q)),
                ("count", max_results.to_string()),
            ]);
        if let Some(lang) = q.language.as_deref() {
            req = req.query(&[("search_lang", lang)]);
        }
        if let Some(country) = q.country.as_deref() {
            req = req.query(&[("country", country)]);
        }

        let resp = req
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("brave search HTTP {status}")));
        }

        let parsed: BraveWebSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let results = parsed
            .web
            .and_then(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .take(max_results)
            .map(|r| SearchResult {
                url: r.url,
                title: r.title,
                snippet: r.description,
                source: "brave".to_string(),
            })
            .collect();

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());

        Ok(SearchResponse {
            results,
            provider: "brave".to_string(),
            timings_ms,
        })
    }
}

/// Scrapes the no-JS DuckDuckGo result page. Used when no API key is configured.
#[derive(Debug, Clone)]
pub struct DuckDuckGoHtmlProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoHtmlProvider {
    const DEFAULT_ENDPOINT: &'static str = "https://html.duckduckgo.com/html/";

    pub fn new(client: reqwest::Client, endpoint: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| Self::DEFAULT_ENDPOINT.to_string()),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        Ok(Self::new(client, endpoint_from_env("DUPSCAN_DDG_ENDPOINT")?))
    }
}

/// Resolve a DuckDuckGo result link to the target URL.
///
/// Result anchors look like `//duckduckgo.com/l/?uddg=<percent-encoded target>&rut=...`.
/// Direct absolute links are returned as-is; anything else is `None`.
pub fn unwrap_redirect_url(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let abs = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };
    let u = url::Url::parse(&abs).ok()?;
    if let Some((_, target)) = u.query_pairs().find(|(k, _)| k == "uddg") {
        let t = url::Url::parse(&target).ok()?;
        return matches!(t.scheme(), "http" | "https").then(|| t.to_string());
    }
    matches!(u.scheme(), "http" | "https").then(|| u.to_string())
}

fn element_text(el: &html_scraper::ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_duckduckgo_html(html: &str, max_results: usize) -> Vec<SearchResult> {
    let doc = html_scraper::Html::parse_document(html);
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        html_scraper::Selector::parse("div.result"),
        html_scraper::Selector::parse("a.result__a"),
        html_scraper::Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for block in doc.select(&result_sel) {
        if out.len() >= max_results {
            break;
        }
        if block.value().classes().any(|c| c == "result--ad") {
            continue;
        }
        let Some(link) = block.select(&link_sel).next() else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(unwrap_redirect_url) else {
            continue;
        };
        let title = element_text(&link);
        let snippet = block
            .select(&snippet_sel)
            .next()
            .map(|s| element_text(&s))
            .filter(|s| !s.is_empty());
        out.push(SearchResult {
            url,
            title: (!title.is_empty()).then_some(title),
            snippet,
            source: "duckduckgo".to_string(),
        });
    }
    out
}

#[async_trait::async_trait]
impl SearchProvider for DuckDuckGoHtmlProvider {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    fn own_hosts(&self) -> &'static [&'static str] {
        &["duckduckgo.com"]
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        non_empty_query(q)?;
        let t0 = Instant::now();
        let timeout_ms = timeout_ms_from_query(q);
        let max_results = max_results_from_query(q);

        let mut req = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query_with_site_exclusions(q))]);
        if let Some(region) = q.country.as_deref() {
            // DuckDuckGo regions look like `nl-nl`; pass through whatever the caller set.
            req = req.query(&[("kl", region)]);
        }

        let resp = req
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("duckduckgo search HTTP {status}")));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let results = parse_duckduckgo_html(&body, max_results);

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());

        Ok(SearchResponse {
            results,
            provider: "duckduckgo".to_string(),
            timings_ms,
        })
    }
}
