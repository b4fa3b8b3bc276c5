use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod config;

pub use config::ScanConfig;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("invalid input: {0}")]
    Input(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Page identifier as handed over by the caller.
///
/// Upstream page ids are sometimes numeric (CMS post ids) and sometimes strings;
/// both deserialize into the same string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PageId(pub String);

impl PageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for PageId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Int(i64),
            UInt(u64),
        }
        Ok(match Raw::deserialize(d)? {
            Raw::Str(s) => PageId(s),
            Raw::Int(n) => PageId(n.to_string()),
            Raw::UInt(n) => PageId(n.to_string()),
        })
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(s: &str) -> Self {
        PageId(s.to_string())
    }
}

impl From<String> for PageId {
    fn from(s: String) -> Self {
        PageId(s)
    }
}

impl From<u64> for PageId {
    fn from(n: u64) -> Self {
        PageId(n.to_string())
    }
}

/// One page of a site corpus, as produced by the crawler/CMS export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: PageId,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "htmlBody", alias = "html_body", alias = "content")]
    pub html_body: String,
}

impl PageRecord {
    /// Normalized host of `url` (lowercase, leading `www.` removed).
    pub fn host(&self) -> Option<String> {
        host_of(&self.url)
    }
}

/// Lowercased host of a URL with a leading `www.` removed.
pub fn host_of(url: &str) -> Option<String> {
    let u = url::Url::parse(url.trim()).ok()?;
    let h = u.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    let h = h.strip_prefix("www.").unwrap_or(&h).to_string();
    if h.is_empty() {
        None
    } else {
        Some(h)
    }
}

/// True if `host` is `base` or a subdomain of it. Both sides are compared after `www.` removal.
pub fn host_matches(host: &str, base: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let base = base.trim_end_matches('.').to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let base = base.strip_prefix("www.").unwrap_or(&base);
    if base.is_empty() {
        return false;
    }
    host == base || host.ends_with(&format!(".{base}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub jaccard: f64,
    pub containment: f64,
    /// `round(max(jaccard, containment) * 100)`.
    pub score: u8,
}

impl SimilarityResult {
    pub const ZERO: SimilarityResult = SimilarityResult {
        jaccard: 0.0,
        containment: 0.0,
        score: 0,
    };
}

/// Similarity of one page to another page of the same corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalMatch {
    pub other_page_id: PageId,
    pub other_title: String,
    pub other_url: String,
    pub risk_score: u8,
    pub jaccard: f64,
    pub containment: f64,
}

/// A web search hit that looks like a copy of (part of) a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalMatch {
    pub source_url: String,
    pub source_title: String,
    pub source_snippet: String,
    pub provider: String,
    pub query: String,
    pub score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DuplicateContent,
    ExternalPlagiarism,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub score: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    /// Hosts whose results are useless to the caller (the site itself).
    #[serde(default)]
    pub exclude_hosts: Vec<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    /// Per-request network timeout.
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: None,
            exclude_hosts: Vec::new(),
            language: None,
            country: None,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
    pub timings_ms: BTreeMap<String, u128>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Hosts owned by the search engine itself (redirectors, ads); never a real source.
    fn own_hosts(&self) -> &'static [&'static str] {
        &[]
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}
