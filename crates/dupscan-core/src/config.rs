//! Scan configuration shared by the tokenizer, the detectors and the CLI.
//!
//! All thresholds live here so the tokenizer and both detectors read the same
//! stopword table and shingle size. Layering (lowest precedence first):
//! `Default` → JSON file (`ScanConfig::from_json`) → `DUPSCAN_*` env (`apply_env`) → CLI flags.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Dutch function words plus common English ones.
///
/// Words shorter than the minimum token length are listed too so that lowering
/// `min_token_chars` does not suddenly let them through.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    // nl
    "aan", "al", "alle", "alles", "als", "altijd", "andere", "ben", "bij", "daar", "dan", "dat",
    "de", "der", "deze", "die", "dit", "doch", "doen", "door", "dus", "een", "eens", "en", "er",
    "geen", "geweest", "haar", "had", "heb", "hebben", "heeft", "hem", "het", "hier", "hij",
    "hoe", "hun", "iemand", "iets", "ik", "in", "is", "ja", "je", "jij", "jouw", "kan", "kon",
    "kunnen", "maar", "me", "meer", "men", "met", "mij", "mijn", "moet", "na", "naar", "niet",
    "niets", "nog", "nu", "of", "om", "omdat", "onder", "ons", "onze", "ook", "op", "over",
    "reeds", "te", "tegen", "toch", "toen", "tot", "uit", "uw", "van", "veel", "voor", "want",
    "waren", "was", "wat", "we", "werd", "wie", "wij", "wil", "worden", "wordt", "zal", "ze",
    "zelf", "zich", "zij", "zijn", "zo", "zonder", "zou",
    // en
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "her", "one", "our",
    "out", "has", "have", "his", "how", "its", "may", "who", "did", "get", "him", "she", "too",
    "that", "with", "this", "from", "they", "will", "would", "there", "their", "what", "about",
    "which", "when", "your", "been", "were", "into", "than", "then", "them", "these", "those",
    "also", "more", "some", "such", "only", "just", "very",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Tokens shorter than this (in chars) are dropped.
    pub min_token_chars: usize,
    pub stopwords: Vec<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            min_token_chars: 3,
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShingleConfig {
    /// Tokens per shingle (`k`).
    pub size: usize,
    /// Upper bound on sampled windows per document; 0 disables sampling.
    pub max_shingles: usize,
}

impl Default for ShingleConfig {
    fn default() -> Self {
        Self {
            size: 5,
            max_shingles: 1400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalConfig {
    /// Pages with fewer tokens never take part in a comparison.
    pub min_tokens: usize,
    pub min_jaccard: f64,
    pub min_containment: f64,
    pub min_risk_score: u8,
    pub max_matches: usize,
}

impl Default for InternalConfig {
    fn default() -> Self {
        Self {
            min_tokens: 120,
            min_jaccard: 0.18,
            min_containment: 0.34,
            min_risk_score: 35,
            max_matches: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub enabled: bool,
    pub min_tokens: usize,
    /// Only the longest `max_pages` eligible pages are searched per scan.
    pub max_pages: usize,
    pub queries_per_page: usize,
    pub sentence_min_chars: usize,
    pub sentence_max_chars: usize,
    pub sentence_min_tokens: usize,
    pub fallback_window_tokens: usize,
    /// Max in-flight searches.
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub max_results: usize,
    /// Matches scoring below this are discarded.
    pub min_score: u8,
    pub max_matches: usize,
    /// Minimum normalized query length for the literal-substring boost.
    pub exact_min_chars: usize,
    /// Wrap sentence queries in double quotes (phrase search).
    pub quote_queries: bool,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_tokens: 140,
            max_pages: 10,
            queries_per_page: 2,
            sentence_min_chars: 85,
            sentence_max_chars: 240,
            sentence_min_tokens: 10,
            fallback_window_tokens: 18,
            concurrency: 3,
            timeout_ms: 4_500,
            max_results: 5,
            min_score: 42,
            max_matches: 3,
            exact_min_chars: 45,
            quote_queries: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityConfig {
    /// Issues scoring at or above this are `critical`, the rest `warning`.
    pub critical_score: u8,
}

impl Default for SeverityConfig {
    fn default() -> Self {
        Self { critical_score: 70 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub tokenizer: TokenizerConfig,
    pub shingles: ShingleConfig,
    pub internal: InternalConfig,
    pub external: ExternalConfig,
    pub severity: SeverityConfig,
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| Error::Config(format!("{key}: cannot parse {raw:?}")))
}

fn parse_env_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{key}: expected a boolean, got {raw:?}"))),
    }
}

impl ScanConfig {
    /// Parse a (possibly partial) JSON config; missing fields keep their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: ScanConfig =
            serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `DUPSCAN_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|k| std::env::var(k).ok())
    }

    /// Apply overrides from an arbitrary lookup. Empty values count as unset.
    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |k: &str| get(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("DUPSCAN_SHINGLE_SIZE") {
            self.shingles.size = parse_env("DUPSCAN_SHINGLE_SIZE", &v)?;
        }
        if let Some(v) = var("DUPSCAN_MAX_SHINGLES") {
            self.shingles.max_shingles = parse_env("DUPSCAN_MAX_SHINGLES", &v)?;
        }
        if let Some(v) = var("DUPSCAN_INTERNAL_MIN_TOKENS") {
            self.internal.min_tokens = parse_env("DUPSCAN_INTERNAL_MIN_TOKENS", &v)?;
        }
        if let Some(v) = var("DUPSCAN_INTERNAL_MIN_RISK_SCORE") {
            self.internal.min_risk_score = parse_env("DUPSCAN_INTERNAL_MIN_RISK_SCORE", &v)?;
        }
        if let Some(v) = var("DUPSCAN_EXTERNAL_ENABLED") {
            self.external.enabled = parse_env_bool("DUPSCAN_EXTERNAL_ENABLED", &v)?;
        }
        if let Some(v) = var("DUPSCAN_EXTERNAL_MIN_SCORE") {
            self.external.min_score = parse_env("DUPSCAN_EXTERNAL_MIN_SCORE", &v)?;
        }
        if let Some(v) = var("DUPSCAN_EXTERNAL_MAX_PAGES") {
            self.external.max_pages = parse_env("DUPSCAN_EXTERNAL_MAX_PAGES", &v)?;
        }
        if let Some(v) = var("DUPSCAN_EXTERNAL_CONCURRENCY") {
            self.external.concurrency = parse_env("DUPSCAN_EXTERNAL_CONCURRENCY", &v)?;
        }
        if let Some(v) = var("DUPSCAN_EXTERNAL_TIMEOUT_MS") {
            self.external.timeout_ms = parse_env("DUPSCAN_EXTERNAL_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("DUPSCAN_CRITICAL_SCORE") {
            self.severity.critical_score = parse_env("DUPSCAN_CRITICAL_SCORE", &v)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.shingles.size == 0 {
            return Err(Error::Config("shingles.size must be >= 1".to_string()));
        }
        if self.external.concurrency == 0 {
            return Err(Error::Config(
                "external.concurrency must be >= 1".to_string(),
            ));
        }
        for (name, v) in [
            ("internal.min_risk_score", self.internal.min_risk_score),
            ("external.min_score", self.external.min_score),
            ("severity.critical_score", self.severity.critical_score),
        ] {
            if v > 100 {
                return Err(Error::Config(format!("{name} must be <= 100 (got {v})")));
            }
        }
        for (name, v) in [
            ("internal.min_jaccard", self.internal.min_jaccard),
            ("internal.min_containment", self.internal.min_containment),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::Config(format!("{name} must be within [0, 1] (got {v})")));
            }
        }
        if self.external.sentence_min_chars > self.external.sentence_max_chars {
            return Err(Error::Config(
                "external.sentence_min_chars exceeds sentence_max_chars".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn defaults_match_documented_thresholds() {
        let c = ScanConfig::default();
        assert_eq!(c.shingles.size, 5);
        assert_eq!(c.shingles.max_shingles, 1400);
        assert_eq!(c.internal.min_tokens, 120);
        assert_eq!(c.internal.min_risk_score, 35);
        assert_eq!(c.external.min_tokens, 140);
        assert_eq!(c.external.concurrency, 3);
        assert_eq!(c.external.timeout_ms, 4_500);
        // The external detector keeps matches from 42 up; the internal detector from 35 up.
        assert_eq!(c.external.min_score, 42);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn stopword_table_covers_both_languages() {
        let c = TokenizerConfig::default();
        for w in ["het", "een", "voor", "the", "with"] {
            assert!(c.stopwords.iter().any(|s| s == w), "missing stopword {w}");
        }
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = ScanConfig::from_json(r#"{"external": {"min_score": 50}}"#).unwrap();
        assert_eq!(c.external.min_score, 50);
        assert_eq!(c.external.concurrency, 3);
        assert_eq!(c.shingles.size, 5);
    }

    #[test]
    fn json_with_invalid_values_is_rejected() {
        assert!(ScanConfig::from_json(r#"{"shingles": {"size": 0}}"#).is_err());
        assert!(ScanConfig::from_json(r#"{"severity": {"critical_score": 101}}"#).is_err());
        assert!(ScanConfig::from_json("not json").is_err());
    }

    #[test]
    fn env_overrides_apply_and_empty_values_are_ignored() {
        let env: BTreeMap<&str, &str> = BTreeMap::from([
            ("DUPSCAN_EXTERNAL_MIN_SCORE", "35"),
            ("DUPSCAN_EXTERNAL_CONCURRENCY", " 5 "),
            ("DUPSCAN_EXTERNAL_ENABLED", "off"),
            ("DUPSCAN_SHINGLE_SIZE", "   "),
        ]);
        let mut c = ScanConfig::default();
        c.apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(c.external.min_score, 35);
        assert_eq!(c.external.concurrency, 5);
        assert!(!c.external.enabled);
        assert_eq!(c.shingles.size, 5);
    }

    #[test]
    fn env_parse_errors_name_the_variable() {
        let mut c = ScanConfig::default();
        let err = c
            .apply_env_from(|k| (k == "DUPSCAN_EXTERNAL_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("DUPSCAN_EXTERNAL_TIMEOUT_MS"));
    }
}
