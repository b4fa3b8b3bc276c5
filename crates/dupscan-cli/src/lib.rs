//! Input loading for the `dupscan` binary: page corpora and layered scan config.

use anyhow::{Context, Result};
use dupscan::{PageRecord, ScanConfig};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum PagesFile {
    List(Vec<PageRecord>),
    Wrapped { pages: Vec<PageRecord> },
}

/// Parse a pages document: either a JSON array of page records or `{ "pages": [...] }`.
pub fn parse_pages(json: &str) -> Result<Vec<PageRecord>> {
    let parsed: PagesFile = serde_json::from_str(json)
        .context("pages file must be a JSON array of pages or an object with a `pages` array")?;
    Ok(match parsed {
        PagesFile::List(v) | PagesFile::Wrapped { pages: v } => v,
    })
}

pub fn load_pages(path: &Path) -> Result<Vec<PageRecord>> {
    let txt = std::fs::read_to_string(path)
        .with_context(|| format!("read pages file {}", path.display()))?;
    parse_pages(&txt).with_context(|| format!("parse pages file {}", path.display()))
}

/// Defaults, then the optional JSON file, then `DUPSCAN_*` env vars.
/// CLI flag overrides are applied by the caller on top.
pub fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    let mut cfg = match path {
        Some(p) => {
            let txt = std::fs::read_to_string(p)
                .with_context(|| format!("read config file {}", p.display()))?;
            ScanConfig::from_json(&txt).with_context(|| format!("config file {}", p.display()))?
        }
        None => ScanConfig::default(),
    };
    cfg.apply_env().context("DUPSCAN_* environment")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn accepts_bare_and_wrapped_page_lists() {
        let bare = r#"[{"id": 7, "url": "https://a.nl/x", "title": "X", "htmlBody": "<p>x</p>"}]"#;
        let wrapped = r#"{"pages": [{"id": "p1", "content": "tekst"}]}"#;
        let a = parse_pages(bare).unwrap();
        assert_eq!(a[0].id.as_str(), "7");
        assert_eq!(a[0].html_body, "<p>x</p>");
        let b = parse_pages(wrapped).unwrap();
        assert_eq!(b[0].id.as_str(), "p1");
        assert_eq!(b[0].html_body, "tekst");
        assert!(b[0].url.is_empty());
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(parse_pages(r#"{"items": []}"#).is_err());
        assert!(parse_pages("nope").is_err());
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"external": {{"min_score": 60}}}}"#).unwrap();
        let cfg = load_config(Some(f.path())).unwrap();
        assert_eq!(cfg.external.min_score, 60);
        assert_eq!(cfg.external.concurrency, 3);
        assert_eq!(cfg.shingles.size, 5);
    }

    #[test]
    fn invalid_config_file_is_an_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"shingles": {{"size": 0}}}}"#).unwrap();
        assert!(load_config(Some(f.path())).is_err());
    }
}
