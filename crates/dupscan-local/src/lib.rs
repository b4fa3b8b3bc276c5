//! Similarity engine for `dupscan`: tokenizer, shingles, internal duplicate and
//! external plagiarism detection, plus the reqwest-backed search providers.

use dupscan_core::{Error, Result};
use std::time::Duration;

pub mod external;
pub mod internal;
pub mod profile;
pub mod queries;
pub mod scan;
pub mod search;
pub mod shingle;
pub mod similarity;
pub mod tokenize;

pub use external::{detect_external_plagiarism, ExternalOutcome, ExternalStats};
pub use internal::detect_internal_duplicates;
pub use profile::{build_profiles, PageProfile};
pub use scan::{analyze_page, scan_site, PageReport, ScanReport, ScanStats};
pub use search::{provider_from_env, BraveSearchProvider, DuckDuckGoHtmlProvider, ProviderKind};
pub use similarity::{similarity, text_similarity};
pub use tokenize::Tokenizer;

/// One shared client for all provider calls.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("dupscan/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        // Avoid hanging forever on DNS/TLS/body stalls; per-request timeouts still apply.
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::Config(format!("http client: {e}")))
}
