//! Public facade crate for `dupscan`.
//!
//! Re-exports the backend-agnostic types/traits from `dupscan-core` and the
//! engine entry points from `dupscan-local`.

pub use dupscan_core::*;

pub use dupscan_local as engine;
pub use dupscan_local::{
    analyze_page, http_client, provider_from_env, scan_site, similarity, text_similarity,
    PageReport, ProviderKind, ScanReport, ScanStats, Tokenizer,
};
