//! Web search for business profiles.
//!
//! [`SearchProvider`] is the seam the pipeline talks to; [`SerpApiClient`]
//! implements it against SerpAPI's `google` engine.

mod serpapi;

use async_trait::async_trait;
use outreach_shared::{Result, SearchResult};

pub use serpapi::{SerpApiClient, SerpApiOptions};

/// A ranked, paginated web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Fetch one page of results. `start` is the zero-based result offset.
    async fn search(&self, query: &str, start: u32, num: u32) -> Result<Vec<SearchResult>>;
}

/// Build the site-restricted query for one platform.
///
/// `site:instagram.com "Florist" "Canada" "@gmail.com"`
pub fn build_search_query(platform: &str, niche: &str, country: &str, email_provider: &str) -> String {
    let provider = email_provider.trim().trim_start_matches('@');
    format!(
        "site:{} \"{}\" \"{}\" \"@{}\"",
        platform.trim(),
        niche.trim(),
        country.trim(),
        provider
    )
}

/// Operator hint for well-known provider failures.
pub fn error_hint(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    if lower.contains("invalid api key") || lower.contains("unauthorized") {
        Some("check that the SerpAPI key env var holds a valid key")
    } else if lower.contains("rate limit") || lower.contains("run out of searches") {
        Some("SerpAPI quota or rate limit reached; wait or upgrade the plan")
    } else {
        None
    }
}
