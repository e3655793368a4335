//! Data-source adapters.
//!
//! Each adapter accepts a structured query and returns a bounded-length
//! textual summary or a categorized [`ToolError`]. Credentials are resolved
//! lazily on first use; a missing credential is an adapter failure, not a
//! startup failure. Every adapter applies a client-level timeout so no
//! lookup can block the pipeline indefinitely.

mod market;
mod reference;
mod web;

pub use market::QuoteAdapter;
pub use reference::WikipediaAdapter;
pub use web::{NewsAdapter, SerpSearchAdapter};

use crate::errors::ToolError;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Default cap on adapter summary length, in characters.
pub const MAX_SUMMARY_CHARS: usize = 4000;

/// Default request timeout for adapter HTTP clients.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// A structured lookup request.
#[derive(Debug, Clone)]
pub struct ToolQuery {
    /// The query text.
    pub query: String,
    /// Maximum number of results to include in the summary.
    pub limit: usize,
}

impl ToolQuery {
    /// Creates a query with the default result limit.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: 5,
        }
    }

    /// Sets the result limit.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// The uniform contract every data-source adapter satisfies.
#[async_trait]
pub trait ToolAdapter: Send + Sync + fmt::Debug {
    /// The adapter name, used in logs and error messages.
    fn name(&self) -> &str;

    /// Performs the lookup, returning a bounded textual summary.
    async fn lookup(&self, query: &ToolQuery) -> Result<String, ToolError>;
}

/// Builds the shared HTTP client used by the default adapters.
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("researchflow/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Truncates text to a character budget, marking the cut.
pub(crate) fn clip(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        None => text.to_string(),
        Some((idx, _)) => format!("{}…", &text[..idx]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let q = ToolQuery::new("Acme Corp");
        assert_eq!(q.limit, 5);

        let q = q.with_limit(3);
        assert_eq!(q.limit, 3);
    }

    #[test]
    fn test_clip_within_budget() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("exact", 5), "exact");
    }

    #[test]
    fn test_clip_over_budget() {
        assert_eq!(clip("abcdef", 3), "abc…");
    }

    #[test]
    fn test_clip_multibyte_boundary() {
        assert_eq!(clip("héllo wörld", 4), "héll…");
    }
}
