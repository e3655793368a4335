//! Web search and news adapters.

use super::{clip, ToolAdapter, ToolQuery, MAX_SUMMARY_CHARS};
use crate::config::{NEWS_API_KEY_VAR, SERP_API_KEY_VAR};
use crate::errors::ToolError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const SERP_TOOL: &str = "serp_search";
const NEWS_TOOL: &str = "news";

/// Google search via SerpAPI, formatted as title/link/snippet entries.
#[derive(Debug, Clone)]
pub struct SerpSearchAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl SerpSearchAdapter {
    /// Creates the adapter. A missing key fails lazily on first lookup.
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl ToolAdapter for SerpSearchAdapter {
    fn name(&self) -> &str {
        SERP_TOOL
    }

    async fn lookup(&self, query: &ToolQuery) -> Result<String, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolError::missing_credentials(SERP_TOOL, SERP_API_KEY_VAR))?;

        debug!(query = %query.query, "searching the web");

        let response = self
            .client
            .get("https://serpapi.com/search.json")
            .query(&[
                ("engine", "google"),
                ("q", query.query.as_str()),
                ("api_key", api_key),
            ])
            .send()
            .await
            .map_err(|e| ToolError::upstream(SERP_TOOL, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::upstream(
                SERP_TOOL,
                format!("status {}", response.status()),
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ToolError::upstream(SERP_TOOL, e.to_string()))?;

        let results = payload["organic_results"]
            .as_array()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ToolError::no_results(SERP_TOOL, &query.query))?;

        let formatted: Vec<String> = results
            .iter()
            .take(query.limit)
            .enumerate()
            .map(|(i, result)| {
                let title = result["title"].as_str().unwrap_or("No title");
                let link = result["link"].as_str().unwrap_or("No link");
                let snippet = result["snippet"].as_str().unwrap_or("No description available.");
                format!("{}. {title}\n   {link}\n   {snippet}", i + 1)
            })
            .collect();

        Ok(clip(
            &format!(
                "Search results for '{}':\n\n{}",
                query.query,
                formatted.join("\n\n")
            ),
            MAX_SUMMARY_CHARS,
        ))
    }
}

/// Recent-news lookup via NewsAPI.
///
/// When the NewsAPI key is absent the adapter falls back to plain web search
/// instead of failing, so the sentiment stage still sees usable material.
#[derive(Debug, Clone)]
pub struct NewsAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
    fallback: Option<Arc<SerpSearchAdapter>>,
}

impl NewsAdapter {
    /// Creates the adapter with an optional web-search fallback.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        fallback: Option<Arc<SerpSearchAdapter>>,
    ) -> Self {
        Self {
            client,
            api_key,
            fallback,
        }
    }
}

#[async_trait]
impl ToolAdapter for NewsAdapter {
    fn name(&self) -> &str {
        NEWS_TOOL
    }

    async fn lookup(&self, query: &ToolQuery) -> Result<String, ToolError> {
        let Some(api_key) = self.api_key.as_deref() else {
            if let Some(fallback) = &self.fallback {
                debug!("news credential absent; falling back to web search");
                let widened = ToolQuery::new(format!("{} news", query.query)).with_limit(query.limit);
                return fallback.lookup(&widened).await;
            }
            return Err(ToolError::missing_credentials(NEWS_TOOL, NEWS_API_KEY_VAR));
        };

        debug!(query = %query.query, "fetching recent news");

        let page_size = query.limit.to_string();
        let response = self
            .client
            .get("https://newsapi.org/v2/everything")
            .query(&[
                ("q", query.query.as_str()),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("apiKey", api_key),
            ])
            .send()
            .await
            .map_err(|e| ToolError::upstream(NEWS_TOOL, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::upstream(
                NEWS_TOOL,
                format!("status {}", response.status()),
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ToolError::upstream(NEWS_TOOL, e.to_string()))?;

        let articles = payload["articles"]
            .as_array()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ToolError::no_results(NEWS_TOOL, &query.query))?;

        let formatted: Vec<String> = articles
            .iter()
            .take(query.limit)
            .enumerate()
            .map(|(i, article)| {
                let title = article["title"].as_str().unwrap_or("Untitled");
                let source = article["source"]["name"].as_str().unwrap_or("unknown");
                let published = article["publishedAt"].as_str().unwrap_or("");
                let description = article["description"].as_str().unwrap_or("");
                format!("{}. {title} ({source}, {published})\n   {description}", i + 1)
            })
            .collect();

        Ok(clip(
            &format!(
                "Recent news for '{}':\n\n{}",
                query.query,
                formatted.join("\n\n")
            ),
            MAX_SUMMARY_CHARS,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolError;

    #[tokio::test]
    async fn test_serp_missing_credentials_fails_lazily() {
        let adapter = SerpSearchAdapter::new(reqwest::Client::new(), None);
        let err = adapter
            .lookup(&ToolQuery::new("Acme Corp"))
            .await
            .unwrap_err();

        match err {
            ToolError::MissingCredentials { tool, variable } => {
                assert_eq!(tool, SERP_TOOL);
                assert_eq!(variable, SERP_API_KEY_VAR);
            }
            other => panic!("expected MissingCredentials, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_news_without_key_or_fallback() {
        let adapter = NewsAdapter::new(reqwest::Client::new(), None, None);
        let err = adapter
            .lookup(&ToolQuery::new("Acme Corp"))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::MissingCredentials { .. }));
    }

    #[tokio::test]
    async fn test_news_fallback_inherits_search_failure() {
        // Fallback search also lacks credentials, so the error comes from it.
        let search = Arc::new(SerpSearchAdapter::new(reqwest::Client::new(), None));
        let adapter = NewsAdapter::new(reqwest::Client::new(), None, Some(search));
        let err = adapter
            .lookup(&ToolQuery::new("Acme Corp"))
            .await
            .unwrap_err();

        match err {
            ToolError::MissingCredentials { tool, .. } => assert_eq!(tool, SERP_TOOL),
            other => panic!("expected MissingCredentials, got {other:?}"),
        }
    }
}
