//! Encyclopedia lookup via the Wikipedia REST API.

use super::{clip, ToolAdapter, ToolQuery};
use crate::errors::ToolError;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

const TOOL: &str = "wikipedia";
const SUMMARY_CHARS: usize = 1000;

/// Fetches topic summaries from Wikipedia.
///
/// Tries a direct page lookup first; on a miss, runs a keyword search and
/// retries with the closest match. Requires no credentials.
#[derive(Debug, Clone)]
pub struct WikipediaAdapter {
    client: reqwest::Client,
}

impl WikipediaAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn page_summary(&self, title: &str) -> Result<Option<String>, ToolError> {
        let encoded = title.replace(' ', "_");
        let url = format!("https://en.wikipedia.org/api/rest_v1/page/summary/{encoded}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ToolError::upstream(TOOL, e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ToolError::upstream(
                TOOL,
                format!("status {}", response.status()),
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ToolError::upstream(TOOL, e.to_string()))?;

        let Some(extract) = payload["extract"].as_str().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let title = payload["title"].as_str().unwrap_or(title);
        let page_url = payload["content_urls"]["desktop"]["page"]
            .as_str()
            .unwrap_or("");

        Ok(Some(format!(
            "{title}\n{page_url}\n\n{}",
            clip(extract, SUMMARY_CHARS)
        )))
    }

    async fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<String>, ToolError> {
        let limit = limit.to_string();
        let response = self
            .client
            .get("https://en.wikipedia.org/w/api.php")
            .query(&[
                ("action", "opensearch"),
                ("format", "json"),
                ("search", query),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ToolError::upstream(TOOL, e.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ToolError::upstream(TOOL, e.to_string()))?;

        // Opensearch response shape: [query, [titles], [descriptions], [urls]].
        Ok(payload[1]
            .as_array()
            .map(|titles| {
                titles
                    .iter()
                    .filter_map(|t| t.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ToolAdapter for WikipediaAdapter {
    fn name(&self) -> &str {
        TOOL
    }

    async fn lookup(&self, query: &ToolQuery) -> Result<String, ToolError> {
        debug!(query = %query.query, "looking up encyclopedia summary");

        if let Some(summary) = self.page_summary(&query.query).await? {
            return Ok(summary);
        }

        for title in self.search_titles(&query.query, query.limit).await? {
            if let Some(summary) = self.page_summary(&title).await? {
                return Ok(format!("Closest match: {summary}"));
            }
        }

        Err(ToolError::no_results(TOOL, &query.query))
    }
}
