//! Market-quote lookup via the Stooq CSV endpoint.

use super::{ToolAdapter, ToolQuery};
use crate::errors::ToolError;
use async_trait::async_trait;
use tracing::debug;

const TOOL: &str = "market_quote";

/// Fetches a daily quote summary for a ticker symbol.
///
/// Stooq serves one CSV row per symbol with no credential required; US
/// tickers are suffixed with `.us`.
#[derive(Debug, Clone)]
pub struct QuoteAdapter {
    client: reqwest::Client,
}

impl QuoteAdapter {
    /// Creates the adapter.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn symbol_for(query: &str) -> String {
        let ticker: String = query
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        format!("{ticker}.us")
    }
}

#[async_trait]
impl ToolAdapter for QuoteAdapter {
    fn name(&self) -> &str {
        TOOL
    }

    async fn lookup(&self, query: &ToolQuery) -> Result<String, ToolError> {
        let symbol = Self::symbol_for(&query.query);
        debug!(%symbol, "fetching market quote");

        let response = self
            .client
            .get("https://stooq.com/q/l/")
            .query(&[("s", symbol.as_str()), ("f", "sd2t2ohlcv"), ("e", "csv")])
            .send()
            .await
            .map_err(|e| ToolError::upstream(TOOL, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::upstream(
                TOOL,
                format!("status {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::upstream(TOOL, e.to_string()))?;

        parse_quote_csv(&body, &query.query)
    }
}

/// Parses the single-row Stooq CSV payload into a quote summary.
fn parse_quote_csv(csv: &str, query: &str) -> Result<String, ToolError> {
    // Header: Symbol,Date,Time,Open,High,Low,Close,Volume
    let row = csv
        .lines()
        .nth(1)
        .ok_or_else(|| ToolError::upstream(TOOL, "empty quote response"))?;

    let fields: Vec<&str> = row.split(',').collect();
    if fields.len() < 8 {
        return Err(ToolError::upstream(
            TOOL,
            format!("malformed quote row: {row}"),
        ));
    }
    if fields[6] == "N/D" {
        return Err(ToolError::no_results(TOOL, query));
    }

    Ok(format!(
        "Quote for {symbol} on {date}: open {open}, high {high}, low {low}, close {close}, volume {volume}",
        symbol = fields[0],
        date = fields[1],
        open = fields[3],
        high = fields[4],
        low = fields[5],
        close = fields[6],
        volume = fields[7],
    ))
}
