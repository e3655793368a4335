//! The concrete research stages.
//!
//! Five stages run in the fixed pipeline order (gather_info,
//! analyze_financials, analyze_market, analyze_sentiment, generate_report);
//! revise_report is invoked only by the revision loop. Adapter failures are
//! classified transient at this boundary.

use super::Stage;
use crate::context::{ResearchContext, Section};
use crate::errors::{StageFailure, ToolError};
use crate::synthesis::{ComposeRequest, Synthesizer};
use crate::tools::{ToolAdapter, ToolQuery};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

fn transient(stage: &str, err: &ToolError) -> StageFailure {
    StageFailure::transient(stage, format!("{err}; {}", err.remedy()))
}

/// Gathers general company background from web search and the encyclopedia.
///
/// Tolerates the loss of either source; fails transiently only when both
/// are unavailable.
#[derive(Debug)]
pub struct GatherInfoStage {
    search: Arc<dyn ToolAdapter>,
    encyclopedia: Arc<dyn ToolAdapter>,
    synthesizer: Arc<dyn Synthesizer>,
}

impl GatherInfoStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        search: Arc<dyn ToolAdapter>,
        encyclopedia: Arc<dyn ToolAdapter>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            search,
            encyclopedia,
            synthesizer,
        }
    }
}

#[async_trait]
impl Stage for GatherInfoStage {
    fn name(&self) -> &str {
        "gather_info"
    }

    fn section(&self) -> Section {
        Section::CompanyProfile
    }

    async fn execute(&self, ctx: &ResearchContext) -> Result<String, StageFailure> {
        let query = ToolQuery::new(format!("{} company overview", ctx.topic()));
        let encyclopedia_query = ToolQuery::new(ctx.topic());

        let mut material: Vec<(&'static str, String)> = Vec::new();
        let mut last_error: Option<ToolError> = None;

        match self.encyclopedia.lookup(&encyclopedia_query).await {
            Ok(text) => material.push(("Encyclopedia", text)),
            Err(e) => {
                warn!(tool = self.encyclopedia.name(), error = %e, "source unavailable, continuing without it");
                last_error = Some(e);
            }
        }
        match self.search.lookup(&query).await {
            Ok(text) => material.push(("Web Search", text)),
            Err(e) => {
                warn!(tool = self.search.name(), error = %e, "source unavailable, continuing without it");
                last_error = Some(e);
            }
        }

        if material.is_empty() {
            let err = last_error.unwrap_or_else(|| {
                ToolError::no_results(self.search.name(), ctx.topic())
            });
            return Err(transient(self.name(), &err));
        }

        let mut request = ComposeRequest::new(self.section(), ctx.topic(), ctx.current_year());
        for &(label, ref text) in &material {
            request = request.with_material(label, text.as_str());
        }
        self.synthesizer
            .compose(&request)
            .await
            .map_err(|e| transient(self.name(), &e))
    }
}

/// Produces the financial analysis from market-quote data.
#[derive(Debug)]
pub struct AnalyzeFinancialsStage {
    quotes: Arc<dyn ToolAdapter>,
    synthesizer: Arc<dyn Synthesizer>,
}

impl AnalyzeFinancialsStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(quotes: Arc<dyn ToolAdapter>, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self { quotes, synthesizer }
    }
}

#[async_trait]
impl Stage for AnalyzeFinancialsStage {
    fn name(&self) -> &str {
        "analyze_financials"
    }

    fn section(&self) -> Section {
        Section::Financials
    }

    async fn execute(&self, ctx: &ResearchContext) -> Result<String, StageFailure> {
        let quote = self
            .quotes
            .lookup(&ToolQuery::new(ctx.topic()))
            .await
            .map_err(|e| transient(self.name(), &e))?;

        let mut request = ComposeRequest::new(self.section(), ctx.topic(), ctx.current_year())
            .with_material("Market Quote", &quote);
        if let Some(profile) = ctx.section(Section::CompanyProfile) {
            request = request.with_material("Company Profile", profile);
        }

        self.synthesizer
            .compose(&request)
            .await
            .map_err(|e| transient(self.name(), &e))
    }
}

/// Analyzes competitive and market positioning from web search results.
#[derive(Debug)]
pub struct AnalyzeMarketStage {
    search: Arc<dyn ToolAdapter>,
    synthesizer: Arc<dyn Synthesizer>,
}

impl AnalyzeMarketStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(search: Arc<dyn ToolAdapter>, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self { search, synthesizer }
    }
}

#[async_trait]
impl Stage for AnalyzeMarketStage {
    fn name(&self) -> &str {
        "analyze_market"
    }

    fn section(&self) -> Section {
        Section::MarketPosition
    }

    async fn execute(&self, ctx: &ResearchContext) -> Result<String, StageFailure> {
        let results = self
            .search
            .lookup(&ToolQuery::new(format!(
                "{} market position competitors",
                ctx.topic()
            )))
            .await
            .map_err(|e| transient(self.name(), &e))?;

        let request = ComposeRequest::new(self.section(), ctx.topic(), ctx.current_year())
            .with_material("Web Search", &results);
        self.synthesizer
            .compose(&request)
            .await
            .map_err(|e| transient(self.name(), &e))
    }
}

/// Summarizes recent news and public sentiment.
#[derive(Debug)]
pub struct AnalyzeSentimentStage {
    news: Arc<dyn ToolAdapter>,
    synthesizer: Arc<dyn Synthesizer>,
}

impl AnalyzeSentimentStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(news: Arc<dyn ToolAdapter>, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self { news, synthesizer }
    }
}

#[async_trait]
impl Stage for AnalyzeSentimentStage {
    fn name(&self) -> &str {
        "analyze_sentiment"
    }

    fn section(&self) -> Section {
        Section::Sentiment
    }

    async fn execute(&self, ctx: &ResearchContext) -> Result<String, StageFailure> {
        let news = self
            .news
            .lookup(&ToolQuery::new(ctx.topic()))
            .await
            .map_err(|e| transient(self.name(), &e))?;

        let request = ComposeRequest::new(self.section(), ctx.topic(), ctx.current_year())
            .with_material("Recent News", &news);
        self.synthesizer
            .compose(&request)
            .await
            .map_err(|e| transient(self.name(), &e))
    }
}

/// Assembles the initial report from every gathered section.
///
/// Marked `persists_output`: the executor writes this stage's output through
/// the store, which is how the initial report body lands on disk.
#[derive(Debug)]
pub struct GenerateReportStage {
    synthesizer: Arc<dyn Synthesizer>,
}

impl GenerateReportStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self { synthesizer }
    }
}

#[async_trait]
impl Stage for GenerateReportStage {
    fn name(&self) -> &str {
        "generate_report"
    }

    fn section(&self) -> Section {
        Section::Report
    }

    fn persists_output(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ResearchContext) -> Result<String, StageFailure> {
        let mut request = ComposeRequest::new(self.section(), ctx.topic(), ctx.current_year());
        for (section, text) in ctx.gathered() {
            request = request.with_material(section.heading(), text);
        }

        self.synthesizer
            .compose(&request)
            .await
            .map_err(|e| transient(self.name(), &e))
    }
}

/// Produces a revision delta scoped to one piece of user feedback.
///
/// Also marked `persists_output`: its executor writes the raw result to the
/// report path. The revision loop must treat its own pre-invocation snapshot
/// as the merge base, never the post-invocation on-disk state.
#[derive(Debug)]
pub struct ReviseReportStage {
    synthesizer: Arc<dyn Synthesizer>,
}

impl ReviseReportStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self { synthesizer }
    }
}

#[async_trait]
impl Stage for ReviseReportStage {
    fn name(&self) -> &str {
        "revise_report"
    }

    fn section(&self) -> Section {
        Section::Revision
    }

    fn persists_output(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ResearchContext) -> Result<String, StageFailure> {
        let Some(feedback) = ctx.user_feedback() else {
            return Err(StageFailure::fatal(
                self.name(),
                anyhow::anyhow!("revision stage invoked without feedback"),
            ));
        };

        let request = ComposeRequest::new(self.section(), ctx.topic(), ctx.current_year())
            .with_feedback(feedback);
        self.synthesizer
            .compose(&request)
            .await
            .map_err(|e| transient(self.name(), &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::OutlineSynthesizer;

    #[derive(Debug)]
    struct FixedAdapter {
        name: &'static str,
        result: Result<String, ToolError>,
    }

    impl FixedAdapter {
        fn ok(name: &'static str, text: &str) -> Arc<dyn ToolAdapter> {
            Arc::new(Self {
                name,
                result: Ok(text.to_string()),
            })
        }

        fn failing(name: &'static str) -> Arc<dyn ToolAdapter> {
            Arc::new(Self {
                name,
                result: Err(ToolError::upstream(name, "connection reset")),
            })
        }
    }

    #[async_trait]
    impl ToolAdapter for FixedAdapter {
        fn name(&self) -> &str {
            self.name
        }

        async fn lookup(&self, _query: &ToolQuery) -> Result<String, ToolError> {
            self.result.clone()
        }
    }

    fn synthesizer() -> Arc<dyn Synthesizer> {
        Arc::new(OutlineSynthesizer::new())
    }

    #[tokio::test]
    async fn test_gather_tolerates_one_failed_source() {
        let stage = GatherInfoStage::new(
            FixedAdapter::failing("search"),
            FixedAdapter::ok("wiki", "Acme makes anvils."),
            synthesizer(),
        );
        let ctx = ResearchContext::new("Acme Corp", "2026");

        let text = stage.execute(&ctx).await.unwrap();
        assert!(text.contains("Acme makes anvils."));
    }

    #[tokio::test]
    async fn test_gather_fails_transiently_when_all_sources_fail() {
        let stage = GatherInfoStage::new(
            FixedAdapter::failing("search"),
            FixedAdapter::failing("wiki"),
            synthesizer(),
        );
        let ctx = ResearchContext::new("Acme Corp", "2026");

        let failure = stage.execute(&ctx).await.unwrap_err();
        assert!(failure.is_transient());
        assert_eq!(failure.stage(), "gather_info");
    }

    #[tokio::test]
    async fn test_financials_maps_tool_error_to_transient() {
        let stage = AnalyzeFinancialsStage::new(FixedAdapter::failing("quotes"), synthesizer());
        let ctx = ResearchContext::new("Acme Corp", "2026");

        let failure = stage.execute(&ctx).await.unwrap_err();
        assert!(failure.is_transient());
        assert!(failure.to_string().contains("retry"));
    }

    #[tokio::test]
    async fn test_generate_report_uses_gathered_sections() {
        let stage = GenerateReportStage::new(synthesizer());
        let mut ctx = ResearchContext::new("Acme Corp", "2026");
        ctx.record(Section::CompanyProfile, "profile".to_string())
            .unwrap();
        ctx.record(Section::Financials, "numbers".to_string()).unwrap();

        let text = stage.execute(&ctx).await.unwrap();
        assert!(text.contains("## Company Profile"));
        assert!(text.contains("## Financial Analysis"));
        assert!(stage.persists_output());
    }

    #[tokio::test]
    async fn test_revise_without_feedback_is_fatal() {
        let stage = ReviseReportStage::new(synthesizer());
        let ctx = ResearchContext::new("Acme Corp", "2026");

        let failure = stage.execute(&ctx).await.unwrap_err();
        assert!(!failure.is_transient());
    }

    #[tokio::test]
    async fn test_revise_produces_heading() {
        let stage = ReviseReportStage::new(synthesizer());
        let ctx = ResearchContext::new("Acme Corp", "2026").with_feedback("add a risk section");

        let text = stage.execute(&ctx).await.unwrap();
        assert!(text.starts_with("## "));
    }
}
