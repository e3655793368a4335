//! Stage contract and execution.
//!
//! A stage consumes the typed run context and produces one section of text
//! or a classified [`StageFailure`]. Stages marked `persists_output` have
//! their raw output written through the report store by the executor as a
//! side effect of running; callers that merge against the report must
//! snapshot it before invoking such a stage (see the revision module).

mod research;

pub use research::{
    AnalyzeFinancialsStage, AnalyzeMarketStage, AnalyzeSentimentStage, GatherInfoStage,
    GenerateReportStage, ReviseReportStage,
};

use crate::context::{ResearchContext, Section};
use crate::errors::StageFailure;
use crate::report::{ReportId, ReportStore};
use async_trait::async_trait;
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};

/// A unit of pipeline work.
#[async_trait]
pub trait Stage: Send + Sync + fmt::Debug {
    /// The stage name, used in logs and error wrapping.
    fn name(&self) -> &str;

    /// The context section this stage produces.
    fn section(&self) -> Section;

    /// Whether the executor additionally persists this stage's raw output
    /// through the report store.
    fn persists_output(&self) -> bool {
        false
    }

    /// Executes the stage against the current context.
    async fn execute(&self, ctx: &ResearchContext) -> Result<String, StageFailure>;
}

/// Runs one stage: emits log events, executes, and applies the persistence
/// side effect for `persists_output` stages.
pub async fn run_stage(
    stage: &dyn Stage,
    ctx: &ResearchContext,
    store: &dyn ReportStore,
    id: &ReportId,
) -> Result<String, StageFailure> {
    info!(stage = stage.name(), run_id = %ctx.run_id(), "stage started");
    let started = Instant::now();

    let text = match stage.execute(ctx).await {
        Ok(text) => text,
        Err(failure) => {
            warn!(
                stage = stage.name(),
                transient = failure.is_transient(),
                error = %failure,
                "stage failed"
            );
            return Err(failure);
        }
    };

    if stage.persists_output() {
        // The persistence side effect writes output as produced, unmerged.
        store
            .write(id, &text)
            .map_err(|e| StageFailure::fatal(stage.name(), e))?;
    }

    info!(
        stage = stage.name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "stage completed"
    );
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReportStore;

    #[derive(Debug)]
    struct EchoStage {
        persists: bool,
    }

    #[async_trait]
    impl Stage for EchoStage {
        fn name(&self) -> &str {
            "echo"
        }

        fn section(&self) -> Section {
            Section::Report
        }

        fn persists_output(&self) -> bool {
            self.persists
        }

        async fn execute(&self, ctx: &ResearchContext) -> Result<String, StageFailure> {
            Ok(format!("## {}\n", ctx.topic()))
        }
    }

    #[tokio::test]
    async fn test_run_stage_returns_output() {
        let store = MemoryReportStore::new();
        let ctx = ResearchContext::new("Acme Corp", "2026");
        let id = ReportId::for_subject(ctx.topic());

        let text = run_stage(&EchoStage { persists: false }, &ctx, &store, &id)
            .await
            .unwrap();

        assert_eq!(text, "## Acme Corp\n");
        assert_eq!(store.read(&id).unwrap(), None);
    }

    #[tokio::test]
    async fn test_run_stage_persists_when_marked() {
        let store = MemoryReportStore::new();
        let ctx = ResearchContext::new("Acme Corp", "2026");
        let id = ReportId::for_subject(ctx.topic());

        run_stage(&EchoStage { persists: true }, &ctx, &store, &id)
            .await
            .unwrap();

        assert_eq!(store.read(&id).unwrap(), Some("## Acme Corp\n".to_string()));
    }
}
