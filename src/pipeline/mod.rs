//! Sequential pipeline orchestration with transient-failure fallback.
//!
//! Stages run strictly in order; each stage's output is recorded into the
//! shared context before the next stage starts. A transient failure does not
//! abort the run: the orchestrator records a structured "unavailable"
//! section, synthesizes the financial fallback artifact where applicable,
//! and continues. The run only fails if a stage fails fatally or no report
//! was persisted by the time the sequence ends.

use crate::context::{ResearchContext, Section};
use crate::errors::{ResearchError, StoreError};
use crate::report::{ReportId, ReportStore};
use crate::stages::{run_stage, Stage};
use crate::synthesis::Synthesizer;
use crate::tools::ToolAdapter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Filename of the financial fallback artifact inside the data directory.
pub const FINANCIAL_FALLBACK_FILE: &str = "financials_fallback.json";

/// Placeholder artifact written when the financial-analysis stage fails
/// transiently and no artifact exists on disk yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinancialFallback {
    /// Why the artifact exists.
    pub note: String,
    /// The placeholder analysis text.
    pub analysis: String,
    /// The placeholder recommendation.
    pub recommendation: String,
}

impl FinancialFallback {
    /// Builds the placeholder for a subject.
    #[must_use]
    pub fn for_subject(subject: &str) -> Self {
        Self {
            note: format!(
                "Financial analysis for {subject} is unavailable; the upstream market data source failed."
            ),
            analysis: "No verified financial data was retrieved during this run.".to_string(),
            recommendation:
                "Re-run the pipeline once the market data source is reachable, or check credentials."
                    .to_string(),
        }
    }
}

/// The result of a completed pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    /// The final context, with every produced section recorded.
    pub context: ResearchContext,
    /// The id of the persisted report.
    pub report_id: ReportId,
    /// Names of stages that failed transiently and were bridged.
    pub degraded_stages: Vec<String>,
}

/// Sequences the research stages and applies the fallback policy.
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    store: Arc<dyn ReportStore>,
    data_dir: PathBuf,
}

impl Pipeline {
    /// Creates a pipeline over an explicit stage sequence.
    #[must_use]
    pub fn new(stages: Vec<Arc<dyn Stage>>, store: Arc<dyn ReportStore>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            stages,
            store,
            data_dir: data_dir.into(),
        }
    }

    /// Builds the canonical five-stage research sequence.
    #[must_use]
    pub fn research(
        search: Arc<dyn ToolAdapter>,
        encyclopedia: Arc<dyn ToolAdapter>,
        quotes: Arc<dyn ToolAdapter>,
        news: Arc<dyn ToolAdapter>,
        synthesizer: Arc<dyn Synthesizer>,
        store: Arc<dyn ReportStore>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        use crate::stages::{
            AnalyzeFinancialsStage, AnalyzeMarketStage, AnalyzeSentimentStage, GatherInfoStage,
            GenerateReportStage,
        };

        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(GatherInfoStage::new(
                search.clone(),
                encyclopedia,
                synthesizer.clone(),
            )),
            Arc::new(AnalyzeFinancialsStage::new(quotes, synthesizer.clone())),
            Arc::new(AnalyzeMarketStage::new(search, synthesizer.clone())),
            Arc::new(AnalyzeSentimentStage::new(news, synthesizer.clone())),
            Arc::new(GenerateReportStage::new(synthesizer)),
        ];
        Self::new(stages, store, data_dir)
    }

    /// The number of stages in the sequence.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Runs the stage sequence against an initial context.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`ResearchError`] on any non-transient stage failure,
    /// on a store failure, or when the sequence completes without a report
    /// having been persisted.
    pub async fn run(&self, mut ctx: ResearchContext) -> Result<PipelineRun, ResearchError> {
        let report_id = ReportId::for_subject(ctx.topic());
        let mut degraded: Vec<String> = Vec::new();

        info!(
            topic = ctx.topic(),
            run_id = %ctx.run_id(),
            stages = self.stages.len(),
            "pipeline run started"
        );

        for stage in &self.stages {
            match run_stage(stage.as_ref(), &ctx, &*self.store, &report_id).await {
                Ok(text) => ctx.record(stage.section(), text)?,
                Err(failure) if failure.is_transient() => {
                    warn!(
                        stage = stage.name(),
                        error = %failure,
                        "transient stage failure absorbed; continuing the run"
                    );
                    if stage.name() == "analyze_financials" {
                        self.ensure_financial_fallback(ctx.topic())?;
                    }
                    ctx.record(stage.section(), unavailable_section(stage.section()))?;
                    degraded.push(stage.name().to_string());
                }
                Err(failure) => return Err(failure.into()),
            }
        }

        // A degraded run still counts as long as the report made it to disk.
        if self.store.read(&report_id)?.is_none() {
            return Err(ResearchError::ReportMissing {
                subject: ctx.topic().to_string(),
            });
        }

        info!(
            topic = ctx.topic(),
            degraded = degraded.len(),
            "pipeline run completed"
        );

        Ok(PipelineRun {
            context: ctx,
            report_id,
            degraded_stages: degraded,
        })
    }

    /// Writes the financial fallback artifact if no artifact is on disk yet.
    ///
    /// Kept specific to the financial-analysis stage rather than generalized
    /// to every stage.
    fn ensure_financial_fallback(&self, subject: &str) -> Result<bool, ResearchError> {
        let path = self.fallback_path();
        if path.exists() {
            info!(path = %path.display(), "fallback artifact already present, keeping it");
            return Ok(false);
        }

        let artifact = FinancialFallback::for_subject(subject);
        write_json(&path, &artifact)?;
        warn!(path = %path.display(), "synthesized financial fallback artifact");
        Ok(true)
    }

    /// The path of the financial fallback artifact.
    #[must_use]
    pub fn fallback_path(&self) -> PathBuf {
        self.data_dir.join(FINANCIAL_FALLBACK_FILE)
    }
}

fn unavailable_section(section: Section) -> String {
    format!(
        "## {}\n\nThis section is unavailable: the data source for it failed during this run.\n",
        section.heading()
    )
}

fn write_json(path: &Path, artifact: &FinancialFallback) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    let json = serde_json::to_string_pretty(artifact).map_err(|e| StoreError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;
    fs::write(path, json).map_err(|e| StoreError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}
