//! Interactive revision loop with snapshot-based merging.
//!
//! The loop alternates between waiting for feedback and running one scoped
//! revision stage. The revision stage's executor persists its raw output to
//! the report path as a side effect that cannot be disabled, so the loop
//! reads a snapshot of the body *before* invoking the stage and merges the
//! extracted delta against that snapshot, never against the post-invocation
//! on-disk state. That discipline gives at-most-one effective writer per
//! iteration without locking.

use crate::context::ResearchContext;
use crate::errors::ResearchError;
use crate::report::{extract_delta, merge_delta, normalize_body, ReportId, ReportStore};
use crate::stages::{run_stage, Stage};
use std::sync::Arc;
use tracing::{info, warn};

/// Default iteration cap for the revision loop.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Default character budget for the per-iteration report preview.
pub const DEFAULT_PREVIEW_CHARS: usize = 1500;

/// The states of the revision loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the user's next feedback line.
    AwaitingFeedback,
    /// The revision stage is running.
    Revising,
    /// A well-formed delta is being merged into the report.
    Merging,
    /// Terminal: the user submitted empty feedback.
    Finalized,
    /// Terminal: the iteration cap was reached.
    Capped,
}

/// The outcome of a single revision iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// The delta was merged into the report and appended to the ledger.
    Merged,
    /// The revision output contained no heading anywhere; report untouched.
    RejectedMalformed,
    /// The revision output was empty; report untouched.
    RejectedEmpty,
    /// The revision stage failed transiently; report untouched.
    Error,
}

/// Summary of a finished revision loop.
#[derive(Debug)]
pub struct RevisionSummary {
    /// The terminal state (`Finalized` or `Capped`).
    pub state: LoopState,
    /// Per-iteration outcomes, in order.
    pub outcomes: Vec<IterationOutcome>,
}

impl RevisionSummary {
    /// The number of deltas merged into the report.
    #[must_use]
    pub fn merged_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| **o == IterationOutcome::Merged)
            .count()
    }
}

/// Supplies feedback lines to the loop.
///
/// The CLI implementation blocks on the terminal indefinitely; tests supply
/// a scripted sequence.
pub trait FeedbackSource: Send {
    /// Returns the next feedback line. An empty line ends the loop.
    fn next_feedback(&mut self) -> Result<String, std::io::Error>;
}

impl FeedbackSource for Vec<String> {
    fn next_feedback(&mut self) -> Result<String, std::io::Error> {
        if self.is_empty() {
            Ok(String::new())
        } else {
            Ok(self.remove(0))
        }
    }
}

/// Drives the feedback / revise / merge cycle for one report.
#[derive(Debug)]
pub struct RevisionLoop {
    stage: Arc<dyn Stage>,
    store: Arc<dyn ReportStore>,
    max_iterations: usize,
    preview_chars: usize,
}

impl RevisionLoop {
    /// Creates a loop over a revision stage and a store.
    #[must_use]
    pub fn new(stage: Arc<dyn Stage>, store: Arc<dyn ReportStore>) -> Self {
        Self {
            stage,
            store,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }

    /// Sets the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the preview character budget.
    #[must_use]
    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    /// Runs the loop until empty feedback or the iteration cap.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`ResearchError`] on prompt failure, store failure,
    /// or a fatal revision-stage failure. Transient stage failures and
    /// malformed output are absorbed as iteration outcomes.
    pub async fn run(
        &self,
        base: &ResearchContext,
        feedback: &mut dyn FeedbackSource,
    ) -> Result<RevisionSummary, ResearchError> {
        let id = ReportId::for_subject(base.topic());
        let mut outcomes = Vec::new();

        for iteration in 1..=self.max_iterations {
            // AWAITING_FEEDBACK: an indefinite suspension point; only an
            // explicit empty line ends it.
            let line = feedback.next_feedback()?;
            let line = line.trim().to_string();
            if line.is_empty() {
                info!(iteration, "empty feedback, finalizing report");
                return Ok(RevisionSummary {
                    state: LoopState::Finalized,
                    outcomes,
                });
            }

            // REVISING: snapshot first. The stage executor may clobber the
            // stored report with raw output while it runs.
            let snapshot = self.store.read(&id)?.unwrap_or_default();
            let ctx = base.clone().with_feedback(line);

            let raw = match run_stage(self.stage.as_ref(), &ctx, &*self.store, &id).await {
                Ok(raw) => raw,
                Err(failure) if failure.is_transient() => {
                    warn!(iteration, error = %failure, "revision failed, report kept as-is; adjust the feedback and retry");
                    outcomes.push(IterationOutcome::Error);
                    continue;
                }
                Err(failure) => return Err(failure.into()),
            };

            if raw.trim().is_empty() {
                warn!(iteration, "revision produced no content, report kept as-is");
                self.store.write(&id, &snapshot)?;
                outcomes.push(IterationOutcome::RejectedEmpty);
                continue;
            }

            let Some(delta) = extract_delta(&raw) else {
                warn!(
                    iteration,
                    "revision output has no heading anywhere, rejecting it; report kept as-is"
                );
                // Undo the executor's raw-output write.
                self.store.write(&id, &snapshot)?;
                outcomes.push(IterationOutcome::RejectedMalformed);
                continue;
            };

            // MERGING: ledger first for durability, then the snapshot-based
            // body rewrite.
            self.store.append_feedback(&id, &delta)?;
            let merged = merge_delta(&normalize_body(&snapshot), &delta);
            self.store.write(&id, &merged)?;
            outcomes.push(IterationOutcome::Merged);

            info!(iteration, "revision merged");
            if let Some(preview) = self.preview(&id)? {
                println!("\n--- report preview (iteration {iteration}) ---\n{preview}\n");
            }
        }

        info!(cap = self.max_iterations, "iteration cap reached");
        Ok(RevisionSummary {
            state: LoopState::Capped,
            outcomes,
        })
    }

    /// The combined body + ledger view, truncated for display.
    pub fn preview(&self, id: &ReportId) -> Result<Option<String>, ResearchError> {
        let Some(combined) = self.store.combined(id)? else {
            return Ok(None);
        };
        let mut chars = combined.char_indices();
        let preview = match chars.nth(self.preview_chars) {
            None => combined,
            Some((idx, _)) => format!("{}…", &combined[..idx]),
        };
        Ok(Some(preview))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Section;
    use crate::errors::StageFailure;
    use crate::report::MemoryReportStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    /// Revision stage double that returns scripted raw output and mimics the
    /// executor's persistence defect through `persists_output`.
    #[derive(Debug)]
    struct ScriptedRevision {
        raw: String,
    }

    #[async_trait]
    impl Stage for ScriptedRevision {
        fn name(&self) -> &str {
            "revise_report"
        }

        fn section(&self) -> Section {
            Section::Revision
        }

        fn persists_output(&self) -> bool {
            true
        }

        async fn execute(&self, _ctx: &ResearchContext) -> Result<String, StageFailure> {
            Ok(self.raw.clone())
        }
    }

    #[derive(Debug)]
    struct FailingRevision;

    #[async_trait]
    impl Stage for FailingRevision {
        fn name(&self) -> &str {
            "revise_report"
        }

        fn section(&self) -> Section {
            Section::Revision
        }

        async fn execute(&self, _ctx: &ResearchContext) -> Result<String, StageFailure> {
            Err(StageFailure::transient("revise_report", "model returned garbage"))
        }
    }

    fn seeded_store(body: &str) -> (Arc<MemoryReportStore>, ReportId) {
        let store = Arc::new(MemoryReportStore::new());
        let id = ReportId::for_subject("Acme Corp");
        store.write(&id, body).unwrap();
        (store, id)
    }

    fn feedback(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| (*l).to_string()).collect()
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let (store, id) = seeded_store("## Overview\nAcme makes anvils.\n");
        let stage = Arc::new(ScriptedRevision {
            raw: "```markdown\n## Risks\nSupply chain exposure.\n```".to_string(),
        });

        let looper = RevisionLoop::new(stage, store.clone());
        let ctx = ResearchContext::new("Acme Corp", "2026");
        let mut lines = feedback(&["add a risk section", ""]);

        let summary = looper.run(&ctx, &mut lines).await.unwrap();

        assert_eq!(summary.state, LoopState::Finalized);
        assert_eq!(summary.outcomes, vec![IterationOutcome::Merged]);
        assert_eq!(
            store.read(&id).unwrap().unwrap(),
            "## Overview\nAcme makes anvils.\n\n## Risks\nSupply chain exposure.\n"
        );
        assert_eq!(
            store.read_feedback(&id).unwrap().unwrap(),
            "## Risks\nSupply chain exposure.\n"
        );
    }

    #[tokio::test]
    async fn test_snapshot_isolation_against_clobbering_executor() {
        // The stage persists its raw output before the loop merges; the
        // merged body must still be snapshot + delta.
        let (store, id) = seeded_store("## Overview\nOriginal.\n");
        let stage = Arc::new(ScriptedRevision {
            raw: "## Risks\nExposure.".to_string(),
        });

        let looper = RevisionLoop::new(stage, store.clone());
        let ctx = ResearchContext::new("Acme Corp", "2026");
        let mut lines = feedback(&["add risks", ""]);

        looper.run(&ctx, &mut lines).await.unwrap();

        assert_eq!(
            store.read(&id).unwrap().unwrap(),
            "## Overview\nOriginal.\n\n## Risks\nExposure.\n"
        );
    }

    #[tokio::test]
    async fn test_malformed_output_leaves_report_byte_identical() {
        let before = "## Overview\nOriginal.\n";
        let (store, id) = seeded_store(before);
        let stage = Arc::new(ScriptedRevision {
            raw: "I could not produce a section, sorry.".to_string(),
        });

        let looper = RevisionLoop::new(stage, store.clone());
        let ctx = ResearchContext::new("Acme Corp", "2026");
        let mut lines = feedback(&["add risks", ""]);

        let summary = looper.run(&ctx, &mut lines).await.unwrap();

        assert_eq!(summary.outcomes, vec![IterationOutcome::RejectedMalformed]);
        assert_eq!(store.read(&id).unwrap().unwrap(), before);
        assert_eq!(store.read_feedback(&id).unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_output_is_rejected() {
        let before = "## Overview\nOriginal.\n";
        let (store, id) = seeded_store(before);
        let stage = Arc::new(ScriptedRevision {
            raw: "   \n".to_string(),
        });

        let looper = RevisionLoop::new(stage, store.clone());
        let ctx = ResearchContext::new("Acme Corp", "2026");
        let mut lines = feedback(&["add risks", ""]);

        let summary = looper.run(&ctx, &mut lines).await.unwrap();

        assert_eq!(summary.outcomes, vec![IterationOutcome::RejectedEmpty]);
        assert_eq!(store.read(&id).unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_transient_stage_failure_keeps_looping() {
        let before = "## Overview\nOriginal.\n";
        let (store, id) = seeded_store(before);

        let looper = RevisionLoop::new(Arc::new(FailingRevision), store.clone());
        let ctx = ResearchContext::new("Acme Corp", "2026");
        let mut lines = feedback(&["try one", "try two", ""]);

        let summary = looper.run(&ctx, &mut lines).await.unwrap();

        assert_eq!(summary.state, LoopState::Finalized);
        assert_eq!(
            summary.outcomes,
            vec![IterationOutcome::Error, IterationOutcome::Error]
        );
        assert_eq!(store.read(&id).unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let (store, id) = seeded_store("## Overview\nBase.\n");
        let stage = Arc::new(ScriptedRevision {
            raw: "## Addition\nMore.".to_string(),
        });

        let looper = RevisionLoop::new(stage, store.clone()).with_max_iterations(3);
        let ctx = ResearchContext::new("Acme Corp", "2026");
        // More feedback available than the cap allows.
        let mut lines = feedback(&["a", "b", "c", "d", "e"]);

        let summary = looper.run(&ctx, &mut lines).await.unwrap();

        assert_eq!(summary.state, LoopState::Capped);
        assert_eq!(summary.merged_count(), 3);
        assert_eq!(
            store.read(&id).unwrap().unwrap(),
            "## Overview\nBase.\n\n## Addition\nMore.\n\n## Addition\nMore.\n\n## Addition\nMore.\n"
        );
    }

    #[tokio::test]
    async fn test_merge_monotonicity_across_iterations() {
        let (store, id) = seeded_store("## Overview\nBase.\n");
        let stage = Arc::new(ScriptedRevision {
            raw: "```markdown\n## Next\nSection.\n```".to_string(),
        });

        let looper = RevisionLoop::new(stage, store.clone());
        let ctx = ResearchContext::new("Acme Corp", "2026");
        let mut lines = feedback(&["one", "two", ""]);

        looper.run(&ctx, &mut lines).await.unwrap();

        assert_eq!(
            store.read(&id).unwrap().unwrap(),
            "## Overview\nBase.\n\n## Next\nSection.\n\n## Next\nSection.\n"
        );
        // Ledger holds both accepted sections.
        assert_eq!(
            store.read_feedback(&id).unwrap().unwrap(),
            "## Next\nSection.\n\n## Next\nSection.\n"
        );
    }

    #[tokio::test]
    async fn test_fatal_stage_failure_propagates() {
        #[derive(Debug)]
        struct FatalRevision;

        #[async_trait]
        impl Stage for FatalRevision {
            fn name(&self) -> &str {
                "revise_report"
            }

            fn section(&self) -> Section {
                Section::Revision
            }

            async fn execute(&self, _ctx: &ResearchContext) -> Result<String, StageFailure> {
                Err(StageFailure::fatal(
                    "revise_report",
                    anyhow::anyhow!("synthesizer misconfigured"),
                ))
            }
        }

        let (store, _id) = seeded_store("## Overview\n");
        let looper = RevisionLoop::new(Arc::new(FatalRevision), store);
        let ctx = ResearchContext::new("Acme Corp", "2026");
        let mut lines = feedback(&["anything"]);

        let err = looper.run(&ctx, &mut lines).await.unwrap_err();
        assert!(err.to_string().contains("revise_report"));
    }

    #[tokio::test]
    async fn test_preview_is_truncated() {
        let (store, id) = seeded_store(&format!("## Overview\n{}\n", "x".repeat(100)));
        let stage = Arc::new(ScriptedRevision {
            raw: "## A\nb".to_string(),
        });
        let looper = RevisionLoop::new(stage, store).with_preview_chars(20);

        let preview = looper.preview(&id).unwrap().unwrap();
        assert!(preview.chars().count() <= 21);
        assert!(preview.ends_with('…'));
    }
}
