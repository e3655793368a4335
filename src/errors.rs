//! Error taxonomy for the research pipeline.
//!
//! Failures are tagged at the boundary that observes them: adapters return
//! [`ToolError`] variants, stages wrap those into [`StageFailure::Transient`]
//! or [`StageFailure::Fatal`], and the store reports [`StoreError`]. Nothing
//! upstream re-derives a classification from error text.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for pipeline and revision-loop runs.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// A fatal stage failure that aborted the run.
    #[error(transparent)]
    Stage(#[from] StageFailure),

    /// A report store I/O failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stage attempted to overwrite a context section set by an earlier stage.
    #[error(transparent)]
    Context(#[from] SectionConflict),

    /// The stage sequence finished but no report was ever persisted.
    #[error("no report was produced for '{subject}'; the report-writing stage and its fallbacks all failed")]
    ReportMissing {
        /// The research subject.
        subject: String,
    },

    /// Reading feedback from the interactive prompt failed.
    #[error("feedback prompt failed: {0}")]
    Prompt(#[from] std::io::Error),
}

/// The outcome classification for a failed stage execution.
///
/// Transient failures are absorbed by the orchestrator (fallback synthesis,
/// run continues) or by the revision loop (iteration marked as an error, loop
/// continues). Fatal failures propagate and abort the run.
#[derive(Debug, Error)]
pub enum StageFailure {
    /// An upstream tool or model produced an invalid or empty response.
    /// Recoverable; the caller logs a warning and continues.
    #[error("stage '{stage}' hit a transient tool failure: {message}")]
    Transient {
        /// The failing stage.
        stage: String,
        /// What went wrong, including a suggested remedy.
        message: String,
    },

    /// Anything else. Aborts the run, wrapped with the stage name.
    #[error("stage '{stage}' failed: {cause}")]
    Fatal {
        /// The failing stage.
        stage: String,
        /// The original cause.
        cause: anyhow::Error,
    },
}

impl StageFailure {
    /// Creates a transient failure for a stage.
    #[must_use]
    pub fn transient(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Creates a fatal failure for a stage.
    #[must_use]
    pub fn fatal(stage: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        Self::Fatal {
            stage: stage.into(),
            cause: cause.into(),
        }
    }

    /// Returns true if the failure is recoverable.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns the name of the failing stage.
    #[must_use]
    pub fn stage(&self) -> &str {
        match self {
            Self::Transient { stage, .. } | Self::Fatal { stage, .. } => stage,
        }
    }
}

/// Categorized failures from data-source adapters.
///
/// Decided at the adapter boundary; every variant is treated as transient by
/// the stages that consume it.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// The credential for this tool is not configured.
    #[error("tool '{tool}' is missing credentials; set {variable} in the environment or .env")]
    MissingCredentials {
        /// The tool name.
        tool: String,
        /// The environment variable that holds the credential.
        variable: String,
    },

    /// The upstream service returned an error or an unparseable response.
    #[error("tool '{tool}' upstream error: {message}")]
    Upstream {
        /// The tool name.
        tool: String,
        /// Description of the upstream problem.
        message: String,
    },

    /// The query executed but matched nothing.
    #[error("tool '{tool}' found no results for '{query}'")]
    NoResults {
        /// The tool name.
        tool: String,
        /// The query that matched nothing.
        query: String,
    },
}

impl ToolError {
    /// Creates a missing-credentials error.
    #[must_use]
    pub fn missing_credentials(tool: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::MissingCredentials {
            tool: tool.into(),
            variable: variable.into(),
        }
    }

    /// Creates an upstream error.
    #[must_use]
    pub fn upstream(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Creates a no-results error.
    #[must_use]
    pub fn no_results(tool: impl Into<String>, query: impl Into<String>) -> Self {
        Self::NoResults {
            tool: tool.into(),
            query: query.into(),
        }
    }

    /// A remedy the operator can try, suitable for warning output.
    #[must_use]
    pub fn remedy(&self) -> &'static str {
        match self {
            Self::MissingCredentials { .. } => "check the credential in your environment",
            Self::Upstream { .. } => "retry once the upstream service recovers",
            Self::NoResults { .. } => "retry with a more specific query",
        }
    }
}

/// Report store I/O failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading a stored document failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The document path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Writing a stored document failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The document path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Error raised when a stage overwrites an already-recorded context section.
#[derive(Debug, Clone, Error)]
#[error("context section '{section}' is already set; stages may not overwrite prior output")]
pub struct SectionConflict {
    /// The conflicting section key.
    pub section: &'static str,
}

impl SectionConflict {
    /// Creates a new section conflict error.
    #[must_use]
    pub fn new(section: &'static str) -> Self {
        Self { section }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let failure = StageFailure::transient("analyze_financials", "empty response");
        assert!(failure.is_transient());
        assert_eq!(failure.stage(), "analyze_financials");
    }

    #[test]
    fn test_fatal_classification() {
        let failure = StageFailure::fatal(
            "gather_info",
            std::io::Error::other("disk on fire"),
        );
        assert!(!failure.is_transient());
        assert!(failure.to_string().contains("gather_info"));
        assert!(failure.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_tool_error_remedies() {
        let err = ToolError::missing_credentials("serp_search", "SERP_API_KEY");
        assert!(err.to_string().contains("SERP_API_KEY"));
        assert!(err.remedy().contains("credential"));

        let err = ToolError::no_results("wikipedia", "Acme Corp");
        assert!(err.remedy().contains("query"));
    }

    #[test]
    fn test_section_conflict_display() {
        let err = SectionConflict::new("financials");
        assert!(err.to_string().contains("financials"));
    }
}
