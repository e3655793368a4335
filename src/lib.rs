//! # Researchflow
//!
//! A multi-stage company-research pipeline with an interactive revision
//! loop.
//!
//! The pipeline runs a fixed sequence of data-gathering and analysis stages,
//! writes the resulting report through a durable store, and then lets a
//! human refine the report iteratively: each piece of feedback drives one
//! revision stage whose output is extracted as a markdown delta and merged
//! into the stored report under snapshot discipline.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use researchflow::prelude::*;
//!
//! let store = Arc::new(FsReportStore::new("reports"));
//! let pipeline = Pipeline::research(search, wiki, quotes, news, synthesizer,
//!     store.clone(), "data");
//!
//! let run = pipeline.run(ResearchContext::for_subject("Acme Corp")).await?;
//! let looper = RevisionLoop::new(revise_stage, store);
//! looper.run(&run.context, &mut feedback).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod errors;
pub mod pipeline;
pub mod report;
pub mod revision;
pub mod stages;
pub mod synthesis;
pub mod tools;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Credentials, Settings};
    pub use crate::context::{ResearchContext, Section};
    pub use crate::errors::{
        ResearchError, SectionConflict, StageFailure, StoreError, ToolError,
    };
    pub use crate::pipeline::{FinancialFallback, Pipeline, PipelineRun};
    pub use crate::report::{
        extract_delta, merge_delta, normalize_body, FsReportStore, MemoryReportStore,
        ReportId, ReportStore,
    };
    pub use crate::revision::{
        FeedbackSource, IterationOutcome, LoopState, RevisionLoop, RevisionSummary,
    };
    pub use crate::stages::{run_stage, ReviseReportStage, Stage};
    pub use crate::synthesis::{ComposeRequest, OutlineSynthesizer, Synthesizer};
    pub use crate::tools::{ToolAdapter, ToolQuery};
}
