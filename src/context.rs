//! Typed run context shared across pipeline stages.
//!
//! Each stage reads the sections recorded by its predecessors and records
//! exactly one new section. Recording an already-set section is a conflict;
//! the revision loop's merge path is the only sanctioned way report content
//! is ever replaced.

use crate::errors::SectionConflict;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The context sections a stage can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    /// General company background from search and encyclopedia sources.
    CompanyProfile,
    /// Financial analysis from market-quote data.
    Financials,
    /// Competitive and market positioning.
    MarketPosition,
    /// News and public-sentiment summary.
    Sentiment,
    /// The assembled report.
    Report,
    /// A revision delta produced from user feedback.
    Revision,
}

impl Section {
    /// The stable identifier for this section.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::CompanyProfile => "company_profile",
            Self::Financials => "financials",
            Self::MarketPosition => "market_position",
            Self::Sentiment => "sentiment",
            Self::Report => "report",
            Self::Revision => "revision",
        }
    }

    /// The display heading used when rendering this section as markdown.
    #[must_use]
    pub fn heading(self) -> &'static str {
        match self {
            Self::CompanyProfile => "Company Profile",
            Self::Financials => "Financial Analysis",
            Self::MarketPosition => "Market Position",
            Self::Sentiment => "Sentiment",
            Self::Report => "Report",
            Self::Revision => "Revision",
        }
    }
}

/// The shared context for one pipeline run.
///
/// Field presence is checked at compile time instead of through runtime key
/// lookups; a missing section reads as `None`, never as a lookup failure.
#[derive(Debug, Clone)]
pub struct ResearchContext {
    run_id: Uuid,
    topic: String,
    current_year: String,
    company_profile: Option<String>,
    financials: Option<String>,
    market_position: Option<String>,
    sentiment: Option<String>,
    report: Option<String>,
    revision: Option<String>,
    user_feedback: Option<String>,
}

impl ResearchContext {
    /// Creates a context for a subject with an explicit year.
    #[must_use]
    pub fn new(topic: impl Into<String>, current_year: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            topic: topic.into(),
            current_year: current_year.into(),
            company_profile: None,
            financials: None,
            market_position: None,
            sentiment: None,
            report: None,
            revision: None,
            user_feedback: None,
        }
    }

    /// Creates a context for a subject using the current calendar year.
    #[must_use]
    pub fn for_subject(topic: impl Into<String>) -> Self {
        Self::new(topic, Utc::now().year().to_string())
    }

    /// The run identifier, used for log correlation.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The research subject.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The year the run was started in.
    #[must_use]
    pub fn current_year(&self) -> &str {
        &self.current_year
    }

    /// Reads a recorded section, if present.
    #[must_use]
    pub fn section(&self, section: Section) -> Option<&str> {
        self.slot(section).as_deref()
    }

    /// Records a section produced by a stage.
    ///
    /// # Errors
    ///
    /// Returns [`SectionConflict`] if the section was already recorded by an
    /// earlier stage.
    pub fn record(&mut self, section: Section, text: String) -> Result<(), SectionConflict> {
        let slot = self.slot_mut(section);
        if slot.is_some() {
            return Err(SectionConflict::new(section.key()));
        }
        *slot = Some(text);
        Ok(())
    }

    /// The user's feedback text, when running a revision iteration.
    #[must_use]
    pub fn user_feedback(&self) -> Option<&str> {
        self.user_feedback.as_deref()
    }

    /// Returns a copy of this context scoped to one piece of feedback.
    ///
    /// Used by the revision loop; the per-iteration context carries the
    /// original topic and year but fresh feedback.
    #[must_use]
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.user_feedback = Some(feedback.into());
        self
    }

    /// The research sections recorded so far, in pipeline order.
    ///
    /// Excludes the report itself; this is the material the report-writing
    /// stage assembles from.
    #[must_use]
    pub fn gathered(&self) -> Vec<(Section, &str)> {
        [
            Section::CompanyProfile,
            Section::Financials,
            Section::MarketPosition,
            Section::Sentiment,
        ]
        .into_iter()
        .filter_map(|s| self.section(s).map(|text| (s, text)))
        .collect()
    }

    fn slot(&self, section: Section) -> &Option<String> {
        match section {
            Section::CompanyProfile => &self.company_profile,
            Section::Financials => &self.financials,
            Section::MarketPosition => &self.market_position,
            Section::Sentiment => &self.sentiment,
            Section::Report => &self.report,
            Section::Revision => &self.revision,
        }
    }

    fn slot_mut(&mut self, section: Section) -> &mut Option<String> {
        match section {
            Section::CompanyProfile => &mut self.company_profile,
            Section::Financials => &mut self.financials,
            Section::MarketPosition => &mut self.market_position,
            Section::Sentiment => &mut self.sentiment,
            Section::Report => &mut self.report,
            Section::Revision => &mut self.revision,
        }
    }
}
