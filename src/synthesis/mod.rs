//! The prose-generation collaborator.
//!
//! The pipeline treats generation as an external capability behind the
//! [`Synthesizer`] trait: given gathered material (and optionally user
//! feedback), produce markdown prose for one section. The shipped
//! [`OutlineSynthesizer`] is deterministic so the binary runs end to end
//! without a model; a model-backed implementation slots in behind the same
//! trait.

use crate::context::Section;
use crate::errors::ToolError;
use async_trait::async_trait;
use std::fmt;

/// A request to compose one section of prose.
#[derive(Debug, Clone)]
pub struct ComposeRequest<'a> {
    /// The section being composed.
    pub section: Section,
    /// The research subject.
    pub topic: &'a str,
    /// The year the run was started in.
    pub current_year: &'a str,
    /// Labeled source material, in the order it was gathered.
    pub material: Vec<(&'static str, &'a str)>,
    /// User feedback, present only for revision requests.
    pub feedback: Option<&'a str>,
}

impl<'a> ComposeRequest<'a> {
    /// Creates a request with no material.
    #[must_use]
    pub fn new(section: Section, topic: &'a str, current_year: &'a str) -> Self {
        Self {
            section,
            topic,
            current_year,
            material: Vec::new(),
            feedback: None,
        }
    }

    /// Adds a labeled piece of source material.
    #[must_use]
    pub fn with_material(mut self, label: &'static str, text: &'a str) -> Self {
        self.material.push((label, text));
        self
    }

    /// Sets the feedback text for a revision request.
    #[must_use]
    pub fn with_feedback(mut self, feedback: &'a str) -> Self {
        self.feedback = Some(feedback);
        self
    }
}

/// Turns gathered material into markdown prose.
#[async_trait]
pub trait Synthesizer: Send + Sync + fmt::Debug {
    /// Composes the requested section.
    async fn compose(&self, request: &ComposeRequest<'_>) -> Result<String, ToolError>;
}

/// Deterministic synthesizer that assembles material under headings.
#[derive(Debug, Clone, Default)]
pub struct OutlineSynthesizer;

impl OutlineSynthesizer {
    /// Creates the synthesizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Synthesizer for OutlineSynthesizer {
    async fn compose(&self, request: &ComposeRequest<'_>) -> Result<String, ToolError> {
        match request.section {
            Section::Report => Ok(compose_report(request)),
            Section::Revision => Ok(compose_revision(request)),
            section => Ok(compose_section(section, request)),
        }
    }
}

fn compose_section(section: Section, request: &ComposeRequest<'_>) -> String {
    let mut out = format!("## {}\n", section.heading());
    if request.material.is_empty() {
        out.push_str(&format!(
            "\nNo source material was gathered for {} in {}.\n",
            request.topic, request.current_year
        ));
        return out;
    }
    for (label, text) in &request.material {
        out.push_str(&format!("\n### {label}\n\n{}\n", text.trim()));
    }
    out
}

fn compose_report(request: &ComposeRequest<'_>) -> String {
    let mut out = format!(
        "# {} Research Report ({})\n",
        request.topic, request.current_year
    );
    for (label, text) in &request.material {
        out.push_str(&format!("\n## {label}\n\n{}\n", text.trim()));
    }
    out
}

fn compose_revision(request: &ComposeRequest<'_>) -> String {
    let feedback = request.feedback.unwrap_or("requested change");
    let mut out = format!("## Revision: {}\n\n", title_case(feedback));
    out.push_str(&format!(
        "Addresses the request \"{feedback}\" for {} ({}).\n",
        request.topic, request.current_year
    ));
    for (label, text) in &request.material {
        out.push_str(&format!("\n### {label}\n\n{}\n", text.trim()));
    }
    out
}

fn title_case(text: &str) -> String {
    let mut chars = text.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
