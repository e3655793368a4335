//! Interactive entry point: prompt for a subject, run the pipeline, then
//! drive the revision loop until the user is satisfied.

use anyhow::{Context as _, Result};
use console::style;
use dialoguer::Input;
use researchflow::config::{Credentials, Settings};
use researchflow::context::ResearchContext;
use researchflow::pipeline::Pipeline;
use researchflow::report::{FsReportStore, ReportStore};
use researchflow::revision::{FeedbackSource, LoopState, RevisionLoop};
use researchflow::stages::ReviseReportStage;
use researchflow::synthesis::OutlineSynthesizer;
use researchflow::tools::{
    http_client, NewsAdapter, QuoteAdapter, SerpSearchAdapter, WikipediaAdapter,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Reads feedback lines from the terminal. Blocks indefinitely; an empty
/// line ends the loop.
struct PromptFeedback;

impl FeedbackSource for PromptFeedback {
    fn next_feedback(&mut self) -> Result<String, std::io::Error> {
        Input::<String>::new()
            .with_prompt("Feedback (empty line to finish)")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| std::io::Error::other(e))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let credentials = Credentials::from_env();
    let settings = Settings::default();

    println!("{}", style("researchflow").cyan().bold());
    println!("{}", style("company research pipeline").dim());

    let subject: String = Input::new()
        .with_prompt("Company to research")
        .interact_text()
        .context("failed to read the subject")?;
    let subject = subject.trim().to_string();

    let client = http_client().context("failed to build the HTTP client")?;
    let search = Arc::new(SerpSearchAdapter::new(
        client.clone(),
        credentials.serp_api_key.clone(),
    ));
    let wikipedia = Arc::new(WikipediaAdapter::new(client.clone()));
    let quotes = Arc::new(QuoteAdapter::new(client.clone()));
    let news = Arc::new(NewsAdapter::new(
        client,
        credentials.news_api_key.clone(),
        Some(search.clone()),
    ));
    let synthesizer = Arc::new(OutlineSynthesizer::new());
    let store: Arc<dyn ReportStore> = Arc::new(FsReportStore::new(&settings.reports_dir));

    let pipeline = Pipeline::research(
        search,
        wikipedia,
        quotes,
        news,
        synthesizer.clone(),
        store.clone(),
        &settings.data_dir,
    );

    println!("\n{}", style(format!("Researching {subject} ...")).bold());
    let run = pipeline
        .run(ResearchContext::for_subject(&subject))
        .await
        .with_context(|| format!("research pipeline failed for '{subject}'"))?;

    if !run.degraded_stages.is_empty() {
        println!(
            "{}",
            style(format!(
                "Warning: {} ran in degraded mode (check credentials or retry later)",
                run.degraded_stages.join(", ")
            ))
            .yellow()
        );
    }

    let looper = RevisionLoop::new(Arc::new(ReviseReportStage::new(synthesizer)), store);
    if let Some(preview) = looper.preview(&run.report_id)? {
        println!("\n--- initial report ---\n{preview}\n");
    }

    println!("{}", style("Refine the report below.").bold());
    let summary = looper.run(&run.context, &mut PromptFeedback).await?;

    match summary.state {
        LoopState::Capped => println!(
            "{}",
            style("Iteration cap reached; the report keeps all merged revisions.").yellow()
        ),
        _ => println!("{}", style("Report finalized.").green()),
    }
    println!(
        "Merged {} revision(s). Report saved under {}/",
        summary.merged_count(),
        settings.reports_dir.display()
    );

    Ok(())
}
