//! CLI front-ends for retrieval and question answering.

use anyhow::{bail, Result};

use docqa_core::models::Source;

use crate::config::Config;
use crate::services::Services;

/// Collapse whitespace and cut to `max` characters for terminal output.
fn snippet(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}...", cut)
    }
}

fn print_sources(sources: &[Source]) {
    for (i, source) in sources.iter().enumerate() {
        println!(
            "{}. [{:.3}] {}",
            i + 1,
            source.relevance_score,
            source.document
        );
        println!("    {}", snippet(&source.chunk_text, 200));
    }
}

/// `docqa retrieve <question> [--top-k N]`
pub async fn run_retrieve(config: &Config, question: &str, top_k: Option<usize>) -> Result<()> {
    if question.trim().is_empty() {
        bail!("question cannot be empty");
    }
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let services = Services::from_config(config).await?;
    let sources = services
        .assistant
        .retriever()
        .retrieve(question, top_k)
        .await?;
    services.close().await;

    if sources.is_empty() {
        println!("No results.");
    } else {
        print_sources(&sources);
    }
    Ok(())
}

/// `docqa ask <question>`
pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let services = Services::from_config(config).await?;
    let answer = services.assistant.ask(question).await;
    services.close().await;
    let answer = answer?;

    println!("{}", answer.answer.trim());
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        print_sources(&answer.sources);
    }
    Ok(())
}
