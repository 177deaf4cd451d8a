//! `glossa translate` — Run one translation workflow in the terminal.
//!
//! The workflow runs on its own task while this command renders the
//! observable state: streamed reasoning and text go to stdout, each review
//! request is printed with its candidate, and the reviewer answers on stdin.

use glossa_agent::{Agent, WorkflowOutcome};
use glossa_config::AppConfig;
use glossa_core::agent::PendingDecision;
use glossa_core::error::ProviderError;
use glossa_core::memory::WorkingMemory;
use glossa_core::message::{AssistantContent, ContextMessage, MessageBody, ToolInput, ToolStatus};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

pub async fn run(text: Option<String>, file: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let provider = match glossa_providers::build_from_config(&config) {
        Ok(provider) => provider,
        Err(ProviderError::NotConfigured(reason)) => {
            eprintln!();
            eprintln!("  ERROR: {reason}");
            eprintln!();
            eprintln!("  Set one of these environment variables:");
            eprintln!("    DEEPSEEK_API_KEY=sk-...   (default provider)");
            eprintln!("    OPENAI_API_KEY=sk-...     (with default_provider = \"openai\")");
            eprintln!("    GLOSSA_API_KEY=sk-...     (any provider)");
            eprintln!();
            eprintln!("  Or add it to your config file:");
            eprintln!("    {}", AppConfig::config_path().display());
            eprintln!();
            return Err("Provider not configured. See above for setup instructions.".into());
        }
        Err(e) => return Err(e.into()),
    };

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let source = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        (None, None) => {
            prompt("  Text > ")?;
            stdin.next_line().await?.unwrap_or_default()
        }
    };
    if source.trim().is_empty() {
        return Err("Nothing to translate".into());
    }

    let agent = Arc::new(Agent::from_config(&config, provider));
    agent.init();

    println!();
    println!("  Provider:  {}", agent.provider_name());
    println!("  Model:     {}", agent.options().reasoning_model);
    println!("  Target:    {}", config.translation.target_language);
    println!("  Review:    y to approve, n [reason] to reject, Ctrl+C to stop");
    println!();

    debug!(chars = source.chars().count(), "Submitting text");
    let worker = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.submit(source).await })
    };
    tokio::pin!(worker);

    let mut messages = agent.subscribe_messages();
    let mut pending = agent.subscribe_pending();
    let mut renderer = Renderer::default();
    let mut awaiting: Option<PendingDecision> = None;

    let result = loop {
        tokio::select! {
            joined = &mut worker => break joined?,
            Ok(()) = messages.changed() => {
                let log = messages.borrow_and_update().clone();
                renderer.render(&log)?;
            }
            Ok(()) = pending.changed() => {
                let decision = pending.borrow_and_update().clone();
                if let Some(decision) = &decision {
                    renderer.render(&agent.messages())?;
                    print_review(decision, &agent.working_memory())?;
                }
                awaiting = decision;
            }
            line = stdin.next_line(), if awaiting.is_some() => {
                let Some(line) = line? else {
                    // Stdin closed, nobody is left to review
                    agent.cancel();
                    continue;
                };
                match parse_review(&line) {
                    Some(ReviewInput::Approve) => {
                        agent.approve();
                    }
                    Some(ReviewInput::Reject(reason)) => {
                        agent.reject(reason);
                    }
                    None => prompt("  Please answer y or n [reason] > ")?,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n  Stopping...");
                agent.cancel();
            }
        }
    };

    renderer.render(&agent.messages())?;
    println!();

    match result {
        Ok(WorkflowOutcome::Completed) => {
            print_results(&agent.working_memory());
            Ok(())
        }
        Ok(WorkflowOutcome::Aborted) => {
            println!("  Translation stopped.");
            print_results(&agent.working_memory());
            Ok(())
        }
        Err(e) => {
            eprintln!("  [Error] {e}");
            print_results(&agent.working_memory());
            Err(e.into())
        }
    }
}

fn prompt(text: &str) -> std::io::Result<()> {
    print!("{text}");
    std::io::stdout().flush()
}

/// A reviewer's answer.
#[derive(Debug, PartialEq, Eq)]
enum ReviewInput {
    Approve,
    Reject(Option<String>),
}

/// Parse `y`, `yes`, `n`, `no`, optionally followed by a rejection reason.
fn parse_review(line: &str) -> Option<ReviewInput> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_lowercase().as_str() {
        "y" | "yes" if rest.is_empty() => Some(ReviewInput::Approve),
        "n" | "no" => Some(ReviewInput::Reject(
            (!rest.is_empty()).then(|| rest.to_string()),
        )),
        _ => None,
    }
}

fn print_review(decision: &PendingDecision, memory: &WorkingMemory) -> std::io::Result<()> {
    let payload = &decision.payload;
    let sentence = payload["sentence"].as_str().unwrap_or_default();
    let translated = payload["translated"].as_str().unwrap_or_default();
    let attempt = payload["attempt"].as_u64().unwrap_or(1);

    let position = usize::try_from(memory.current_translation_index + 2).unwrap_or(1);
    let total = memory.split_texts.len().max(position);

    println!();
    println!("  ┌ Review segment {position}/{total} (attempt {attempt})");
    println!("  │ original:   {sentence}");
    println!("  │ candidate:  {translated}");
    prompt("  └ Approve? [y / n <reason>] > ")
}

fn print_results(memory: &WorkingMemory) {
    if memory.translation_results.is_empty() {
        return;
    }

    println!("  #  | Rejections | Original → Translation");
    println!("  ---+------------+-----------------------");
    for (i, result) in memory.translation_results.iter().enumerate() {
        println!(
            "  {:<2} | {:<10} | {} → {}",
            i + 1,
            result.rejection_count,
            result.original.trim(),
            result.translated
        );
    }
    println!();
    println!("  {}", memory.assembled_translation());
    println!();
}

/// Prints the message log incrementally.
#[derive(Default)]
struct Renderer {
    /// Bytes already printed per streaming message
    printed: HashMap<String, usize>,
    /// Messages whose final form has been printed
    done: HashSet<String>,
}

impl Renderer {
    fn render(&mut self, log: &[ContextMessage]) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();

        for message in log {
            match &message.body {
                MessageBody::System { .. } | MessageBody::User { .. } => {}
                MessageBody::Assistant { content } => match content {
                    AssistantContent::Reasoning { text } => {
                        self.stream(&mut out, &message.id, "  (thinking) ", text)?
                    }
                    AssistantContent::Text { text } => {
                        self.stream(&mut out, &message.id, "  Assistant > ", text)?
                    }
                    AssistantContent::ToolCalls { calls } => {
                        let complete = calls
                            .iter()
                            .all(|call| matches!(call.input, ToolInput::Complete(_)));
                        if complete && self.done.insert(message.id.clone()) {
                            for call in calls {
                                writeln!(out, "\n  → {}({})", call.tool_name, call.input.to_arguments())?;
                            }
                        }
                    }
                },
                MessageBody::Tool { status, results } => {
                    if *status == ToolStatus::Pending || !self.done.insert(message.id.clone()) {
                        continue;
                    }
                    for result in results {
                        match status {
                            ToolStatus::Approved => writeln!(out, "  ✓ {}", result.tool_name)?,
                            _ => writeln!(
                                out,
                                "  ✗ {}: {}",
                                result.tool_name,
                                result.output["error"].as_str().unwrap_or("failed")
                            )?,
                        }
                    }
                }
            }
        }

        out.flush()
    }

    fn stream(
        &mut self,
        out: &mut impl Write,
        id: &str,
        label: &str,
        text: &str,
    ) -> std::io::Result<()> {
        let printed = self.printed.entry(id.to_string()).or_insert(0);
        if text.len() <= *printed {
            return Ok(());
        }
        if *printed == 0 {
            write!(out, "\n{label}")?;
        }
        // Streaming only ever appends, so the old length is a char boundary
        write!(out, "{}", &text[*printed..])?;
        *printed = text.len();
        Ok(())
    }
}
