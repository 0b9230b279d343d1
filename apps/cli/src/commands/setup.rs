//! Shared setup for the commands: configuration layering, attachment loading
//! and response rendering.

use anyhow::{Context, Result};
use colored::Colorize;
use conduit_orchestrator::{AgentConfig, AgentResponse, Attachment, ResponseStatus, StepStatus};
use std::path::{Path, PathBuf};

/// Values given on the command line that override configuration.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Loads configuration: files (or the one named by `--config`), then the
/// environment, then flags.
pub fn load_config(overrides: &Overrides) -> Result<AgentConfig> {
    let mut config = match &overrides.config {
        Some(path) => {
            let mut config = AgentConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => AgentConfig::discover_and_load().context("Failed to load configuration")?,
    };
    apply_overrides(&mut config, overrides);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn apply_overrides(config: &mut AgentConfig, overrides: &Overrides) {
    if let Some(provider) = &overrides.provider {
        config.model.provider = Some(provider.clone());
    }
    if let Some(model) = &overrides.model {
        config.model.model_id = Some(model.clone());
    }
}

/// Reads a file into an attachment, guessing its MIME type from the name.
pub fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut attachment = Attachment::new(bytes);
    if let Some(name) = path.file_name() {
        attachment = attachment.with_file_name(name.to_string_lossy());
    }
    if let Some(mime) = mime_guess::from_path(path).first() {
        attachment = attachment.with_mime_type(mime.essence_str());
    }
    Ok(attachment)
}

fn status_marker(status: StepStatus) -> colored::ColoredString {
    match status {
        StepStatus::Completed => "✓".green(),
        StepStatus::Failed => "✗".red(),
        StepStatus::Running => "…".yellow(),
        StepStatus::Pending => "·".dimmed(),
    }
}

/// Prints the plan, the step log and the output.
pub fn print_response(response: &AgentResponse) {
    match response.status {
        ResponseStatus::Error => {
            println!("{} {}", "Error:".red().bold(), response.error.as_deref().unwrap_or("unknown error"));
            return;
        }
        ResponseStatus::NeedsClarification => {
            println!(
                "{} {}",
                "?".yellow().bold(),
                response.clarification_question.as_deref().unwrap_or_default()
            );
            return;
        }
        ResponseStatus::Success => {}
    }

    println!("{}", "Plan:".bold());
    for (index, step) in response.plan.iter().enumerate() {
        println!("  {}. {} {} {}", index + 1, status_marker(step.status), step.name.cyan(), step.description.dimmed());
    }

    if !response.logs.is_empty() {
        println!();
        println!("{}", "Steps:".bold());
        for entry in &response.logs {
            println!(
                "  {} {} ({:.0} ms)",
                status_marker(entry.status),
                entry.step_name.cyan(),
                entry.duration_ms
            );
            println!("      in:  {}", entry.input_summary.dimmed());
            println!("      out: {}", entry.output_summary.dimmed());
        }
    }

    println!();
    if let Some(task_type) = response.task_type {
        println!("{} {}", "Task:".bold(), task_type);
    }
    match response.message() {
        Some(message) => println!("{message}"),
        None if !response.final_output.is_empty() => {
            let output = serde_json::to_string_pretty(&response.final_output).unwrap_or_default();
            println!("{output}");
        }
        None => {}
    }
}
