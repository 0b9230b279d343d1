//! Run command implementation.
//!
//! Sends one request through the agent and prints the result.

use anyhow::{Result, bail};
use colored::Colorize;
use conduit_orchestrator::{Agent, AgentConfig, AgentRequest, ResponseStatus};
use std::path::PathBuf;

use super::setup;

/// Options for a single request.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub text: Option<String>,
    pub file: Option<PathBuf>,
    pub conversation_id: Option<String>,
    pub clarification_answer: Option<String>,
    pub json: bool,
}

/// Builds the request described by `options`.
fn build_request(options: &RunOptions) -> Result<AgentRequest> {
    if options.text.is_none() && options.file.is_none() {
        bail!("Nothing to run: pass request text, --file, or both");
    }

    let mut request = AgentRequest { text: options.text.clone(), ..AgentRequest::default() };
    if let Some(path) = &options.file {
        request = request.with_attachment(setup::read_attachment(path)?);
    }
    if let Some(id) = &options.conversation_id {
        request = request.with_conversation_id(id.clone());
    }
    if let Some(answer) = &options.clarification_answer {
        request = request.with_clarification_answer(answer.clone());
    }
    Ok(request)
}

/// Execute the run command.
pub async fn execute(config: &AgentConfig, options: RunOptions) -> Result<()> {
    let request = build_request(&options)?;
    let agent = Agent::from_config(config)?;

    if !options.json {
        println!("{}", "conduit run".bold().cyan());
        println!();
    }

    let response = agent.run(request).await;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        setup::print_response(&response);
    }

    if response.status == ResponseStatus::Error {
        bail!(response.error.unwrap_or_else(|| "request failed".to_string()));
    }
    Ok(())
}
