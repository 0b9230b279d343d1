//! Interactive chat mode.
//!
//! Each session gets a fresh conversation id so the planner and the answer
//! prompts see the earlier turns. When the agent asks a clarification
//! question, the next line is sent back as the answer together with the
//! attachment that triggered it.

use anyhow::Result;
use colored::Colorize;
use conduit_orchestrator::{Agent, AgentConfig, AgentRequest, Attachment, ResponseStatus};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

use super::setup;

/// What to do with one line of input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Clear,
    Help,
    Empty,
    Message(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    match line.trim() {
        "/quit" | "/exit" | "/q" => Input::Quit,
        "/clear" => Input::Clear,
        "/help" | "/h" => Input::Help,
        "" => Input::Empty,
        text => Input::Message(text),
    }
}

/// Builds the next request. A pending question turns the line into its answer.
fn next_request(
    text: &str,
    conversation_id: &str,
    attachment: Option<Attachment>,
    awaiting_answer: bool,
) -> AgentRequest {
    let mut request = AgentRequest::new(text).with_conversation_id(conversation_id);
    if awaiting_answer {
        request = request.with_clarification_answer(text);
    }
    if let Some(attachment) = attachment {
        request = request.with_attachment(attachment);
    }
    request
}

/// Execute the chat command.
pub async fn execute(config: &AgentConfig, file: Option<PathBuf>) -> Result<()> {
    let agent = Agent::from_config(config)?;
    let attachment = file.as_deref().map(setup::read_attachment).transpose()?;

    let stdin = io::stdin();
    chat_loop(&agent, stdin.lock(), attachment).await
}

async fn chat_loop<R: BufRead>(agent: &Agent, mut reader: R, mut attachment: Option<Attachment>) -> Result<()> {
    let conversation_id = Uuid::new_v4().to_string();
    debug!(conversation_id = %conversation_id, "Starting chat session");

    println!("{}", "conduit chat".bold().cyan());
    println!("  Conversation: {}", conversation_id.dimmed());
    if let Some(name) = attachment.as_ref().and_then(|a| a.file_name.as_deref()) {
        println!("  Attached: {}", name.cyan());
    }
    println!("  Type {} for commands, {} to exit.", "/help".cyan(), "/quit".cyan());

    let mut awaiting_answer = false;
    loop {
        print!("\n{} ", ">".green().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }

        let text = match classify(&line) {
            Input::Quit => break,
            Input::Empty => continue,
            Input::Help => {
                println!("  /clear  forget this conversation");
                println!("  /quit   leave");
                continue;
            }
            Input::Clear => {
                agent.history().clear(&conversation_id).await?;
                awaiting_answer = false;
                println!("Conversation history cleared.");
                continue;
            }
            Input::Message(text) => text,
        };

        let request = next_request(text, &conversation_id, attachment.clone(), awaiting_answer);
        let response = agent.run(request).await;
        println!();
        setup::print_response(&response);

        awaiting_answer = response.status == ResponseStatus::NeedsClarification;
        if response.status == ResponseStatus::Success {
            attachment = None;
        }
    }

    println!("\nGoodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_commands() {
        assert_eq!(classify("/quit\n"), Input::Quit);
        assert_eq!(classify("/q"), Input::Quit);
        assert_eq!(classify("/clear"), Input::Clear);
        assert_eq!(classify("   \n"), Input::Empty);
        assert_eq!(classify(" hello \n"), Input::Message("hello"));
    }

    #[test]
    fn test_answer_carries_attachment() {
        let attachment = Attachment::new(vec![1, 2, 3]).with_file_name("cv.pdf");

        let request = next_request("backend engineer", "c1", Some(attachment.clone()), true);

        assert_eq!(request.text.as_deref(), Some("backend engineer"));
        assert_eq!(request.clarification_answer.as_deref(), Some("backend engineer"));
        assert_eq!(request.conversation_id.as_deref(), Some("c1"));
        assert_eq!(request.attachment, Some(attachment));
    }

    #[test]
    fn test_plain_message_has_no_answer() {
        let request = next_request("hello", "c1", None, false);
        assert!(request.clarification_answer.is_none());
        assert!(request.attachment.is_none());
    }

    #[tokio::test]
    async fn test_loop_ends_on_eof() {
        let mut config = AgentConfig::default();
        config.model.provider = Some("mock".to_string());
        let agent = Agent::from_config(&config).unwrap();

        chat_loop(&agent, io::Cursor::new("hi\n/clear\n"), None).await.unwrap();
    }
}
