//! Conduit CLI
//!
//! Command-line front end for the Conduit request router: plans a request,
//! runs the plan and prints what each step did.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{chat, run, setup};

/// Conduit - plan and run multimodal requests
#[derive(Parser, Debug)]
#[command(name = "conduit")]
#[command(about = "Plan and run requests over text, documents, images, audio and video links", long_about = None)]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Configuration file to use instead of the discovered ones
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model provider (gemini, mock)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model id
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single request and print the plan, step log and output
    Run {
        /// Request text
        text: Option<String>,

        /// File to attach (PDF, image or audio)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Conversation id for history
        #[arg(long)]
        conversation_id: Option<String>,

        /// Answer to a previous clarification question
        #[arg(long)]
        clarification_answer: Option<String>,

        /// Print the raw response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive conversation
    Chat {
        /// File to attach to the first message
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn parse_level(name: &str) -> Level {
    match name.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let overrides = setup::Overrides {
        config: args.config.clone(),
        provider: args.provider.clone(),
        model: args.model.clone(),
    };
    let config = setup::load_config(&overrides)?;

    // Flag, then config file, then info
    let level_name = args.log_level.as_deref().or(config.log_level.as_deref()).unwrap_or("info");
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level_name))
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Run { text, file, conversation_id, clarification_answer, json } => {
            run::execute(
                &config,
                run::RunOptions { text, file, conversation_id, clarification_answer, json },
            )
            .await?;
        }
        Command::Chat { file } => {
            chat::execute(&config, file).await?;
        }
    }

    Ok(())
}
