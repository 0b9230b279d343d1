//! Request routing for Conduit.
//!
//! A [`Planner`] turns a user's message (plus an optional attachment, video
//! link, conversation history and clarification answer) into an ordered list
//! of [`PlanStep`]s. An [`Executor`] runs those steps against a shared
//! context, dispatching to content extraction collaborators and model
//! prompts, and returns an [`AgentResponse`] with a log of every step.
//! [`Agent`] wires both to a [`HistoryStore`].

pub mod agent;
pub mod config;
pub mod error;
pub mod executor;
pub mod extraction;
pub mod history;
pub mod json;
pub mod planner;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent::{Agent, AgentRequest, Attachment};
pub use config::{AgentConfig, ModelSettings};
pub use error::{AgentError, ConfigError, ExtractionError, Result};
pub use executor::{ExecutionContext, ExecutionInput, Executor};
pub use extraction::{
    AudioService, AudioTranscriber, Extraction, ImageTextExtractor, PdfExtractService,
    PdfTextExtractor, Transcript, TranscriptFetcher, VisionOcrService, YouTubeTranscriptService,
};
pub use history::{HistoryMessage, HistoryStore, InMemoryHistoryStore, Role};
pub use planner::{PlanOutcome, PlanStatus, Planner, PlanningInput};
pub use types::{
    AgentResponse, FileKind, LogEntry, PlanStep, ResponseStatus, StepKind, StepStatus, TaskType,
};
