//! Plan, log, and response types shared by the planner and the executor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The operations a plan can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// OCR an attached image.
    ExtractTextFromImage,
    /// Pull the text layer out of an attached PDF.
    ExtractTextFromPdf,
    /// Download captions for a video link in the message.
    FetchYoutubeTranscript,
    /// Transcribe and summarize an attached audio file.
    TranscribeAudio,
    /// Structured summary of the current content.
    Summarize,
    /// Sentiment label of the current content.
    SentimentAnalysis,
    /// Explain a code snippet.
    CodeExplanation,
    /// Free-form answer to the user's question.
    ConversationalAnswer,
}

impl StepKind {
    /// Every step kind, in the order they are presented to the planning model.
    pub const ALL: [StepKind; 8] = [
        StepKind::ExtractTextFromPdf,
        StepKind::ExtractTextFromImage,
        StepKind::FetchYoutubeTranscript,
        StepKind::TranscribeAudio,
        StepKind::Summarize,
        StepKind::SentimentAnalysis,
        StepKind::CodeExplanation,
        StepKind::ConversationalAnswer,
    ];

    /// Wire name of the step.
    pub const fn as_str(self) -> &'static str {
        match self {
            StepKind::ExtractTextFromImage => "extract_text_from_image",
            StepKind::ExtractTextFromPdf => "extract_text_from_pdf",
            StepKind::FetchYoutubeTranscript => "fetch_youtube_transcript",
            StepKind::TranscribeAudio => "transcribe_audio",
            StepKind::Summarize => "summarize",
            StepKind::SentimentAnalysis => "sentiment_analysis",
            StepKind::CodeExplanation => "code_explanation",
            StepKind::ConversationalAnswer => "conversational_answer",
        }
    }

    /// When the planning model should pick this step.
    pub const fn usage_hint(self) -> &'static str {
        match self {
            StepKind::ExtractTextFromPdf => "if a pdf is provided",
            StepKind::ExtractTextFromImage => "if an image is provided",
            StepKind::FetchYoutubeTranscript => "if a youtube url is provided",
            StepKind::TranscribeAudio => "if an audio file is provided",
            StepKind::Summarize => "works on any text or transcript",
            StepKind::SentimentAnalysis => "works on any text",
            StepKind::CodeExplanation => "works on code text",
            StepKind::ConversationalAnswer => "for general questions or follow-ups",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepKind::ALL.into_iter().find(|kind| kind.as_str() == s).ok_or(())
    }
}

/// Lifecycle of a plan step or log entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Not started.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Finished normally.
    Completed,
    /// Finished with a recorded failure.
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One named step of a plan.
///
/// `name` is kept as text so that names the executor does not recognize
/// survive into the response unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Operation name, normally one of [`StepKind`].
    pub name: String,
    /// Short human-readable description.
    #[serde(default)]
    pub description: String,
    /// Execution status, mutated only by the executor.
    #[serde(default)]
    pub status: StepStatus,
}

impl PlanStep {
    /// Creates a pending step for a known operation.
    pub fn new(kind: StepKind, description: impl Into<String>) -> Self {
        Self { name: kind.as_str().to_string(), description: description.into(), status: StepStatus::Pending }
    }

    /// The operation this step names, if it is a known one.
    pub fn kind(&self) -> Option<StepKind> {
        self.name.parse().ok()
    }
}

/// Observability record for one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Name of the step that ran.
    pub step_name: String,
    /// What the step was given.
    pub input_summary: String,
    /// What the step produced, or why it failed.
    pub output_summary: String,
    /// Final status of the step.
    pub status: StepStatus,
    /// Wall-clock time spent in the step.
    pub duration_ms: f64,
    /// Reserved for cost accounting; never populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,
}

/// Overall outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// The plan ran (individual steps may still have failed).
    Success,
    /// The request failed outside any step.
    Error,
    /// More information is needed before planning.
    NeedsClarification,
}

/// Classification of the work that produced `final_output`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// No step classified the request.
    #[default]
    General,
    /// Structured summary.
    Summarization,
    /// Sentiment analysis.
    Sentiment,
    /// Code explanation.
    CodeExplanation,
    /// Audio transcription with summary.
    AudioSummary,
    /// Conversational answer.
    Conversation,
}

impl TaskType {
    /// Wire name of the task type.
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskType::General => "general",
            TaskType::Summarization => "summarization",
            TaskType::Sentiment => "sentiment",
            TaskType::CodeExplanation => "code_explanation",
            TaskType::AudioSummary => "audio_summary",
            TaskType::Conversation => "conversation",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal value of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Overall outcome.
    pub status: ResponseStatus,
    /// Follow-up question when `status` is `needs_clarification`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
    /// Text produced by the last extraction step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    /// Merged structured output of all steps.
    #[serde(default)]
    pub final_output: Map<String, Value>,
    /// Classification set by the last classifying step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    /// The plan, with final step statuses.
    #[serde(default)]
    pub plan: Vec<PlanStep>,
    /// One entry per executed step, in plan order.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Reserved for cost accounting; never populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,
    /// Error message when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    /// A response asking the user a follow-up question.
    pub fn clarification(
        question: impl Into<String>,
        plan: Vec<PlanStep>,
        extracted_text: Option<String>,
    ) -> Self {
        Self {
            status: ResponseStatus::NeedsClarification,
            clarification_question: Some(question.into()),
            extracted_text,
            final_output: Map::new(),
            task_type: None,
            plan,
            logs: Vec::new(),
            cost_estimate: None,
            error: None,
        }
    }

    /// A response for a request that failed outside the step boundary.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            clarification_question: None,
            extracted_text: None,
            final_output: Map::new(),
            task_type: None,
            plan: Vec::new(),
            logs: Vec::new(),
            cost_estimate: None,
            error: Some(message.into()),
        }
    }

    /// The conversational answer, if a step produced one.
    pub fn message(&self) -> Option<&str> {
        self.final_output.get("message").and_then(Value::as_str)
    }
}

/// Broad category of an attached file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// PDF document.
    Pdf,
    /// Raster image.
    Image,
    /// Audio recording.
    Audio,
    /// Anything else.
    Other,
}

impl FileKind {
    /// Classifies a MIME type such as `application/pdf` or `image/png`.
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime.contains("pdf") {
            FileKind::Pdf
        } else if mime.starts_with("image/") {
            FileKind::Image
        } else if mime.starts_with("audio/") {
            FileKind::Audio
        } else {
            FileKind::Other
        }
    }

    /// Human label used in questions and log lines.
    pub const fn label(self) -> &'static str {
        match self {
            FileKind::Pdf => "PDF",
            FileKind::Image => "image",
            FileKind::Audio => "audio file",
            FileKind::Other => "file",
        }
    }
}
