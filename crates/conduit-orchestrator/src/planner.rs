//! Intent planning.
//!
//! [`Planner::create_plan`] turns a request into an ordered list of steps.
//! Cheap deterministic rules run first (clarification gate, then fast path);
//! only requests they cannot settle reach the model. Planning never fails:
//! any model problem degrades to a single conversational step.

use conduit_abstraction::{Model, ModelParameters};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::history::{HistoryMessage, recent};
use crate::json::parse_json_as;
use crate::types::{FileKind, PlanStep, StepKind, StepStatus};

/// Default bound on the planning model call.
pub const DEFAULT_PLANNING_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of history messages shown to the model.
pub const DEFAULT_HISTORY_WINDOW: usize = 6;

const GREETINGS: [&str; 4] = ["hi", "hii", "hello", "hey"];

const CANNED_QUESTIONS: [&str; 3] = ["what can you do", "who are you", "help"];

const GENERIC_CLARIFICATION: &str = "Could you tell me a bit more about what you would like me to do?";

const ROLE_QUESTION: &str =
    "Which role or position should I evaluate this resume against? For example: backend engineer, data analyst, product manager.";

static RATING_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:rate|evaluate)\b").expect("rating pattern is valid"));

static RESUME_NOUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:resume|résumé|cv)\b").expect("resume pattern is valid"));

static ROLE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:roles?|positions?|jobs?|engineer(?:ing)?|developer|skills?|designer|manager|analyst|scientist|intern(?:ship)?|architect)\b",
    )
    .expect("role pattern is valid")
});

static ANALYSIS_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:rate|evaluate|analy[sz]e|review)\b").expect("analysis pattern is valid")
});

const PLANNER_INSTRUCTIONS: &str = r#"You are an intelligent Agent Planner.
Your goal is to understand the user's intent and create a step-by-step execution plan.

IMPORTANT RULES:
- Prefer acting over asking. If the user says "rate this resume" or "evaluate this", they want a conversational analysis.
- Use the conversation history. If the user asks a follow-up (e.g. "summarize it"), the previous content is what they mean.
- For ambiguous requests make a reasonable assumption. For example:
  * "analyze this" -> conversational_answer
  * "rate this resume" -> extract_text_from_pdf + conversational_answer
  * "what's in this image" -> extract_text_from_image + conversational_answer
- Only ask for clarification if the request is truly impossible to interpret (e.g. "process this" with no file and no context).

Response Format (JSON):
{
    "status": "success" | "needs_clarification",
    "clarification_question": "string if needed, else null",
    "plan": [
        {"name": "task_function_name", "description": "short description", "status": "pending"}
    ]
}"#;

/// Everything the planner looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanningInput<'a> {
    /// The user's message.
    pub user_text: &'a str,
    /// Kind of the attached file, if any.
    pub file_kind: Option<FileKind>,
    /// Whether the message contains a video link.
    pub has_link: bool,
    /// Conversation so far, oldest first.
    pub history: &'a [HistoryMessage],
    /// Answer to a previous clarification question.
    pub clarification_answer: Option<&'a str>,
}

impl PlanningInput<'_> {
    fn clarification_answer(&self) -> Option<&str> {
        self.clarification_answer.map(str::trim).filter(|answer| !answer.is_empty())
    }
}

/// Whether a plan can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// The plan is ready for the executor.
    Success,
    /// The user must answer `clarification_question` first.
    NeedsClarification,
}

/// Result of planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    /// Whether the plan can run.
    pub status: PlanStatus,
    /// Follow-up question for the user.
    pub clarification_question: Option<String>,
    /// Steps to run, in order.
    pub plan: Vec<PlanStep>,
}

impl PlanOutcome {
    fn ready(plan: Vec<PlanStep>) -> Self {
        Self { status: PlanStatus::Success, clarification_question: None, plan }
    }

    fn ask(question: impl Into<String>) -> Self {
        Self {
            status: PlanStatus::NeedsClarification,
            clarification_question: Some(question.into()),
            plan: Vec::new(),
        }
    }

    fn fallback() -> Self {
        Self::ready(vec![PlanStep::new(StepKind::ConversationalAnswer, "Default fallback reply")])
    }
}

/// Shape the planning model is asked to produce.
#[derive(Debug, Deserialize)]
struct ModelPlan {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    clarification_question: Option<String>,
    #[serde(default)]
    plan: Vec<PlanStep>,
}

/// Turns requests into step lists.
pub struct Planner {
    model: Arc<dyn Model>,
    timeout: Duration,
    history_window: usize,
}

impl Planner {
    /// Creates a planner with the default timeout and history window.
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self { model, timeout: DEFAULT_PLANNING_TIMEOUT, history_window: DEFAULT_HISTORY_WINDOW }
    }

    /// Sets the bound on the planning model call.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how many history messages the model sees.
    #[must_use]
    pub const fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    /// Plans a request. First matching rule wins: clarification gate, fast
    /// path, then the model.
    pub async fn create_plan(&self, input: &PlanningInput<'_>) -> PlanOutcome {
        if let Some(question) = clarification_needed(input) {
            info!(question = %question, "Planner needs clarification");
            return PlanOutcome::ask(question);
        }

        if let Some(plan) = fast_path(input) {
            let names = plan.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
            debug!(plan = ?names, "Planned on fast path");
            return PlanOutcome::ready(plan);
        }

        let outcome = self.plan_with_model(input).await;
        info!(status = ?outcome.status, steps = outcome.plan.len(), "Planned with model");
        outcome
    }

    async fn plan_with_model(&self, input: &PlanningInput<'_>) -> PlanOutcome {
        let prompt = self.build_prompt(input);

        let call = self.model.generate_text(&prompt, Some(ModelParameters::json()));
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(error = %e, "Planning model failed, using fallback plan");
                return PlanOutcome::fallback();
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs_f64(), "Planning timed out, using fallback plan");
                return PlanOutcome::fallback();
            }
        };

        let parsed = match parse_json_as::<ModelPlan>(&response.content) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Unparseable plan, using fallback plan");
                return PlanOutcome::fallback();
            }
        };

        let plan = parsed
            .plan
            .into_iter()
            .map(|step| PlanStep { status: StepStatus::Pending, ..step })
            .collect::<Vec<_>>();

        if parsed.status.as_deref() == Some("needs_clarification") {
            let question = parsed
                .clarification_question
                .filter(|q| !q.trim().is_empty())
                .unwrap_or_else(|| GENERIC_CLARIFICATION.to_string());
            return PlanOutcome { status: PlanStatus::NeedsClarification, clarification_question: Some(question), plan };
        }

        if plan.is_empty() {
            warn!("Model returned an empty plan, using fallback plan");
            return PlanOutcome::fallback();
        }
        PlanOutcome::ready(plan)
    }

    fn build_prompt(&self, input: &PlanningInput<'_>) -> String {
        let mut prompt = String::from(PLANNER_INSTRUCTIONS);

        prompt.push_str("\n\nAvailable Tasks:\n");
        for (i, kind) in StepKind::ALL.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {} ({})", i + 1, kind, kind.usage_hint());
        }

        prompt.push_str("\nTask Context:\n");
        let _ = writeln!(prompt, "User Input: {}", input.user_text);
        if let Some(kind) = input.file_kind {
            let _ = writeln!(prompt, "Attached File Type: {}", kind.label());
        }
        if input.has_link {
            prompt.push_str("YouTube URL detected.\n");
        }
        if let Some(answer) = input.clarification_answer() {
            let _ = writeln!(prompt, "User Clarification: {answer}");
        }

        let window = recent(input.history, self.history_window);
        if !window.is_empty() {
            prompt.push_str("\nPrevious Conversation History:\n");
            for message in window {
                let _ = writeln!(prompt, "{}: {}", message.role.prompt_label(), message.content);
            }
        }

        prompt.push_str("\nGenerate JSON response:");
        prompt
    }
}

fn clarification_needed(input: &PlanningInput<'_>) -> Option<String> {
    if input.clarification_answer().is_some() {
        return None;
    }

    let text = input.user_text.trim();
    if let Some(kind) = input.file_kind {
        if text.is_empty() {
            return Some(file_question(kind).to_string());
        }
    }

    let lowered = text.to_lowercase();
    let wants_rating = RATING_VERB.is_match(&lowered) && RESUME_NOUN.is_match(&lowered);
    if wants_rating && !ROLE_KEYWORD.is_match(&lowered) {
        return Some(ROLE_QUESTION.to_string());
    }

    None
}

const fn file_question(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Pdf => {
            "I've received your PDF. What would you like me to do with it? I can summarize it or answer questions about it."
        }
        FileKind::Image => {
            "I've received your image. Should I extract the text from it or answer a question about it?"
        }
        FileKind::Audio => {
            "I've received your audio file. Would you like a transcript and summary, or something else?"
        }
        FileKind::Other => "I've received your file. What would you like me to do with it?",
    }
}

fn fast_path(input: &PlanningInput<'_>) -> Option<Vec<PlanStep>> {
    let normalized = input.user_text.trim().to_lowercase();

    if GREETINGS.contains(&normalized.as_str()) {
        return Some(vec![PlanStep::new(StepKind::ConversationalAnswer, "Respond to greeting")]);
    }

    let question = normalized.trim_end_matches(['?', '!', '.']).trim_end();
    if CANNED_QUESTIONS.contains(&question) {
        return Some(vec![PlanStep::new(StepKind::ConversationalAnswer, "Answer a question about the assistant")]);
    }

    if ANALYSIS_VERB.is_match(&normalized) {
        let extraction = match input.file_kind? {
            FileKind::Pdf => PlanStep::new(StepKind::ExtractTextFromPdf, "Extract text from the PDF"),
            FileKind::Image => PlanStep::new(StepKind::ExtractTextFromImage, "Extract text from the image"),
            FileKind::Audio => PlanStep::new(StepKind::TranscribeAudio, "Transcribe the audio file"),
            FileKind::Other => return None,
        };
        return Some(vec![
            extraction,
            PlanStep::new(StepKind::ConversationalAnswer, "Analyze the content and answer"),
        ]);
    }

    None
}
