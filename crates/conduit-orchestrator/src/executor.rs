//! Plan execution engine.
//!
//! The executor walks a plan in order against one [`ExecutionContext`],
//! dispatching each recognized step to a collaborator or a model prompt.
//! Every step runs inside its own error boundary: a failure is written to
//! that step's log entry and execution moves on to the next step.

use conduit_abstraction::{Model, ModelParameters, MultimodalModel};
use serde_json::{Map, Value};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::extraction::{
    AudioService, AudioTranscriber, ImageTextExtractor, PdfExtractService, PdfTextExtractor,
    TranscriptFetcher, VisionOcrService, YouTubeTranscriptService,
};
use crate::history::{HistoryMessage, recent};
use crate::json::{extract_json_object, parse_json_body};
use crate::planner::DEFAULT_HISTORY_WINDOW;
use crate::types::{
    AgentResponse, FileKind, LogEntry, PlanStep, ResponseStatus, StepKind, StepStatus, TaskType,
};

/// Maximum characters of past extracted content quoted in answer prompts.
const HISTORY_SNIPPET_CHARS: usize = 500;

/// Characters of the question echoed into a log entry.
const QUERY_PREVIEW_CHARS: usize = 50;

const JSON_PARSE_ERROR: &str = "JSON parse error";

/// Instant replies for bare greetings.
const GREETING_REPLIES: [(&str, &str); 4] = [
    ("hi", "Hello! How can I help you today?"),
    ("hii", "Hi there! What can I do for you?"),
    ("hello", "Hello! I'm here to help with any questions you have."),
    ("hey", "Hey! What would you like to know?"),
];

fn greeting_reply(text: &str) -> Option<&'static str> {
    let normalized = text.trim().to_lowercase();
    GREETING_REPLIES.iter().find(|(greeting, _)| *greeting == normalized).map(|(_, reply)| *reply)
}

/// Request data the executor reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionInput<'a> {
    /// The user's message.
    pub text: &'a str,
    /// Attached file contents.
    pub file_bytes: Option<&'a [u8]>,
    /// Attached file name.
    pub file_name: Option<&'a str>,
    /// Conversation so far, oldest first.
    pub history: &'a [HistoryMessage],
}

impl ExecutionInput<'_> {
    fn file(&self) -> Option<&[u8]> {
        self.file_bytes.filter(|bytes| !bytes.is_empty())
    }
}

/// Working text shared by the steps of one execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// The user's message, unchanged.
    pub raw_text: String,
    /// Text accumulated by extraction steps.
    pub extracted_text: String,
    /// Last transcript fetched or transcribed.
    pub transcript_text: String,
}

impl ExecutionContext {
    fn new(raw_text: &str) -> Self {
        Self { raw_text: raw_text.to_string(), ..Self::default() }
    }

    /// What analysis steps operate on: extracted text when there is some,
    /// otherwise the user's message.
    pub fn content(&self) -> &str {
        if !self.extracted_text.trim().is_empty() {
            &self.extracted_text
        } else if !self.transcript_text.trim().is_empty() {
            &self.transcript_text
        } else {
            &self.raw_text
        }
    }

    fn append_extracted(&mut self, text: &str) {
        self.extracted_text.push('\n');
        self.extracted_text.push_str(text);
    }
}

/// Values accumulated across steps. Later writers win.
#[derive(Debug, Default)]
struct Aggregate {
    extracted_text: Option<String>,
    final_output: Map<String, Value>,
    task_type: Option<TaskType>,
}

impl Aggregate {
    fn merge(&mut self, output: Map<String, Value>, task_type: TaskType) {
        self.final_output.extend(output);
        self.task_type = Some(task_type);
    }
}

/// How a dispatched step ended, with its log summary.
enum StepOutcome {
    Completed(String),
    Failed(String),
}

/// Runs plans.
pub struct Executor {
    model: Arc<dyn Model>,
    pdf: Arc<dyn PdfTextExtractor>,
    ocr: Arc<dyn ImageTextExtractor>,
    transcripts: Arc<dyn TranscriptFetcher>,
    audio: Arc<dyn AudioTranscriber>,
    history_window: usize,
}

impl Executor {
    /// Creates an executor with the default collaborators, all backed by
    /// `model` where they need one.
    pub fn new(model: Arc<dyn MultimodalModel>) -> Self {
        Self {
            pdf: Arc::new(PdfExtractService::new()),
            ocr: Arc::new(VisionOcrService::new(Arc::clone(&model))),
            transcripts: Arc::new(YouTubeTranscriptService::new()),
            audio: Arc::new(AudioService::new(Arc::clone(&model))),
            model,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    /// Replaces the PDF extractor.
    #[must_use]
    pub fn with_pdf_extractor(mut self, pdf: Arc<dyn PdfTextExtractor>) -> Self {
        self.pdf = pdf;
        self
    }

    /// Replaces the image OCR backend.
    #[must_use]
    pub fn with_image_extractor(mut self, ocr: Arc<dyn ImageTextExtractor>) -> Self {
        self.ocr = ocr;
        self
    }

    /// Replaces the transcript fetcher.
    #[must_use]
    pub fn with_transcript_fetcher(mut self, transcripts: Arc<dyn TranscriptFetcher>) -> Self {
        self.transcripts = transcripts;
        self
    }

    /// Replaces the audio transcriber.
    #[must_use]
    pub fn with_audio_transcriber(mut self, audio: Arc<dyn AudioTranscriber>) -> Self {
        self.audio = audio;
        self
    }

    /// Sets how many history messages answer prompts include.
    #[must_use]
    pub const fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    /// Extracts text from an attachment outside of any plan, so that a
    /// clarification round trip still leaves the content in history.
    ///
    /// Only PDFs and images are read; empty text is reported as `None`.
    pub async fn extract_attachment(&self, kind: FileKind, bytes: &[u8]) -> Result<Option<String>> {
        let text = match kind {
            FileKind::Pdf => self.pdf.extract_text(bytes)?.text,
            FileKind::Image => self.ocr.extract_text(bytes).await?.text,
            FileKind::Audio | FileKind::Other => return Ok(None),
        };
        Ok(Some(text).filter(|text| !text.trim().is_empty()))
    }

    /// Runs `plan` in order and assembles the response.
    ///
    /// Steps with unknown names are skipped without a log entry. The
    /// response status is always `success`; step failures show up in
    /// `logs` and in the step statuses of the returned plan.
    pub async fn execute_plan(&self, mut plan: Vec<PlanStep>, input: &ExecutionInput<'_>) -> AgentResponse {
        let started = Instant::now();
        let mut context = ExecutionContext::new(input.text);
        let mut aggregate = Aggregate::default();
        let mut logs = Vec::with_capacity(plan.len());

        for step in &mut plan {
            let Some(kind) = step.kind() else {
                debug!(step = %step.name, "Skipping unknown step");
                continue;
            };

            step.status = StepStatus::Running;
            let step_started = Instant::now();
            let input_summary = input_summary(kind, input);

            let (status, output_summary) = match self.run_step(kind, input, &mut context, &mut aggregate).await {
                Ok(StepOutcome::Completed(summary)) => (StepStatus::Completed, summary),
                Ok(StepOutcome::Failed(summary)) => {
                    warn!(step = %kind, reason = %summary, "Step failed");
                    (StepStatus::Failed, summary)
                }
                Err(e) => {
                    warn!(step = %kind, error = %e, "Step raised an error");
                    (StepStatus::Failed, e.to_string())
                }
            };

            let duration_ms = step_started.elapsed().as_secs_f64() * 1000.0;
            debug!(step = %kind, status = %status, duration_ms, "Step finished");

            step.status = status;
            logs.push(LogEntry {
                step_name: step.name.clone(),
                input_summary,
                output_summary,
                status,
                duration_ms,
                cost_estimate: None,
            });
        }

        let task_type = aggregate.task_type.unwrap_or_default();
        info!(
            steps = logs.len(),
            task_type = %task_type,
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Plan executed"
        );

        AgentResponse {
            status: ResponseStatus::Success,
            clarification_question: None,
            extracted_text: aggregate.extracted_text,
            final_output: aggregate.final_output,
            task_type: Some(task_type),
            plan,
            logs,
            cost_estimate: None,
            error: None,
        }
    }

    async fn run_step(
        &self,
        kind: StepKind,
        input: &ExecutionInput<'_>,
        context: &mut ExecutionContext,
        aggregate: &mut Aggregate,
    ) -> Result<StepOutcome> {
        match kind {
            StepKind::ExtractTextFromImage => {
                let Some(image) = input.file() else {
                    return Ok(StepOutcome::Failed("No image file provided for text extraction".to_string()));
                };
                let extraction = self.ocr.extract_text(image).await?;
                context.append_extracted(&extraction.text);
                let summary = format!(
                    "Successfully extracted {} characters with {:.1}% confidence",
                    extraction.text.chars().count(),
                    extraction.confidence * 100.0
                );
                aggregate.extracted_text = Some(extraction.text);
                Ok(StepOutcome::Completed(summary))
            }

            StepKind::ExtractTextFromPdf => {
                let Some(pdf) = input.file() else {
                    return Ok(StepOutcome::Failed("No PDF file provided for text extraction".to_string()));
                };
                let extraction = self.pdf.extract_text(pdf)?;
                context.append_extracted(&extraction.text);
                let summary =
                    format!("Successfully extracted {} characters from PDF", extraction.text.chars().count());
                aggregate.extracted_text = Some(extraction.text);
                Ok(StepOutcome::Completed(summary))
            }

            StepKind::FetchYoutubeTranscript => {
                let transcript = self.transcripts.fetch_transcript(input.text).await;
                if !transcript.success {
                    return Ok(StepOutcome::Failed(transcript.text));
                }
                context.append_extracted(&transcript.text);
                context.transcript_text.clone_from(&transcript.text);
                aggregate.extracted_text = Some(transcript.text);
                Ok(StepOutcome::Completed("Transcript fetched".to_string()))
            }

            StepKind::TranscribeAudio => {
                let Some(audio) = input.file() else {
                    return Ok(StepOutcome::Failed("No audio file provided for transcription".to_string()));
                };
                let raw = self.audio.transcribe(audio, input.file_name).await?;
                Ok(record_audio(&raw, context, aggregate))
            }

            StepKind::Summarize => {
                let prompt = format!(
                    "Summarize this:\n{}\nFormat as JSON: {{\"one_line_summary\": \"\", \"bullet_points\": [], \"five_sentence_summary\": \"\"}}",
                    context.content()
                );
                self.structured_step(&prompt, TaskType::Summarization, "Summary generated", aggregate).await
            }

            StepKind::SentimentAnalysis => {
                let prompt = format!(
                    "Analyze sentiment:\n{}\nFormat as JSON: {{\"label\": \"\", \"confidence\": 0.0, \"justification\": \"\"}}",
                    context.content()
                );
                self.structured_step(&prompt, TaskType::Sentiment, "Sentiment analyzed", aggregate).await
            }

            StepKind::CodeExplanation => {
                let prompt = format!(
                    "Explain code:\n{}\nFormat as JSON: {{\"what_it_does\": \"\", \"bugs_or_issues\": [], \"time_complexity\": \"\"}}",
                    context.content()
                );
                self.structured_step(&prompt, TaskType::CodeExplanation, "Code explained", aggregate).await
            }

            StepKind::ConversationalAnswer => {
                if let Some(reply) = greeting_reply(input.text) {
                    aggregate.merge(message_output(reply.to_string()), TaskType::Conversation);
                    return Ok(StepOutcome::Completed("Fast greeting response".to_string()));
                }

                let prompt = self.answer_prompt(input, context);
                let answer = self.model.generate_text(&prompt, None).await?.content;
                let summary = format!("Answered in {} characters", answer.chars().count());
                aggregate.merge(message_output(answer), TaskType::Conversation);
                Ok(StepOutcome::Completed(summary))
            }
        }
    }

    /// Prompts for a JSON object and merges it into the output.
    async fn structured_step(
        &self,
        prompt: &str,
        task_type: TaskType,
        summary: &str,
        aggregate: &mut Aggregate,
    ) -> Result<StepOutcome> {
        let response = self.model.generate_text(prompt, Some(ModelParameters::json())).await?;
        match extract_json_object(&response.content) {
            Ok(output) => {
                aggregate.merge(output, task_type);
                Ok(StepOutcome::Completed(summary.to_string()))
            }
            Err(e) => {
                debug!(error = %e, task_type = %task_type, "Model output was not JSON");
                Ok(StepOutcome::Failed(JSON_PARSE_ERROR.to_string()))
            }
        }
    }

    fn answer_prompt(&self, input: &ExecutionInput<'_>, context: &ExecutionContext) -> String {
        let mut history_block = String::new();
        let window = recent(input.history, self.history_window);
        if !window.is_empty() {
            history_block.push_str("\n\nPrevious Conversation:\n");
            for message in window {
                let _ = writeln!(history_block, "{}: {}", message.role.prompt_label(), message.content);
                if let Some(extracted) = message.extracted_content.as_deref().filter(|e| !e.is_empty()) {
                    let snippet: String = extracted.chars().take(HISTORY_SNIPPET_CHARS).collect();
                    let _ = writeln!(history_block, "EXTRACTED CONTENT: {snippet}...");
                }
            }
        }

        format!(
            "You are a helpful AI assistant. Use the context below to answer the user's question.

Context from uploaded content:
{}
{history_block}

Current User Question: {}

Answer the question naturally and conversationally. If the question refers to previous context (like \"he\", \"it\", \"this\"), use the conversation history to understand what they're referring to.",
            context.extracted_text.trim(),
            input.text
        )
    }
}

/// Applies an audio transcription result. Answers that are not JSON are
/// kept verbatim as the transcript.
fn record_audio(raw: &str, context: &mut ExecutionContext, aggregate: &mut Aggregate) -> StepOutcome {
    match parse_json_body(raw) {
        Ok(output) => {
            let transcript = output.get("transcript").and_then(Value::as_str).unwrap_or_default().to_string();
            let summary =
                format!("Successfully transcribed audio - {} characters extracted", transcript.chars().count());
            context.extracted_text.clone_from(&transcript);
            context.transcript_text.clone_from(&transcript);
            aggregate.extracted_text = Some(transcript);
            aggregate.merge(output, TaskType::AudioSummary);
            StepOutcome::Completed(summary)
        }
        Err(_) => {
            context.extracted_text = raw.to_string();
            context.transcript_text = raw.to_string();
            aggregate.extracted_text = Some(raw.to_string());
            StepOutcome::Completed(format!("Audio transcribed - {} characters extracted", raw.chars().count()))
        }
    }
}

fn message_output(message: String) -> Map<String, Value> {
    let mut output = Map::new();
    output.insert("message".to_string(), Value::String(message));
    output
}

fn input_summary(kind: StepKind, input: &ExecutionInput<'_>) -> String {
    match kind {
        StepKind::ExtractTextFromImage => {
            format!("Extracting text from image: {}", input.file_name.unwrap_or("uploaded image"))
        }
        StepKind::ExtractTextFromPdf => {
            format!("Extracting text from PDF: {}", input.file_name.unwrap_or("uploaded PDF"))
        }
        StepKind::TranscribeAudio => {
            format!("Transcribing audio file: {}", input.file_name.unwrap_or("uploaded audio"))
        }
        StepKind::FetchYoutubeTranscript => "Fetching video transcript".to_string(),
        StepKind::ConversationalAnswer => {
            let preview: String = input.text.chars().take(QUERY_PREVIEW_CHARS).collect();
            format!("Analyzing query: {preview}...")
        }
        StepKind::Summarize | StepKind::SentimentAnalysis | StepKind::CodeExplanation => {
            "Processing...".to_string()
        }
    }
}
