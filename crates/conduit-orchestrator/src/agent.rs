//! Request facade tying planning, execution and history together.

use conduit_models::ModelFactory;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::AgentConfig;
use crate::error::Result;
use crate::executor::{ExecutionInput, Executor};
use crate::extraction::VisionOcrService;
use crate::history::{HistoryMessage, HistoryStore, InMemoryHistoryStore, Role};
use crate::planner::{PlanStatus, Planner, PlanningInput};
use crate::types::{AgentResponse, FileKind};

/// Message stored when an attachment is read during a clarification round.
const EXTRACTED_MARKER: &str = "File content extracted";

/// A file sent along with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    /// File contents.
    pub bytes: Vec<u8>,
    /// Original file name.
    pub file_name: Option<String>,
    /// Declared MIME type.
    pub mime_type: Option<String>,
}

impl Attachment {
    /// Creates an attachment from raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, file_name: None, mime_type: None }
    }

    /// Sets the file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Classifies the file by its MIME type, falling back to the extension
    /// of its name.
    pub fn kind(&self) -> FileKind {
        let declared = self.mime_type.as_deref().map_or(FileKind::Other, FileKind::from_mime);
        if declared != FileKind::Other {
            return declared;
        }
        self.file_name
            .as_deref()
            .and_then(|name| mime_guess::from_path(name).first())
            .map_or(FileKind::Other, |mime| FileKind::from_mime(mime.essence_str()))
    }
}

/// One user request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentRequest {
    /// The user's message.
    pub text: Option<String>,
    /// Attached file.
    pub attachment: Option<Attachment>,
    /// Conversation to read and extend.
    pub conversation_id: Option<String>,
    /// Answer to the previous clarification question.
    pub clarification_answer: Option<String>,
}

impl AgentRequest {
    /// Creates a text-only request.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    /// Attaches a file.
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Ties the request to a conversation.
    #[must_use]
    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Answers a clarification question.
    #[must_use]
    pub fn with_clarification_answer(mut self, answer: impl Into<String>) -> Self {
        self.clarification_answer = Some(answer.into());
        self
    }
}

/// Plans and executes requests, keeping conversation history.
pub struct Agent {
    planner: Planner,
    executor: Executor,
    history: Arc<dyn HistoryStore>,
}

impl Agent {
    /// Assembles an agent from its parts.
    pub fn new(planner: Planner, executor: Executor, history: Arc<dyn HistoryStore>) -> Self {
        Self { planner, executor, history }
    }

    /// Builds an agent with the configured models and an in-memory history.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        config.validate()?;

        let model = ModelFactory::create(config.model_config()?)?;
        let vision = if config.vision_model_id() == config.model_id() {
            Arc::clone(&model)
        } else {
            ModelFactory::create(config.vision_model_config()?)?
        };

        let planner = Planner::new(model.clone())
            .with_timeout(config.planning_timeout())
            .with_history_window(config.history_window());
        let executor = Executor::new(model)
            .with_image_extractor(Arc::new(VisionOcrService::new(vision)))
            .with_history_window(config.history_window());
        let history = Arc::new(InMemoryHistoryStore::new(config.history_limit()));

        info!(
            model_id = %config.model_id(),
            vision_model_id = %config.vision_model_id(),
            "Agent ready"
        );
        Ok(Self::new(planner, executor, history))
    }

    /// The history store this agent writes to.
    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Handles one request. Failures outside the per-step boundary come back
    /// as a response with `status = error`.
    pub async fn run(&self, request: AgentRequest) -> AgentResponse {
        match self.try_run(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Agent request failed");
                AgentResponse::error(e.to_string())
            }
        }
    }

    async fn try_run(&self, request: &AgentRequest) -> Result<AgentResponse> {
        let text = request.text.as_deref().unwrap_or_default();
        let conversation_id = request.conversation_id.as_deref().filter(|id| !id.is_empty());
        let attachment = request.attachment.as_ref();

        info!(
            conversation_id = conversation_id.unwrap_or("-"),
            text_len = text.len(),
            file = attachment.and_then(|a| a.file_name.as_deref()).unwrap_or("-"),
            "Agent run request"
        );

        if let Some(id) = conversation_id {
            if !text.is_empty() {
                self.history.append(id, HistoryMessage::new(Role::User, text)).await?;
            }
        }

        let has_link = text.contains("youtube.com") || text.contains("youtu.be");
        let history = match conversation_id {
            Some(id) => self.history.get(id).await?,
            None => Vec::new(),
        };
        let file_kind = attachment.map(Attachment::kind);

        let outcome = self
            .planner
            .create_plan(&PlanningInput {
                user_text: text,
                file_kind,
                has_link,
                history: &history,
                clarification_answer: request.clarification_answer.as_deref(),
            })
            .await;

        if outcome.status == PlanStatus::NeedsClarification {
            let extracted = match (attachment, file_kind) {
                (Some(attachment), Some(kind)) => {
                    self.executor.extract_attachment(kind, &attachment.bytes).await.unwrap_or_else(|e| {
                        warn!(error = %e, "Failed to extract content during clarification");
                        None
                    })
                }
                _ => None,
            };

            if let (Some(id), Some(content)) = (conversation_id, extracted.as_ref()) {
                let message =
                    HistoryMessage::new(Role::System, EXTRACTED_MARKER).with_extracted_content(Some(content.clone()));
                self.history.append(id, message).await?;
            }

            let question = outcome.clarification_question.unwrap_or_default();
            return Ok(AgentResponse::clarification(question, outcome.plan, extracted));
        }

        let input = ExecutionInput {
            text,
            file_bytes: attachment.map(|a| a.bytes.as_slice()),
            file_name: attachment.and_then(|a| a.file_name.as_deref()),
            history: &history,
        };
        let response = self.executor.execute_plan(outcome.plan, &input).await;

        if let Some(id) = conversation_id {
            let message = HistoryMessage::new(Role::Agent, response.message().unwrap_or_default())
                .with_extracted_content(response.extracted_text.clone());
            self.history.append(id, message).await?;
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AgentError, ExtractionError};
    use crate::extraction::{Extraction, PdfTextExtractor};
    use crate::test_support::ScriptedModel;
    use crate::types::{ResponseStatus, StepStatus};
    use async_trait::async_trait;

    struct ResumePdf;

    impl PdfTextExtractor for ResumePdf {
        fn extract_text(&self, _pdf: &[u8]) -> std::result::Result<Extraction, ExtractionError> {
            Ok(Extraction::new("Jane Doe. Five years of Rust.", 1.0))
        }
    }

    struct BrokenHistory;

    #[async_trait]
    impl HistoryStore for BrokenHistory {
        async fn get(&self, _conversation_id: &str) -> Result<Vec<HistoryMessage>> {
            Err(AgentError::History("store offline".to_string()))
        }

        async fn append(&self, _conversation_id: &str, _message: HistoryMessage) -> Result<()> {
            Err(AgentError::History("store offline".to_string()))
        }

        async fn clear(&self, _conversation_id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn agent(model: &Arc<ScriptedModel>, history: Arc<dyn HistoryStore>) -> Agent {
        let planner = Planner::new(model.clone());
        let executor = Executor::new(model.clone()).with_pdf_extractor(Arc::new(ResumePdf));
        Agent::new(planner, executor, history)
    }

    fn resume() -> Attachment {
        Attachment::new(b"%PDF-1.4".to_vec()).with_file_name("resume.pdf").with_mime_type("application/pdf")
    }

    #[test]
    fn test_attachment_kind_detection() {
        assert_eq!(resume().kind(), FileKind::Pdf);
        assert_eq!(Attachment::new(Vec::new()).with_file_name("photo.JPG").kind(), FileKind::Image);
        assert_eq!(Attachment::new(Vec::new()).with_file_name("memo.mp3").kind(), FileKind::Audio);
        assert_eq!(
            Attachment::new(Vec::new()).with_file_name("scan.png").with_mime_type("application/octet-stream").kind(),
            FileKind::Image
        );
        assert_eq!(Attachment::new(Vec::new()).kind(), FileKind::Other);
    }

    #[tokio::test]
    async fn test_clarification_round_trip_keeps_file_in_history() {
        let model = Arc::new(ScriptedModel::new([
            r#"{"status": "success", "plan": [{"name": "extract_text_from_pdf"}, {"name": "conversational_answer"}]}"#,
            "Strong backend profile.",
        ]));
        let store = Arc::new(InMemoryHistoryStore::default());
        let agent = agent(&model, store.clone());

        let first = agent
            .run(AgentRequest::new("rate this resume").with_attachment(resume()).with_conversation_id("c1"))
            .await;
        assert_eq!(first.status, ResponseStatus::NeedsClarification);
        assert!(first.plan.is_empty());
        assert_eq!(first.extracted_text.as_deref(), Some("Jane Doe. Five years of Rust."));

        let history = store.get("c1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::System);
        assert_eq!(history[1].content, "File content extracted");

        let second = agent
            .run(
                AgentRequest::new("backend engineer")
                    .with_clarification_answer("backend engineer")
                    .with_attachment(resume())
                    .with_conversation_id("c1"),
            )
            .await;
        assert_eq!(second.status, ResponseStatus::Success);
        assert_eq!(second.message(), Some("Strong backend profile."));

        let prompt = &model.prompts().last().cloned().unwrap();
        assert!(prompt.contains("EXTRACTED CONTENT: Jane Doe. Five years of Rust...."));

        let history = store.get("c1").await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].role, Role::Agent);
        assert_eq!(history[3].content, "Strong backend profile.");
    }

    #[tokio::test]
    async fn test_specific_resume_request_runs_directly() {
        let model = Arc::new(ScriptedModel::new(["7/10"]));
        let agent = agent(&model, Arc::new(InMemoryHistoryStore::default()));

        let response = agent
            .run(AgentRequest::new("rate this resume for a backend engineer role").with_attachment(resume()))
            .await;

        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.logs.len(), 2);
        assert!(response.plan.iter().all(|s| s.status == StepStatus::Completed));
        assert_eq!(response.logs[0].input_summary, "Extracting text from PDF: resume.pdf");
        assert_eq!(response.message(), Some("7/10"));
    }

    #[tokio::test]
    async fn test_without_conversation_id_history_is_untouched() {
        let model = Arc::new(ScriptedModel::default());
        let store = Arc::new(InMemoryHistoryStore::default());
        let agent = agent(&model, store.clone());

        let response = agent.run(AgentRequest::new("hello")).await;
        assert_eq!(response.message(), Some("Hello! I'm here to help with any questions you have."));
        assert!(store.get("").await.unwrap().is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_history_failure_becomes_error_response() {
        let model = Arc::new(ScriptedModel::default());
        let agent = agent(&model, Arc::new(BrokenHistory));

        let response = agent.run(AgentRequest::new("hi").with_conversation_id("c1")).await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.error.as_deref(), Some("History error: store offline"));
    }

    #[tokio::test]
    async fn test_from_config_with_mock_provider() {
        let config = AgentConfig {
            model: crate::config::ModelSettings { provider: Some("mock".to_string()), ..Default::default() },
            ..AgentConfig::default()
        };
        let agent = Agent::from_config(&config).unwrap();

        let response = agent.run(AgentRequest::new("hey")).await;
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.message(), Some("Hey! What would you like to know?"));
    }

    #[tokio::test]
    async fn test_from_config_rejects_unknown_provider() {
        let config = AgentConfig {
            model: crate::config::ModelSettings { provider: Some("openai".to_string()), ..Default::default() },
            ..AgentConfig::default()
        };
        assert!(matches!(Agent::from_config(&config), Err(AgentError::Config(_))));
    }
}
