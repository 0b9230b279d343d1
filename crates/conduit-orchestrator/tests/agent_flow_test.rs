//! End-to-end request flows through the public agent API, using the mock
//! provider and small scripted collaborators.

use async_trait::async_trait;
use conduit_abstraction::{
    ChatMessage, Model, ModelError, ModelParameters, ModelResponse, MultimodalModel,
};
use conduit_models::MockModel;
use conduit_orchestrator::{
    Agent, AgentRequest, Attachment, ExecutionInput, Executor, HistoryStore, InMemoryHistoryStore,
    PlanStep, Planner, ResponseStatus, Role, StepStatus, TaskType, Transcript, TranscriptFetcher,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Answers with canned replies in order.
struct CannedModel {
    replies: Mutex<VecDeque<String>>,
}

impl CannedModel {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()) })
    }

    fn next(&self) -> ModelResponse {
        let content = self.replies.lock().unwrap().pop_front().unwrap_or_default();
        ModelResponse { content, model_id: Some("canned".to_string()), usage: None }
    }
}

#[async_trait]
impl Model for CannedModel {
    async fn generate_text(
        &self,
        _prompt: &str,
        _parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        Ok(self.next())
    }

    async fn generate_chat_completion(
        &self,
        _messages: &[ChatMessage],
        _parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        Ok(self.next())
    }

    fn model_id(&self) -> &str {
        "canned"
    }
}

#[async_trait]
impl MultimodalModel for CannedModel {
    async fn generate_from_image(
        &self,
        _image: &[u8],
        _mime_type: &str,
        _prompt: &str,
    ) -> Result<ModelResponse, ModelError> {
        Ok(self.next())
    }

    async fn generate_with_audio(&self, _path: &Path, _prompt: &str) -> Result<ModelResponse, ModelError> {
        Ok(self.next())
    }
}

struct OfflineCaptions;

#[async_trait]
impl TranscriptFetcher for OfflineCaptions {
    async fn fetch_transcript(&self, _url: &str) -> Transcript {
        Transcript::found("we talk about ownership and borrowing in rust")
    }
}

fn mock_agent() -> (Agent, Arc<InMemoryHistoryStore>) {
    let model: Arc<dyn MultimodalModel> = Arc::new(MockModel::new("mock".to_string()));
    let store = Arc::new(InMemoryHistoryStore::default());
    let agent = Agent::new(Planner::new(model.clone()), Executor::new(model), store.clone());
    (agent, store)
}

#[tokio::test]
async fn test_unplannable_request_falls_back_to_conversation() {
    let (agent, _) = mock_agent();

    let response = agent.run(AgentRequest::new("tell me something interesting")).await;

    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.plan.len(), 1);
    assert_eq!(response.plan[0].name, "conversational_answer");
    assert_eq!(response.task_type, Some(TaskType::Conversation));
    assert!(response.message().unwrap().starts_with("Mock response for:"));
    assert!(response.message().unwrap().contains("Current User Question: tell me something interesting"));
}

#[tokio::test]
async fn test_audio_attachment_through_mock_provider() {
    let (agent, store) = mock_agent();
    let attachment = Attachment::new(vec![0_u8; 64]).with_file_name("standup.mp3");

    let response = agent
        .run(AgentRequest::new("analyze this").with_attachment(attachment).with_conversation_id("audio"))
        .await;

    assert_eq!(response.status, ResponseStatus::Success);
    let steps: Vec<_> = response.logs.iter().map(|l| l.step_name.as_str()).collect();
    assert_eq!(steps, ["transcribe_audio", "conversational_answer"]);
    assert_eq!(response.logs[0].input_summary, "Transcribing audio file: standup.mp3");
    assert_eq!(response.logs[0].status, StepStatus::Completed);
    assert_eq!(response.extracted_text.as_deref(), Some("Mock transcript of 64 byte audio"));

    let history = store.get("audio").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].role, Role::Agent);
    assert_eq!(history[1].extracted_content.as_deref(), Some("Mock transcript of 64 byte audio"));
}

#[tokio::test]
async fn test_image_attachment_through_mock_provider() {
    let (agent, _) = mock_agent();
    let attachment = Attachment::new(b"\x89PNG\r\n\x1a\n".to_vec()).with_mime_type("image/png");

    let response = agent.run(AgentRequest::new("review this screenshot").with_attachment(attachment)).await;

    assert_eq!(response.logs[0].step_name, "extract_text_from_image");
    assert_eq!(response.extracted_text.as_deref(), Some("Mock text from 8 byte image/png image"));
    assert!(response.logs[0].output_summary.ends_with("with 95.0% confidence"));
}

#[tokio::test]
async fn test_bare_attachment_asks_what_to_do() {
    let (agent, store) = mock_agent();
    let attachment = Attachment::new(b"not really a pdf".to_vec()).with_file_name("report.pdf");

    let response = agent.run(AgentRequest::default().with_attachment(attachment).with_conversation_id("c")).await;

    assert_eq!(response.status, ResponseStatus::NeedsClarification);
    assert!(response.clarification_question.as_deref().unwrap().contains("PDF"));
    assert!(response.plan.is_empty());
    assert!(response.extracted_text.is_none());
    assert!(store.get("c").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_video_summary_with_scripted_collaborators() {
    let model = CannedModel::new(&[
        r#"{"status": "success", "plan": [
            {"name": "fetch_youtube_transcript", "description": "captions"},
            {"name": "summarize", "description": "summary"},
            {"name": "sing_a_song", "description": "not a real step"}
        ]}"#,
        "```json\n{\"one_line_summary\": \"Rust memory model.\", \"bullet_points\": [\"ownership\", \"borrowing\", \"lifetimes\"], \"five_sentence_summary\": \"...\"}\n```",
    ]);
    let executor = Executor::new(model.clone()).with_transcript_fetcher(Arc::new(OfflineCaptions));
    let agent = Agent::new(Planner::new(model), executor, Arc::new(InMemoryHistoryStore::default()));

    let response = agent.run(AgentRequest::new("summarize https://www.youtube.com/watch?v=dQw4w9WgXcQ")).await;

    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.plan.len(), 3);
    assert_eq!(response.logs.len(), 2);
    assert_eq!(response.plan[2].status, StepStatus::Pending);
    assert_eq!(response.final_output["one_line_summary"], "Rust memory model.");
    assert_eq!(response.task_type, Some(TaskType::Summarization));
    assert_eq!(response.extracted_text.as_deref(), Some("we talk about ownership and borrowing in rust"));
}

#[tokio::test]
async fn test_executor_can_be_driven_directly() {
    let model = CannedModel::new(&[r#"{"label": "negative", "confidence": 0.91, "justification": "complaint"}"#]);
    let executor = Executor::new(model);

    let plan = vec![PlanStep {
        name: "sentiment_analysis".to_string(),
        description: "how does the customer feel".to_string(),
        status: StepStatus::Pending,
    }];
    let response = executor
        .execute_plan(plan, &ExecutionInput { text: "The parcel arrived broken again.", ..Default::default() })
        .await;

    assert_eq!(response.final_output["label"], "negative");
    assert_eq!(response.task_type, Some(TaskType::Sentiment));
    assert_eq!(response.logs[0].input_summary, "Processing...");
}

#[tokio::test]
async fn test_response_serializes_to_wire_shape() {
    let (agent, _) = mock_agent();
    let response = agent.run(AgentRequest::new("hi")).await;

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["task_type"], "conversation");
    assert_eq!(json["plan"][0]["status"], "completed");
    assert_eq!(json["logs"][0]["step_name"], "conversational_answer");
    assert_eq!(json["final_output"]["message"], "Hello! How can I help you today?");
    assert!(json.get("error").is_none());
}
