//! Scripted model used by the unit tests of this crate.

use async_trait::async_trait;
use conduit_abstraction::{
    ChatMessage, Model, ModelError, ModelParameters, ModelResponse, MultimodalModel,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Replies with queued answers in order, then with `"ok"`.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub(crate) fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    pub(crate) fn failing(error: ModelError) -> Self {
        Self { replies: Mutex::new(VecDeque::from([Err(error)])), ..Self::default() }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    async fn reply(&self, prompt: &str) -> Result<ModelResponse, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.replies.lock().unwrap().pop_front().unwrap_or_else(|| Ok("ok".to_string()));
        next.map(|content| ModelResponse { content, model_id: Some("scripted".to_string()), usage: None })
    }
}

#[async_trait]
impl Model for ScriptedModel {
    async fn generate_text(
        &self,
        prompt: &str,
        _parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        self.reply(prompt).await
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        _parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        let joined = messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n");
        self.reply(&joined).await
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

#[async_trait]
impl MultimodalModel for ScriptedModel {
    async fn generate_from_image(
        &self,
        _image: &[u8],
        _mime_type: &str,
        prompt: &str,
    ) -> Result<ModelResponse, ModelError> {
        self.reply(prompt).await
    }

    async fn generate_with_audio(&self, _path: &Path, prompt: &str) -> Result<ModelResponse, ModelError> {
        self.reply(prompt).await
    }
}
