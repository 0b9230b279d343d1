//! Model implementations for Conduit.
//!
//! This crate provides concrete implementations of the `Model` and
//! `MultimodalModel` traits.
//!
//! # Supported Providers
//!
//! - **Mock**: Testing and offline runs
//! - **Gemini**: Google's Gemini models (API key required)

pub mod factory;
pub mod gemini;

use async_trait::async_trait;
use conduit_abstraction::{
    ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelUsage, MultimodalModel,
};
use std::path::Path;
use tracing::debug;

pub use factory::{ModelConfig, ModelFactory, ModelType};
pub use gemini::GeminiModel;

/// A mock implementation of the model traits for testing and demonstration.
///
/// Responses echo the prompt, so nothing it returns is valid JSON.
#[derive(Debug, Default)]
pub struct MockModel {
    id: String,
}

impl MockModel {
    /// Creates a new `MockModel` with the given ID.
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self { id }
    }

    fn respond(&self, prompt_tokens: u32, content: String) -> ModelResponse {
        let completion_tokens = count_tokens(&content);
        ModelResponse {
            content,
            model_id: Some(self.id.clone()),
            usage: Some(ModelUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        }
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(model_id = %self.id, prompt_len = prompt.len(), parameters = ?parameters, "MockModel generating text");

        Ok(self.respond(count_tokens(prompt), format!("Mock response for: {prompt}")))
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        use std::fmt::Write;

        debug!(
            model_id = %self.id,
            message_count = messages.len(),
            parameters = ?parameters,
            "MockModel generating chat completion"
        );

        let mut conversation_summary = String::from("Conversation Summary:\n");
        for message in messages {
            let _ = writeln!(conversation_summary, "  {}: {}", message.role, message.content);
        }

        let prompt_tokens = messages.iter().map(|m| count_tokens(&m.content)).sum::<u32>();
        Ok(self.respond(prompt_tokens, format!("Mock chat response from {}\n{conversation_summary}", self.id)))
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl MultimodalModel for MockModel {
    async fn generate_from_image(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<ModelResponse, ModelError> {
        debug!(model_id = %self.id, image_bytes = image.len(), "MockModel generating from image");

        Ok(self.respond(
            count_tokens(prompt),
            format!("Mock text from {} byte {mime_type} image", image.len()),
        ))
    }

    async fn generate_with_audio(
        &self,
        path: &Path,
        prompt: &str,
    ) -> Result<ModelResponse, ModelError> {
        let size = tokio::fs::metadata(path).await.map(|m| m.len()).map_err(|e| {
            ModelError::InvalidMediaSource {
                media_source: path.display().to_string(),
                reason: format!("Failed to read file: {}", e),
            }
        })?;

        Ok(self.respond(count_tokens(prompt), format!("Mock transcript of {size} byte audio")))
    }
}

/// Count tokens in a string (simplified: word count).
#[allow(clippy::cast_possible_truncation)]
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_model_echoes_prompt() {
        let model = MockModel::new("mock".to_string());
        let response = model.generate_text("hello there", None).await.unwrap();
        assert_eq!(response.content, "Mock response for: hello there");
        assert_eq!(response.usage.unwrap().prompt_tokens, 2);
    }

    #[tokio::test]
    async fn test_mock_model_reads_audio_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp3");
        std::fs::write(&path, [0_u8; 16]).unwrap();

        let model = MockModel::new("mock".to_string());
        let response = model.generate_with_audio(&path, "transcribe").await.unwrap();
        assert_eq!(response.content, "Mock transcript of 16 byte audio");
    }

    #[tokio::test]
    async fn test_mock_model_missing_audio_file() {
        let model = MockModel::new("mock".to_string());
        let err = model
            .generate_with_audio(Path::new("/definitely/not/here.mp3"), "transcribe")
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidMediaSource { .. }));
    }
}
