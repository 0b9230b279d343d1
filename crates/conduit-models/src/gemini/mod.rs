//! Google Gemini model implementation.
//!
//! This module provides an implementation of the `Model` and `MultimodalModel`
//! traits for Google's Gemini REST API. Images are sent inline as base64; audio
//! goes through the File API (see [`file_api`]).

pub mod file_api;

use async_trait::async_trait;
use base64::Engine;
use conduit_abstraction::{
    ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelUsage, MultimodalModel,
    ResponseFormat,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::{debug, error, warn};

pub use file_api::{FileState, GeminiFile, GeminiFileApi};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_UPLOAD_URL: &str = "https://generativelanguage.googleapis.com/upload/v1beta";

/// Google Gemini model implementation.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    /// The model ID (e.g., "gemini-2.5-flash").
    model_id: String,
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the Gemini API.
    base_url: String,
    /// The base URL for File API uploads.
    upload_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl GeminiModel {
    /// Creates a new `GeminiModel` reading the key from `GEMINI_API_KEY`.
    ///
    /// # Errors
    /// Returns a `ModelError` if the API key is not found in environment variables.
    pub fn new(model_id: String) -> Result<Self, ModelError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            ModelError::UnsupportedModelProvider(
                "GEMINI_API_KEY environment variable not set".to_string(),
            )
        })?;

        Ok(Self::with_api_key(model_id, api_key))
    }

    /// Creates a new `GeminiModel` with a custom API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self {
            model_id,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Points generation and file metadata calls at a different endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Points File API uploads at a different endpoint.
    #[must_use]
    pub fn with_upload_url(mut self, upload_url: impl Into<String>) -> Self {
        self.upload_url = upload_url.into();
        self
    }

    fn file_api(&self) -> GeminiFileApi {
        GeminiFileApi::new(
            self.api_key.clone(),
            self.base_url.clone(),
            self.upload_url.clone(),
            self.client.clone(),
        )
    }

    /// Converts our ChatMessage role to Gemini API role format.
    ///
    /// System messages are filtered out before this is called; they travel in
    /// the `systemInstruction` field.
    fn role_to_gemini(role: &str) -> String {
        match role {
            "assistant" | "agent" => "model".to_string(),
            _ => "user".to_string(),
        }
    }

    /// Concatenates system messages with "\n\n", or `None` if there are none.
    fn extract_system_messages(messages: &[ChatMessage]) -> Option<String> {
        let system_messages: Vec<&str> = messages
            .iter()
            .filter(|msg| msg.role == "system")
            .map(|msg| msg.content.as_str())
            .collect();

        if system_messages.is_empty() { None } else { Some(system_messages.join("\n\n")) }
    }

    fn generation_config(parameters: Option<ModelParameters>) -> Option<GeminiGenerationConfig> {
        parameters.map(|params| GeminiGenerationConfig {
            temperature: params.temperature,
            top_p: params.top_p,
            max_output_tokens: params.max_tokens,
            response_mime_type: match params.response_format {
                Some(ResponseFormat::Json) => Some("application/json".to_string()),
                Some(ResponseFormat::Text) | None => None,
            },
            stop_sequences: params.stop_sequences,
        })
    }

    /// Sends one `generateContent` request and extracts the text answer.
    async fn send(&self, request_body: &GeminiRequest) -> Result<ModelResponse, ModelError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model_id, self.api_key
        );

        let response = self.client.post(&url).json(request_body).send().await.map_err(|e| {
            error!(error = %e, "Failed to send request to Gemini API");
            ModelError::RequestError(format!("Network error: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Gemini API returned error status");
            return Err(file_api::map_http_error(status, &error_text, "generate content"));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Gemini API response");
            ModelError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        let candidate = gemini_response.candidates.first().ok_or_else(|| {
            error!("No candidates in Gemini API response");
            ModelError::ModelResponseError("No content in API response".to_string())
        })?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            warn!(provider = "gemini", "Content was blocked by safety filters");
        }

        let content: String =
            candidate.content.parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if content.is_empty() {
            error!("No text content in Gemini API response");
            return Err(ModelError::ModelResponseError(
                "No text content in API response".to_string(),
            ));
        }

        let usage = gemini_response.usage_metadata.map(|meta| ModelUsage {
            prompt_tokens: meta.prompt_token_count.unwrap_or(0),
            completion_tokens: meta.candidates_token_count.unwrap_or(0),
            total_tokens: meta.total_token_count.unwrap_or(0),
        });

        Ok(ModelResponse { content, model_id: Some(self.model_id.clone()), usage })
    }
}

#[async_trait]
impl Model for GeminiModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            prompt_len = prompt.len(),
            parameters = ?parameters,
            "GeminiModel generating text"
        );

        let messages = vec![ChatMessage::user(prompt)];
        self.generate_chat_completion(&messages, parameters).await
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            "GeminiModel generating chat completion"
        );

        let system_instruction = Self::extract_system_messages(messages);
        let contents: Vec<GeminiContent> = messages
            .iter()
            .filter(|msg| msg.role != "system")
            .map(|msg| GeminiContent {
                role: Self::role_to_gemini(&msg.role),
                parts: vec![GeminiPart::Text { text: msg.content.clone() }],
            })
            .collect();

        let request_body = GeminiRequest {
            contents,
            generation_config: Self::generation_config(parameters),
            system_instruction: system_instruction
                .map(|text| GeminiSystemInstruction { parts: vec![GeminiPart::Text { text }] }),
        };

        self.send(&request_body).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl MultimodalModel for GeminiModel {
    async fn generate_from_image(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            image_bytes = image.len(),
            mime_type = %mime_type,
            "GeminiModel generating from image"
        );

        if image.is_empty() {
            return Err(ModelError::InvalidMediaSource {
                media_source: "inline image".to_string(),
                reason: "Image is empty".to_string(),
            });
        }

        let data = base64::engine::general_purpose::STANDARD.encode(image);
        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![
                    GeminiPart::Text { text: prompt.to_string() },
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData { mime_type: mime_type.to_string(), data },
                    },
                ],
            }],
            generation_config: None,
            system_instruction: None,
        };

        self.send(&request_body).await
    }

    async fn generate_with_audio(
        &self,
        path: &Path,
        prompt: &str,
    ) -> Result<ModelResponse, ModelError> {
        debug!(model_id = %self.model_id, path = %path.display(), "GeminiModel generating with audio");

        let file_api = self.file_api();
        let uploaded = file_api.upload_file(path).await?;
        let mime_type =
            uploaded.mime_type.clone().unwrap_or_else(|| file_api::detect_mime_type(path));

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![
                    GeminiPart::Text { text: prompt.to_string() },
                    GeminiPart::FileData {
                        file_data: GeminiFileData { mime_type, file_uri: uploaded.uri.clone() },
                    },
                ],
            }],
            generation_config: None,
            system_instruction: None,
        };

        let result = self.send(&request_body).await;

        if let Err(e) = file_api.delete_file(&uploaded.name).await {
            warn!(file_name = %uploaded.name, error = %e, "Uploaded audio was not deleted");
        }

        result
    }
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "systemInstruction")]
    system_instruction: Option<GeminiSystemInstruction>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        inline_data: GeminiInlineData,
    },
    FileData {
        file_data: GeminiFileData,
    },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiFileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "topP", skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(rename = "stopSequences", skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiResponseContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)] // Matches API naming
struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}
