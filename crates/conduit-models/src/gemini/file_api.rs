//! Gemini File API client.
//!
//! Audio cannot be sent inline in a `generateContent` call, so it is uploaded
//! first and referenced by URI. Uploaded files are deleted once the prompt
//! that used them has been answered.

use conduit_abstraction::ModelError;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// File state as returned by the Gemini File API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    /// File is being processed by Gemini.
    Processing,
    /// File is ready to use.
    Active,
    /// File processing failed.
    Failed,
}

/// Represents a file uploaded to the Gemini File API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiFile {
    /// File name/ID in format "files/{file-id}".
    pub name: String,
    /// Full URI for referencing the file in prompts.
    pub uri: String,
    /// Current state of the file; absent means ready.
    #[serde(default)]
    pub state: Option<FileState>,
    /// MIME type of the file.
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl GeminiFile {
    fn is_processing(&self) -> bool {
        self.state == Some(FileState::Processing)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: GeminiFile,
}

/// Client for the Gemini File API.
#[derive(Debug, Clone)]
pub struct GeminiFileApi {
    api_key: String,
    http_client: Client,
    /// Base URL for file metadata and deletion.
    base_url: String,
    /// Base URL for media uploads.
    upload_url: String,
    /// Upper bound on waiting for an uploaded file to become ACTIVE.
    processing_timeout: Duration,
}

impl GeminiFileApi {
    /// Creates a new `GeminiFileApi` against the given endpoints.
    #[must_use]
    pub fn new(api_key: String, base_url: String, upload_url: String, http_client: Client) -> Self {
        Self {
            api_key,
            http_client,
            base_url,
            upload_url,
            processing_timeout: Duration::from_secs(300),
        }
    }

    /// Uploads a file from disk.
    ///
    /// The MIME type is taken from the file extension. Returns once the file
    /// is ACTIVE.
    ///
    /// # Errors
    /// Returns `ModelError` if the file cannot be read, uploaded, or processed.
    pub async fn upload_file(&self, file_path: &Path) -> Result<GeminiFile, ModelError> {
        debug!(path = %file_path.display(), "Uploading file to Gemini File API");

        let file_bytes =
            tokio::fs::read(file_path).await.map_err(|e| ModelError::InvalidMediaSource {
                media_source: file_path.display().to_string(),
                reason: format!("Failed to read file: {}", e),
            })?;

        let file_name = file_path.file_name().and_then(|s| s.to_str()).ok_or_else(|| {
            ModelError::InvalidMediaSource {
                media_source: file_path.display().to_string(),
                reason: "Invalid filename".to_string(),
            }
        })?;

        let mime = detect_mime_type(file_path);

        let form = Form::new().part(
            "file",
            Part::bytes(file_bytes)
                .file_name(file_name.to_string())
                .mime_str(&mime)
                .map_err(|e| ModelError::RequestError(format!("Failed to set MIME type: {}", e)))?,
        );

        let url = format!("{}/files?key={}", self.upload_url, self.api_key);
        let response = self
            .http_client
            .post(&url)
            .header("X-Goog-Upload-Protocol", "multipart")
            .multipart(form)
            .send()
            .await
            .map_err(|e| ModelError::RequestError(format!("Failed to upload file: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_http_error(status, &error_text, "file upload"));
        }

        let uploaded: UploadResponse = response.json().await.map_err(|e| {
            ModelError::SerializationError(format!("Failed to parse upload response: {}", e))
        })?;

        debug!(file_name = %uploaded.file.name, state = ?uploaded.file.state, "File uploaded");

        if !uploaded.file.is_processing() {
            return Ok(uploaded.file);
        }

        match self.poll_until_active(&uploaded.file.name).await {
            Ok(file) => Ok(file),
            Err(e) => {
                // Callers only get a name back on success.
                if let Err(delete_err) = self.delete_file(&uploaded.file.name).await {
                    warn!(file_name = %uploaded.file.name, error = %delete_err, "Failed upload was not deleted");
                }
                Err(e)
            }
        }
    }

    /// Retrieves file metadata by name.
    ///
    /// # Errors
    /// Returns `ModelError` if the file cannot be retrieved.
    pub async fn get_file(&self, file_name: &str) -> Result<GeminiFile, ModelError> {
        let url = format!("{}/{}?key={}", self.base_url, file_name, self.api_key);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ModelError::RequestError(format!("Failed to retrieve file: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_http_error(status, &error_text, &format!("retrieve file {}", file_name)));
        }

        response.json().await.map_err(|e| {
            ModelError::SerializationError(format!("Failed to parse file response: {}", e))
        })
    }

    /// Polls file state until it becomes ACTIVE or fails.
    ///
    /// Backoff: 1s, 2s, 4s, 8s, then 10s until the processing timeout.
    async fn poll_until_active(&self, file_name: &str) -> Result<GeminiFile, ModelError> {
        let start_time = Instant::now();
        let mut delay = Duration::from_secs(1);
        let max_delay = Duration::from_secs(10);

        loop {
            if start_time.elapsed() > self.processing_timeout {
                return Err(ModelError::RequestError(format!(
                    "File processing timeout after {}s: {}",
                    self.processing_timeout.as_secs(),
                    file_name
                )));
            }

            let file = self.get_file(file_name).await?;
            match file.state {
                Some(FileState::Processing) => {
                    debug!(file_name = %file_name, elapsed = ?start_time.elapsed(), "File still processing");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(max_delay);
                }
                Some(FileState::Failed) => {
                    return Err(ModelError::ModelResponseError(format!(
                        "File processing failed: {}",
                        file_name
                    )));
                }
                Some(FileState::Active) | None => return Ok(file),
            }
        }
    }

    /// Deletes an uploaded file. A 404 counts as already deleted.
    ///
    /// # Errors
    /// Returns `ModelError` if deletion fails.
    pub async fn delete_file(&self, file_name: &str) -> Result<(), ModelError> {
        let url = format!("{}/{}?key={}", self.base_url, file_name, self.api_key);

        let response = self
            .http_client
            .delete(&url)
            .send()
            .await
            .map_err(|e| ModelError::RequestError(format!("Failed to delete file: {}", e)))?;

        let status = response.status();
        if status == 404 {
            debug!(file_name = %file_name, "File not found (already deleted or expired)");
            return Ok(());
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            warn!(file_name = %file_name, status = %status, "Failed to delete uploaded file");
            return Err(map_http_error(status, &error_text, &format!("delete file {}", file_name)));
        }

        debug!(file_name = %file_name, "File deleted");
        Ok(())
    }
}

/// Maps HTTP status codes to appropriate ModelError variants.
pub(crate) fn map_http_error(
    status: reqwest::StatusCode,
    error_text: &str,
    operation: &str,
) -> ModelError {
    match status.as_u16() {
        400 => ModelError::RequestError(format!("Invalid request for {}: {}", operation, error_text)),
        401 | 403 => ModelError::UnsupportedModelProvider(format!(
            "Authentication failed for {}: {}",
            operation, error_text
        )),
        402 | 429 => ModelError::QuotaExceeded {
            provider: "gemini".to_string(),
            message: Some(format!("{}: {}", operation, error_text)),
        },
        404 => ModelError::RequestError(format!("Not found for {}: {}", operation, error_text)),
        413 => ModelError::RequestError(format!("File too large for {}: {}", operation, error_text)),
        500..=599 => ModelError::RequestError(format!(
            "Server error for {} ({}): {}",
            operation, status, error_text
        )),
        _ => ModelError::ModelResponseError(format!(
            "Unexpected error for {} ({}): {}",
            operation, status, error_text
        )),
    }
}

/// Detects MIME type from file extension.
pub(crate) fn detect_mime_type(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().essence_str().to_string()
}
