//! Audio transcription through a multimodal model.

use async_trait::async_trait;
use conduit_abstraction::MultimodalModel;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

use super::AudioTranscriber;
use crate::error::ExtractionError;

/// Instruction sent with every recording.
pub const AUDIO_PROMPT: &str = "Please transcribe this audio and provide a summary.
Output ONLY valid JSON with keys:
- transcript
- one_line_summary
- bullet_points (list of 3 strings)
- five_sentence_summary
- duration (string like '5:30' or '300s')";

const DEFAULT_EXTENSION: &str = "mp3";

/// Default [`AudioTranscriber`].
///
/// The upload path needs a real file whose extension tells the provider the
/// audio format, so bytes are staged in a named temporary file that is
/// removed when it goes out of scope.
pub struct AudioService {
    model: Arc<dyn MultimodalModel>,
}

impl AudioService {
    /// Creates a transcriber on top of `model`.
    pub fn new(model: Arc<dyn MultimodalModel>) -> Self {
        Self { model }
    }
}

/// `.ext` of the uploaded file name, `.mp3` when there is none.
fn staging_suffix(file_name: Option<&str>) -> String {
    let extension = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or(DEFAULT_EXTENSION);
    format!(".{extension}")
}

#[async_trait]
impl AudioTranscriber for AudioService {
    async fn transcribe(&self, audio: &[u8], file_name: Option<&str>) -> Result<String, ExtractionError> {
        let suffix = staging_suffix(file_name);
        let mut staged = tempfile::Builder::new().prefix("conduit-audio-").suffix(&suffix).tempfile()?;
        staged.write_all(audio)?;
        staged.flush()?;

        debug!(path = %staged.path().display(), bytes = audio.len(), "Staged audio for transcription");

        let response = self.model.generate_with_audio(staged.path(), AUDIO_PROMPT).await.map_err(|e| {
            error!(error = %e, "Audio processing failed");
            ExtractionError::from(e)
        })?;

        Ok(response.content)
    }
}
