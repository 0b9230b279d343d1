//! Content extraction collaborators.
//!
//! Each source of text the executor can pull from (PDF text layers, images,
//! video captions, audio recordings) sits behind its own trait so that
//! tests and alternative backends can stand in for the defaults.

mod audio;
mod ocr;
mod pdf;
mod youtube;

use async_trait::async_trait;

use crate::error::ExtractionError;

pub use audio::{AUDIO_PROMPT, AudioService};
pub use ocr::{OCR_PROMPT, VisionOcrService, detect_image_mime};
pub use pdf::PdfExtractService;
pub use youtube::{
    INVALID_URL_MESSAGE, TRANSCRIPT_UNAVAILABLE_MESSAGE, YouTubeTranscriptService, extract_video_id,
};

/// Text recovered from a document, with a rough confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Extracted text.
    pub text: String,
    /// How much the extractor trusts the text.
    pub confidence: f64,
}

impl Extraction {
    /// Creates an extraction result.
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self { text: text.into(), confidence }
    }
}

/// Outcome of a transcript lookup.
///
/// On failure `text` carries a user-facing reason instead of a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Transcript or failure reason.
    pub text: String,
    /// Whether `text` is a transcript.
    pub success: bool,
}

impl Transcript {
    /// A fetched transcript.
    pub fn found(text: impl Into<String>) -> Self {
        Self { text: text.into(), success: true }
    }

    /// A failed lookup with its reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self { text: reason.into(), success: false }
    }
}

/// Reads the text layer of a PDF.
pub trait PdfTextExtractor: Send + Sync {
    /// Extracts all page text from `pdf`.
    fn extract_text(&self, pdf: &[u8]) -> Result<Extraction, ExtractionError>;
}

/// Recognizes text in an image.
#[async_trait]
pub trait ImageTextExtractor: Send + Sync {
    /// Extracts visible text from `image`.
    async fn extract_text(&self, image: &[u8]) -> Result<Extraction, ExtractionError>;
}

/// Looks up the captions of a video link.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Fetches the transcript of the video referenced in `url`. Never fails;
    /// problems are reported through [`Transcript::success`].
    async fn fetch_transcript(&self, url: &str) -> Transcript;
}

/// Transcribes and summarizes an audio recording.
#[async_trait]
pub trait AudioTranscriber: Send + Sync {
    /// Returns the model's raw answer, normally a JSON object with a
    /// `transcript` key.
    async fn transcribe(&self, audio: &[u8], file_name: Option<&str>) -> Result<String, ExtractionError>;
}
