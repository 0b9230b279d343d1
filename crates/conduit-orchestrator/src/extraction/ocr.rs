//! Image OCR through a vision-capable model.

use async_trait::async_trait;
use conduit_abstraction::MultimodalModel;
use std::sync::Arc;
use tracing::debug;

use super::{Extraction, ImageTextExtractor};
use crate::error::ExtractionError;

/// Instruction sent with every image.
pub const OCR_PROMPT: &str =
    "Extract all visible text from this image. Output ONLY the extracted text. Maintain layout if possible.";

/// Models give no confidence score, so a successful call reports this.
const VISION_CONFIDENCE: f64 = 0.95;

/// Guesses an image MIME type from its magic bytes, defaulting to PNG.
pub fn detect_image_mime(data: &[u8]) -> &'static str {
    if data.starts_with(b"\xff\xd8\xff") {
        "image/jpeg"
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        "image/gif"
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

/// Default [`ImageTextExtractor`].
pub struct VisionOcrService {
    model: Arc<dyn MultimodalModel>,
}

impl VisionOcrService {
    /// Creates an OCR service on top of `model`.
    pub fn new(model: Arc<dyn MultimodalModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ImageTextExtractor for VisionOcrService {
    async fn extract_text(&self, image: &[u8]) -> Result<Extraction, ExtractionError> {
        let mime_type = detect_image_mime(image);
        debug!(model_id = %self.model.model_id(), mime_type, bytes = image.len(), "Running vision OCR");

        let response = self.model.generate_from_image(image, mime_type, OCR_PROMPT).await?;
        Ok(Extraction::new(response.content.trim(), VISION_CONFIDENCE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_models::MockModel;

    #[test]
    fn test_detect_image_mime() {
        assert_eq!(detect_image_mime(b"\x89PNG\r\n\x1a\n...."), "image/png");
        assert_eq!(detect_image_mime(b"\xff\xd8\xff\xe0"), "image/jpeg");
        assert_eq!(detect_image_mime(b"GIF89a..."), "image/gif");
        assert_eq!(detect_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(detect_image_mime(b"RIFF"), "image/png");
    }

    #[tokio::test]
    async fn test_vision_ocr_trims_and_reports_confidence() {
        let service = VisionOcrService::new(Arc::new(MockModel::new("vision".to_string())));
        let extraction = service.extract_text(b"\xff\xd8\xff\xe0").await.unwrap();
        assert_eq!(extraction.text, "Mock text from 4 byte image/jpeg image");
        assert!((extraction.confidence - 0.95).abs() < f64::EPSILON);
    }
}
