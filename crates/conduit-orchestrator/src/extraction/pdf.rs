//! PDF text layer extraction backed by `pdf-extract`.

use tracing::{debug, warn};

use super::{Extraction, PdfTextExtractor};
use crate::error::ExtractionError;

/// Default [`PdfTextExtractor`].
///
/// Scanned PDFs without a text layer come back as empty text with zero
/// confidence rather than as an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractService;

impl PdfExtractService {
    /// Creates the extractor.
    pub const fn new() -> Self {
        Self
    }
}

impl PdfTextExtractor for PdfExtractService {
    fn extract_text(&self, pdf: &[u8]) -> Result<Extraction, ExtractionError> {
        if pdf.is_empty() {
            return Err(ExtractionError::Unreadable { kind: "PDF", reason: "empty document".to_string() });
        }

        let raw = pdf_extract::extract_text_from_mem(pdf).map_err(|e| {
            warn!(error = %e, "PDF extraction failed");
            ExtractionError::Unreadable { kind: "PDF", reason: e.to_string() }
        })?;

        let text = clean_text(&raw);
        let confidence = if text.is_empty() { 0.0 } else { 1.0 };
        debug!(chars = text.len(), confidence, "Extracted PDF text");

        Ok(Extraction { text, confidence })
    }
}

/// Drops blank lines and trailing whitespace left by the layout pass.
fn clean_text(raw: &str) -> String {
    raw.lines().map(str::trim_end).filter(|line| !line.trim().is_empty()).collect::<Vec<_>>().join("\n")
}
