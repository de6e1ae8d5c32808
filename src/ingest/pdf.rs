//! PDF text extraction capability.
//!
//! The ingestor only sees the `PdfTextExtractor` trait; the default backend is
//! `pdf-extract`, and tests swap in fakes.

use thiserror::Error;

/// Extraction failure. Fatal for fetched links, recoverable for inline uploads.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PdfError(pub String);

/// Turns PDF bytes into text.
pub trait PdfTextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, PdfError>;
}

/// Default backend built on the `pdf-extract` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractBackend;

impl PdfTextExtractor for PdfExtractBackend {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, PdfError> {
        // pdf-extract panics on some malformed documents
        match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(PdfError(e.to_string())),
            Err(_) => Err(PdfError("PDF parser panicked on malformed input".to_string())),
        }
    }
}
