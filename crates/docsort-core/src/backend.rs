use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
}

/// Trait for PDF text extraction backends.
///
/// Implementors provide the low-level text extraction step; cleaning and
/// categorization live in the pipeline. The split keeps the orchestrator
/// testable with an in-memory stand-in and isolates the mupdf dependency
/// in its own crate.
pub trait PdfBackend: Send + Sync {
    /// Extract the full text content of a PDF file, pages concatenated.
    fn extract_text(&self, path: &Path) -> Result<String, BackendError>;
}
