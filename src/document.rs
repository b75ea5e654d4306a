//! PDF text extraction for attaching documents to a conversation

use crate::conversation::Notice;
use std::path::Path;
use thiserror::Error;

/// Files above this size are rejected before they are read.
pub const MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{} is not a PDF file", .path)]
    NotPdf { path: String },
    #[error("File is {size} bytes, limit is {MAX_DOCUMENT_BYTES}")]
    TooLarge { size: u64 },
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse PDF file: {0}")]
    Parse(String),
}

impl ExtractionError {
    /// The notice shown when an upload fails; the conversation is untouched.
    pub fn notice(&self) -> Notice {
        match self {
            Self::NotPdf { .. } => Notice::error("Invalid file", "Please select a valid PDF file."),
            Self::TooLarge { .. } => {
                Notice::error("File too large", "Please select a PDF file smaller than 10MB.")
            }
            Self::Io(_) | Self::Parse(_) => Notice::error(
                "Upload failed",
                "Failed to process the PDF file. Please try again.",
            ),
        }
    }
}

/// Turns document bytes into plain text
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// `lopdf`-backed extractor: pages in order, joined by newlines, trimmed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl DocumentExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError::Parse(e.to_string()))?;

        let mut text = String::new();
        for page in doc.get_pages().into_keys() {
            let page_text = doc
                .extract_text(&[page])
                .map_err(|e| ExtractionError::Parse(format!("page {page}: {e}")))?;
            text.push_str(page_text.trim_end());
            text.push('\n');
        }
        Ok(text.trim().to_string())
    }
}

/// A document read from disk, ready for `Conversation::attach_document`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub filename: String,
    pub text: String,
}

/// Check, read and extract the file at `path`.
///
/// The extension and size are checked from metadata so oversized files are
/// never read into memory.
pub fn load_document(
    path: &Path,
    extractor: &dyn DocumentExtractor,
) -> Result<LoadedDocument, ExtractionError> {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(ExtractionError::NotPdf {
            path: path.display().to_string(),
        });
    }

    let size = std::fs::metadata(path)?.len();
    if size > MAX_DOCUMENT_BYTES {
        return Err(ExtractionError::TooLarge { size });
    }

    let bytes = std::fs::read(path)?;
    let text = extractor.extract(&bytes)?;
    let filename = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    tracing::info!(
        filename = %filename,
        bytes = size,
        chars = text.chars().count(),
        "Extracted document text"
    );
    Ok(LoadedDocument { filename, text })
}
