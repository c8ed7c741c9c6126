//! Error types for the card-number redaction pipeline.
//!
//! Errors fall into two tiers. [`RedactorError`] is fatal for a whole
//! document: splitting failed, no page could be analyzed, the run was
//! cancelled, or the output could not be written. [`PageError`] is scoped to
//! a single page and is recorded in the page manifest instead of aborting.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for redaction operations.
pub type RedactorResult<T> = Result<T, RedactorError>;

/// Document-level error for all redaction operations.
#[derive(Debug)]
pub enum RedactorError {
    /// Error occurred while reading or writing files
    Io { path: PathBuf, source: io::Error },

    /// A page could not be rendered while splitting the source document
    PageSplit {
        page: usize,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Every page of a non-empty document failed analysis
    NoPagesProcessed { pages: usize, last_error: String },

    /// The caller cancelled the run between pages
    Cancelled { completed_pages: usize },

    /// Error occurred while drawing redactions into the output document
    PdfProcessing {
        message: String,
        page: Option<usize>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid configuration or parameters
    InvalidInput { parameter: String, reason: String },

    /// Backend-specific error (MuPDF, LoPDF, image codecs)
    BackendError {
        backend: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl fmt::Display for RedactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "IO error for path '{}': {}", path.display(), source)
            }
            Self::PageSplit { page, message, .. } => {
                write!(f, "Failed to split page {}: {}", page, message)
            }
            Self::NoPagesProcessed { pages, last_error } => {
                write!(
                    f,
                    "no pages processed ({} page(s) failed, last error: {})",
                    pages, last_error
                )
            }
            Self::Cancelled { completed_pages } => {
                write!(f, "Cancelled after {} page(s)", completed_pages)
            }
            Self::PdfProcessing { message, page, .. } => {
                if let Some(p) = page {
                    write!(f, "PDF processing error on page {}: {}", p, message)
                } else {
                    write!(f, "PDF processing error: {}", message)
                }
            }
            Self::InvalidInput { parameter, reason } => {
                write!(f, "Invalid input for '{}': {}", parameter, reason)
            }
            Self::BackendError {
                backend, message, ..
            } => {
                write!(f, "{} backend error: {}", backend, message)
            }
        }
    }
}

impl std::error::Error for RedactorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::PageSplit { source, .. }
            | Self::PdfProcessing { source, .. }
            | Self::BackendError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl RedactorError {
    /// Wraps a `lopdf` failure.
    pub(crate) fn lopdf(message: impl Into<String>, err: lopdf::Error) -> Self {
        Self::BackendError {
            backend: "LoPDF".to_string(),
            message: format!("{}: {}", message.into(), err),
            source: Some(Box::new(err)),
        }
    }

    /// Wraps a MuPDF failure.
    pub(crate) fn mupdf(message: impl Into<String>, err: mupdf::Error) -> Self {
        Self::BackendError {
            backend: "MuPDF".to_string(),
            message: format!("{}: {}", message.into(), err),
            source: Some(Box::new(err)),
        }
    }
}

impl From<image::ImageError> for RedactorError {
    fn from(err: image::ImageError) -> Self {
        Self::BackendError {
            backend: "image".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Failure reported by (or while talking to) the analysis collaborator.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Network or process failure reaching the service
    #[error("analysis transport failed: {0}")]
    Transport(String),

    /// The service refused the page (unsupported content type, size, quota)
    #[error("analysis rejected page content: {0}")]
    Rejected(String),

    /// The response could not be decoded into text blocks
    #[error("malformed analysis response: {0}")]
    Malformed(String),

    /// The call did not finish within the caller's budget
    #[error("analysis timed out after {0:?}")]
    Timeout(Duration),

    /// The analyzer panicked or vanished mid-call
    #[error("analysis aborted: {0}")]
    Aborted(String),

    /// Matching or locating failed on blocks the analyzer returned
    #[error("detection failed: {0}")]
    Detection(String),
}

/// A single page's failure, kept in the manifest.
#[derive(Debug, thiserror::Error)]
#[error("page {page} failed: {source}")]
pub struct PageError {
    /// 1-based page number
    pub page: usize,
    #[source]
    pub source: AnalysisError,
}

impl PageError {
    pub fn new(page_index: usize, source: AnalysisError) -> Self {
        Self {
            page: page_index + 1,
            source,
        }
    }
}
