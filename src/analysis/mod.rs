//! The document-analysis collaborator boundary.
//!
//! OCR itself happens elsewhere. This module defines what the pipeline asks
//! of an analysis service, a decoder for Textract-shaped responses, and a
//! file-backed analyzer that replays recorded responses.

pub mod recorded;
pub mod textract;

pub use recorded::RecordedAnalyzer;

use crate::domain::TextBlock;
use crate::error::AnalysisError;
use crate::pages::PageImage;

/// Text blocks returned for one page image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResponse {
    pub blocks: Vec<TextBlock>,
}

impl AnalysisResponse {
    pub fn new(blocks: Vec<TextBlock>) -> Self {
        Self { blocks }
    }
}

/// An external service that recognizes text on a page image.
///
/// Implementations are called once per page, sequentially, possibly from a
/// helper thread when the pipeline enforces a timeout.
pub trait DocumentAnalyzer: Send + Sync {
    fn analyze(&self, page: &PageImage) -> Result<AnalysisResponse, AnalysisError>;

    /// Returns a human-readable name for this analyzer.
    fn name(&self) -> &str;
}
