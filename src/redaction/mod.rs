//! Redaction strategies and the service tying detection to rendering.
//!
//! [`RedactionService`] runs the detection pipeline over a source document,
//! picks the strategy matching its container format, and writes the
//! redacted copy. [`DocumentResult`] is the structured, serializable
//! outcome handed back to callers.

pub mod layout;
pub mod pdf;
pub mod raster;
pub mod secure;
pub mod strategy;

pub use layout::{DrawOp, PlaceholderGrid, RedactionPlan, Region, RenderOptions, RgbColor};
pub use pdf::PdfRedactionStrategy;
pub use raster::RasterRedactionStrategy;
pub use strategy::{RedactionStrategy, RenderSummary};

use crate::domain::{CardNumberMatcher, RedactionElement};
use crate::error::{RedactorError, RedactorResult};
use crate::pages::{DocumentFormat, SourceDocument};
use crate::pipeline::{DocumentAnalysis, PageReport, RedactionPipeline};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct RedactionOutcome {
    pub analysis: DocumentAnalysis,
    pub summary: RenderSummary,
    pub strategy: String,
}

/// Serializable result of redacting one document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResult {
    pub success: bool,
    pub document_type: String,
    pub extracted_text: String,
    pub extracted_fields: Vec<RedactionElement>,
    pub pages: Vec<PageReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentResult {
    /// Folds a run outcome into a result; a fatal error becomes `success: false`.
    pub fn from_outcome(document_type: &str, outcome: RedactorResult<RedactionOutcome>) -> Self {
        match outcome {
            Ok(outcome) => Self {
                success: true,
                document_type: document_type.to_string(),
                extracted_text: outcome.analysis.text,
                extracted_fields: outcome.analysis.elements,
                pages: outcome.analysis.pages,
                render: Some(outcome.summary),
                error: None,
            },
            Err(err) => Self {
                success: false,
                document_type: document_type.to_string(),
                extracted_text: String::new(),
                extracted_fields: Vec::new(),
                pages: Vec::new(),
                render: None,
                error: Some(err.to_string()),
            },
        }
    }

    /// Replaces card numbers in `extracted_text` with their masked labels.
    ///
    /// The text is the raw recognized content and otherwise carries every
    /// number that was redacted from the document.
    pub fn with_masked_text(mut self) -> Self {
        self.extracted_text = CardNumberMatcher::new().mask(&self.extracted_text);
        self
    }

    /// True when the document succeeded but some pages did not.
    pub fn is_partial(&self) -> bool {
        self.success && self.pages.iter().any(|p| !p.success)
    }
}

/// Redaction service coordinating detection and strategy execution.
pub struct RedactionService {
    pipeline: RedactionPipeline,
    options: RenderOptions,
}

impl RedactionService {
    pub fn new(pipeline: RedactionPipeline) -> Self {
        Self {
            pipeline,
            options: RenderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn pipeline(&self) -> &RedactionPipeline {
        &self.pipeline
    }

    /// Strategy for a document's container format.
    pub fn strategy_for(&self, format: DocumentFormat) -> Box<dyn RedactionStrategy> {
        match format {
            DocumentFormat::Pdf => Box::new(PdfRedactionStrategy::new(self.options.clone())),
            DocumentFormat::Raster(_) => {
                Box::new(RasterRedactionStrategy::new(self.options.clone()))
            }
        }
    }

    /// Detects card numbers in `input` and writes a redacted copy to `output`.
    pub fn redact(&self, input: &Path, output: &Path) -> RedactorResult<RedactionOutcome> {
        if !input.exists() {
            return Err(RedactorError::Io {
                path: input.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Input file does not exist",
                ),
            });
        }

        if same_file(input, output) {
            return Err(RedactorError::InvalidInput {
                parameter: "output".to_string(),
                reason: "output must differ from input".to_string(),
            });
        }

        let source = SourceDocument::open(input)?;
        let analysis = self.pipeline.analyze_document(&source)?;
        if analysis.is_partial() {
            warn!(
                failed = analysis.failed_pages().count(),
                pages = analysis.pages.len(),
                "partial result; some pages were not analyzed"
            );
        }

        let strategy = self.strategy_for(source.format);
        self.pipeline.report("Rendering redactions", 0, 1);
        let summary = strategy.redact(input, output, &analysis.elements)?;
        self.pipeline.report("Redaction complete", 1, 1);

        info!(
            strategy = strategy.name(),
            elements = analysis.elements.len(),
            rectangles = summary.rectangles_drawn,
            secure = summary.secure,
            "document redacted"
        );

        Ok(RedactionOutcome {
            analysis,
            summary,
            strategy: strategy.name().to_string(),
        })
    }

    /// Like [`redact`](Self::redact), but always returns a [`DocumentResult`].
    pub fn redact_to_result(
        &self,
        input: &Path,
        output: &Path,
        document_type: &str,
    ) -> DocumentResult {
        DocumentResult::from_outcome(document_type, self.redact(input, output))
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome_result() {
        let result = DocumentResult::from_outcome(
            "statement",
            Err(RedactorError::NoPagesProcessed {
                pages: 2,
                last_error: "boom".to_string(),
            }),
        );
        assert!(!result.success);
        assert!(!result.is_partial());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["documentType"], "statement");
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("no pages processed"));
        assert!(json.get("render").is_none());
    }

    #[test]
    fn test_partial_result() {
        let analysis = DocumentAnalysis {
            text: String::new(),
            elements: Vec::new(),
            pages: vec![
                PageReport {
                    page_index: 0,
                    success: true,
                    error: None,
                    elements: 0,
                },
                PageReport {
                    page_index: 1,
                    success: false,
                    error: Some("timeout".to_string()),
                    elements: 0,
                },
            ],
        };
        let result = DocumentResult::from_outcome(
            "receipt",
            Ok(RedactionOutcome {
                analysis,
                summary: RenderSummary::none(2),
                strategy: "PdfOverlay".to_string(),
            }),
        );
        assert!(result.success);
        assert!(result.is_partial());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["pages"][1]["pageIndex"], 1);
        assert_eq!(json["pages"][1]["success"], false);
    }

    #[test]
    fn test_masked_text_keeps_only_tails() {
        let analysis = DocumentAnalysis {
            text: "Card: 4111 1111 1111 1111\nThank you".to_string(),
            elements: Vec::new(),
            pages: Vec::new(),
        };
        let result = DocumentResult::from_outcome(
            "receipt",
            Ok(RedactionOutcome {
                analysis,
                summary: RenderSummary::none(1),
                strategy: "RasterPaint".to_string(),
            }),
        );
        assert!(result.extracted_text.contains("4111 1111"));

        let masked = result.with_masked_text();
        assert_eq!(masked.extracted_text, "Card: **** **** **** 1111\nThank you");
    }
}
