//! Payment-card number detection and redaction for scanned documents.
//!
//! Documents are split into page images, each page is sent to an external
//! text-analysis service, and card numbers found in the recognized text are
//! traced back to the word and line blocks that hold them. Those regions are
//! then covered (and, for PDFs, physically erased) in a copy of the original.
//!
//! # Architecture
//!
//! - [`pages`]: PDF/raster input and page rasterization
//! - [`analysis`]: the analysis collaborator seam and its response codec
//! - [`domain`]: text blocks, card-number matching, redaction elements
//! - [`locate`]: block location, reading order, visibility classification
//! - [`geometry`]: normalized boxes and page-space mapping
//! - [`pipeline`]: per-page orchestration with failure isolation
//! - [`redaction`]: layout and the PDF/raster rendering strategies
//! - [`error`]: document- and page-level errors
//!
//! # Quick Start
//!
//! ```no_run
//! use pan_redactor::{RecordedAnalyzer, RedactionPipeline, RedactionService};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let analyzer = Arc::new(RecordedAnalyzer::new("responses/"));
//! let service = RedactionService::new(RedactionPipeline::new(analyzer));
//!
//! let result = service.redact_to_result(
//!     Path::new("statement.pdf"),
//!     Path::new("statement.redacted.pdf"),
//!     "statement",
//! );
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Pattern Matching
//!
//! ```
//! use pan_redactor::domain::{CardNumberMatcher, PatternMatcher};
//!
//! let matcher = CardNumberMatcher::new();
//! let found = matcher.find_matches("Card: 4111-1111-1111-1111 exp 12/25");
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].label, "**** **** **** 1111");
//! ```

pub mod analysis;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod locate;
pub mod pages;
pub mod pipeline;
pub mod redaction;

pub use analysis::{AnalysisResponse, DocumentAnalyzer, RecordedAnalyzer};
pub use domain::{
    BlockKind, CardNumberMatcher, PatternMatcher, RedactionElement, SensitiveMatch, TextBlock,
};
pub use error::{AnalysisError, PageError, RedactorError, RedactorResult};
pub use geometry::{NormalizedBox, PageDimensions, PdfRect};
pub use locate::{BlockLocator, LocatorStrategy};
pub use pages::{PageImage, PageSplitter, SourceDocument};
pub use pipeline::{
    CancellationToken, DocumentAnalysis, PageReport, PipelineConfig, ProgressObserver,
    RedactionPipeline,
};
pub use redaction::{
    DocumentResult, RedactionOutcome, RedactionService, RedactionStrategy, RenderOptions,
    RenderSummary,
};
