//! Redaction strategy trait and supporting types.
//!
//! A strategy paints resolved elements into a copy of the source document.
//! The PDF and raster backends share the same [`RedactionPlan`] layout.
//!
//! [`RedactionPlan`]: super::layout::RedactionPlan

use crate::domain::RedactionElement;
use crate::error::RedactorResult;
use serde::Serialize;
use std::path::Path;

/// Statistics about a render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSummary {
    /// Opaque rectangles drawn, located and placeholder alike
    pub rectangles_drawn: usize,

    /// Grid cells drawn for elements without usable geometry
    pub placeholders: usize,

    /// Elements referencing a page the output does not have
    pub skipped_elements: usize,

    pub pages_processed: usize,

    /// Pages with at least one drawing operation
    pub pages_modified: usize,

    /// Whether content under located regions was physically removed
    pub secure: bool,
}

impl RenderSummary {
    /// Summary for a document that needed no drawing.
    pub fn none(pages_processed: usize) -> Self {
        Self {
            pages_processed,
            ..Default::default()
        }
    }

    pub fn has_redactions(&self) -> bool {
        self.rectangles_drawn > 0
    }
}

/// Strategy for painting redactions into an output document.
pub trait RedactionStrategy: Send + Sync {
    /// Writes a redacted copy of `input` to `output`.
    ///
    /// The input is never modified. With no elements the output is a
    /// byte-for-byte copy.
    fn redact(
        &self,
        input: &Path,
        output: &Path,
        elements: &[RedactionElement],
    ) -> RedactorResult<RenderSummary>;

    /// Returns a human-readable name for this strategy.
    fn name(&self) -> &str;

    /// Returns whether this strategy removes content rather than covering it.
    fn is_secure(&self) -> bool;
}

/// Copies `input` to `output` unchanged.
pub(crate) fn copy_unchanged(input: &Path, output: &Path) -> RedactorResult<()> {
    std::fs::copy(input, output).map_err(|e| crate::error::RedactorError::Io {
        path: output.to_path_buf(),
        source: e,
    })?;
    Ok(())
}
