//! Recognized text blocks as returned by the analysis collaborator.

use crate::geometry::NormalizedBox;
use serde::{Deserialize, Serialize};

/// Granularity of a recognized block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockKind {
    Word,
    Line,
    /// Fabricated when no real block could be located for a match
    Synthetic,
}

/// An atomic unit of recognized text with optional page geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    pub id: String,
    pub text: String,
    pub kind: BlockKind,
    /// 0-100
    pub confidence: f32,
    pub bounding_box: Option<NormalizedBox>,
    /// 1-based
    pub page: u32,
}

impl TextBlock {
    pub fn new(id: impl Into<String>, text: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            kind,
            confidence: 100.0,
            bounding_box: None,
            page: 1,
        }
    }

    pub fn with_box(mut self, bbox: NormalizedBox) -> Self {
        self.bounding_box = Some(bbox);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 100.0);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn is_line(&self) -> bool {
        self.kind == BlockKind::Line
    }

    pub fn is_word(&self) -> bool {
        self.kind == BlockKind::Word
    }

    pub fn digits(&self) -> String {
        super::digits_only(&self.text)
    }
}

/// Joins the text of all LINE blocks with single spaces, in returned order.
pub fn line_text(blocks: &[TextBlock]) -> String {
    blocks
        .iter()
        .filter(|b| b.is_line())
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
