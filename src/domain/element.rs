//! Resolved redaction units handed to the renderer.

use super::block::{BlockKind, TextBlock};
use crate::geometry::NormalizedBox;
use serde::{Deserialize, Serialize};

/// A finer-grained rectangle inside an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordBox {
    pub id: String,
    pub bounding_box: NormalizedBox,
    pub confidence: f32,
}

/// One region (or set of regions) that must be obscured on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactionElement {
    pub id: String,
    /// Masked label describing what was hidden; never the raw number.
    pub text: String,
    pub kind: BlockKind,
    pub bounding_box: Option<NormalizedBox>,
    pub confidence: f32,
    /// 0-based
    pub page_index: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub word_level_blocks: Vec<WordBox>,
}

impl RedactionElement {
    /// Builds an element covering `blocks`, which must all carry geometry.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_blocks(
        id: impl Into<String>,
        label: impl Into<String>,
        page_index: usize,
        blocks: &[&TextBlock],
    ) -> Option<Self> {
        let first = blocks.first()?;
        let kind = if blocks.iter().all(|b| b.kind == BlockKind::Synthetic) {
            BlockKind::Synthetic
        } else {
            first.kind
        };

        let bounding_box = blocks
            .iter()
            .filter_map(|b| b.bounding_box)
            .reduce(|acc, b| acc.union(&b));
        let confidence = blocks
            .iter()
            .map(|b| b.confidence)
            .fold(f32::INFINITY, f32::min);

        // A lone block is already as precise as it gets.
        let word_level_blocks = if blocks.len() > 1 && kind != BlockKind::Synthetic {
            blocks
                .iter()
                .filter_map(|b| {
                    b.bounding_box.map(|bbox| WordBox {
                        id: b.id.clone(),
                        bounding_box: bbox,
                        confidence: b.confidence,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        Some(Self {
            id: id.into(),
            text: label.into(),
            kind,
            bounding_box,
            confidence,
            page_index,
            word_level_blocks,
        })
    }

    /// Geometry the renderer can trust.
    ///
    /// Synthetic elements carry a placeholder box that says nothing about
    /// where the number really is, so they report no usable box.
    pub fn usable_box(&self) -> Option<&NormalizedBox> {
        match self.kind {
            BlockKind::Synthetic => None,
            _ => self.bounding_box.as_ref(),
        }
    }

    pub fn is_unlocated(&self) -> bool {
        self.word_level_blocks.is_empty() && self.usable_box().is_none()
    }
}
