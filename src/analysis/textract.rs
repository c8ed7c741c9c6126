//! Decoder for Textract-shaped analysis responses.
//!
//! ```json
//! {"Blocks": [{"Id": "w1", "BlockType": "WORD", "Text": "4111",
//!   "Confidence": 99.1, "Page": 1,
//!   "Geometry": {"BoundingBox": {"Left": 0.1, "Top": 0.2, "Width": 0.05, "Height": 0.01}}}]}
//! ```
//!
//! Block types other than `WORD` and `LINE` (PAGE, KEY_VALUE_SET, ...) are
//! ignored. Bounding boxes may also use the `x/y/width/height` shape.

use super::AnalysisResponse;
use crate::domain::{BlockKind, TextBlock};
use crate::error::AnalysisError;
use crate::geometry::NormalizedBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDocument {
    #[serde(default)]
    blocks: Vec<RawBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawBlock {
    id: Option<String>,
    block_type: String,
    #[serde(default)]
    text: String,
    confidence: Option<f32>,
    geometry: Option<RawGeometry>,
    page: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawGeometry {
    bounding_box: Option<NormalizedBox>,
}

/// Decodes a response body into text blocks.
pub fn parse(body: &[u8]) -> Result<AnalysisResponse, AnalysisError> {
    let raw: RawDocument =
        serde_json::from_slice(body).map_err(|e| AnalysisError::Malformed(e.to_string()))?;

    let mut blocks = Vec::with_capacity(raw.blocks.len());
    for (i, block) in raw.blocks.into_iter().enumerate() {
        let kind = match block.block_type.as_str() {
            "WORD" => BlockKind::Word,
            "LINE" => BlockKind::Line,
            _ => continue,
        };

        let page = block.page.unwrap_or(1);
        if page == 0 {
            return Err(AnalysisError::Malformed(format!(
                "block {} has page 0; pages are 1-based",
                i
            )));
        }

        let mut text_block = TextBlock::new(
            block.id.unwrap_or_else(|| format!("block-{}", i)),
            block.text,
            kind,
        )
        .with_confidence(block.confidence.unwrap_or(0.0))
        .with_page(page);
        text_block.bounding_box = block.geometry.and_then(|g| g.bounding_box);
        blocks.push(text_block);
    }

    Ok(AnalysisResponse::new(blocks))
}
