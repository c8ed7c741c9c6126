//! Page geometry and the normalized-to-absolute coordinate mapper.
//!
//! Detection coordinates arrive as fractions of the page (origin top-left).
//! Output documents are drawn in absolute units with the origin at the
//! bottom-left corner, so the vertical axis is flipped during mapping.

use serde::{Deserialize, Serialize};

/// Padding added around every mapped rectangle, in output units.
pub const DEFAULT_PADDING: f32 = 2.0;

/// Rectangle used for blocks with no geometry: a thin strip near the top-left.
pub const DEFAULT_BOX: NormalizedBox = NormalizedBox {
    left: 0.1,
    top: 0.1,
    width: 0.3,
    height: 0.03,
};

/// A rectangle expressed as fractions of the page, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "BoundingBoxInput", rename_all = "PascalCase")]
pub struct NormalizedBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedBox {
    /// Builds a box, clamping every component into `[0, 1]`.
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left: clamp_unit(left),
            top: clamp_unit(top),
            width: clamp_unit(width),
            height: clamp_unit(height),
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &NormalizedBox) -> NormalizedBox {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        NormalizedBox::new(
            left,
            top,
            self.right().max(other.right()) - left,
            self.bottom().max(other.bottom()) - top,
        )
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// The two box shapes found in analysis payloads and stored elements.
///
/// Both carry the same four quantities; they are folded into
/// [`NormalizedBox`] as soon as they are deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BoundingBoxInput {
    Pascal {
        #[serde(rename = "Left")]
        left: f32,
        #[serde(rename = "Top")]
        top: f32,
        #[serde(rename = "Width")]
        width: f32,
        #[serde(rename = "Height")]
        height: f32,
    },
    Xy {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

impl From<BoundingBoxInput> for NormalizedBox {
    fn from(input: BoundingBoxInput) -> Self {
        match input {
            BoundingBoxInput::Pascal {
                left,
                top,
                width,
                height,
            } => NormalizedBox::new(left, top, width, height),
            BoundingBoxInput::Xy {
                x,
                y,
                width,
                height,
            } => NormalizedBox::new(x, y, width, height),
        }
    }
}

/// Size of a page in output units (points for PDF, pixels for images).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageDimensions {
    pub width: f32,
    pub height: f32,
}

impl PageDimensions {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// An absolute rectangle with its origin at the page's bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PdfRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PdfRect {
    /// Distance from the page's top edge to the rectangle's top edge.
    pub fn top_from_page_top(&self, page: PageDimensions) -> f32 {
        page.height - self.y - self.height
    }

    /// Inverse of [`map`] for an unpadded rectangle.
    pub fn to_normalized(&self, page: PageDimensions) -> NormalizedBox {
        NormalizedBox {
            left: self.x / page.width,
            top: self.top_from_page_top(page) / page.height,
            width: self.width / page.width,
            height: self.height / page.height,
        }
    }
}

/// Maps a normalized top-left box onto a bottom-left absolute rectangle.
///
/// The bottom-left corner moves out by `padding` (never below zero) and both
/// extents grow by twice the padding.
pub fn map(bbox: &NormalizedBox, page: PageDimensions, padding: f32) -> PdfRect {
    let width = bbox.width * page.width;
    let height = bbox.height * page.height;
    let x = bbox.left * page.width;
    let y = page.height - bbox.top * page.height - height;

    PdfRect {
        x: (x - padding).max(0.0),
        y: (y - padding).max(0.0),
        width: width + 2.0 * padding,
        height: height + 2.0 * padding,
    }
}
