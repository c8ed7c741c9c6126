//! Turning resolved elements into per-page drawing operations.
//!
//! The plan is backend-neutral: every rectangle is already in bottom-left
//! page units, so the PDF and raster backends only have to paint it.

use crate::domain::RedactionElement;
use crate::geometry::{map, NormalizedBox, PageDimensions, PdfRect, DEFAULT_PADDING};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Columns in the placeholder grid for unlocated elements.
pub const GRID_COLUMNS: usize = 3;
pub const MAX_CELL_WIDTH: f32 = 200.0;
pub const MAX_CELL_HEIGHT: f32 = 40.0;
pub const GRID_MARGIN: f32 = 20.0;
pub const GRID_GAP: f32 = 6.0;
pub const LABEL_HEIGHT: f32 = 12.0;
/// Characters of caption text shown under a placeholder cell.
pub const PREVIEW_CHARS: usize = 15;

/// An RGB color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RgbColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor::new(0.0, 0.0, 0.0);
    pub const WHITE: RgbColor = RgbColor::new(1.0, 1.0, 1.0);
    pub const LIGHT_GRAY: RgbColor = RgbColor::new(0.85, 0.85, 0.85);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// 8-bit RGBA, fully opaque.
    pub fn to_rgba8(self) -> [u8; 4] {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [c(self.r), c(self.g), c(self.b), 255]
    }
}

/// How redactions are painted.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub fill: RgbColor,
    pub label_fill: RgbColor,
    pub label_text: RgbColor,
    pub padding: f32,
    /// Physically remove content under located regions before painting (PDF only)
    pub secure_erase: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            fill: RgbColor::BLACK,
            label_fill: RgbColor::LIGHT_GRAY,
            label_text: RgbColor::BLACK,
            padding: DEFAULT_PADDING,
            secure_erase: true,
        }
    }
}

impl RenderOptions {
    pub fn with_fill(mut self, fill: RgbColor) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding.max(0.0);
        self
    }

    pub fn with_secure_erase(mut self, secure_erase: bool) -> Self {
        self.secure_erase = secure_erase;
        self
    }
}

/// Where a filled rectangle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// Real detected geometry
    Located,
    /// A grid cell standing in for an element without geometry
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill {
        rect: PdfRect,
        color: RgbColor,
        region: Region,
    },
    Label {
        rect: PdfRect,
        fill: RgbColor,
        text: String,
        text_color: RgbColor,
    },
}

/// One placeholder slot: the opaque cell and the label strip beneath it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
    pub cell: PdfRect,
    pub label: PdfRect,
}

/// Hands out placeholder cells left to right, top to bottom, for one page.
#[derive(Debug, Clone)]
pub struct PlaceholderGrid {
    page: PageDimensions,
    cell_width: f32,
    cell_height: f32,
    placed: usize,
}

impl PlaceholderGrid {
    pub fn new(page: PageDimensions) -> Self {
        let columns = GRID_COLUMNS as f32;
        let usable = page.width - 2.0 * GRID_MARGIN - (columns - 1.0) * GRID_GAP;
        Self {
            page,
            cell_width: (usable / columns).clamp(1.0, MAX_CELL_WIDTH),
            cell_height: (page.height / 8.0).clamp(1.0, MAX_CELL_HEIGHT),
            placed: 0,
        }
    }

    /// Number of cells handed out so far.
    pub fn placed(&self) -> usize {
        self.placed
    }

    pub fn next_cell(&mut self) -> GridCell {
        let row = self.placed / GRID_COLUMNS;
        let col = self.placed % GRID_COLUMNS;
        self.placed += 1;

        let pitch = self.cell_height + LABEL_HEIGHT + GRID_GAP;
        let x = GRID_MARGIN + col as f32 * (self.cell_width + GRID_GAP);
        let top = GRID_MARGIN + row as f32 * pitch;
        let y = self.page.height - top - self.cell_height;

        GridCell {
            row,
            col,
            cell: PdfRect {
                x,
                y,
                width: self.cell_width,
                height: self.cell_height,
            },
            label: PdfRect {
                x,
                y: y - LABEL_HEIGHT,
                width: self.cell_width,
                height: LABEL_HEIGHT,
            },
        }
    }
}

/// First [`PREVIEW_CHARS`] characters, with "..." appended when cut.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Caption for an element's placeholder: its visible tail, then its id.
///
/// The masked label alone would preview as `**** **** **** ...` for every
/// element, so the tail is moved to the front where truncation cannot reach
/// it. Text without trailing digits is previewed as is.
pub fn caption(element: &RedactionElement) -> String {
    let digits = element
        .text
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .count();
    if digits == 0 {
        return preview(&element.text);
    }
    let tail = &element.text[element.text.len() - digits..];
    preview(&format!("*{} {}", tail, element.id))
}

/// Operations for a single page.
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub page_index: usize,
    pub page: PageDimensions,
    pub ops: Vec<DrawOp>,
    pub placeholders: usize,
}

impl PagePlan {
    /// Rectangles covering real detected geometry.
    pub fn located_rects(&self) -> impl Iterator<Item = PdfRect> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Fill {
                rect,
                region: Region::Located,
                ..
            } => Some(*rect),
            _ => None,
        })
    }

    pub fn fill_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Fill { .. }))
            .count()
    }

    pub fn has_labels(&self) -> bool {
        self.ops.iter().any(|op| matches!(op, DrawOp::Label { .. }))
    }
}

/// Everything to draw on a document, keyed by 0-based page index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedactionPlan {
    pub pages: BTreeMap<usize, PagePlan>,
    /// Elements whose page does not exist in the output document
    pub skipped: usize,
}

impl RedactionPlan {
    /// Builds the plan for `elements` on a document whose pages measure `pages`.
    pub fn build(
        elements: &[RedactionElement],
        pages: &[PageDimensions],
        options: &RenderOptions,
    ) -> Self {
        let mut plan = RedactionPlan::default();
        let mut grids: BTreeMap<usize, PlaceholderGrid> = BTreeMap::new();

        for element in elements {
            let Some(&dims) = pages.get(element.page_index) else {
                warn!(
                    element = %element.id,
                    page_index = element.page_index,
                    pages = pages.len(),
                    "element references a missing page; skipped"
                );
                plan.skipped += 1;
                continue;
            };

            let page_plan = plan
                .pages
                .entry(element.page_index)
                .or_insert_with(|| PagePlan {
                    page_index: element.page_index,
                    page: dims,
                    ops: Vec::new(),
                    placeholders: 0,
                });

            let fill = |bbox: &NormalizedBox| DrawOp::Fill {
                rect: map(bbox, dims, options.padding),
                color: options.fill,
                region: Region::Located,
            };

            if !element.word_level_blocks.is_empty() {
                page_plan
                    .ops
                    .extend(element.word_level_blocks.iter().map(|w| fill(&w.bounding_box)));
            } else if let Some(bbox) = element.usable_box() {
                page_plan.ops.push(fill(bbox));
            } else {
                let grid = grids
                    .entry(element.page_index)
                    .or_insert_with(|| PlaceholderGrid::new(dims));
                let slot = grid.next_cell();
                page_plan.placeholders += 1;
                page_plan.ops.push(DrawOp::Fill {
                    rect: slot.cell,
                    color: options.fill,
                    region: Region::Placeholder,
                });
                page_plan.ops.push(DrawOp::Label {
                    rect: slot.label,
                    fill: options.label_fill,
                    text: caption(element),
                    text_color: options.label_text,
                });
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.pages.values().all(|p| p.ops.is_empty())
    }

    pub fn fill_count(&self) -> usize {
        self.pages.values().map(PagePlan::fill_count).sum()
    }

    pub fn placeholder_count(&self) -> usize {
        self.pages.values().map(|p| p.placeholders).sum()
    }
}
