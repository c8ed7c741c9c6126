//! Raster rendering with imageproc.
//!
//! Painting over pixels is destructive, so raster output is always secure.
//! Placeholder captions are drawn with the first system font found; without
//! one the label strip is painted blank.

use super::layout::{DrawOp, RedactionPlan, RenderOptions, RgbColor};
use super::strategy::{copy_unchanged, RedactionStrategy, RenderSummary};
use crate::domain::RedactionElement;
use crate::error::{RedactorError, RedactorResult};
use crate::geometry::{PageDimensions, PdfRect};
use crate::pages::{DocumentFormat, SourceDocument};
use ab_glyph::FontVec;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use once_cell::sync::Lazy;
use std::path::Path;
use tracing::debug;

const FONT_PATHS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static LABEL_FONT: Lazy<Option<FontVec>> = Lazy::new(|| {
    let font = FONT_PATHS.iter().find_map(|path| {
        let data = std::fs::read(path).ok()?;
        FontVec::try_from_vec(data).ok()
    });
    if font.is_none() {
        debug!("no label font found; placeholder captions will be blank");
    }
    font
});

/// Font used for placeholder captions, if one is installed.
pub fn label_font() -> Option<&'static FontVec> {
    LABEL_FONT.as_ref()
}

/// Paints redactions into a single-page image, keeping its format.
#[derive(Debug, Clone, Default)]
pub struct RasterRedactionStrategy {
    options: RenderOptions,
}

impl RasterRedactionStrategy {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl RedactionStrategy for RasterRedactionStrategy {
    fn redact(
        &self,
        input: &Path,
        output: &Path,
        elements: &[RedactionElement],
    ) -> RedactorResult<RenderSummary> {
        let format = match SourceDocument::open(input)?.format {
            DocumentFormat::Raster(format) => format,
            DocumentFormat::Pdf => {
                return Err(RedactorError::InvalidInput {
                    parameter: "input".to_string(),
                    reason: "raster strategy cannot render a PDF".to_string(),
                })
            }
        };

        let mut img = image::open(input)?.to_rgba8();
        let page = PageDimensions::new(img.width() as f32, img.height() as f32);
        let plan = RedactionPlan::build(elements, &[page], &self.options);

        if plan.is_empty() {
            copy_unchanged(input, output)?;
            return Ok(RenderSummary {
                skipped_elements: plan.skipped,
                ..RenderSummary::none(1)
            });
        }

        for page_plan in plan.pages.values() {
            for op in &page_plan.ops {
                match op {
                    DrawOp::Fill { rect, color, .. } => paint(&mut img, rect, page, *color),
                    DrawOp::Label {
                        rect,
                        fill,
                        text,
                        text_color,
                    } => {
                        paint(&mut img, rect, page, *fill);
                        if let Some(font) = label_font() {
                            write(&mut img, rect, page, text, *text_color, font);
                        }
                    }
                }
            }
        }
        debug!(fills = plan.fill_count(), "painted raster redactions");

        save(img, output, format)?;

        Ok(RenderSummary {
            rectangles_drawn: plan.fill_count(),
            placeholders: plan.placeholder_count(),
            skipped_elements: plan.skipped,
            pages_processed: 1,
            pages_modified: 1,
            secure: true,
        })
    }

    fn name(&self) -> &str {
        "RasterPaint"
    }

    fn is_secure(&self) -> bool {
        true
    }
}

/// Fills a bottom-left rectangle on a top-left pixel grid.
fn paint(img: &mut RgbaImage, rect: &PdfRect, page: PageDimensions, color: RgbColor) {
    let left = rect.x.floor().max(0.0);
    let top = rect.top_from_page_top(page).floor().max(0.0);
    let right = (rect.x + rect.width).ceil().min(page.width);
    let bottom = (page.height - rect.y).ceil().min(page.height);
    if right <= left || bottom <= top {
        return;
    }

    let area = Rect::at(left as i32, top as i32)
        .of_size((right - left) as u32, (bottom - top) as u32);
    draw_filled_rect_mut(img, area, Rgba(color.to_rgba8()));
}

/// Writes `text` inside a label strip, sized to the strip height.
fn write(
    img: &mut RgbaImage,
    rect: &PdfRect,
    page: PageDimensions,
    text: &str,
    color: RgbColor,
    font: &FontVec,
) {
    let size = (rect.height - 2.0).max(1.0);
    let x = (rect.x + 2.0).round() as i32;
    let y = (rect.top_from_page_top(page) + 1.0).round() as i32;
    draw_text_mut(img, Rgba(color.to_rgba8()), x, y, size, font, text);
}

fn save(img: RgbaImage, output: &Path, format: ImageFormat) -> RedactorResult<()> {
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgba8(img)
            .to_rgb8()
            .save_with_format(output, format)?,
        _ => img.save_with_format(output, format)?,
    }
    Ok(())
}
