//! Physical content removal using MuPDF.
//!
//! Each located rectangle becomes a PDF redaction annotation which is then
//! applied with `pdf_redact_page`, deleting the text and image data under
//! it. Placeholder cells have no content beneath them and are left alone.
//!
//! Plan rectangles live on the displayed page (cropped and rotated), which
//! is also the space MuPDF uses for annotation rectangles, so only the
//! vertical flip and any size difference have to be undone.

use super::layout::RedactionPlan;
use crate::error::{RedactorError, RedactorResult};
use crate::geometry::{PageDimensions, PdfRect};
use mupdf::pdf::{PdfAnnotationType, PdfDocument, PdfPage};
use mupdf::Rect as MuRect;
use std::path::Path;
use tracing::debug;

/// Removes content under every located rectangle in `plan`.
///
/// Writes the erased document to `output` and returns the number of
/// regions removed. `input` is not touched.
pub fn erase_regions(input: &Path, output: &Path, plan: &RedactionPlan) -> RedactorResult<usize> {
    let input_str = utf8(input, "input")?;
    let output_str = utf8(output, "output")?;

    let pdf_doc = PdfDocument::open(input_str).map_err(|e| RedactorError::PdfProcessing {
        message: "Failed to open PDF with MuPDF".to_string(),
        page: None,
        source: Some(Box::new(e)),
    })?;

    let mut erased = 0;
    for (page_index, page_plan) in &plan.pages {
        let rects: Vec<PdfRect> = page_plan.located_rects().collect();
        if rects.is_empty() {
            continue;
        }
        let number = page_index + 1;

        let page = pdf_doc
            .load_page(*page_index as i32)
            .map_err(|e| RedactorError::PdfProcessing {
                message: format!("Failed to load page {}", number),
                page: Some(number),
                source: Some(Box::new(e)),
            })?;
        let bounds = page.bounds().map_err(|e| RedactorError::BackendError {
            backend: "MuPDF".to_string(),
            message: format!("Failed to get bounds for page {}", number),
            source: Some(Box::new(e)),
        })?;

        let mut pdf_page = match PdfPage::try_from(page.clone()) {
            Ok(p) => p,
            Err(_) => continue,
        };

        for rect in &rects {
            let annot = pdf_page
                .create_annotation(PdfAnnotationType::Redact)
                .map_err(|e| RedactorError::PdfProcessing {
                    message: "Failed to create redaction annotation".to_string(),
                    page: Some(number),
                    source: Some(Box::new(e)),
                })?;

            unsafe {
                ffi::set_annotation_rect(&annot, to_device(rect, page_plan.page, &bounds));
            }
        }

        pdf_page
            .redact()
            .map_err(|e| RedactorError::PdfProcessing {
                message: format!("Failed to apply redactions on page {}", number),
                page: Some(number),
                source: Some(Box::new(e)),
            })?;

        debug!(page = number, regions = rects.len(), "erased content");
        erased += rects.len();
    }

    pdf_doc
        .save(output_str)
        .map_err(|e| RedactorError::PdfProcessing {
            message: "Failed to save redacted PDF".to_string(),
            page: None,
            source: Some(Box::new(e)),
        })?;

    Ok(erased)
}

/// Converts a bottom-left rectangle on the displayed page into MuPDF's
/// top-left page space, rescaling if MuPDF measures the page differently.
fn to_device(rect: &PdfRect, page: PageDimensions, bounds: &MuRect) -> MuRect {
    let scale = |extent: f32, size: f32| if size > 0.0 { extent / size } else { 1.0 };
    let sx = scale(bounds.x1 - bounds.x0, page.width);
    let sy = scale(bounds.y1 - bounds.y0, page.height);
    MuRect {
        x0: bounds.x0 + rect.x * sx,
        y0: bounds.y0 + (page.height - rect.y - rect.height) * sy,
        x1: bounds.x0 + (rect.x + rect.width) * sx,
        y1: bounds.y0 + (page.height - rect.y) * sy,
    }
}

fn utf8<'a>(path: &'a Path, parameter: &str) -> RedactorResult<&'a str> {
    path.to_str().ok_or_else(|| RedactorError::InvalidInput {
        parameter: parameter.to_string(),
        reason: "Path contains invalid UTF-8".to_string(),
    })
}

/// FFI helpers for MuPDF annotation operations.
mod ffi {
    use mupdf::pdf::PdfAnnotation;
    use mupdf::Rect;

    /// Sets the rectangle for a PDF annotation via FFI.
    ///
    /// # Safety
    /// The annotation must be valid. `PdfAnnotation` is a single pointer to
    /// the underlying `pdf_annot`.
    pub unsafe fn set_annotation_rect(annot: &PdfAnnotation, rect: Rect) {
        #[repr(C)]
        struct PdfAnnotRaw {
            inner: *mut mupdf_sys::pdf_annot,
        }

        let annot_raw = std::mem::transmute::<&PdfAnnotation, &PdfAnnotRaw>(annot);
        let ctx = mupdf_sys::mupdf_new_base_context();

        if !ctx.is_null() {
            let fz_rect = mupdf_sys::fz_rect {
                x0: rect.x0,
                y0: rect.y0,
                x1: rect.x1,
                y1: rect.y1,
            };

            mupdf_sys::pdf_set_annot_rect(ctx, annot_raw.inner, fz_rect);
            mupdf_sys::mupdf_drop_base_context(ctx);
        }
    }
}
