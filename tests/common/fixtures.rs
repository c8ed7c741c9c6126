//! Test fixtures and document builders.
//!
//! Provides builders for PDFs and images with text at known positions, and
//! helpers for writing recorded analysis responses that describe them.

use anyhow::Result;
use image::{Rgb, RgbImage};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde_json::{json, Value};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;
pub const PT_PER_MM: f32 = 72.0 / 25.4;

/// A line of text placed at a baseline measured from the page's top-left.
#[derive(Debug, Clone)]
pub struct PlacedLine {
    pub text: String,
    pub x_mm: f32,
    pub top_mm: f32,
}

/// Builder for multi-page test PDFs with text at known positions.
///
/// # Example
///
/// ```no_run
/// # use anyhow::Result;
/// # fn main() -> Result<()> {
/// let pdf = CardPdfBuilder::new()
///     .line(0, "Card: 4111 1111 1111 1111", 20.0, 30.0)
///     .line(0, "Thank you for your order", 20.0, 100.0)
///     .build(std::path::Path::new("/tmp/card.pdf"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CardPdfBuilder {
    title: String,
    pages: Vec<Vec<PlacedLine>>,
    font_size: f32,
}

impl CardPdfBuilder {
    pub fn new() -> Self {
        Self {
            title: "Test Statement".to_string(),
            pages: vec![Vec::new()],
            font_size: 12.0,
        }
    }

    /// Ensures the document has at least `count` pages.
    pub fn pages(mut self, count: usize) -> Self {
        while self.pages.len() < count {
            self.pages.push(Vec::new());
        }
        self
    }

    /// Adds `text` on `page` with its baseline `top_mm` below the top edge.
    pub fn line(mut self, page: usize, text: &str, x_mm: f32, top_mm: f32) -> Self {
        self = self.pages(page + 1);
        self.pages[page].push(PlacedLine {
            text: text.to_string(),
            x_mm,
            top_mm,
        });
        self
    }

    pub fn build(self, output_path: &Path) -> Result<PathBuf> {
        let (doc, first_page, first_layer) =
            PdfDocument::new(&self.title, Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;

        for (i, lines) in self.pages.iter().enumerate() {
            let (page, layer) = if i == 0 {
                (first_page, first_layer)
            } else {
                doc.add_page(Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), format!("Layer {}", i + 1))
            };
            let layer = doc.get_page(page).get_layer(layer);
            for line in lines {
                layer.use_text(
                    &line.text,
                    self.font_size,
                    Mm(line.x_mm),
                    Mm(A4_HEIGHT_MM - line.top_mm),
                    &font,
                );
            }
        }

        doc.save(&mut BufWriter::new(fs::File::create(output_path)?))?;
        Ok(output_path.to_path_buf())
    }
}

impl Default for CardPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sets `key` to `value` on every page dictionary of the PDF at `path`.
pub fn set_page_entry(path: &Path, key: &str, value: lopdf::Object) -> Result<()> {
    let mut doc = lopdf::Document::load(path)?;
    for page_id in doc.get_pages().into_values() {
        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set(key, value.clone());
    }
    doc.save(path)?;
    Ok(())
}

/// A white PNG of the given size.
pub fn blank_png(path: &Path, width: u32, height: u32) -> Result<PathBuf> {
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255])).save(path)?;
    Ok(path.to_path_buf())
}

/// A Textract-style block with a `Left/Top/Width/Height` box.
pub fn block_json(id: &str, kind: &str, text: &str, bbox: Option<[f32; 4]>) -> Value {
    let mut block = json!({
        "Id": id,
        "BlockType": kind,
        "Text": text,
        "Confidence": 99.0,
        "Page": 1,
    });
    if let Some([left, top, width, height]) = bbox {
        block["Geometry"] = json!({
            "BoundingBox": {"Left": left, "Top": top, "Width": width, "Height": height}
        });
    }
    block
}

/// Writes `page-<n>.json` for a 0-based page index.
pub fn write_page_response(dir: &Path, page_index: usize, blocks: Vec<Value>) -> Result<PathBuf> {
    let path = dir.join(format!("page-{}.json", page_index + 1));
    fs::write(&path, serde_json::to_vec(&json!({ "Blocks": blocks }))?)?;
    Ok(path)
}

/// Normalized box covering a 12pt text line whose baseline sits `top_mm`
/// below the top of an A4 page.
pub fn a4_line_box(x_mm: f32, top_mm: f32, width_mm: f32) -> [f32; 4] {
    [
        x_mm / A4_WIDTH_MM,
        (top_mm - 6.0) / A4_HEIGHT_MM,
        width_mm / A4_WIDTH_MM,
        9.0 / A4_HEIGHT_MM,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builder_pads_pages() -> Result<()> {
        let dir = TempDir::new()?;
        let path = CardPdfBuilder::new()
            .line(2, "page three", 20.0, 30.0)
            .build(&dir.path().join("three.pdf"))?;
        let doc = lopdf::Document::load(&path)?;
        assert_eq!(doc.get_pages().len(), 3);
        Ok(())
    }
}
