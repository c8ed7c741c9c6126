//! Custom assertions for redaction testing.
//!
//! Provides domain-specific assertions that make tests more readable
//! and provide better error messages.

use anyhow::Result;
use lopdf::content::Content;
use lopdf::Document;
use std::path::Path;

/// Extracts text from a PDF, returning an error instead of panicking.
pub fn extract_text(pdf_path: &Path) -> Result<String> {
    let bytes = std::fs::read(pdf_path)?;
    pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| anyhow::anyhow!("Failed to extract text: {}", e))
}

/// Asserts that `pattern` no longer appears in the PDF's extractable text.
///
/// # Panics
/// Panics if the pattern is still found in the PDF text.
pub fn assert_redacted(pdf_path: &Path, pattern: &str) {
    let text = extract_text_or_panic(pdf_path);
    assert!(
        !text.contains(pattern),
        "Pattern '{}' should be redacted but was found in output PDF at '{}'.\nExtracted text length: {} chars",
        pattern,
        pdf_path.display(),
        text.len()
    );
}

/// Asserts that `pattern` is still present in the PDF's extractable text.
///
/// # Panics
/// Panics if the pattern is not found in the PDF.
pub fn assert_preserved(pdf_path: &Path, pattern: &str) {
    let text = extract_text_or_panic(pdf_path);
    assert!(
        text.contains(pattern),
        "Pattern '{}' should be preserved but was not found in PDF at '{}'",
        pattern,
        pdf_path.display()
    );
}

/// Asserts that a PDF exists and loads.
pub fn assert_valid_pdf(pdf_path: &Path) {
    assert!(
        pdf_path.exists(),
        "PDF should exist at '{}'",
        pdf_path.display()
    );
    assert!(
        Document::load(pdf_path).is_ok(),
        "PDF at '{}' should load",
        pdf_path.display()
    );
}

/// Rectangles (`re` operators) in each page's content stream, in page order.
pub fn rect_ops_per_page(pdf_path: &Path) -> Result<Vec<Vec<[f32; 4]>>> {
    let doc = Document::load(pdf_path)?;
    let mut pages = Vec::new();
    for page_id in doc.get_pages().into_values() {
        let content = Content::decode(&doc.get_page_content(page_id)?)?;
        let rects = content
            .operations
            .iter()
            .filter(|op| op.operator == "re")
            .map(|op| {
                let mut v = [0.0f32; 4];
                for (slot, operand) in v.iter_mut().zip(&op.operands) {
                    *slot = operand.as_float().unwrap_or_default();
                }
                v
            })
            .collect();
        pages.push(rects);
    }
    Ok(pages)
}

fn extract_text_or_panic(pdf_path: &Path) -> String {
    extract_text(pdf_path).unwrap_or_else(|e| {
        panic!(
            "Failed to extract text from PDF '{}': {}",
            pdf_path.display(),
            e
        )
    })
}
