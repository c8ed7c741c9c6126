//! Splitting a source document into independently analyzable page images.
//!
//! PDF pages are rasterized with MuPDF at an oversampling scale so small
//! digits survive recognition. Raster inputs are already a single page.

use crate::error::{RedactorError, RedactorResult};
use crate::geometry::PageDimensions;
use image::{DynamicImage, ImageFormat, RgbImage};
use mupdf::{Colorspace, Document, Matrix};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Smallest oversampling factor accepted for rasterization.
pub const MIN_SCALE: f32 = 2.0;

/// Container format of an input (and therefore output) document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Raster(ImageFormat),
}

/// A document on disk together with its sniffed format.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub format: DocumentFormat,
}

impl SourceDocument {
    /// Opens `path` and detects its format from the leading bytes.
    pub fn open(path: &Path) -> RedactorResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| RedactorError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let format = Self::sniff(&bytes).ok_or_else(|| RedactorError::InvalidInput {
            parameter: "input".to_string(),
            reason: format!("'{}' is neither a PDF nor a supported image", path.display()),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            format,
        })
    }

    fn sniff(bytes: &[u8]) -> Option<DocumentFormat> {
        if bytes.starts_with(b"%PDF") {
            return Some(DocumentFormat::Pdf);
        }
        image::guess_format(bytes).ok().map(DocumentFormat::Raster)
    }

    pub fn is_pdf(&self) -> bool {
        self.format == DocumentFormat::Pdf
    }
}

/// One rendered page ready for analysis.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based position in the source document
    pub index: usize,
    /// PNG-encoded page raster
    pub png: Vec<u8>,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Page size in the source's own units (points for PDF)
    pub page_size: PageDimensions,
}

impl PageImage {
    /// A page with no pixel data, for analyzers that never look at pixels.
    pub fn blank(index: usize, width: u32, height: u32) -> Self {
        Self {
            index,
            png: Vec::new(),
            pixel_width: width,
            pixel_height: height,
            page_size: PageDimensions::new(width as f32, height as f32),
        }
    }

    /// 1-based page number.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Renders every page of a source document into a [`PageImage`].
#[derive(Debug, Clone)]
pub struct PageSplitter {
    scale: f32,
}

impl Default for PageSplitter {
    fn default() -> Self {
        Self { scale: MIN_SCALE }
    }
}

impl PageSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the oversampling factor; values below [`MIN_SCALE`] are rejected.
    pub fn with_scale(mut self, scale: f32) -> RedactorResult<Self> {
        if !scale.is_finite() || scale < MIN_SCALE {
            return Err(RedactorError::InvalidInput {
                parameter: "scale".to_string(),
                reason: format!("must be at least {}, got {}", MIN_SCALE, scale),
            });
        }
        self.scale = scale;
        Ok(self)
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Splits `source` into ordered page images.
    ///
    /// Any page that fails to render aborts the whole split.
    pub fn split(&self, source: &SourceDocument) -> RedactorResult<Vec<PageImage>> {
        let pages = match source.format {
            DocumentFormat::Pdf => self.split_pdf(&source.path)?,
            DocumentFormat::Raster(_) => vec![self.load_raster(&source.path)?],
        };
        info!(pages = pages.len(), path = %source.path.display(), "split document");
        Ok(pages)
    }

    fn split_pdf(&self, path: &Path) -> RedactorResult<Vec<PageImage>> {
        let path_str = path.to_str().ok_or_else(|| RedactorError::InvalidInput {
            parameter: "input".to_string(),
            reason: "Path contains invalid UTF-8".to_string(),
        })?;

        let doc = Document::open(path_str)
            .map_err(|e| RedactorError::mupdf("Failed to open document", e))?;
        let page_count = doc
            .page_count()
            .map_err(|e| RedactorError::mupdf("Failed to get page count", e))?;

        let matrix = Matrix::new_scale(self.scale, self.scale);
        let colorspace = Colorspace::device_rgb();
        let mut pages = Vec::with_capacity(page_count.max(0) as usize);

        for page_idx in 0..page_count {
            let index = page_idx as usize;
            let fail = |what: &str, e: mupdf::Error| RedactorError::PageSplit {
                page: index + 1,
                message: format!("{}: {}", what, e),
                source: Some(Box::new(e)),
            };

            let page = doc.load_page(page_idx).map_err(|e| fail("load failed", e))?;
            let bounds = page.bounds().map_err(|e| fail("no page bounds", e))?;
            let pixmap = page
                .to_pixmap(&matrix, &colorspace, false, false)
                .map_err(|e| fail("rasterization failed", e))?;

            let width = pixmap.width();
            let height = pixmap.height();
            let rgb = pixels_to_rgb(pixmap.samples(), width, height, pixmap.n() as usize)
                .ok_or_else(|| RedactorError::PageSplit {
                    page: index + 1,
                    message: "unexpected pixmap layout".to_string(),
                    source: None,
                })?;
            let png = encode_png(rgb).map_err(|e| RedactorError::PageSplit {
                page: index + 1,
                message: format!("PNG encoding failed: {}", e),
                source: Some(Box::new(e)),
            })?;

            debug!(page = index + 1, width, height, "rasterized page");
            pages.push(PageImage {
                index,
                png,
                pixel_width: width,
                pixel_height: height,
                page_size: PageDimensions::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0),
            });
        }

        Ok(pages)
    }

    fn load_raster(&self, path: &Path) -> RedactorResult<PageImage> {
        let img = image::open(path).map_err(|e| RedactorError::PageSplit {
            page: 1,
            message: format!("cannot decode image: {}", e),
            source: Some(Box::new(e)),
        })?;
        let (width, height) = (img.width(), img.height());
        let png = encode_png(img.to_rgb8()).map_err(|e| RedactorError::PageSplit {
            page: 1,
            message: format!("PNG encoding failed: {}", e),
            source: Some(Box::new(e)),
        })?;

        Ok(PageImage {
            index: 0,
            png,
            pixel_width: width,
            pixel_height: height,
            page_size: PageDimensions::new(width as f32, height as f32),
        })
    }
}

/// Repacks `n`-channel samples (rows possibly padded) into tight RGB.
fn pixels_to_rgb(samples: &[u8], width: u32, height: u32, n: usize) -> Option<RgbImage> {
    if n < 3 || height == 0 {
        return None;
    }
    let stride = samples.len() / height as usize;
    let row_len = width as usize * n;
    if stride < row_len {
        return None;
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for row in samples.chunks(stride).take(height as usize) {
        for px in row[..row_len].chunks(n) {
            rgb.extend_from_slice(&px[..3]);
        }
    }
    RgbImage::from_raw(width, height, rgb)
}

fn encode_png(img: RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
