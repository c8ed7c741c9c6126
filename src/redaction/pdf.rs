//! PDF rendering with lopdf.
//!
//! Existing page content is wrapped in `q ... Q` so whatever graphics state
//! it leaves behind cannot leak into the overlay, then opaque rectangles and
//! placeholder labels are appended in user space.
//!
//! Plans are laid out on the page as it is displayed: the CropBox (clipped
//! to the MediaBox) turned by `/Rotate`. That is the frame the rasterizer
//! hands to the analyzer, so every rectangle is mapped back through the
//! inverse rotation before it is written.

use super::layout::{DrawOp, PagePlan, RedactionPlan, RenderOptions, RgbColor};
use super::secure;
use super::strategy::{copy_unchanged, RedactionStrategy, RenderSummary};
use crate::domain::RedactionElement;
use crate::error::{RedactorError, RedactorResult};
use crate::geometry::{PageDimensions, PdfRect};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;
use tracing::{debug, info, warn};

/// Resource name of the label font added to pages that carry labels.
const LABEL_FONT: &str = "PanRedactorLabel";
const LABEL_FONT_SIZE: f32 = 8.0;
/// US Letter, used when a page has no readable MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// The visible region of a page and how it is turned for display.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageGeometry {
    /// `[x0, y0, x1, y1]` in user space, normalized so `x0 < x1`, `y0 < y1`
    visible: [f32; 4],
    /// Clockwise quarter turns: 0, 90, 180 or 270
    rotation: u16,
}

impl PageGeometry {
    fn unrotated_size(&self) -> (f32, f32) {
        let [x0, y0, x1, y1] = self.visible;
        (x1 - x0, y1 - y0)
    }

    /// Size of the page as displayed and rasterized.
    fn displayed(&self) -> PageDimensions {
        let (w, h) = self.unrotated_size();
        match self.rotation {
            90 | 270 => PageDimensions::new(h, w),
            _ => PageDimensions::new(w, h),
        }
    }

    /// Maps a displayed-page point (origin bottom-left) into user space.
    fn to_user(&self, x: f32, y: f32) -> (f32, f32) {
        let (w, h) = self.unrotated_size();
        let (u, v) = match self.rotation {
            90 => (w - y, x),
            180 => (w - x, h - y),
            270 => (y, h - x),
            _ => (x, y),
        };
        (self.visible[0] + u, self.visible[1] + v)
    }

    fn user_rect(&self, rect: &PdfRect) -> PdfRect {
        let (ax, ay) = self.to_user(rect.x, rect.y);
        let (bx, by) = self.to_user(rect.x + rect.width, rect.y + rect.height);
        PdfRect {
            x: ax.min(bx),
            y: ay.min(by),
            width: (ax - bx).abs(),
            height: (ay - by).abs(),
        }
    }

    /// Text-space axes that keep label text upright on the displayed page.
    fn text_axes(&self) -> [f32; 4] {
        match self.rotation {
            90 => [0.0, 1.0, -1.0, 0.0],
            180 => [-1.0, 0.0, 0.0, -1.0],
            270 => [0.0, -1.0, 1.0, 0.0],
            _ => [1.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Paints redactions into PDFs, optionally erasing located content first.
#[derive(Debug, Clone, Default)]
pub struct PdfRedactionStrategy {
    options: RenderOptions,
}

impl PdfRedactionStrategy {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }
}

impl RedactionStrategy for PdfRedactionStrategy {
    fn redact(
        &self,
        input: &Path,
        output: &Path,
        elements: &[RedactionElement],
    ) -> RedactorResult<RenderSummary> {
        let doc = load(input)?;
        let geometry = page_geometry_all(&doc);
        let dims: Vec<PageDimensions> = geometry.iter().map(PageGeometry::displayed).collect();
        let plan = RedactionPlan::build(elements, &dims, &self.options);

        if plan.is_empty() {
            copy_unchanged(input, output)?;
            return Ok(RenderSummary {
                skipped_elements: plan.skipped,
                ..RenderSummary::none(dims.len())
            });
        }

        let has_located = plan
            .pages
            .values()
            .any(|p| p.located_rects().next().is_some());
        let secure = self.options.secure_erase && has_located;

        let mut doc = if secure {
            let erased = secure::erase_regions(input, output, &plan)?;
            info!(regions = erased, "removed content under located regions");
            load(output)?
        } else {
            doc
        };

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let geometry = page_geometry_all(&doc);
        let font_id = plan
            .pages
            .values()
            .any(PagePlan::has_labels)
            .then(|| doc.add_object(label_font()));

        for (index, page_plan) in &plan.pages {
            let (Some(&page_id), Some(&page)) = (page_ids.get(*index), geometry.get(*index)) else {
                return Err(RedactorError::PdfProcessing {
                    message: "page disappeared while rendering".to_string(),
                    page: Some(index + 1),
                    source: None,
                });
            };
            draw_page(&mut doc, page_id, page, page_plan, font_id)?;
            debug!(page = index + 1, ops = page_plan.ops.len(), "drew overlay");
        }

        doc.prune_objects();
        doc.compress();
        doc.save(output).map_err(|e| RedactorError::PdfProcessing {
            message: format!("Failed to save '{}'", output.display()),
            page: None,
            source: Some(Box::new(e)),
        })?;

        if plan.skipped > 0 {
            warn!(skipped = plan.skipped, "elements referenced missing pages");
        }

        Ok(RenderSummary {
            rectangles_drawn: plan.fill_count(),
            placeholders: plan.placeholder_count(),
            skipped_elements: plan.skipped,
            pages_processed: dims.len(),
            pages_modified: plan.pages.values().filter(|p| !p.ops.is_empty()).count(),
            secure,
        })
    }

    fn name(&self) -> &str {
        "PdfOverlay"
    }

    fn is_secure(&self) -> bool {
        self.options.secure_erase
    }
}

fn load(path: &Path) -> RedactorResult<Document> {
    Document::load(path)
        .map_err(|e| RedactorError::lopdf(format!("Failed to load '{}'", path.display()), e))
}

fn label_font() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Replaces the page content with `q <old> Q <overlay>`.
fn draw_page(
    doc: &mut Document,
    page_id: ObjectId,
    geometry: PageGeometry,
    plan: &PagePlan,
    font_id: Option<ObjectId>,
) -> RedactorResult<()> {
    let page_number = plan.page_index + 1;
    let overlay = Content {
        operations: overlay_operations(plan, geometry),
    }
    .encode()
    .map_err(|e| RedactorError::lopdf(format!("Failed to encode overlay for page {}", page_number), e))?;

    let existing = doc
        .get_page_content(page_id)
        .map_err(|e| RedactorError::lopdf(format!("Failed to read page {}", page_number), e))?;

    let mut merged = Vec::with_capacity(existing.len() + overlay.len() + 8);
    merged.extend_from_slice(b"q\n");
    merged.extend_from_slice(&existing);
    merged.extend_from_slice(b"\nQ\n");
    merged.extend_from_slice(&overlay);

    let mut stream = Stream::new(Dictionary::new(), merged);
    stream.compress().ok();
    let stream_id = doc.add_object(stream);

    if let (Some(font_id), true) = (font_id, plan.has_labels()) {
        install_font(doc, page_id, font_id)?;
    }

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| RedactorError::lopdf(format!("Page {} is not a dictionary", page_number), e))?;
    page.set("Contents", Object::Reference(stream_id));
    Ok(())
}

fn overlay_operations(plan: &PagePlan, geometry: PageGeometry) -> Vec<Operation> {
    let mut ops = Vec::new();
    for op in &plan.ops {
        match op {
            DrawOp::Fill { rect, color, .. } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(fill_color(*color));
                ops.push(rectangle(&geometry.user_rect(rect)));
                ops.push(Operation::new("f", vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
            DrawOp::Label {
                rect,
                fill,
                text,
                text_color,
            } => {
                let size = LABEL_FONT_SIZE.min(rect.height - 2.0).max(1.0);
                let (tx, ty) = geometry.to_user(rect.x + 2.0, rect.y + (rect.height - size) / 2.0);
                let [a, b, c, d] = geometry.text_axes();
                ops.push(Operation::new("q", vec![]));
                ops.push(fill_color(*fill));
                ops.push(rectangle(&geometry.user_rect(rect)));
                ops.push(Operation::new("f", vec![]));
                ops.push(Operation::new("BT", vec![]));
                ops.push(fill_color(*text_color));
                ops.push(Operation::new(
                    "Tf",
                    vec![Object::Name(LABEL_FONT.as_bytes().to_vec()), real(size)],
                ));
                ops.push(Operation::new(
                    "Tm",
                    vec![real(a), real(b), real(c), real(d), real(tx), real(ty)],
                ));
                ops.push(Operation::new("Tj", vec![Object::string_literal(text.as_str())]));
                ops.push(Operation::new("ET", vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
        }
    }
    ops
}

fn fill_color(color: RgbColor) -> Operation {
    Operation::new("rg", vec![real(color.r), real(color.g), real(color.b)])
}

fn rectangle(rect: &PdfRect) -> Operation {
    Operation::new(
        "re",
        vec![real(rect.x), real(rect.y), real(rect.width), real(rect.height)],
    )
}

fn real(value: f32) -> Object {
    Object::Real(value as _)
}

/// Copies the page's (possibly inherited) resources inline and adds the label font.
fn install_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> RedactorResult<()> {
    let (mut resources, mut fonts) = page_resources(doc, page_id);
    fonts.set(LABEL_FONT, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| RedactorError::lopdf("Page is not a dictionary", e))?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Owned copies of the page's resource dictionary and its font subdictionary.
fn page_resources(doc: &Document, page_id: ObjectId) -> (Dictionary, Dictionary) {
    let resources = inherited(doc, page_id, b"Resources")
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    let fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    (resources, fonts)
}

fn page_geometry_all(doc: &Document) -> Vec<PageGeometry> {
    doc.get_pages()
        .into_values()
        .map(|page_id| page_geometry(doc, page_id))
        .collect()
}

fn page_geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    let media_box = page_box(doc, page_id, b"MediaBox").unwrap_or_else(|| {
        warn!(?page_id, "no usable MediaBox; assuming US Letter");
        DEFAULT_MEDIA_BOX
    });
    let visible = page_box(doc, page_id, b"CropBox")
        .and_then(|crop| intersect(crop, media_box))
        .unwrap_or(media_box);

    PageGeometry {
        visible,
        rotation: rotation(doc, page_id),
    }
}

/// Reads a rectangle entry, normalized so the first corner is the lower-left.
fn page_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
    let arr = inherited(doc, page_id, key)
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())?;
    let values: Vec<f32> = arr
        .iter()
        .filter_map(|o| resolve(doc, o).and_then(number))
        .collect();
    let [x0, y0, x1, y1] = <[f32; 4]>::try_from(values).ok()?;
    Some([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)])
}

fn intersect(a: [f32; 4], b: [f32; 4]) -> Option<[f32; 4]> {
    let clipped = [a[0].max(b[0]), a[1].max(b[1]), a[2].min(b[2]), a[3].min(b[3])];
    (clipped[2] > clipped[0] && clipped[3] > clipped[1]).then_some(clipped)
}

fn rotation(doc: &Document, page_id: ObjectId) -> u16 {
    let raw = inherited(doc, page_id, b"Rotate")
        .and_then(|obj| resolve(doc, obj))
        .and_then(number)
        .unwrap_or(0.0) as i64;
    match raw.rem_euclid(360) {
        turn @ (0 | 90 | 180 | 270) => turn as u16,
        other => {
            warn!(?page_id, rotate = other, "/Rotate is not a quarter turn; ignoring it");
            0
        }
    }
}

/// Looks `key` up on the page, then on each ancestor page-tree node.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // Page trees are shallow; the bound only guards against Parent cycles.
    for _ in 0..64 {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redaction::layout::Region;

    fn letter() -> Vec<Object> {
        vec![0.into(), 0.into(), 612.into(), 792.into()]
    }

    fn one_page_doc(media_box: Vec<Object>) -> (Document, ObjectId) {
        one_page_doc_with(media_box, Dictionary::new())
    }

    /// A single-page document; `page_entries` are merged into the page dictionary.
    fn one_page_doc_with(media_box: Vec<Object>, page_entries: Dictionary) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        page.extend(&page_entries);
        let page_id = doc.add_object(page);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => media_box,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        (doc, page_id)
    }

    fn rect(x: f32, y: f32, width: f32, height: f32) -> PdfRect {
        PdfRect {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn test_inherited_media_box_with_offset() {
        let (doc, page_id) = one_page_doc(vec![10.into(), 20.into(), 622.into(), 812.into()]);
        let geometry = page_geometry(&doc, page_id);
        assert_eq!(geometry.visible, [10.0, 20.0, 622.0, 812.0]);
        assert_eq!(geometry.rotation, 0);
        assert_eq!(geometry.displayed(), PageDimensions::new(612.0, 792.0));
        assert_eq!(geometry.user_rect(&rect(5.0, 6.0, 7.0, 8.0)), rect(15.0, 26.0, 7.0, 8.0));
    }

    #[test]
    fn test_crop_box_is_clipped_to_media_box() {
        let (doc, page_id) = one_page_doc_with(
            letter(),
            dictionary! { "CropBox" => vec![50.into(), 50.into(), 700.into(), 742.into()] },
        );
        let geometry = page_geometry(&doc, page_id);
        assert_eq!(geometry.visible, [50.0, 50.0, 612.0, 742.0]);
        assert_eq!(geometry.displayed(), PageDimensions::new(562.0, 692.0));
        assert_eq!(geometry.to_user(0.0, 0.0), (50.0, 50.0));
    }

    #[test]
    fn test_disjoint_crop_box_falls_back_to_media_box() {
        let (doc, page_id) = one_page_doc_with(
            letter(),
            dictionary! { "CropBox" => vec![700.into(), 800.into(), 900.into(), 1000.into()] },
        );
        assert_eq!(page_geometry(&doc, page_id).visible, [0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn test_rotated_page_maps_displayed_corners() {
        let (doc, page_id) = one_page_doc_with(letter(), dictionary! { "Rotate" => 90 });
        let geometry = page_geometry(&doc, page_id);
        assert_eq!(geometry.rotation, 90);
        assert_eq!(geometry.displayed(), PageDimensions::new(792.0, 612.0));

        // Turned clockwise: the displayed top-left is the user-space origin,
        // the displayed bottom-left is the user-space bottom-right.
        assert_eq!(geometry.to_user(0.0, 612.0), (0.0, 0.0));
        assert_eq!(geometry.to_user(0.0, 0.0), (612.0, 0.0));
        assert_eq!(geometry.to_user(792.0, 0.0), (612.0, 792.0));

        // A strip along the displayed top edge runs up the user-space left edge.
        let strip = geometry.user_rect(&rect(100.0, 600.0, 200.0, 12.0));
        assert_eq!(strip, rect(0.0, 100.0, 12.0, 200.0));
    }

    #[test]
    fn test_rotation_is_inherited_and_normalized() {
        for (rotate, expected) in [(-90, 270), (450, 90), (180, 180), (45, 0)] {
            let (doc, page_id) = one_page_doc_with(letter(), dictionary! { "Rotate" => rotate });
            assert_eq!(page_geometry(&doc, page_id).rotation, expected, "/Rotate {}", rotate);
        }
        for rotation in [0, 90, 180, 270] {
            let geometry = PageGeometry {
                visible: [0.0, 0.0, 612.0, 792.0],
                rotation,
            };
            let dims = geometry.displayed();
            let mapped = geometry.user_rect(&rect(0.0, 0.0, dims.width, dims.height));
            assert_eq!(mapped, rect(0.0, 0.0, 612.0, 792.0), "rotation {}", rotation);
        }
    }

    #[test]
    fn test_rotated_label_text_stays_upright() {
        let (mut doc, page_id) = one_page_doc_with(letter(), dictionary! { "Rotate" => 90 });
        let geometry = page_geometry(&doc, page_id);
        let plan = PagePlan {
            page_index: 0,
            page: geometry.displayed(),
            ops: vec![DrawOp::Label {
                rect: rect(20.0, 500.0, 180.0, 12.0),
                fill: RgbColor::LIGHT_GRAY,
                text: "*1111 p1-m0".to_string(),
                text_color: RgbColor::BLACK,
            }],
            placeholders: 1,
        };
        let font_id = doc.add_object(label_font());

        draw_page(&mut doc, page_id, geometry, &plan, Some(font_id)).unwrap();

        let decoded = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let tm = decoded
            .operations
            .iter()
            .find(|op| op.operator == "Tm")
            .unwrap();
        let axes: Vec<f32> = tm.operands[..4].iter().map(|o| o.as_float().unwrap()).collect();
        assert_eq!(axes, vec![0.0, 1.0, -1.0, 0.0]);
    }

    #[test]
    fn test_draw_page_wraps_existing_content() {
        let (mut doc, page_id) = one_page_doc(letter());
        let geometry = page_geometry(&doc, page_id);
        let plan = PagePlan {
            page_index: 0,
            page: geometry.displayed(),
            ops: vec![DrawOp::Fill {
                rect: PdfRect {
                    x: 10.0,
                    y: 20.0,
                    width: 30.0,
                    height: 40.0,
                },
                color: RgbColor::BLACK,
                region: Region::Located,
            }],
            placeholders: 0,
        };

        draw_page(&mut doc, page_id, geometry, &plan, None).unwrap();

        let content = doc.get_page_content(page_id).unwrap();
        assert!(content.starts_with(b"q\nBT ET\nQ\n"));
        let decoded = Content::decode(&content).unwrap();
        let fills = decoded
            .operations
            .iter()
            .filter(|op| op.operator == "re")
            .count();
        assert_eq!(fills, 1);
    }

    #[test]
    fn test_labels_install_font() {
        let (mut doc, page_id) = one_page_doc(letter());
        let geometry = page_geometry(&doc, page_id);
        let plan = PagePlan {
            page_index: 0,
            page: geometry.displayed(),
            ops: vec![DrawOp::Label {
                rect: PdfRect {
                    x: 20.0,
                    y: 700.0,
                    width: 180.0,
                    height: 12.0,
                },
                fill: RgbColor::LIGHT_GRAY,
                text: "*1111 p1-m0".to_string(),
                text_color: RgbColor::BLACK,
            }],
            placeholders: 1,
        };
        let font_id = doc.add_object(label_font());

        draw_page(&mut doc, page_id, geometry, &plan, Some(font_id)).unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        let fonts = page
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|r| r.get(b"Font"))
            .and_then(Object::as_dict)
            .unwrap();
        assert!(fonts.get(LABEL_FONT.as_bytes()).is_ok());
    }
}
