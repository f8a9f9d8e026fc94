//! PDF exporter: one A4 portrait page per slide image.
//!
//! Each image is scaled uniformly to fit inside the page and anchored at the
//! top-left corner. Layout is computed in millimetres; only the final PDF
//! operators are emitted in points. The stored slides are already JPEG, so
//! they are embedded as-is with `DCTDecode` and never re-encoded. Only the
//! image header is read to get the pixel size.

use crate::error::PipelineError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A4 width in millimetres.
pub const PAGE_WIDTH_MM: f32 = 210.0;
/// A4 height in millimetres.
pub const PAGE_HEIGHT_MM: f32 = 297.0;

const PT_PER_MM: f32 = 72.0 / 25.4;
const FORMAT: &str = "PDF";

/// Where one image sits on its page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    /// Uniform scale from pixels to millimetres.
    pub scale: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

/// Fit a `width`×`height` px image inside the A4 page.
pub fn fit_to_page(width: u32, height: u32) -> PageLayout {
    let (w, h) = (width as f32, height as f32);
    let scale = (PAGE_WIDTH_MM / w).min(PAGE_HEIGHT_MM / h);
    PageLayout {
        scale,
        width_mm: w * scale,
        height_mm: h * scale,
    }
}

/// Write a PDF with one page per image in `images` order to `output`.
pub fn build_pdf<P: AsRef<Path>>(images: &[P], output: &Path) -> Result<PathBuf, PipelineError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(images.len());

    for (i, image_path) in images.iter().enumerate() {
        let image_path = image_path.as_ref();
        let page_id = add_image_page(&mut doc, pages_id, image_path)
            .map_err(|detail| PipelineError::export(FORMAT, format!("page {}: {detail}", i + 1)))?;
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(output)
        .map_err(|e| PipelineError::export(FORMAT, format!("write {}: {e}", output.display())))?;

    info!("Wrote {} page PDF → {}", page_count, output.display());
    Ok(output.to_path_buf())
}

fn add_image_page(doc: &mut Document, pages_id: ObjectId, path: &Path) -> Result<ObjectId, String> {
    let (px_w, px_h) =
        image::image_dimensions(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let jpeg = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let layout = fit_to_page(px_w, px_h);
    debug!(
        "{} {}x{} px → {:.1}x{:.1} mm (scale {:.4})",
        path.display(),
        px_w,
        px_h,
        layout.width_mm,
        layout.height_mm,
        layout.scale
    );

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => px_w as i64,
            "Height" => px_h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let page_w = PAGE_WIDTH_MM * PT_PER_MM;
    let page_h = PAGE_HEIGHT_MM * PT_PER_MM;
    let draw_w = layout.width_mm * PT_PER_MM;
    let draw_h = layout.height_mm * PT_PER_MM;
    // PDF origin is bottom-left; pin the image to the top edge.
    let y = page_h - draw_h;

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    draw_w.into(),
                    0.into(),
                    0.into(),
                    draw_h.into(),
                    0.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content.encode().map_err(|e| e.to_string())?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use tempfile::TempDir;

    fn jpeg(dir: &TempDir, name: &str, w: u32, h: u32) -> PathBuf {
        let p = dir.path().join(name);
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([1, 2, 3])))
            .save_with_format(&p, ImageFormat::Jpeg)
            .unwrap();
        p
    }

    /// Scale factors read back from each page's `cm` operator, in page order.
    fn page_scales(path: &Path) -> Vec<(f32, f32)> {
        let doc = Document::load(path).unwrap();
        doc.get_pages()
            .values()
            .map(|&page_id| {
                let raw = doc.get_page_content(page_id).unwrap();
                let content = Content::decode(&raw).unwrap();
                let cm = content
                    .operations
                    .iter()
                    .find(|op| op.operator == "cm")
                    .unwrap();
                (
                    cm.operands[0].as_float().unwrap(),
                    cm.operands[3].as_float().unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn wide_slide_is_width_bound() {
        let l = fit_to_page(2048, 1152);
        assert!((l.width_mm - PAGE_WIDTH_MM).abs() < 1e-3);
        assert!(l.height_mm < PAGE_HEIGHT_MM);
        assert!((l.scale - PAGE_WIDTH_MM / 2048.0).abs() < 1e-6);
    }

    #[test]
    fn tall_image_is_height_bound() {
        let l = fit_to_page(100, 1000);
        assert!((l.height_mm - PAGE_HEIGHT_MM).abs() < 1e-3);
        assert!(l.width_mm < PAGE_WIDTH_MM);
    }

    #[test]
    fn one_page_per_image_in_order() {
        let dir = TempDir::new().unwrap();
        let imgs = vec![
            jpeg(&dir, "a.jpg", 200, 100),
            jpeg(&dir, "b.jpg", 100, 400),
            jpeg(&dir, "c.jpg", 300, 300),
        ];
        let out = dir.path().join("out.pdf");
        build_pdf(&imgs, &out).unwrap();

        let scales = page_scales(&out);
        assert_eq!(scales.len(), 3);
        let expected = [fit_to_page(200, 100), fit_to_page(100, 400), fit_to_page(300, 300)];
        for ((w, h), l) in scales.iter().zip(expected.iter()) {
            assert!((w - l.width_mm * PT_PER_MM).abs() < 0.01);
            assert!((h - l.height_mm * PT_PER_MM).abs() < 0.01);
        }
    }

    #[test]
    fn building_twice_gives_same_pages_and_scales() {
        let dir = TempDir::new().unwrap();
        let imgs = vec![jpeg(&dir, "a.jpg", 640, 360), jpeg(&dir, "b.jpg", 360, 640)];
        let first = dir.path().join("1.pdf");
        let second = dir.path().join("2.pdf");
        build_pdf(&imgs, &first).unwrap();
        build_pdf(&imgs, &second).unwrap();
        assert_eq!(page_scales(&first), page_scales(&second));
    }

    #[test]
    fn non_image_aborts_with_export_error() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("bogus.jpg");
        std::fs::write(&bogus, b"nope").unwrap();
        let err = build_pdf(&[bogus], &dir.path().join("x.pdf")).unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().starts_with("PDF export failed: page 1"));
    }
}
