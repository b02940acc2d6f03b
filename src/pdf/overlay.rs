//! Searchable PDFs: the page image with an invisible text layer on top.
//!
//! The image fills the page, whose size in points is derived from the
//! rasterisation DPI so the PDF keeps the physical size of the scan. The
//! recognised lines are set in render mode 3 (neither filled nor stroked)
//! inside a box inset by 10% on every side, at the largest size up to 48 pt
//! that keeps every line inside the box.

use super::{build_failed, encode_win_ansi, text_width, PdfBuilder, FONT_NAME, IMAGE_NAME};
use crate::error::OcrError;
use image::DynamicImage;
use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use std::path::Path;

const MAX_FONT_SIZE: f32 = 48.0;
const MIN_FONT_SIZE: f32 = 1.0;
const LEADING: f32 = 1.2;
const INSET: f32 = 0.1;

/// One page of a searchable PDF.
#[derive(Debug, Clone, Copy)]
pub struct OverlayPage<'a> {
    pub image: &'a DynamicImage,
    pub text: &'a str,
}

/// Page size in points of an image rasterised at `dpi`.
pub fn page_size(image: &DynamicImage, dpi: u32) -> (f32, f32) {
    let scale = 72.0 / dpi.max(1) as f32;
    (image.width() as f32 * scale, image.height() as f32 * scale)
}

/// Largest font size that fits `lines` into a `box_w` × `box_h` box.
pub fn fit_font_size(box_w: f32, box_h: f32, lines: &[&str]) -> f32 {
    if lines.is_empty() {
        return MAX_FONT_SIZE;
    }
    let by_height = box_h / (lines.len() as f32 * LEADING);
    let widest_em = lines
        .iter()
        .map(|l| text_width(l, 1.0))
        .fold(0.0f32, f32::max);
    let by_width = if widest_em > 0.0 {
        box_w / widest_em
    } else {
        MAX_FONT_SIZE
    };
    by_height.min(by_width).min(MAX_FONT_SIZE).max(MIN_FONT_SIZE)
}

/// Content stream for one overlay page of `width` × `height` points.
pub fn overlay_operations(width: f32, height: f32, text: &str) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Real(width),
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(height),
                Object::Integer(0),
                Object::Integer(0),
            ],
        ),
        Operation::new("Do", vec![IMAGE_NAME.into()]),
        Operation::new("Q", vec![]),
    ];

    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return ops;
    }

    let margin_x = width * INSET;
    let margin_y = height * INSET;
    let size = fit_font_size(width - 2.0 * margin_x, height - 2.0 * margin_y, &lines);

    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![FONT_NAME.into(), Object::Real(size)]));
    ops.push(Operation::new("Tr", vec![Object::Integer(3)]));
    for (i, line) in lines.iter().enumerate() {
        let baseline = height - margin_y - size - i as f32 * size * LEADING;
        ops.push(Operation::new(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Real(margin_x),
                Object::Real(baseline),
            ],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
        ));
    }
    ops.push(Operation::new("ET", vec![]));
    ops
}

/// Write a searchable PDF with one page per entry of `pages`.
pub fn write_searchable_pdf(pages: &[OverlayPage<'_>], dpi: u32, path: &Path) -> Result<(), OcrError> {
    if pages.is_empty() {
        return Err(build_failed(path, "no pages to write"));
    }

    let mut builder = PdfBuilder::new();
    for page in pages {
        let (w, h) = page_size(page.image, dpi);
        let image_id = builder
            .add_image(page.image)
            .map_err(|e| build_failed(path, format!("image compression: {e}")))?;
        builder
            .add_page(w, h, overlay_operations(w, h, page.text), Some(image_id))
            .map_err(|e| build_failed(path, e))?;
    }
    builder.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use lopdf::Document;

    fn operators(ops: &[Operation]) -> Vec<&str> {
        ops.iter().map(|o| o.operator.as_str()).collect()
    }

    #[test]
    fn page_size_follows_dpi() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(3306, 4678));
        let (w, h) = page_size(&img, 400);
        assert!((w - 595.08).abs() < 0.1, "w = {w}");
        assert!((h - 842.04).abs() < 0.1, "h = {h}");
    }

    #[test]
    fn font_size_capped_at_48() {
        assert_eq!(fit_font_size(1000.0, 1000.0, &["hi"]), 48.0);
    }

    #[test]
    fn font_size_shrinks_for_many_lines() {
        let lines = vec!["x"; 100];
        let size = fit_font_size(400.0, 600.0, &lines);
        assert!((size - 5.0).abs() < 1e-4, "size = {size}");
    }

    #[test]
    fn font_size_shrinks_for_wide_lines() {
        let size = fit_font_size(100.0, 1000.0, &["WWWWWWWWWW"]);
        assert!(text_width("WWWWWWWWWW", size) <= 100.0 + 1e-3);
        assert!(size < 48.0);
    }

    #[test]
    fn overlay_draws_image_then_invisible_text() {
        let ops = overlay_operations(500.0, 700.0, "Factura 001\n\nTotal 450");
        assert_eq!(
            operators(&ops),
            vec!["q", "cm", "Do", "Q", "BT", "Tf", "Tr", "Tm", "Tj", "Tm", "Tj", "ET"]
        );
        assert!(matches!(ops[6].operands[..], [Object::Integer(3)]));
    }

    #[test]
    fn overlay_without_text_only_draws_image() {
        let ops = overlay_operations(500.0, 700.0, "   \n");
        assert_eq!(operators(&ops), vec!["q", "cm", "Do", "Q"]);
    }

    #[test]
    fn text_stays_inside_the_inset_box() {
        let ops = overlay_operations(500.0, 700.0, "uno\ndos\ntres");
        for op in ops.iter().filter(|o| o.operator == "Tm") {
            let (Object::Real(x), Object::Real(y)) = (&op.operands[4], &op.operands[5]) else {
                panic!("unexpected Tm operands");
            };
            assert!((*x - 50.0).abs() < 1e-3);
            assert!(*y >= 70.0 && *y <= 630.0, "baseline {y}");
        }
    }

    #[test]
    fn multi_page_searchable_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc_searchable.pdf");
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(80, 120, Luma([255])));
        let pages = [
            OverlayPage { image: &img, text: "pagina uno" },
            OverlayPage { image: &img, text: "pagina dos" },
        ];
        write_searchable_pdf(&pages, 300, &path).unwrap();
        assert_eq!(Document::load(&path).unwrap().get_pages().len(), 2);
    }

    #[test]
    fn empty_page_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_searchable_pdf(&[], 300, &dir.path().join("x.pdf")).unwrap_err();
        assert!(matches!(err, OcrError::PdfBuildFailed { .. }));
    }
}
