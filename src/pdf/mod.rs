//! PDF artifacts written with `lopdf`.
//!
//! * [`text`]    : recognised text laid out on A4 pages
//! * [`overlay`] : page image with an invisible, selectable text layer
//! * [`split`]   : one single-page PDF per source page
//! * [`metadata`]: Title/Author/Producer/CustomID Info dictionary
//!
//! Text is set in the standard Helvetica font with `WinAnsiEncoding`, so no
//! font program is embedded. Characters outside Latin-1 print as `?`.

pub mod metadata;
pub mod overlay;
pub mod split;
pub mod text;

use crate::error::OcrError;
use crate::pipeline::encode::raw_samples;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use std::path::Path;

/// Resource name of the page font.
pub(crate) const FONT_NAME: &str = "F1";
/// Resource name of the page image.
pub(crate) const IMAGE_NAME: &str = "Im1";

/// Incrementally assembles a PDF of simple pages.
pub(crate) struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
        }
    }

    /// Embed `img` as a Flate-compressed image XObject.
    pub fn add_image(&mut self, img: &DynamicImage) -> std::io::Result<ObjectId> {
        let raw = raw_samples(img);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw.data)?;
        let compressed = encoder.finish()?;

        let color_space = if raw.gray { "DeviceGray" } else { "DeviceRGB" };
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => raw.width as i64,
                "Height" => raw.height as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8i64,
                "Filter" => "FlateDecode",
            },
            compressed,
        );
        Ok(self.doc.add_object(stream))
    }

    /// Append a page of `width` × `height` points drawn by `operations`.
    pub fn add_page(
        &mut self,
        width: f32,
        height: f32,
        operations: Vec<Operation>,
        image: Option<ObjectId>,
    ) -> Result<(), lopdf::Error> {
        let content = Content { operations }.encode()?;
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content));

        let mut resources = dictionary! {
            "Font" => dictionary! { FONT_NAME => self.font_id },
        };
        if let Some(image_id) = image {
            resources.set("XObject", dictionary! { IMAGE_NAME => image_id });
        }

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Real(width), Object::Real(height)],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Close the page tree and return the document.
    pub fn finish(mut self) -> Document {
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc
    }

    /// Finish and write the document to `path`.
    pub fn save(self, path: &Path) -> Result<(), OcrError> {
        let mut doc = self.finish();
        save_document(&mut doc, path)
    }
}

pub(crate) fn save_document(doc: &mut Document, path: &Path) -> Result<(), OcrError> {
    doc.save(path).map_err(|source| OcrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub(crate) fn build_failed(path: &Path, detail: impl std::fmt::Display) -> OcrError {
    OcrError::PdfBuildFailed {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

// ── Text encoding and metrics ────────────────────────────────────────────────

/// Encode `text` for a `WinAnsiEncoding` font. Latin-1 characters map to
/// their own byte; everything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x09 => b' ',
            code @ 0x20..=0x7E | code @ 0xA0..=0xFF => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Helvetica advance widths (1/1000 em) for printable ASCII 0x20..=0x7E.
#[rustfmt::skip]
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,                               // 0-9
    278, 278, 584, 584, 584, 556, 1015,                                             // :;<=>?@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,                // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,                // N-Z
    278, 278, 278, 469, 556, 333,                                                   // [\]^_`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,                // a-m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,                // n-z
    334, 260, 334, 584,                                                             // {|}~
];

/// Width of one WinAnsi byte in 1/1000 em.
pub fn helvetica_width(byte: u8) -> u16 {
    match byte {
        0x20..=0x7E => HELVETICA_ASCII[(byte - 0x20) as usize],
        // Í Ì Î Ï and their lowercase forms take the narrow I/i advance
        0xCC..=0xCF => 278,
        0xEC..=0xEF => 278,
        // Ò..Ö, Ø
        0xD2..=0xD6 | 0xD8 => 778,
        // Ù..Ü, Ñ, Ç
        0xD9..=0xDC | 0xD1 | 0xC7 => 722,
        0xC0..=0xCB => 667,
        0xE7 => 500,
        _ => 556,
    }
}

/// Rendered width of `text` in points at `size`.
pub fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = encode_win_ansi(text)
        .into_iter()
        .map(|b| helvetica_width(b) as u32)
        .sum();
    units as f32 * size / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_ansi_keeps_latin1_and_replaces_the_rest() {
        assert_eq!(encode_win_ansi("Año ñ"), vec![b'A', 0xF1, b'o', b' ', 0xF1]);
        assert_eq!(encode_win_ansi("€ 日"), b"? ?".to_vec());
        assert_eq!(encode_win_ansi("a\tb"), b"a b".to_vec());
    }

    #[test]
    fn helvetica_widths_match_afm() {
        assert_eq!(helvetica_width(b' '), 278);
        assert_eq!(helvetica_width(b'W'), 944);
        assert_eq!(helvetica_width(b'i'), 222);
        assert_eq!(helvetica_width(b'~'), 584);
        assert_eq!(helvetica_width(0xED), 278); // í
        assert!((text_width("mm", 10.0) - 16.66).abs() < 0.01);
    }

    #[test]
    fn builder_produces_loadable_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.pdf");

        let mut builder = PdfBuilder::new();
        builder.add_page(200.0, 100.0, vec![], None).unwrap();
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(4, 4, image::Luma([0])));
        let image_id = builder.add_image(&img).unwrap();
        builder.add_page(200.0, 100.0, vec![], Some(image_id)).unwrap();
        assert_eq!(builder.page_count(), 2);
        builder.save(&path).unwrap();

        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }
}
