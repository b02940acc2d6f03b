//! Image encoding helpers shared by the recognizers and the PDF writers.
//!
//! PNG is used for everything handed to Tesseract: it is lossless, and JPEG
//! artefacts around glyph edges hurt recognition far more than file size
//! matters for a temp file.

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Raw samples of an image for embedding as a PDF image XObject.
///
/// Luma images stay single-channel (`DeviceGray`); everything else is
/// flattened to 8-bit RGB (`DeviceRGB`).
pub struct RawSamples {
    pub width: u32,
    pub height: u32,
    pub gray: bool,
    pub data: Vec<u8>,
}

pub fn raw_samples(img: &DynamicImage) -> RawSamples {
    match img {
        DynamicImage::ImageLuma8(gray) => RawSamples {
            width: gray.width(),
            height: gray.height(),
            gray: true,
            data: gray.as_raw().clone(),
        },
        other => {
            let rgb = other.to_rgb8();
            RawSamples {
                width: rgb.width(),
                height: rgb.height(),
                gray: false,
                data: rgb.into_raw(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let bytes = encode_png(&img).expect("encode should succeed");
        assert_eq!(&bytes[1..4], b"PNG");
        let back = image::load_from_memory(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (10, 10));
    }

    #[test]
    fn gray_images_stay_single_channel() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 3, Luma([7])));
        let raw = raw_samples(&img);
        assert!(raw.gray);
        assert_eq!(raw.data.len(), 12);

        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba([1, 2, 3, 4])));
        let raw = raw_samples(&rgba);
        assert!(!raw.gray);
        assert_eq!(raw.data.len(), 36);
        assert_eq!(&raw.data[..3], &[1, 2, 3]);
    }
}
