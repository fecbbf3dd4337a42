//! Preprocessing pass: sniff and validate the image, report labels.
//!
//! No pixels are changed. The document bytes go to the model untouched; this
//! stage only checks that they decode as an image and reports which
//! enhancement labels are attached to the result. The labels are
//! informational metadata, not a guarantee that the transforms ran.

use image::ImageFormat;
use tracing::{debug, warn};

/// Labels reported for a document that decoded cleanly.
pub const PREPROCESSING_LABELS: [&str; 3] = ["Grayscale", "Denoising", "Adaptive Thresholding"];

/// MIME type used when the format cannot be sniffed.
pub const FALLBACK_MIME: &str = "image/png";

/// Outcome of the preprocessing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    /// Sniffed format, if the magic bytes were recognised.
    pub format: Option<ImageFormat>,
    pub labels: Vec<String>,
}

impl Preprocessed {
    /// MIME type to attach to the image when it is sent to the model.
    pub fn mime_type(&self) -> &'static str {
        self.format
            .map(|f| f.to_mime_type())
            .unwrap_or(FALLBACK_MIME)
    }
}

/// Inspect `bytes` and produce the preprocessing labels.
///
/// CPU-bound (full decode); call from `spawn_blocking` in async code.
pub fn preprocess(bytes: &[u8]) -> Preprocessed {
    let format = image::guess_format(bytes).ok();

    let labels = match image::load_from_memory(bytes) {
        Ok(img) => {
            debug!(
                "Decoded {:?} image {}x{}",
                format,
                img.width(),
                img.height()
            );
            PREPROCESSING_LABELS.iter().map(|s| s.to_string()).collect()
        }
        Err(e) => {
            warn!("Preprocessing could not decode image: {}", e);
            vec![format!("Preprocessing Error: {}", e)]
        }
    };

    Preprocessed { format, labels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    #[test]
    fn decodable_png_gets_fixed_labels() {
        let p = preprocess(&png_bytes());
        assert_eq!(p.format, Some(ImageFormat::Png));
        assert_eq!(p.mime_type(), "image/png");
        assert_eq!(p.labels, PREPROCESSING_LABELS.map(String::from).to_vec());
    }

    #[test]
    fn garbage_gets_error_label_and_fallback_mime() {
        let p = preprocess(b"definitely not an image");
        assert_eq!(p.format, None);
        assert_eq!(p.mime_type(), FALLBACK_MIME);
        assert_eq!(p.labels.len(), 1);
        assert!(p.labels[0].starts_with("Preprocessing Error:"));
    }

    #[test]
    fn jpeg_magic_is_sniffed() {
        let p = preprocess(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]);
        assert_eq!(p.format, Some(ImageFormat::Jpeg));
        assert_eq!(p.mime_type(), "image/jpeg");
    }
}
