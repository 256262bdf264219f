//! QR encoding.
//!
//! Encoding is delegated to `qrcode`; this module turns the module matrix
//! into a PNG or hands it to the PDF renderer. Output is a pure function of
//! the input string and the size parameters.

use std::io::Cursor;

use image::{GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};

use crate::config::MAX_QR_MARGIN;
use crate::error::{Error, Result};

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Square matrix of QR modules, without quiet zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl QrMatrix {
    /// Encode `data` with automatic version and medium error correction.
    ///
    /// # Errors
    ///
    /// Returns a render error if the data does not fit in a QR code.
    pub fn encode(data: &str) -> Result<Self> {
        let code = QrCode::new(data.as_bytes()).map_err(|e| Error::render("qr", e.to_string()))?;
        let width = code.width();
        let dark = code
            .to_colors()
            .into_iter()
            .map(|c| c == Color::Dark)
            .collect();
        Ok(Self { width, dark })
    }

    /// Modules per side.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Whether the module at column `x`, row `y` is dark. Out of range is light.
    #[must_use]
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.dark[y * self.width + x]
    }

    /// Dark modules as `(x, y)` pairs, row-major.
    pub fn dark_modules(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.dark
            .iter()
            .enumerate()
            .filter(|(_, dark)| **dark)
            .map(|(i, _)| (i % self.width, i / self.width))
    }

    /// Rasterize to a grayscale image `size` pixels wide, with a quiet zone of
    /// `margin` modules.
    ///
    /// The image is never narrower than one pixel per module. The margin is
    /// capped at [`MAX_QR_MARGIN`].
    #[must_use]
    pub fn to_image(&self, size: u32, margin: u32) -> GrayImage {
        let margin = margin.min(MAX_QR_MARGIN) as usize;
        let total = self.width + 2 * margin;
        let side = (size as usize).max(total);
        let side_px = u32::try_from(side).unwrap_or(u32::MAX);

        GrayImage::from_fn(side_px, side_px, |px, py| {
            // nearest module for this pixel
            let mx = px as usize * total / side;
            let my = py as usize * total / side;
            let dark = mx >= margin
                && my >= margin
                && self.is_dark(mx - margin, my - margin);
            if dark {
                DARK
            } else {
                LIGHT
            }
        })
    }
}

/// Encode `data` as a black-on-white PNG.
///
/// # Errors
///
/// Returns a render error if the data cannot be encoded or the PNG cannot be
/// written.
pub fn png(data: &str, size: u32, margin: u32) -> Result<Vec<u8>> {
    let image = QrMatrix::encode(data)?.to_image(size, margin);
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| Error::render("png", e.to_string()))?;
    Ok(out.into_inner())
}

/// Strong `ETag` for a rendered artifact.
#[must_use]
pub fn etag(body: &[u8]) -> String {
    format!("\"{}\"", blake3::hash(body).to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_dimensions() {
        let matrix = QrMatrix::encode("https://www.notion.so/Egg-1").unwrap();
        // Versions grow in steps of 4 from 21 modules
        assert_eq!((matrix.width() - 21) % 4, 0);
        // Finder pattern corner is dark
        assert!(matrix.is_dark(0, 0));
        assert!(!matrix.is_dark(matrix.width(), 0));
    }

    #[test]
    fn test_png_is_deterministic() {
        let a = png("https://www.notion.so/abc", 200, 2).unwrap();
        let b = png("https://www.notion.so/abc", 200, 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(etag(&a), etag(&b));
    }

    #[test]
    fn test_png_differs_per_input() {
        let a = png("Egg-1", 200, 2).unwrap();
        let b = png("Egg-2", 200, 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_png_signature_and_size() {
        let bytes = png("hello", 200, 2).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let image = QrMatrix::encode("hello").unwrap().to_image(200, 2);
        assert_eq!(image.dimensions(), (200, 200));
    }

    #[test]
    fn test_quiet_zone_is_light() {
        let image = QrMatrix::encode("hello").unwrap().to_image(200, 4);
        assert_eq!(*image.get_pixel(0, 0), LIGHT);
        assert_eq!(*image.get_pixel(199, 199), LIGHT);
    }

    #[test]
    fn test_huge_margin_is_capped() {
        let image = QrMatrix::encode("hello").unwrap().to_image(200, u32::MAX);
        assert_eq!(image.dimensions(), (200, 200));
    }

    #[test]
    fn test_tiny_size_keeps_one_pixel_per_module() {
        let matrix = QrMatrix::encode("hello").unwrap();
        let image = matrix.to_image(1, 0);
        assert_eq!(image.width() as usize, matrix.width());
    }

    #[test]
    fn test_oversized_input_is_render_error() {
        let huge = "x".repeat(8000);
        let err = QrMatrix::encode(&huge).unwrap_err();
        assert!(matches!(err, Error::Render { artifact: "qr", .. }));
    }

    #[test]
    fn test_dark_modules_match_matrix() {
        let matrix = QrMatrix::encode("Egg-7").unwrap();
        assert!(matrix.dark_modules().all(|(x, y)| matrix.is_dark(x, y)));
    }

    #[test]
    fn test_etag_is_quoted_hex() {
        let tag = etag(b"body");
        assert!(tag.starts_with('"') && tag.ends_with('"'));
        assert_eq!(tag.len(), 66);
    }
}
