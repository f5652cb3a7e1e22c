//! Binarising adapter between image files and `{0,1}` bitmaps.

use std::path::Path;

use crate::error::{Error, Result};
use crate::matrix::{Bitmap, Matrix};

/// Decode an image file into an ink matrix: a pixel is ink (1) when the
/// rounded average of its RGB channels is black. Alpha is ignored.
pub fn load_bitmap(path: &Path) -> Result<Bitmap> {
    let img = image::open(path)
        .map_err(|e| {
            Error::io(
                format!("decode {}", path.display()),
                std::io::Error::other(e),
            )
        })?
        .to_rgb8();

    let (width, height) = img.dimensions();
    let mut out = Matrix::new(height as usize, width as usize);
    for (x, y, pixel) in img.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let level = f64::from(u32::from(r) + u32::from(g) + u32::from(b)) / 3.0 / 255.0;
        out[(y as usize, x as usize)] = u8::from(level.round() == 0.0);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn decoding_binarises_on_the_mid_level() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(0, 0, Rgb([0, 0, 0])); // black: ink
        img.put_pixel(1, 0, Rgb([255, 255, 255])); // white: background
        img.put_pixel(2, 0, Rgb([100, 100, 100])); // dark grey: ink
        img.put_pixel(0, 1, Rgb([200, 200, 200])); // light grey: background
        img.put_pixel(1, 1, Rgb([255, 0, 0])); // saturated red averages dark
        img.put_pixel(2, 1, Rgb([255, 255, 0])); // yellow averages light

        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("sample.png");
        img.save(&path).expect("save png");

        let bitmap = load_bitmap(&path).expect("decode");
        assert_eq!((bitmap.rows(), bitmap.cols()), (2, 3));
        assert_eq!(bitmap.row(0), &[1, 0, 1]);
        assert_eq!(bitmap.row(1), &[0, 1, 0]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_bitmap(Path::new("/nonexistent/whatever.png"));
        assert!(matches!(err, Err(Error::Io { .. })));
    }
}
