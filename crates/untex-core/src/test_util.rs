//! Shared helpers for bitmap-based unit tests.

use crate::matrix::{Bitmap, Matrix};

/// Parse rows of `'#'`/`' '` into a bitmap. All rows must be equally wide.
pub(crate) fn bitmap(art: &[&str]) -> Bitmap {
    let rows = art.len();
    let cols = art.first().map_or(0, |row| row.len());
    let mut img = Matrix::new(rows, cols);
    for (r, line) in art.iter().enumerate() {
        assert_eq!(line.len(), cols, "ragged bitmap art");
        for (c, byte) in line.bytes().enumerate() {
            img[(r, c)] = u8::from(byte == b'#');
        }
    }
    img
}

/// Copy `src` into `dst` with its top-left corner at `(row, col)`.
pub(crate) fn paste(dst: &mut Bitmap, src: &Bitmap, row: usize, col: usize) {
    for r in 0..src.rows() {
        for c in 0..src.cols() {
            dst[(row + r, col + c)] = src[(r, c)];
        }
    }
}

/// Lay out glyphs left to right, top-aligned. Each entry is a glyph and the
/// number of blank columns inserted before it.
pub(crate) fn compose_row(items: &[(Bitmap, usize)]) -> Bitmap {
    let rows = items.iter().map(|(img, _)| img.rows()).max().unwrap_or(0);
    let cols = items.iter().map(|(img, gap)| img.cols() + gap).sum();

    let mut out = Matrix::new(rows, cols);
    let mut col = 0;
    for (img, gap) in items {
        col += gap;
        paste(&mut out, img, 0, col);
        col += img.cols();
    }
    out
}
