//! Column-run segmentation of a formula bitmap into candidate symbols.
//!
//! A *run* is a maximal range of columns whose sum is non-zero. Group-`k`
//! holds the sub-images obtained by joining every `k + 1` consecutive runs:
//! group 0 drives the DP matcher, higher groups supply wider hypotheses for
//! glyphs the column splitter over-splits (a base glyph plus an adjacent
//! raised exponent, for instance).

use crate::matrix::{Bitmap, SubView};

/// One candidate sub-image produced by segmentation.
///
/// `img` is tight: unless it is empty, its first and last row and column
/// each contain at least one set pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSymbol {
    pub img: Bitmap,
    /// Column in the original image where the extracted run starts.
    pub first_column_pos: usize,
    /// Empty rows trimmed above the tight crop.
    pub top_rows_cut: usize,
    /// Empty rows trimmed below the tight crop.
    pub bottom_rows_cut: usize,
}

/// Tight crop of a window plus the number of empty rows removed on each side.
/// Trimmed columns are not reported.
pub struct TightCrop<'a> {
    pub view: SubView<'a, u8>,
    pub top_rows_cut: usize,
    pub bottom_rows_cut: usize,
}

/// Shrink a window to the bounding box of its set pixels.
///
/// An all-zero window yields an empty view and reports `rows / 2` and
/// `(rows + 1) / 2` rows cut, so the vertical midpoint stays meaningful.
pub fn without_empty_borders<'a>(view: &SubView<'a, u8>) -> TightCrop<'a> {
    let rows = view.rows();
    let cols = view.cols();

    let mut min_row = rows;
    let mut max_row = 0;
    let mut min_col = cols;
    let mut max_col = 0;

    for r in 0..rows {
        for c in 0..cols {
            if *view.at(r, c) != 0 {
                min_row = min_row.min(r);
                max_row = max_row.max(r);
                min_col = min_col.min(c);
                max_col = max_col.max(c);
            }
        }
    }

    if min_row == rows {
        return TightCrop {
            view: view.section(0, 0, 0, 0),
            top_rows_cut: rows / 2,
            bottom_rows_cut: (rows + 1) / 2,
        };
    }

    TightCrop {
        view: view.section(min_row, min_col, max_row - min_row + 1, max_col - min_col + 1),
        top_rows_cut: min_row,
        bottom_rows_cut: rows - max_row - 1,
    }
}

/// Per-column count of set pixels.
pub fn column_sums(img: &Bitmap) -> Vec<u32> {
    let mut sums = vec![0u32; img.cols()];
    for r in 0..img.rows() {
        for (c, sum) in sums.iter_mut().enumerate() {
            *sum += u32::from(img[(r, c)]);
        }
    }
    sums
}

/// Maximal `[begin, end)` column ranges with a non-zero sum.
pub fn column_runs(sums: &[u32]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut run_beg = None;
    for (c, &sum) in sums.iter().enumerate() {
        match (run_beg, sum) {
            (None, s) if s != 0 => run_beg = Some(c),
            (Some(beg), 0) => {
                runs.push((beg, c));
                run_beg = None;
            }
            _ => {}
        }
    }
    if let Some(beg) = run_beg {
        runs.push((beg, sums.len()));
    }
    runs
}

/// Split `img` into `groups` granularities of run-joined symbols.
///
/// Element `k` of the result lists, left to right, the tight crops of every
/// `k + 1` consecutive runs joined together.
pub fn split_into_symbol_groups(img: &Bitmap, groups: usize) -> Vec<Vec<SplitSymbol>> {
    assert!(groups > 0);

    let mut col_sums = column_sums(img);
    col_sums.push(0); // guard: flushes the trailing run

    let mut symbol_groups: Vec<Vec<SplitSymbol>> = vec![Vec::new(); groups];
    let mut group_beg = vec![0usize; groups];

    let full = img.view();
    let crop = |beg: usize, end: usize| -> SplitSymbol {
        let window = full.section(0, beg, img.rows(), end - beg);
        let tight = without_empty_borders(&window);
        SplitSymbol {
            img: tight.view.to_matrix(),
            first_column_pos: beg,
            top_rows_cut: tight.top_rows_cut,
            bottom_rows_cut: tight.bottom_rows_cut,
        }
    };

    for (i, &sum) in col_sums.iter().enumerate() {
        if sum != 0 {
            continue;
        }

        // Consecutive empty columns move the next-run marker along.
        if group_beg[0] == i {
            group_beg[0] = i + 1;
            continue;
        }

        // A run just ended at column i: emit one symbol per group whose
        // window is non-trivial, then shift each group's start to the
        // previous group's (one run later).
        for k in (1..groups).rev() {
            if group_beg[k] != group_beg[k - 1] {
                symbol_groups[k].push(crop(group_beg[k], i));
                group_beg[k] = group_beg[k - 1];
            }
        }

        symbol_groups[0].push(crop(group_beg[0], i));
        group_beg[0] = i + 1;
    }

    symbol_groups
}

/// Horizontal pixel gap between two segmented symbols: start column of the
/// right one minus end column of the left one. Negative when they overlap.
pub fn horizontal_gap(left: &SplitSymbol, right: &SplitSymbol) -> i64 {
    right.first_column_pos as i64 - (left.first_column_pos + left.img.cols()) as i64
}
