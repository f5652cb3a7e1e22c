//! 3×3-neighbourhood statistics over the reference bitmaps and the
//! translation-tolerant dissimilarity metric built on them.
//!
//! Every pixel of every reference bitmap contributes one 9-bit pattern count.
//! The smoothed probability that a pattern's center pixel is set then weights
//! the per-pixel differences inside [`NeighborStats::img_diff`], so that
//! locally unusual pixels cost more than pixels the database considers noise.

use crate::matrix::{Bitmap, Matrix, SubView};

/// Number of distinct 3×3 binary patterns.
pub const MASK_COUNT: usize = 1 << 9;

const CENTER_BIT: usize = 1 << 4;

/// Flat score added for every differing cell, so that large disagreement
/// areas cannot hide behind mutually cancelling probability deltas.
const DIFFERING_CELL_PENALTY: f64 = 1e-3;

/// Maximum translation (in pixels, per axis) tried by the diff.
const MAX_OFFSET: usize = 1;

/// Occurrence counters for each 3×3 pattern seen in the reference set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborStats {
    counts: [u32; MASK_COUNT],
}

impl Default for NeighborStats {
    fn default() -> Self {
        Self {
            counts: [0; MASK_COUNT],
        }
    }
}

/// Bit-pack the 3×3 window around `(r, c)`: bit `i * 3 + j` is the pixel at
/// offset `(i - 1, j - 1)`. Out-of-range positions (including a center that
/// lies outside the window itself) contribute cleared bits.
pub fn mask_at(view: &SubView<u8>, r: i64, c: i64) -> usize {
    let rows = view.rows() as i64;
    let cols = view.cols() as i64;

    let mut mask = 0usize;
    for i in (r - 1).max(0)..(r + 2).min(rows) {
        for j in (c - 1).max(0)..(c + 2).min(cols) {
            if *view.at(i as usize, j as usize) != 0 {
                mask |= 1 << ((i - r + 1) * 3 + (j - c + 1));
            }
        }
    }
    mask
}

/// Clipped 3×3 sum around `(r, c)`.
fn sum3x3(mat: &Matrix<f64>, r: usize, c: usize) -> f64 {
    let r_beg = r.saturating_sub(1);
    let r_end = (r + 2).min(mat.rows());
    let c_beg = c.saturating_sub(1);
    let c_end = (c + 2).min(mat.cols());

    let mut sum = 0.0;
    for i in r_beg..r_end {
        for j in c_beg..c_end {
            sum += mat[(i, j)];
        }
    }
    sum
}

impl NeighborStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.counts = [0; MASK_COUNT];
    }

    pub fn increment(&mut self, mask: usize) {
        self.counts[mask] += 1;
    }

    pub fn count(&self, mask: usize) -> u32 {
        self.counts[mask]
    }

    /// Count every pixel neighbourhood of a reference bitmap.
    pub fn record(&mut self, img: &Bitmap) {
        let view = img.view();
        for r in 0..img.rows() {
            for c in 0..img.cols() {
                self.increment(mask_at(&view, r as i64, c as i64));
            }
        }
    }

    /// Smoothed probability that the center pixel of `mask`'s pattern is set,
    /// estimated from the recorded counts. Laplace smoothing keeps the value
    /// strictly inside `(0, 1)` even for patterns never seen.
    pub fn prob_pixel(&self, mask: usize) -> f64 {
        let with = f64::from(self.counts[mask | CENTER_BIT]);
        let without = f64::from(self.counts[mask & !CENTER_BIT]);
        (with + 1.0) / (with + without + 2.0)
    }

    fn prob_at(&self, view: &SubView<u8>, r: i64, c: i64) -> f64 {
        self.prob_pixel(mask_at(view, r, c))
    }

    /// Translation-tolerant dissimilarity between two bitmaps.
    ///
    /// `first` is placed in a one-pixel-padded workspace and compared against
    /// `second` sampled under every offset in `[-1, 1]²`; the result is the
    /// minimum offset score. Scoring accumulates, per differing cell, the
    /// absolute clipped 3×3 sum of probability deltas plus a flat penalty.
    ///
    /// The accumulation stops as soon as it exceeds `threshold`; the returned
    /// value is then only guaranteed to be `> threshold`, which is enough for
    /// callers pruning a best-match search.
    pub fn img_diff(&self, first: &SubView<u8>, second: &SubView<u8>, threshold: f64) -> f64 {
        let rows = first.rows().max(second.rows());
        let cols = first.cols().max(second.cols());
        let wrows = rows + 2 * MAX_OFFSET;
        let wcols = cols + 2 * MAX_OFFSET;

        let mut workspace: Bitmap = Matrix::new(wrows, wcols);
        for r in 0..first.rows() {
            for c in 0..first.cols() {
                workspace[(r + MAX_OFFSET, c + MAX_OFFSET)] = *first.at(r, c);
            }
        }

        // Working buffers shared by all nine offsets; every cell is
        // rewritten on each sweep.
        let mut delta = Matrix::<f64>::new(wrows, wcols);
        let mut differs: Bitmap = Matrix::new(wrows, wcols);

        let mut best = f64::INFINITY;
        for dr in -(MAX_OFFSET as i64)..=MAX_OFFSET as i64 {
            for dc in -(MAX_OFFSET as i64)..=MAX_OFFSET as i64 {
                let cap = best.min(threshold);
                let score =
                    self.offset_diff(&workspace, second, dr, dc, cap, &mut delta, &mut differs);
                best = best.min(score);
            }
        }
        best
    }

    /// Score one offset. Rows of the probability-delta buffer are finalised
    /// one sweep row behind (their 3×3 sums need the row below), and the
    /// running score is checked against `cap` after every finalised cell and
    /// row, returning early once exceeded.
    fn offset_diff(
        &self,
        workspace: &Bitmap,
        second: &SubView<u8>,
        dr: i64,
        dc: i64,
        cap: f64,
        delta: &mut Matrix<f64>,
        differs: &mut Bitmap,
    ) -> f64 {
        let wrows = workspace.rows();
        let wcols = workspace.cols();
        let wview = workspace.view();
        let pad = MAX_OFFSET as i64;

        let mut score = 0.0;
        for i in 0..wrows {
            for j in 0..wcols {
                let si = i as i64 - pad - dr;
                let sj = j as i64 - pad - dc;
                let in_second = si >= 0
                    && (si as usize) < second.rows()
                    && sj >= 0
                    && (sj as usize) < second.cols();
                let second_px = if in_second {
                    *second.at(si as usize, sj as usize)
                } else {
                    0
                };

                if workspace[(i, j)] == second_px {
                    differs[(i, j)] = 0;
                    delta[(i, j)] = 0.0;
                } else {
                    differs[(i, j)] = 1;
                    delta[(i, j)] = self.prob_at(&wview, i as i64, j as i64)
                        - self.prob_at(second, si, sj);
                }
            }

            if i >= 1 && finalize_row(delta, differs, i - 1, cap, &mut score) {
                return score;
            }
        }

        finalize_row(delta, differs, wrows - 1, cap, &mut score);
        score
    }
}

/// Add every differing cell of row `r` to `score`. Returns true as soon as
/// `score` exceeds `cap`.
fn finalize_row(
    delta: &Matrix<f64>,
    differs: &Bitmap,
    r: usize,
    cap: f64,
    score: &mut f64,
) -> bool {
    for c in 0..delta.cols() {
        if differs[(r, c)] != 0 {
            *score += sum3x3(delta, r, c).abs() + DIFFERING_CELL_PENALTY;
            if *score > cap {
                return true;
            }
        }
    }
    false
}
