//! Dynamic-programming segmentation matcher.
//!
//! For every position in the group-0 run sequence the matcher considers each
//! granularity that ends there, scans the database for the closest reference
//! under the diff metric, and keeps the segmentation with the smallest
//! cumulative diff. Index references are oriented into sub- or superscript
//! from the query's vertical trim counts.

use serde::{Deserialize, Serialize};

use crate::db::{Symbol, SymbolDatabase, SymbolKind, INDEX_PREFIX};
use crate::matrix::Bitmap;
use crate::segment::{split_into_symbol_groups, SplitSymbol};

/// Tuning knobs of the segmentation matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Number of run-join granularities explored.
    pub symbol_groups: usize,
    /// A candidate is accepted only when its best diff stays at or below this.
    pub match_threshold: f64,
    /// References whose width or height differ from the query by more than
    /// this many pixels are skipped without computing a diff.
    pub size_diff_threshold: u32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            symbol_groups: 12,
            match_threshold: 1.4,
            size_diff_threshold: 4,
        }
    }
}

/// One symbol of the chosen segmentation.
#[derive(Debug, Clone)]
pub struct MatchedSymbol {
    /// Granularity the match came from (`group` + 1 joined runs).
    pub group: usize,
    /// The segmented sub-image that was matched.
    pub split: SplitSymbol,
    /// Markup of the matched reference, index-oriented for this query.
    pub tex: String,
}

/// Recognition dead-end: no segmentation of the image into database symbols
/// exists. Carries the sub-images the matcher tried to extend with next.
#[derive(Debug, Clone)]
pub struct UntexFailure {
    pub unmatched_symbol_candidates: Vec<SplitSymbol>,
}

#[derive(Debug, Clone)]
struct DpState {
    best_cum_diff: f64,
    group: usize,
    tex: String,
}

/// Find the minimum-cumulative-diff segmentation of `img` into database
/// symbols.
pub fn match_symbols(
    img: &Bitmap,
    db: &SymbolDatabase,
    config: &MatcherConfig,
) -> Result<Vec<MatchedSymbol>, UntexFailure> {
    let groups = split_into_symbol_groups(img, config.symbol_groups);
    let n = groups[0].len();
    Matcher {
        db,
        config,
        groups,
        dp: vec![None; n],
    }
    .run()
}

struct Matcher<'a> {
    db: &'a SymbolDatabase,
    config: &'a MatcherConfig,
    groups: Vec<Vec<SplitSymbol>>,
    dp: Vec<Option<DpState>>,
}

impl Matcher<'_> {
    fn run(mut self) -> Result<Vec<MatchedSymbol>, UntexFailure> {
        let n = self.dp.len();
        for pos in 0..n {
            for group in 0..self.config.symbol_groups.min(pos + 1) {
                self.try_match(pos, group);
            }

            if self.cannot_match(pos) {
                return Err(self.collect_unmatched_candidates(pos));
            }
        }

        Ok(self.collect_used_symbols())
    }

    fn try_match(&mut self, pos: usize, group: usize) {
        // The prefix ending just before this candidate must be realisable.
        let prev_cum_diff = if pos == group {
            0.0
        } else {
            match &self.dp[pos - group - 1] {
                Some(state) => state.best_cum_diff,
                None => return,
            }
        };

        let query = &self.groups[group][pos - group];
        let size_limit = i64::from(self.config.size_diff_threshold);
        let stats = self.db.stats();

        let mut best_diff = f64::INFINITY;
        let mut best: Option<&Symbol> = None;
        for symbol in self.db.symbols() {
            let row_diff = (query.img.rows() as i64 - symbol.img.rows() as i64).abs();
            let col_diff = (query.img.cols() as i64 - symbol.img.cols() as i64).abs();
            if row_diff > size_limit || col_diff > size_limit {
                continue;
            }

            let cap = best_diff.min(self.config.match_threshold);
            let diff = stats.img_diff(&query.img.view(), &symbol.img.view(), cap);
            if diff < best_diff {
                best_diff = diff;
                best = Some(symbol);
            }
        }

        let Some(symbol) = best else { return };
        if best_diff > self.config.match_threshold {
            tracing::trace!(
                "position {} group {}: best {} is over threshold (diff {:.6})",
                pos,
                group,
                symbol.tex,
                best_diff
            );
            return;
        }

        let tex = matched_symbol_tex(query, symbol);
        tracing::debug!(
            "position {} matched as group {}: {} (diff {:.6})",
            pos,
            group,
            tex,
            best_diff
        );

        let cum_diff = prev_cum_diff + best_diff;
        let overwrite = self.dp[pos]
            .as_ref()
            .map_or(true, |state| cum_diff <= state.best_cum_diff);
        if overwrite {
            self.dp[pos] = Some(DpState {
                best_cum_diff: cum_diff,
                group,
                tex,
            });
        }
    }

    /// The matcher gives up once a position is unreachable and nothing in the
    /// trailing window could still be covered by a wider group later.
    fn cannot_match(&self, pos: usize) -> bool {
        if self.dp[pos].is_some() {
            return false;
        }

        let n = self.dp.len();
        if pos == n - 1 {
            return true; // The last position has to be matched.
        }

        match (pos + 1).checked_sub(self.config.symbol_groups) {
            // A symbol from a wider group may still cover `pos` later.
            None => false,
            Some(beg) => (beg..pos).all(|i| self.dp[i].is_none()),
        }
    }

    /// The rightmost sub-images the matcher would have tried to extend with:
    /// for every group, the candidates starting just past the longest matched
    /// prefix, in descending start position.
    fn collect_unmatched_candidates(&self, pos: usize) -> UntexFailure {
        let n = self.dp.len() as i64;
        let prefix_end = (0..=pos)
            .rev()
            .find(|&i| self.dp[i].is_some())
            .map_or(-1, |i| i as i64);

        let mut candidates = Vec::new();
        for group in 0..self.config.symbol_groups.min(pos + 1) {
            let rightmost = (prefix_end + 1).min(n - 1 - group as i64);
            let leftmost = (prefix_end - group as i64 + 1).max(0);

            let mut cand_pos = rightmost;
            while cand_pos >= leftmost {
                let cand = cand_pos as usize;
                if cand == 0 || self.dp[cand - 1].is_some() {
                    candidates.push(self.groups[group][cand].clone());
                }
                cand_pos -= 1;
            }
        }

        UntexFailure {
            unmatched_symbol_candidates: candidates,
        }
    }

    /// Walk the DP table backwards, keeping only the states the final
    /// segmentation actually uses.
    fn collect_used_symbols(mut self) -> Vec<MatchedSymbol> {
        let mut picked = Vec::new();
        let mut pos = self.dp.len();
        while pos > 0 {
            let Some(state) = self.dp[pos - 1].take() else {
                break;
            };
            let end = pos - 1;
            picked.push(MatchedSymbol {
                group: state.group,
                split: self.groups[state.group][end - state.group].clone(),
                tex: state.tex,
            });
            pos = end - state.group;
        }

        picked.reverse();
        picked
    }
}

/// Translate a matched reference into this query's markup. Index references
/// become superscripts when the glyph sits high (less trimmed above than
/// below), subscripts otherwise.
fn matched_symbol_tex(query: &SplitSymbol, symbol: &Symbol) -> String {
    match symbol.kind {
        SymbolKind::Index => {
            let index = &symbol.tex[INDEX_PREFIX.len()..];
            if query.top_rows_cut < query.bottom_rows_cut {
                format!("{{}}^{}", index)
            } else {
                format!("{{}}_{}", index)
            }
        }
        SymbolKind::Other => symbol.tex.clone(),
    }
}
