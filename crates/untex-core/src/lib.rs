//! untex-core — recover LaTeX markup from rendered formula images, without
//! machine learning.
//!
//! A database of reference bitmaps, each tagged with its markup, is matched
//! against connected sub-images of the input. The pipeline stages are:
//!
//! 1. **Segment** – column-run splitting into candidate sub-images at
//!    several join granularities ([`segment`]).
//! 2. **Statistics / diff** – a 3×3-neighbourhood model over the reference
//!    set weights a translation-tolerant dissimilarity score ([`stats`]).
//! 3. **Match** – dynamic programming picks the segmentation with the
//!    minimum cumulative diff ([`matcher`]).
//! 4. **Post-process** – baseline detection, period-vs-centered-dot
//!    disambiguation, spacing reconstruction ([`post`]).
//! 5. **Improve** – the markup is re-parsed and re-emitted with indices
//!    attached, commands merged and digit runs grouped ([`improve`]).
//!
//! The recognition path is single-threaded and deterministic. Database
//! *generation* ([`generate`]) is parallel: a worker pool renders the
//! built-in vocabulary ([`vocab`]) through the external LaTeX toolchain
//! ([`render`]).

pub mod db;
pub mod error;
pub mod generate;
pub mod imgio;
pub mod improve;
pub mod matcher;
pub mod matrix;
pub mod post;
pub mod queue;
pub mod render;
pub mod segment;
pub mod stats;
pub mod vocab;

#[cfg(test)]
mod test_util;

pub use db::{Symbol, SymbolDatabase, SymbolKind, GENERATED_DB_FILE, MANUAL_DB_FILE};
pub use error::{Error, Result};
pub use matcher::{MatchedSymbol, MatcherConfig, UntexFailure};
pub use matrix::{Bitmap, Matrix, SubView};
pub use post::SpacingConfig;
pub use segment::SplitSymbol;

use serde::Serialize;

/// Result of a recognition run: either the recovered markup or the
/// dead-end's candidate sub-images.
#[derive(Debug, Clone)]
pub enum UntexOutcome {
    Recovered(String),
    Unmatched(UntexFailure),
}

/// Diagnostic view of the chosen segmentation, serialisable for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionDump {
    /// Post-processed matched symbols, left to right. Empty on failure.
    pub symbols: Vec<SymbolDump>,
    /// The final markup, when recognition succeeded.
    pub recovered: Option<String>,
}

/// One matched symbol's markup and geometry.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolDump {
    pub tex: String,
    pub group: usize,
    pub first_column_pos: usize,
    pub top_rows_cut: usize,
    pub bottom_rows_cut: usize,
    pub rows: usize,
    pub cols: usize,
}

/// Recover the markup of a rendered formula bitmap using default settings.
pub fn untex_img(img: &Bitmap, db: &SymbolDatabase) -> UntexOutcome {
    untex_img_with(img, db, &MatcherConfig::default(), &SpacingConfig::default()).0
}

/// Recover the markup of a rendered formula bitmap, also returning the
/// diagnostic dump of the chosen segmentation.
pub fn untex_img_with(
    img: &Bitmap,
    db: &SymbolDatabase,
    matcher_config: &MatcherConfig,
    spacing_config: &SpacingConfig,
) -> (UntexOutcome, RecognitionDump) {
    match matcher::match_symbols(img, db, matcher_config) {
        Err(failure) => {
            tracing::debug!(
                "recognition dead-end with {} candidates",
                failure.unmatched_symbol_candidates.len()
            );
            let dump = RecognitionDump {
                symbols: Vec::new(),
                recovered: None,
            };
            (UntexOutcome::Unmatched(failure), dump)
        }
        Ok(mut symbols) => {
            post::correct_baseline(&mut symbols);
            post::adjust_spacing(&mut symbols, spacing_config);

            let joined = symbols
                .iter()
                .map(|s| s.tex.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let recovered = improve::improve_tex(&joined);
            tracing::debug!("recognised: {}", recovered);

            let dump = RecognitionDump {
                symbols: symbols.iter().map(SymbolDump::from).collect(),
                recovered: Some(recovered.clone()),
            };
            (UntexOutcome::Recovered(recovered), dump)
        }
    }
}

impl From<&MatchedSymbol> for SymbolDump {
    fn from(matched: &MatchedSymbol) -> Self {
        Self {
            tex: matched.tex.clone(),
            group: matched.group,
            first_column_pos: matched.split.first_column_pos,
            top_rows_cut: matched.split.top_rows_cut,
            bottom_rows_cut: matched.split.bottom_rows_cut,
            rows: matched.split.img.rows(),
            cols: matched.split.img.cols(),
        }
    }
}
