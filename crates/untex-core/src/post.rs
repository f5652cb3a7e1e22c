//! Post-matching corrections: baseline-driven glyph disambiguation and
//! spacing reconstruction from the pixel gaps between matched symbols.

use serde::{Deserialize, Serialize};

use crate::matcher::MatchedSymbol;
use crate::segment::horizontal_gap;

/// Glyphs whose bottom row sits on the text baseline (no descender).
/// Sorted by byte value for binary search.
const BASELINE_MARKING_SYMBOLS: &[&str] = &[
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "A", "B", "C", "D", "E", "F", "G", "H",
    "I", "J", "K", "L", "M", "N", "O", "P", "R", "S", "T", "U", "V", "W", "X", "Y", "Z",
    "\\Delta", "\\Gamma", "\\Lambda", "\\Omega", "\\Phi", "\\Pi", "\\Psi", "\\Sigma", "\\Theta",
    "\\Upsilon", "\\Xi", "\\alpha", "\\delta", "\\epsilon", "\\iota", "\\kappa", "\\lambda",
    "\\nu", "\\omega", "\\pi", "\\sigma", "\\tau", "\\theta", "\\upsilon", "\\varepsilon",
    "\\varpi", "\\vartheta", "a", "b", "c", "d", "e", "h", "i", "k", "l", "m", "n", "o", "r",
    "s", "t", "u", "v", "w", "x", "z",
];

/// Pixel-gap thresholds of the spacing rule table. The values are empirical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpacingConfig {
    /// Minimum clearance on both sides for `|`/`\|` to become `\mid`/`\parallel`.
    pub mid_rewrite_gap: i64,
    /// Gap between two text commands that becomes an in-command space.
    pub text_pair_gap: i64,
    /// Text next to alphanumerics: gap for `\quad`.
    pub text_quad_gap: i64,
    /// Text next to alphanumerics: gap for `\;`.
    pub text_thin_gap: i64,
    /// Alphanumeric next to a parenthesis: gap for `\quad`.
    pub paren_quad_gap: i64,
    /// Alphanumeric next to a parenthesis: gap for `\;`.
    pub paren_thin_gap: i64,
    /// Trailing comma with nothing recognisable after it: gap for `\quad`.
    pub comma_lone_quad_gap: i64,
    /// Trailing comma before an alphanumeric or `\ldots`: gap for `\quad`.
    pub comma_quad_gap: i64,
    /// Trailing comma before an alphanumeric or `\ldots`: gap for `\;`.
    pub comma_thin_gap: i64,
    /// Colon on either side: gap for `\quad`.
    pub colon_quad_gap: i64,
    /// Colon on either side: gap for `\;`.
    pub colon_thin_gap: i64,
    /// `\to` on either side: gap for `\quad`.
    pub arrow_quad_gap: i64,
    /// Two alphanumerics (not digit–digit): gap for `\;`.
    pub alnum_thin_gap: i64,
}

impl Default for SpacingConfig {
    fn default() -> Self {
        Self {
            mid_rewrite_gap: 6,
            text_pair_gap: 5,
            text_quad_gap: 15,
            text_thin_gap: 4,
            paren_quad_gap: 10,
            paren_thin_gap: 6,
            comma_lone_quad_gap: 20,
            comma_quad_gap: 14,
            comma_thin_gap: 8,
            colon_quad_gap: 20,
            colon_thin_gap: 10,
            arrow_quad_gap: 20,
            alnum_thin_gap: 6,
        }
    }
}

/// How far above the baseline a glyph's top may sit and still count as lying
/// on the baseline.
const BASELINE_SLACK_ROWS: i64 = 3;

/// Single-letter text commands the spacing pass can pad, with the space
/// character each uses inside its argument.
const TEXT_COMMANDS: [(&str, &str); 3] = [("\\mathbf", "~"), ("\\textrm", " "), ("\\texttt", " ")];

/// Re-decide period-vs-centered-dot style glyphs from the first matched
/// symbol known to sit on the baseline. Without such a symbol nothing moves.
pub fn correct_baseline(symbols: &mut [MatchedSymbol]) {
    let Some(baseline_row) = detect_baseline_row(symbols) else {
        return;
    };

    for symbol in symbols.iter_mut() {
        let on_baseline =
            symbol.split.top_rows_cut as i64 > baseline_row - BASELINE_SLACK_ROWS;
        let tex = &mut symbol.tex;
        if tex == "." || tex == "\\cdot" {
            *tex = if on_baseline { "." } else { "\\cdot" }.to_owned();
        } else if tex == "\\ldots" || tex == "\\cdots" {
            *tex = if on_baseline { "\\ldots" } else { "\\cdots" }.to_owned();
        }
    }
}

fn detect_baseline_row(symbols: &[MatchedSymbol]) -> Option<i64> {
    debug_assert!(BASELINE_MARKING_SYMBOLS.windows(2).all(|w| w[0] < w[1]));
    symbols
        .iter()
        .find(|s| {
            BASELINE_MARKING_SYMBOLS
                .binary_search(&s.tex.as_str())
                .is_ok()
        })
        .map(|s| s.split.top_rows_cut as i64 + s.split.img.rows() as i64 - 1)
}

/// Rewrite bar glyphs with clearance into relation bars and append explicit
/// spacing commands where the pixel gaps ask for them. First matching rule
/// wins per pair.
pub fn adjust_spacing(symbols: &mut [MatchedSymbol], config: &SpacingConfig) {
    if symbols.is_empty() {
        return;
    }

    let gaps: Vec<i64> = symbols
        .windows(2)
        .map(|pair| horizontal_gap(&pair[0].split, &pair[1].split))
        .collect();

    // A bar glyph free on both sides is a relation, not a delimiter.
    for (i, symbol) in symbols.iter_mut().enumerate() {
        let left = if i > 0 { gaps[i - 1] } else { 0 };
        let right = if i < gaps.len() { gaps[i] } else { 0 };
        let clearance = left.min(right);
        if clearance > config.mid_rewrite_gap {
            if symbol.tex == "|" {
                symbol.tex = "\\mid".to_owned();
            } else if symbol.tex == "\\|" {
                symbol.tex = "\\parallel".to_owned();
            }
        }
    }

    for i in 0..symbols.len() - 1 {
        if let Some(suffix) = pair_spacing_suffix(&symbols[i], &symbols[i + 1], gaps[i], config)
        {
            symbols[i].tex.push_str(&suffix);
        }
    }
}

fn pair_spacing_suffix(
    left: &MatchedSymbol,
    right: &MatchedSymbol,
    gap: i64,
    config: &SpacingConfig,
) -> Option<String> {
    let l_tex = &left.tex;
    let r_tex = &right.tex;

    // Adjacent single-letter text commands merge their gap into the command.
    let mut l_text = false;
    let mut r_text = false;
    for (command, pad) in TEXT_COMMANDS {
        let l_cmd = is_basic_command(command, l_tex);
        let r_cmd = is_basic_command(command, r_tex);
        if gap > config.text_pair_gap && l_cmd && r_cmd {
            return Some(format!("{}{{{}}}", command, pad));
        }
        l_text |= l_cmd;
        r_text |= r_cmd;
    }

    let alnum = |c: char| c.is_ascii_alphanumeric();
    let l_alnum = symbol_ends_with(l_tex, &alnum);
    let r_alnum = symbol_begins_with(r_tex, &alnum);

    if ((l_tex == ")" || l_tex == "!") && r_text) || (l_alnum && r_text) || (l_text && r_alnum) {
        if gap > config.text_quad_gap {
            return Some(" \\quad".to_owned());
        }
        if gap > config.text_thin_gap {
            return Some(" \\;".to_owned());
        }
    }

    if (l_alnum && r_tex.starts_with('(')) || (l_tex.ends_with(')') && r_alnum) {
        if gap > config.paren_quad_gap {
            return Some(" \\quad".to_owned());
        }
        if gap > config.paren_thin_gap {
            return Some(" \\;".to_owned());
        }
    }

    if l_tex.ends_with(',') && gap > config.comma_lone_quad_gap {
        return Some("\\quad".to_owned());
    }

    if l_tex.ends_with(',') && (r_alnum || r_tex == "\\ldots") {
        if gap > config.comma_quad_gap {
            return Some(" \\quad".to_owned());
        }
        if gap > config.comma_thin_gap {
            return Some(" \\;".to_owned());
        }
    }

    if l_tex.ends_with(':') || r_tex.starts_with(':') {
        if gap > config.colon_quad_gap {
            return Some(" \\quad".to_owned());
        }
        if gap > config.colon_thin_gap {
            return Some(" \\;".to_owned());
        }
    }

    if (l_tex == "\\to" || r_tex == "\\to") && gap > config.arrow_quad_gap {
        return Some(" \\quad".to_owned());
    }

    let digit = |c: char| c.is_ascii_digit();
    let l_digit = symbol_ends_with(l_tex, &digit);
    let r_digit = symbol_begins_with(r_tex, &digit);
    if l_alnum && r_alnum && !(l_digit && r_digit) && gap > config.alnum_thin_gap {
        return Some(" \\;".to_owned());
    }

    None
}

/// `tex` is exactly `command{X}` with a brace-free `X`.
fn is_basic_command(command: &str, tex: &str) -> bool {
    tex.strip_prefix(command)
        .and_then(|t| t.strip_prefix('{'))
        .and_then(|t| t.strip_suffix('}'))
        .is_some_and(|inner| !inner.contains(['{', '}']))
}

/// Does the visible front of the symbol satisfy `pred`, looking through
/// text-command wrappers?
fn symbol_begins_with(tex: &str, pred: &dyn Fn(char) -> bool) -> bool {
    let Some(first) = tex.chars().next() else {
        return false;
    };
    if pred(first) {
        return true;
    }

    for wrapper in ["\\textrm{", "\\mathbf{", "\\texttt{"] {
        if let Some(inner) = tex.strip_prefix(wrapper).and_then(|t| t.strip_suffix('}')) {
            if symbol_begins_with(inner, pred) {
                return true;
            }
        }
    }
    false
}

/// Does the visible tail of the symbol satisfy `pred`, looking through
/// text-command wrappers and index tails?
fn symbol_ends_with(tex: &str, pred: &dyn Fn(char) -> bool) -> bool {
    if tex.is_empty() {
        return false;
    }
    if tex.chars().all(pred) {
        return true;
    }

    const WRAPPERS: [(&str, &str); 7] = [
        ("\\textrm{", "}"),
        ("\\mathbf{", "}"),
        ("\\texttt{", "}"),
        ("{}_", ""),
        ("{}_{", "}"),
        ("{}^", ""),
        ("{}^{", "}"),
    ];
    for (prefix, suffix) in WRAPPERS {
        let stripped = tex
            .strip_prefix(prefix)
            .and_then(|t| t.strip_suffix(suffix));
        if let Some(inner) = stripped {
            if symbol_ends_with(inner, pred) {
                return true;
            }
        }
    }

    // A one-character base with an index: the tail is the index.
    let mut chars = tex.char_indices();
    if let (Some((_, base)), Some((offset, index_mark))) = (chars.next(), chars.next()) {
        if pred(base) && (index_mark == '_' || index_mark == '^') {
            return symbol_ends_with(&tex[offset + index_mark.len_utf8()..], pred);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchedSymbol;
    use crate::segment::SplitSymbol;
    use crate::test_util::bitmap;

    /// A matched symbol whose tight crop starts at `col`, spans `cols`
    /// columns and was trimmed by `top_cut` rows above and `bottom_cut`
    /// below.
    fn placed(tex: &str, col: usize, cols: usize, top_cut: usize, bottom_cut: usize) -> MatchedSymbol {
        let art = "#".repeat(cols);
        let rows: Vec<&str> = vec![art.as_str(); 5];
        MatchedSymbol {
            group: 0,
            split: SplitSymbol {
                img: bitmap(&rows),
                first_column_pos: col,
                top_rows_cut: top_cut,
                bottom_rows_cut: bottom_cut,
            },
            tex: tex.to_owned(),
        }
    }

    #[test]
    fn baseline_symbols_are_sorted_for_binary_search() {
        assert!(BASELINE_MARKING_SYMBOLS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn dot_on_the_baseline_stays_a_period() {
        // "x" sits at rows 2..7 so its baseline row is 6.
        let mut symbols = vec![
            placed("x", 0, 4, 2, 0),
            placed("\\cdot", 6, 2, 6, 0), // bottom-aligned: a period
            placed(".", 10, 2, 3, 3),     // mid-height: a centered dot
        ];
        correct_baseline(&mut symbols);
        assert_eq!(symbols[1].tex, ".");
        assert_eq!(symbols[2].tex, "\\cdot");
    }

    #[test]
    fn ldots_and_cdots_follow_the_same_rule() {
        let mut symbols = vec![
            placed("A", 0, 4, 2, 0),
            placed("\\cdots", 6, 6, 6, 0),
            placed("\\ldots", 14, 6, 3, 3),
        ];
        correct_baseline(&mut symbols);
        assert_eq!(symbols[1].tex, "\\ldots");
        assert_eq!(symbols[2].tex, "\\cdots");
    }

    #[test]
    fn without_a_baseline_witness_nothing_changes() {
        let mut symbols = vec![placed("+", 0, 3, 2, 2), placed(".", 5, 2, 3, 3)];
        correct_baseline(&mut symbols);
        assert_eq!(symbols[1].tex, ".");
    }

    #[test]
    fn bar_with_clearance_becomes_mid() {
        let config = SpacingConfig::default();
        let mut symbols = vec![
            placed("a", 0, 4, 0, 0),
            placed("|", 12, 1, 0, 0),
            placed("b", 21, 4, 0, 0),
        ];
        adjust_spacing(&mut symbols, &config);
        assert_eq!(symbols[1].tex, "\\mid");

        let mut tight = vec![
            placed("a", 0, 4, 0, 0),
            placed("|", 6, 1, 0, 0),
            placed("b", 9, 4, 0, 0),
        ];
        adjust_spacing(&mut tight, &config);
        assert_eq!(tight[1].tex, "|");
    }

    #[test]
    fn wide_alnum_gap_gets_a_thin_space() {
        let config = SpacingConfig::default();
        let mut symbols = vec![placed("a", 0, 4, 0, 0), placed("b", 12, 4, 0, 0)];
        adjust_spacing(&mut symbols, &config);
        assert_eq!(symbols[0].tex, "a \\;");

        // Digit–digit pairs never get the thin space.
        let mut digits = vec![placed("1", 0, 4, 0, 0), placed("2", 12, 4, 0, 0)];
        adjust_spacing(&mut digits, &config);
        assert_eq!(digits[0].tex, "1");
    }

    #[test]
    fn text_command_pairs_merge_their_gap() {
        let config = SpacingConfig::default();
        let mut symbols = vec![
            placed("\\textrm{a}", 0, 4, 0, 0),
            placed("\\textrm{b}", 10, 4, 0, 0),
        ];
        adjust_spacing(&mut symbols, &config);
        assert_eq!(symbols[0].tex, "\\textrm{a}\\textrm{ }");

        let mut bold = vec![
            placed("\\mathbf{a}", 0, 4, 0, 0),
            placed("\\mathbf{b}", 10, 4, 0, 0),
        ];
        adjust_spacing(&mut bold, &config);
        assert_eq!(bold[0].tex, "\\mathbf{a}\\mathbf{~}");
    }

    #[test]
    fn comma_spacing_uses_the_raw_gap() {
        let config = SpacingConfig::default();
        let mut symbols = vec![placed(",", 0, 2, 0, 0), placed("x", 17, 4, 0, 0)];
        adjust_spacing(&mut symbols, &config);
        assert_eq!(symbols[0].tex, ", \\quad");

        let mut nearer = vec![placed(",", 0, 2, 0, 0), placed("x", 12, 4, 0, 0)];
        adjust_spacing(&mut nearer, &config);
        assert_eq!(nearer[0].tex, ", \\;");
    }

    #[test]
    fn ends_with_sees_through_wrappers_and_indices() {
        let alnum = |c: char| c.is_ascii_alphanumeric();
        assert!(symbol_ends_with("x", &alnum));
        assert!(symbol_ends_with("\\textrm{abc}", &alnum));
        assert!(symbol_ends_with("{}_2", &alnum));
        assert!(symbol_ends_with("{}^{12}", &alnum));
        assert!(symbol_ends_with("x_2", &alnum));
        assert!(!symbol_ends_with("\\alpha", &alnum));
        assert!(!symbol_ends_with("", &alnum));

        let digit = |c: char| c.is_ascii_digit();
        assert!(symbol_ends_with("x_2", &digit));
        assert!(!symbol_ends_with("x", &digit));
    }

    #[test]
    fn begins_with_sees_through_wrappers() {
        let alnum = |c: char| c.is_ascii_alphanumeric();
        assert!(symbol_begins_with("a", &alnum));
        assert!(symbol_begins_with("\\texttt{q}", &alnum));
        assert!(!symbol_begins_with("\\alpha", &alnum));
        assert!(!symbol_begins_with("", &alnum));
    }
}
