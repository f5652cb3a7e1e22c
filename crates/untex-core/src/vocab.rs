//! Built-in vocabulary rendered into the generated symbol database.

use crate::db::INDEX_PREFIX;
use crate::matrix::{Bitmap, Matrix};

pub const GREEK_LETTERS: &[&str] = &[
    "\\alpha", "\\nu", "\\beta", "\\Xi", "\\xi", "\\Gamma", "\\gamma", "\\Delta", "\\delta",
    "\\Pi", "\\pi", "\\varpi", "\\epsilon", "\\varepsilon", "\\rho", "\\varrho", "\\zeta",
    "\\Sigma", "\\sigma", "\\varsigma", "\\eta", "\\tau", "\\Theta", "\\theta", "\\vartheta",
    "\\Upsilon", "\\upsilon", "\\iota", "\\Phi", "\\phi", "\\varphi", "\\kappa", "\\chi",
    "\\Lambda", "\\lambda", "\\Psi", "\\psi", "\\mu", "\\Omega", "\\omega",
];

pub const SMALL_LATIN: &[&str] = &[
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
    "s", "t", "u", "v", "w", "x", "y", "z",
];

pub const BIG_LATIN: &[&str] = &[
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
    "S", "T", "U", "V", "W", "X", "Y", "Z",
];

pub const DIGITS: &[&str] = &["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];

/// Relations, binary operators, delimiters, arrows and named functions that
/// render as a single glyph cluster.
pub const OPERATORS: &[&str] = &[
    "+", "-", "\\neg", "!", "\\#", ">", "<", "\\%", "\\doteq", "\\equiv", "\\approx", "\\cong",
    "\\simeq", "\\sim", "\\propto", "\\neq", "\\ne", "\\leq", "\\geq", "\\prec", "\\succ",
    "\\preceq", "\\succeq", "\\ll", "\\gg", "\\subset", "\\supset", "\\not\\supset",
    "\\not\\subset", "\\subseteq", "\\supseteq", "\\sqsubseteq", "\\sqsupseteq", "\\|",
    "\\parallel", "\\asymp", "\\bowtie", "\\vdash", "\\dashv", "\\in", "\\ni", "\\smile",
    "\\frown", "\\models", "\\notin", "\\perp", "\\pm", "\\cap", "\\diamond", "\\oplus",
    "\\mp", "\\cup", "\\bigtriangleup", "\\ominus", "\\times", "\\uplus", "\\bigtriangledown",
    "\\otimes", "\\div", "\\sqcap", "\\triangleleft", "\\oslash", "\\ast", "\\sqcup",
    "\\triangleright", "\\odot", "\\star", "\\vee", "\\bigcirc", "\\circ", "\\dagger",
    "\\wedge", "\\bullet", "\\setminus", "\\ddagger", "\\wr", "\\amalg", "\\exists",
    "\\not\\exists", "\\forall", "\\lor", "\\land", "\\Longrightarrow", "\\Rightarrow",
    "\\Longleftarrow", "\\Leftarrow", "\\iff", "\\Leftrightarrow", "\\top", "\\bot",
    "\\emptyset", "\\O", "\\not\\perp", "\\angle", "\\triangle", "\\{", "\\}", "(", ")",
    "\\lceil", "\\rceil", "/", "\\backslash", "[", "]", "\\langle", "\\rangle", "\\lfloor",
    "\\rfloor", "\\rightarrow", "\\to", "\\longrightarrow", "\\mapsto", "\\longmapsto",
    "\\leftarrow", "\\gets", "\\longleftarrow", "\\uparrow", "\\Uparrow", "\\downarrow",
    "\\Downarrow", "\\updownarrow", "\\Updownarrow", "\\partial", "\\imath", "\\Re",
    "\\nabla", "\\jmath", "\\Im", "\\hbar", "\\ell", "\\wp", "\\infty", "\\aleph", "\\sin",
    "\\arcsin", "\\csc", "\\cos", "\\arccos", "\\sec", "\\tan", "\\arctan", "\\cot", "\\sinh",
    "\\cosh", "\\tanh", "\\coth",
];

/// Wrap multi-character markup in braces so it can follow `_` or `^`.
fn brace_for_index(tex: &str) -> String {
    if tex.chars().count() == 1 {
        tex.to_owned()
    } else {
        format!("{{{}}}", tex)
    }
}

/// Every markup string the generator renders, in producer order.
pub fn generation_jobs() -> Vec<String> {
    let letter_groups: [&[&str]; 3] = [GREEK_LETTERS, SMALL_LATIN, BIG_LATIN];
    let all_groups: [&[&str]; 5] = [GREEK_LETTERS, SMALL_LATIN, BIG_LATIN, DIGITS, OPERATORS];

    let mut jobs = Vec::new();

    for group in all_groups {
        for &symbol in group {
            jobs.push(symbol.to_owned());
        }
    }

    for group in letter_groups {
        for &letter in group {
            jobs.push(format!("{}'", letter));
        }
    }

    for group in [SMALL_LATIN, BIG_LATIN] {
        for &letter in group {
            jobs.push(format!("\\textrm{{{}}}", letter));
            jobs.push(format!("\\texttt{{{}}}", letter));
        }
    }

    for &d1 in DIGITS {
        for &d2 in DIGITS {
            jobs.push(format!("{}^{}", d1, d2));
        }
    }

    for &letter in SMALL_LATIN {
        for &digit in DIGITS {
            jobs.push(format!("{}_{}", letter, digit));
        }
    }

    for group in all_groups {
        for &symbol in group {
            jobs.push(format!("{}{}", INDEX_PREFIX, brace_for_index(symbol)));
        }
    }

    jobs
}

/// Hand-crafted entries inserted before rendering starts: two widths of the
/// equals sign and the 2×2 block the baseline pass later re-tags as `.` or
/// `\cdot` per query.
pub fn seed_symbols() -> Vec<(Bitmap, &'static str)> {
    vec![
        (equals_bitmap(8), "="),
        (equals_bitmap(12), "="),
        (filled_bitmap(2, 2), "."),
    ]
}

fn equals_bitmap(width: usize) -> Bitmap {
    let mut img = Matrix::new(3, width);
    for c in 0..width {
        img[(0, c)] = 1;
        img[(2, c)] = 1;
    }
    img
}

fn filled_bitmap(rows: usize, cols: usize) -> Bitmap {
    let mut img: Bitmap = Matrix::new(rows, cols);
    img.fill(1);
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SymbolKind;

    #[test]
    fn jobs_cover_every_vocabulary_family() {
        let jobs = generation_jobs();

        assert!(jobs.iter().any(|j| j == "\\alpha"));
        assert!(jobs.iter().any(|j| j == "Q"));
        assert!(jobs.iter().any(|j| j == "\\longmapsto"));
        assert!(jobs.iter().any(|j| j == "x'"));
        assert!(jobs.iter().any(|j| j == "\\Omega'"));
        assert!(jobs.iter().any(|j| j == "\\textrm{k}"));
        assert!(jobs.iter().any(|j| j == "\\texttt{K}"));
        assert!(jobs.iter().any(|j| j == "3^7"));
        assert!(jobs.iter().any(|j| j == "x_0"));
    }

    #[test]
    fn index_jobs_brace_only_multi_character_markup() {
        let jobs = generation_jobs();
        assert!(jobs.iter().any(|j| j == "{}_x"));
        assert!(jobs.iter().any(|j| j == "{}_7"));
        assert!(jobs.iter().any(|j| j == "{}_{\\alpha}"));
        assert!(jobs.iter().any(|j| j == "{}_{\\leq}"));
        assert!(!jobs.iter().any(|j| j == "{}_{x}"));

        for job in &jobs {
            if let SymbolKind::Index = SymbolKind::classify(job) {
                let index = &job[3..];
                assert!(
                    index.chars().count() == 1 || (index.starts_with('{') && index.ends_with('}')),
                    "malformed index job {job}"
                );
            }
        }
    }

    #[test]
    fn jobs_are_unique() {
        let jobs = generation_jobs();
        let mut deduped = jobs.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), jobs.len());
    }

    #[test]
    fn seeds_are_tight_bitmaps() {
        for (img, tex) in seed_symbols() {
            assert!(!tex.is_empty());
            assert!(img.row(0).iter().any(|&px| px != 0));
            assert!(img.row(img.rows() - 1).iter().any(|&px| px != 0));
        }
    }
}
