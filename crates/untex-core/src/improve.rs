//! Markup improver: re-parses the matcher's space-separated token stream and
//! re-emits it with indices attached to their bases, identical commands
//! merged, redundant spaces dropped and long digit runs grouped.
//!
//! The improver is idempotent on its own output, so it can safely run over
//! markup that has already been improved.

/// Rewrite every index operator (`{}_`, `{}^`, bare `_`/`^`) into a
/// space-prefixed bare operator, so the parser sees one uniform shape.
fn separate_indices(tex: &str) -> String {
    let bytes = tex.as_bytes();
    let mut out = String::with_capacity(tex.len() + 8);
    let mut i = 0;
    while i < bytes.len() {
        let rest = &bytes[i..];
        if rest.starts_with(b"{}_") || rest.starts_with(b"{}^") {
            out.push(' ');
            out.push(bytes[i + 2] as char);
            i += 3;
        } else if bytes[i] == b'_' || bytes[i] == b'^' {
            out.push(' ');
            out.push(bytes[i] as char);
            i += 1;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}

/// One parsed markup atom: a base symbol, its command arguments and the
/// indices attached to it.
#[derive(Debug, Default, Clone)]
struct Atom {
    symbol: String,
    arguments: Vec<String>,
    top_index: String,
    bottom_index: String,
}

impl Atom {
    fn plain(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    fn has_index(&self) -> bool {
        !self.top_index.is_empty() || !self.bottom_index.is_empty()
    }

    fn to_tex(&self) -> String {
        let mut out = self.symbol.clone();
        if out.is_empty() && self.has_index() {
            out.push_str("{}");
        }

        for argument in &self.arguments {
            out.push('{');
            out.push_str(argument);
            out.push('}');
        }

        let append_index = |out: &mut String, index: &str| {
            if index.chars().count() == 1 {
                out.push_str(index);
            } else {
                out.push('{');
                out.push_str(index);
                out.push('}');
            }
        };

        if !self.bottom_index.is_empty() {
            out.push('_');
            append_index(&mut out, &self.bottom_index);
        }
        if !self.top_index.is_empty() {
            out.push('^');
            append_index(&mut out, &self.top_index);
        }
        out
    }
}

/// Commands whose argument keeps its whitespace verbatim.
const VERBATIM_ARG_COMMANDS: [&str; 3] = ["\\textrm", "\\mathbf", "\\texttt"];

struct Parser {
    text: Vec<char>,
    matching_brace: Vec<Option<usize>>,
}

impl Parser {
    fn new(tex: &str) -> Self {
        let text: Vec<char> = separate_indices(tex).chars().collect();

        let mut matching_brace = vec![None; text.len()];
        let mut stack = Vec::new();
        for (i, &c) in text.iter().enumerate() {
            if c == '{' {
                stack.push(i);
            } else if c == '}' {
                if let Some(j) = stack.pop() {
                    matching_brace[i] = Some(j);
                    matching_brace[j] = Some(i);
                }
            }
        }

        Self {
            text,
            matching_brace,
        }
    }

    fn parse(&self) -> String {
        self.parse_range(0, self.text.len(), true)
    }

    fn parse_range(&self, beg: usize, end: usize, ignore_blanks: bool) -> String {
        let mut atoms: Vec<Atom> = Vec::new();
        let mut top_count = 0usize;
        let mut bottom_count = 0usize;

        let mut pos = beg;
        while pos < end {
            let c = self.text[pos];
            if ignore_blanks && c.is_ascii_whitespace() {
                pos += 1;
                continue;
            }

            // Indices accumulate on the preceding atom; several in a row are
            // joined and re-parsed when the atom is finished.
            if c == '_' || c == '^' {
                pos += 1;
                let (index_atom, next) = self.parse_atom(pos, end);
                pos = next;

                if atoms.is_empty() {
                    atoms.push(Atom::default());
                }
                let last = atoms.len() - 1;
                let (index_tex, count) = if c == '_' {
                    (&mut atoms[last].bottom_index, &mut bottom_count)
                } else {
                    (&mut atoms[last].top_index, &mut top_count)
                };
                if !index_tex.is_empty() {
                    index_tex.push(' ');
                }
                index_tex.push_str(&index_atom.to_tex());
                *count += 1;
                continue;
            }

            finish_atom(&mut atoms, &mut top_count, &mut bottom_count);
            let (atom, next) = self.parse_atom(pos, end);
            pos = next;
            atoms.push(atom);
        }
        finish_atom(&mut atoms, &mut top_count, &mut bottom_count);

        emit(&atoms)
    }

    /// Parse one primitive atom starting at `pos` (< `end`): a braced group,
    /// a control sequence with its arguments, or a single character.
    fn parse_atom(&self, pos: usize, end: usize) -> (Atom, usize) {
        let mut pos = pos;
        if pos >= end {
            return (Atom::plain(" "), pos);
        }

        let c = self.text[pos];
        pos += 1;

        if c == '{' {
            if let Some(close) = self.matching_brace[pos - 1] {
                let inner = self.parse_range(pos, close, true);
                return (Atom::plain(inner), close + 1);
            }
            return (Atom::plain("{"), pos);
        }

        if c == '\\' {
            let next = if pos < end { self.text[pos] } else { ' ' };
            if !next.is_ascii_alphabetic() {
                if pos < end {
                    pos += 1;
                }
                return (Atom::plain(format!("\\{}", next)), pos);
            }

            let mut name = String::from("\\");
            while pos < end && self.text[pos].is_ascii_alphabetic() {
                name.push(self.text[pos]);
                pos += 1;
            }

            let collapse_arg_blanks = !VERBATIM_ARG_COMMANDS.contains(&name.as_str());
            let mut atom = Atom::plain(name);
            while pos < end && self.text[pos] == '{' {
                let Some(close) = self.matching_brace[pos] else {
                    break;
                };
                atom.arguments
                    .push(self.parse_range(pos + 1, close, collapse_arg_blanks));
                pos = close + 1;
            }
            return (atom, pos);
        }

        (Atom::plain(c.to_string()), pos)
    }
}

/// Seal the trailing atom: re-parse concatenated indices (`a_1 {}_0` has
/// collected the bottom index `"1 0"`, which re-parses to `"10"`) and merge
/// it into an identical index-free single-argument command before it.
fn finish_atom(atoms: &mut Vec<Atom>, top_count: &mut usize, bottom_count: &mut usize) {
    if let Some(atom) = atoms.last_mut() {
        if *top_count > 1 {
            atom.top_index = Parser::new(&atom.top_index).parse();
        }
        if *bottom_count > 1 {
            atom.bottom_index = Parser::new(&atom.bottom_index).parse();
        }
    }
    *top_count = 0;
    *bottom_count = 0;

    if atoms.len() < 2 {
        return;
    }
    let previous = &atoms[atoms.len() - 2];
    let current = &atoms[atoms.len() - 1];
    let mergeable = !previous.has_index()
        && previous.symbol == current.symbol
        && previous.arguments.len() == 1
        && current.arguments.len() == 1;
    if !mergeable {
        return;
    }

    if let Some(current) = atoms.pop() {
        if let Some(previous) = atoms.last_mut() {
            previous.arguments[0].push_str(&current.arguments[0]);
            previous.top_index = current.top_index;
            previous.bottom_index = current.bottom_index;
        }
    }
}

/// A separator between atoms is kept only where dropping it would change the
/// markup's meaning: a control word directly followed by a letter would
/// swallow it. Everything else glues together — adjacent alphanumerics,
/// punctuation after its operand, brackets against their contents, `:`
/// against `=`, digits across a decimal point.
fn separator_needed(previous: &str, next: &str) -> bool {
    if !next.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return false;
    }

    let word_len = previous
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_alphabetic())
        .count();
    word_len > 0 && previous[..previous.len() - word_len].ends_with('\\')
}

fn emit(atoms: &[Atom]) -> String {
    let mut out = String::new();
    for atom in atoms {
        let piece = atom.to_tex();
        if !out.is_empty() && separator_needed(&out, &piece) {
            out.push(' ');
        }
        out.push_str(&piece);
    }
    out
}

/// Group every digit run of four or more into 3-digit groups separated by
/// `\,`. Grouping counts from the right, unless the run directly follows a
/// decimal point: then it counts from the left and only for runs of five or
/// more. `1234.56789` becomes `1\,234.567\,89`.
fn space_digit_triads(tex: &str) -> String {
    let bytes = tex.as_bytes();
    let mut out = String::with_capacity(tex.len());

    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            out.push(bytes[i] as char);
            i += 1;
            continue;
        }

        let beg = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        group_digit_run(&mut out, bytes, beg, i);
    }
    out
}

fn group_digit_run(out: &mut String, bytes: &[u8], beg: usize, end: usize) {
    let push_all = |out: &mut String| {
        for &b in &bytes[beg..end] {
            out.push(b as char);
        }
    };

    if end - beg < 4 {
        push_all(out);
        return;
    }

    let left_bound = if beg == 0 { b' ' } else { bytes[beg - 1] };
    let right_bound = if end == bytes.len() { b' ' } else { bytes[end] };

    // Position (mod 3) that takes a separator in front; from the right
    // normally, from the left after a decimal point.
    let separated_mod = if right_bound == b'.' || left_bound != b'.' {
        end % 3
    } else if end - beg < 5 {
        push_all(out);
        return;
    } else {
        beg % 3
    };

    out.push(bytes[beg] as char);
    for p in beg + 1..end {
        if p % 3 == separated_mod {
            out.push_str("\\,");
        }
        out.push(bytes[p] as char);
    }
}

/// Re-parse and re-emit a space-separated markup token string with indices
/// attached, commands merged, spacing normalised and digit triads grouped.
pub fn improve_tex(tex: &str) -> String {
    space_digit_triads(&Parser::new(tex).parse())
}
