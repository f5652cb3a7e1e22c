//! Reference symbol database: bitmaps tagged with their markup.
//!
//! Two files are consulted at startup when present: the generated database
//! (rebuilt wholesale by the `gen` pipeline) and the manual database
//! (appended to by `learn`). Both use the same line-oriented record format,
//! so files can be concatenated freely:
//!
//! ```text
//! <tex_len> <tex_bytes> <rows> <cols> <hexnibbles>\n
//! ```
//!
//! `<tex_bytes>` is copied verbatim (it may contain spaces and backslashes);
//! `<hexnibbles>` packs the row-major pixel stream four pixels per nibble,
//! least significant bit first, padded to a whole nibble.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::matrix::{Bitmap, Matrix};
use crate::stats::NeighborStats;

/// Markup prefix that marks a reference entry as a generic index glyph.
pub const INDEX_PREFIX: &str = "{}_";

/// Database rebuilt by `gen` from the built-in vocabulary.
pub const GENERATED_DB_FILE: &str = "generated_symbols.db";

/// Database of user-taught symbols, appended to by `learn`.
pub const MANUAL_DB_FILE: &str = "manual_symbols.db";

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Whether a reference entry is a generic index bitmap (usable as either
/// sub- or superscript depending on the query's vertical position) or an
/// ordinary glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Index,
    Other,
}

impl SymbolKind {
    pub fn classify(tex: &str) -> Self {
        if tex.starts_with(INDEX_PREFIX) {
            Self::Index
        } else {
            Self::Other
        }
    }
}

/// One reference entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub img: Bitmap,
    pub tex: String,
    pub kind: SymbolKind,
}

/// Insertion-ordered collection of reference symbols plus the neighbourhood
/// statistics accumulated over their pixels.
///
/// A bitmap appears at most once: additions equal to an existing bitmap are
/// silently dropped.
#[derive(Debug, Default, PartialEq)]
pub struct SymbolDatabase {
    symbols: Vec<Symbol>,
    stats: NeighborStats,
}

impl SymbolDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn stats(&self) -> &NeighborStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
        self.stats.reset();
    }

    fn contains_bitmap(&self, img: &Bitmap) -> bool {
        self.symbols.iter().any(|symbol| symbol.img == *img)
    }

    /// Add a symbol, updating the statistics. Returns false (and changes
    /// nothing) when an equal bitmap is already present.
    pub fn add(&mut self, img: Bitmap, tex: &str) -> bool {
        if self.contains_bitmap(&img) {
            return false;
        }

        self.stats.record(&img);
        self.symbols.push(Symbol {
            kind: SymbolKind::classify(tex),
            tex: tex.to_owned(),
            img,
        });
        true
    }

    /// Add a symbol and append its record to `path` (created when missing).
    /// A duplicate bitmap leaves both the database and the file untouched.
    pub fn add_and_append(&mut self, img: Bitmap, tex: &str, path: &Path) -> Result<bool> {
        if self.contains_bitmap(&img) {
            return Ok(false);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io(format!("open {} for append", path.display()), e))?;
        let mut writer = BufWriter::new(file);
        write_record(&mut writer, &img, tex)
            .and_then(|_| writer.flush())
            .map_err(|e| Error::io(format!("append to {}", path.display()), e))?;

        self.add(img, tex);
        Ok(true)
    }

    /// Load every record of a database file, in order.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        File::open(path)
            .and_then(|mut file| file.read_to_end(&mut buf))
            .map_err(|e| Error::io(format!("read {}", path.display()), e))?;

        let mut reader = RecordReader { buf: &buf, pos: 0 };
        while !reader.at_end() {
            let (img, tex) = reader.read_record()?;
            self.add(img, &tex);
        }
        Ok(())
    }

    /// Truncate `path` and write out every symbol.
    pub fn save_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| Error::io(format!("create {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);
        for symbol in &self.symbols {
            write_record(&mut writer, &symbol.img, &symbol.tex)
                .map_err(|e| Error::io(format!("write {}", path.display()), e))?;
        }
        writer
            .flush()
            .map_err(|e| Error::io(format!("write {}", path.display()), e))
    }
}

fn write_record(writer: &mut impl Write, img: &Bitmap, tex: &str) -> std::io::Result<()> {
    write!(
        writer,
        "{} {} {} {} ",
        tex.len(),
        tex,
        img.rows(),
        img.cols()
    )?;

    let mut nibble = 0u8;
    let mut bits = 0;
    for &px in img.iter() {
        nibble |= px << bits;
        bits += 1;
        if bits == 4 {
            writer.write_all(&[HEX_DIGITS[nibble as usize]])?;
            nibble = 0;
            bits = 0;
        }
    }
    if bits > 0 {
        writer.write_all(&[HEX_DIGITS[nibble as usize]])?;
    }

    writer.write_all(b"\n")
}

struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl RecordReader<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_usize(&mut self, what: &str) -> Result<usize> {
        let beg = self.pos;
        while self.pos < self.buf.len() && self.buf[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        std::str::from_utf8(&self.buf[beg..self.pos])
            .ok()
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| Error::parse(format!("invalid {} in symbol record", what)))
    }

    fn expect_byte(&mut self, byte: u8, what: &str) -> Result<()> {
        if self.pos < self.buf.len() && self.buf[self.pos] == byte {
            self.pos += 1;
            Ok(())
        } else {
            Err(Error::parse(format!("expected {} in symbol record", what)))
        }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&[u8]> {
        if self.pos + len > self.buf.len() {
            return Err(Error::parse(format!("short read of {}", what)));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_record(&mut self) -> Result<(Bitmap, String)> {
        let tex_len = self.read_usize("markup length")?;
        self.expect_byte(b' ', "space after markup length")?;
        let tex = String::from_utf8(self.take(tex_len, "markup")?.to_vec())
            .map_err(|_| Error::parse("symbol markup is not valid UTF-8"))?;
        self.expect_byte(b' ', "space after markup")?;
        let rows = self.read_usize("row count")?;
        self.expect_byte(b' ', "space after row count")?;
        let cols = self.read_usize("column count")?;
        self.expect_byte(b' ', "space after column count")?;

        let nibbles = self.take((rows * cols + 3) / 4, "pixel data")?;
        let mut img = Matrix::new(rows, cols);
        for k in 0..rows * cols {
            let hex = nibbles[k >> 2];
            let value = match hex {
                b'0'..=b'9' => hex - b'0',
                b'a'..=b'f' => hex - b'a' + 10,
                _ => return Err(Error::parse("illegal pixel nibble in symbol record")),
            };
            img[(k / cols, k % cols)] = (value >> (k & 3)) & 1;
        }

        self.expect_byte(b'\n', "record terminator")?;
        Ok((img, tex))
    }
}

// ── Text-encoded bitmaps ───────────────────────────────────────────────────

/// Parse a `{' ', '#'}` character grid (used by `learn` and the failure
/// candidate dumps). A trailing newline is optional; every row must have the
/// same width.
pub fn bitmap_from_text(text: &str) -> Result<Bitmap> {
    let text = text.strip_suffix('\n').unwrap_or(text);
    let lines: Vec<&str> = text.split('\n').collect();
    let rows = lines.len();
    let cols = lines[0].len();

    let mut img = Matrix::new(rows, cols);
    for (r, line) in lines.iter().enumerate() {
        if line.len() != cols {
            return Err(Error::parse("text bitmap rows differ in width"));
        }
        for (c, byte) in line.bytes().enumerate() {
            img[(r, c)] = match byte {
                b'#' => 1,
                b' ' => 0,
                _ => return Err(Error::parse("text bitmap may contain only ' ' and '#'")),
            };
        }
    }
    Ok(img)
}

/// Render a bitmap as a `{' ', '#'}` grid, one line per row, each terminated
/// by a newline.
pub fn bitmap_to_text(img: &Bitmap) -> String {
    let mut out = String::with_capacity(img.rows() * (img.cols() + 1));
    for r in 0..img.rows() {
        for &px in img.row(r) {
            out.push(if px != 0 { '#' } else { ' ' });
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::bitmap;

    fn sample_db() -> SymbolDatabase {
        let mut db = SymbolDatabase::new();
        db.add(bitmap(&["##", "##"]), ".");
        db.add(
            bitmap(&["# #", " # ", "# #"]),
            "\\times",
        );
        db.add(bitmap(&[" # ", "###", " # "]), "{}_+");
        db
    }

    #[test]
    fn kind_follows_the_index_prefix() {
        assert_eq!(SymbolKind::classify("{}_x"), SymbolKind::Index);
        assert_eq!(SymbolKind::classify("{}_{10}"), SymbolKind::Index);
        assert_eq!(SymbolKind::classify("x"), SymbolKind::Other);
        assert_eq!(SymbolKind::classify("{}^x"), SymbolKind::Other);

        let db = sample_db();
        for symbol in db.symbols() {
            assert_eq!(
                symbol.kind == SymbolKind::Index,
                symbol.tex.starts_with(INDEX_PREFIX)
            );
        }
    }

    #[test]
    fn duplicate_bitmaps_are_dropped_silently() {
        let mut db = SymbolDatabase::new();
        assert!(db.add(bitmap(&["##"]), "-"));
        assert!(!db.add(bitmap(&["##"]), "\\minus"));
        assert_eq!(db.len(), 1);
        assert_eq!(db.symbols()[0].tex, "-");

        // A different shape with the same markup is a separate entry.
        assert!(db.add(bitmap(&["###"]), "-"));
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn save_and_load_roundtrip_preserves_everything() {
        let db = sample_db();
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("symbols.db");
        db.save_file(&path).expect("save");

        let mut reloaded = SymbolDatabase::new();
        reloaded.load_file(&path).expect("load");
        // Bitmaps, markup, kinds and the statistics counters all match.
        assert_eq!(db, reloaded);
    }

    #[test]
    fn files_are_concatenation_mergeable() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let first = dir.path().join("a.db");
        let second = dir.path().join("b.db");

        let mut db_a = SymbolDatabase::new();
        db_a.add(bitmap(&["#"]), "x");
        db_a.save_file(&first).expect("save");

        let mut db_b = SymbolDatabase::new();
        db_b.add(bitmap(&["##"]), "y");
        db_b.save_file(&second).expect("save");

        let mut merged = SymbolDatabase::new();
        merged.load_file(&first).expect("load");
        merged.load_file(&second).expect("load");
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.symbols()[0].tex, "x");
        assert_eq!(merged.symbols()[1].tex, "y");
    }

    #[test]
    fn markup_with_spaces_and_backslashes_survives() {
        let mut db = SymbolDatabase::new();
        db.add(bitmap(&["#  #"]), "\\not \\subset");

        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("symbols.db");
        db.save_file(&path).expect("save");

        let mut reloaded = SymbolDatabase::new();
        reloaded.load_file(&path).expect("load");
        assert_eq!(reloaded.symbols()[0].tex, "\\not \\subset");
    }

    #[test]
    fn append_skips_duplicates_and_extends_the_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("manual.db");

        let mut db = SymbolDatabase::new();
        assert!(db.add_and_append(bitmap(&["#"]), "a", &path).expect("append"));
        assert!(!db.add_and_append(bitmap(&["#"]), "b", &path).expect("append"));
        assert!(db.add_and_append(bitmap(&["##"]), "c", &path).expect("append"));

        let mut reloaded = SymbolDatabase::new();
        reloaded.load_file(&path).expect("load");
        assert_eq!(reloaded.len(), 2);
        assert_eq!(db, reloaded);
    }

    #[test]
    fn roundtrip_survives_arbitrary_shapes() {
        use rand::prelude::*;

        let mut rng = StdRng::seed_from_u64(7);
        let mut db = SymbolDatabase::new();
        for i in 0..40 {
            let rows = rng.gen_range(1..12);
            let cols = rng.gen_range(1..12);
            let mut img: Bitmap = Matrix::new(rows, cols);
            for r in 0..rows {
                for c in 0..cols {
                    img[(r, c)] = u8::from(rng.gen_bool(0.5));
                }
            }
            db.add(img, &format!("s{}", i));
        }

        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("random.db");
        db.save_file(&path).expect("save");

        let mut reloaded = SymbolDatabase::new();
        reloaded.load_file(&path).expect("load");
        assert_eq!(db, reloaded);
    }

    #[test]
    fn malformed_records_are_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");

        for (name, content) in [
            ("truncated-header", "3 ab"),
            ("bad-nibble", "1 x 1 4 z\n"),
            ("missing-newline", "1 x 1 4 f"),
            ("short-pixels", "1 x 2 4 f\n"),
        ] {
            let path = dir.path().join(name);
            std::fs::write(&path, content).expect("write");
            let mut db = SymbolDatabase::new();
            assert!(
                matches!(db.load_file(&path), Err(crate::Error::Parse(_))),
                "{} should fail to parse",
                name
            );
        }
    }

    #[test]
    fn text_bitmap_roundtrip() {
        let img = bitmap(&[" # ", "###", "# #"]);
        let text = bitmap_to_text(&img);
        assert_eq!(text, " # \n###\n# #\n");
        assert_eq!(bitmap_from_text(&text).expect("parse"), img);
        // Trailing newline is optional when parsing.
        assert_eq!(bitmap_from_text(text.trim_end()).expect("parse"), img);
    }

    #[test]
    fn text_bitmap_rejects_garbage() {
        assert!(bitmap_from_text("#.\n##").is_err());
        assert!(bitmap_from_text("##\n#").is_err());
    }
}
