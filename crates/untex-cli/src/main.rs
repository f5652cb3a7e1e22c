//! untex CLI — formula-image → LaTeX recovery and database maintenance.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use untex_core::db::{bitmap_from_text, bitmap_to_text};
use untex_core::{
    generate, imgio, render, MatcherConfig, SpacingConfig, SymbolDatabase, UntexOutcome,
    GENERATED_DB_FILE, MANUAL_DB_FILE,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "untex")]
#[command(about = "Recover LaTeX markup from rendered formula images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dissimilarity of two PNG images compared as whole symbols.
    Compare {
        /// First image.
        png1: PathBuf,
        /// Second image.
        png2: PathBuf,
    },

    /// Regenerate the symbol database from the built-in vocabulary.
    ///
    /// Requires `latex`, `dvips` and `pstoimg` on the PATH.
    Gen,

    /// Teach a symbol: a text-art bitmap (' '/'#' rows) from the given file,
    /// its markup from stdin.
    Learn {
        /// File holding the text-encoded bitmap.
        symbol_file: PathBuf,
    },

    /// Render markup read from stdin to a PNG file.
    Tex {
        /// Output image path.
        out_png: PathBuf,
    },

    /// Recover the markup of a rendered formula image.
    ///
    /// Prints the markup on success. On a recognition dead-end, writes each
    /// unmatched candidate to `symbol_<i>` as a text-art bitmap (ready for
    /// `learn`) and exits with status 1.
    Untex {
        /// Input image.
        png: PathBuf,

        /// Write a JSON dump of the matched segmentation.
        #[arg(long)]
        dump_debug: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compare { png1, png2 } => run_compare(&png1, &png2),
        Commands::Gen => run_gen(),
        Commands::Learn { symbol_file } => run_learn(&symbol_file),
        Commands::Tex { out_png } => run_tex(&out_png),
        Commands::Untex { png, dump_debug } => run_untex(&png, dump_debug.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

/// Load whichever database files exist; `require_generated` turns a missing
/// generated database into an error.
fn load_databases(require_generated: bool) -> CliResult<SymbolDatabase> {
    let mut db = SymbolDatabase::new();

    let generated = Path::new(GENERATED_DB_FILE);
    if generated.exists() {
        db.load_file(generated)?;
    } else if require_generated {
        return Err(format!(
            "{} does not exist; run `untex gen` first",
            GENERATED_DB_FILE
        )
        .into());
    }

    let manual = Path::new(MANUAL_DB_FILE);
    if manual.exists() {
        db.load_file(manual)?;
    }

    tracing::debug!("loaded {} symbols", db.len());
    Ok(db)
}

fn read_stdin() -> CliResult<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

// ── compare ────────────────────────────────────────────────────────────────

fn run_compare(png1: &Path, png2: &Path) -> CliResult<ExitCode> {
    let first = imgio::load_bitmap(png1)?;
    let second = imgio::load_bitmap(png2)?;

    // The statistics of whatever databases exist weight the diff; with no
    // database the metric degrades to its smoothed default weights.
    let db = load_databases(false)?;
    let diff = db
        .stats()
        .img_diff(&first.view(), &second.view(), f64::INFINITY);
    println!("{:.6}", diff);

    Ok(ExitCode::SUCCESS)
}

// ── gen ────────────────────────────────────────────────────────────────────

fn run_gen() -> CliResult<ExitCode> {
    let mut db = SymbolDatabase::new();
    generate::generate_symbols(&mut db);
    db.save_file(Path::new(GENERATED_DB_FILE))?;
    tracing::info!("{} symbols written to {}", db.len(), GENERATED_DB_FILE);
    Ok(ExitCode::SUCCESS)
}

// ── learn ──────────────────────────────────────────────────────────────────

fn run_learn(symbol_file: &Path) -> CliResult<ExitCode> {
    let text = fs::read_to_string(symbol_file)?;
    let img = bitmap_from_text(&text)?;

    let mut tex = read_stdin()?;
    if tex.ends_with('\n') {
        tex.pop();
    }

    let mut db = SymbolDatabase::new();
    let manual = Path::new(MANUAL_DB_FILE);
    if manual.exists() {
        db.load_file(manual)?;
    }

    if db.add_and_append(img, &tex, manual)? {
        tracing::info!("learned {:?}", tex);
    } else {
        tracing::info!("bitmap of {:?} already known, nothing added", tex);
    }
    Ok(ExitCode::SUCCESS)
}

// ── tex ────────────────────────────────────────────────────────────────────

fn run_tex(out_png: &Path) -> CliResult<ExitCode> {
    let tex = read_stdin()?;
    let rendered = render::render_to_png(&tex, false)?;
    fs::copy(rendered.path(), out_png)?;
    tracing::info!("formula rendered to {}", out_png.display());
    Ok(ExitCode::SUCCESS)
}

// ── untex ──────────────────────────────────────────────────────────────────

fn run_untex(png: &Path, dump_debug: Option<&Path>) -> CliResult<ExitCode> {
    let db = load_databases(true)?;
    let img = imgio::load_bitmap(png)?;

    let (outcome, dump) = untex_core::untex_img_with(
        &img,
        &db,
        &MatcherConfig::default(),
        &SpacingConfig::default(),
    );

    if let Some(dump_path) = dump_debug {
        let json = serde_json::to_string_pretty(&dump)?;
        fs::write(dump_path, json)?;
        tracing::info!("segmentation dump written to {}", dump_path.display());
    }

    match outcome {
        UntexOutcome::Recovered(tex) => {
            println!("{}", tex);
            Ok(ExitCode::SUCCESS)
        }
        UntexOutcome::Unmatched(failure) => {
            let candidates = &failure.unmatched_symbol_candidates;
            for (i, candidate) in candidates.iter().enumerate() {
                let file = format!("symbol_{}", i);
                fs::write(&file, bitmap_to_text(&candidate.img))?;
            }
            eprintln!(
                "Cannot match {} candidate symbol(s); text bitmaps written to symbol_0..symbol_{}. \
                 Teach one with `untex learn` and retry.",
                candidates.len(),
                candidates.len().saturating_sub(1),
            );
            Ok(ExitCode::FAILURE)
        }
    }
}
