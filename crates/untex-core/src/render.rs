//! External renderer collaborator: markup → PNG through the LaTeX toolchain
//! (`latex` → `dvips` → `pstoimg`).
//!
//! All scratch files live in the system temp directory and are removed by
//! drop guards on every exit path; only the final PNG survives, owned by the
//! returned [`RenderedPng`] until that is dropped in turn.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::imgio;
use crate::matrix::Bitmap;
use crate::segment::{column_runs, column_sums, without_empty_borders};

/// A rendered PNG on disk, deleted when dropped.
#[derive(Debug)]
pub struct RenderedPng {
    path: PathBuf,
}

impl RenderedPng {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RenderedPng {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Remove a set of scratch files when dropped.
struct RemoveOnDrop(Vec<PathBuf>);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        for path in &self.0 {
            let _ = fs::remove_file(path);
        }
    }
}

/// Typeset `tex` as a display-math formula and rasterise it to a PNG.
///
/// With `quiet` the toolchain's own output is suppressed; the `tex` CLI
/// command passes `quiet = false` so LaTeX errors reach the terminal.
pub fn render_to_png(tex: &str, quiet: bool) -> Result<RenderedPng> {
    let temp_dir = std::env::temp_dir();
    let tex_file = tempfile::Builder::new()
        .prefix("untex")
        .suffix(".tex")
        .tempfile_in(&temp_dir)
        .map_err(|e| Error::io("create scratch .tex file", e))?;

    write!(
        tex_file.as_file(),
        "\\documentclass[12pt]{{article}}\n\
         \\pagestyle{{empty}}\n\
         \\begin{{document}}\n\
         \\begin{{displaymath}}\n\
         {}\n\
         \\end{{displaymath}}\n\
         \\end{{document}}\n",
        tex
    )
    .and_then(|_| tex_file.as_file().sync_all())
    .map_err(|e| Error::io("write scratch .tex file", e))?;

    let base = tex_file.path().to_path_buf();
    let dvi = base.with_extension("dvi");
    let ps = base.with_extension("ps");
    let png = base.with_extension("png");

    let _intermediates = RemoveOnDrop(vec![
        dvi.clone(),
        ps.clone(),
        base.with_extension("aux"),
        base.with_extension("log"),
    ]);
    let mut png_cleanup = RemoveOnDrop(vec![png.clone()]);

    run_tool(
        Command::new("latex")
            .arg(format!("-output-directory={}", temp_dir.display()))
            .arg(tex_file.path()),
        quiet,
        "latex",
    )?;
    run_tool(
        Command::new("dvips").arg(&dvi).arg("-o").arg(&ps),
        quiet,
        "dvips",
    )?;
    run_tool(
        Command::new("pstoimg")
            .args(["-interlaced", "-transparent", "-scale", "1.4", "-crop", "as", "-type", "png"])
            .arg("-out")
            .arg(&png)
            .arg(&ps),
        quiet,
        "pstoimg",
    )?;

    png_cleanup.0.clear();
    Ok(RenderedPng { path: png })
}

fn run_tool(command: &mut Command, quiet: bool, name: &str) -> Result<()> {
    command.stdin(Stdio::null());
    if quiet {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let status = command
        .status()
        .map_err(|e| Error::io(format!("spawn {}", name), e))?;
    if !status.success() {
        return Err(Error::Render(format!("{} exited with {}", name, status)));
    }
    Ok(())
}

/// Render markup and binarise the result.
pub fn render_to_bitmap(tex: &str) -> Result<Bitmap> {
    let png = render_to_png(tex, true)?;
    imgio::load_bitmap(png.path())
}

/// Render a vocabulary job padded with flanking `\int` glyphs, then crop the
/// payload back out between the blank column bands the padding guarantees.
///
/// The rasteriser trims the page to the ink bounding box, which would clip
/// thin glyphs like `-` asymmetrically; the integral signs pin the extents
/// and are discarded here.
pub fn safe_render_to_bitmap(tex: &str) -> Result<Bitmap> {
    let wrapped = format!("\\int\\,\\, {} \\,\\,\\int", tex);
    let img = render_to_bitmap(&wrapped)?;
    crop_between_blank_bands(&img)
}

fn crop_between_blank_bands(img: &Bitmap) -> Result<Bitmap> {
    let runs = column_runs(&column_sums(img));
    // First and last runs are the flanking integral signs; the payload is
    // whatever sits strictly between them.
    if runs.len() < 3 {
        return Err(Error::SpacingInvariantViolated);
    }

    let beg = runs[1].0;
    let end = runs[runs.len() - 2].1;
    let window = img.view().section(0, beg, img.rows(), end - beg);
    Ok(without_empty_borders(&window).view.to_matrix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::bitmap;

    #[test]
    fn crop_keeps_everything_between_the_flanking_runs() {
        let img = bitmap(&[
            "#           #",
            "#  ##  #    #",
            "#  ##  ##   #",
        ]);
        let payload = crop_between_blank_bands(&img).expect("crop");
        assert_eq!(
            payload,
            bitmap(&[
                "##  # ",
                "##  ##",
            ])
        );
    }

    #[test]
    fn crop_without_payload_violates_the_spacing_invariant() {
        let img = bitmap(&[
            "#    #",
            "#    #",
        ]);
        assert!(matches!(
            crop_between_blank_bands(&img),
            Err(Error::SpacingInvariantViolated)
        ));
    }
}
