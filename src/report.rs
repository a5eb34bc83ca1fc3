//! Per-artifact reporting and diff display.

use crate::config::DiffConfig;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::Command;

/// Receives the outcome of each artifact from the CLI driver.
pub trait Reporter {
    fn report(&mut self, artifact: &Path, passed: bool) -> Result<()>;

    /// Print the command that shows a failing artifact's correction.
    fn announce_diff(&mut self, original: &Path, corrected: &Path) -> Result<()>;

    /// Show the difference between an artifact and its correction.
    ///
    /// Must not fail the run when the display itself fails; the corrected
    /// artifact stays on disk either way.
    fn display_diff(&mut self, original: &Path, corrected: &Path);
}

/// Plain-text reporter writing to `writer` and shelling out for diffs.
pub struct TerminalReporter<W: Write> {
    writer: W,
    diff: DiffConfig,
}

impl<W: Write> TerminalReporter<W> {
    pub fn new(writer: W, diff: DiffConfig) -> Self {
        Self { writer, diff }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl TerminalReporter<std::io::Stdout> {
    pub fn stdout(diff: DiffConfig) -> Self {
        Self::new(std::io::stdout(), diff)
    }
}

impl<W: Write> Reporter for TerminalReporter<W> {
    fn report(&mut self, artifact: &Path, passed: bool) -> Result<()> {
        let verdict = if passed { "passed" } else { "failed" };
        writeln!(self.writer, "{} {verdict}", artifact.display())
            .context("Failed to write report")
    }

    fn announce_diff(&mut self, original: &Path, corrected: &Path) -> Result<()> {
        writeln!(
            self.writer,
            "diff {} {}",
            original.display(),
            corrected.display()
        )
        .context("Failed to write report")
    }

    fn display_diff(&mut self, original: &Path, corrected: &Path) {
        if !self.diff.enabled {
            return;
        }
        // The tool writes to the inherited stdout; keep our lines ahead of it.
        let _ = self.writer.flush();
        if let Err(e) = run_diff_tool(&self.diff, original, corrected) {
            tracing::warn!(
                original = %original.display(),
                corrected = %corrected.display(),
                "diff display failed: {e:#}"
            );
        }
    }
}

/// Run the configured diff tool on the two files.
///
/// Exit status 1 is the usual "files differ" answer of diff-like tools and
/// counts as success.
pub fn run_diff_tool(diff: &DiffConfig, original: &Path, corrected: &Path) -> Result<()> {
    let program = which::which(&diff.command)
        .with_context(|| format!("{} not found in PATH", diff.command))?;

    let status = Command::new(&program)
        .args(&diff.args)
        .arg(original)
        .arg(corrected)
        .status()
        .with_context(|| format!("Failed to run {}", program.display()))?;

    match status.code() {
        Some(0) | Some(1) => Ok(()),
        Some(code) => anyhow::bail!("{} exited with status {code}", diff.command),
        None => anyhow::bail!("{} was terminated by a signal", diff.command),
    }
}
