use std::io::Write;

use docsort_core::{FailureStage, ProgressEvent, RunOutcome};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Format a real-time progress event as a single display line.
///
/// `Processing` events return `None`; they update the progress bar
/// message instead of printing a line per file.
pub fn format_progress(event: &ProgressEvent, color: ColorMode) -> Option<String> {
    match event {
        ProgressEvent::Processing { .. } => None,
        ProgressEvent::Result {
            index,
            total,
            result,
        } => {
            let rows = result.snippets.len();
            let line = if color.enabled() {
                format!(
                    "[{}/{}] {} -> {} ({} categor{})",
                    index + 1,
                    total,
                    result.file_name,
                    "OK".green(),
                    rows,
                    if rows == 1 { "y" } else { "ies" },
                )
            } else {
                format!(
                    "[{}/{}] {} -> OK ({} categor{})",
                    index + 1,
                    total,
                    result.file_name,
                    rows,
                    if rows == 1 { "y" } else { "ies" },
                )
            };
            Some(line)
        }
        ProgressEvent::Failed {
            index,
            total,
            file_name,
            stage,
            message,
        } => {
            let line = if color.enabled() {
                format!(
                    "[{}/{}] {} -> {} ({}): {}",
                    index + 1,
                    total,
                    file_name,
                    "FAILED".red(),
                    stage.as_str(),
                    message,
                )
            } else {
                format!(
                    "[{}/{}] {} -> FAILED ({}): {}",
                    index + 1,
                    total,
                    file_name,
                    stage.as_str(),
                    message,
                )
            };
            Some(line)
        }
        ProgressEvent::Retrying {
            file_name,
            attempt,
            backoff,
        } => {
            let msg = format!(
                "Retrying {} (attempt {}, backing off {:.1}s)",
                file_name,
                attempt,
                backoff.as_secs_f64(),
            );
            let line = if color.enabled() {
                format!("{}", msg.yellow())
            } else {
                msg
            };
            Some(line)
        }
    }
}

/// Print the block of per-file failures, if any.
pub fn print_failure_report(
    w: &mut dyn Write,
    outcome: &RunOutcome,
    color: ColorMode,
) -> std::io::Result<()> {
    if outcome.failures.is_empty() {
        return Ok(());
    }

    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold().red())?;
        writeln!(w, "{}", "SKIPPED FILES".bold().red())?;
        writeln!(w, "{}", sep.bold().red())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "SKIPPED FILES")?;
        writeln!(w, "{}", sep)?;
    }

    for failure in &outcome.failures {
        let stage = match failure.stage {
            FailureStage::Extraction => "text extraction failed",
            FailureStage::Completion => "API request failed",
            FailureStage::Parse => "unusable API response",
        };
        writeln!(w)?;
        if color.enabled() {
            writeln!(w, "{} {}", "File:".bold(), failure.file_name)?;
            writeln!(w, "{} {}", "Stage:".red(), stage)?;
        } else {
            writeln!(w, "File: {}", failure.file_name)?;
            writeln!(w, "Stage: {}", stage)?;
        }
        writeln!(w, "Error: {}", failure.message)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Print the final summary.
pub fn print_summary(
    w: &mut dyn Write,
    outcome: &RunOutcome,
    output_path: &std::path::Path,
    color: ColorMode,
) -> std::io::Result<()> {
    let s = &outcome.stats;

    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", "SUMMARY".bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "SUMMARY")?;
        writeln!(w, "{}", sep)?;
    }

    writeln!(w, "  PDF files found: {}", s.total_files)?;
    if color.enabled() {
        writeln!(w, "  {} {}", "Categorized:".green(), s.processed)?;
    } else {
        writeln!(w, "  Categorized: {}", s.processed)?;
    }
    if s.failed > 0 {
        if color.enabled() {
            writeln!(w, "  {} {}", "Skipped:".red(), s.failed)?;
        } else {
            writeln!(w, "  Skipped: {}", s.failed)?;
        }
    }
    writeln!(w, "  Result rows: {}", s.rows)?;
    writeln!(w)?;
    writeln!(w, "  Results written to: {}", output_path.display())?;
    writeln!(w)?;
    Ok(())
}
