//! Export of categorization results to disk.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub mod export;

pub use export::export_results;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// One row per (file, category) pair.
    #[default]
    Csv,
    /// One row per file, one score/content column pair per category.
    PivotCsv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv | ExportFormat::PivotCsv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "pivot" | "pivot-csv" => Ok(ExportFormat::PivotCsv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!(
                "unknown format '{other}' (expected csv, pivot, or json)"
            )),
        }
    }
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
