use std::io::Write;
use std::path::Path;

use docsort_core::categories::heading_token;
use docsort_core::{DocumentResult, OTHER_HEADING, RunOutcome};

use crate::{ExportFormat, OutputError};

/// Export a run's results to the given path.
pub fn export_results(
    outcome: &RunOutcome,
    format: ExportFormat,
    path: &Path,
) -> Result<(), OutputError> {
    let content = match format {
        ExportFormat::Csv => export_csv(&outcome.documents),
        ExportFormat::PivotCsv => export_pivot_csv(&outcome.documents),
        ExportFormat::Json => export_json(outcome),
    };

    let write = |content: &str| -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(content.as_bytes())
    };
    write(&content).map_err(|e| OutputError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

fn csv_escape(s: &str) -> String {
    if s.contains('"') || s.contains(',') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Flat format: one row per (file, category) pair.
fn export_csv(documents: &[DocumentResult]) -> String {
    let mut out = String::from("FileName,Category,Snippet,Score\n");
    for doc in documents {
        for row in &doc.snippets {
            out.push_str(&format!(
                "{},{},{},{}\n",
                csv_escape(&doc.file_name),
                csv_escape(&row.category),
                csv_escape(&row.snippet),
                row.score,
            ));
        }
    }
    out
}

/// Category column order for the pivoted format: every category seen in
/// the run, sorted by heading token, with the OTHER bucket last.
fn pivot_columns(documents: &[DocumentResult]) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for doc in documents {
        for row in &doc.snippets {
            if !categories.contains(&row.category) {
                categories.push(row.category.clone());
            }
        }
    }
    categories.sort_by_key(|c| {
        let token = heading_token(c);
        (token == OTHER_HEADING, token)
    });
    categories
}

/// Pivoted format: one row per file, a score and content column pair per
/// category. Cells for categories absent from a file stay empty.
fn export_pivot_csv(documents: &[DocumentResult]) -> String {
    let categories = pivot_columns(documents);

    let mut out = String::from("FileName");
    for category in &categories {
        let token = heading_token(category);
        out.push_str(&format!(",{token}_Score,{token}_Content"));
    }
    out.push('\n');

    for doc in documents {
        out.push_str(&csv_escape(&doc.file_name));
        for category in &categories {
            match doc.snippets.iter().find(|r| &r.category == category) {
                Some(row) => {
                    out.push_str(&format!(",{},{}", row.score, csv_escape(&row.snippet)));
                }
                None => out.push_str(",,"),
            }
        }
        out.push('\n');
    }
    out
}

fn json_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\x20' => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

fn json_str(s: &str) -> String {
    format!("\"{}\"", json_escape(s))
}

fn export_json(outcome: &RunOutcome) -> String {
    let s = &outcome.stats;
    let mut out = String::from("{\n");
    out.push_str(&format!(
        "  \"stats\": {{\"total_files\": {}, \"processed\": {}, \"failed\": {}, \"rows\": {}}},\n",
        s.total_files, s.processed, s.failed, s.rows,
    ));

    out.push_str("  \"documents\": [\n");
    for (di, doc) in outcome.documents.iter().enumerate() {
        out.push_str(&format!(
            "    {{\n      \"file\": {},\n      \"rows\": [",
            json_str(&doc.file_name)
        ));
        for (ri, row) in doc.snippets.iter().enumerate() {
            out.push_str(&format!(
                "{{\"category\": {}, \"snippet\": {}, \"score\": {}}}",
                json_str(&row.category),
                json_str(&row.snippet),
                row.score,
            ));
            if ri + 1 < doc.snippets.len() {
                out.push_str(", ");
            }
        }
        out.push_str("]\n    }");
        if di + 1 < outcome.documents.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("  ],\n");

    out.push_str("  \"failures\": [\n");
    for (fi, failure) in outcome.failures.iter().enumerate() {
        out.push_str(&format!(
            "    {{\"file\": {}, \"stage\": {}, \"error\": {}}}",
            json_str(&failure.file_name),
            json_str(failure.stage.as_str()),
            json_str(&failure.message),
        ));
        if fi + 1 < outcome.failures.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("  ]\n}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsort_core::{CategorySnippet, FailureStage, FileFailure, RunStats};

    fn row(category: &str, snippet: &str, score: usize) -> CategorySnippet {
        CategorySnippet {
            category: category.to_string(),
            snippet: snippet.to_string(),
            score,
        }
    }

    fn doc(file_name: &str, snippets: Vec<CategorySnippet>) -> DocumentResult {
        DocumentResult {
            file_name: file_name.to_string(),
            snippets,
        }
    }

    fn outcome(documents: Vec<DocumentResult>) -> RunOutcome {
        let stats = RunStats {
            total_files: documents.len(),
            processed: documents.len(),
            failed: 0,
            rows: documents.iter().map(|d| d.snippets.len()).sum(),
        };
        RunOutcome {
            documents,
            failures: vec![],
            stats,
        }
    }

    /// Minimal CSV reader for round-trip checks: handles quoted fields
    /// with embedded commas, quotes, and newlines.
    fn parse_csv(content: &str) -> Vec<Vec<String>> {
        let mut records = Vec::new();
        let mut record = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = content.chars().peekable();
        while let Some(c) = chars.next() {
            if in_quotes {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    field.push(c);
                }
            } else {
                match c {
                    '"' => in_quotes = true,
                    ',' => record.push(std::mem::take(&mut field)),
                    '\n' => {
                        record.push(std::mem::take(&mut field));
                        records.push(std::mem::take(&mut record));
                    }
                    c => field.push(c),
                }
            }
        }
        records
    }

    #[test]
    fn csv_escape_rules() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("a\nb"), "\"a\nb\"");
        assert_eq!(csv_escape(r#"say "hi""#), r#""say ""hi""""#);
    }

    #[test]
    fn flat_csv_one_row_per_pair() {
        let documents = vec![
            doc("a.pdf", vec![row("Gold", "gold up", 1), row("Oil", "oil down", 1)]),
            doc("b.pdf", vec![row("Gold", "gold flat", 1)]),
        ];
        let csv = export_csv(&documents);
        let records = parse_csv(&csv);
        assert_eq!(
            records[0],
            vec!["FileName", "Category", "Snippet", "Score"]
        );
        assert_eq!(records.len(), 4);
        assert_eq!(records[1], vec!["a.pdf", "Gold", "gold up", "1"]);
        assert_eq!(records[3], vec!["b.pdf", "Gold", "gold flat", "1"]);
    }

    #[test]
    fn flat_csv_round_trips_awkward_snippets() {
        let snippet = "- \"risk-off\" tone, yields fell\n- curve steepened";
        let documents = vec![doc("q3, final.pdf", vec![row("Fixed Income", snippet, 2)])];
        let records = parse_csv(&export_csv(&documents));
        assert_eq!(records[1][0], "q3, final.pdf");
        assert_eq!(records[1][2], snippet);
    }

    #[test]
    fn pivot_csv_columns_sorted_with_other_last() {
        let documents = vec![
            doc("a.pdf", vec![row("Oil", "o", 1), row("OTHER", "x", 0)]),
            doc("b.pdf", vec![row("Gold", "g", 2)]),
        ];
        let csv = export_pivot_csv(&documents);
        let records = parse_csv(&csv);
        assert_eq!(
            records[0],
            vec![
                "FileName",
                "GOLD_Score",
                "GOLD_Content",
                "OIL_Score",
                "OIL_Content",
                "OTHER_Score",
                "OTHER_Content",
            ]
        );
        // a.pdf has no Gold entry, so those cells stay empty.
        assert_eq!(records[1], vec!["a.pdf", "", "", "1", "o", "0", "x"]);
        assert_eq!(records[2], vec!["b.pdf", "2", "g", "", "", "", ""]);
    }

    #[test]
    fn pivot_csv_tokenizes_category_names() {
        let documents = vec![doc("a.pdf", vec![row("Fixed Income", "f", 1)])];
        let csv = export_pivot_csv(&documents);
        assert!(csv.starts_with("FileName,FIXED_INCOME_Score,FIXED_INCOME_Content\n"));
    }

    #[test]
    fn json_includes_failures() {
        let mut run = outcome(vec![doc("a.pdf", vec![row("Gold", "g \"q\"", 1)])]);
        run.failures.push(FileFailure {
            file_name: "bad.pdf".to_string(),
            stage: FailureStage::Extraction,
            message: "cannot open".to_string(),
        });
        run.stats.failed = 1;
        let json = export_json(&run);
        assert!(json.contains("\"file\": \"a.pdf\""));
        assert!(json.contains("\"snippet\": \"g \\\"q\\\"\""));
        assert!(json.contains("\"stage\": \"extraction\""));
        assert!(json.contains("\"failed\": 1"));
    }

    #[test]
    fn export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let run = outcome(vec![doc("a.pdf", vec![row("Gold", "g", 1)])]);
        export_results(&run, ExportFormat::Csv, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("FileName,Category,Snippet,Score\n"));
    }

    #[test]
    fn export_unwritable_path_errors() {
        let run = outcome(vec![]);
        let err = export_results(
            &run,
            ExportFormat::Csv,
            Path::new("/no/such/dir/out.csv"),
        )
        .unwrap_err();
        assert!(matches!(err, OutputError::Write { .. }));
    }
}
