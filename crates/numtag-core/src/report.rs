//! JSON output files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value;

use crate::{CoreError, DocumentExtraction, PageOutcome};

/// One report entry per outcome, in the given order.
pub fn page_entries(outcomes: &[PageOutcome]) -> Vec<Value> {
    outcomes.iter().map(PageOutcome::to_json).collect()
}

/// Write the labeling report: a JSON array, pretty-printed.
pub fn write_report(path: &Path, outcomes: &[PageOutcome]) -> Result<(), CoreError> {
    write_json(path, &page_entries(outcomes))
}

/// Write the deterministic extraction (page texts and token records).
pub fn write_extraction(path: &Path, extraction: &DocumentExtraction) -> Result<(), CoreError> {
    write_json(path, extraction)
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CoreError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    tracing::info!(path = %path.display(), "wrote JSON output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Reconciliation, SyntaxLabel, TokenRecord};
    use serde_json::{Map, json};

    fn outcomes() -> Vec<PageOutcome> {
        let mut response = Map::new();
        response.insert("classification".into(), json!([{"raw_value": "5,000"}]));
        vec![
            PageOutcome::Labeled {
                page_number: 2,
                response,
                results: vec![],
                reconciliation: Reconciliation::default(),
            },
            PageOutcome::Unparsed {
                page_number: 1,
                raw: "I could not find numbers".into(),
            },
            PageOutcome::Failed {
                page_number: 3,
                error: "model call timed out after 120s".into(),
            },
        ]
    }

    #[test]
    fn report_is_json_array_in_outcome_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extraction_results.json");
        write_report(&path, &outcomes()).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let entries = written.as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["page_number"], 2);
        assert_eq!(entries[0]["classification"][0]["raw_value"], "5,000");
        assert_eq!(entries[1], json!("I could not find numbers"));
        assert_eq!(entries[2]["error"], "model call timed out after 120s");
    }

    #[test]
    fn empty_report_is_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_report(&path, &[]).unwrap();
        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, json!([]));
    }

    #[test]
    fn extraction_lists_pages_and_records() {
        let mut extraction = DocumentExtraction::default();
        extraction.pages.insert(1, "Award of 5,000 units".into());
        extraction.records.push(TokenRecord {
            value: "5,000".into(),
            page_number: 1,
            context: "Award of 5,000 units".into(),
            syntax_label: SyntaxLabel::GrantedUnits,
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extractions.json");
        write_extraction(&path, &extraction).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["pages"]["1"], "Award of 5,000 units");
        assert_eq!(written["records"][0]["syntax_label"], "granted_units");
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.json");
        assert!(matches!(write_report(&path, &[]), Err(CoreError::Io(_))));
    }
}
