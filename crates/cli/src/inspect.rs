//! `actlog inspect` -- summarize a JSON-lines activation file.

use std::collections::BTreeMap;
use std::path::Path;

use actlog_storage::ActivationRecord;
use serde::Serialize;

use crate::loader::{read_documents, KeyedDocument, SkippedLine};
use crate::OutputFormat;

#[derive(Debug, Default, Serialize)]
pub(crate) struct InspectReport {
    pub(crate) activations: usize,
    pub(crate) namespaces: BTreeMap<String, usize>,
    /// Ids of keyed documents that do not decode as activation records.
    pub(crate) corrupted: Vec<String>,
    pub(crate) skipped: Vec<Skipped>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Skipped {
    pub(crate) line: usize,
    pub(crate) reason: String,
}

pub(crate) fn build_report(documents: &[KeyedDocument], skipped: &[SkippedLine]) -> InspectReport {
    let mut report = InspectReport {
        activations: documents.len(),
        ..InspectReport::default()
    };
    for doc in documents {
        *report
            .namespaces
            .entry(doc.namespace.to_string())
            .or_default() += 1;
        if serde_json::from_value::<ActivationRecord>(doc.document.clone()).is_err() {
            report.corrupted.push(doc.activation_id.to_string());
        }
    }
    report.skipped = skipped
        .iter()
        .map(|s| Skipped {
            line: s.line,
            reason: s.reason.clone(),
        })
        .collect();
    report
}

fn render_text(path: &Path, report: &InspectReport) -> String {
    let mut out = format!("{}: {} activations\n", path.display(), report.activations);
    for (namespace, count) in &report.namespaces {
        out.push_str(&format!("  {namespace}: {count}\n"));
    }
    if !report.corrupted.is_empty() {
        out.push_str(&format!("corrupted: {}\n", report.corrupted.len()));
        for id in &report.corrupted {
            out.push_str(&format!("  {id}\n"));
        }
    }
    if !report.skipped.is_empty() {
        out.push_str(&format!("skipped lines: {}\n", report.skipped.len()));
        for s in &report.skipped {
            out.push_str(&format!("  line {}: {}\n", s.line, s.reason));
        }
    }
    out
}

/// Returns the process exit code.
pub(crate) async fn cmd_inspect(path: &Path, output: OutputFormat, quiet: bool) -> i32 {
    let (documents, skipped) = match read_documents(path).await {
        Ok(parsed) => parsed,
        Err(err) => {
            crate::report_error(&err.to_string(), output, quiet);
            return 1;
        }
    };
    let report = build_report(&documents, &skipped);
    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                crate::report_error(&format!("serialization error: {err}"), output, quiet);
                return 1;
            }
        },
        OutputFormat::Text => print!("{}", render_text(path, &report)),
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_documents;

    #[test]
    fn report_counts_namespaces_and_corrupted_documents() {
        let good = serde_json::json!({
            "namespace": "a/b",
            "name": "x",
            "subject": "a",
            "activationId": "0123456789abcdef0123456789abcdef",
            "start": 1,
            "response": {"status": "success"}
        });
        let bad = serde_json::json!({
            "namespace": "a/b",
            "activationId": "fedcba9876543210fedcba9876543210",
            "start": "yesterday"
        });
        let text = format!("{good}\n{bad}\nnope\n");
        let (docs, skipped) = parse_documents(&text);
        let report = build_report(&docs, &skipped);

        assert_eq!(report.activations, 2);
        assert_eq!(report.namespaces.get("a/b"), Some(&2));
        assert_eq!(report.corrupted, vec!["fedcba9876543210fedcba9876543210"]);
        assert_eq!(report.skipped.len(), 1);

        let text = render_text(Path::new("f.jsonl"), &report);
        assert!(text.starts_with("f.jsonl: 2 activations"));
        assert!(text.contains("corrupted: 1"));
        assert!(text.contains("line 3"));
    }
}
