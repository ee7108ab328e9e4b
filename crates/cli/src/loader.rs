//! JSON-lines activation files.
//!
//! Each non-blank line is one activation document. A line is keyed by its
//! `namespace` and `activationId` fields; the rest of the document is stored
//! as-is, so damaged bodies still load and surface later as corrupted
//! entities.

use std::path::{Path, PathBuf};

use actlog_storage::{ActivationId, ActivationStore, Namespace, StoreError};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub(crate) enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to store activation from '{path}' line {line}: {source}")]
    Store {
        path: PathBuf,
        line: usize,
        #[source]
        source: StoreError,
    },
}

/// A document with a usable key.
#[derive(Debug, Clone)]
pub(crate) struct KeyedDocument {
    pub(crate) line: usize,
    pub(crate) namespace: Namespace,
    pub(crate) activation_id: ActivationId,
    pub(crate) document: Value,
}

/// A line that could not be keyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SkippedLine {
    pub(crate) line: usize,
    pub(crate) reason: String,
}

#[derive(Debug, Default)]
pub(crate) struct LoadReport {
    pub(crate) loaded: usize,
    pub(crate) duplicates: usize,
    pub(crate) skipped: Vec<SkippedLine>,
}

/// Split `text` into keyed documents and skipped lines. Line numbers are
/// 1-based.
pub(crate) fn parse_documents(text: &str) -> (Vec<KeyedDocument>, Vec<SkippedLine>) {
    let mut documents = Vec::new();
    let mut skipped = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        if raw.trim().is_empty() {
            continue;
        }
        match parse_line(raw) {
            Ok((namespace, activation_id, document)) => documents.push(KeyedDocument {
                line,
                namespace,
                activation_id,
                document,
            }),
            Err(reason) => skipped.push(SkippedLine { line, reason }),
        }
    }
    (documents, skipped)
}

fn parse_line(raw: &str) -> Result<(Namespace, ActivationId, Value), String> {
    let document: Value = serde_json::from_str(raw).map_err(|err| format!("invalid JSON: {err}"))?;
    if !document.is_object() {
        return Err("not a JSON object".to_string());
    }
    let namespace = document
        .get("namespace")
        .and_then(Value::as_str)
        .ok_or("missing 'namespace'")?;
    let namespace = Namespace::parse(namespace).map_err(|err| format!("namespace: {err}"))?;
    let activation_id = document
        .get("activationId")
        .and_then(Value::as_str)
        .ok_or("missing 'activationId'")?;
    let activation_id = ActivationId::parse(activation_id).map_err(|err| err.to_string())?;
    Ok((namespace, activation_id, document))
}

pub(crate) async fn read_documents(
    path: &Path,
) -> Result<(Vec<KeyedDocument>, Vec<SkippedLine>), LoadError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parse_documents(&text))
}

/// Load one file into `store`. Duplicate keys keep the first document.
pub(crate) async fn load_file<S: ActivationStore>(
    store: &S,
    path: &Path,
) -> Result<LoadReport, LoadError> {
    let (documents, skipped) = read_documents(path).await?;
    let mut report = LoadReport {
        skipped,
        ..LoadReport::default()
    };
    for doc in documents {
        match store
            .put(&doc.namespace, &doc.activation_id, doc.document)
            .await
        {
            Ok(()) => report.loaded += 1,
            Err(StoreError::AlreadyExists { .. }) => {
                tracing::warn!(path = %path.display(), line = doc.line, activation_id = %doc.activation_id, "duplicate activation skipped");
                report.duplicates += 1;
            }
            Err(source) => {
                return Err(LoadError::Store {
                    path: path.to_path_buf(),
                    line: doc.line,
                    source,
                })
            }
        }
    }
    for skip in &report.skipped {
        tracing::warn!(path = %path.display(), line = skip.line, reason = %skip.reason, "activation line skipped");
    }
    Ok(report)
}
