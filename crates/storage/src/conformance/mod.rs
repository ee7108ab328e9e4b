//! Conformance test suite for `ActivationStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `ActivationStore` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Documents**: put/get by key, duplicate detection, namespace scoping
//! - **Views**: ordering, inclusive time windows, paging, name filters,
//!   namespace isolation, count/list agreement
//! - **Refresh**: staleness until refresh, monotonic views, late views
//! - **Concurrency**: parallel readers during writes, shared view creation
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use actlog_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn couch_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_couch_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod documents;
mod refresh;
mod views;

use std::fmt;
use std::future::Future;

use crate::id::ActivationId;
use crate::path::Namespace;
use crate::record::{ActivationRecord, ActivationResponse, Annotation, ResponseStatus};
use crate::view::{RangeQuery, TimeWindow};
use crate::ActivationStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "documents", "views").
    pub category: String,
    /// Test name (e.g. "put_then_get_returns_document").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(documents::run_document_tests(&factory).await);
    results.extend(views::run_view_tests(&factory).await);
    results.extend(refresh::run_refresh_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn ns(value: &str) -> Result<Namespace, String> {
    Namespace::parse(value).map_err(|e| format!("namespace {value}: {e}"))
}

fn make_record(namespace: &Namespace, name: &str, start: i64) -> ActivationRecord {
    ActivationRecord {
        namespace: namespace.clone(),
        name: name.to_string(),
        subject: namespace.root().to_string(),
        version: "0.0.1".to_string(),
        activation_id: ActivationId::generate(),
        start,
        end: start + 5,
        response: ActivationResponse {
            status: ResponseStatus::Success,
            result: Some(serde_json::json!({"start": start})),
        },
        logs: vec![format!("{start} stdout: ran {name}")],
        annotations: vec![Annotation::new(
            "path",
            serde_json::json!(format!("{namespace}/{name}")),
        )],
        publish: false,
    }
}

/// A record for `package/name` under `namespace`.
fn make_package_record(
    namespace: &Namespace,
    package: &str,
    name: &str,
    start: i64,
) -> ActivationRecord {
    let mut record = make_record(namespace, name, start);
    record.annotations = vec![Annotation::new(
        "path",
        serde_json::json!(format!("{namespace}/{package}/{name}")),
    )];
    record
}

fn everything() -> RangeQuery {
    RangeQuery {
        window: TimeWindow::default(),
        skip: 0,
        limit: usize::MAX,
    }
}

fn starts(docs: &[serde_json::Value]) -> Vec<i64> {
    docs.iter()
        .map(|d| d.get("start").and_then(|s| s.as_i64()).unwrap_or(i64::MIN))
        .collect()
}

async fn put_all<S: ActivationStore>(
    store: &S,
    records: &[ActivationRecord],
) -> Result<(), String> {
    for record in records {
        store
            .put_record(record)
            .await
            .map_err(|e| format!("put {}: {e}", record.activation_id))?;
    }
    Ok(())
}
