use std::future::Future;

use super::{make_record, ns, TestResult};
use crate::{ActivationId, ActivationStore, StoreError};

pub(super) async fn run_document_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "documents",
        "put_then_get_returns_document",
        put_then_get_returns_document(factory).await,
    ));
    results.push(TestResult::from_result(
        "documents",
        "get_missing_returns_none",
        get_missing_returns_none(factory).await,
    ));
    results.push(TestResult::from_result(
        "documents",
        "duplicate_put_returns_already_exists",
        duplicate_put_returns_already_exists(factory).await,
    ));
    results.push(TestResult::from_result(
        "documents",
        "get_is_scoped_to_namespace",
        get_is_scoped_to_namespace(factory).await,
    ));
    results.push(TestResult::from_result(
        "documents",
        "damaged_document_is_stored_verbatim",
        damaged_document_is_stored_verbatim(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A stored record is readable by key without waiting for any refresh.
async fn put_then_get_returns_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let record = make_record(&ns("guest")?, "hello", 100);
    s.put_record(&record).await.map_err(|e| e.to_string())?;

    let doc = s
        .get(&record.namespace, &record.activation_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("document not visible by id after put")?;
    let expected = serde_json::to_value(&record).map_err(|e| e.to_string())?;
    if doc != expected {
        return Err(format!("expected {expected}, got {doc}"));
    }
    Ok(())
}

async fn get_missing_returns_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let found = s
        .get(&ns("guest")?, &ActivationId::generate())
        .await
        .map_err(|e| e.to_string())?;
    if let Some(doc) = found {
        return Err(format!("expected nothing, got {doc}"));
    }
    Ok(())
}

/// Ids are assigned once; a second put under the same key must fail and
/// leave the first document untouched.
async fn duplicate_put_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let record = make_record(&ns("guest")?, "hello", 100);
    s.put_record(&record).await.map_err(|e| e.to_string())?;

    let mut again = record.clone();
    again.name = "other".to_string();
    match s.put_record(&again).await {
        Err(StoreError::AlreadyExists {
            namespace,
            activation_id,
        }) => {
            if namespace != "guest" || activation_id != record.activation_id.as_str() {
                return Err(format!(
                    "AlreadyExists has wrong fields: {namespace}/{activation_id}"
                ));
            }
        }
        Err(e) => return Err(format!("expected AlreadyExists, got {e}")),
        Ok(()) => return Err("expected AlreadyExists, put succeeded".to_string()),
    }

    let doc = s
        .get(&record.namespace, &record.activation_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("original document vanished")?;
    if doc["name"] != "hello" {
        return Err(format!("original document was overwritten: {doc}"));
    }
    Ok(())
}

async fn get_is_scoped_to_namespace<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let record = make_record(&ns("a/b")?, "hello", 100);
    s.put_record(&record).await.map_err(|e| e.to_string())?;

    for other in ["c/d", "a", "a/b/c"] {
        let found = s
            .get(&ns(other)?, &record.activation_id)
            .await
            .map_err(|e| e.to_string())?;
        if found.is_some() {
            return Err(format!("document under a/b visible from {other}"));
        }
    }
    Ok(())
}

/// Stores hold raw documents; decoding is the reader's concern.
async fn damaged_document_is_stored_verbatim<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    let id = ActivationId::generate();
    let damaged = serde_json::json!({"name": "hello", "start": 1, "response": 42});
    s.put(&owner, &id, damaged.clone())
        .await
        .map_err(|e| e.to_string())?;

    let doc = s
        .get(&owner, &id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("damaged document not stored")?;
    if doc != damaged {
        return Err(format!("expected {damaged}, got {doc}"));
    }
    Ok(())
}
