use std::future::Future;
use std::sync::Arc;

use super::{make_record, ns, TestResult};
use crate::path::NameFilter;
use crate::view::{TimeWindow, ViewKey};
use crate::{ActivationStore, StoreError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_readers_see_monotonic_counts",
        concurrent_readers_see_monotonic_counts(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_first_queries_agree",
        concurrent_first_queries_agree(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_duplicate_puts_exactly_one_wins",
        concurrent_duplicate_puts_exactly_one_wins(factory).await,
    ));

    results
}

// ── Readers during writes ───────────────────────────────────────────────────

/// N reader tasks poll a view while a writer task puts and refreshes.
/// Each reader's sequence of counts must be non-decreasing, and every reader
/// must see the full set once the writer is done.
async fn concurrent_readers_see_monotonic_counts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let owner = ns("guest")?;
    let key = ViewKey::namespace(owner.clone());
    const WRITES: i64 = 20;

    let writer = {
        let s = storage.clone();
        let owner = owner.clone();
        tokio::spawn(async move {
            for i in 0..WRITES {
                s.put_record(&make_record(&owner, "hello", i)).await?;
                if i % 4 == 3 {
                    s.refresh_views().await?;
                }
                tokio::task::yield_now().await;
            }
            s.refresh_views().await?;
            Ok::<_, StoreError>(())
        })
    };

    let mut readers = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        let k = key.clone();
        readers.push(tokio::spawn(async move {
            let mut observed = Vec::new();
            for _ in 0..50 {
                observed.push(s.count_view(&k, &TimeWindow::default()).await?);
                tokio::task::yield_now().await;
            }
            Ok::<_, StoreError>(observed)
        }));
    }

    writer
        .await
        .map_err(|e| format!("writer panic: {e}"))?
        .map_err(|e| format!("writer: {e}"))?;

    for reader in readers {
        let observed = reader
            .await
            .map_err(|e| format!("reader panic: {e}"))?
            .map_err(|e| format!("reader: {e}"))?;
        if let Some(w) = observed.windows(2).find(|w| w[1] < w[0]) {
            return Err(format!("reader saw view move backward: {} -> {}", w[0], w[1]));
        }
    }

    let count = storage
        .count_view(&key, &TimeWindow::default())
        .await
        .map_err(|e| e.to_string())?;
    if count != WRITES as u64 {
        return Err(format!("expected {WRITES} after writer finished, got {count}"));
    }
    Ok(())
}

// ── Lazy view creation under contention ─────────────────────────────────────

/// N tasks hit never-queried views at the same time. Every first query must
/// already see the refreshed writes, however the creations interleave.
async fn concurrent_first_queries_agree<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let owner = ns("guest")?;
    for i in 0..5 {
        storage
            .put_record(&make_record(&owner, "hello", i))
            .await
            .map_err(|e| e.to_string())?;
    }
    storage.refresh_views().await.map_err(|e| e.to_string())?;

    let name = NameFilter::parse("hello").map_err(|e| e.to_string())?;
    let keys = [
        ViewKey::namespace(owner.clone()),
        ViewKey::filtered(owner, name),
    ];
    let mut handles = Vec::new();
    for i in 0..N * keys.len() {
        let s = storage.clone();
        let k = keys[i % keys.len()].clone();
        handles.push(tokio::spawn(async move {
            s.count_view(&k, &TimeWindow::default()).await
        }));
    }

    for handle in handles {
        let count = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        if count != 5 {
            return Err(format!("expected 5 from every first query, got {count}"));
        }
    }
    Ok(())
}

// ── Duplicate ids ───────────────────────────────────────────────────────────

async fn concurrent_duplicate_puts_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let record = make_record(&ns("guest")?, "hello", 1);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        let r = record.clone();
        handles.push(tokio::spawn(async move {
            match s.put_record(&r).await {
                Ok(()) => Ok(true),
                Err(StoreError::AlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StoreError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}
