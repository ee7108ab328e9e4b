use std::future::Future;

use super::{make_record, ns, put_all, TestResult};
use crate::view::{TimeWindow, ViewKey};
use crate::{ActivationStore, NameFilter};

pub(super) async fn run_refresh_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "refresh",
        "refreshed_write_is_listed",
        refreshed_write_is_listed(factory).await,
    ));
    results.push(TestResult::from_result(
        "refresh",
        "refresh_is_idempotent",
        refresh_is_idempotent(factory).await,
    ));
    results.push(TestResult::from_result(
        "refresh",
        "view_never_shrinks",
        view_never_shrinks(factory).await,
    ));
    results.push(TestResult::from_result(
        "refresh",
        "new_view_sees_refreshed_writes",
        new_view_sees_refreshed_writes(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// Whatever the staleness window, a write is in the view after a refresh.
async fn refreshed_write_is_listed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    let key = ViewKey::namespace(owner.clone());

    // Touch the view first so it exists before the write.
    s.count_view(&key, &TimeWindow::default())
        .await
        .map_err(|e| e.to_string())?;
    put_all(&s, &[make_record(&owner, "hello", 1)]).await?;
    s.refresh_views().await.map_err(|e| e.to_string())?;

    let count = s
        .count_view(&key, &TimeWindow::default())
        .await
        .map_err(|e| e.to_string())?;
    if count != 1 {
        return Err(format!("expected 1 after refresh, got {count}"));
    }
    Ok(())
}

async fn refresh_is_idempotent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    put_all(
        &s,
        &[make_record(&owner, "hello", 1), make_record(&owner, "hello", 2)],
    )
    .await?;
    let key = ViewKey::namespace(owner);
    for round in 0..3 {
        s.refresh_views().await.map_err(|e| e.to_string())?;
        let count = s
            .count_view(&key, &TimeWindow::default())
            .await
            .map_err(|e| e.to_string())?;
        if count != 2 {
            return Err(format!("round {round}: expected 2, got {count}"));
        }
    }
    Ok(())
}

/// Interleave writes, refreshes and reads; observed counts never decrease.
async fn view_never_shrinks<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    let key = ViewKey::namespace(owner.clone());
    let mut last = 0;
    for i in 0..10 {
        put_all(&s, &[make_record(&owner, "hello", i)]).await?;
        if i % 2 == 0 {
            s.refresh_views().await.map_err(|e| e.to_string())?;
        }
        let count = s
            .count_view(&key, &TimeWindow::default())
            .await
            .map_err(|e| e.to_string())?;
        if count < last {
            return Err(format!("view moved backward: {last} -> {count}"));
        }
        last = count;
    }
    s.refresh_views().await.map_err(|e| e.to_string())?;
    let count = s
        .count_view(&key, &TimeWindow::default())
        .await
        .map_err(|e| e.to_string())?;
    if count != 10 {
        return Err(format!("expected 10 after final refresh, got {count}"));
    }
    Ok(())
}

/// A view created after a refresh already contains the refreshed writes.
async fn new_view_sees_refreshed_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    put_all(
        &s,
        &[make_record(&owner, "xyz", 1), make_record(&owner, "abc", 2)],
    )
    .await?;
    s.refresh_views().await.map_err(|e| e.to_string())?;

    let filter = NameFilter::parse("xyz").map_err(|e| e.to_string())?;
    let count = s
        .count_view(&ViewKey::filtered(owner, filter), &TimeWindow::default())
        .await
        .map_err(|e| e.to_string())?;
    if count != 1 {
        return Err(format!("expected 1 in a fresh filtered view, got {count}"));
    }
    Ok(())
}
