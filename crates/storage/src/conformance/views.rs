use std::future::Future;

use super::{everything, make_package_record, make_record, ns, put_all, starts, TestResult};
use crate::view::{RangeQuery, TimeWindow, ViewKey};
use crate::{ActivationId, ActivationStore, NameFilter};

pub(super) async fn run_view_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "views",
        "namespace_view_is_newest_first",
        namespace_view_is_newest_first(factory).await,
    ));
    results.push(TestResult::from_result(
        "views",
        "namespace_views_are_isolated",
        namespace_views_are_isolated(factory).await,
    ));
    results.push(TestResult::from_result(
        "views",
        "namespace_view_includes_nested_namespaces",
        namespace_view_includes_nested_namespaces(factory).await,
    ));
    results.push(TestResult::from_result(
        "views",
        "time_window_is_inclusive",
        time_window_is_inclusive(factory).await,
    ));
    results.push(TestResult::from_result(
        "views",
        "skip_and_limit_page_the_window",
        skip_and_limit_page_the_window(factory).await,
    ));
    results.push(TestResult::from_result(
        "views",
        "simple_name_filter_excludes_packaged_actions",
        simple_name_filter_excludes_packaged_actions(factory).await,
    ));
    results.push(TestResult::from_result(
        "views",
        "package_name_filter_matches_exact_path",
        package_name_filter_matches_exact_path(factory).await,
    ));
    results.push(TestResult::from_result(
        "views",
        "name_filter_is_relative_to_view_namespace",
        name_filter_is_relative_to_view_namespace(factory).await,
    ));
    results.push(TestResult::from_result(
        "views",
        "count_matches_list_length",
        count_matches_list_length(factory).await,
    ));
    results.push(TestResult::from_result(
        "views",
        "unindexable_document_is_not_listed",
        unindexable_document_is_not_listed(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn namespace_view_is_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    let records: Vec<_> = [20, 40, 10, 30]
        .iter()
        .map(|start| make_record(&owner, "hello", *start))
        .collect();
    put_all(&s, &records).await?;
    s.refresh_views().await.map_err(|e| e.to_string())?;

    let docs = s
        .query_view(&ViewKey::namespace(owner), &everything())
        .await
        .map_err(|e| e.to_string())?;
    let got = starts(&docs);
    if got != vec![40, 30, 20, 10] {
        return Err(format!("expected [40, 30, 20, 10], got {got:?}"));
    }
    Ok(())
}

/// Two records under a/b and two under c/d: each namespace view sees
/// exactly its own two.
async fn namespace_views_are_isolated<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ab = ns("a/b")?;
    let cd = ns("c/d")?;
    let records = vec![
        make_record(&ab, "x", 1),
        make_record(&ab, "x", 2),
        make_record(&cd, "x", 3),
        make_record(&cd, "x", 4),
    ];
    put_all(&s, &records).await?;
    s.refresh_views().await.map_err(|e| e.to_string())?;

    for (owner, expected) in [(&ab, &records[..2]), (&cd, &records[2..])] {
        let docs = s
            .query_view(&ViewKey::namespace(owner.clone()), &everything())
            .await
            .map_err(|e| e.to_string())?;
        let mut got: Vec<String> = docs
            .iter()
            .filter_map(|d| d["activationId"].as_str().map(str::to_string))
            .collect();
        let mut want: Vec<String> = expected
            .iter()
            .map(|r| r.activation_id.to_string())
            .collect();
        got.sort();
        want.sort();
        if got != want {
            return Err(format!("view {owner}: expected {want:?}, got {got:?}"));
        }
    }
    Ok(())
}

async fn namespace_view_includes_nested_namespaces<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let records = vec![
        make_record(&ns("a")?, "x", 1),
        make_record(&ns("a/b")?, "x", 2),
        make_record(&ns("a/b/c")?, "x", 3),
        make_record(&ns("a/bc")?, "x", 4),
    ];
    put_all(&s, &records).await?;
    s.refresh_views().await.map_err(|e| e.to_string())?;

    let docs = s
        .query_view(&ViewKey::namespace(ns("a/b")?), &everything())
        .await
        .map_err(|e| e.to_string())?;
    let got = starts(&docs);
    if got != vec![3, 2] {
        return Err(format!("expected a/b and a/b/c only ([3, 2]), got {got:?}"));
    }
    Ok(())
}

async fn time_window_is_inclusive<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    let records: Vec<_> = [99, 100, 150, 200, 201]
        .iter()
        .map(|start| make_record(&owner, "hello", *start))
        .collect();
    put_all(&s, &records).await?;
    s.refresh_views().await.map_err(|e| e.to_string())?;

    let key = ViewKey::namespace(owner);
    let cases = [
        (Some(100), Some(200), vec![200, 150, 100]),
        (Some(100), None, vec![201, 200, 150, 100]),
        (None, Some(100), vec![100, 99]),
        (Some(150), Some(150), vec![150]),
        (Some(200), Some(100), vec![]),
    ];
    for (since, upto, expected) in cases {
        let window = TimeWindow { since, upto };
        let query = RangeQuery {
            window,
            ..everything()
        };
        let docs = s
            .query_view(&key, &query)
            .await
            .map_err(|e| e.to_string())?;
        let got = starts(&docs);
        if got != expected {
            return Err(format!(
                "window {since:?}..={upto:?}: expected {expected:?}, got {got:?}"
            ));
        }
    }
    Ok(())
}

async fn skip_and_limit_page_the_window<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    let records: Vec<_> = (1..=6)
        .map(|start| make_record(&owner, "hello", start * 10))
        .collect();
    put_all(&s, &records).await?;
    s.refresh_views().await.map_err(|e| e.to_string())?;

    let key = ViewKey::namespace(owner);
    let query = RangeQuery {
        window: TimeWindow {
            since: Some(20),
            upto: None,
        },
        skip: 1,
        limit: 2,
    };
    let docs = s
        .query_view(&key, &query)
        .await
        .map_err(|e| e.to_string())?;
    let got = starts(&docs);
    if got != vec![50, 40] {
        return Err(format!("expected [50, 40], got {got:?}"));
    }

    let past_end = RangeQuery {
        skip: 10,
        ..query
    };
    let docs = s
        .query_view(&key, &past_end)
        .await
        .map_err(|e| e.to_string())?;
    if !docs.is_empty() {
        return Err(format!("skip past end returned {} documents", docs.len()));
    }
    Ok(())
}

async fn simple_name_filter_excludes_packaged_actions<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    let records = vec![
        make_record(&owner, "xyz", 1),
        make_package_record(&owner, "pkg", "xyz", 2),
        make_record(&owner, "abc", 3),
    ];
    put_all(&s, &records).await?;
    s.refresh_views().await.map_err(|e| e.to_string())?;

    let filter = NameFilter::parse("xyz").map_err(|e| e.to_string())?;
    let docs = s
        .query_view(&ViewKey::filtered(owner, filter), &everything())
        .await
        .map_err(|e| e.to_string())?;
    let got = starts(&docs);
    if got != vec![1] {
        return Err(format!("expected only the unpackaged xyz ([1]), got {got:?}"));
    }
    Ok(())
}

async fn package_name_filter_matches_exact_path<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    let records = vec![
        make_record(&owner, "xyz", 1),
        make_package_record(&owner, "pkg", "xyz", 2),
        make_package_record(&owner, "other", "xyz", 3),
        make_package_record(&owner, "pkg", "abc", 4),
    ];
    put_all(&s, &records).await?;
    s.refresh_views().await.map_err(|e| e.to_string())?;

    let filter = NameFilter::parse("pkg/xyz").map_err(|e| e.to_string())?;
    let docs = s
        .query_view(&ViewKey::filtered(owner, filter), &everything())
        .await
        .map_err(|e| e.to_string())?;
    let got = starts(&docs);
    if got != vec![2] {
        return Err(format!("expected only guest/pkg/xyz ([2]), got {got:?}"));
    }
    Ok(())
}

/// An action stored under a nested namespace is named relative to the
/// namespace being listed, not the one it was stored under.
async fn name_filter_is_relative_to_view_namespace<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    let nested = ns("guest/pkg")?;
    put_all(&s, &[make_record(&nested, "xyz", 1)]).await?;
    s.refresh_views().await.map_err(|e| e.to_string())?;

    let cases = [
        (owner.clone(), "xyz", Vec::<i64>::new()),
        (owner, "pkg/xyz", vec![1_i64]),
        (nested, "xyz", vec![1_i64]),
    ];
    for (namespace, name, expected) in cases {
        let filter = NameFilter::parse(name).map_err(|e| e.to_string())?;
        let docs = s
            .query_view(&ViewKey::filtered(namespace.clone(), filter), &everything())
            .await
            .map_err(|e| e.to_string())?;
        let got = starts(&docs);
        if got != expected {
            return Err(format!(
                "name '{name}' under {namespace}: expected {expected:?}, got {got:?}"
            ));
        }
    }
    Ok(())
}

async fn count_matches_list_length<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    let mut records: Vec<_> = (0..12)
        .map(|i| make_record(&owner, if i % 3 == 0 { "xyz" } else { "abc" }, i * 10))
        .collect();
    records.push(make_package_record(&owner, "pkg", "xyz", 55));
    put_all(&s, &records).await?;
    s.refresh_views().await.map_err(|e| e.to_string())?;

    let keys = [
        ViewKey::namespace(owner.clone()),
        ViewKey::filtered(
            owner.clone(),
            NameFilter::parse("xyz").map_err(|e| e.to_string())?,
        ),
        ViewKey::filtered(
            owner,
            NameFilter::parse("pkg/xyz").map_err(|e| e.to_string())?,
        ),
    ];
    let windows = [
        TimeWindow::default(),
        TimeWindow {
            since: Some(30),
            upto: Some(90),
        },
        TimeWindow {
            since: None,
            upto: Some(55),
        },
    ];
    for key in &keys {
        for window in &windows {
            let count = s
                .count_view(key, window)
                .await
                .map_err(|e| e.to_string())?;
            let query = RangeQuery {
                window: *window,
                ..everything()
            };
            let listed = s
                .query_view(key, &query)
                .await
                .map_err(|e| e.to_string())?
                .len() as u64;
            if count != listed {
                return Err(format!(
                    "{key:?} {window:?}: count {count} != list length {listed}"
                ));
            }
        }
    }
    Ok(())
}

async fn unindexable_document_is_not_listed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ActivationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let owner = ns("guest")?;
    s.put(&owner, &ActivationId::generate(), serde_json::json!({"junk": true}))
        .await
        .map_err(|e| e.to_string())?;
    put_all(&s, &[make_record(&owner, "hello", 7)]).await?;
    s.refresh_views().await.map_err(|e| e.to_string())?;

    let count = s
        .count_view(&ViewKey::namespace(owner), &TimeWindow::default())
        .await
        .map_err(|e| e.to_string())?;
    if count != 1 {
        return Err(format!("expected 1 indexed document, got {count}"));
    }
    Ok(())
}
