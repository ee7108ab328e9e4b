//! Materialized view over the in-memory write log.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::id::ActivationId;
use crate::view::{IndexEntry, RangeQuery, TimeWindow, ViewKey};

/// Newest first, ties broken by id.
type RowKey = (Reverse<i64>, ActivationId);

/// One write, in log order.
#[derive(Debug, Clone)]
pub(super) struct LogEntry {
    /// `None` for documents that carry no index fields.
    pub(super) index: Option<IndexEntry>,
    pub(super) document: Arc<serde_json::Value>,
}

#[derive(Debug, Default)]
struct ViewState {
    /// Number of log entries folded into `rows`.
    watermark: usize,
    rows: BTreeMap<RowKey, Arc<serde_json::Value>>,
}

#[derive(Debug)]
pub(super) struct MaterializedView {
    key: ViewKey,
    state: RwLock<ViewState>,
}

impl MaterializedView {
    pub(super) fn new(key: ViewKey) -> Self {
        Self {
            key,
            state: RwLock::new(ViewState::default()),
        }
    }

    /// Fold `log` into the view up to its end. The watermark only advances;
    /// a shorter log than already seen is a no-op.
    pub(super) async fn catch_up(&self, log: &[LogEntry]) -> usize {
        let mut state = self.state.write().await;
        if log.len() <= state.watermark {
            return 0;
        }
        let mut added = 0;
        for entry in &log[state.watermark..] {
            let Some(index) = &entry.index else {
                continue;
            };
            if self.key.matches(index) {
                state.rows.insert(
                    (Reverse(index.start), index.activation_id.clone()),
                    Arc::clone(&entry.document),
                );
                added += 1;
            }
        }
        state.watermark = log.len();
        added
    }

    #[cfg(test)]
    pub(super) async fn watermark(&self) -> usize {
        self.state.read().await.watermark
    }

    pub(super) async fn range(&self, query: &RangeQuery) -> Vec<serde_json::Value> {
        let state = self.state.read().await;
        window_rows(&state.rows, &query.window)
            .skip(query.skip)
            .take(query.limit)
            .map(|(_, doc)| doc.as_ref().clone())
            .collect()
    }

    pub(super) async fn count(&self, window: &TimeWindow) -> u64 {
        let state = self.state.read().await;
        window_rows(&state.rows, window).count() as u64
    }
}

fn window_rows<'a>(
    rows: &'a BTreeMap<RowKey, Arc<serde_json::Value>>,
    window: &TimeWindow,
) -> impl Iterator<Item = (&'a RowKey, &'a Arc<serde_json::Value>)> + 'a {
    let lower = window.lower();
    let first = (Reverse(window.upper()), ActivationId::min_key());
    rows.range((Bound::Included(first), Bound::Unbounded))
        .take_while(move |((Reverse(start), _), _)| *start >= lower)
}
