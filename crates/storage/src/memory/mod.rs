//! In-memory `ActivationStore` with asynchronously refreshed views.
//!
//! Writes land in a document map (immediately visible by id) and in an
//! append-only log. Views are folded from the log only when the refresher
//! runs, either through [`MemoryStore::refresh`] or a task started with
//! [`MemoryStore::spawn_refresher`]. Between refreshes the views are stale.

mod index;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use self::index::{LogEntry, MaterializedView};
use crate::error::StoreError;
use crate::id::ActivationId;
use crate::path::Namespace;
use crate::traits::ActivationStore;
use crate::view::{IndexEntry, RangeQuery, TimeWindow, ViewKey};

type DocumentKey = (Namespace, ActivationId);

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<DocumentKey, Arc<serde_json::Value>>>,
    log: RwLock<Vec<LogEntry>>,
    /// Log length published by the last refresh. Views created later start
    /// from here so they agree with views that already exist.
    refreshed: AtomicUsize,
    views: RwLock<HashMap<ViewKey, Arc<MaterializedView>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold every write so far into every view. Returns the new frontier.
    pub async fn refresh(&self) -> usize {
        // Publish the frontier before snapshotting the views: a view created
        // after the snapshot starts from this frontier.
        let frontier = self.log.read().await.len();
        self.refreshed.fetch_max(frontier, Ordering::SeqCst);
        let views: Vec<Arc<MaterializedView>> = self.views.read().await.values().cloned().collect();

        let log = self.log.read().await;
        let mut added = 0;
        for view in &views {
            added += view.catch_up(&log[..frontier]).await;
        }
        if added > 0 {
            tracing::debug!(frontier, views = views.len(), added, "views refreshed");
        }
        frontier
    }

    /// Refresh views every `interval` until the returned handle is aborted.
    pub fn spawn_refresher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.refresh().await;
            }
        })
    }

    /// Number of writes not yet folded into views.
    pub async fn pending(&self) -> usize {
        let log = self.log.read().await;
        log.len()
            .saturating_sub(self.refreshed.load(Ordering::SeqCst))
    }

    /// Number of views created so far.
    pub async fn view_count(&self) -> usize {
        self.views.read().await.len()
    }

    /// Look up the view for `key`, creating it if absent.
    ///
    /// A new view is caught up to the refreshed frontier before it is
    /// published, so no reader sees it empty. Concurrent callers for the same
    /// key end up sharing one view.
    async fn view(&self, key: &ViewKey) -> Arc<MaterializedView> {
        if let Some(view) = self.views.read().await.get(key) {
            return Arc::clone(view);
        }

        let mut views = self.views.write().await;
        if let Some(view) = views.get(key) {
            return Arc::clone(view);
        }
        let view = Arc::new(MaterializedView::new(key.clone()));
        let added = {
            let log = self.log.read().await;
            let frontier = self.refreshed.load(Ordering::SeqCst).min(log.len());
            view.catch_up(&log[..frontier]).await
        };
        views.insert(key.clone(), Arc::clone(&view));
        tracing::debug!(
            namespace = %key.namespace,
            name = ?key.name.as_ref().map(ToString::to_string),
            added,
            "view created"
        );
        view
    }
}

#[async_trait]
impl ActivationStore for MemoryStore {
    async fn put(
        &self,
        namespace: &Namespace,
        activation_id: &ActivationId,
        document: serde_json::Value,
    ) -> Result<(), StoreError> {
        let key = (namespace.clone(), activation_id.clone());
        let index = IndexEntry::extract(namespace, activation_id, &document);
        if index.is_none() {
            tracing::warn!(
                namespace = %namespace,
                activation_id = %activation_id,
                "stored activation has no index fields; it will not appear in views"
            );
        }
        let document = Arc::new(document);

        let mut documents = self.documents.write().await;
        if documents.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                namespace: namespace.to_string(),
                activation_id: activation_id.to_string(),
            });
        }
        documents.insert(key, Arc::clone(&document));
        self.log.write().await.push(LogEntry { index, document });
        Ok(())
    }

    async fn get(
        &self,
        namespace: &Namespace,
        activation_id: &ActivationId,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let key = (namespace.clone(), activation_id.clone());
        Ok(self
            .documents
            .read()
            .await
            .get(&key)
            .map(|doc| doc.as_ref().clone()))
    }

    async fn query_view(
        &self,
        key: &ViewKey,
        query: &RangeQuery,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        let view = self.view(key).await;
        Ok(view.range(query).await)
    }

    async fn count_view(&self, key: &ViewKey, window: &TimeWindow) -> Result<u64, StoreError> {
        let view = self.view(key).await;
        Ok(view.count(window).await)
    }

    async fn refresh_views(&self) -> Result<(), StoreError> {
        self.refresh().await;
        Ok(())
    }
}
