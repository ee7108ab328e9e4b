use async_trait::async_trait;

use crate::error::StoreError;
use crate::id::ActivationId;
use crate::path::Namespace;
use crate::record::ActivationRecord;
use crate::view::{RangeQuery, TimeWindow, ViewKey};

/// The storage trait for activation record backends.
///
/// An `ActivationStore` holds immutable activation documents keyed by
/// (namespace, activation id) and serves secondary views over them.
///
/// ## Consistency
///
/// `get` is read-your-writes: a document is visible by id as soon as `put`
/// returns. Views are not. They are refreshed asynchronously and may lag
/// behind `put` by a staleness window. A view query returns the most recently
/// refreshed state without waiting for the refresher; callers that need to
/// observe a particular write retry with a bounded policy.
///
/// A view never moves backward: once a refreshed view contains a document,
/// every later query against that view also contains it.
///
/// ## Documents
///
/// Documents are raw JSON. Decoding into [`ActivationRecord`] happens at the
/// caller, so a damaged document is still stored, indexed and returned.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait ActivationStore: Send + Sync + 'static {
    // ── Producer side ────────────────────────────────────────────────────────

    /// Store a document under (`namespace`, `activation_id`).
    ///
    /// Returns `Err(StoreError::AlreadyExists)` if the key is taken.
    async fn put(
        &self,
        namespace: &Namespace,
        activation_id: &ActivationId,
        document: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Encode and store a record under its own namespace and id.
    async fn put_record(&self, record: &ActivationRecord) -> Result<(), StoreError> {
        let document = serde_json::to_value(record)?;
        self.put(&record.namespace, &record.activation_id, document)
            .await
    }

    // ── Query side ───────────────────────────────────────────────────────────

    /// Read one document by key. `Ok(None)` when absent.
    async fn get(
        &self,
        namespace: &Namespace,
        activation_id: &ActivationId,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    /// Read a page of a view, newest first.
    ///
    /// The view for `key` is created on first use.
    async fn query_view(
        &self,
        key: &ViewKey,
        query: &RangeQuery,
    ) -> Result<Vec<serde_json::Value>, StoreError>;

    /// Count view entries inside `window` without materializing documents.
    ///
    /// Equals the length of an unbounded `query_view` over the same key and
    /// window at the same refresh state.
    async fn count_view(&self, key: &ViewKey, window: &TimeWindow) -> Result<u64, StoreError>;

    /// Run the view refresher now.
    ///
    /// Backends refresh on their own schedule; this hook only shortens the
    /// staleness window, for loaders and tests.
    async fn refresh_views(&self) -> Result<(), StoreError>;
}
