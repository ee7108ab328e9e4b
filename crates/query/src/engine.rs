//! The query engine: validate, authorize, translate, read, project.

use std::sync::Arc;

use actlog_storage::{ActivationStore, StoreError};
use serde_json::{json, Value};

use crate::authz::{authorize, Identity};
use crate::error::QueryError;
use crate::project::{decode, full, project, summary};
use crate::retry::{retry_until, RetryError, RetryPolicy};
use crate::spec::{ListLimits, ListParams, QuerySpec, COLLECTION};
use crate::translate::{translate, QueryPlan};
use crate::validate::{validate_get, validate_list};

/// Answer to one query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Count(u64),
    List(Vec<Value>),
    Document(Value),
}

impl QueryOutput {
    /// Number of activations this output describes.
    pub fn len(&self) -> usize {
        match self {
            Self::Count(n) => usize::try_from(*n).unwrap_or(usize::MAX),
            Self::List(items) => items.len(),
            Self::Document(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Response body.
    pub fn into_json(self) -> Value {
        match self {
            Self::Count(n) => json!({ COLLECTION: n }),
            Self::List(items) => Value::Array(items),
            Self::Document(doc) => doc,
        }
    }
}

/// Activation queries over a shared store.
pub struct ActivationQueries<S: ActivationStore> {
    store: Arc<S>,
    limits: ListLimits,
}

impl<S: ActivationStore> Clone for ActivationQueries<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            limits: self.limits,
        }
    }
}

impl<S: ActivationStore> ActivationQueries<S> {
    pub fn new(store: Arc<S>, limits: ListLimits) -> Self {
        Self { store, limits }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn limits(&self) -> ListLimits {
        self.limits
    }

    /// `GET /{namespace}/activations`
    pub async fn list(
        &self,
        identity: &Identity,
        namespace: &str,
        params: &ListParams,
    ) -> Result<QueryOutput, QueryError> {
        let spec = validate_list(namespace, params, &self.limits)?;
        self.query_once(identity, &spec).await
    }

    /// `GET /{namespace}/activations/{id}[/{sub_resource}]`
    pub async fn get(
        &self,
        identity: &Identity,
        namespace: &str,
        activation_id: &str,
        sub_resource: Option<&str>,
    ) -> Result<QueryOutput, QueryError> {
        let spec = validate_get(namespace, activation_id, sub_resource)?;
        self.query_once(identity, &spec).await
    }

    /// Answer `spec` from the current refresh state of the store.
    ///
    /// Never waits for the refresher and has no side effects, so it can be
    /// re-issued freely. Authorization runs before any store access.
    pub async fn query_once(
        &self,
        identity: &Identity,
        spec: &QuerySpec,
    ) -> Result<QueryOutput, QueryError> {
        authorize(identity, &spec.namespace)?;
        let plan = translate(spec);
        tracing::debug!(namespace = %spec.namespace, mode = ?spec.mode, "activation query");

        match plan {
            QueryPlan::Count { key, window } => {
                let n = self.store.count_view(&key, &window).await.map_err(store_failure)?;
                Ok(QueryOutput::Count(n))
            }
            QueryPlan::Page { key, query, docs } => {
                let documents = self.store.query_view(&key, &query).await.map_err(store_failure)?;
                let items = documents
                    .into_iter()
                    .map(|doc| {
                        let record = decode(doc)?;
                        Ok(if docs { full(&record) } else { summary(&record) })
                    })
                    .collect::<Result<Vec<_>, QueryError>>()?;
                Ok(QueryOutput::List(items))
            }
            QueryPlan::Lookup {
                namespace,
                activation_id,
                sub_resource,
            } => {
                let document = self
                    .store
                    .get(&namespace, &activation_id)
                    .await
                    .map_err(store_failure)?
                    .ok_or_else(|| {
                        QueryError::NotFound(format!("activation '{activation_id}' not found"))
                    })?;
                let record = decode(document)?;
                project(&record, sub_resource.as_ref()).map(QueryOutput::Document)
            }
        }
    }

    /// Re-issue `spec` until `accept` holds, within `policy`.
    pub async fn query_until<F>(
        &self,
        identity: &Identity,
        spec: &QuerySpec,
        policy: &RetryPolicy,
        accept: F,
    ) -> Result<QueryOutput, RetryError<QueryOutput, QueryError>>
    where
        F: FnMut(&QueryOutput) -> bool,
    {
        retry_until(policy, move || Self::query_once(self, identity, spec), accept).await
    }
}

fn store_failure(err: StoreError) -> QueryError {
    tracing::error!(error = %err, "activation store failure");
    QueryError::Store(err)
}
