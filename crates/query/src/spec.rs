//! Query specifications: the validated form of a request.

use actlog_storage::{ActivationId, NameFilter, Namespace, TimeWindow};
use serde::Deserialize;

/// Name of the collection, used in count bodies and range errors.
pub const COLLECTION: &str = "activations";

/// Page size used when `limit` is absent or not positive.
pub const DEFAULT_LIST_LIMIT: usize = 30;

/// Largest `limit` a caller may ask for.
pub const MAX_LIST_LIMIT: usize = 200;

/// Paging bounds for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for ListLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIST_LIMIT,
            max_limit: MAX_LIST_LIMIT,
        }
    }
}

/// Raw list parameters as they arrive in a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListParams {
    pub count: Option<String>,
    pub docs: Option<String>,
    pub name: Option<String>,
    pub since: Option<String>,
    pub upto: Option<String>,
    pub limit: Option<String>,
    pub skip: Option<String>,
}

/// Trailing path segment after an activation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubResource {
    Result,
    Logs,
    /// Any other segment. Resolves to "not found" once the record is known.
    Unknown(String),
}

impl SubResource {
    pub fn parse(segment: &str) -> Self {
        match segment {
            "result" => Self::Result,
            "logs" => Self::Logs,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// What a query returns. Exactly one mode per query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Number of matching activations.
    Count,
    /// Summaries of matching activations.
    SummaryList,
    /// Full documents of matching activations.
    FullList,
    /// One activation, full representation.
    ById(ActivationId),
    /// One activation, projected onto a sub-resource.
    Projection(ActivationId, SubResource),
}

impl OutputMode {
    pub fn is_single(&self) -> bool {
        matches!(self, Self::ById(_) | Self::Projection(..))
    }
}

/// A validated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub namespace: Namespace,
    pub name: Option<NameFilter>,
    pub window: TimeWindow,
    pub mode: OutputMode,
    pub skip: usize,
    pub limit: usize,
}

impl QuerySpec {
    /// A single-record query; list fields keep their neutral values.
    pub fn single(namespace: Namespace, mode: OutputMode) -> Self {
        Self {
            namespace,
            name: None,
            window: TimeWindow::default(),
            mode,
            skip: 0,
            limit: 1,
        }
    }
}
