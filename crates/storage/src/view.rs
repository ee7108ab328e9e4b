//! View keys, range queries and index entries.
//!
//! A view is a secondary index over stored activations, ordered by start
//! time descending. Every view is scoped to a namespace prefix; a filtered
//! view additionally matches the action name.

use crate::id::ActivationId;
use crate::path::{NameFilter, Namespace};
use crate::record::PATH_ANNOTATION;

/// Identifies one view: namespace scope plus optional name filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub namespace: Namespace,
    pub name: Option<NameFilter>,
}

impl ViewKey {
    /// All activations under `namespace`.
    pub fn namespace(namespace: Namespace) -> Self {
        Self {
            namespace,
            name: None,
        }
    }

    /// Activations under `namespace` whose action matches `name`.
    pub fn filtered(namespace: Namespace, name: NameFilter) -> Self {
        Self {
            namespace,
            name: Some(name),
        }
    }

    pub fn matches(&self, entry: &IndexEntry) -> bool {
        if !entry.namespace.is_within(&self.namespace) {
            return false;
        }
        match &self.name {
            Some(filter) => filter.matches(entry.name_within(&self.namespace)),
            None => true,
        }
    }
}

/// Start-time window, inclusive on both ends. `None` leaves that end open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: Option<i64>,
    pub upto: Option<i64>,
}

impl TimeWindow {
    pub fn contains(&self, start: i64) -> bool {
        self.since.map_or(true, |since| start >= since)
            && self.upto.map_or(true, |upto| start <= upto)
    }

    pub fn lower(&self) -> i64 {
        self.since.unwrap_or(i64::MIN)
    }

    pub fn upper(&self) -> i64 {
        self.upto.unwrap_or(i64::MAX)
    }
}

/// A page request against a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeQuery {
    pub window: TimeWindow,
    pub skip: usize,
    pub limit: usize,
}

/// Index fields of one stored activation document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub namespace: Namespace,
    pub activation_id: ActivationId,
    /// Fully qualified action path: the `path` annotation, or the owning
    /// namespace followed by the action name.
    pub action_path: Vec<String>,
    pub start: i64,
}

impl IndexEntry {
    /// Extract index fields from a raw document stored under
    /// (`namespace`, `activation_id`).
    ///
    /// Only `name`, `start` and the `path` annotation are read, so a document
    /// whose other fields are damaged is still indexed. Returns `None` when
    /// the document cannot be placed in any view.
    pub fn extract(
        namespace: &Namespace,
        activation_id: &ActivationId,
        document: &serde_json::Value,
    ) -> Option<Self> {
        let name = document.get("name")?.as_str()?;
        let start = document.get("start")?.as_i64()?;
        let path = document
            .get("annotations")
            .and_then(|a| a.as_array())
            .and_then(|annotations| {
                annotations.iter().find_map(|a| {
                    (a.get("key")?.as_str()? == PATH_ANNOTATION)
                        .then(|| a.get("value")?.as_str())
                        .flatten()
                })
            });
        let action_path = match path {
            Some(path) => path.split('/').map(str::to_string).collect(),
            None => namespace
                .segments()
                .iter()
                .cloned()
                .chain(std::iter::once(name.to_string()))
                .collect(),
        };
        Some(Self {
            namespace: namespace.clone(),
            activation_id: activation_id.clone(),
            action_path,
            start,
        })
    }

    /// Action name relative to `scope`. A path outside `scope` is returned
    /// whole.
    pub fn name_within(&self, scope: &Namespace) -> &[String] {
        match self.action_path.strip_prefix(scope.segments()) {
            Some(rest) if !rest.is_empty() => rest,
            _ => &self.action_path,
        }
    }
}
