use serde::{Deserialize, Serialize};

use crate::id::ActivationId;
use crate::path::{qualified_name, Namespace};

/// Annotation key carrying the fully qualified action path.
pub const PATH_ANNOTATION: &str = "path";

fn default_version() -> String {
    "0.0.1".to_string()
}

/// A completed activation as stored in the backend.
///
/// Records are immutable: the producer writes each one exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRecord {
    pub namespace: Namespace,
    pub name: String,
    pub subject: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub activation_id: ActivationId,
    /// Epoch milliseconds.
    pub start: i64,
    /// Epoch milliseconds; 0 when the activation has no recorded end.
    #[serde(default)]
    pub end: i64,
    pub response: ActivationResponse,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub publish: bool,
}

impl ActivationRecord {
    pub fn annotation(&self, key: &str) -> Option<&serde_json::Value> {
        self.annotations
            .iter()
            .find(|a| a.key == key)
            .map(|a| &a.value)
    }

    /// Fully qualified action path, e.g. `guest/pkg/xyz`.
    pub fn path(&self) -> Option<&str> {
        self.annotation(PATH_ANNOTATION).and_then(|v| v.as_str())
    }

    /// Action name segments relative to the owning namespace.
    pub fn qualified_name(&self) -> Vec<String> {
        qualified_name(&self.namespace, &self.name, self.path())
    }

    pub fn duration(&self) -> Option<i64> {
        (self.end > 0).then(|| self.end - self.start)
    }
}

/// Outcome of an activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl ActivationResponse {
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "application error")]
    ApplicationError,
    #[serde(rename = "action developer error")]
    DeveloperError,
    #[serde(rename = "whisk internal error")]
    InternalError,
}

impl ResponseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ApplicationError => "application error",
            Self::DeveloperError => "action developer error",
            Self::InternalError => "whisk internal error",
        }
    }

    /// Numeric status code reported in summaries.
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::ApplicationError => 1,
            Self::DeveloperError => 2,
            Self::InternalError => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub key: String,
    pub value: serde_json::Value,
}

impl Annotation {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}
