//! Namespace authorization.

use actlog_storage::Namespace;

use crate::error::QueryError;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub namespace: Namespace,
}

impl Identity {
    pub fn new(subject: impl Into<String>, namespace: Namespace) -> Self {
        Self {
            subject: subject.into(),
            namespace,
        }
    }

    /// Identity whose subject is the namespace root.
    pub fn owner_of(namespace: Namespace) -> Self {
        Self {
            subject: namespace.root().to_string(),
            namespace,
        }
    }
}

/// Allow `identity` to read `requested` only when the namespace belongs to
/// the same subject and is the caller's namespace or nested below it.
///
/// The answer does not depend on what the store holds.
pub fn authorize(identity: &Identity, requested: &Namespace) -> Result<(), QueryError> {
    if requested.root() == identity.subject && requested.is_within(&identity.namespace) {
        return Ok(());
    }
    tracing::debug!(
        subject = %identity.subject,
        namespace = %identity.namespace,
        requested = %requested,
        "namespace access denied"
    );
    Err(QueryError::Forbidden)
}
