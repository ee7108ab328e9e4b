use actlog_storage::StoreError;

/// Message returned for documents that fail to decode.
pub const CORRUPTED_ENTITY: &str = "corrupted entity";

/// Errors produced while answering an activation query.
///
/// Every variant's `Display` is safe to return to the caller: no variant
/// leaks decoding detail or whether another tenant's record exists.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// A parameter failed validation. The message names the parameter.
    #[error("{0}")]
    InvalidArgument(String),

    /// The caller may not read the requested namespace.
    #[error("not authorized to access this namespace")]
    Forbidden,

    /// Unknown activation or unknown sub-resource.
    #[error("{0}")]
    NotFound(String),

    /// The request method is not served for activation resources.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// A stored document does not decode into an activation record.
    #[error("corrupted entity")]
    CorruptedRecord,

    /// The store failed.
    #[error("internal error")]
    Store(#[from] StoreError),
}

impl QueryError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
