/// All errors that can be returned by an `ActivationStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An activation with this (namespace, activation id) has already been
    /// written. Activation ids are assigned exactly once.
    #[error("activation already exists: {namespace}/{activation_id}")]
    AlreadyExists {
        namespace: String,
        activation_id: String,
    },

    /// A record could not be encoded into a stored document.
    #[error("failed to encode activation document: {0}")]
    Encode(#[from] serde_json::Error),

    /// A backend-specific storage error (connection, timeout, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
