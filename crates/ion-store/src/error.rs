use ion_types::ObjectKey;

/// Errors from element store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The requested element was not found.
    #[error("element not found: {0}")]
    NotFound(ObjectKey),

    /// Content hash mismatch (data corruption).
    #[error("hash mismatch for {key}: computed {computed}")]
    HashMismatch { key: ObjectKey, computed: ObjectKey },

    /// Different content was offered under an existing key.
    #[error("hash collision on {0}: stored content differs")]
    HashCollision(ObjectKey),

    /// The element is malformed or cannot be decoded.
    #[error("corrupt element {key}: {reason}")]
    CorruptElement { key: ObjectKey, reason: String },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
