use ion_store::StoreError;
use ion_types::{ObjectKey, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid operation tag: {0}")]
    InvalidOperation(u8),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("framing error: {0}")]
    FramingError(String),

    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("element {0} carries no object type")]
    MissingType(ObjectKey),

    #[error("invalid element key: {0}")]
    InvalidKey(#[from] TypeError),

    #[error("rejected element: {0}")]
    Store(#[from] StoreError),

    #[error("remote error: status={status}, message={message}")]
    Remote { status: u32, message: String },
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
