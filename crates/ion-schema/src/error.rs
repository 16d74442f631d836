use ion_types::ObjectType;
use thiserror::Error;

/// Errors produced by schema lookups and message (de)serialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown object type {0}")]
    UnknownType(ObjectType),

    #[error("unknown type name: {0}")]
    UnknownTypeName(String),

    #[error("type {0} is already registered")]
    DuplicateType(ObjectType),

    #[error("field {field} declared twice in {schema}")]
    DuplicateField { schema: String, field: String },

    #[error("{schema} has no field named {field}")]
    UnknownField { schema: String, field: String },

    #[error("type mismatch on {field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("field {0} is repeated")]
    NotSingular(String),

    #[error("field {0} is not repeated")]
    NotRepeated(String),

    #[error("index {index} out of range for {field} (length {len})")]
    IndexOutOfRange {
        field: String,
        index: usize,
        len: usize,
    },

    #[error("cannot serialize {0}: it links to an object that has not been hashed")]
    UnhashedLink(ObjectType),

    #[error("malformed {object_type} message: {reason}")]
    Malformed {
        object_type: ObjectType,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type SchemaResult<T> = Result<T, SchemaError>;
