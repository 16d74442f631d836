use ion_types::{ObjectKey, ObjectType};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Where a link points.
///
/// A freshly created or modified object is addressed by a workspace-local id
/// that is only meaningful inside one repository; commit replaces it with
/// the content hash of the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKey {
    Null,
    Local(u64),
    Hash(ObjectKey),
}

impl LinkKey {
    pub fn is_null(&self) -> bool {
        matches!(self, LinkKey::Null)
    }

    pub fn is_local(&self) -> bool {
        matches!(self, LinkKey::Local(_))
    }

    pub fn as_hash(&self) -> Option<ObjectKey> {
        match self {
            LinkKey::Hash(key) => Some(*key),
            _ => None,
        }
    }
}

impl std::fmt::Display for LinkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkKey::Null => write!(f, "null"),
            LinkKey::Local(id) => write!(f, "local:{id}"),
            LinkKey::Hash(key) => write!(f, "{}", key.short_hex()),
        }
    }
}

/// A reference from one structured object to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub key: LinkKey,
    /// Declared type of the target; `None` only for an untyped null link.
    pub object_type: Option<ObjectType>,
    /// Whether the target has no outgoing links of its own.
    pub isleaf: bool,
}

impl Link {
    /// A link that points nowhere.
    pub fn null(object_type: Option<ObjectType>) -> Self {
        Self {
            key: LinkKey::Null,
            object_type,
            isleaf: false,
        }
    }

    /// A link to a hashed object.
    pub fn to_hash(key: ObjectKey, object_type: ObjectType, isleaf: bool) -> Self {
        Self {
            key: LinkKey::Hash(key),
            object_type: Some(object_type),
            isleaf,
        }
    }

    pub fn is_null(&self) -> bool {
        self.key.is_null()
    }
}

/// A single field value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    /// An embedded (composite) message. It is part of its owner's content.
    Message(Box<Message>),
    Link(Link),
}

impl Value {
    /// Short name of the variant, used in type-mismatch errors.
    pub fn kind_name(&self) -> String {
        match self {
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::UInt(_) => "uint".into(),
            Value::Double(_) => "double".into(),
            Value::String(_) => "string".into(),
            Value::Bytes(_) => "bytes".into(),
            Value::Message(m) => format!("message {}", m.object_type()),
            Value::Link(l) => match l.object_type {
                Some(t) => format!("link to {t}"),
                None => "link".into(),
            },
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_message_mut(&mut self) -> Option<&mut Message> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&Link> {
        match self {
            Value::Link(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_link_mut(&mut self) -> Option<&mut Link> {
        match self {
            Value::Link(l) => Some(l),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Message> for Value {
    fn from(v: Message) -> Self {
        Value::Message(Box::new(v))
    }
}

impl From<Link> for Value {
    fn from(v: Link) -> Self {
        Value::Link(v)
    }
}
