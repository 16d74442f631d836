use ion_types::{ObjectKey, ObjectType};

use crate::container::Container;
use crate::error::{ProtocolError, ProtocolResult};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Response status codes.
pub mod status {
    pub const OK: u32 = 200;
    pub const BAD_REQUEST: u32 = 400;
    pub const NOT_FOUND: u32 = 404;
    pub const CONFLICT: u32 = 409;
    pub const SERVER_ERROR: u32 = 500;
}

/// Remote operations a workbench serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Pull,
    Push,
    FetchLinkedObjects,
}

impl Operation {
    pub fn tag(&self) -> u8 {
        match self {
            Self::Pull => 1,
            Self::Push => 2,
            Self::FetchLinkedObjects => 3,
        }
    }

    pub fn from_tag(tag: u8) -> ProtocolResult<Self> {
        match tag {
            1 => Ok(Self::Pull),
            2 => Ok(Self::Push),
            3 => Ok(Self::FetchLinkedObjects),
            other => Err(ProtocolError::InvalidOperation(other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Push => "push",
            Self::FetchLinkedObjects => "fetch_linked_objects",
        }
    }

    pub fn parse(name: &str) -> ProtocolResult<Self> {
        match name {
            "pull" => Ok(Self::Pull),
            "push" => Ok(Self::Push),
            "fetch_linked_objects" => Ok(Self::FetchLinkedObjects),
            other => Err(ProtocolError::UnknownOperation(other.to_string())),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Ask the remote for a repository's mutable head and commit history.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PullRequest {
    #[prost(string, tag = "1")]
    pub repository_key: String,
    /// Also ship the object tree of every branch head.
    #[prost(bool, tag = "2")]
    pub get_head_content: bool,
    #[prost(message, repeated, tag = "3")]
    pub excluded_types: Vec<ObjectType>,
    /// Commits the requester already holds; the walk stops there.
    #[prost(bytes = "vec", repeated, tag = "4")]
    pub commit_keys: Vec<Vec<u8>>,
}

/// Offer one or more repositories, each as its own container.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PushRequest {
    #[prost(message, repeated, tag = "1")]
    pub repositories: Vec<Container>,
}

/// Ask for specific elements and whatever they reach.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FetchRequest {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub keys: Vec<Vec<u8>>,
    #[prost(message, repeated, tag = "2")]
    pub excluded_types: Vec<ObjectType>,
}

impl FetchRequest {
    pub fn new(keys: impl IntoIterator<Item = ObjectKey>) -> Self {
        Self {
            keys: keys.into_iter().map(|k| k.to_vec()).collect(),
            excluded_types: Vec::new(),
        }
    }

    pub fn object_keys(&self) -> ProtocolResult<Vec<ObjectKey>> {
        decode_keys(&self.keys)
    }
}

impl PullRequest {
    pub fn known_commits(&self) -> ProtocolResult<Vec<ObjectKey>> {
        decode_keys(&self.commit_keys)
    }
}

fn decode_keys(raw: &[Vec<u8>]) -> ProtocolResult<Vec<ObjectKey>> {
    raw.iter()
        .map(|k| ObjectKey::from_slice(k).map_err(ProtocolError::from))
        .collect()
}

/// Reply to any operation.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Response {
    #[prost(uint32, tag = "1")]
    pub status: u32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(bytes = "vec", tag = "3")]
    pub payload: Vec<u8>,
}

impl Response {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            status: status::OK,
            message: String::new(),
            payload,
        }
    }

    pub fn error(status: u32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            payload: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == status::OK
    }

    /// The payload of a successful reply, or the remote error.
    pub fn into_payload(self) -> ProtocolResult<Vec<u8>> {
        if self.is_ok() {
            Ok(self.payload)
        } else {
            Err(ProtocolError::Remote {
                status: self.status,
                message: self.message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn operation_tags_and_names_agree() {
        for op in [Operation::Pull, Operation::Push, Operation::FetchLinkedObjects] {
            assert_eq!(Operation::from_tag(op.tag()).unwrap(), op);
            assert_eq!(Operation::parse(op.name()).unwrap(), op);
        }
        assert!(matches!(Operation::from_tag(9), Err(ProtocolError::InvalidOperation(9))));
        assert!(Operation::parse("clone").is_err());
    }

    #[test]
    fn error_response_surfaces_status() {
        let err = Response::error(status::NOT_FOUND, "no such repository")
            .into_payload()
            .unwrap_err();
        match err {
            ProtocolError::Remote { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "no such repository");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fetch_request_keys_decode() {
        let key = ObjectKey::from_hash([7; 20]);
        let request = FetchRequest::new([key]);
        let decoded = FetchRequest::decode(request.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.object_keys().unwrap(), vec![key]);
    }

    #[test]
    fn malformed_commit_key_is_rejected() {
        let request = PullRequest {
            repository_key: "r".into(),
            commit_keys: vec![vec![1, 2, 3]],
            ..Default::default()
        };
        assert!(matches!(request.known_commits(), Err(ProtocolError::InvalidKey(_))));
    }
}
