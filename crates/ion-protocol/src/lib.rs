//! Wire protocol for the ION object repository.
//!
//! Repositories move between processes as a [`Container`]: a list of head
//! elements plus every other element needed to make the heads resolvable.
//! A container with no heads is a plain content fetch. Requests and
//! responses are protobuf messages so the element layout stays
//! bit-compatible with every other participant; [`IonCodec`] adds a length
//! and operation-tag frame for byte-stream transports.

pub mod codec;
pub mod container;
pub mod error;
pub mod message;

pub use codec::{Frame, IonCodec};
pub use container::{Container, WireElement};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    status, FetchRequest, Operation, PullRequest, PushRequest, Response, MAX_MESSAGE_SIZE,
    PROTOCOL_VERSION,
};
