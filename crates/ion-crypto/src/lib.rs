//! Content hashing for the ION object repository.
//!
//! Every structure element is keyed by
//! `sha1(sha1(value) ‖ protobuf(type))`. The construction is part of the
//! wire contract: two processes must compute identical keys for identical
//! content, so the digest wraps an established SHA1 implementation and adds
//! no custom cryptography.

pub mod hasher;

pub use hasher::ContentHasher;
