use std::fmt;

use serde::{Deserialize, Serialize};

/// Type identifier of a structured object: schema id plus schema version.
///
/// The protobuf encoding of this pair is part of every content hash, so the
/// field numbers are fixed by the wire container format.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, prost::Message)]
pub struct ObjectType {
    #[prost(int32, tag = "1")]
    pub object_id: i32,
    #[prost(int32, tag = "2")]
    pub version: i32,
}

impl ObjectType {
    pub const fn new(object_id: i32, version: i32) -> Self {
        Self { object_id, version }
    }

    /// Protobuf encoding of the type, as mixed into content hashes.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        prost::Message::encode_to_vec(self)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.v{}", self.object_id, self.version)
    }
}

/// Type ids reserved by the repository core.
pub mod well_known {
    use super::ObjectType;

    /// Reference to another repository's state (key, branch, commit).
    pub const IDREF: ObjectType = ObjectType::new(4, 1);
    /// Mutable repository head: branch table and repository key.
    pub const MUTABLE_HEAD: ObjectType = ObjectType::new(6, 1);
    /// Immutable commit node.
    pub const COMMIT: ObjectType = ObjectType::new(8, 1);
    /// Subject / predicate / object triple.
    pub const ASSOCIATION: ObjectType = ObjectType::new(13, 1);
    /// Named predicate used to classify associations.
    pub const PREDICATE: ObjectType = ObjectType::new(25, 1);

    /// Returns `true` for types owned by the repository core rather than by
    /// application schemas.
    pub fn is_core(object_type: &ObjectType) -> bool {
        *object_type == MUTABLE_HEAD || *object_type == COMMIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wire_encoding_matches_protobuf_layout() {
        // field 1 varint 8, field 2 varint 1
        let t = ObjectType::new(8, 1);
        assert_eq!(t.to_wire_bytes(), vec![0x08, 0x08, 0x10, 0x01]);
    }

    #[test]
    fn default_type_encodes_empty() {
        assert!(ObjectType::new(0, 0).to_wire_bytes().is_empty());
    }

    #[test]
    fn display_format() {
        assert_eq!(ObjectType::new(20001, 2).to_string(), "20001.v2");
    }

    #[test]
    fn core_types_are_recognised() {
        assert!(well_known::is_core(&well_known::COMMIT));
        assert!(well_known::is_core(&well_known::MUTABLE_HEAD));
        assert!(!well_known::is_core(&well_known::ASSOCIATION));
    }

    proptest! {
        #[test]
        fn wire_roundtrip(object_id in any::<i32>(), version in any::<i32>()) {
            let t = ObjectType::new(object_id, version);
            let decoded = <ObjectType as prost::Message>::decode(t.to_wire_bytes().as_slice()).unwrap();
            prop_assert_eq!(t, decoded);
        }
    }
}
