use ion_types::{ObjectKey, ObjectType};
use sha1::{Digest, Sha1};

/// Content hasher for structure elements.
///
/// The key of an element is `sha1(sha1(value) ‖ encode(type))`, where
/// `encode(type)` is the protobuf encoding of the element's [`ObjectType`].
/// Mixing the type in keeps identical bytes of different schemas apart.
pub struct ContentHasher;

impl ContentHasher {
    /// Compute the content key of a serialized value of the given type.
    pub fn element_key(value: &[u8], object_type: &ObjectType) -> ObjectKey {
        let inner = Self::raw_hash(value);
        let mut outer = Sha1::new();
        outer.update(inner);
        outer.update(object_type.to_wire_bytes());
        ObjectKey::from_hash(outer.finalize().into())
    }

    /// Plain SHA1 digest of a byte string.
    pub fn raw_hash(data: &[u8]) -> [u8; 20] {
        Sha1::digest(data).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PERSON: ObjectType = ObjectType::new(20001, 1);

    #[test]
    fn raw_hash_matches_known_vector() {
        assert_eq!(
            hex::encode(ContentHasher::raw_hash(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn element_key_is_double_hash() {
        let value = b"serialized person";
        let mut expected = ContentHasher::raw_hash(value).to_vec();
        expected.extend_from_slice(&PERSON.to_wire_bytes());
        let expected = ObjectKey::from_hash(ContentHasher::raw_hash(&expected));
        assert_eq!(ContentHasher::element_key(value, &PERSON), expected);
    }

    #[test]
    fn type_changes_the_key() {
        let value = b"same bytes";
        let a = ContentHasher::element_key(value, &PERSON);
        let b = ContentHasher::element_key(value, &ObjectType::new(20001, 2));
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn key_is_deterministic(value in proptest::collection::vec(any::<u8>(), 0..256), id in 1i32..100_000) {
            let object_type = ObjectType::new(id, 1);
            prop_assert_eq!(
                ContentHasher::element_key(&value, &object_type),
                ContentHasher::element_key(&value.clone(), &object_type)
            );
        }
    }
}
