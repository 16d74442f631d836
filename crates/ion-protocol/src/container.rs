use ion_store::StructureElement;
use ion_types::{ObjectKey, ObjectType};
use prost::Message;

use crate::error::{ProtocolError, ProtocolResult};

/// One structure element as it appears on the wire.
#[derive(Clone, PartialEq, prost::Message)]
pub struct WireElement {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(bool, tag = "2")]
    pub isleaf: bool,
    #[prost(message, optional, tag = "3")]
    pub object_type: Option<ObjectType>,
    #[prost(bytes = "vec", tag = "4")]
    pub value: Vec<u8>,
}

impl WireElement {
    pub fn from_element(element: &StructureElement) -> Self {
        Self {
            key: element.key.to_vec(),
            isleaf: element.isleaf,
            object_type: Some(element.object_type),
            value: element.value.clone(),
        }
    }

    /// Rebuild the element, rejecting it if the key does not match the
    /// content.
    pub fn to_element(&self) -> ProtocolResult<StructureElement> {
        let key = ObjectKey::from_slice(&self.key)?;
        let object_type = self.object_type.ok_or(ProtocolError::MissingType(key))?;
        Ok(StructureElement::from_parts(
            key,
            object_type,
            self.isleaf,
            self.value.clone(),
        )?)
    }
}

/// Transfer envelope: subject elements in `heads`, everything needed to
/// resolve them in `items`.
///
/// An empty `heads` list marks a content fetch rather than a repository
/// transfer.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Container {
    #[prost(message, repeated, tag = "1")]
    pub heads: Vec<WireElement>,
    #[prost(message, repeated, tag = "2")]
    pub items: Vec<WireElement>,
}

impl Container {
    pub fn new<'a>(
        heads: impl IntoIterator<Item = &'a StructureElement>,
        items: impl IntoIterator<Item = &'a StructureElement>,
    ) -> Self {
        Self {
            heads: heads.into_iter().map(WireElement::from_element).collect(),
            items: items.into_iter().map(WireElement::from_element).collect(),
        }
    }

    /// A content-only container.
    pub fn fetch<'a>(items: impl IntoIterator<Item = &'a StructureElement>) -> Self {
        Self::new(std::iter::empty(), items)
    }

    pub fn is_fetch(&self) -> bool {
        self.heads.is_empty()
    }

    pub fn head_elements(&self) -> ProtocolResult<Vec<StructureElement>> {
        self.heads.iter().map(WireElement::to_element).collect()
    }

    pub fn item_elements(&self) -> ProtocolResult<Vec<StructureElement>> {
        self.items.iter().map(WireElement::to_element).collect()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(Self::decode(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ion_types::well_known::COMMIT;

    const PERSON: ObjectType = ObjectType::new(20001, 1);

    fn element(bytes: &[u8]) -> StructureElement {
        StructureElement::new(PERSON, bytes.to_vec(), true)
    }

    #[test]
    fn wire_layout_is_protobuf_compatible() {
        let e = StructureElement::new(COMMIT, vec![0xAA], false);
        let wire = WireElement::from_element(&e).encode_to_vec();
        // key: field 1, length-delimited, 20 bytes
        assert_eq!(&wire[..2], &[0x0A, 0x14]);
        assert_eq!(&wire[2..22], e.key.as_bytes());
        // isleaf false is omitted; type: field 3, length 4, {1: 8, 2: 1}
        assert_eq!(&wire[22..28], &[0x1A, 0x04, 0x08, 0x08, 0x10, 0x01]);
        // value: field 4
        assert_eq!(&wire[28..], &[0x22, 0x01, 0xAA]);
    }

    #[test]
    fn container_carries_heads_and_items() {
        let head = element(b"head");
        let item = element(b"item");
        let container = Container::new([&head], [&item]);
        let decoded = Container::from_bytes(&container.to_bytes()).unwrap();
        assert!(!decoded.is_fetch());
        assert_eq!(decoded.head_elements().unwrap(), vec![head]);
        assert_eq!(decoded.item_elements().unwrap(), vec![item]);
    }

    #[test]
    fn fetch_container_has_no_heads() {
        let item = element(b"item");
        assert!(Container::fetch([&item]).is_fetch());
    }

    #[test]
    fn tampered_element_is_rejected() {
        let mut wire = WireElement::from_element(&element(b"original"));
        wire.value = b"tampered".to_vec();
        assert!(matches!(wire.to_element(), Err(ProtocolError::Store(_))));
    }

    #[test]
    fn short_key_is_rejected() {
        let mut wire = WireElement::from_element(&element(b"x"));
        wire.key.truncate(10);
        assert!(matches!(wire.to_element(), Err(ProtocolError::InvalidKey(_))));
    }

    #[test]
    fn missing_type_is_rejected() {
        let mut wire = WireElement::from_element(&element(b"x"));
        wire.object_type = None;
        assert!(matches!(wire.to_element(), Err(ProtocolError::MissingType(_))));
    }
}
