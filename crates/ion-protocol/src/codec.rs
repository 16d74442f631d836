use bytes::{Buf, BufMut, BytesMut};
use prost::Message;

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{Operation, Response, MAX_MESSAGE_SIZE};

/// Tag byte of a response frame.
pub const RESPONSE_TAG: u8 = 255;

/// One decoded frame: a tag byte and the protobuf payload it announces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub tag: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn operation(&self) -> ProtocolResult<Operation> {
        Operation::from_tag(self.tag)
    }

    pub fn is_response(&self) -> bool {
        self.tag == RESPONSE_TAG
    }

    pub fn decode_as<M: Message + Default>(&self) -> ProtocolResult<M> {
        Ok(M::decode(self.payload.as_slice())?)
    }
}

/// Framing for byte-stream transports: `[4 bytes len][1 byte tag][payload]`.
pub struct IonCodec;

impl IonCodec {
    /// Frame a request for `op`.
    pub fn encode_request(op: Operation, request: &impl Message) -> ProtocolResult<Vec<u8>> {
        Self::encode_frame(op.tag(), &request.encode_to_vec())
    }

    pub fn encode_response(response: &Response) -> ProtocolResult<Vec<u8>> {
        Self::encode_frame(RESPONSE_TAG, &response.encode_to_vec())
    }

    pub fn encode_frame(tag: u8, payload: &[u8]) -> ProtocolResult<Vec<u8>> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let mut buf = BytesMut::with_capacity(4 + 1 + payload.len());
        buf.put_u32((payload.len() + 1) as u32);
        buf.put_u8(tag);
        buf.put_slice(payload);
        Ok(buf.to_vec())
    }

    /// Decode one frame. Returns the frame and the number of bytes consumed.
    pub fn decode(data: &[u8]) -> ProtocolResult<(Frame, usize)> {
        if data.len() < 5 {
            return Err(ProtocolError::FramingError("too short".into()));
        }
        let mut header = &data[..5];
        let len = header.get_u32() as usize;
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: len - 1,
                max: MAX_MESSAGE_SIZE,
            });
        }
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let tag = header.get_u8();
        Ok((
            Frame {
                tag,
                payload: data[5..total].to_vec(),
            },
            total,
        ))
    }

    /// Decode a frame that must be a response.
    pub fn decode_response(data: &[u8]) -> ProtocolResult<Response> {
        let (frame, _) = Self::decode(data)?;
        if !frame.is_response() {
            return Err(ProtocolError::FramingError(format!(
                "expected response frame, got tag {}",
                frame.tag
            )));
        }
        frame.decode_as()
    }
}
