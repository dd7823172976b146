// CMPP 2.0 codec - separates wire-format parsing/encoding from the message models
//
// Every CMPP message starts with the same 12-byte header. Each message type
// implements Encodable/Decodable rather than having all parsing logic in a
// monolithic frame parser.

use crate::datatypes::{CommandId, OctetString};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;

/// Maximum accepted frame size. A fully populated submit with 100
/// destinations is well below this.
pub const MAX_PDU_SIZE: u32 = 65536; // 64KB

/// Byte offset of the command id inside a raw frame.
pub const COMMAND_ID_OFFSET: usize = 4;

/// Byte offset of the sequence id inside a raw frame.
pub const SEQUENCE_ID_OFFSET: usize = 8;

/// CMPP message header (12 bytes, common to all messages)
#[derive(Debug, Clone, PartialEq)]
pub struct PduHeader {
    pub total_length: u32,
    pub command_id: CommandId,
    pub sequence_id: u32,
}

impl PduHeader {
    pub const SIZE: usize = 12;

    /// Decode message header from buffer with validation
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }

        let total_length = buf.get_u32();
        let command_id_raw = buf.get_u32();
        let command_id = CommandId::try_from(command_id_raw)
            .map_err(|_| CodecError::InvalidCommandId(command_id_raw))?;
        let sequence_id = buf.get_u32();

        if !(Self::SIZE as u32..=MAX_PDU_SIZE).contains(&total_length) {
            return Err(CodecError::InvalidPduLength {
                length: total_length,
                min: Self::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        Ok(PduHeader {
            total_length,
            command_id,
            sequence_id,
        })
    }

    /// Encode message header to buffer
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u32(self.total_length);
        buf.put_u32(self.command_id as u32);
        buf.put_u32(self.sequence_id);
        Ok(())
    }

    /// Header for a message whose length is patched after the body is written
    pub fn placeholder(command_id: CommandId, sequence_id: u32) -> Self {
        PduHeader {
            total_length: 0,
            command_id,
            sequence_id,
        }
    }
}

/// Read the sequence id of a raw frame without decoding it.
///
/// Returns 0 ("not a correlated frame") when the buffer is shorter than a
/// header.
pub fn peek_sequence_id(frame: &[u8]) -> u32 {
    read_u32_at(frame, SEQUENCE_ID_OFFSET).unwrap_or(0)
}

/// Read the command id of a raw frame without decoding it.
///
/// Unknown command ids yield `None`.
pub fn peek_command_id(frame: &[u8]) -> Option<CommandId> {
    read_u32_at(frame, COMMAND_ID_OFFSET).and_then(|raw| CommandId::try_from(raw).ok())
}

fn read_u32_at(frame: &[u8], offset: usize) -> Option<u32> {
    let bytes = frame.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Trait for types that can be encoded to bytes
pub trait Encodable {
    /// Encode this message to the buffer
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Calculate the encoded size without actually encoding
    fn encoded_size(&self) -> usize {
        let mut buf = BytesMut::new();
        self.encode(&mut buf).map(|_| buf.len()).unwrap_or(0)
    }

    /// Append this message to `buf` and fix its total_length field.
    ///
    /// `buf` may already hold data (a pooled buffer is always cleared first,
    /// but callers are free to batch frames).
    fn encode_frame(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let start = buf.len();
        self.encode(buf)?;

        let length = (buf.len() - start) as u32;
        if length < PduHeader::SIZE as u32 {
            return Err(CodecError::InvalidPduLength {
                length,
                min: PduHeader::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }
        buf[start..start + 4].copy_from_slice(&length.to_be_bytes());
        Ok(())
    }

    /// Convert this message to bytes (convenience method)
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        self.encode_frame(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// Messages that carry a sequence id used to correlate request and reply
pub trait Sequenced {
    fn sequence_id(&self) -> u32;
}

/// Trait for types that can be decoded from bytes
pub trait Decodable: Sized {
    /// Decode this message from the buffer after header
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;

    /// Return the expected command_id for this message type
    fn command_id() -> CommandId;

    /// Validate the header is appropriate for this message type
    fn validate_header(header: &PduHeader) -> Result<(), CodecError> {
        if header.command_id != Self::command_id() {
            return Err(CodecError::UnexpectedCommandId {
                expected: Self::command_id(),
                actual: header.command_id,
            });
        }
        Ok(())
    }

    /// Decode a complete raw frame, header included
    fn from_frame(frame: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(frame);
        let header = PduHeader::decode(&mut cursor)?;
        Self::decode(header, &mut cursor)
    }
}

/// Codec errors with detailed context for debugging
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Incomplete frame: need more data")]
    Incomplete,

    #[error("Invalid command_id: {0:#x}")]
    InvalidCommandId(u32),

    #[error("Invalid frame length: {length}, must be {min}-{max}")]
    InvalidPduLength { length: u32, min: u32, max: u32 },

    #[error("Unexpected command_id: expected {expected:?}, got {actual:?}")]
    UnexpectedCommandId {
        expected: CommandId,
        actual: CommandId,
    },

    #[error("Field '{field}' validation failed: {reason}")]
    FieldValidation { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandId {
    /// Check if this command_id represents a response message
    pub fn is_response(&self) -> bool {
        (*self as u32) & 0x8000_0000 != 0
    }
}

/// Decode a fixed-width octet string field
pub fn decode_octets<const N: usize>(
    buf: &mut Cursor<&[u8]>,
) -> Result<OctetString<N>, CodecError> {
    if buf.remaining() < N {
        return Err(CodecError::Incomplete);
    }

    let mut data = [0u8; N];
    buf.copy_to_slice(&mut data);
    Ok(OctetString::from_raw(data))
}

/// Decode a fixed number of raw bytes
pub fn decode_bytes(
    buf: &mut Cursor<&[u8]>,
    len: usize,
    field: &'static str,
) -> Result<Bytes, CodecError> {
    if buf.remaining() < len {
        return Err(CodecError::FieldValidation {
            field,
            reason: format!("need {len} bytes, {} remaining", buf.remaining()),
        });
    }
    Ok(buf.copy_to_bytes(len))
}

/// Decode a single byte
pub fn decode_u8(buf: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u8())
}

/// Decode a 32-bit big-endian integer
pub fn decode_u32(buf: &mut Cursor<&[u8]>) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u32())
}

/// Decode a 64-bit big-endian integer (CMPP Msg_Id)
pub fn decode_u64(buf: &mut Cursor<&[u8]>) -> Result<u64, CodecError> {
    if buf.remaining() < 8 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u64())
}

/// Encode a fixed-width octet string field
pub fn encode_octets<const N: usize>(buf: &mut BytesMut, value: &OctetString<N>) {
    buf.put_slice(value.as_bytes());
}

/// Encode a single byte
pub fn encode_u8(buf: &mut BytesMut, value: u8) {
    buf.put_u8(value);
}

/// Encode a 32-bit big-endian integer
pub fn encode_u32(buf: &mut BytesMut, value: u32) {
    buf.put_u32(value);
}

/// Encode a 64-bit big-endian integer
pub fn encode_u64(buf: &mut BytesMut, value: u64) {
    buf.put_u64(value);
}

/// Generic frame type that can hold any supported CMPP message
#[derive(Debug)]
pub enum Frame {
    // Session management
    Connect(crate::datatypes::Connect),
    ConnectResp(crate::datatypes::ConnectResponse),
    Terminate(crate::datatypes::Terminate),
    TerminateResp(crate::datatypes::TerminateResponse),

    // Keep-alive
    ActiveTest(crate::datatypes::ActiveTest),
    ActiveTestResp(crate::datatypes::ActiveTestResponse),

    // Messages
    Submit(Box<crate::datatypes::Submit>),
    SubmitResp(crate::datatypes::SubmitResponse),
    Deliver(Box<crate::datatypes::Deliver>),
    DeliverResp(crate::datatypes::DeliverResponse),

    // Registered command ids without a decoder (query, cancel)
    Unknown { header: PduHeader, body: Bytes },
}

/// Registry of message decoders for extensible parsing
type DecoderFn =
    Box<dyn Fn(PduHeader, &mut Cursor<&[u8]>) -> Result<Frame, CodecError> + Send + Sync>;

pub struct PduRegistry {
    decoders: HashMap<CommandId, DecoderFn>,
}

impl PduRegistry {
    /// Create a new registry with the CMPP 2.0 messages this crate speaks
    pub fn new() -> Self {
        let mut registry = Self {
            decoders: HashMap::new(),
        };

        registry.register_pdu::<crate::datatypes::Connect, _>(Frame::Connect);
        registry.register_pdu::<crate::datatypes::ConnectResponse, _>(Frame::ConnectResp);
        registry.register_pdu::<crate::datatypes::Terminate, _>(Frame::Terminate);
        registry.register_pdu::<crate::datatypes::TerminateResponse, _>(Frame::TerminateResp);

        registry.register_pdu::<crate::datatypes::ActiveTest, _>(Frame::ActiveTest);
        registry.register_pdu::<crate::datatypes::ActiveTestResponse, _>(Frame::ActiveTestResp);

        // Submit and deliver are boxed, they are large structs
        registry.register_pdu::<crate::datatypes::Submit, _>(|pdu| Frame::Submit(Box::new(pdu)));
        registry.register_pdu::<crate::datatypes::SubmitResponse, _>(Frame::SubmitResp);
        registry.register_pdu::<crate::datatypes::Deliver, _>(|pdu| Frame::Deliver(Box::new(pdu)));
        registry.register_pdu::<crate::datatypes::DeliverResponse, _>(Frame::DeliverResp);

        registry
    }

    fn register_pdu<T, F>(&mut self, frame_constructor: F)
    where
        T: Decodable + 'static,
        F: Fn(T) -> Frame + Send + Sync + 'static,
    {
        let command_id = T::command_id();
        let decoder = Box::new(move |header: PduHeader, buf: &mut Cursor<&[u8]>| {
            let pdu = T::decode(header, buf)?;
            Ok(frame_constructor(pdu))
        });
        self.decoders.insert(command_id, decoder);
    }

    /// Decode a message given its header and body
    pub fn decode_pdu(
        &self,
        header: PduHeader,
        buf: &mut Cursor<&[u8]>,
    ) -> Result<Frame, CodecError> {
        match self.decoders.get(&header.command_id) {
            Some(decoder) => decoder(header, buf),
            None => {
                let body_size = header.total_length as usize - PduHeader::SIZE;
                if buf.remaining() < body_size {
                    return Err(CodecError::Incomplete);
                }

                let body = buf.copy_to_bytes(body_size);
                tracing::warn!(
                    "No decoder for command_id: {:#x}, treating as opaque data",
                    header.command_id as u32
                );

                Ok(Frame::Unknown { header, body })
            }
        }
    }

    /// Decode a complete raw frame
    pub fn decode_frame(&self, frame: &[u8]) -> Result<Frame, CodecError> {
        let mut cursor = Cursor::new(frame);
        let header = PduHeader::decode(&mut cursor)?;
        self.decode_pdu(header, &mut cursor)
    }
}

impl Default for PduRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Frame {
    /// Get the command_id for this frame
    pub fn command_id(&self) -> CommandId {
        match self {
            Frame::Connect(_) => CommandId::Connect,
            Frame::ConnectResp(_) => CommandId::ConnectResp,
            Frame::Terminate(_) => CommandId::Terminate,
            Frame::TerminateResp(_) => CommandId::TerminateResp,
            Frame::ActiveTest(_) => CommandId::ActiveTest,
            Frame::ActiveTestResp(_) => CommandId::ActiveTestResp,
            Frame::Submit(_) => CommandId::Submit,
            Frame::SubmitResp(_) => CommandId::SubmitResp,
            Frame::Deliver(_) => CommandId::Deliver,
            Frame::DeliverResp(_) => CommandId::DeliverResp,
            Frame::Unknown { header, .. } => header.command_id,
        }
    }

    /// Check if this frame is a response message
    pub fn is_response(&self) -> bool {
        self.command_id().is_response()
    }
}

impl Sequenced for Frame {
    fn sequence_id(&self) -> u32 {
        match self {
            Frame::Connect(pdu) => pdu.sequence_id,
            Frame::ConnectResp(pdu) => pdu.sequence_id,
            Frame::Terminate(pdu) => pdu.sequence_id,
            Frame::TerminateResp(pdu) => pdu.sequence_id,
            Frame::ActiveTest(pdu) => pdu.sequence_id,
            Frame::ActiveTestResp(pdu) => pdu.sequence_id,
            Frame::Submit(pdu) => pdu.sequence_id,
            Frame::SubmitResp(pdu) => pdu.sequence_id,
            Frame::Deliver(pdu) => pdu.sequence_id,
            Frame::DeliverResp(pdu) => pdu.sequence_id,
            Frame::Unknown { header, .. } => header.sequence_id,
        }
    }
}

impl Encodable for Frame {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        match self {
            Frame::Connect(pdu) => pdu.encode(buf),
            Frame::ConnectResp(pdu) => pdu.encode(buf),
            Frame::Terminate(pdu) => pdu.encode(buf),
            Frame::TerminateResp(pdu) => pdu.encode(buf),
            Frame::ActiveTest(pdu) => pdu.encode(buf),
            Frame::ActiveTestResp(pdu) => pdu.encode(buf),
            Frame::Submit(pdu) => pdu.encode(buf),
            Frame::SubmitResp(pdu) => pdu.encode(buf),
            Frame::Deliver(pdu) => pdu.encode(buf),
            Frame::DeliverResp(pdu) => pdu.encode(buf),
            Frame::Unknown { header, body } => {
                header.encode(buf)?;
                buf.put_slice(body);
                Ok(())
            }
        }
    }
}
