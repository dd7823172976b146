use crate::codec::{
    decode_bytes, decode_octets, decode_u64, decode_u8, encode_octets, encode_u64, encode_u8,
    CodecError, Decodable, Encodable, PduHeader,
};
use crate::datatypes::{CommandId, ServiceId, TerminalId};
use crate::macros::impl_sequenced;
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// CMPP_DELIVER - gateway to SP mobile-originated message or status report
///
/// When `registered_delivery` is 1 the content is a status report for an
/// earlier submit rather than user text.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Deliver {
    pub sequence_id: u32,
    pub msg_id: u64,
    pub dest_id: TerminalId,
    pub service_id: ServiceId,
    pub tp_pid: u8,
    pub tp_udhi: u8,
    pub msg_fmt: u8,
    pub src_terminal_id: TerminalId,
    pub registered_delivery: u8,
    pub msg_content: Bytes,
    pub reserved: [u8; 8],
}

/// CMPP_DELIVER_RESP
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverResponse {
    pub sequence_id: u32,
    pub msg_id: u64,
    pub result: u8,
}

impl Deliver {
    pub fn is_status_report(&self) -> bool {
        self.registered_delivery == 1
    }
}

impl Encodable for Deliver {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.msg_content.len() > u8::MAX as usize {
            return Err(CodecError::FieldValidation {
                field: "msg_content",
                reason: format!("{} bytes does not fit Msg_Length", self.msg_content.len()),
            });
        }

        PduHeader::placeholder(CommandId::Deliver, self.sequence_id).encode(buf)?;
        encode_u64(buf, self.msg_id);
        encode_octets(buf, &self.dest_id);
        encode_octets(buf, &self.service_id);
        encode_u8(buf, self.tp_pid);
        encode_u8(buf, self.tp_udhi);
        encode_u8(buf, self.msg_fmt);
        encode_octets(buf, &self.src_terminal_id);
        encode_u8(buf, self.registered_delivery);
        encode_u8(buf, self.msg_content.len() as u8);
        buf.put_slice(&self.msg_content);
        buf.put_slice(&self.reserved);
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        PduHeader::SIZE + 65 + self.msg_content.len() + 8
    }
}

impl Decodable for Deliver {
    fn command_id() -> CommandId {
        CommandId::Deliver
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let msg_id = decode_u64(buf)?;
        let dest_id = decode_octets(buf)?;
        let service_id = decode_octets(buf)?;
        let tp_pid = decode_u8(buf)?;
        let tp_udhi = decode_u8(buf)?;
        let msg_fmt = decode_u8(buf)?;
        let src_terminal_id = decode_octets(buf)?;
        let registered_delivery = decode_u8(buf)?;
        let msg_length = decode_u8(buf)? as usize;
        let msg_content = decode_bytes(buf, msg_length, "msg_content")?;
        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&decode_bytes(buf, 8, "reserved")?);

        Ok(Deliver {
            sequence_id: header.sequence_id,
            msg_id,
            dest_id,
            service_id,
            tp_pid,
            tp_udhi,
            msg_fmt,
            src_terminal_id,
            registered_delivery,
            msg_content,
            reserved,
        })
    }
}

impl DeliverResponse {
    /// Acknowledge a deliver, echoing its sequence and message id
    pub fn ack(deliver: &Deliver) -> Self {
        Self {
            sequence_id: deliver.sequence_id,
            msg_id: deliver.msg_id,
            result: 0,
        }
    }
}

impl Encodable for DeliverResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::placeholder(CommandId::DeliverResp, self.sequence_id).encode(buf)?;
        encode_u64(buf, self.msg_id);
        encode_u8(buf, self.result);
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        PduHeader::SIZE + 8 + 1
    }
}

impl Decodable for DeliverResponse {
    fn command_id() -> CommandId {
        CommandId::DeliverResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        Ok(DeliverResponse {
            sequence_id: header.sequence_id,
            msg_id: decode_u64(buf)?,
            result: decode_u8(buf)?,
        })
    }
}

impl_sequenced!(Deliver, DeliverResponse);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deliver_decodes_and_acks() {
        let deliver = Deliver {
            sequence_id: 300,
            msg_id: 0x1122_3344_5566_7788,
            dest_id: TerminalId::truncating("10657000"),
            src_terminal_id: TerminalId::truncating("13800000001"),
            msg_fmt: 15,
            msg_content: Bytes::from_static(b"TD"),
            ..Default::default()
        };
        let bytes = deliver.to_bytes().unwrap();
        assert_eq!(bytes.len(), 12 + 65 + 2 + 8);

        let decoded = Deliver::from_frame(&bytes).unwrap();
        assert_eq!(decoded, deliver);
        assert!(!decoded.is_status_report());

        let ack = DeliverResponse::ack(&decoded);
        assert_eq!(ack.sequence_id, 300);
        assert_eq!(ack.msg_id, 0x1122_3344_5566_7788);
        assert_eq!(ack.result, 0);
        assert_eq!(ack.to_bytes().unwrap().len(), 21);
    }

    #[test]
    fn truncated_content_is_rejected() {
        let deliver = Deliver {
            msg_content: Bytes::from_static(b"hello"),
            ..Default::default()
        };
        let bytes = deliver.to_bytes().unwrap();

        // drop the reserved tail and two content bytes
        let cut = &bytes[..bytes.len() - 10];
        assert!(Deliver::from_frame(cut).is_err());
    }
}
