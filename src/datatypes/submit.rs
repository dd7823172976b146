use crate::codec::{
    decode_bytes, decode_octets, decode_u64, decode_u8, encode_octets, encode_u64, encode_u8,
    CodecError, Decodable, Encodable, PduHeader,
};
use crate::datatypes::{
    CommandId, FeeCode, FeeType, MsgSrc, ServiceId, TerminalId, TimeString,
};
use crate::macros::impl_sequenced;
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// Largest destination list a single CMPP_SUBMIT may carry
pub const MAX_DESTINATIONS: usize = 100;

/// CMPP_SUBMIT (CMPP 2.0) - SP to gateway message submission
///
/// A long message is sent as several submits sharing `pk_total`, each with
/// its own `pk_number` and `tp_udhi = 1`; the concatenation header lives at
/// the start of `msg_content`.
#[derive(Clone, Debug, PartialEq)]
pub struct Submit {
    pub sequence_id: u32,
    pub msg_id: u64,
    pub pk_total: u8,
    pub pk_number: u8,
    pub registered_delivery: u8,
    pub msg_level: u8,
    pub service_id: ServiceId,
    pub fee_user_type: u8,
    pub fee_terminal_id: TerminalId,
    pub tp_pid: u8,
    pub tp_udhi: u8,
    pub msg_fmt: u8,
    pub msg_src: MsgSrc,
    pub fee_type: FeeType,
    pub fee_code: FeeCode,
    pub valid_time: TimeString,
    pub at_time: TimeString,
    pub src_id: TerminalId,
    pub dest_terminal_ids: Vec<TerminalId>,
    pub msg_content: Bytes,
    pub reserve: [u8; 8],
}

/// CMPP_SUBMIT_RESP - `result` 0 means accepted
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitResponse {
    pub sequence_id: u32,
    pub msg_id: u64,
    pub result: u8,
}

impl Default for Submit {
    fn default() -> Self {
        Self {
            sequence_id: 0,
            msg_id: 0,
            pk_total: 1,
            pk_number: 1,
            registered_delivery: 0,
            msg_level: 0,
            service_id: ServiceId::default(),
            fee_user_type: 0,
            fee_terminal_id: TerminalId::default(),
            tp_pid: 0,
            tp_udhi: 0,
            msg_fmt: 0,
            msg_src: MsgSrc::default(),
            fee_type: FeeType::default(),
            fee_code: FeeCode::default(),
            valid_time: TimeString::default(),
            at_time: TimeString::default(),
            src_id: TerminalId::default(),
            dest_terminal_ids: Vec::new(),
            msg_content: Bytes::new(),
            reserve: [0u8; 8],
        }
    }
}

impl Submit {
    fn validate(&self) -> Result<(), CodecError> {
        if self.dest_terminal_ids.is_empty() || self.dest_terminal_ids.len() > MAX_DESTINATIONS {
            return Err(CodecError::FieldValidation {
                field: "dest_terminal_ids",
                reason: format!(
                    "{} destinations, must be 1-{MAX_DESTINATIONS}",
                    self.dest_terminal_ids.len()
                ),
            });
        }
        if self.msg_content.len() > u8::MAX as usize {
            return Err(CodecError::FieldValidation {
                field: "msg_content",
                reason: format!("{} bytes does not fit Msg_Length", self.msg_content.len()),
            });
        }
        Ok(())
    }
}

impl Encodable for Submit {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        self.validate()?;

        PduHeader::placeholder(CommandId::Submit, self.sequence_id).encode(buf)?;
        encode_u64(buf, self.msg_id);
        encode_u8(buf, self.pk_total);
        encode_u8(buf, self.pk_number);
        encode_u8(buf, self.registered_delivery);
        encode_u8(buf, self.msg_level);
        encode_octets(buf, &self.service_id);
        encode_u8(buf, self.fee_user_type);
        encode_octets(buf, &self.fee_terminal_id);
        encode_u8(buf, self.tp_pid);
        encode_u8(buf, self.tp_udhi);
        encode_u8(buf, self.msg_fmt);
        encode_octets(buf, &self.msg_src);
        encode_octets(buf, &self.fee_type);
        encode_octets(buf, &self.fee_code);
        encode_octets(buf, &self.valid_time);
        encode_octets(buf, &self.at_time);
        encode_octets(buf, &self.src_id);
        encode_u8(buf, self.dest_terminal_ids.len() as u8);
        for dest in &self.dest_terminal_ids {
            encode_octets(buf, dest);
        }
        encode_u8(buf, self.msg_content.len() as u8);
        buf.put_slice(&self.msg_content);
        buf.put_slice(&self.reserve);
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        PduHeader::SIZE + 117 + 21 * self.dest_terminal_ids.len() + 1 + self.msg_content.len() + 8
    }
}

impl Decodable for Submit {
    fn command_id() -> CommandId {
        CommandId::Submit
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let msg_id = decode_u64(buf)?;
        let pk_total = decode_u8(buf)?;
        let pk_number = decode_u8(buf)?;
        let registered_delivery = decode_u8(buf)?;
        let msg_level = decode_u8(buf)?;
        let service_id = decode_octets(buf)?;
        let fee_user_type = decode_u8(buf)?;
        let fee_terminal_id = decode_octets(buf)?;
        let tp_pid = decode_u8(buf)?;
        let tp_udhi = decode_u8(buf)?;
        let msg_fmt = decode_u8(buf)?;
        let msg_src = decode_octets(buf)?;
        let fee_type = decode_octets(buf)?;
        let fee_code = decode_octets(buf)?;
        let valid_time = decode_octets(buf)?;
        let at_time = decode_octets(buf)?;
        let src_id = decode_octets(buf)?;

        let dest_count = decode_u8(buf)? as usize;
        let mut dest_terminal_ids = Vec::with_capacity(dest_count);
        for _ in 0..dest_count {
            dest_terminal_ids.push(decode_octets(buf)?);
        }

        let msg_length = decode_u8(buf)? as usize;
        let msg_content = decode_bytes(buf, msg_length, "msg_content")?;
        let mut reserve = [0u8; 8];
        reserve.copy_from_slice(&decode_bytes(buf, 8, "reserve")?);

        Ok(Submit {
            sequence_id: header.sequence_id,
            msg_id,
            pk_total,
            pk_number,
            registered_delivery,
            msg_level,
            service_id,
            fee_user_type,
            fee_terminal_id,
            tp_pid,
            tp_udhi,
            msg_fmt,
            msg_src,
            fee_type,
            fee_code,
            valid_time,
            at_time,
            src_id,
            dest_terminal_ids,
            msg_content,
            reserve,
        })
    }
}

impl SubmitResponse {
    pub fn new(sequence_id: u32, msg_id: u64, result: u8) -> Self {
        Self {
            sequence_id,
            msg_id,
            result,
        }
    }
}

impl Encodable for SubmitResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::placeholder(CommandId::SubmitResp, self.sequence_id).encode(buf)?;
        encode_u64(buf, self.msg_id);
        encode_u8(buf, self.result);
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        PduHeader::SIZE + 8 + 1
    }
}

impl Decodable for SubmitResponse {
    fn command_id() -> CommandId {
        CommandId::SubmitResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        Ok(SubmitResponse {
            sequence_id: header.sequence_id,
            msg_id: decode_u64(buf)?,
            result: decode_u8(buf)?,
        })
    }
}

impl_sequenced!(Submit, SubmitResponse);

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_submit() -> Submit {
        Submit {
            sequence_id: 11,
            service_id: ServiceId::truncating("NEWS"),
            msg_fmt: 8,
            msg_src: MsgSrc::truncating("901234"),
            fee_type: FeeType::truncating("01"),
            src_id: TerminalId::truncating("10657000"),
            dest_terminal_ids: vec![
                TerminalId::truncating("13800000001"),
                TerminalId::truncating("13800000002"),
            ],
            msg_content: Bytes::from_static(&[0x4F, 0x60, 0x59, 0x7D]),
            ..Default::default()
        }
    }

    #[test]
    fn submit_size_matches_encoding() {
        let submit = sample_submit();
        let bytes = submit.to_bytes().unwrap();

        assert_eq!(bytes.len(), submit.encoded_size());
        assert_eq!(bytes.len(), 12 + 117 + 42 + 1 + 4 + 8);
        assert_eq!(Submit::from_frame(&bytes).unwrap(), submit);
    }

    #[test]
    fn submit_requires_destinations() {
        let submit = Submit {
            dest_terminal_ids: Vec::new(),
            ..sample_submit()
        };
        assert!(matches!(
            submit.to_bytes(),
            Err(CodecError::FieldValidation {
                field: "dest_terminal_ids",
                ..
            })
        ));

        let submit = Submit {
            dest_terminal_ids: vec![TerminalId::default(); MAX_DESTINATIONS + 1],
            ..sample_submit()
        };
        assert!(submit.to_bytes().is_err());
    }

    #[test]
    fn submit_response_result() {
        let bytes = SubmitResponse::new(11, 0xABCD, 9).to_bytes().unwrap();
        let decoded = SubmitResponse::from_frame(&bytes).unwrap();
        assert_eq!(decoded, SubmitResponse::new(11, 0xABCD, 9));
    }
}
