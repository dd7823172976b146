use crate::codec::{
    decode_bytes, decode_octets, decode_u32, decode_u8, encode_octets, encode_u32, encode_u8,
    CodecError, Decodable, Encodable, PduHeader,
};
use crate::datatypes::{CommandId, SourceAddr, Timestamp};
use crate::macros::impl_sequenced;
use bytes::{BufMut, BytesMut};
use md5::{Digest, Md5};
use std::io::Cursor;

/// Protocol version announced in CMPP_CONNECT (2.0)
pub const CMPP_VERSION: u8 = 0x20;

/// CMPP_CONNECT - SP login request
///
/// The authenticator proves knowledge of the shared secret without sending
/// it: `MD5(Source_Addr + 9 zero bytes + shared secret + timestamp)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Connect {
    pub sequence_id: u32,
    pub source_addr: SourceAddr,
    pub authenticator_source: [u8; 16],
    pub version: u8,
    pub timestamp: u32,
}

/// CMPP_CONNECT_RESP
///
/// Status 0 is success; 1 malformed message, 2 invalid source address,
/// 3 authentication failed, 4 version too high, 5+ other errors.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectResponse {
    pub sequence_id: u32,
    pub status: u8,
    pub authenticator_ismg: [u8; 16],
    pub version: u8,
}

impl Connect {
    /// Build a signed login request for the given credentials
    pub fn signed(sequence_id: u32, source_addr: &str, secret: &str, timestamp: Timestamp) -> Self {
        Self {
            sequence_id,
            source_addr: SourceAddr::truncating(source_addr),
            authenticator_source: Self::sign(source_addr, secret, &timestamp),
            version: CMPP_VERSION,
            timestamp: timestamp.as_u32(),
        }
    }

    /// Compute AuthenticatorSource
    pub fn sign(source_addr: &str, secret: &str, timestamp: &Timestamp) -> [u8; 16] {
        let mut hasher = Md5::new();
        hasher.update(source_addr.as_bytes());
        hasher.update([0u8; 9]);
        hasher.update(secret.as_bytes());
        hasher.update(timestamp.to_string().as_bytes());

        let mut out = [0u8; 16];
        out.copy_from_slice(&hasher.finalize());
        out
    }
}

impl Encodable for Connect {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::placeholder(CommandId::Connect, self.sequence_id).encode(buf)?;
        encode_octets(buf, &self.source_addr);
        buf.put_slice(&self.authenticator_source);
        encode_u8(buf, self.version);
        encode_u32(buf, self.timestamp);
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        PduHeader::SIZE + 6 + 16 + 1 + 4
    }
}

impl Decodable for Connect {
    fn command_id() -> CommandId {
        CommandId::Connect
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let source_addr = decode_octets(buf)?;
        let mut authenticator_source = [0u8; 16];
        authenticator_source.copy_from_slice(&decode_bytes(buf, 16, "authenticator_source")?);

        Ok(Connect {
            sequence_id: header.sequence_id,
            source_addr,
            authenticator_source,
            version: decode_u8(buf)?,
            timestamp: decode_u32(buf)?,
        })
    }
}

impl ConnectResponse {
    pub fn new(sequence_id: u32, status: u8) -> Self {
        Self {
            sequence_id,
            status,
            authenticator_ismg: [0u8; 16],
            version: CMPP_VERSION,
        }
    }
}

impl Encodable for ConnectResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::placeholder(CommandId::ConnectResp, self.sequence_id).encode(buf)?;
        encode_u8(buf, self.status);
        buf.put_slice(&self.authenticator_ismg);
        encode_u8(buf, self.version);
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        PduHeader::SIZE + 1 + 16 + 1
    }
}

impl Decodable for ConnectResponse {
    fn command_id() -> CommandId {
        CommandId::ConnectResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let status = decode_u8(buf)?;
        let mut authenticator_ismg = [0u8; 16];
        authenticator_ismg.copy_from_slice(&decode_bytes(buf, 16, "authenticator_ismg")?);

        Ok(ConnectResponse {
            sequence_id: header.sequence_id,
            status,
            authenticator_ismg,
            version: decode_u8(buf)?,
        })
    }
}

impl_sequenced!(Connect, ConnectResponse);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_layout() {
        let ts = Timestamp::new("1017093000").unwrap();
        let connect = Connect::signed(1, "901234", "secret", ts);
        let bytes = connect.to_bytes().unwrap();

        assert_eq!(bytes.len(), 39);
        assert_eq!(&bytes[0..4], &39u32.to_be_bytes());
        assert_eq!(&bytes[4..8], &1u32.to_be_bytes());
        assert_eq!(&bytes[12..18], b"901234");
        assert_eq!(bytes[34], CMPP_VERSION);
        assert_eq!(&bytes[35..39], &1_017_093_000u32.to_be_bytes());

        assert_eq!(Connect::from_frame(&bytes).unwrap(), connect);
    }

    #[test]
    fn signature_depends_on_every_input() {
        let ts = Timestamp::new("1017093000").unwrap();
        let other_ts = Timestamp::new("1017093001").unwrap();
        let base = Connect::sign("901234", "secret", &ts);

        assert_eq!(base, Connect::sign("901234", "secret", &ts));
        assert_ne!(base, Connect::sign("901235", "secret", &ts));
        assert_ne!(base, Connect::sign("901234", "secreT", &ts));
        assert_ne!(base, Connect::sign("901234", "secret", &other_ts));
    }

    #[test]
    fn signature_matches_reference_digest() {
        // MD5("" + 9 zero bytes + "" + "0101000000")
        let ts = Timestamp::new("0101000000").unwrap();
        let mut hasher = Md5::new();
        hasher.update([0u8; 9]);
        hasher.update(b"0101000000");
        let expected: Vec<u8> = hasher.finalize().to_vec();

        assert_eq!(Connect::sign("", "", &ts).to_vec(), expected);
    }

    #[test]
    fn connect_response_decodes_status() {
        let bytes = ConnectResponse::new(7, 3).to_bytes().unwrap();
        assert_eq!(bytes.len(), 30);

        let decoded = ConnectResponse::from_frame(&bytes).unwrap();
        assert_eq!(decoded.sequence_id, 7);
        assert_eq!(decoded.status, 3);
    }
}
