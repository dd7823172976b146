// ABOUTME: CMPP 2.0 binding of the gateway client: login, submit, link check and inbound answers
// ABOUTME: Content is sent as UCS-2 big-endian with the SP's service id and fee type "01"

use crate::client::error::{SmsError, SmsResult};
use crate::client::traits::Protocol;
use crate::client::types::Segment;
use crate::codec::{Decodable, Frame, PduRegistry, Sequenced, peek_sequence_id};
use crate::datatypes::{
    ActiveTest, ActiveTestResponse, CommandId, Connect, ConnectResponse, DeliverResponse, FeeType,
    MsgSrc, ServiceId, Submit, SubmitResponse, TerminalId, TerminateResponse, Timestamp,
};
use bytes::Bytes;
use tracing::debug;

/// Message format code for UCS-2 content
pub const MSG_FMT_UCS2: u8 = 8;

/// Login identity of an SP and the defaults stamped on its submits
#[derive(Clone, Debug)]
pub struct CmppCredentials {
    /// SP enterprise code, also sent as Msg_src
    pub source_addr: String,
    pub secret: String,
    pub service_id: String,
    /// Number shown to the handset as the sender
    pub src_id: String,
}

impl CmppCredentials {
    pub fn new(
        source_addr: impl Into<String>,
        secret: impl Into<String>,
        service_id: impl Into<String>,
        src_id: impl Into<String>,
    ) -> Self {
        Self {
            source_addr: source_addr.into(),
            secret: secret.into(),
            service_id: service_id.into(),
            src_id: src_id.into(),
        }
    }
}

/// CMPP 2.0 protocol binding
pub struct Cmpp {
    registry: PduRegistry,
}

impl Cmpp {
    pub fn new() -> Self {
        Self {
            registry: PduRegistry::new(),
        }
    }

    fn check_sequence(request: &Frame, reply: &[u8]) -> SmsResult<()> {
        let actual = peek_sequence_id(reply);
        if actual != request.sequence_id() {
            return Err(SmsError::ProtocolMismatch {
                expected: format!("sequence {}", request.sequence_id()),
                actual: format!("sequence {actual}"),
            });
        }
        Ok(())
    }
}

impl Default for Cmpp {
    fn default() -> Self {
        Self::new()
    }
}

fn terminal_id(number: &str) -> SmsResult<TerminalId> {
    TerminalId::new(number.as_bytes())
        .map_err(|e| SmsError::InvalidData(format!("terminal id '{number}': {e}")))
}

impl Protocol for Cmpp {
    type Credentials = CmppCredentials;
    type Message = Frame;

    fn login_request(&self, credentials: &CmppCredentials, sequence: u32) -> Frame {
        Frame::Connect(Connect::signed(
            sequence,
            &credentials.source_addr,
            &credentials.secret,
            Timestamp::now(),
        ))
    }

    fn login_status(&self, request: &Frame, reply: &[u8]) -> SmsResult<u32> {
        Self::check_sequence(request, reply)?;
        let response = ConnectResponse::from_frame(reply)?;
        Ok(u32::from(response.status))
    }

    fn encode_content(&self, content: &str) -> Bytes {
        content
            .encode_utf16()
            .flat_map(u16::to_be_bytes)
            .collect::<Vec<u8>>()
            .into()
    }

    fn submit_request(
        &self,
        credentials: &CmppCredentials,
        destinations: &[String],
        segment: &Segment,
        sequence: u32,
    ) -> SmsResult<Frame> {
        let dest_terminal_ids = destinations
            .iter()
            .map(|number| terminal_id(number))
            .collect::<SmsResult<Vec<_>>>()?;

        let submit = Submit {
            sequence_id: sequence,
            pk_total: segment.total,
            pk_number: segment.index,
            service_id: ServiceId::truncating(&credentials.service_id),
            tp_udhi: u8::from(segment.udhi),
            msg_fmt: MSG_FMT_UCS2,
            msg_src: MsgSrc::truncating(&credentials.source_addr),
            fee_type: FeeType::truncating("01"),
            src_id: terminal_id(&credentials.src_id)?,
            dest_terminal_ids,
            msg_content: segment.payload.clone(),
            ..Default::default()
        };
        Ok(Frame::Submit(Box::new(submit)))
    }

    fn submit_status(&self, request: &Frame, reply: &[u8]) -> SmsResult<u32> {
        Self::check_sequence(request, reply)?;
        let response = SubmitResponse::from_frame(reply)?;
        Ok(u32::from(response.result))
    }

    fn heartbeat_request(&self, sequence: u32) -> Frame {
        Frame::ActiveTest(ActiveTest::new(sequence))
    }

    fn check_heartbeat(&self, request: &Frame, reply: &[u8]) -> SmsResult<()> {
        Self::check_sequence(request, reply)?;
        ActiveTestResponse::from_frame(reply)?;
        Ok(())
    }

    fn read_sequence(&self, frame: &[u8]) -> u32 {
        peek_sequence_id(frame)
    }

    fn handle_inbound(&self, frame: &[u8]) -> Option<Frame> {
        let decoded = match self.registry.decode_frame(frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!("ignoring undecodable frame: {}", e);
                return None;
            }
        };

        match decoded {
            Frame::ActiveTest(pdu) => Some(Frame::ActiveTestResp(ActiveTestResponse::new(
                pdu.sequence_id,
            ))),
            Frame::Terminate(pdu) => {
                debug!(sequence = pdu.sequence_id, "gateway requested terminate");
                Some(Frame::TerminateResp(TerminateResponse::new(pdu.sequence_id)))
            }
            Frame::Deliver(pdu) => {
                debug!(
                    sequence = pdu.sequence_id,
                    msg_id = pdu.msg_id,
                    report = pdu.is_status_report(),
                    "deliver received"
                );
                Some(Frame::DeliverResp(DeliverResponse::ack(&pdu)))
            }
            other => {
                let command = other.command_id();
                if command != CommandId::ActiveTestResp {
                    debug!(?command, sequence = other.sequence_id(), "ignoring inbound frame");
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encodable;
    use crate::datatypes::{Deliver, Terminate};

    fn credentials() -> CmppCredentials {
        CmppCredentials::new("901234", "secret", "NEWS", "10657000")
    }

    #[test]
    fn login_request_is_signed_connect() {
        let cmpp = Cmpp::new();
        let Frame::Connect(connect) = cmpp.login_request(&credentials(), 3) else {
            panic!("expected connect");
        };
        assert_eq!(connect.sequence_id, 3);
        assert_eq!(connect.source_addr, "901234");
        assert_eq!(connect.version, 0x20);
    }

    #[test]
    fn login_status_reads_connect_response() {
        let cmpp = Cmpp::new();
        let request = cmpp.login_request(&credentials(), 9);

        let reply = ConnectResponse::new(9, 0).to_bytes().unwrap();
        assert_eq!(cmpp.login_status(&request, &reply).unwrap(), 0);

        let reply = ConnectResponse::new(9, 3).to_bytes().unwrap();
        assert_eq!(cmpp.login_status(&request, &reply).unwrap(), 3);

        let reply = ConnectResponse::new(10, 0).to_bytes().unwrap();
        assert!(matches!(
            cmpp.login_status(&request, &reply),
            Err(SmsError::ProtocolMismatch { .. })
        ));
    }

    #[test]
    fn content_is_ucs2_big_endian() {
        let cmpp = Cmpp::new();
        assert_eq!(cmpp.encode_content("Hi").as_ref(), &[0x00, 0x48, 0x00, 0x69]);
        assert_eq!(cmpp.encode_content("你").as_ref(), &[0x4F, 0x60]);
        assert!(cmpp.encode_content("").is_empty());
    }

    #[test]
    fn submit_request_stamps_credentials_and_segment() {
        let cmpp = Cmpp::new();
        let segment = Segment {
            payload: Bytes::from_static(&[0x05, 0x00, 0x03, 1, 2, 2, 0x00, 0x41]),
            udhi: true,
            index: 2,
            total: 2,
        };
        let destinations = vec!["13800000000".to_string(), "13900000000".to_string()];

        let Frame::Submit(submit) = cmpp
            .submit_request(&credentials(), &destinations, &segment, 77)
            .unwrap()
        else {
            panic!("expected submit");
        };

        assert_eq!(submit.sequence_id, 77);
        assert_eq!((submit.pk_total, submit.pk_number, submit.tp_udhi), (2, 2, 1));
        assert_eq!(submit.msg_fmt, MSG_FMT_UCS2);
        assert_eq!(submit.fee_type, "01");
        assert_eq!(submit.service_id, "NEWS");
        assert_eq!(submit.msg_src, "901234");
        assert_eq!(submit.src_id, "10657000");
        assert_eq!(submit.dest_terminal_ids.len(), 2);
        assert_eq!(submit.dest_terminal_ids[1], "13900000000");
        assert_eq!(submit.msg_content, segment.payload);
    }

    #[test]
    fn oversized_terminal_id_is_invalid_data() {
        let cmpp = Cmpp::new();
        let destinations = vec!["1".repeat(22)];
        let result = cmpp.submit_request(
            &credentials(),
            &destinations,
            &Segment::single(Bytes::new()),
            1,
        );
        assert!(matches!(result, Err(SmsError::InvalidData(_))));
    }

    #[test]
    fn submit_status_reads_result() {
        let cmpp = Cmpp::new();
        let request = Frame::Submit(Box::new(Submit {
            sequence_id: 5,
            ..Default::default()
        }));

        let reply = SubmitResponse::new(5, 1, 8).to_bytes().unwrap();
        assert_eq!(cmpp.submit_status(&request, &reply).unwrap(), 8);
    }

    #[test]
    fn heartbeat_requires_matching_sequence() {
        let cmpp = Cmpp::new();
        let request = cmpp.heartbeat_request(12);
        assert_eq!(request.command_id(), CommandId::ActiveTest);

        let reply = ActiveTestResponse::new(12).to_bytes().unwrap();
        assert!(cmpp.check_heartbeat(&request, &reply).is_ok());

        let reply = ActiveTestResponse::new(13).to_bytes().unwrap();
        assert!(matches!(
            cmpp.check_heartbeat(&request, &reply),
            Err(SmsError::ProtocolMismatch { .. })
        ));
    }

    #[test]
    fn reads_sequence_at_offset_eight() {
        let cmpp = Cmpp::new();
        let bytes = ActiveTest::new(0xDEAD).to_bytes().unwrap();
        assert_eq!(cmpp.read_sequence(&bytes), 0xDEAD);
        assert_eq!(cmpp.read_sequence(&bytes[..4]), 0);
    }

    #[test]
    fn answers_gateway_requests() {
        let cmpp = Cmpp::new();

        let bytes = ActiveTest::new(4).to_bytes().unwrap();
        let reply = cmpp.handle_inbound(&bytes).unwrap();
        assert_eq!(reply.command_id(), CommandId::ActiveTestResp);
        assert_eq!(reply.sequence_id(), 4);

        let bytes = Terminate::new(5).to_bytes().unwrap();
        let reply = cmpp.handle_inbound(&bytes).unwrap();
        assert_eq!(reply.command_id(), CommandId::TerminateResp);
        assert_eq!(reply.sequence_id(), 5);

        let deliver = Deliver {
            sequence_id: 6,
            msg_id: 0x1122_3344,
            msg_content: Bytes::from_static(b"hi"),
            ..Default::default()
        };
        let bytes = deliver.to_bytes().unwrap();
        let Some(Frame::DeliverResp(ack)) = cmpp.handle_inbound(&bytes) else {
            panic!("expected deliver ack");
        };
        assert_eq!((ack.sequence_id, ack.msg_id, ack.result), (6, 0x1122_3344, 0));
    }

    #[test]
    fn ignores_late_replies_and_garbage() {
        let cmpp = Cmpp::new();

        let bytes = SubmitResponse::new(8, 0, 0).to_bytes().unwrap();
        assert!(cmpp.handle_inbound(&bytes).is_none());

        assert!(cmpp.handle_inbound(&[0, 0, 0, 12, 0, 0, 0x0F, 0xFF, 0, 0, 0, 1]).is_none());
        assert!(cmpp.handle_inbound(&[1, 2, 3]).is_none());
    }
}
