use crate::datatypes::CommandId;
use crate::macros::impl_header_only_pdu;

/// CMPP_TERMINATE - request to tear down the connection
#[derive(Clone, Debug, PartialEq)]
pub struct Terminate {
    pub sequence_id: u32,
}

/// CMPP_TERMINATE_RESP
#[derive(Clone, Debug, PartialEq)]
pub struct TerminateResponse {
    pub sequence_id: u32,
}

impl_header_only_pdu!(Terminate, CommandId::Terminate);
impl_header_only_pdu!(TerminateResponse, CommandId::TerminateResp);
