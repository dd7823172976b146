use num_enum::TryFromPrimitive;

/// CMPP 2.0 command identifiers. Responses carry the request id with the
/// high bit set.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandId {
    Connect = 0x0000_0001,
    ConnectResp = 0x8000_0001,
    Terminate = 0x0000_0002,
    TerminateResp = 0x8000_0002,
    // Reserved 0x0000_0003
    Submit = 0x0000_0004,
    SubmitResp = 0x8000_0004,
    Deliver = 0x0000_0005,
    DeliverResp = 0x8000_0005,
    Query = 0x0000_0006,
    QueryResp = 0x8000_0006,
    Cancel = 0x0000_0007,
    CancelResp = 0x8000_0007,
    ActiveTest = 0x0000_0008,
    ActiveTestResp = 0x8000_0008,
    // Gateway-to-gateway forwarding and route management (0x09 - 0x18)
    // are not spoken by an SP client.
}

impl CommandId {
    /// The response id matching this request id (identity for responses)
    pub fn response(self) -> u32 {
        self as u32 | 0x8000_0000
    }
}
