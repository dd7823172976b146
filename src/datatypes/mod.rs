mod command_id;
mod connect;
mod deliver;
mod octet_string;
mod submit;
mod terminate;
mod timestamp;

pub use active_test::{ActiveTest, ActiveTestResponse};
pub use command_id::CommandId;
pub use connect::{Connect, ConnectResponse, CMPP_VERSION};
pub use deliver::{Deliver, DeliverResponse};
pub use octet_string::{
    FeeCode, FeeType, MsgSrc, OctetString, OctetStringError, ServiceId, SourceAddr, TerminalId,
    TimeString,
};
pub use submit::{Submit, SubmitResponse};
pub use terminate::{Terminate, TerminateResponse};
pub use timestamp::{Timestamp, TimestampError};
