// ABOUTME: Error types for the gateway client, split into the transport boundary and the public surface
// ABOUTME: Transport errors are produced by the send/receive engine and wrapped into SmsError for callers

use crate::codec::CodecError;
use std::io;
use thiserror::Error;

/// Failures observed by the send/receive engine
///
/// Every outstanding request ends either with its reply bytes or with one
/// of these.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No reply arrived before the wait expired
    #[error("Timed out waiting for reply")]
    TimedOut,

    /// The socket went away while the request was in flight
    #[error("Connection lost")]
    ConnectionLost,

    /// A request with this sequence id is already outstanding
    #[error("Sequence id {0} is already outstanding")]
    DuplicateSequence(u32),

    /// I/O error while connecting, reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Error type for gateway client operations
#[derive(Debug, Error)]
pub enum SmsError {
    /// The gateway rejected the login; carries its status code
    #[error("Login rejected by gateway with status {0}")]
    LoginFailed(u32),

    /// Transport failure raised by the engine
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A reply did not match the request it was correlated with
    #[error("Protocol mismatch: expected {expected}, got {actual}")]
    ProtocolMismatch { expected: String, actual: String },

    /// Encoding or decoding failure
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Caller supplied data that cannot be sent (empty destination list, oversized address, ...)
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Operation not allowed in the current session state
    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

/// Result type alias for gateway operations
pub type SmsResult<T> = Result<T, SmsError>;

impl From<io::Error> for SmsError {
    fn from(err: io::Error) -> Self {
        SmsError::Transport(TransportError::Io(err))
    }
}

impl SmsError {
    /// True when the failure came from the link rather than the gateway's answer
    pub fn is_transport(&self) -> bool {
        matches!(self, SmsError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_told_apart_from_gateway_answers() {
        let lost = SmsError::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(lost.is_transport());
        assert!(SmsError::Transport(TransportError::TimedOut).is_transport());
        assert!(!SmsError::LoginFailed(3).is_transport());
    }
}
