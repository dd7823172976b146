// ABOUTME: Protocol extension point implemented once per operator protocol binding
// ABOUTME: The connection engine is generic over this trait and never inspects message layouts itself

use crate::client::error::SmsResult;
use crate::client::types::Segment;
use crate::codec::{Encodable, Sequenced};
use bytes::Bytes;

/// Operator protocol binding
///
/// Implementations build the wire messages for login, submit and heartbeat,
/// interpret the matching replies, and answer requests the gateway sends on
/// its own. Everything else (correlation, windowing, reconnects, keepalive
/// scheduling) is handled by the engine.
pub trait Protocol: Send + Sync + 'static {
    /// Login identity and submit defaults for one session
    type Credentials: Send + Sync + 'static;

    /// Any message this protocol sends
    type Message: Encodable + Sequenced + Send + Sync + 'static;

    /// Build a signed login request
    fn login_request(&self, credentials: &Self::Credentials, sequence: u32) -> Self::Message;

    /// Status code carried by a login reply; 0 is success
    fn login_status(&self, request: &Self::Message, reply: &[u8]) -> SmsResult<u32>;

    /// Convert text into the payload bytes the protocol transmits
    fn encode_content(&self, content: &str) -> Bytes;

    /// Build one submit for a destination batch and a content segment
    fn submit_request(
        &self,
        credentials: &Self::Credentials,
        destinations: &[String],
        segment: &Segment,
        sequence: u32,
    ) -> SmsResult<Self::Message>;

    /// Result code carried by a submit reply; 0 is success
    fn submit_status(&self, request: &Self::Message, reply: &[u8]) -> SmsResult<u32>;

    /// Build a link check request
    fn heartbeat_request(&self, sequence: u32) -> Self::Message;

    /// Validate a link check reply against its request
    fn check_heartbeat(&self, request: &Self::Message, reply: &[u8]) -> SmsResult<()>;

    /// Sequence id of a raw frame; 0 when it cannot be correlated
    fn read_sequence(&self, frame: &[u8]) -> u32;

    /// Answer a frame nobody was waiting for
    ///
    /// Returns `None` for frames that need no answer, including unknown
    /// commands and late replies.
    fn handle_inbound(&self, frame: &[u8]) -> Option<Self::Message>;

    /// Concurrent requests allowed on one link
    fn window_size(&self) -> usize {
        16
    }

    /// Destinations carried by a single submit
    fn max_destinations(&self) -> usize {
        100
    }

    /// Largest content a single submit carries
    fn segment_limit(&self) -> usize {
        140
    }

    /// Size of the concatenation header prepended to long message segments
    fn udhi_header_len(&self) -> usize {
        6
    }
}
