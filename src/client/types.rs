// ABOUTME: Supporting types for the gateway client: link states, status snapshots and message segments
// ABOUTME: Counters are kept with atomics so the engine can update them from any task

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of a shared socket
///
/// ```text
/// Disconnected -> Connecting -> Connected -> LoggedIn -> Heartbeating
///       ^                                                    |
///       +----------------- transport loss -------------------+
/// ```
///
/// A rejected login leaves the socket `Connected`; the rejection itself is
/// reported to the caller as `SmsError::LoginFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum LinkState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    LoggedIn = 3,
    Heartbeating = 4,
}

impl LinkState {
    /// Transport established (regardless of login)
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            LinkState::Connected | LinkState::LoggedIn | LinkState::Heartbeating
        )
    }

    /// Login accepted and transport still up
    pub fn is_logged_in(self) -> bool {
        matches!(self, LinkState::LoggedIn | LinkState::Heartbeating)
    }
}

/// Point-in-time view of a gateway's activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStatus {
    /// Requests currently awaiting a reply on the session's socket
    pub traffic: usize,
    /// Frames handed to a socket for writing
    pub tried_sends: u64,
    /// Frames whose write completed
    pub completed_sends: u64,
    /// Frames read off any socket
    pub tried_receives: u64,
    /// Frames matched to a waiting request
    pub completed_receives: u64,
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Traffic:\t{}", self.traffic)?;
        writeln!(
            f,
            "Total Send:\t{} - {}",
            self.tried_sends, self.completed_sends
        )?;
        write!(
            f,
            "Total Receive:\t{} - {}",
            self.tried_receives, self.completed_receives
        )
    }
}

/// Activity counters shared by all sessions of a gateway
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub tried_sends: AtomicU64,
    pub completed_sends: AtomicU64,
    pub tried_receives: AtomicU64,
    pub completed_receives: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, traffic: usize) -> GatewayStatus {
        GatewayStatus {
            traffic,
            tried_sends: self.tried_sends.load(Ordering::Relaxed),
            completed_sends: self.completed_sends.load(Ordering::Relaxed),
            tried_receives: self.tried_receives.load(Ordering::Relaxed),
            completed_receives: self.completed_receives.load(Ordering::Relaxed),
        }
    }
}

/// One piece of message content, ready to be placed in a submit
///
/// For long messages `payload` already starts with the concatenation
/// header and `udhi` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub payload: Bytes,
    pub udhi: bool,
    /// 1-based position of this segment
    pub index: u8,
    pub total: u8,
}

impl Segment {
    /// A message that fits in a single submit
    pub fn single(payload: Bytes) -> Self {
        Self {
            payload,
            udhi: false,
            index: 1,
            total: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_state_flags() {
        assert!(!LinkState::Disconnected.is_connected());
        assert!(!LinkState::Connecting.is_connected());
        assert!(LinkState::Connected.is_connected());
        assert!(!LinkState::Connected.is_logged_in());
        assert!(LinkState::Heartbeating.is_logged_in());
        assert_eq!(LinkState::try_from(3u8).unwrap(), LinkState::LoggedIn);
    }

    #[test]
    fn status_summary() {
        let counters = Counters::default();
        Counters::bump(&counters.tried_sends);
        Counters::bump(&counters.tried_sends);
        Counters::bump(&counters.completed_sends);

        let status = counters.snapshot(1);
        assert_eq!(
            status.to_string(),
            "Traffic:\t1\nTotal Send:\t2 - 1\nTotal Receive:\t0 - 0"
        );
    }
}
