// ABOUTME: Keepalive loop sending periodic link checks on each logged-in socket
// ABOUTME: A failed check clears the socket's login so the next operation logs in again

use crate::client::engine::Gateway;
use crate::client::socket::SmsSocket;
use crate::client::traits::Protocol;
use crate::client::types::LinkState;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the keepalive task
///
/// Gateways drop links that stay idle too long; a link check is sent every
/// `interval` while the socket is logged in.
///
/// # Example
///
/// ```rust
/// use sms_gateway::client::KeepAliveConfig;
/// use std::time::Duration;
///
/// // Default configuration (3 minute interval, 60s timeout)
/// let config = KeepAliveConfig::default();
///
/// // Custom configuration
/// let config = KeepAliveConfig::new(Duration::from_secs(60))
///     .with_timeout(Duration::from_secs(15));
///
/// // Disabled keepalive
/// let config = KeepAliveConfig::disabled();
/// assert!(!config.enabled);
/// ```
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    /// Pause between link checks (default: 180 seconds)
    pub interval: Duration,

    /// How long to wait for each link check reply (default: 60 seconds)
    pub timeout: Duration,

    /// Whether a keepalive task is started after login (default: true)
    pub enabled: bool,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3 * 60),
            timeout: Duration::from_secs(60),
            enabled: true,
        }
    }
}

impl KeepAliveConfig {
    /// Create a keepalive configuration with a custom interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Set the timeout for link check replies
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A configuration that never starts the task
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

impl<P: Protocol> Gateway<P> {
    /// Start the keepalive task of `socket` unless one is already running
    pub(crate) fn ensure_keepalive(&self, socket: &Arc<SmsSocket>) -> bool {
        if !self.keep_alive().enabled {
            return false;
        }

        let Some(gateway) = self.upgrade() else {
            return false;
        };
        let gateway = Arc::downgrade(&gateway);
        let config = self.keep_alive().clone();
        let task_socket = Arc::clone(socket);
        let epoch = socket.epoch();

        socket.ensure_keepalive(move || tokio::spawn(run(gateway, task_socket, config, epoch)))
    }
}

/// Heartbeat loop for the transport identified by `epoch`
///
/// Ends when a heartbeat fails or the transport is replaced. Only a failure
/// on its own transport clears the login.
async fn run<P: Protocol>(
    gateway: Weak<Gateway<P>>,
    socket: Arc<SmsSocket>,
    config: KeepAliveConfig,
    epoch: u64,
) {
    let current = || socket.epoch() == epoch && socket.is_connected();
    if !current() {
        debug!(epoch, "transport replaced before keepalive started");
        return;
    }
    socket.transition(&[LinkState::LoggedIn], LinkState::Heartbeating);
    info!(host = socket.host(), port = socket.port(), "keepalive started");

    let mut beats: u64 = 0;
    while current() {
        let Some(gateway) = gateway.upgrade() else {
            break;
        };

        let request = gateway.protocol().heartbeat_request(gateway.next_sequence());
        let result = match gateway.send_and_wait(&socket, &request, config.timeout).await {
            Ok(reply) => gateway.protocol().check_heartbeat(&request, &reply),
            Err(e) => Err(e),
        };
        drop(gateway);

        if let Err(e) = result {
            warn!(host = socket.host(), port = socket.port(), "heartbeat failed: {}", e);
            break;
        }

        beats += 1;
        debug!(beats, "heartbeat acknowledged");
        tokio::time::sleep(config.interval).await;
    }

    if socket.epoch() == epoch {
        socket.clear_login();
    }
    info!(host = socket.host(), port = socket.port(), beats, "keepalive stopped");
}
