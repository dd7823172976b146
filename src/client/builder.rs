// ABOUTME: Gateway configuration and a builder that wires a protocol, its settings and a first session
// ABOUTME: Provides convenient constructors with the defaults operators expect

use crate::client::engine::Gateway;
use crate::client::error::SmsResult;
use crate::client::keepalive::KeepAliveConfig;
use crate::client::session::Session;
use crate::client::traits::Protocol;
use std::sync::Arc;
use std::time::Duration;

/// Settings shared by every session of a gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// How long a request waits for its reply (default: 60 seconds)
    pub reply_timeout: Duration,
    /// How long a TCP connect may take (default: 10 seconds)
    pub connect_timeout: Duration,
    /// Send buffers kept for reuse, and the most that can be in use at once (default: 100)
    pub pool_capacity: usize,
    /// Initial capacity of each send buffer (default: 4 KiB)
    pub buffer_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            pool_capacity: 100,
            buffer_size: 4 * 1024,
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}

/// Builder for a gateway and its sessions
///
/// ```rust,no_run
/// use sms_gateway::client::ClientBuilder;
/// use sms_gateway::cmpp::{Cmpp, CmppCredentials};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let credentials = CmppCredentials::new("901234", "secret", "NEWS", "10657000");
/// let session = ClientBuilder::new(Cmpp::new())
///     .connect("127.0.0.1", 7890, credentials)
///     .await?;
///
/// let status = session.submit(&["13800000000".to_string()], "Hello").await?;
/// assert_eq!(status, 0);
/// session.dispose().await;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder<P: Protocol> {
    protocol: P,
    config: GatewayConfig,
    keep_alive: KeepAliveConfig,
}

impl<P: Protocol> ClientBuilder<P> {
    pub fn new(protocol: P) -> Self {
        Self {
            protocol,
            config: GatewayConfig::default(),
            keep_alive: KeepAliveConfig::default(),
        }
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn keep_alive(mut self, keep_alive: KeepAliveConfig) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Build the shared gateway; sessions are opened from it with [`Session::open`]
    pub fn build(self) -> Arc<Gateway<P>> {
        Gateway::new(self.protocol, self.config, self.keep_alive)
    }

    /// Build a gateway and open one session on it
    pub async fn connect(
        self,
        host: &str,
        port: u16,
        credentials: P::Credentials,
    ) -> SmsResult<Session<P>> {
        let gateway = self.build();
        Session::open(&gateway, host, port, credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.reply_timeout, Duration::from_secs(60));
        assert_eq!(config.pool_capacity, 100);
        assert_eq!(config.buffer_size, 4096);

        let config = config
            .with_reply_timeout(Duration::from_millis(100))
            .with_pool_capacity(8);
        assert_eq!(config.reply_timeout, Duration::from_millis(100));
        assert_eq!(config.pool_capacity, 8);
    }
}
