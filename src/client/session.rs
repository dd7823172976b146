// ABOUTME: Session bound to one gateway endpoint: login handshake, message submission and disposal
// ABOUTME: Sessions to the same host:port share one socket, its login and its admission window

use crate::client::engine::Gateway;
use crate::client::error::{SmsError, SmsResult, TransportError};
use crate::client::socket::SmsSocket;
use crate::client::traits::Protocol;
use crate::client::types::{GatewayStatus, LinkState};
use crate::client::udhi;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// One logical client identity talking to one gateway endpoint
pub struct Session<P: Protocol> {
    gateway: Arc<Gateway<P>>,
    credentials: P::Credentials,
    socket: Arc<SmsSocket>,
    disposed: AtomicBool,
}

impl<P: Protocol> Session<P> {
    /// Attach a session to the shared socket for `host:port`, connecting it if needed
    pub async fn open(
        gateway: &Arc<Gateway<P>>,
        host: &str,
        port: u16,
        credentials: P::Credentials,
    ) -> SmsResult<Self> {
        let socket = gateway
            .sockets()
            .get(host, port, gateway.protocol().window_size(), gateway.handler())
            .await?;

        Ok(Self {
            gateway: Arc::clone(gateway),
            credentials,
            socket,
            disposed: AtomicBool::new(false),
        })
    }

    /// Log in unless the shared socket already is
    ///
    /// Only one handshake runs per socket at a time; callers arriving while
    /// it is in progress see its outcome instead of starting another.
    pub async fn login(&self) -> SmsResult<()> {
        self.ensure_open()?;
        let socket = &self.socket;
        if socket.is_logged_in() {
            return Ok(());
        }

        let _guard = socket.login_lock().lock().await;
        if socket.is_logged_in() {
            return Ok(());
        }

        if !socket.is_connected() {
            self.reconnect().await?;
        }

        let protocol = self.gateway.protocol();
        let request = protocol.login_request(&self.credentials, self.gateway.next_sequence());
        let reply = self
            .gateway
            .send_and_wait(socket, &request, self.gateway.config().reply_timeout)
            .await?;

        let status = protocol.login_status(&request, &reply)?;
        if status != 0 {
            warn!(host = socket.host(), port = socket.port(), status, "login rejected");
            return Err(SmsError::LoginFailed(status));
        }

        if !socket.transition(&[LinkState::Connected], LinkState::LoggedIn) {
            return Err(TransportError::ConnectionLost.into());
        }
        info!(host = socket.host(), port = socket.port(), "logged in");

        self.gateway.ensure_keepalive(socket);
        Ok(())
    }

    /// Submit `content` to every number in `destinations`
    ///
    /// Long content and long destination lists are sent as several messages,
    /// one after another. Returns the gateway's result code: the only one
    /// for a single message, otherwise the first non-zero result (0 when
    /// every message was accepted).
    pub async fn submit(&self, destinations: &[String], content: &str) -> SmsResult<u32> {
        self.ensure_open()?;
        if !self.socket.is_connected() {
            self.reconnect().await?;
        }
        if !self.socket.is_logged_in() {
            self.login().await?;
        }

        let protocol = self.gateway.protocol();
        let messages = udhi::package(
            protocol,
            &self.credentials,
            destinations,
            content,
            self.gateway.sequence(),
        )?;
        debug!(
            destinations = destinations.len(),
            messages = messages.len(),
            "submitting"
        );

        let mut first_failure = None;
        for message in &messages {
            let reply = self
                .gateway
                .send_and_wait(&self.socket, message, self.gateway.config().reply_timeout)
                .await?;
            let result = protocol.submit_status(message, &reply)?;
            if result != 0 {
                warn!(result, "submit rejected");
                first_failure.get_or_insert(result);
            }
        }

        Ok(first_failure.unwrap_or(0))
    }

    /// Activity summary of the gateway plus this session's socket traffic
    pub fn status(&self) -> GatewayStatus {
        self.gateway.status(&self.socket)
    }

    pub fn is_logged_in(&self) -> bool {
        self.socket.is_logged_in()
    }

    pub fn socket(&self) -> &Arc<SmsSocket> {
        &self.socket
    }

    pub fn gateway(&self) -> &Arc<Gateway<P>> {
        &self.gateway
    }

    pub fn credentials(&self) -> &P::Credentials {
        &self.credentials
    }

    /// Detach from the shared socket
    ///
    /// The socket, with its reader and keepalive tasks, is closed only when
    /// no other session uses it. Further calls on this session fail.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(host = self.socket.host(), port = self.socket.port(), "disposing session");
        self.gateway.sockets().release(&self.socket).await;
    }

    async fn reconnect(&self) -> SmsResult<()> {
        self.gateway
            .sockets()
            .reconnect(&self.socket, self.gateway.handler())
            .await?;
        Ok(())
    }

    fn ensure_open(&self) -> SmsResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SmsError::InvalidState("session disposed".to_string()));
        }
        Ok(())
    }
}

impl<P: Protocol> Drop for Session<P> {
    fn drop(&mut self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Release in the background when dropped inside a runtime.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let gateway = Arc::clone(&self.gateway);
            let socket = Arc::clone(&self.socket);
            handle.spawn(async move { gateway.sockets().release(&socket).await });
        }
    }
}
