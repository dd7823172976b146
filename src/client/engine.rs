// ABOUTME: Gateway engine owning the shared client state and the admission-controlled send/receive paths
// ABOUTME: Replies are routed to waiting callers by sequence id; everything else goes to the protocol's inbound handler

use crate::client::buffer_pool::BufferPool;
use crate::client::builder::GatewayConfig;
use crate::client::error::{SmsResult, TransportError};
use crate::client::keepalive::KeepAliveConfig;
use crate::client::pending::PendingTable;
use crate::client::sequence::SequenceAllocator;
use crate::client::socket::{FrameHandler, SmsSocket, SocketManager};
use crate::client::traits::Protocol;
use crate::client::types::{Counters, GatewayStatus};
use crate::codec::{Encodable, Sequenced};
use bytes::Bytes;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Shared state of every session talking one protocol
///
/// Holds the sequence allocator, the pending-reply table, the send buffer
/// pool and the socket registry. Sessions created from the same gateway
/// share sockets to the same endpoint; separate gateways share nothing.
pub struct Gateway<P: Protocol> {
    me: Weak<Gateway<P>>,
    protocol: P,
    config: GatewayConfig,
    keep_alive: KeepAliveConfig,
    sequence: SequenceAllocator,
    pending: PendingTable,
    buffers: BufferPool,
    sockets: SocketManager,
    counters: Counters,
}

impl<P: Protocol> Gateway<P> {
    pub fn new(protocol: P, config: GatewayConfig, keep_alive: KeepAliveConfig) -> Arc<Self> {
        Self::with_sequence(protocol, config, keep_alive, SequenceAllocator::new())
    }

    /// Create a gateway whose sequence ids continue from `sequence`
    pub fn with_sequence(
        protocol: P,
        config: GatewayConfig,
        keep_alive: KeepAliveConfig,
        sequence: SequenceAllocator,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Gateway {
            me: me.clone(),
            buffers: BufferPool::new(config.buffer_size, config.pool_capacity),
            sockets: SocketManager::new(config.connect_timeout),
            protocol,
            config,
            keep_alive,
            sequence,
            pending: PendingTable::new(),
            counters: Counters::default(),
        })
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn keep_alive(&self) -> &KeepAliveConfig {
        &self.keep_alive
    }

    pub fn sockets(&self) -> &SocketManager {
        &self.sockets
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub fn sequence(&self) -> &SequenceAllocator {
        &self.sequence
    }

    pub fn next_sequence(&self) -> u32 {
        self.sequence.next()
    }

    /// Activity counters together with the traffic of `socket`
    pub fn status(&self, socket: &SmsSocket) -> GatewayStatus {
        self.counters.snapshot(socket.traffic())
    }

    pub(crate) fn handler(&self) -> Weak<dyn FrameHandler> {
        self.me.clone()
    }

    pub(crate) fn upgrade(&self) -> Option<Arc<Self>> {
        self.me.upgrade()
    }

    /// Send `message` and wait up to `timeout` for the frame carrying its sequence id
    ///
    /// Waits for a free slot in the socket's admission window first. Whatever
    /// the outcome, the slot is given back and the pending entry removed
    /// before returning.
    pub async fn send_and_wait(
        &self,
        socket: &SmsSocket,
        message: &P::Message,
        timeout: Duration,
    ) -> SmsResult<Bytes> {
        let sequence = message.sequence_id();
        let slot = socket.window().acquire().await?;
        let waiter = self.pending.register(sequence, socket.id())?;
        let entry = self.pending.guard(sequence);
        trace!(sequence, traffic = socket.traffic(), "request admitted");

        let outcome = match self.transmit(socket, message).await {
            Ok(()) => match tokio::time::timeout(timeout, waiter).await {
                Ok(Ok(reply)) => reply.map_err(Into::into),
                // Sender dropped without an answer
                Ok(Err(_)) => Err(TransportError::ConnectionLost.into()),
                Err(_) => Err(TransportError::TimedOut.into()),
            },
            Err(e) => Err(e),
        };

        drop(entry);
        drop(slot);

        if let Err(e) = &outcome {
            debug!(sequence, connected = socket.is_connected(), "request failed: {}", e);
        }
        outcome
    }

    /// Fire-and-forget send; no reply is expected and no window slot is taken
    pub async fn send(&self, socket: &SmsSocket, message: &P::Message) -> SmsResult<()> {
        self.transmit(socket, message).await
    }

    async fn transmit(&self, socket: &SmsSocket, message: &P::Message) -> SmsResult<()> {
        let mut buf = self.buffers.get().await?;
        message.encode_frame(&mut buf)?;

        Counters::bump(&self.counters.tried_sends);
        if let Err(e) = socket.write_frame(&buf).await {
            if matches!(e, TransportError::Io(_)) {
                // The link is gone; nothing else written on it will be answered.
                let failed = self.pending.fail_socket(socket.id());
                debug!(failed, "failed waiters after write error");
            }
            return Err(e.into());
        }
        Counters::bump(&self.counters.completed_sends);

        trace!(sequence = message.sequence_id(), len = buf.len(), "frame written");
        Ok(())
    }
}

impl<P: Protocol> FrameHandler for Gateway<P> {
    fn on_frame(&self, socket: &Arc<SmsSocket>, frame: Bytes) {
        Counters::bump(&self.counters.tried_receives);

        let sequence = self.protocol.read_sequence(&frame);
        if sequence == 0 {
            trace!("discarding frame without sequence id");
            return;
        }

        let frame = match self.pending.fulfil(sequence, frame) {
            Ok(()) => {
                Counters::bump(&self.counters.completed_receives);
                return;
            }
            Err(frame) => frame,
        };

        debug!(sequence, "unsolicited frame");
        let Some(reply) = self.protocol.handle_inbound(&frame) else {
            return;
        };
        let Some(gateway) = self.upgrade() else {
            return;
        };

        let socket = Arc::clone(socket);
        tokio::spawn(async move {
            if let Err(e) = gateway.send(&socket, &reply).await {
                warn!(sequence, "failed to answer inbound request: {}", e);
            }
        });
    }

    fn on_closed(&self, socket: &Arc<SmsSocket>) {
        let failed = self.pending.fail_socket(socket.id());
        warn!(
            host = socket.host(),
            port = socket.port(),
            failed,
            "connection lost"
        );
    }
}
