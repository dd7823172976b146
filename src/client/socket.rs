// ABOUTME: Shared gateway sockets keyed by host:port and the manager that connects, reconnects and releases them
// ABOUTME: Each connected socket runs one reader task that hands complete frames to a FrameHandler

use crate::client::error::TransportError;
use crate::client::flow_control::AdmissionWindow;
use crate::client::types::LinkState;
use crate::connection::FrameReader;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receiver of everything a socket's reader task produces
pub trait FrameHandler: Send + Sync + 'static {
    /// A complete raw frame arrived on `socket`
    fn on_frame(&self, socket: &Arc<SmsSocket>, frame: Bytes);

    /// The transport of `socket` closed or failed
    fn on_closed(&self, socket: &Arc<SmsSocket>);
}

/// One physical link to a gateway endpoint, shared by every session to it
///
/// The socket survives reconnects: only the transport halves and the
/// reader task are replaced, so sessions keep their handle and the
/// admission window keeps counting.
#[derive(Debug)]
pub struct SmsSocket {
    id: u64,
    host: String,
    port: u16,
    window: AdmissionWindow,
    state: AtomicU8,
    // Bumped on every connect so a stale reader cannot tear down a newer link.
    epoch: AtomicU64,
    sessions: AtomicUsize,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    connect_lock: tokio::sync::Mutex<()>,
    login_lock: tokio::sync::Mutex<()>,
    reader: Mutex<Option<JoinHandle<()>>>,
    keepalive: Mutex<Option<JoinHandle<()>>>,
}

impl SmsSocket {
    fn new(id: u64, host: &str, port: u16, window_size: usize) -> Self {
        Self {
            id,
            host: host.to_string(),
            port,
            window: AdmissionWindow::new(window_size),
            state: AtomicU8::new(LinkState::Disconnected.into()),
            epoch: AtomicU64::new(0),
            sessions: AtomicUsize::new(0),
            writer: tokio::sync::Mutex::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            login_lock: tokio::sync::Mutex::new(()),
            reader: Mutex::new(None),
            keepalive: Mutex::new(None),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn window(&self) -> &AdmissionWindow {
        &self.window
    }

    /// Requests currently awaiting a reply on this socket
    pub fn traffic(&self) -> usize {
        self.window.traffic()
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::Acquire)
    }

    pub fn state(&self) -> LinkState {
        LinkState::try_from(self.state.load(Ordering::Acquire)).unwrap_or(LinkState::Disconnected)
    }

    /// Identifies the current transport; changes on every connect and close
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state().is_logged_in()
    }

    /// Move to `to` if the current state is one of `from`
    pub fn transition(&self, from: &[LinkState], to: LinkState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                let current = LinkState::try_from(raw).ok()?;
                from.contains(&current).then_some(to.into())
            })
            .is_ok()
    }

    /// Drop back to `Connected` after a failed heartbeat
    pub fn clear_login(&self) -> bool {
        self.transition(
            &[LinkState::LoggedIn, LinkState::Heartbeating],
            LinkState::Connected,
        )
    }

    /// Serialises login attempts on this socket
    pub fn login_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.login_lock
    }

    /// Write one encoded frame
    pub async fn write_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::ConnectionLost);
        }

        let mut writer = self.writer.lock().await;
        let Some(stream) = writer.as_mut() else {
            return Err(TransportError::ConnectionLost);
        };

        if let Err(e) = stream.write_all(frame).await {
            warn!(host = %self.host, port = self.port, "write failed: {}", e);
            writer.take();
            self.state
                .store(LinkState::Disconnected.into(), Ordering::Release);
            return Err(TransportError::Io(e));
        }
        Ok(())
    }

    /// Whether a keepalive task is currently running
    pub fn has_keepalive(&self) -> bool {
        self.keepalive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Install a keepalive task unless one is already running
    ///
    /// `spawn` is only called when a new task is needed.
    pub fn ensure_keepalive(&self, spawn: impl FnOnce() -> JoinHandle<()>) -> bool {
        let mut slot = self.keepalive.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }
        *slot = Some(spawn());
        true
    }

    fn stop_keepalive(&self) {
        if let Some(task) = self.keepalive.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }

    /// Take the reader task if it is still running
    fn take_running_reader(&self) -> Option<JoinHandle<()>> {
        let mut slot = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            slot.take()
        } else {
            None
        }
    }

    fn replace_reader(&self, task: JoinHandle<()>) {
        let previous = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Mark the link down if `epoch` is still the current connection
    fn mark_disconnected(&self, epoch: u64) -> bool {
        if self.epoch.load(Ordering::Acquire) != epoch {
            return false;
        }
        self.state
            .store(LinkState::Disconnected.into(), Ordering::Release);
        self.stop_keepalive();
        true
    }

    /// Stop background tasks and close the transport
    async fn close(&self) {
        for slot in [&self.keepalive, &self.reader] {
            if let Some(task) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                task.abort();
            }
        }
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.state
            .store(LinkState::Disconnected.into(), Ordering::Release);

        if let Some(mut stream) = self.writer.lock().await.take() {
            let _ = stream.shutdown().await;
        }
    }
}

/// Registry of shared sockets keyed by `host:port`
#[derive(Debug)]
pub struct SocketManager {
    sockets: Mutex<HashMap<String, Arc<SmsSocket>>>,
    connect_timeout: Duration,
    next_id: AtomicU64,
}

impl SocketManager {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            sockets: Mutex::new(HashMap::new()),
            connect_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    fn key(host: &str, port: u16) -> String {
        format!("{host}:{port}")
    }

    /// Get the socket for `host:port`, creating and connecting it on first use
    ///
    /// Every call registers one more session on the socket; pair it with
    /// [`release`](Self::release).
    pub async fn get(
        &self,
        host: &str,
        port: u16,
        window_size: usize,
        handler: Weak<dyn FrameHandler>,
    ) -> Result<Arc<SmsSocket>, TransportError> {
        let socket = {
            let mut sockets = self.sockets.lock().unwrap_or_else(PoisonError::into_inner);
            let socket = sockets.entry(Self::key(host, port)).or_insert_with(|| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                debug!(host, port, id, "creating socket");
                Arc::new(SmsSocket::new(id, host, port, window_size))
            });
            socket.sessions.fetch_add(1, Ordering::AcqRel);
            Arc::clone(socket)
        };

        if let Err(e) = self.connect(&socket, handler).await {
            self.release(&socket).await;
            return Err(e);
        }
        Ok(socket)
    }

    /// Re-establish the transport of `socket` if it is down
    pub async fn reconnect(
        &self,
        socket: &Arc<SmsSocket>,
        handler: Weak<dyn FrameHandler>,
    ) -> Result<Arc<SmsSocket>, TransportError> {
        info!(host = %socket.host, port = socket.port, "reconnecting");
        self.connect(socket, handler).await?;
        Ok(Arc::clone(socket))
    }

    /// Detach one session from `socket`
    ///
    /// The transport is closed only when the last session leaves.
    pub async fn release(&self, socket: &Arc<SmsSocket>) {
        let last = {
            let mut sockets = self.sockets.lock().unwrap_or_else(PoisonError::into_inner);
            let remaining = socket.sessions.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
            if remaining == 0 {
                let key = Self::key(&socket.host, socket.port);
                if sockets.get(&key).is_some_and(|s| Arc::ptr_eq(s, socket)) {
                    sockets.remove(&key);
                }
            }
            remaining == 0
        };

        if last {
            debug!(host = %socket.host, port = socket.port, "closing socket, last session released");
            socket.close().await;
        }
    }

    /// Sockets currently registered
    pub fn len(&self) -> usize {
        self.sockets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn connect(
        &self,
        socket: &Arc<SmsSocket>,
        handler: Weak<dyn FrameHandler>,
    ) -> Result<(), TransportError> {
        let _guard = socket.connect_lock.lock().await;
        if socket.is_connected() {
            return Ok(());
        }

        // Tasks of the previous transport must not run on the new one.
        socket.stop_keepalive();
        if let Some(stale) = socket.take_running_reader() {
            stale.abort();
            debug!(host = %socket.host, port = socket.port, "previous link ended without a reader shutdown");
            if let Some(handler) = handler.upgrade() {
                handler.on_closed(socket);
            }
        }

        socket
            .state
            .store(LinkState::Connecting.into(), Ordering::Release);
        let addr = Self::key(&socket.host, socket.port);
        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                socket.transition(&[LinkState::Connecting], LinkState::Disconnected);
                warn!(%addr, "connect failed: {}", e);
                return Err(TransportError::Io(e));
            }
            Err(_) => {
                socket.transition(&[LinkState::Connecting], LinkState::Disconnected);
                warn!(%addr, "connect timed out");
                return Err(TransportError::TimedOut);
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%addr, "could not disable Nagle: {}", e);
        }

        let (read_half, write_half) = stream.into_split();
        *socket.writer.lock().await = Some(write_half);

        let epoch = socket.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        socket.replace_reader(tokio::spawn(read_loop(
            Arc::clone(socket),
            FrameReader::new(read_half),
            handler,
            epoch,
        )));
        socket
            .state
            .store(LinkState::Connected.into(), Ordering::Release);

        info!(%addr, id = socket.id, "connected");
        Ok(())
    }
}

async fn read_loop(
    socket: Arc<SmsSocket>,
    mut reader: FrameReader<OwnedReadHalf>,
    handler: Weak<dyn FrameHandler>,
    epoch: u64,
) {
    loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => match handler.upgrade() {
                Some(handler) => handler.on_frame(&socket, frame),
                None => break,
            },
            Ok(None) => {
                debug!(host = %socket.host, port = socket.port, "connection closed by peer");
                break;
            }
            Err(e) => {
                warn!(host = %socket.host, port = socket.port, "read failed: {}", e);
                break;
            }
        }
    }

    if socket.mark_disconnected(epoch) {
        if let Some(handler) = handler.upgrade() {
            handler.on_closed(&socket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    struct Collect {
        frames: Mutex<Vec<Bytes>>,
        closed: AtomicUsize,
    }

    impl FrameHandler for Collect {
        fn on_frame(&self, _socket: &Arc<SmsSocket>, frame: Bytes) {
            self.frames.lock().unwrap().push(frame);
        }

        fn on_closed(&self, _socket: &Arc<SmsSocket>) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn collector() -> Arc<Collect> {
        Arc::new(Collect {
            frames: Mutex::new(Vec::new()),
            closed: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn sockets_are_shared_per_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let handler = collector();
        let weak: Weak<dyn FrameHandler> = Arc::downgrade(&handler) as Weak<dyn FrameHandler>;
        let manager = SocketManager::new(Duration::from_secs(5));

        let a = manager.get("127.0.0.1", port, 4, weak.clone()).await.unwrap();
        let b = manager.get("127.0.0.1", port, 4, weak.clone()).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.sessions(), 2);
        assert_eq!(a.state(), LinkState::Connected);
        assert_eq!(a.window().size(), 4);

        manager.release(&a).await;
        assert!(b.is_connected());
        assert_eq!(manager.len(), 1);

        manager.release(&b).await;
        assert!(!b.is_connected());
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn reader_reports_frames_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream
                .write_all(&[0, 0, 0, 12, 0, 0, 0, 8, 0, 0, 0, 42])
                .await
                .unwrap();
        });

        let handler = collector();
        let weak: Weak<dyn FrameHandler> = Arc::downgrade(&handler) as Weak<dyn FrameHandler>;
        let manager = SocketManager::new(Duration::from_secs(5));
        let socket = manager.get("127.0.0.1", port, 4, weak.clone()).await.unwrap();

        for _ in 0..100 {
            if handler.closed.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(handler.frames.lock().unwrap().len(), 1);
        assert_eq!(handler.closed.load(Ordering::SeqCst), 1);
        assert_eq!(socket.state(), LinkState::Disconnected);
        assert!(matches!(
            socket.write_frame(b"x").await,
            Err(TransportError::ConnectionLost) | Err(TransportError::Io(_))
        ));
    }

    #[tokio::test]
    async fn connect_failure_releases_the_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let handler = collector();
        let weak: Weak<dyn FrameHandler> = Arc::downgrade(&handler) as Weak<dyn FrameHandler>;
        let manager = SocketManager::new(Duration::from_secs(5));

        assert!(manager.get("127.0.0.1", port, 4, weak).await.is_err());
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn reconnect_retires_tasks_of_the_previous_link() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let handler = collector();
        let weak: Weak<dyn FrameHandler> = Arc::downgrade(&handler) as Weak<dyn FrameHandler>;
        let manager = SocketManager::new(Duration::from_secs(5));
        let socket = manager.get("127.0.0.1", port, 4, weak.clone()).await.unwrap();
        let first_epoch = socket.epoch();
        assert!(socket.ensure_keepalive(|| tokio::spawn(std::future::pending())));
        assert!(socket.has_keepalive());

        // A failed write drops the writer while the reader is still parked on the open read half
        socket.writer.lock().await.take();
        socket
            .state
            .store(LinkState::Disconnected.into(), Ordering::Release);
        assert_eq!(handler.closed.load(Ordering::SeqCst), 0);

        manager.reconnect(&socket, weak).await.unwrap();
        assert_eq!(handler.closed.load(Ordering::SeqCst), 1);
        assert!(!socket.has_keepalive());
        assert!(socket.epoch() > first_epoch);
        assert_eq!(socket.state(), LinkState::Connected);
    }

    #[test]
    fn transitions_are_conditional() {
        let socket = SmsSocket::new(1, "localhost", 7890, 16);
        assert!(!socket.transition(&[LinkState::Connected], LinkState::LoggedIn));
        assert!(socket.transition(&[LinkState::Disconnected], LinkState::Connected));
        assert!(socket.transition(&[LinkState::Connected], LinkState::LoggedIn));
        assert!(socket.is_logged_in());
        assert!(socket.clear_login());
        assert_eq!(socket.state(), LinkState::Connected);
    }
}
