use crate::client::error::TransportError;
use bytes::BytesMut;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, trace};

/// Reusable send buffers shared by every socket of a gateway
///
/// At most `max_pool_size` idle buffers are kept; anything returned beyond
/// that is discarded. The same number bounds how many buffers may be checked
/// out at once, so a burst of sends waits here instead of allocating.
pub struct BufferPool {
    buf_size: usize,
    max_pool_size: usize,
    buffers: Mutex<Vec<BytesMut>>,
    checked_out: Semaphore,
}

/// A buffer on loan from the pool, returned when dropped
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buffer: BytesMut,
    _permit: SemaphorePermit<'a>,
}

impl BufferPool {
    pub fn new(buf_size: usize, max_pool_size: usize) -> Self {
        let max_pool_size = max_pool_size.max(1);
        BufferPool {
            buf_size,
            max_pool_size,
            buffers: Mutex::new(Vec::with_capacity(max_pool_size)),
            checked_out: Semaphore::new(max_pool_size),
        }
    }

    /// Take a cleared buffer, waiting while the pool is exhausted
    pub async fn get(&self) -> Result<PooledBuffer<'_>, TransportError> {
        let permit = self
            .checked_out
            .acquire()
            .await
            .map_err(|_| TransportError::ConnectionLost)?;

        Ok(PooledBuffer {
            pool: self,
            buffer: self.get_from_pool(),
            _permit: permit,
        })
    }

    fn get_from_pool(&self) -> BytesMut {
        {
            let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(buffer) = buffers.pop() {
                trace!("returning buffer from pool");
                return buffer;
            }
        }

        debug!("no buffer in pool: creating new buffer");
        BytesMut::with_capacity(self.buf_size)
    }

    /// Clear `buffer` and keep it for reuse if there is room
    pub fn put(&self, mut buffer: BytesMut) {
        buffer.clear();
        if buffer.capacity() < self.buf_size {
            debug!("discarding undersized buffer");
            return;
        }

        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if buffers.len() < self.max_pool_size {
            trace!("returning buffer to pool");
            buffers.push(buffer);
        } else {
            debug!("pool is full: discarding returned buffer");
        }
    }

    /// Idle buffers currently held
    pub fn pooled(&self) -> usize {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Buffers that can still be checked out without waiting
    pub fn available(&self) -> usize {
        self.checked_out.available_permits()
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buffer));
    }
}
