// ABOUTME: Per-socket admission window bounding the number of requests awaiting a reply
// ABOUTME: Senders wait for a free slot; the traffic counter is kept with atomic increments only

use crate::client::error::TransportError;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Semaphore, SemaphorePermit};

/// Sliding window of outstanding requests on one socket
///
/// Operators limit how many unanswered submits a single link may carry.
/// A request takes a slot before it is written and gives it back once its
/// reply (or failure) has been handled.
#[derive(Debug)]
pub struct AdmissionWindow {
    size: usize,
    permits: Semaphore,
    traffic: AtomicUsize,
}

/// One occupied slot of an [`AdmissionWindow`]; released on drop
#[derive(Debug)]
pub struct WindowSlot<'a> {
    window: &'a AdmissionWindow,
    _permit: SemaphorePermit<'a>,
}

impl AdmissionWindow {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            permits: Semaphore::new(size),
            traffic: AtomicUsize::new(0),
        }
    }

    /// Wait until a slot is free and occupy it
    pub async fn acquire(&self) -> Result<WindowSlot<'_>, TransportError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| TransportError::ConnectionLost)?;
        self.traffic.fetch_add(1, Ordering::AcqRel);

        Ok(WindowSlot {
            window: self,
            _permit: permit,
        })
    }

    /// Occupy a slot only if one is free right now
    pub fn try_acquire(&self) -> Option<WindowSlot<'_>> {
        let permit = self.permits.try_acquire().ok()?;
        self.traffic.fetch_add(1, Ordering::AcqRel);

        Some(WindowSlot {
            window: self,
            _permit: permit,
        })
    }

    /// Requests currently holding a slot
    pub fn traffic(&self) -> usize {
        self.traffic.load(Ordering::Acquire)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Drop for WindowSlot<'_> {
    fn drop(&mut self) {
        // Runs before the permit field is dropped, so traffic never exceeds size.
        self.window.traffic.fetch_sub(1, Ordering::AcqRel);
    }
}
